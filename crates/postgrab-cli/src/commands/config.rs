//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use postgrab_core::Config;

use crate::output::{Output, OutputFormat};

/// Keys accepted by `config set`
const VALID_KEYS: &str =
    "data_dir, parser_url, streaming, download_dir, download_delay_ms, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "parser_url": config.parser_url,
                    "streaming": config.streaming,
                    "download_dir": config.download_dir,
                    "download_delay_ms": config.download_delay_ms,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:          {}", config.data_dir.display());
            println!("  parser_url:        {}", config.parser_url);
            println!("  streaming:         {}", config.streaming);
            println!(
                "  download_dir:      {}",
                display_optional(config.download_dir.as_ref())
            );
            println!("  download_delay_ms: {}", config.download_delay_ms);
            println!(
                "  log_file:          {}",
                display_optional(config.log_file.as_ref())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Apply one `key = value` assignment
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "parser_url" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                bail!("Invalid value for parser_url. Use an http:// or https:// URL.");
            }
            config.parser_url = value.trim_end_matches('/').to_string();
        }
        "streaming" => {
            config.streaming = value
                .parse()
                .context("Invalid value for streaming. Use 'true' or 'false'.")?;
        }
        "download_dir" => {
            config.download_dir = optional_path(value);
        }
        "download_delay_ms" => {
            config.download_delay_ms = value
                .parse()
                .context("Invalid value for download_delay_ms. Use a number of milliseconds.")?;
        }
        "log_file" => {
            config.log_file = optional_path(value);
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.into())
    }
}

fn display_optional(path: Option<&PathBuf>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}
