//! Status command handler

use anyhow::Result;

use postgrab_core::Config;

use super::AppStore;
use crate::output::{Output, OutputFormat};

/// Show collection counts and storage information
pub fn show(store: &AppStore, config: &Config, output: &Output) -> Result<()> {
    let counts = store.counts();
    let size = store.backend().size_on_disk();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "parser_url": config.parser_url,
                    "streaming": config.streaming,
                    "storage": {
                        "data_dir": store.backend().dir(),
                        "size": size
                    },
                    "counts": {
                        "active": counts.active,
                        "trash": counts.trash,
                        "todo": counts.todo,
                        "todo_unparsed": counts.todo_unparsed,
                        "history": counts.history
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", counts.active);
        }
        OutputFormat::Human => {
            println!("postgrab Status");
            println!("===============");
            println!();
            println!("Parser:");
            println!("  Service: {}", config.parser_url);
            println!(
                "  Mode:    {}",
                if config.streaming {
                    "streaming"
                } else {
                    "single response"
                }
            );
            println!();
            println!("Storage:");
            println!("  Location: {}", store.backend().dir().display());
            println!("  Size:     {}", human_size(size));
            println!();
            println!("Contents:");
            println!("  Saved:   {}", counts.active);
            println!("  Trash:   {}", counts.trash);
            println!(
                "  Todo:    {} ({} unparsed)",
                counts.todo, counts.todo_unparsed
            );
            println!("  History: {}", counts.history);
        }
    }

    Ok(())
}

/// Format a byte count for display
fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
