//! Parse command handler

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use tracing::info;

use postgrab_core::{extract_links, BatchOptions, BatchParser, BatchReport, Config, ParserClient};

use super::AppStore;
use crate::input;
use crate::output::Output;

/// Extract links from the input and parse them
pub async fn run(
    store: &mut AppStore,
    config: &Config,
    text: Vec<String>,
    edit: bool,
    no_stream: bool,
    output: &Output,
) -> Result<()> {
    let text = input::collect(&text, edit)?;
    let urls = extract_links(&text);
    if urls.is_empty() {
        bail!("No post links found in the input");
    }

    let report = run_batch(store, config, &urls, BatchOptions::default(), no_stream, output).await?;
    output.print_batch(&report.added, report.duplicates, &report.failed);
    Ok(())
}

/// Run one batch, showing progress on stderr in human mode
pub async fn run_batch(
    store: &mut AppStore,
    config: &Config,
    urls: &[String],
    options: BatchOptions,
    no_stream: bool,
    output: &Output,
) -> Result<BatchReport> {
    let client = ParserClient::from_config(config).context("Failed to create parser client")?;
    let parser = BatchParser::new(client).with_streaming(config.streaming && !no_stream);

    info!("Parsing {} link(s) via {}", urls.len(), parser.client().base_url());
    if output.should_prompt() {
        eprintln!("Parsing {} link(s)...", urls.len());
    }

    let mut progress = parser.subscribe_progress();
    let mut watching = output.should_prompt();

    let batch = parser.run(store, urls, options);
    tokio::pin!(batch);

    let result = loop {
        tokio::select! {
            result = &mut batch => break result,
            changed = progress.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let current = *progress.borrow_and_update();
                eprint!("\r  {}/{}", current.current, current.total);
                let _ = io::stderr().flush();
            }
        }
    };

    if output.should_prompt() {
        eprintln!();
    }

    result.context("Batch parse failed")
}
