//! Todo command handlers

use anyhow::{bail, Context, Result};

use postgrab_core::{extract_links, BatchOptions, Config};

use super::parse::run_batch;
use super::AppStore;
use crate::input;
use crate::output::Output;

/// Queue links found in the input
pub fn add(store: &mut AppStore, text: Vec<String>, edit: bool, output: &Output) -> Result<()> {
    let text = input::collect(&text, edit)?;
    let urls = extract_links(&text);
    if urls.is_empty() {
        bail!("No post links found in the input");
    }

    let report = store.todo_add(&urls).context("Failed to update todo list")?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({"added": report.added, "skipped": report.skipped})
        );
    } else if report.skipped > 0 {
        output.success(&format!(
            "Queued {} link(s), {} already queued",
            report.added, report.skipped
        ));
    } else {
        output.success(&format!("Queued {} link(s)", report.added));
    }
    Ok(())
}

/// Show the queue
pub fn list(store: &AppStore, output: &Output) -> Result<()> {
    output.print_todo(store.todo());
    Ok(())
}

/// Remove links from the queue
pub fn remove(store: &mut AppStore, urls: Vec<String>, output: &Output) -> Result<()> {
    let removed = store
        .todo_remove(&urls)
        .context("Failed to update todo list")?;
    if removed == 0 {
        bail!("No queued link matches the given URL(s)");
    }
    output.success(&format!("Removed {} link(s) from todo", removed));
    Ok(())
}

/// Parse every unparsed link in the queue
pub async fn parse(
    store: &mut AppStore,
    config: &Config,
    no_stream: bool,
    output: &Output,
) -> Result<()> {
    let urls = store.unparsed();
    if urls.is_empty() {
        output.message("Nothing to parse: every queued link is done.");
        return Ok(());
    }

    let options = BatchOptions {
        mark_as_parsed: true,
    };
    let report = run_batch(store, config, &urls, options, no_stream, output).await?;
    output.print_batch(&report.added, report.duplicates, &report.failed);
    Ok(())
}
