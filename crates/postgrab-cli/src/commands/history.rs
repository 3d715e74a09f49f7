//! History command handler

use anyhow::Result;

use super::AppStore;
use crate::output::Output;

/// Show recently requested links, most recent first
pub fn show(store: &AppStore, output: &Output) -> Result<()> {
    output.print_urls(store.history(), "No parse history yet.");
    Ok(())
}
