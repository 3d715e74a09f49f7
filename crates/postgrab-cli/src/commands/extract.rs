//! Extract command handler

use anyhow::Result;

use postgrab_core::extract_links;

use crate::input;
use crate::output::Output;

/// Print the post links found in the input
pub fn run(text: Vec<String>, output: &Output) -> Result<()> {
    let text = input::collect(&text, false)?;
    let links = extract_links(&text);
    output.print_urls(&links, "No post links found.");
    Ok(())
}
