//! Interactive editing support
//!
//! Opens $EDITOR on a scratch file for reviewing a link list, and asks for
//! confirmation before destructive commands.

use std::env;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tempfile::Builder;

const HINT: &str = "\
# Paste or edit post links, one per line. Text around them is ignored.
# Lines starting with '#' are removed. Leave no links to abort.
";

/// Let the user review `links` in their editor
///
/// The file is seeded with a comment header that is stripped again on read.
pub fn edit_text(links: &str) -> Result<String> {
    let editor = editor_command();

    let mut file = Builder::new()
        .prefix("postgrab_links_")
        .suffix(".txt")
        .tempfile()
        .context("Failed to create temp file for editing")?;
    write!(file, "{}{}", HINT, links).context("Failed to write temp file")?;
    file.flush()?;

    let status = Command::new(&editor)
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor))?;
    if !status.success() {
        bail!("Editor '{}' exited with {}", editor, status);
    }

    // Editors may replace the file rather than write through our handle
    let edited = fs::read_to_string(file.path()).context("Failed to read edited links")?;
    Ok(strip_comments(&edited))
}

/// $EDITOR, then $VISUAL, then vi
fn editor_command() -> String {
    ["EDITOR", "VISUAL"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// Drop `#` comment lines
fn strip_comments(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for confirmation
///
/// Returns false without prompting when stdin is not a terminal.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
