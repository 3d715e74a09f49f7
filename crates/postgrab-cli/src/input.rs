//! Link input collection
//!
//! Commands that take links accept them as arguments, on stdin, or through
//! $EDITOR. Arguments are pasted into one buffer the same way the link box
//! handles a clipboard paste, so a shared caption collapses to its links.

use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result};

use postgrab_core::merge_clipboard;

use crate::editor::edit_text;

/// Gather the text to extract links from
///
/// Arguments win over stdin; `edit` opens the collected text in $EDITOR
/// for review before it is used.
pub fn collect(args: &[String], edit: bool) -> Result<String> {
    let mut text = paste_all(args);

    if args.is_empty() && !io::stdin().is_terminal() {
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read links from stdin")?;
    }

    if edit {
        text = edit_text(&text)?;
    }

    Ok(text)
}

/// Paste each argument at the end of one buffer
///
/// Arguments carrying links are reduced to those links; anything else is
/// appended on its own line.
pub fn paste_all(args: &[String]) -> String {
    let mut buffer = String::new();
    for arg in args {
        let end = buffer.len();
        match merge_clipboard(&buffer, end..end, arg) {
            Some(edit) => buffer = edit.text,
            None => {
                if !buffer.is_empty() && !buffer.ends_with('\n') {
                    buffer.push('\n');
                }
                buffer.push_str(arg);
            }
        }
    }
    buffer
}
