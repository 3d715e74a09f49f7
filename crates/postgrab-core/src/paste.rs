//! Paste-merge editing helpers
//!
//! When a user pastes a shared post caption into the link box, only the
//! links should land in the text. Two entry points cover the two ways a
//! paste reaches an editor:
//!
//! - [`merge_clipboard`]: the clipboard payload is seen before insertion.
//! - [`merge_paste`]: only the value before and after the edit is known
//!   (e.g. a context-menu paste that bypasses the paste event).
//!
//! All offsets are byte offsets into the UTF-8 text. Offsets that fall inside
//! a character are moved back to the previous character boundary.

use std::ops::Range;

use crate::extract::{contains_link, extract_links};

/// Minimum growth (in characters) for an edit to be treated as a paste
pub const IMPLICIT_PASTE_THRESHOLD: usize = 30;

/// Text-box content and caret after a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteEdit {
    pub text: String,
    pub caret: usize,
}

impl PasteEdit {
    fn verbatim(text: &str, caret: usize) -> Self {
        Self {
            text: text.to_string(),
            caret: floor_boundary(text, caret),
        }
    }
}

/// Merge a clipboard payload into `current` at `selection`
///
/// Returns `None` when the payload has no links; the editor should then
/// insert it normally. Otherwise the selection is replaced by the extracted
/// links, one per line, and the caret lands right after them.
pub fn merge_clipboard(current: &str, selection: Range<usize>, clipboard: &str) -> Option<PasteEdit> {
    let links = extract_links(clipboard);
    if links.is_empty() {
        return None;
    }

    let start = floor_boundary(current, selection.start);
    let end = floor_boundary(current, selection.end.max(start));
    let before = &current[..start];
    let after = &current[end..];

    let leading = if !current.is_empty() && start > 0 && !before.ends_with('\n') {
        "\n"
    } else {
        ""
    };
    let block = links.join("\n");
    let trailing = if !after.is_empty() && !after.starts_with('\n') {
        "\n"
    } else {
        ""
    };

    let caret = before.len() + leading.len() + block.len();
    let text = [before, leading, &block, trailing, after].concat();
    Some(PasteEdit { text, caret })
}

/// Reconcile an edit that may have been a paste
///
/// `caret` is the caret position in `new` after the edit. If the edit grew
/// the text by at least [`IMPLICIT_PASTE_THRESHOLD`] characters, introduced
/// new links, and the appended block mixes prose with links, the line being
/// edited is replaced by the new links. Anything else is returned verbatim.
pub fn merge_paste(old: &str, new: &str, caret: usize) -> PasteEdit {
    if new.chars().count() < old.chars().count() + IMPLICIT_PASTE_THRESHOLD {
        return PasteEdit::verbatim(new, caret);
    }

    let old_links = extract_links(old);
    let new_links = extract_links(new);
    if new_links.len() <= old_links.len() {
        return PasteEdit::verbatim(new, caret);
    }

    let delta = &new[floor_boundary(new, old.len())..];
    let has_prose = delta.split('\n').any(|line| {
        let line = line.trim();
        !line.is_empty() && !contains_link(line)
    });
    if !has_prose {
        return PasteEdit::verbatim(new, caret);
    }

    let fresh: Vec<String> = new_links
        .into_iter()
        .filter(|link| !old_links.contains(link))
        .collect();
    if fresh.is_empty() {
        return PasteEdit::verbatim(new, caret);
    }

    let caret = floor_boundary(new, caret);
    let (before, after) = new.split_at(caret);
    let kept = match before.rfind('\n') {
        Some(idx) => &before[..=idx],
        None => "",
    };
    let block = fresh.join("\n");
    let trailing = if !after.is_empty() && !after.starts_with('\n') {
        "\n"
    } else {
        ""
    };

    PasteEdit {
        caret: kept.len() + block.len(),
        text: [kept, &block, trailing, after].concat(),
    }
}

/// Clamp `index` into `text` and back off to a character boundary
fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
