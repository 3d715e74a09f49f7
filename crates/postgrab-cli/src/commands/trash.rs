//! Trash command handlers

use anyhow::{Context, Result};

use postgrab_core::ItemCollection;

use super::items::{newest_first, resolve_ids};
use super::AppStore;
use crate::editor::confirm;
use crate::output::Output;

/// List trashed items
pub fn list(store: &AppStore, output: &Output) -> Result<()> {
    let items = newest_first(store.trash());
    output.print_items(&items, "Trash is empty.");
    Ok(())
}

/// Move items back out of the trash
pub fn restore(store: &mut AppStore, ids: Vec<String>, output: &Output) -> Result<()> {
    let ids = resolve_ids(store, ItemCollection::Trash, &ids)?;
    let restored = store
        .restore_items(&ids)
        .context("Failed to restore items")?;
    output.success(&format!("Restored {} item(s)", restored));
    Ok(())
}

/// Permanently delete trashed items
pub fn purge(store: &mut AppStore, ids: Vec<String>, output: &Output) -> Result<()> {
    let ids = resolve_ids(store, ItemCollection::Trash, &ids)?;

    if output.should_prompt() {
        println!("Permanently delete {} item(s):", ids.len());
        for id in &ids {
            if let Some(item) = store.get(ItemCollection::Trash, id) {
                println!("  {} - {}", item.short_id(), item.title);
            }
        }
        if !confirm("This cannot be undone. Continue?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let purged = store.purge(&ids).context("Failed to purge items")?;
    output.success(&format!("Permanently deleted {} item(s)", purged));
    Ok(())
}

/// Permanently delete everything in the trash
pub fn empty(store: &mut AppStore, output: &Output) -> Result<()> {
    let count = store.trash().len();
    if count == 0 {
        output.message("Trash is already empty.");
        return Ok(());
    }

    if output.should_prompt()
        && !confirm(&format!("Permanently delete {} trashed item(s)?", count))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let purged = store.empty_trash().context("Failed to empty trash")?;
    output.success(&format!("Emptied trash ({} item(s))", purged));
    Ok(())
}
