//! Item command handlers

use anyhow::{bail, Context, Result};

use postgrab_core::{Item, ItemCollection};

use super::AppStore;
use crate::output::Output;

/// List saved items, newest first
pub fn list(store: &AppStore, output: &Output) -> Result<()> {
    let items = newest_first(store.active());
    output.print_items(&items, "No items saved.");
    Ok(())
}

/// Show a single item
pub fn show(store: &AppStore, id: String, output: &Output) -> Result<()> {
    // Fall back to Trash so trashed items can still be inspected
    let collection = if store.find_by_prefix(ItemCollection::Active, &id).is_empty() {
        ItemCollection::Trash
    } else {
        ItemCollection::Active
    };
    let resolved = resolve_id(store, collection, &id)?;

    let item = store
        .get(collection, &resolved)
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", id))?;
    output.print_item(item);
    Ok(())
}

/// Move items to the trash
pub fn delete(store: &mut AppStore, ids: Vec<String>, output: &Output) -> Result<()> {
    let ids = resolve_ids(store, ItemCollection::Active, &ids)?;
    let moved = store.trash_items(&ids).context("Failed to move items to trash")?;
    output.success(&format!("Moved {} item(s) to trash", moved));
    Ok(())
}

/// Items sorted by creation time, newest first
pub fn newest_first(items: &[Item]) -> Vec<Item> {
    let mut items = items.to_vec();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

/// Resolve several ids or id prefixes
pub fn resolve_ids(
    store: &AppStore,
    collection: ItemCollection,
    ids: &[String],
) -> Result<Vec<String>> {
    ids.iter()
        .map(|id| resolve_id(store, collection, id))
        .collect()
}

/// Resolve a full id or unique id prefix
pub fn resolve_id(store: &AppStore, collection: ItemCollection, id: &str) -> Result<String> {
    if store.get(collection, id).is_some() {
        return Ok(id.to_string());
    }

    let matches = store.find_by_prefix(collection, id);
    match matches.len() {
        0 => bail!("No item found matching: {}", id),
        1 => Ok(matches[0].id.clone()),
        _ => {
            eprintln!("Multiple items match '{}':", id);
            for item in &matches {
                eprintln!("  {} - {}", item.id, item.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}
