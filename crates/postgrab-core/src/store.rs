//! Multi-collection store engine
//!
//! The `Store` owns four collections and keeps them consistent:
//! - **Active**: parsed items visible to the user
//! - **Trash**: items moved out of Active (`is_deleted = true`)
//! - **Todo**: queued links with a `parsed` flag
//! - **History**: the last [`HISTORY_LIMIT`] requested URLs, most recent first
//!
//! ## Rules
//!
//! - Keys are unique within a collection, and an item id is never in both
//!   Active and Trash.
//! - Inserting a key that is already stored is dropped (first write wins).
//! - Every mutation writes the touched collection(s) to the backend before
//!   the in-memory state changes, so a failed write leaves the store as it was.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::load(FileStore::new(config.data_dir.clone()))?;
//! store.upsert_all(ItemCollection::Active, parsed_items)?;
//! store.trash_items(&[id])?;
//! ```

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{Collection, Item, ItemCollection, TodoEntry};
use crate::storage::{KeyValueStore, StorageError, StorageResult};

/// Maximum number of URLs kept in History
pub const HISTORY_LIMIT: usize = 30;

/// Outcome of adding links to the Todo queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoAddReport {
    pub added: usize,
    pub skipped: usize,
}

/// Collection sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub active: usize,
    pub trash: usize,
    pub todo: usize,
    pub todo_unparsed: usize,
    pub history: usize,
}

/// Store engine over a key-value backend
pub struct Store<K: KeyValueStore> {
    backend: K,
    active: Vec<Item>,
    trash: Vec<Item>,
    todo: Vec<TodoEntry>,
    history: Vec<String>,
}

impl<K: KeyValueStore> Store<K> {
    /// Load all collections from the backend
    ///
    /// Missing keys and unparsable contents both load as empty collections.
    pub fn load(backend: K) -> StorageResult<Self> {
        let mut store = Self {
            active: read_collection(&backend, Collection::Active)?,
            trash: read_collection(&backend, Collection::Trash)?,
            todo: read_collection(&backend, Collection::Todo)?,
            history: read_collection(&backend, Collection::History)?,
            backend,
        };
        store.repair();
        Ok(store)
    }

    /// Re-read every collection, discarding in-memory state
    pub fn reload(&mut self) -> StorageResult<()> {
        self.active = read_collection(&self.backend, Collection::Active)?;
        self.trash = read_collection(&self.backend, Collection::Trash)?;
        self.todo = read_collection(&self.backend, Collection::Todo)?;
        self.history = read_collection(&self.backend, Collection::History)?;
        self.repair();
        Ok(())
    }

    /// Write every collection to the backend
    pub fn flush(&mut self) -> StorageResult<()> {
        write_collection(&mut self.backend, Collection::Active, &self.active)?;
        write_collection(&mut self.backend, Collection::Trash, &self.trash)?;
        write_collection(&mut self.backend, Collection::Todo, &self.todo)?;
        write_collection(&mut self.backend, Collection::History, &self.history)?;
        Ok(())
    }

    /// Get the storage backend
    pub fn backend(&self) -> &K {
        &self.backend
    }

    /// Consume the store, returning its backend
    pub fn into_backend(self) -> K {
        self.backend
    }

    // ==================== Queries ====================

    pub fn active(&self) -> &[Item] {
        &self.active
    }

    pub fn trash(&self) -> &[Item] {
        &self.trash
    }

    pub fn todo(&self) -> &[TodoEntry] {
        &self.todo
    }

    /// Requested URLs, most recent first
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Items of one collection
    pub fn items(&self, collection: ItemCollection) -> &[Item] {
        match collection {
            ItemCollection::Active => &self.active,
            ItemCollection::Trash => &self.trash,
        }
    }

    /// Get an item by id
    pub fn get(&self, collection: ItemCollection, id: &str) -> Option<&Item> {
        self.items(collection).iter().find(|item| item.id == id)
    }

    /// Items whose id starts with `prefix`
    pub fn find_by_prefix(&self, collection: ItemCollection, prefix: &str) -> Vec<&Item> {
        self.items(collection)
            .iter()
            .filter(|item| item.id.starts_with(prefix))
            .collect()
    }

    /// Todo URLs that have not been parsed yet, in queue order
    pub fn unparsed(&self) -> Vec<String> {
        self.todo
            .iter()
            .filter(|entry| !entry.parsed)
            .map(|entry| entry.url.clone())
            .collect()
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            active: self.active.len(),
            trash: self.trash.len(),
            todo: self.todo.len(),
            todo_unparsed: self.todo.iter().filter(|e| !e.parsed).count(),
            history: self.history.len(),
        }
    }

    // ==================== Item Operations ====================

    /// Insert items whose id is not stored yet
    ///
    /// Items already present in either item collection are dropped, as are
    /// repeats within `items`. Returns the items actually inserted.
    pub fn upsert_all(
        &mut self,
        into: ItemCollection,
        items: impl IntoIterator<Item = Item>,
    ) -> StorageResult<Vec<Item>> {
        let mut seen: HashSet<String> = self
            .active
            .iter()
            .chain(self.trash.iter())
            .map(|item| item.id.clone())
            .collect();

        let mut added = Vec::new();
        for mut item in items {
            item.ensure_id();
            if seen.insert(item.id.clone()) {
                added.push(item);
            }
        }

        if added.is_empty() {
            return Ok(added);
        }

        let mut next = self.items(into).to_vec();
        next.extend(added.iter().cloned());
        write_collection(&mut self.backend, into.into(), &next)?;
        *self.items_mut(into) = next;

        debug!("Inserted {} item(s) into {}", added.len(), Collection::from(into));
        Ok(added)
    }

    /// Move items between collections, applying `transform` to each
    ///
    /// Ids missing from `from` are ignored. If `to` already holds an id, the
    /// existing entry is kept and the moved one is dropped. Returns how many
    /// items left `from`.
    pub fn move_items<F>(
        &mut self,
        ids: &[String],
        from: ItemCollection,
        to: ItemCollection,
        mut transform: F,
    ) -> StorageResult<usize>
    where
        F: FnMut(&mut Item),
    {
        if from == to {
            return Ok(0);
        }

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let (moved, remaining): (Vec<Item>, Vec<Item>) = self
            .items(from)
            .iter()
            .cloned()
            .partition(|item| wanted.contains(item.id.as_str()));

        if moved.is_empty() {
            return Ok(0);
        }

        let mut dest = self.items(to).to_vec();
        let mut present: HashSet<String> = dest.iter().map(|item| item.id.clone()).collect();
        let count = moved.len();
        for mut item in moved {
            if present.insert(item.id.clone()) {
                transform(&mut item);
                dest.push(item);
            }
        }

        // Destination first: an interrupted move leaves a duplicate that
        // `repair` resolves on the next load, never a lost item.
        write_collection(&mut self.backend, to.into(), &dest)?;
        write_collection(&mut self.backend, from.into(), &remaining)?;
        *self.items_mut(to) = dest;
        *self.items_mut(from) = remaining;

        debug!(
            "Moved {} item(s) from {} to {}",
            count,
            Collection::from(from),
            Collection::from(to)
        );
        Ok(count)
    }

    /// Move Active items to Trash
    pub fn trash_items(&mut self, ids: &[String]) -> StorageResult<usize> {
        self.move_items(ids, ItemCollection::Active, ItemCollection::Trash, |item| {
            item.is_deleted = true
        })
    }

    /// Move Trash items back to Active
    pub fn restore_items(&mut self, ids: &[String]) -> StorageResult<usize> {
        self.move_items(ids, ItemCollection::Trash, ItemCollection::Active, |item| {
            item.is_deleted = false
        })
    }

    /// Permanently delete items from Trash
    pub fn purge(&mut self, ids: &[String]) -> StorageResult<usize> {
        self.remove(Collection::Trash, ids)
    }

    /// Permanently delete everything in Trash
    pub fn empty_trash(&mut self) -> StorageResult<usize> {
        let ids: Vec<String> = self.trash.iter().map(|item| item.id.clone()).collect();
        self.remove(Collection::Trash, &ids)
    }

    /// Delete keys from a collection
    ///
    /// Keys are item ids for Active/Trash and URLs for Todo/History.
    /// Returns how many entries were removed.
    pub fn remove(&mut self, collection: Collection, keys: &[String]) -> StorageResult<usize> {
        let keys: HashSet<&str> = keys.iter().map(String::as_str).collect();

        let removed = match collection {
            Collection::Active | Collection::Trash => {
                let which = if collection == Collection::Active {
                    ItemCollection::Active
                } else {
                    ItemCollection::Trash
                };
                let next: Vec<Item> = self
                    .items(which)
                    .iter()
                    .filter(|item| !keys.contains(item.id.as_str()))
                    .cloned()
                    .collect();
                let removed = self.items(which).len() - next.len();
                if removed > 0 {
                    write_collection(&mut self.backend, collection, &next)?;
                    *self.items_mut(which) = next;
                }
                removed
            }
            Collection::Todo => {
                let next: Vec<TodoEntry> = self
                    .todo
                    .iter()
                    .filter(|entry| !keys.contains(entry.url.as_str()))
                    .cloned()
                    .collect();
                let removed = self.todo.len() - next.len();
                if removed > 0 {
                    write_collection(&mut self.backend, collection, &next)?;
                    self.todo = next;
                }
                removed
            }
            Collection::History => {
                let next: Vec<String> = self
                    .history
                    .iter()
                    .filter(|url| !keys.contains(url.as_str()))
                    .cloned()
                    .collect();
                let removed = self.history.len() - next.len();
                if removed > 0 {
                    write_collection(&mut self.backend, collection, &next)?;
                    self.history = next;
                }
                removed
            }
        };

        if removed > 0 {
            debug!("Removed {} entr(ies) from {}", removed, collection);
        }
        Ok(removed)
    }

    // ==================== Todo Operations ====================

    /// Queue links, skipping any URL already in Todo
    pub fn todo_add(&mut self, urls: &[String]) -> StorageResult<TodoAddReport> {
        let mut known: HashSet<&str> = self.todo.iter().map(|e| e.url.as_str()).collect();
        let mut fresh = Vec::new();
        let mut report = TodoAddReport::default();

        for url in urls {
            if known.insert(url.as_str()) {
                fresh.push(TodoEntry::new(url.clone()));
                report.added += 1;
            } else {
                report.skipped += 1;
            }
        }

        if !fresh.is_empty() {
            let mut next = self.todo.clone();
            next.extend(fresh);
            write_collection(&mut self.backend, Collection::Todo, &next)?;
            self.todo = next;
        }

        Ok(report)
    }

    /// Remove links from Todo
    pub fn todo_remove(&mut self, urls: &[String]) -> StorageResult<usize> {
        self.remove(Collection::Todo, urls)
    }

    /// Flag queued URLs as parsed
    ///
    /// URLs not in Todo are ignored; the flag is never cleared.
    pub fn mark_parsed<'a>(
        &mut self,
        urls: impl IntoIterator<Item = &'a str>,
    ) -> StorageResult<usize> {
        let urls: HashSet<&str> = urls.into_iter().collect();

        let mut changed = 0;
        let next: Vec<TodoEntry> = self
            .todo
            .iter()
            .map(|entry| {
                if !entry.parsed && urls.contains(entry.url.as_str()) {
                    changed += 1;
                    TodoEntry {
                        url: entry.url.clone(),
                        parsed: true,
                    }
                } else {
                    entry.clone()
                }
            })
            .collect();

        if changed > 0 {
            write_collection(&mut self.backend, Collection::Todo, &next)?;
            self.todo = next;
        }
        Ok(changed)
    }

    // ==================== History ====================

    /// Record requested URLs, most recent first
    ///
    /// `urls` are treated as requested together, in the given order; older
    /// entries for the same URLs are dropped and the list is capped at
    /// [`HISTORY_LIMIT`].
    pub fn record_history(&mut self, urls: &[String]) -> StorageResult<()> {
        let mut seen = HashSet::new();
        let mut next: Vec<String> = urls
            .iter()
            .filter(|url| seen.insert(url.as_str()))
            .cloned()
            .collect();
        next.extend(
            self.history
                .iter()
                .filter(|url| !seen.contains(url.as_str()))
                .cloned(),
        );
        next.truncate(HISTORY_LIMIT);

        if next != self.history {
            write_collection(&mut self.backend, Collection::History, &next)?;
            self.history = next;
        }
        Ok(())
    }

    // ==================== Internals ====================

    fn items_mut(&mut self, collection: ItemCollection) -> &mut Vec<Item> {
        match collection {
            ItemCollection::Active => &mut self.active,
            ItemCollection::Trash => &mut self.trash,
        }
    }

    /// Restore in-memory invariants after loading
    ///
    /// Drops duplicate keys within each collection and any Trash item that is
    /// also Active. Only memory is touched; the next write persists the fix.
    fn repair(&mut self) {
        let before = self.counts();

        dedup_by_key(&mut self.active, |item| item.id.clone());
        dedup_by_key(&mut self.trash, |item| item.id.clone());
        dedup_by_key(&mut self.todo, |entry| entry.url.clone());
        dedup_by_key(&mut self.history, |url| url.clone());
        self.history.truncate(HISTORY_LIMIT);

        let active: HashSet<&str> = self.active.iter().map(|i| i.id.as_str()).collect();
        self.trash.retain(|item| !active.contains(item.id.as_str()));

        for item in &mut self.active {
            item.is_deleted = false;
        }
        for item in &mut self.trash {
            item.is_deleted = true;
        }

        if before != self.counts() {
            warn!("Repaired stored collections: {:?} -> {:?}", before, self.counts());
        }
    }
}

/// Read one collection, treating unparsable data as empty
fn read_collection<K, T>(backend: &K, collection: Collection) -> StorageResult<Vec<T>>
where
    K: KeyValueStore,
    T: DeserializeOwned,
{
    let Some(bytes) = backend.get(collection.storage_key())? else {
        return Ok(Vec::new());
    };

    match serde_json::from_slice(&bytes) {
        Ok(values) => Ok(values),
        Err(e) => {
            warn!(
                "Stored {} collection is unreadable, starting empty: {}",
                collection, e
            );
            Ok(Vec::new())
        }
    }
}

fn write_collection<K, T>(backend: &mut K, collection: Collection, values: &[T]) -> StorageResult<()>
where
    K: KeyValueStore,
    T: Serialize,
{
    let key = collection.storage_key();
    let bytes = serde_json::to_vec(values).map_err(|source| StorageError::Serialize {
        key: key.to_string(),
        source,
    })?;
    backend.set(key, &bytes)
}

fn dedup_by_key<T, F>(values: &mut Vec<T>, mut key: F)
where
    F: FnMut(&T) -> String,
{
    let mut seen = HashSet::new();
    values.retain(|value| seen.insert(key(value)));
}
