//! Batch parse orchestration
//!
//! Drives one batch end to end: request, decode the streamed events while
//! publishing progress, then apply the result to the store.
//!
//! Only one batch runs at a time: `run` borrows the store mutably for the
//! whole batch, so a second batch against the same store cannot start until
//! the first has resolved.

use std::collections::HashSet;

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::{Item, ItemCollection, ParseFailure};
use crate::parser::{ParseOutcome, ParserClient, RequestError};
use crate::storage::{KeyValueStore, StorageError};
use crate::store::Store;
use crate::stream::{ParseEvent, StreamDecoder};

/// Errors that abort a batch
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Failed to save parse results: {0}")]
    Storage(#[from] StorageError),

    /// Items reached Active but a later write failed
    #[error("Saved {} item(s) but failed to update the todo queue: {source}", .added.len())]
    PartiallySaved {
        added: Vec<Item>,
        #[source]
        source: StorageError,
    },
}

/// Per-batch options
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Flag matching Todo entries as parsed when their URL succeeds
    pub mark_as_parsed: bool,
}

/// Latest progress reported by the parser service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub current: u64,
    pub total: u64,
}

impl BatchProgress {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.current >= self.total
    }
}

/// Result of a finished batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Items that were new to the store
    pub added: Vec<Item>,
    /// Items the service parsed that were already stored
    pub duplicates: usize,
    /// URLs the service could not parse
    pub failed: Vec<ParseFailure>,
}

/// Batch parse orchestrator
pub struct BatchParser {
    client: ParserClient,
    streaming: bool,
    progress: watch::Sender<BatchProgress>,
    progress_rx: watch::Receiver<BatchProgress>,
}

impl BatchParser {
    /// Create an orchestrator using the streamed endpoint
    pub fn new(client: ParserClient) -> Self {
        let (progress, progress_rx) = watch::channel(BatchProgress::default());
        Self {
            client,
            streaming: true,
            progress,
            progress_rx,
        }
    }

    /// Choose between the streamed and the single-response endpoint
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn client(&self) -> &ParserClient {
        &self.client
    }

    /// Current progress
    pub fn progress(&self) -> BatchProgress {
        *self.progress_rx.borrow()
    }

    /// Subscribe to progress updates
    pub fn subscribe_progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    /// Parse a batch of URLs and store the results
    ///
    /// URLs are deduplicated before the request. A request failure aborts the
    /// batch before anything is written; per-URL failures are only reported.
    pub async fn run<K: KeyValueStore>(
        &self,
        store: &mut Store<K>,
        urls: &[String],
        options: BatchOptions,
    ) -> Result<BatchReport, BatchError> {
        let urls = dedup_urls(urls);
        if urls.is_empty() {
            return Err(RequestError::EmptyBatch.into());
        }

        info!("Starting batch of {} url(s)", urls.len());
        self.progress.send_replace(BatchProgress {
            current: 0,
            total: urls.len() as u64,
        });

        let outcome = if self.streaming {
            let body = self.client.parse_stream(&urls).await?;
            self.consume(body).await?
        } else {
            self.client.parse(&urls).await?
        };

        let report = apply(store, &urls, outcome, options)?;

        let total = urls.len() as u64;
        self.progress.send_replace(BatchProgress {
            current: total,
            total,
        });

        info!(
            "Batch finished: {} added, {} duplicate(s), {} failed",
            report.added.len(),
            report.duplicates,
            report.failed.len()
        );
        Ok(report)
    }

    /// Decode a streamed body into the batch outcome
    ///
    /// Progress events are published as they arrive. The last `done` event
    /// wins; a stream that never sends one yields an empty outcome.
    pub async fn consume<S>(&self, mut body: S) -> Result<ParseOutcome, RequestError>
    where
        S: Stream<Item = Result<Vec<u8>, RequestError>> + Unpin,
    {
        let mut decoder = StreamDecoder::new();
        let mut outcome = None;

        while let Some(chunk) = body.next().await {
            decoder.push(&chunk?);
            self.handle_events(&mut decoder, &mut outcome);
        }
        decoder.finish();
        self.handle_events(&mut decoder, &mut outcome);

        if decoder.discarded() > 0 {
            debug!("Discarded {} malformed frame(s)", decoder.discarded());
        }

        Ok(outcome.unwrap_or_else(|| {
            warn!("Stream ended without a result; treating batch as empty");
            ParseOutcome::default()
        }))
    }

    fn handle_events(&self, decoder: &mut StreamDecoder, outcome: &mut Option<ParseOutcome>) {
        for event in decoder.drain() {
            match event {
                ParseEvent::Progress { current, total } => {
                    debug!("Progress {}/{}", current, total);
                    self.progress.send_replace(BatchProgress { current, total });
                }
                ParseEvent::Done { notes, failed } => {
                    debug!("Result: {} parsed, {} failed", notes.len(), failed.len());
                    *outcome = Some(ParseOutcome { notes, failed });
                }
            }
        }
    }
}

/// Apply a batch outcome to the store
///
/// Every requested URL goes to History first, then parsed items enter Active
/// (already-stored ids are dropped) and their URLs are optionally marked
/// parsed in Todo. A failure after Active was written still reports the
/// items it added.
pub fn apply<K: KeyValueStore>(
    store: &mut Store<K>,
    urls: &[String],
    outcome: ParseOutcome,
    options: BatchOptions,
) -> Result<BatchReport, BatchError> {
    let ParseOutcome { notes, failed } = outcome;
    let parsed = notes.len();

    let now = Utc::now();
    let fresh: Vec<Item> = notes.into_iter().map(|note| note.into_item(now)).collect();

    // Marked by the URLs the service parsed, including ones already stored
    let succeeded: Vec<String> = fresh.iter().map(|item| item.url.clone()).collect();

    store.record_history(urls)?;

    let added = store.upsert_all(ItemCollection::Active, fresh)?;

    if options.mark_as_parsed {
        match store.mark_parsed(succeeded.iter().map(String::as_str)) {
            Ok(marked) => debug!("Marked {} todo entr(ies) as parsed", marked),
            Err(source) => {
                warn!("Saved {} item(s) but could not update todo", added.len());
                return Err(BatchError::PartiallySaved { added, source });
            }
        }
    }

    Ok(BatchReport {
        duplicates: parsed - added.len(),
        added,
        failed,
    })
}

/// Drop repeated URLs, keeping first occurrences in order
pub fn dedup_urls(urls: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty() && seen.insert(*url))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Collection, ParsedNote, TodoEntry};
    use crate::storage::{MemoryStore, StorageResult};
    use futures_util::stream;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn parser() -> BatchParser {
        BatchParser::new(ParserClient::new("http://127.0.0.1:9").unwrap())
    }

    /// Backend that refuses writes to one key
    struct FailingStore {
        inner: MemoryStore,
        fail_key: &'static str,
    }

    impl KeyValueStore for FailingStore {
        fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &[u8]) -> StorageResult<()> {
            if key == self.fail_key {
                return Err(StorageError::InvalidKey(key.to_string()));
            }
            self.inner.set(key, value)
        }
    }

    fn chunks(
        parts: &[&str],
    ) -> impl Stream<Item = Result<Vec<u8>, RequestError>> + Unpin {
        let parts: Vec<Result<Vec<u8>, RequestError>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(parts)
    }

    #[tokio::test]
    async fn test_consume_publishes_progress_and_result() {
        let parser = parser();
        let rx = parser.subscribe_progress();

        let body = chunks(&[
            "data: {\"type\":\"progress\",\"current\":1,\"total\":2}\n\nda",
            "ta: {\"type\":\"progress\",\"current\":2,\"total\":2}\n\n",
            "data: {\"type\":\"done\",\"notes\":[{\"url\":\"https://xhslink.com/a\"}],\"failed\":[{\"url\":\"https://xhslink.com/b\",\"error\":\"gone\"}]}\n\n",
        ]);

        let outcome = parser.consume(body).await.unwrap();
        assert_eq!(outcome.notes.len(), 1);
        assert_eq!(outcome.failed[0].error, "gone");
        assert_eq!(*rx.borrow(), BatchProgress { current: 2, total: 2 });
    }

    #[tokio::test]
    async fn test_consume_without_done_is_empty() {
        let parser = parser();
        let body = chunks(&["data: {\"type\":\"progress\",\"current\":1,\"total\":4}\n\n"]);

        let outcome = parser.consume(body).await.unwrap();
        assert_eq!(outcome, ParseOutcome::default());
        assert_eq!(parser.progress(), BatchProgress { current: 1, total: 4 });
    }

    #[tokio::test]
    async fn test_consume_tolerates_missing_trailing_separator() {
        let parser = parser();
        let body = chunks(&[
            "garbage\n\n",
            "data: {\"type\":\"done\",\"notes\":[{\"url\":\"https://xhslink.com/a\"}],\"failed\":[]}",
        ]);

        let outcome = parser.consume(body).await.unwrap();
        assert_eq!(outcome.notes.len(), 1);
        assert_eq!(outcome.notes[0].url, "https://xhslink.com/a");
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn test_consume_propagates_body_error() {
        let parser = parser();
        let body = stream::iter(vec![
            Ok(b"data: {\"type\":\"progress\",\"current\":1,\"total\":2}\n\n".to_vec()),
            Err(RequestError::InvalidResponse("reset".to_string())),
        ]);

        let result = parser.consume(body).await;
        assert!(matches!(result, Err(RequestError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_run_rejects_empty_batch() {
        let parser = parser();
        let mut store = Store::load(MemoryStore::new()).unwrap();

        let result = parser.run(&mut store, &urls(&["  "]), BatchOptions::default()).await;
        assert!(matches!(
            result,
            Err(BatchError::Request(RequestError::EmptyBatch))
        ));
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_apply_stores_items_and_history() {
        let mut store = Store::load(MemoryStore::new()).unwrap();
        store
            .todo_add(&urls(&["https://xhslink.com/a", "https://xhslink.com/b"]))
            .unwrap();

        let outcome = ParseOutcome {
            notes: vec![ParsedNote::new("https://xhslink.com/a")],
            failed: vec![ParseFailure {
                url: "https://xhslink.com/b".to_string(),
                error: "timeout".to_string(),
            }],
        };

        let requested = urls(&["https://xhslink.com/a", "https://xhslink.com/b"]);
        let report = apply(
            &mut store,
            &requested,
            outcome,
            BatchOptions {
                mark_as_parsed: true,
            },
        )
        .unwrap();

        assert_eq!(report.added.len(), 1);
        assert!(!report.added[0].is_deleted);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(store.active().len(), 1);
        assert_eq!(store.history(), requested.as_slice());
        assert_eq!(
            store.todo(),
            &[
                TodoEntry {
                    url: "https://xhslink.com/a".to_string(),
                    parsed: true
                },
                TodoEntry::new("https://xhslink.com/b"),
            ]
        );
    }

    #[test]
    fn test_apply_counts_duplicates_and_keeps_first_content() {
        let mut store = Store::load(MemoryStore::new()).unwrap();
        let first = ParsedNote {
            title: "first".to_string(),
            ..ParsedNote::new("https://xhslink.com/a")
        };
        apply(
            &mut store,
            &urls(&["https://xhslink.com/a"]),
            ParseOutcome {
                notes: vec![first],
                failed: vec![],
            },
            BatchOptions::default(),
        )
        .unwrap();

        let again = ParsedNote {
            title: "second".to_string(),
            ..ParsedNote::new("https://xhslink.com/a")
        };
        let report = apply(
            &mut store,
            &urls(&["https://xhslink.com/a"]),
            ParseOutcome {
                notes: vec![again],
                failed: vec![],
            },
            BatchOptions::default(),
        )
        .unwrap();

        assert!(report.added.is_empty());
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.active()[0].title, "first");
    }

    #[test]
    fn test_apply_without_marking_leaves_todo() {
        let mut store = Store::load(MemoryStore::new()).unwrap();
        store.todo_add(&urls(&["https://xhslink.com/a"])).unwrap();

        apply(
            &mut store,
            &urls(&["https://xhslink.com/a"]),
            ParseOutcome {
                notes: vec![ParsedNote::new("https://xhslink.com/a")],
                failed: vec![],
            },
            BatchOptions::default(),
        )
        .unwrap();

        assert_eq!(store.unparsed(), urls(&["https://xhslink.com/a"]));
    }

    #[test]
    fn test_apply_reports_saved_items_when_todo_write_fails() {
        let todo = r#"[{"url":"https://xhslink.com/a","parsed":false}]"#;
        let backend = FailingStore {
            inner: MemoryStore::new().with_entry(Collection::Todo.storage_key(), todo),
            fail_key: Collection::Todo.storage_key(),
        };
        let mut store = Store::load(backend).unwrap();

        let requested = urls(&["https://xhslink.com/a"]);
        let result = apply(
            &mut store,
            &requested,
            ParseOutcome {
                notes: vec![ParsedNote::new("https://xhslink.com/a")],
                failed: vec![],
            },
            BatchOptions {
                mark_as_parsed: true,
            },
        );

        match result {
            Err(BatchError::PartiallySaved { added, .. }) => {
                assert_eq!(added.len(), 1);
                assert_eq!(added[0].url, "https://xhslink.com/a");
            }
            other => panic!("expected a partial save, got {:?}", other),
        }
        assert_eq!(store.history(), requested.as_slice());
        assert_eq!(store.active().len(), 1);
        assert_eq!(store.unparsed(), requested);
    }

    #[test]
    fn test_dedup_urls() {
        assert_eq!(
            dedup_urls(&urls(&["b", "a", "b", " a ", ""])),
            urls(&["b", "a"])
        );
    }

    #[test]
    fn test_progress_complete() {
        assert!(!BatchProgress::default().is_complete());
        assert!(BatchProgress { current: 3, total: 3 }.is_complete());
    }
}
