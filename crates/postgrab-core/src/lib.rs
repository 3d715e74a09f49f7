//! postgrab Core Library
//!
//! This crate provides the core functionality for postgrab, a local-first
//! collector for social post links: it pulls post URLs out of pasted text,
//! sends them to a remote parser service in batches, and keeps the parsed
//! posts in a small set of persistent collections.
//!
//! # Architecture
//!
//! - **Extraction**: `extract` recognises post links; `paste` rewrites text-box
//!   edits so that pasted captions collapse to their links.
//! - **Parsing**: `parser` talks to the remote service, `stream` reassembles the
//!   streamed progress events and `batch` drives one batch end to end.
//! - **Storage**: `store` keeps the Active, Trash, Todo and History collections
//!   consistent on top of a pluggable key-value backend from `storage`.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let mut store = Store::load(FileStore::new(config.data_dir.clone()))?;
//! let parser = BatchParser::new(ParserClient::from_config(&config)?);
//!
//! let urls = extract_links(&pasted_text);
//! let report = parser.run(&mut store, &urls, BatchOptions::default()).await?;
//! ```
//!
//! # Modules
//!
//! - `config`: Application configuration
//! - `models`: Items, todo entries and parse failures
//! - `extract`: Post link recognition
//! - `paste`: Paste-merge editing helpers
//! - `stream`: Streamed progress/result decoder
//! - `parser`: HTTP client for the remote parser service
//! - `batch`: Batch parse orchestration
//! - `storage`: Key-value persistence backends
//! - `store`: Multi-collection store engine

pub mod batch;
pub mod config;
pub mod extract;
pub mod models;
pub mod parser;
pub mod paste;
pub mod storage;
pub mod store;
pub mod stream;

pub use batch::{BatchError, BatchOptions, BatchParser, BatchProgress, BatchReport};
pub use config::Config;
pub use extract::extract_links;
pub use models::{Collection, Item, ItemCollection, ParseFailure, ParsedNote, TodoEntry};
pub use parser::{Archive, ParseOutcome, ParserClient, RequestError};
pub use paste::{merge_clipboard, merge_paste, PasteEdit};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::{Store, StoreCounts, TodoAddReport, HISTORY_LIMIT};
pub use stream::{ParseEvent, StreamDecoder};
