//! Command handlers

pub mod config;
pub mod download;
pub mod extract;
pub mod history;
pub mod items;
pub mod parse;
pub mod status;
pub mod todo;
pub mod trash;

use postgrab_core::{FileStore, Store};

/// Store type used by the CLI
pub type AppStore = Store<FileStore>;
