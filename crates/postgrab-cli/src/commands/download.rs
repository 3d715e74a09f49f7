//! Download command handler
//!
//! Archives are fetched strictly one at a time, pausing between items so the
//! parser service is not asked for several image bundles at once.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use postgrab_core::{Archive, Config, ItemCollection, ParserClient};

use super::items::resolve_ids;
use super::AppStore;
use crate::output::Output;

/// Download archives for the given items
pub async fn run(
    store: &AppStore,
    config: &Config,
    ids: Vec<String>,
    images: Option<Vec<usize>>,
    output: &Output,
) -> Result<()> {
    let ids = resolve_ids(store, ItemCollection::Active, &ids)?;
    let client = ParserClient::from_config(config).context("Failed to create parser client")?;
    let dir = config.download_path();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create download directory {:?}", dir))?;

    let delay = Duration::from_millis(config.download_delay_ms);
    let mut saved = Vec::new();
    let mut failed = 0;

    for (index, id) in ids.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let Some(item) = store.get(ItemCollection::Active, id) else {
            continue;
        };

        let selection = images.as_deref().map(|wanted| valid_indices(wanted, item.images.len()));
        let result = client
            .download_archive(item, selection.as_deref())
            .await
            .context("Download failed")
            .and_then(|archive| write_archive(&dir, &archive));

        match result {
            Ok(path) => {
                info!("Saved archive for {} to {:?}", item.url, path);
                output.message(&format!("✓ {} → {}", item.short_id(), path.display()));
                saved.push(path);
            }
            Err(e) => {
                warn!("Archive download failed for {}: {:#}", item.url, e);
                output.warn(&format!("{}: {:#}", item.short_id(), e));
                failed += 1;
            }
        }
    }

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({"saved": saved, "failed": failed})
        );
    } else if failed > 0 {
        output.message(&format!("{} saved, {} failed", saved.len(), failed));
    } else {
        output.success(&format!("Downloaded {} archive(s)", saved.len()));
    }
    Ok(())
}

/// Drop out-of-range and repeated image indices, keeping order
fn valid_indices(wanted: &[usize], count: usize) -> Vec<usize> {
    let mut indices = Vec::new();
    for &index in wanted {
        if index < count && !indices.contains(&index) {
            indices.push(index);
        }
    }
    indices
}

/// Write an archive without clobbering an existing file
fn write_archive(dir: &Path, archive: &Archive) -> Result<PathBuf> {
    let path = unique_path(dir, &archive.filename);
    fs::write(&path, &archive.bytes).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

/// `dir/name`, or `dir/name (n).ext` if that is taken
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{}", ext)),
        _ => (name, String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
