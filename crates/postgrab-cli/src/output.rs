//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use postgrab_core::{Item, ParseFailure, TodoEntry};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single item
    pub fn print_item(&self, item: &Item) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", item.id);
                println!("Title:   {}", display_title(item));
                println!("URL:     {}", item.url);
                if !item.tags.is_empty() {
                    println!("Tags:    {}", item.tags.join(", "));
                }
                println!("Images:  {}", item.images.len());
                println!("Created: {}", item.created_at.format("%Y-%m-%d %H:%M"));
                if item.is_deleted {
                    println!("Status:  in trash");
                }

                if !item.content.is_empty() {
                    println!();
                    println!("{}", item.content);
                }

                if !item.images.is_empty() {
                    println!();
                    println!("── Images ({}) ──", item.images.len());
                    for (index, image) in item.images.iter().enumerate() {
                        println!("[{}] {}", index, image);
                    }
                }
            }
            OutputFormat::Json => print_json(item),
            OutputFormat::Quiet => {
                println!("{}", item.id);
            }
        }
    }

    /// Print a list of items
    pub fn print_items(&self, items: &[Item], empty_message: &str) {
        match self.format {
            OutputFormat::Human => {
                if items.is_empty() {
                    println!("{}", empty_message);
                    return;
                }
                for item in items {
                    println!(
                        "{} | {} | {}",
                        item.short_id(),
                        truncate(display_title(item), 35),
                        truncate(&item.url, 45)
                    );
                }
                println!("\n{} item(s)", items.len());
            }
            OutputFormat::Json => print_json(&items),
            OutputFormat::Quiet => {
                for item in items {
                    println!("{}", item.id);
                }
            }
        }
    }

    /// Print the todo queue
    pub fn print_todo(&self, entries: &[TodoEntry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("Todo list is empty.");
                    return;
                }
                for entry in entries {
                    let mark = if entry.parsed { "x" } else { " " };
                    println!("[{}] {}", mark, entry.url);
                }
                let pending = entries.iter().filter(|e| !e.parsed).count();
                println!("\n{} link(s), {} unparsed", entries.len(), pending);
            }
            OutputFormat::Json => print_json(&entries),
            OutputFormat::Quiet => {
                for entry in entries.iter().filter(|e| !e.parsed) {
                    println!("{}", entry.url);
                }
            }
        }
    }

    /// Print a plain list of URLs
    pub fn print_urls(&self, urls: &[String], empty_message: &str) {
        match self.format {
            OutputFormat::Human => {
                if urls.is_empty() {
                    println!("{}", empty_message);
                    return;
                }
                for url in urls {
                    println!("{}", url);
                }
            }
            OutputFormat::Json => print_json(&urls),
            OutputFormat::Quiet => {
                for url in urls {
                    println!("{}", url);
                }
            }
        }
    }

    /// Print the outcome of a parse batch
    pub fn print_batch(&self, added: &[Item], duplicates: usize, failed: &[ParseFailure]) {
        match self.format {
            OutputFormat::Human => {
                if !added.is_empty() {
                    println!("✓ Added {} item(s)", added.len());
                    for item in added {
                        println!("  {} | {}", item.short_id(), truncate(display_title(item), 60));
                    }
                }
                if duplicates > 0 {
                    println!("{} already saved", duplicates);
                }
                if !failed.is_empty() {
                    println!("✗ {} link(s) failed", failed.len());
                    for failure in failed {
                        println!("  {} ({})", failure.url, failure.error);
                    }
                }
                if added.is_empty() && duplicates == 0 && failed.is_empty() {
                    println!("Nothing was parsed.");
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "added": added,
                        "duplicates": duplicates,
                        "failed": failed,
                    })
                );
            }
            OutputFormat::Quiet => {
                for item in added {
                    println!("{}", item.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr
    pub fn warn(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

/// Title, or a placeholder for untitled posts
fn display_title(item: &Item) -> &str {
    if item.title.trim().is_empty() {
        "(untitled)"
    } else {
        &item.title
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
