//! Inspect command implementation.

use chatsync_store::{PersistenceManager, Store, UserStats};
use serde::Serialize;
use std::path::Path;

/// Storage inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Storage file path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Per-token counts. Tokens are shortened to a prefix.
    pub tokens: Vec<TokenStats>,
    /// Totals over all tokens.
    pub totals: UserStats,
}

/// Counts for one token.
#[derive(Debug, Serialize)]
pub struct TokenStats {
    /// Shortened token.
    pub token: String,
    /// Counts.
    #[serde(flatten)]
    pub stats: UserStats,
}

/// Reads the storage file and counts its records.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let persistence = PersistenceManager::new(path);
    let map = persistence
        .load()?
        .ok_or_else(|| format!("No storage file found at {}", path.display()))?;
    let file_size = std::fs::metadata(path)?.len();

    let store = Store::from_map(map);
    let mut totals = UserStats::default();
    let tokens = store
        .stats()
        .into_iter()
        .map(|(token, stats)| {
            totals.conversations += stats.conversations;
            totals.messages += stats.messages;
            totals.tombstones += stats.tombstones;
            totals.modified += stats.modified;
            TokenStats {
                token: token.to_string(),
                stats,
            }
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size,
        tokens,
        totals,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text(&result),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn print_text(result: &InspectResult) {
    println!("Storage: {}", result.path);
    println!("Size:    {} bytes", result.file_size);
    println!("Tokens:  {}", result.tokens.len());
    println!();
    println!(
        "  {:<10} {:>13} {:>10} {:>11} {:>9}",
        "TOKEN", "CONVERSATIONS", "MESSAGES", "TOMBSTONES", "MODIFIED"
    );
    for entry in &result.tokens {
        print_row(&entry.token, &entry.stats);
    }
    print_row("total", &result.totals);
}

fn print_row(label: &str, stats: &UserStats) {
    println!(
        "  {:<10} {:>13} {:>10} {:>11} {:>9}",
        label, stats.conversations, stats.messages, stats.tombstones, stats.modified
    );
}
