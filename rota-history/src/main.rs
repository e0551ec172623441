use anyhow::{Context, Result};
use clap::Parser;
use librotacast::config::{resolve_config_path, Config};
use librotacast::logging::{LogFormat, LoggingConfig};
use librotacast::{ContentStore, Ledger};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rota-history")]
#[command(version, about = "Show which content items have been posted")]
#[command(long_about = r#"Show which content items have been posted, or which are still waiting.

Reads the history ledger and the content directory named in the configuration.
Nothing is ever written.

EXAMPLES:
    # Posted items, oldest first
    rota-history

    # Items that have not been posted yet
    rota-history --remaining

    # How many are left
    rota-history --remaining --count

    # JSON output for scripting
    rota-history --format json | jq -r '.[] | select(.present == false) | .id'

OUTPUT FORMATS:
    text  - One id per line (default)
    json  - JSON array of {"id", "present"} objects

EXIT CODES:
    0 - Success (including empty results)
    1 - Error (unreadable configuration, malformed ledger, etc.)
"#)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// List content items that have not been posted yet
    #[arg(short, long)]
    remaining: bool,

    /// Print only the number of matching items
    #[arg(long)]
    count: bool,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// One content id and whether its file is still in the content directory
#[derive(Debug, Serialize, PartialEq, Eq)]
struct HistoryEntry {
    id: String,
    present: bool,
}

/// Posted ids in ledger order
fn posted_entries(ledger: &Ledger, content_ids: &[String]) -> Vec<HistoryEntry> {
    let present: HashSet<&str> = content_ids.iter().map(String::as_str).collect();
    ledger
        .posted_ids()
        .iter()
        .map(|id| HistoryEntry {
            id: id.clone(),
            present: present.contains(id.as_str()),
        })
        .collect()
}

/// Content ids not in the ledger, sorted
fn remaining_entries(ledger: &Ledger, content_ids: &[String]) -> Vec<HistoryEntry> {
    content_ids
        .iter()
        .filter(|id| !ledger.contains(id))
        .map(|id| HistoryEntry {
            id: id.clone(),
            present: true,
        })
        .collect()
}

/// Ids in the content directory, without creating it
fn scan_content(config: &Config) -> Result<Vec<String>> {
    let dir = config.content_dir()?;
    if !dir.is_dir() {
        tracing::debug!("Content directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    ContentStore::new(&dir, &config.content.extension)
        .scan_ids()
        .with_context(|| format!("Failed to read content directory {}", dir.display()))
}

fn render(entries: &[HistoryEntry], format: &str, count: bool) -> Result<String> {
    if count {
        return Ok(format!("{}\n", entries.len()));
    }

    match format {
        "json" => Ok(format!("{}\n", serde_json::to_string_pretty(entries)?)),
        _ => Ok(entries
            .iter()
            .map(|entry| format!("{}\n", entry.id))
            .collect()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    LoggingConfig::new(LogFormat::Text, "warn".to_string(), args.verbose).init();
    tracing::debug!("rota-history started with args: {:?}", args);

    let config_path = resolve_config_path(args.config.as_deref())?;
    let config = Config::load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let ledger_path = config.ledger_path()?;
    let ledger = Ledger::load(&ledger_path)
        .with_context(|| format!("Failed to read ledger {}", ledger_path.display()))?;

    let content_ids = scan_content(&config)?;

    let entries = if args.remaining {
        remaining_entries(&ledger, &content_ids)
    } else {
        posted_entries(&ledger, &content_ids)
    };

    print!("{}", render(&entries, &args.format, args.count)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_with(ids: &[&str]) -> (TempDir, Ledger) {
        let temp_dir = TempDir::new().unwrap();
        let mut ledger = Ledger::load(temp_dir.path().join("history.json")).unwrap();
        for id in ids {
            ledger.commit(id).unwrap();
        }
        (temp_dir, ledger)
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_posted_entries_mark_missing_files() {
        let (_dir, ledger) = ledger_with(&["b.md", "gone.md"]);
        let entries = posted_entries(&ledger, &ids(&["a.md", "b.md"]));

        assert_eq!(
            entries,
            vec![
                HistoryEntry {
                    id: "b.md".to_string(),
                    present: true
                },
                HistoryEntry {
                    id: "gone.md".to_string(),
                    present: false
                },
            ]
        );
    }

    #[test]
    fn test_remaining_entries() {
        let (_dir, ledger) = ledger_with(&["b.md"]);
        let entries = remaining_entries(&ledger, &ids(&["a.md", "b.md", "c.md"]));
        let remaining: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(remaining, vec!["a.md", "c.md"]);
    }

    #[test]
    fn test_render_formats() {
        let entries = vec![
            HistoryEntry {
                id: "a.md".to_string(),
                present: true,
            },
            HistoryEntry {
                id: "b.md".to_string(),
                present: false,
            },
        ];

        assert_eq!(render(&entries, "text", false).unwrap(), "a.md\nb.md\n");
        assert_eq!(render(&entries, "json", true).unwrap(), "2\n");
        assert_eq!(render(&[], "text", false).unwrap(), "");

        let json: serde_json::Value =
            serde_json::from_str(&render(&entries, "json", false).unwrap()).unwrap();
        assert_eq!(json[1]["id"], "b.md");
        assert_eq!(json[1]["present"], false);
    }
}
