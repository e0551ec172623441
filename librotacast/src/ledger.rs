//! History ledger
//!
//! The ledger is the durable set of content ids that have been published.
//! It is the only thing standing between a restart and a duplicate post, so:
//! - a missing file is an empty ledger, but an unreadable or malformed one is
//!   an error and is never replaced with an empty state
//! - every commit rewrites the whole file through a temporary file, `fsync`
//!   and `rename`, so a crash leaves either the old or the new state on disk
//! - the in-memory state only changes once the new file is in place
//!
//! On disk it is pretty-printed JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "posted_ids": ["a.md", "b.md"]
//! }
//! ```
//!
//! Unknown fields are kept and written back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, Result};

/// Current on-disk format version
pub const LEDGER_VERSION: u32 = 1;

/// Serialized ledger contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub version: u32,
    #[serde(default)]
    pub posted_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            posted_ids: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    state: LedgerState,
    index: HashSet<String>,
}

impl Ledger {
    /// Load the ledger at `path`
    ///
    /// # Errors
    ///
    /// Only a file that does not exist yet loads as an empty ledger. Any other
    /// I/O failure returns `LedgerError::Read`. Returns `LedgerError::Malformed`
    /// if the file is not a valid ledger and `LedgerError::UnsupportedVersion`
    /// if it was written by a newer build.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No ledger file yet, starting empty");
                return Ok(Self::from_state(path, LedgerState::default()));
            }
            Err(e) => return Err(LedgerError::Read(e).into()),
        };
        let state = parse_state(&path, &content)?;

        info!(
            path = %path.display(),
            posted = state.posted_ids.len(),
            version = state.version,
            "Loaded ledger"
        );
        Ok(Self::from_state(path, state))
    }

    fn from_state(path: PathBuf, mut state: LedgerState) -> Self {
        let mut index = HashSet::with_capacity(state.posted_ids.len());
        let before = state.posted_ids.len();
        state.posted_ids.retain(|id| index.insert(id.clone()));

        if state.posted_ids.len() != before {
            warn!(
                path = %path.display(),
                duplicates = before - state.posted_ids.len(),
                "Ledger contained duplicate ids; keeping the first of each"
            );
        }

        Self { path, state, index }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Posted ids in the order they were committed
    pub fn posted_ids(&self) -> &[String] {
        &self.state.posted_ids
    }

    pub fn len(&self) -> usize {
        self.state.posted_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.posted_ids.is_empty()
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Record `id` as published and persist the ledger
    ///
    /// Returns `Ok(false)` without touching the file when `id` is already
    /// recorded. On error the ledger is unchanged, in memory and on disk. Once
    /// the new file has replaced the old one the commit counts as done, even
    /// if syncing the parent directory afterwards fails.
    pub fn commit(&mut self, id: &str) -> Result<bool> {
        if self.contains(id) {
            return Ok(false);
        }

        let mut next = self.state.clone();
        next.version = LEDGER_VERSION;
        next.posted_ids.push(id.to_string());

        write_atomically(&self.path, &next)?;

        self.state = next;
        self.index.insert(id.to_string());
        debug!(item = %id, posted = self.state.posted_ids.len(), "Ledger committed");
        Ok(true)
    }
}

fn parse_state(path: &Path, content: &str) -> std::result::Result<LedgerState, LedgerError> {
    let malformed = |reason: String| LedgerError::Malformed {
        path: path.display().to_string(),
        reason,
    };

    let mut value: Value = serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| malformed("expected a JSON object".to_string()))?;

    if !object.contains_key("version") {
        // Unversioned files stored content paths under `posted_files`
        if let Some(legacy) = object.remove("posted_files") {
            let paths: Vec<String> =
                serde_json::from_value(legacy).map_err(|e| malformed(e.to_string()))?;
            let ids: Vec<String> = paths.iter().map(|p| legacy_id(p)).collect();
            object.entry("posted_ids").or_insert(Value::from(ids));
        }
        object.insert("version".to_string(), Value::from(0u32));
    }

    let state: LedgerState = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

    if state.version > LEDGER_VERSION {
        return Err(LedgerError::UnsupportedVersion(state.version));
    }

    Ok(state)
}

/// File name component of a legacy entry such as `xfile/a.md`
fn legacy_id(entry: &str) -> String {
    let normalized = entry.replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or(normalized)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "ledger".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write to `<path>.tmp`, fsync, rename over `path`, fsync the directory
fn write_atomically(path: &Path, state: &LedgerState) -> std::result::Result<(), LedgerError> {
    let fail = |action: &str, e: &dyn std::fmt::Display| {
        LedgerError::Persist(format!("{} {}: {}", action, path.display(), e))
    };

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(|e| fail("create directory for", &e))?;
    }

    let mut json = serde_json::to_string_pretty(state).map_err(|e| fail("serialize", &e))?;
    json.push('\n');

    let tmp = temp_path(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(fail("write", &e));
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(fail("replace", &e));
    }

    // The new state is already in place; a failed directory sync only
    // weakens durability across power loss
    #[cfg(unix)]
    if let Some(parent) = parent {
        if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
            warn!(path = %path.display(), error = %e, "Failed to sync ledger directory");
        }
    }

    Ok(())
}
