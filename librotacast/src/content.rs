//! Content directory scanning
//!
//! Every regular file (or symlink to one) with the configured extension
//! directly inside the content directory is one [`ContentItem`], identified by
//! its file name.
//! Files are only read, never moved or deleted.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ContentError;

/// One publishable piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    /// File name relative to the content directory, e.g. `a.md`
    pub id: String,
    pub path: PathBuf,
    /// File contents with surrounding whitespace trimmed
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
    extension: String,
}

impl ContentStore {
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All readable items in the content directory
    pub fn list_candidates(&self) -> Vec<ContentItem> {
        self.list_unposted(|_| false)
    }

    /// Readable items whose id is not rejected by `is_used`
    ///
    /// Filtering happens before bodies are read, so posted files are never
    /// opened again. A missing directory is created and yields no items;
    /// unreadable items are logged and left out of this scan only.
    pub fn list_unposted<F>(&self, is_used: F) -> Vec<ContentItem>
    where
        F: Fn(&str) -> bool,
    {
        let ids = match self.scan_ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list content directory");
                return Vec::new();
            }
        };

        ids.into_iter()
            .filter(|id| !is_used(id.as_str()))
            .filter_map(|id| match self.read_item(&id) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(item = %id, error = %e, "Skipping unreadable content item");
                    None
                }
            })
            .collect()
    }

    /// Ids of every file with the configured extension, sorted
    ///
    /// Creates the directory when it does not exist yet. Entries that cannot be
    /// inspected are logged and skipped; only failing to list the directory
    /// itself is an error.
    pub fn scan_ids(&self) -> std::io::Result<Vec<String>> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
            warn!(
                dir = %self.dir.display(),
                "Content directory did not exist and was created; nothing to post yet"
            );
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(
                        dir = %self.dir.display(),
                        error = %e,
                        "Skipping unreadable directory entry"
                    );
                    continue;
                }
            };
            let path = entry.path();

            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(&self.extension))
                .unwrap_or(false);
            if !matches_extension {
                continue;
            }

            // Follows symlinks, so a linked file counts as content
            match std::fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        error = %e,
                        "Skipping content file that cannot be inspected"
                    );
                    continue;
                }
            }

            match entry.file_name().into_string() {
                Ok(name) => ids.push(name),
                Err(name) => {
                    warn!(file = ?name, "Skipping content file with a non UTF-8 name");
                }
            }
        }

        ids.sort();
        debug!(dir = %self.dir.display(), count = ids.len(), "Scanned content directory");
        Ok(ids)
    }

    /// Read a single item by id
    pub fn read_item(&self, id: &str) -> std::result::Result<ContentItem, ContentError> {
        let path = self.dir.join(id);
        let bytes =
            std::fs::read(&path).map_err(|e| ContentError::Read(id.to_string(), e.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|_| ContentError::Utf8(id.to_string()))?;

        let body = text.trim();
        if body.is_empty() {
            return Err(ContentError::Empty(id.to_string()));
        }

        Ok(ContentItem {
            id: id.to_string(),
            path,
            body: body.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, ContentStore) {
        let temp_dir = TempDir::new().unwrap();
        for (name, content) in files {
            std::fs::write(temp_dir.path().join(name), content).unwrap();
        }
        let store = ContentStore::new(temp_dir.path(), "md");
        (temp_dir, store)
    }

    #[test]
    fn test_lists_markdown_files_sorted() {
        let (_dir, store) = store_with(&[
            ("b.md", "Second"),
            ("a.md", "  First\n\n"),
            ("notes.txt", "ignored"),
        ]);

        let items = store.list_candidates();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "b.md"]);
        assert_eq!(items[0].body, "First");
    }

    #[test]
    fn test_extension_match_ignores_case_and_dot() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("UPPER.TXT"), "x").unwrap();
        let store = ContentStore::new(temp_dir.path(), ".txt");

        assert_eq!(store.scan_ids().unwrap(), vec!["UPPER.TXT"]);
    }

    #[test]
    fn test_missing_directory_is_created_and_empty() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("content");
        let store = ContentStore::new(&dir, "md");

        assert!(store.list_candidates().is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_invalid_utf8_item_is_skipped() {
        let (dir, store) = store_with(&[("good.md", "ok")]);
        std::fs::write(dir.path().join("bad.md"), [0xffu8, 0xfe, 0xfd]).unwrap();

        let items = store.list_candidates();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "good.md");

        let err = store.read_item("bad.md").unwrap_err();
        assert!(matches!(err, ContentError::Utf8(_)));
    }

    #[test]
    fn test_blank_item_is_skipped() {
        let (_dir, store) = store_with(&[("blank.md", "  \n\t"), ("good.md", "ok")]);

        let ids: Vec<String> = store.list_candidates().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["good.md"]);
        assert!(matches!(
            store.read_item("blank.md").unwrap_err(),
            ContentError::Empty(_)
        ));
    }

    #[test]
    fn test_subdirectories_are_ignored() {
        let (dir, store) = store_with(&[("a.md", "text")]);
        std::fs::create_dir(dir.path().join("drafts.md")).unwrap();

        assert_eq!(store.scan_ids().unwrap(), vec!["a.md"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_content() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        let content = temp_dir.path().join("content");
        std::fs::create_dir(&real).unwrap();
        std::fs::create_dir(&content).unwrap();
        std::fs::write(real.join("a.md"), "linked body").unwrap();
        std::os::unix::fs::symlink(real.join("a.md"), content.join("a.md")).unwrap();

        let store = ContentStore::new(&content, "md");
        let items = store.list_candidates();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a.md");
        assert_eq!(items[0].body, "linked body");
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_only_skips_itself() {
        let (dir, store) = store_with(&[("a.md", "one"), ("c.md", "three")]);
        std::os::unix::fs::symlink(dir.path().join("nowhere.md"), dir.path().join("b.md")).unwrap();

        assert_eq!(store.scan_ids().unwrap(), vec!["a.md", "c.md"]);
    }

    #[test]
    fn test_list_unposted_filters_before_reading() {
        let (dir, store) = store_with(&[("a.md", "one"), ("c.md", "three")]);
        std::fs::write(dir.path().join("b.md"), [0xffu8]).unwrap();

        // b.md is unreadable but already used, so it is never opened
        let items = store.list_unposted(|id| id == "a.md" || id == "b.md");
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c.md"]);
    }

    #[test]
    fn test_missing_item_read_error() {
        let (_dir, store) = store_with(&[]);
        let err = store.read_item("gone.md").unwrap_err();
        assert!(err.to_string().contains("gone.md"));
    }
}
