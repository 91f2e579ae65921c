//! Markdown vault on the local filesystem.
//!
//! Documents are the `.md` files below the vault root; hidden directories
//! (`.obsidian`, `.trash`, ...) are skipped. A document's group comes from
//! one key of its YAML front matter:
//!
//! ```markdown
//! ---
//! anki-deck: Languages::Rust
//! ---
//! ```

use serde_yaml::Value as YamlValue;
use std::fs;
use std::path::{Path, PathBuf};

use super::{DocumentHandle, DocumentStore, StoreError};

/// Filesystem-backed document store.
pub struct VaultStore {
    root: PathBuf,
    group_key: String,
}

impl VaultStore {
    pub fn new(root: impl Into<PathBuf>, group_key: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            group_key: group_key.into(),
        }
    }

    fn path_of(&self, handle: &DocumentHandle) -> PathBuf {
        self.root.join(handle.as_str())
    }

    fn read(&self, handle: &DocumentHandle) -> Result<String, StoreError> {
        let path = self.path_of(handle);
        if !path.is_file() {
            return Err(StoreError::NotFound(handle.to_string()));
        }
        fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: handle.to_string(),
            source,
        })
    }
}

impl DocumentStore for VaultStore {
    fn list_documents(&self) -> Result<Vec<DocumentHandle>, StoreError> {
        let mut files = Vec::new();
        collect_md_files(&self.root, &self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn read_lines(&self, handle: &DocumentHandle) -> Result<Vec<String>, StoreError> {
        Ok(self.read(handle)?.lines().map(str::to_string).collect())
    }

    fn write_lines(&self, handle: &DocumentHandle, lines: &[String]) -> Result<(), StoreError> {
        let existing = self.read(handle)?;
        let newline = if existing.contains("\r\n") { "\r\n" } else { "\n" };

        let mut content = lines.join(newline);
        if existing.ends_with('\n') {
            content.push_str(newline);
        }

        fs::write(self.path_of(handle), content).map_err(|source| StoreError::Io {
            path: handle.to_string(),
            source,
        })
    }

    fn read_group_metadata(&self, handle: &DocumentHandle) -> Result<Option<String>, StoreError> {
        let content = self.read(handle)?;
        let Some(yaml) = split_front_matter(&content) else {
            return Ok(None);
        };

        let value: YamlValue =
            serde_yaml::from_str(yaml).map_err(|e| StoreError::FrontMatter {
                path: handle.to_string(),
                message: e.to_string(),
            })?;

        let group = match value.get(self.group_key.as_str()) {
            Some(YamlValue::String(s)) => s.trim().to_string(),
            Some(YamlValue::Number(n)) => n.to_string(),
            _ => return Ok(None),
        };
        Ok((!group.is_empty()).then_some(group))
    }
}

/// The YAML between the opening and closing `---` lines, if present.
fn split_front_matter(raw: &str) -> Option<&str> {
    let rest = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some(&rest[..offset]);
        }
        offset += line.len();
    }
    None
}

/// Collect all .md files below a directory recursively.
fn collect_md_files(
    base_path: &Path,
    current_path: &Path,
    files: &mut Vec<DocumentHandle>,
) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: current_path.display().to_string(),
        source,
    };

    for entry in fs::read_dir(current_path).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let hidden = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'));
        if hidden {
            continue;
        }

        if path.is_dir() {
            collect_md_files(base_path, &path, files)?;
        } else if path.extension().is_some_and(|e| e == "md") {
            let Ok(relative) = path.strip_prefix(base_path) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(DocumentHandle::new(relative));
        }
    }
    Ok(())
}
