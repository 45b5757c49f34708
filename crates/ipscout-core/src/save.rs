//! # Save Records
//!
//! A save record is a small TOML document with one `[session]` table:
//!
//! ```toml
//! [session]
//! target = "example.com"
//! target_type = "domain"
//! log_path = "/abs/path/log/example.com_2025-04-15-17-57-26.log"
//! ```
//!
//! Records live in the save directory as `<safe_target>.save`.

use crate::primitives::{LOG_TIMESTAMP_FORMAT, SAVE_EXTENSION};
use crate::target::sanitize;
use crate::{ReconError, TargetType};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    pub target: String,
    pub target_type: TargetType,
    pub log_path: PathBuf,
}

#[derive(Serialize)]
struct SaveDocument<'a> {
    session: SessionSection<'a>,
}

#[derive(Serialize)]
struct SessionSection<'a> {
    target: &'a str,
    target_type: TargetType,
    log_path: String,
}

impl SaveRecord {
    /// Serialize to the TOML save format.
    pub fn to_toml(&self) -> Result<String, ReconError> {
        let doc = SaveDocument {
            session: SessionSection {
                target: &self.target,
                target_type: self.target_type,
                log_path: self.log_path.to_string_lossy().into_owned(),
            },
        };
        toml::to_string(&doc).map_err(|e| ReconError::SerializationError(e.to_string()))
    }

    /// Parse a save document.
    ///
    /// Keys are checked one by one so that a missing key is reported by
    /// name. Nothing is returned unless every key is present and valid.
    pub fn from_toml(text: &str) -> Result<Self, ReconError> {
        let doc: toml::Table =
            toml::from_str(text).map_err(|e| ReconError::SerializationError(e.to_string()))?;
        let section = doc
            .get("session")
            .and_then(toml::Value::as_table)
            .ok_or_else(|| ReconError::MissingSaveKey("session".to_string()))?;

        let target = field(section, "target")?.to_string();
        let target_type = field(section, "target_type")?.parse()?;
        let log_path = PathBuf::from(field(section, "log_path")?);

        Ok(Self {
            target,
            target_type,
            log_path,
        })
    }
}

fn field<'a>(section: &'a toml::Table, key: &str) -> Result<&'a str, ReconError> {
    section
        .get(key)
        .and_then(toml::Value::as_str)
        .ok_or_else(|| ReconError::MissingSaveKey(key.to_string()))
}

// =============================================================================
// SAVE STORE
// =============================================================================

/// A save file found in the save directory.
#[derive(Debug, Clone)]
pub struct SaveEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified: DateTime<Local>,
}

impl SaveEntry {
    /// Modification time formatted like log lines.
    #[must_use]
    pub fn modified_display(&self) -> String {
        self.modified.format(LOG_TIMESTAMP_FORMAT).to_string()
    }
}

/// The directory of save records.
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
}

impl SaveStore {
    /// Open the save directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ReconError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            ReconError::IoError(format!("cannot create save directory {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    /// File name a record for `target` is written under.
    fn file_name_for(target: &str) -> String {
        format!("{}.{SAVE_EXTENSION}", sanitize(target))
    }

    /// Write a record; returns the path written.
    pub fn write(&self, record: &SaveRecord) -> Result<PathBuf, ReconError> {
        let path = self.dir.join(Self::file_name_for(&record.target));
        fs::write(&path, record.to_toml()?)?;
        tracing::debug!(path = %path.display(), target = %record.target, "session saved");
        Ok(path)
    }

    /// Read and parse a record.
    pub fn read(&self, path: &Path) -> Result<SaveRecord, ReconError> {
        let text = fs::read_to_string(path)?;
        SaveRecord::from_toml(&text)
    }

    /// Resolve a save by name, or the most recent one when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<SaveEntry, ReconError> {
        match name {
            Some(name) => {
                let path = self.dir.join(name);
                if !path.is_file() {
                    return Err(ReconError::SaveNotFound(name.to_string()));
                }
                entry_for(path)
            }
            None => self.list()?.into_iter().next().ok_or(ReconError::NoSaves),
        }
    }

    /// All save records, most recently modified first.
    pub fn list(&self) -> Result<Vec<SaveEntry>, ReconError> {
        let mut entries = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            let is_save = path.extension().is_some_and(|ext| ext == SAVE_EXTENSION);
            if is_save && path.is_file() {
                entries.push(entry_for(path)?);
            }
        }
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }
}

fn entry_for(path: PathBuf) -> Result<SaveEntry, ReconError> {
    let modified = fs::metadata(&path)?.modified()?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(SaveEntry {
        name,
        path,
        modified: DateTime::<Local>::from(modified),
    })
}

// =============================================================================
// TESTS
// =============================================================================
