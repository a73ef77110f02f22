// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Persistence of per-clip keybind and volume settings.
//!
//! The store is a JSON array of records, one per file name. A fresh store is
//! the literal empty array. Records for files that no longer exist are kept,
//! not purged, so a clip recovers its settings when its file comes back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::library::Clip;

/// The file name of the settings store inside the clips folder.
pub const SETTINGS_FILE: &str = "settings.json";

/// The persisted counterpart of a clip's editable fields. Keyed by filename,
/// at most one record per file name.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SettingsRecord {
    pub filename: String,
    /// The bound key, stored uppercase. "?" means unbound.
    pub keybind: String,
    #[serde(rename = "userVolume")]
    pub user_volume: u16,
    #[serde(rename = "listenerVolume")]
    pub listener_volume: u16,
}

impl SettingsRecord {
    /// Builds the record that persists the given clip's editable fields.
    pub fn from_clip(clip: &Clip) -> SettingsRecord {
        SettingsRecord {
            filename: clip.filename.clone(),
            keybind: clip.keybind_display(),
            user_volume: clip.user_volume,
            listener_volume: clip.listener_volume,
        }
    }
}

/// Typed error for settings store I/O so an aborted edit can report whether
/// the load or the write failed.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("error reading settings file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("error writing settings file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("settings file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("error serializing settings: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Loads and saves the list of settings records.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> SettingsStore {
        SettingsStore { path: path.into() }
    }

    /// Creates the conventional store inside a clips folder.
    pub fn in_folder(folder: &Path) -> SettingsStore {
        SettingsStore::new(folder.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all records. A missing or empty file is a fresh, empty store.
    pub fn load(&self) -> Result<Vec<SettingsRecord>, SettingsError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No settings file yet, starting empty.");
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| SettingsError::Read {
            path: self.path.clone(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents).map_err(|source| SettingsError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Writes the full record list, replacing the previous contents.
    pub fn save(&self, records: &[SettingsRecord]) -> Result<(), SettingsError> {
        let contents =
            serde_json::to_string_pretty(records).map_err(SettingsError::Serialize)?;
        fs::write(&self.path, contents).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
