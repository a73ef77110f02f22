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
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// One file observed in the clips folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanEntry {
    /// The file name, used as the clip identifier.
    pub name: String,
    /// The absolute path of the file.
    pub path: PathBuf,
}

/// Typed error for folder scans so callers can distinguish a missing folder
/// from an empty one.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("clips folder {0} does not exist")]
    FolderMissing(PathBuf),
    #[error("error reading clips folder: {0}")]
    Io(#[from] io::Error),
}

/// Enumerates the files of a clips folder.
pub trait Scanner: Send + Sync + 'static {
    fn scan(&self, folder: &Path) -> Result<Vec<ScanEntry>, ScanError>;
}

/// Scans the real filesystem, recursing into subfolders.
pub struct FsScanner {}

impl FsScanner {
    pub fn new() -> FsScanner {
        FsScanner {}
    }

    fn scan_into(folder: &Path, entries: &mut Vec<ScanEntry>) -> Result<(), ScanError> {
        for entry in fs::read_dir(folder)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                FsScanner::scan_into(&path, entries)?;
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => entries.push(ScanEntry { name, path }),
                Err(name) => {
                    warn!(name = ?name, "Skipping file with unreadable name.");
                }
            }
        }
        Ok(())
    }
}

impl Default for FsScanner {
    fn default() -> Self {
        FsScanner::new()
    }
}

impl Scanner for FsScanner {
    fn scan(&self, folder: &Path) -> Result<Vec<ScanEntry>, ScanError> {
        if !folder.is_dir() {
            return Err(ScanError::FolderMissing(folder.to_path_buf()));
        }

        let mut entries = Vec::new();
        FsScanner::scan_into(folder, &mut entries)?;
        Ok(entries)
    }
}
