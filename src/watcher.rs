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
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::board::Soundboard;

/// Bursts of filesystem events within this window collapse into one refresh.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches the clips folder and refreshes the library when its contents
/// change. Dropping the watcher stops it.
pub struct FolderWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    handle: JoinHandle<()>,
}

impl FolderWatcher {
    /// Starts watching the board's clips folder. The folder must exist.
    pub fn new(board: Arc<Soundboard>) -> Result<FolderWatcher, Box<dyn Error>> {
        let folder = board.folder().to_path_buf();
        let (tx, mut rx) = mpsc::channel::<()>(1);

        let mut debouncer = new_debouncer(
            WATCH_DEBOUNCE,
            move |result: DebounceEventResult| match result {
                // A full channel already carries a pending refresh.
                Ok(_) => {
                    let _ = tx.try_send(());
                }
                Err(e) => warn!(err = format!("{:?}", e), "Folder watcher error."),
            },
        )?;
        debouncer
            .watcher()
            .watch(&folder, RecursiveMode::Recursive)?;

        let handle = tokio::spawn(async move {
            info!(folder = %folder.display(), "Watching clips folder.");
            while rx.recv().await.is_some() {
                if let Err(e) = board.refresh().await {
                    warn!(err = e.to_string(), "Could not refresh the library.");
                }
            }
        });

        Ok(FolderWatcher {
            _debouncer: debouncer,
            handle,
        })
    }

    /// Join will block until the watcher finishes, which it normally never
    /// does.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::fs;

    use super::*;
    use crate::audio::{self, DevicePair};
    use crate::scanner::FsScanner;
    use crate::settings::SettingsStore;
    use crate::test::eventually;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_new_file_triggers_refresh() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let clips = dir.path().join("clips");
        fs::create_dir(&clips)?;

        let board = Arc::new(Soundboard::new(
            &clips,
            Arc::new(FsScanner::new()),
            SettingsStore::in_folder(dir.path()),
            audio::get_device("mock-device")?,
            DevicePair {
                input: "mock-cable".to_string(),
                output: "mock-headphones".to_string(),
            },
        ));
        board.refresh().await?;
        assert!(board.clips().is_empty());

        let _watcher = FolderWatcher::new(board.clone())?;
        fs::write(clips.join("kick.wav"), b"")?;

        eventually(
            || board.clip("kick.wav").is_some(),
            "New file never reached the catalog",
        );
        Ok(())
    }
}
