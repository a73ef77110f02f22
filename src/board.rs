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

//! The soundboard engine. Owns the catalog and the keybind index and
//! serializes every mutation, whether it comes from a reconciliation pass or
//! from a settings edit, through a single lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::audio::{self, DevicePair, PlayRequest};
use crate::keybinds::{KeybindCollision, KeybindIndex};
use crate::library::{is_clip_file, Catalog, Clip, ClipEdit, ReconcileSummary, VolumeRejection};
use crate::scanner::{ScanError, Scanner};
use crate::settings::{SettingsError, SettingsRecord, SettingsStore};

/// How many change notifications may queue up per subscriber.
const EVENT_CAPACITY: usize = 64;

/// Why the library could not be refreshed. The previous catalog is kept in
/// both cases.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("clips library unavailable: {0}")]
    Unavailable(#[from] ScanError),
    #[error(transparent)]
    Persistence(#[from] SettingsError),
}

/// Why an edit was not applied. Per-field volume rejections are not errors;
/// they ride along in the [EditOutcome].
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("no clip named {0} in the catalog")]
    UnknownClip(String),
    #[error(transparent)]
    Persistence(#[from] SettingsError),
}

/// Notification of a catalog change, consumed by any presentation layer.
#[derive(Clone, Debug)]
pub enum LibraryEvent {
    /// A reconciliation pass added or removed clips.
    Reconciled(ReconcileSummary),
    /// One clip's keybind or volumes changed.
    ClipUpdated { filename: String },
    /// Two clips resolved to the same key.
    Collision(KeybindCollision),
}

/// The result of a successful edit: the committed clip and any per-field
/// volume rejections.
#[derive(Clone, Debug)]
pub struct EditOutcome {
    pub clip: Clip,
    pub rejections: Vec<VolumeRejection>,
}

/// The engine core: catalog, keybind index, settings write-through and the
/// single mutation owner everything serializes through.
pub struct Soundboard {
    /// The clips folder under reconciliation.
    folder: PathBuf,
    scanner: Arc<dyn Scanner>,
    store: SettingsStore,
    device: Arc<dyn audio::Device>,
    catalog: RwLock<Catalog>,
    index: RwLock<KeybindIndex>,
    /// The device pair selected for this run.
    devices: DevicePair,
    /// Serializes reconciliation and edits. At most one mutation in flight.
    mutation: Mutex<()>,
    /// Folds concurrent refresh requests into at most one pending pass.
    refresh_pending: AtomicBool,
    /// Source of keybind assignment sequence numbers.
    bind_seq: AtomicU64,
    events: broadcast::Sender<LibraryEvent>,
}

impl Soundboard {
    /// Creates an engine over the given collaborators. The catalog starts
    /// empty; run [Soundboard::refresh] to populate it.
    pub fn new(
        folder: impl Into<PathBuf>,
        scanner: Arc<dyn Scanner>,
        store: SettingsStore,
        device: Arc<dyn audio::Device>,
        devices: DevicePair,
    ) -> Soundboard {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Soundboard {
            folder: folder.into(),
            scanner,
            store,
            device,
            catalog: RwLock::new(Catalog::new()),
            index: RwLock::new(KeybindIndex::new()),
            devices,
            mutation: Mutex::new(()),
            refresh_pending: AtomicBool::new(false),
            bind_seq: AtomicU64::new(0),
            events,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// A snapshot of the current catalog.
    pub fn clips(&self) -> Vec<Clip> {
        self.catalog.read().clips().to_vec()
    }

    pub fn clip(&self, filename: &str) -> Option<Clip> {
        self.catalog.read().get(filename).cloned()
    }

    /// Resolves a key press to the bound clip, if any. Case-insensitive.
    pub fn resolve_key(&self, key: char) -> Option<Clip> {
        let filename = {
            let index = self.index.read();
            index.resolve(key)?.to_string()
        };
        self.clip(&filename)
    }

    /// Subscribes to catalog change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    pub fn device(&self) -> Arc<dyn audio::Device> {
        self.device.clone()
    }

    pub fn device_pair(&self) -> DevicePair {
        self.devices.clone()
    }

    /// Builds the playback request for a clip against the current device
    /// selection.
    pub fn play_request(&self, clip: &Clip) -> PlayRequest {
        PlayRequest {
            path: clip.path.clone(),
            user_volume: clip.user_volume,
            listener_volume: clip.listener_volume,
            devices: self.device_pair(),
        }
    }

    /// Re-runs reconciliation against the folder and the settings store.
    ///
    /// Requests are coalesced: while one pass runs, the first concurrent
    /// request queues behind it and any further ones fold into that pending
    /// pass. A scan or settings failure leaves the catalog as it was.
    pub async fn refresh(&self) -> Result<ReconcileSummary, LibraryError> {
        if self.refresh_pending.swap(true, Ordering::SeqCst) {
            debug!("A refresh is already pending, folding this request into it.");
            return Ok(ReconcileSummary::default());
        }

        let _guard = self.mutation.lock().await;
        self.refresh_pending.store(false, Ordering::SeqCst);

        let entries = self.scanner.scan(&self.folder)?;
        let records = self.store.load()?;

        // Probe durations outside the catalog lock. Only new files and files
        // whose earlier probe failed need one; the mutation lock keeps the
        // candidate set stable.
        let candidates: Vec<PathBuf> = {
            let catalog = self.catalog.read();
            entries
                .iter()
                .filter(|entry| is_clip_file(&entry.name))
                .filter(|entry| match catalog.get(&entry.name) {
                    Some(clip) => clip.duration.is_none(),
                    None => true,
                })
                .map(|entry| entry.path.clone())
                .collect()
        };
        let mut durations: HashMap<PathBuf, Duration> = HashMap::new();
        for path in candidates {
            match self.device.probe_duration(&path) {
                Ok(duration) => {
                    durations.insert(path, duration);
                }
                Err(e) => warn!(err = %e, "Could not probe clip duration."),
            }
        }

        let summary = {
            let mut catalog = self.catalog.write();
            catalog.reconcile(
                &entries,
                &records,
                &mut |path| durations.get(path).copied(),
                &mut || self.bind_seq.fetch_add(1, Ordering::SeqCst),
            )
        };
        self.rebuild_index();

        if !summary.added.is_empty() || !summary.removed.is_empty() {
            info!(
                added = summary.added.len(),
                removed = summary.removed.len(),
                total = self.catalog.read().len(),
                "Library reconciled."
            );
            let _ = self.events.send(LibraryEvent::Reconciled(summary.clone()));
        }

        Ok(summary)
    }

    /// Validates and applies an edit to one clip, writing through to the
    /// settings store before committing, so a persistence failure leaves the
    /// catalog untouched and readers never observe the store and the catalog
    /// disagreeing.
    pub async fn apply_edit(
        &self,
        filename: &str,
        edit: ClipEdit,
    ) -> Result<EditOutcome, EditError> {
        let _guard = self.mutation.lock().await;

        let current = self
            .catalog
            .read()
            .get(filename)
            .cloned()
            .ok_or_else(|| EditError::UnknownClip(filename.to_string()))?;

        let bind_seq = self.bind_seq.fetch_add(1, Ordering::SeqCst);
        let (updated, rejections) = current.with_edit(&edit, bind_seq);
        for rejection in &rejections {
            warn!(clip = filename, "Rejected edit field: {}.", rejection);
        }

        // Write-through first. Orphaned records for vanished files are
        // preserved, never purged.
        let mut records = self.store.load()?;
        let record = SettingsRecord::from_clip(&updated);
        match records.iter_mut().find(|r| r.filename == filename) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.store.save(&records)?;

        self.catalog.write().replace(updated.clone());
        self.rebuild_index();

        info!(
            clip = filename,
            keybind = updated.keybind_display(),
            user_volume = updated.user_volume,
            listener_volume = updated.listener_volume,
            "Clip settings updated."
        );
        let _ = self.events.send(LibraryEvent::ClipUpdated {
            filename: filename.to_string(),
        });

        Ok(EditOutcome {
            clip: updated,
            rejections,
        })
    }

    /// Recomputes the keybind index from the catalog and reports collisions.
    /// Callers hold the mutation lock.
    fn rebuild_index(&self) {
        let (index, collisions) = {
            let catalog = self.catalog.read();
            KeybindIndex::rebuild(&catalog)
        };
        *self.index.write() = index;

        for collision in collisions {
            warn!(
                key = collision.key.to_string(),
                winner = collision.winner,
                loser = collision.loser,
                "Keybind collision, dispatching the most recent binding."
            );
            let _ = self.events.send(LibraryEvent::Collision(collision));
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use parking_lot::Mutex;

    use super::*;
    use crate::audio::mock;
    use crate::library::{VolumeField, VOLUME_DEFAULT};
    use crate::scanner::ScanEntry;

    /// A scanner whose folder contents are set by the test.
    struct TestScanner {
        entries: Mutex<Option<Vec<String>>>,
    }

    impl TestScanner {
        fn with_files(names: &[&str]) -> Arc<TestScanner> {
            Arc::new(TestScanner {
                entries: Mutex::new(Some(
                    names.iter().map(|name| name.to_string()).collect(),
                )),
            })
        }

        fn set_files(&self, names: &[&str]) {
            *self.entries.lock() = Some(names.iter().map(|name| name.to_string()).collect());
        }

        fn set_missing(&self) {
            *self.entries.lock() = None;
        }
    }

    impl Scanner for TestScanner {
        fn scan(&self, folder: &Path) -> Result<Vec<ScanEntry>, ScanError> {
            match self.entries.lock().as_ref() {
                Some(names) => Ok(names
                    .iter()
                    .map(|name| ScanEntry {
                        name: name.clone(),
                        path: folder.join(name),
                    })
                    .collect()),
                None => Err(ScanError::FolderMissing(folder.to_path_buf())),
            }
        }
    }

    fn test_pair() -> DevicePair {
        DevicePair {
            input: "mock-cable".to_string(),
            output: "mock-headphones".to_string(),
        }
    }

    fn test_board(
        dir: &Path,
        scanner: Arc<TestScanner>,
    ) -> Result<(Soundboard, Arc<mock::Device>), Box<dyn Error>> {
        let device = audio::get_device("mock-device")?;
        let mock = device.to_mock()?;
        let board = Soundboard::new(
            dir.join("clips"),
            scanner,
            SettingsStore::in_folder(dir),
            device,
            test_pair(),
        );
        Ok((board, mock))
    }

    fn edit(keybind: &str, user_volume: i64, listener_volume: i64) -> ClipEdit {
        ClipEdit {
            keybind: keybind.to_string(),
            user_volume,
            listener_volume,
        }
    }

    #[tokio::test]
    async fn test_refresh_populates_catalog() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let scanner = TestScanner::with_files(&["kick.wav", "horn.mp3", "notes.txt"]);
        let (board, _) = test_board(dir.path(), scanner)?;

        let summary = board.refresh().await?;
        assert_eq!(2, summary.added.len());

        let clip = board.clip("kick.wav").expect("clip should exist");
        assert_eq!(None, clip.keybind);
        assert_eq!(VOLUME_DEFAULT, clip.user_volume);
        assert_eq!(VOLUME_DEFAULT, clip.listener_volume);
        assert!(board.clip("notes.txt").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_folder_keeps_last_known_catalog() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let scanner = TestScanner::with_files(&["kick.wav"]);
        let (board, _) = test_board(dir.path(), scanner.clone())?;

        board.refresh().await?;
        assert_eq!(1, board.clips().len());

        scanner.set_missing();
        let result = board.refresh().await;
        assert!(matches!(
            result,
            Err(LibraryError::Unavailable(ScanError::FolderMissing(_)))
        ));
        // The last known good catalog survives the transient failure.
        assert_eq!(1, board.clips().len());
        Ok(())
    }

    #[tokio::test]
    async fn test_removed_file_leaves_catalog_on_next_refresh() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let scanner = TestScanner::with_files(&["kick.wav", "horn.mp3"]);
        let (board, _) = test_board(dir.path(), scanner.clone())?;
        board.refresh().await?;

        scanner.set_files(&["horn.mp3"]);
        let summary = board.refresh().await?;
        assert_eq!(vec!["kick.wav".to_string()], summary.removed);
        assert!(board.clip("kick.wav").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_edit_round_trips_through_store() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let scanner = TestScanner::with_files(&["kick.wav"]);
        let (board, _) = test_board(dir.path(), scanner)?;
        board.refresh().await?;

        let outcome = board.apply_edit("kick.wav", edit("k", 40, 150)).await?;
        assert!(outcome.rejections.is_empty());
        assert_eq!(Some('K'), outcome.clip.keybind);

        // The store reflects the committed values exactly.
        let records = SettingsStore::in_folder(dir.path()).load()?;
        assert_eq!(1, records.len());
        assert_eq!("kick.wav", records[0].filename);
        assert_eq!("K", records[0].keybind);
        assert_eq!(40, records[0].user_volume);
        assert_eq!(150, records[0].listener_volume);

        // And the edit takes effect immediately.
        let resolved = board.resolve_key('k').expect("key should resolve");
        assert_eq!("kick.wav", resolved.filename);
        assert_eq!(40, resolved.user_volume);
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_edit_rejects_out_of_range_volume_per_field(
    ) -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let scanner = TestScanner::with_files(&["kick.wav"]);
        let (board, _) = test_board(dir.path(), scanner)?;
        board.refresh().await?;

        let outcome = board.apply_edit("kick.wav", edit("k", 250, 80)).await?;
        assert_eq!(1, outcome.rejections.len());
        assert_eq!(VolumeField::User, outcome.rejections[0].field);

        // The rejected field keeps its value while the rest of the edit,
        // keybind included, is applied and persisted.
        assert_eq!(VOLUME_DEFAULT, outcome.clip.user_volume);
        assert_eq!(80, outcome.clip.listener_volume);
        let records = SettingsStore::in_folder(dir.path()).load()?;
        assert_eq!(VOLUME_DEFAULT, records[0].user_volume);
        assert_eq!(80, records[0].listener_volume);
        Ok(())
    }

    #[tokio::test]
    async fn test_apply_edit_persistence_failure_leaves_catalog() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let scanner = TestScanner::with_files(&["kick.wav"]);

        // A store pointing into a folder that doesn't exist fails on save.
        let device = audio::get_device("mock-device")?;
        let board = Soundboard::new(
            dir.path().join("clips"),
            scanner,
            SettingsStore::new(dir.path().join("missing").join("settings.json")),
            device,
            test_pair(),
        );
        board.refresh().await?;

        let result = board.apply_edit("kick.wav", edit("k", 40, 40)).await;
        assert!(matches!(result, Err(EditError::Persistence(_))));

        let clip = board.clip("kick.wav").expect("clip should exist");
        assert_eq!(None, clip.keybind);
        assert_eq!(VOLUME_DEFAULT, clip.user_volume);
        assert!(board.resolve_key('k').is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_of_unknown_clip_is_rejected() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let scanner = TestScanner::with_files(&[]);
        let (board, _) = test_board(dir.path(), scanner)?;
        board.refresh().await?;

        let result = board.apply_edit("missing.wav", edit("k", 100, 100)).await;
        assert!(matches!(result, Err(EditError::UnknownClip(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_keybind_collision_reports_and_dispatches_last_writer(
    ) -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let scanner = TestScanner::with_files(&["kick.wav", "horn.mp3"]);
        let (board, _) = test_board(dir.path(), scanner)?;
        board.refresh().await?;

        board.apply_edit("kick.wav", edit("K", 100, 100)).await?;
        let mut events = board.subscribe();
        board.apply_edit("horn.mp3", edit("K", 100, 100)).await?;

        // The most recent edit wins the key.
        let resolved = board.resolve_key('K').expect("key should resolve");
        assert_eq!("horn.mp3", resolved.filename);

        // And the collision is reported, not silently resolved.
        let mut saw_collision = false;
        while let Ok(event) = events.try_recv() {
            if let LibraryEvent::Collision(collision) = event {
                assert_eq!('K', collision.key);
                assert_eq!("horn.mp3", collision.winner);
                assert_eq!("kick.wav", collision.loser);
                saw_collision = true;
            }
        }
        assert!(saw_collision, "collision was never reported");
        Ok(())
    }

    #[tokio::test]
    async fn test_unprobeable_file_is_isolated() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let scanner = TestScanner::with_files(&["unprobeable.wav", "kick.wav"]);
        let (board, _) = test_board(dir.path(), scanner)?;
        board.refresh().await?;

        // One bad file doesn't abort the pass.
        assert_eq!(2, board.clips().len());
        let clip = board.clip("unprobeable.wav").expect("clip should exist");
        assert_eq!(None, clip.duration);
        assert!(board.clip("kick.wav").expect("clip").duration.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_orphaned_records_survive_edits() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let store = SettingsStore::in_folder(dir.path());
        store.save(&[SettingsRecord {
            filename: "gone.wav".to_string(),
            keybind: "G".to_string(),
            user_volume: 70,
            listener_volume: 70,
        }])?;

        let scanner = TestScanner::with_files(&["kick.wav"]);
        let (board, _) = test_board(dir.path(), scanner)?;
        board.refresh().await?;
        board.apply_edit("kick.wav", edit("k", 40, 40)).await?;

        // The record of the vanished file is still there.
        let records = SettingsStore::in_folder(dir.path()).load()?;
        assert_eq!(2, records.len());
        assert!(records.iter().any(|record| record.filename == "gone.wav"));
        Ok(())
    }
}
