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

//! The clip catalog and its reconciliation against the clips folder and the
//! persisted settings records.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::scanner::ScanEntry;
use crate::settings::SettingsRecord;

/// File extensions recognized as playable clips. Matching is an exact
/// extension test, never a substring test.
pub const CLIP_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "vorbis", "flac"];

/// Volumes are percentages where 100 is unity gain.
pub const VOLUME_MAX: u16 = 200;

/// The volume assigned to a clip with no persisted record.
pub const VOLUME_DEFAULT: u16 = 100;

/// Returns true if the file name carries one of the accepted clip extensions.
pub fn is_clip_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            CLIP_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

/// Normalizes raw keybind text to a single uppercase key. `"?"` and empty
/// text mean unbound. Text longer than one character is truncated.
pub fn normalize_keybind(raw: &str) -> Option<char> {
    let key = raw.chars().next()?;
    if key == '?' {
        return None;
    }
    Some(key.to_ascii_uppercase())
}

/// A playable audio clip discovered in the clips folder, combined with its
/// keybind and volume settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    /// The file name, unique within the catalog. Join key against the
    /// persisted settings records.
    pub filename: String,
    /// The absolute location of the file. Recomputed on every scan.
    pub path: PathBuf,
    /// The probed duration. None if probing failed.
    pub duration: Option<Duration>,
    /// The bound key, stored uppercase. None means unbound.
    pub keybind: Option<char>,
    /// Volume of the operator's channel in percent.
    pub user_volume: u16,
    /// Volume of the listener's channel in percent.
    pub listener_volume: u16,
    /// Monotonic sequence of the last keybind assignment, used for
    /// last-writer-wins collision resolution. Never persisted.
    pub(crate) bind_seq: u64,
}

impl Clip {
    /// The keybind as shown to the user. Unbound clips display as "?".
    pub fn keybind_display(&self) -> String {
        match self.keybind {
            Some(key) => key.to_string(),
            None => "?".to_string(),
        }
    }

    /// Applies an edit, keeping out-of-range volumes at their current
    /// values. Returns the edited clip and the per-field rejections; the
    /// clip itself is untouched so callers can persist before committing.
    pub(crate) fn with_edit(&self, edit: &ClipEdit, bind_seq: u64) -> (Clip, Vec<VolumeRejection>) {
        let mut rejections = Vec::new();
        let mut clip = self.clone();
        clip.user_volume = resolve_volume(
            VolumeField::User,
            edit.user_volume,
            self.user_volume,
            &mut rejections,
        );
        clip.listener_volume = resolve_volume(
            VolumeField::Listener,
            edit.listener_volume,
            self.listener_volume,
            &mut rejections,
        );
        clip.keybind = normalize_keybind(&edit.keybind);
        clip.bind_seq = bind_seq;
        (clip, rejections)
    }

    /// Outputs the clip duration in a minutes:seconds format.
    pub fn duration_string(&self) -> String {
        match self.duration {
            Some(duration) => {
                let minutes = duration.as_secs() / 60;
                let secs = duration.as_secs() - minutes * 60;
                format!("{}:{:02}", minutes, secs)
            }
            None => "?:??".to_string(),
        }
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({}, user: {}%, listener: {}%)",
            self.filename,
            self.keybind_display(),
            self.duration_string(),
            self.user_volume,
            self.listener_volume,
        )
    }
}

/// A user-submitted edit of one clip's keybind and volumes.
#[derive(Clone, Debug)]
pub struct ClipEdit {
    /// Raw keybind text. Accepted unconditionally, truncated to one
    /// character and uppercased.
    pub keybind: String,
    /// The new user channel volume.
    pub user_volume: i64,
    /// The new listener channel volume.
    pub listener_volume: i64,
}

/// The volume field an edit rejection applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeField {
    User,
    Listener,
}

impl fmt::Display for VolumeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeField::User => write!(f, "user volume"),
            VolumeField::Listener => write!(f, "listener volume"),
        }
    }
}

/// A per-field rejection of an out-of-range volume. The rest of the edit
/// still applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeRejection {
    pub field: VolumeField,
    pub submitted: i64,
}

impl fmt::Display for VolumeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} is outside 0..={}",
            self.field, self.submitted, VOLUME_MAX
        )
    }
}

/// Validates a single volume field, keeping the current value on rejection.
fn resolve_volume(
    field: VolumeField,
    submitted: i64,
    current: u16,
    rejections: &mut Vec<VolumeRejection>,
) -> u16 {
    if (0..=i64::from(VOLUME_MAX)).contains(&submitted) {
        submitted as u16
    } else {
        rejections.push(VolumeRejection { field, submitted });
        current
    }
}

/// The names added and removed by one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconcileSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// The authoritative ordered collection of current clips. All mutation goes
/// through the reconciler or the settings edit path.
#[derive(Default)]
pub struct Catalog {
    clips: Vec<Clip>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog { clips: Vec::new() }
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn get(&self, filename: &str) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.filename == filename)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Replaces the clip carrying the same filename. Returns false if no
    /// such clip is cataloged.
    pub(crate) fn replace(&mut self, clip: Clip) -> bool {
        match self
            .clips
            .iter_mut()
            .find(|existing| existing.filename == clip.filename)
        {
            Some(slot) => {
                *slot = clip;
                true
            }
            None => false,
        }
    }

    /// Merges the scanner's view of the clips folder with the persisted
    /// settings records:
    ///
    /// 1. Clips whose file is gone from the folder are removed.
    /// 2. Newly observed files with an accepted extension become clips,
    ///    hydrated from a matching record or defaulted.
    /// 3. Clips present before and after keep their live keybind/volume
    ///    state; only their path is recomputed, and a missing duration is
    ///    probed again.
    ///
    /// Re-running with unchanged inputs yields an equal catalog.
    pub(crate) fn reconcile(
        &mut self,
        entries: &[ScanEntry],
        records: &[SettingsRecord],
        probe: &mut dyn FnMut(&Path) -> Option<Duration>,
        next_seq: &mut dyn FnMut() -> u64,
    ) -> ReconcileSummary {
        let present: HashSet<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();

        let removed: Vec<String> = self
            .clips
            .iter()
            .filter(|clip| !present.contains(clip.filename.as_str()))
            .map(|clip| clip.filename.clone())
            .collect();
        self.clips
            .retain(|clip| present.contains(clip.filename.as_str()));

        let mut seen: HashSet<&str> = HashSet::new();
        let mut added: Vec<String> = Vec::new();
        for entry in entries {
            if !is_clip_file(&entry.name) {
                continue;
            }
            if !seen.insert(entry.name.as_str()) {
                warn!(
                    name = entry.name,
                    path = %entry.path.display(),
                    "Duplicate clip name in folder, keeping the first one."
                );
                continue;
            }

            if let Some(clip) = self
                .clips
                .iter_mut()
                .find(|clip| clip.filename == entry.name)
            {
                clip.path = entry.path.clone();
                if clip.duration.is_none() {
                    clip.duration = probe(&entry.path);
                }
                continue;
            }

            let record = records.iter().find(|record| record.filename == entry.name);
            let (keybind, user_volume, listener_volume) = match record {
                Some(record) => (
                    normalize_keybind(&record.keybind),
                    record.user_volume.min(VOLUME_MAX),
                    record.listener_volume.min(VOLUME_MAX),
                ),
                None => (None, VOLUME_DEFAULT, VOLUME_DEFAULT),
            };

            self.clips.push(Clip {
                filename: entry.name.clone(),
                path: entry.path.clone(),
                duration: probe(&entry.path),
                keybind,
                user_volume,
                listener_volume,
                bind_seq: next_seq(),
            });
            added.push(entry.name.clone());
        }

        self.clips.sort_by(|a, b| a.filename.cmp(&b.filename));
        ReconcileSummary { added, removed }
    }
}
