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
#[cfg(test)]
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::audio::{PlayRequest, PlaybackError};

/// A mock device. Doesn't actually play anything, it records what it was
/// asked to play.
#[derive(Clone)]
pub struct Device {
    name: String,
    plays: Arc<Mutex<Vec<PlayRequest>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            plays: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The number of play invocations so far.
    #[cfg(test)]
    pub fn play_count(&self) -> usize {
        self.plays.lock().len()
    }

    /// A copy of every play request received so far.
    #[cfg(test)]
    pub fn plays(&self) -> Vec<PlayRequest> {
        self.plays.lock().clone()
    }
}

impl crate::audio::Device for Device {
    /// Reports a fixed duration, or a probe failure for file names
    /// containing "unprobeable".
    fn probe_duration(&self, path: &Path) -> Result<Duration, PlaybackError> {
        if path.to_string_lossy().contains("unprobeable") {
            return Err(PlaybackError::Probe {
                path: path.to_path_buf(),
                reason: "mock probe failure".to_string(),
            });
        }

        Ok(Duration::from_secs(1))
    }

    fn play(&self, request: &PlayRequest) -> Result<(), PlaybackError> {
        info!(
            device = self.name,
            clip = %request.path.display(),
            "Playing clip (mock)."
        );
        self.plays.lock().push(request.clone());
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
