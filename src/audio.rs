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
use std::any::Any;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{fmt, result};

pub mod cpal;
pub mod mock;

/// The selected device names for playback routing. The user channel plays to
/// the `output` endpoint; the listener channel plays to the endpoint named by
/// `input`, conventionally a virtual cable's playback side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevicePair {
    pub input: String,
    pub output: String,
}

/// Everything a device needs to play one clip through both channels.
#[derive(Clone, Debug)]
pub struct PlayRequest {
    pub path: PathBuf,
    /// Volume of the operator's channel in percent, 100 is unity.
    pub user_volume: u16,
    /// Volume of the listener's channel in percent, 100 is unity.
    pub listener_volume: u16,
    pub devices: DevicePair,
}

/// Typed error for playback and probing. Playback failures are reported on
/// the play task's own channel and never affect the catalog or dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("error opening clip {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("error decoding clip {path}: {source}")]
    Decode {
        path: PathBuf,
        source: rodio::decoder::DecoderError,
    },
    #[error("error probing clip {path}: {reason}")]
    Probe { path: PathBuf, reason: String },
    #[error("error opening audio stream for {device}: {reason}")]
    Stream { device: String, reason: String },
}

pub type Result<T> = result::Result<T, PlaybackError>;

pub trait Device: Any + fmt::Display + Send + Sync {
    /// Probes the duration of the clip at the given path.
    fn probe_duration(&self, path: &Path) -> Result<Duration>;

    /// Plays the given clip through both channels, blocking until playback
    /// finishes. Callers that must not block detach this onto its own task.
    fn play(&self, request: &PlayRequest) -> Result<()>;

    #[cfg(test)]
    fn to_mock(&self) -> result::Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists the input and output device names known to cpal.
pub fn list_devices() -> result::Result<(Vec<String>, Vec<String>), Box<dyn Error>> {
    cpal::list_device_names()
}

/// Gets a playback device. Names starting with "mock" resolve to the mock
/// device for tests and dry runs.
pub fn get_device(name: &str) -> result::Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    }

    Ok(Arc::new(cpal::Device::new()))
}

/// The device pair made of the host's default input and output devices.
pub fn default_device_pair() -> result::Result<DevicePair, Box<dyn Error>> {
    cpal::default_device_pair()
}

/// Converts a percent volume to a linear gain where 100 percent is unity.
pub(crate) fn gain(volume: u16) -> f32 {
    f32::from(volume) / 100.0
}

#[cfg(test)]
mod test {
    use super::gain;

    #[test]
    fn test_gain_is_unity_at_100_percent() {
        assert_eq!(0.0, gain(0));
        assert_eq!(1.0, gain(100));
        assert_eq!(2.0, gain(200));
    }
}
