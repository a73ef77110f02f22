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

//! Playback through real audio hardware. Devices are resolved by name with
//! cpal, decoding and mixing are rodio's, durations come from lofty.

use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
#[cfg(test)]
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use lofty::file::AudioFile;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tracing::{info, span, warn, Level};

use crate::audio::{gain, DevicePair, PlayRequest, PlaybackError};

/// Plays clips through cpal endpoints. Device names are resolved on every
/// play so hot-plugged devices are picked up without a restart.
pub struct Device {}

impl Device {
    pub fn new() -> Device {
        Device {}
    }

    /// Finds the output endpoint whose name contains the given name.
    fn resolve_output(name: &str) -> Option<cpal::Device> {
        let host = cpal::default_host();
        host.output_devices().ok()?.find(|device| {
            device
                .name()
                .map(|device_name| device_name.contains(name))
                .unwrap_or(false)
        })
    }

    /// Opens a stream on the named endpoint, falling back to the default
    /// output when nothing matches so a stale selection still makes noise.
    fn open_stream(name: &str) -> Result<OutputStream, PlaybackError> {
        let stream_error = |reason: rodio::StreamError| PlaybackError::Stream {
            device: name.to_string(),
            reason: reason.to_string(),
        };

        match Device::resolve_output(name) {
            Some(device) => OutputStreamBuilder::from_device(device)
                .and_then(|builder| builder.open_stream())
                .map_err(stream_error),
            None => {
                warn!(
                    device = name,
                    "No output endpoint matches, falling back to the default output."
                );
                OutputStreamBuilder::open_default_stream().map_err(stream_error)
            }
        }
    }

    fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, PlaybackError> {
        let file = File::open(path).map_err(|source| PlaybackError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Decoder::new(BufReader::new(file)).map_err(|source| PlaybackError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::new()
    }
}

impl crate::audio::Device for Device {
    fn probe_duration(&self, path: &Path) -> Result<Duration, PlaybackError> {
        let tagged = lofty::read_from_path(path).map_err(|e| PlaybackError::Probe {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(tagged.properties().duration())
    }

    /// Plays the clip through the user and listener endpoints at their own
    /// volumes and blocks until both sinks drain.
    fn play(&self, request: &PlayRequest) -> Result<(), PlaybackError> {
        let span = span!(Level::INFO, "play clip (cpal)");
        let _enter = span.enter();

        info!(
            clip = %request.path.display(),
            user_volume = request.user_volume,
            listener_volume = request.listener_volume,
            "Playing clip."
        );

        // The streams have to outlive the sinks, so open everything before
        // starting playback.
        let user_stream = Device::open_stream(&request.devices.output)?;
        let listener_stream = Device::open_stream(&request.devices.input)?;

        let user_sink = Sink::connect_new(user_stream.mixer());
        user_sink.set_volume(gain(request.user_volume));
        user_sink.append(Device::open_decoder(&request.path)?);

        let listener_sink = Sink::connect_new(listener_stream.mixer());
        listener_sink.set_volume(gain(request.listener_volume));
        listener_sink.append(Device::open_decoder(&request.path)?);

        user_sink.sleep_until_end();
        listener_sink.sleep_until_end();

        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<crate::audio::mock::Device>, Box<dyn Error>> {
        Err("not a mock device".into())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpal")
    }
}

/// Lists the input and output device names of the default host.
pub fn list_device_names() -> Result<(Vec<String>, Vec<String>), Box<dyn Error>> {
    let host = cpal::default_host();

    let inputs = host
        .input_devices()?
        .filter_map(|device| device.name().ok())
        .collect();
    let outputs = host
        .output_devices()?
        .filter_map(|device| device.name().ok())
        .collect();

    Ok((inputs, outputs))
}

/// The host's default input and output device names.
pub fn default_device_pair() -> Result<DevicePair, Box<dyn Error>> {
    let host = cpal::default_host();

    let input = host
        .default_input_device()
        .and_then(|device| device.name().ok())
        .ok_or("no default input device")?;
    let output = host
        .default_output_device()
        .and_then(|device| device.name().ok())
        .ok_or("no default output device")?;

    Ok(DevicePair { input, output })
}
