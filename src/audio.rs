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
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::{error::Error, fmt};

use tracing::debug;

pub mod mixer;
pub mod mock;

/// Global playback ID counter.
static NEXT_PLAYBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one started playback instance in an output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(u64);

impl PlaybackId {
    /// Allocates a new, globally unique playback ID.
    pub fn next() -> PlaybackId {
        PlaybackId(NEXT_PLAYBACK_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Decoded audio data handed to the instrument by the audio source provider.
/// Cloning is cheap: the sample data is shared.
#[derive(Clone)]
pub struct SampleBuffer {
    /// The display name of the sample.
    name: Arc<str>,
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    /// Number of channels in the data.
    channel_count: u16,
    /// Sample rate of the data.
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a new sample buffer from interleaved samples.
    pub fn new(name: &str, data: Vec<f32>, channel_count: u16, sample_rate: u32) -> SampleBuffer {
        SampleBuffer {
            name: Arc::from(name),
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// Length of the buffer when played at its native rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Returns true if both handles refer to the same sample data.
    pub fn same_data(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("name", &self.name)
            .field("frames", &self.frame_count())
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Decoded buffers by name. Filled by the audio source provider.
#[derive(Clone, Debug, Default)]
pub struct BufferLibrary {
    buffers: BTreeMap<String, SampleBuffer>,
}

impl BufferLibrary {
    pub fn new() -> BufferLibrary {
        BufferLibrary::default()
    }

    /// Adds a buffer under its own name, replacing any buffer with the same name.
    pub fn insert(&mut self, buffer: SampleBuffer) {
        debug!(sample = buffer.name(), "Buffer added to library");
        self.buffers.insert(buffer.name().to_string(), buffer);
    }

    pub fn get(&self, name: &str) -> Option<&SampleBuffer> {
        self.buffers.get(name)
    }

    /// Buffer names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Buffers in name order.
    pub fn buffers(&self) -> impl Iterator<Item = &SampleBuffer> {
        self.buffers.values()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Everything an output needs to start one playback instance.
#[derive(Clone, Debug)]
pub struct PlaybackRequest {
    /// The sample to play.
    pub buffer: SampleBuffer,
    /// Sample-rate multiplier. 1.0 plays at the original pitch.
    pub rate: f64,
    /// Gain in decibels.
    pub volume_db: f64,
    /// Loop the buffer until stopped.
    pub looped: bool,
    /// Gain ramp from silence at the start, if any.
    pub attack: Option<Duration>,
}

/// A playback output that voices start and stop instances on.
///
/// Instances that end on their own, or whose release ramp finishes after `stop`,
/// are reported on the output's completion channel.
pub trait Output: fmt::Display + Send + Sync {
    /// Starts a new playback instance.
    fn start(&self, request: PlaybackRequest) -> Result<PlaybackId, Box<dyn Error>>;

    /// Stops an instance. With a release the instance fades out over that duration,
    /// otherwise it is cut immediately.
    fn stop(&self, id: PlaybackId, release: Option<Duration>);

    /// Changes the rate of a sounding instance without restarting it.
    fn set_rate(&self, id: PlaybackId, rate: f64);

    /// Changes the gain of a sounding instance.
    fn set_volume(&self, id: PlaybackId, volume_db: f64);
}

/// Converts decibels to a linear gain factor.
pub fn db_to_gain(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_duration() {
        let buffer = SampleBuffer::new("tone", vec![0.0; 44100 * 2], 2, 44100);
        assert_eq!(buffer.frame_count(), 44100);
        assert_eq!(buffer.duration(), Duration::from_secs(1));

        let shared = buffer.clone();
        assert!(shared.same_data(&buffer));
        assert!(!SampleBuffer::new("tone", vec![0.0; 4], 2, 44100).same_data(&buffer));
    }

    #[test]
    fn test_library_replaces_by_name() {
        let mut library = BufferLibrary::new();
        library.insert(SampleBuffer::new("kick", vec![0.0; 4], 1, 44100));
        library.insert(SampleBuffer::new("snare", vec![0.0; 4], 1, 44100));
        library.insert(SampleBuffer::new("kick", vec![0.0; 8], 1, 44100));

        assert_eq!(library.len(), 2);
        assert_eq!(library.get("kick").unwrap().frame_count(), 8);
        assert_eq!(library.names().collect::<Vec<_>>(), vec!["kick", "snare"]);
    }

    #[test]
    fn test_db_to_gain() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-20.0) - 0.1).abs() < 1e-6);
        assert!((db_to_gain(20.0) - 10.0).abs() < 1e-4);
    }
}
