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
// Software mixing of voice playback that any audio callback can drive.
use std::error::Error;
use std::fmt;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{db_to_gain, PlaybackId, PlaybackRequest, SampleBuffer};

/// A gain ramp applied on top of an instance's volume.
struct Envelope {
    /// Current level, 0.0 to 1.0.
    level: f32,
    /// Per-frame change of the level.
    delta: f32,
    /// True once the instance has been released.
    releasing: bool,
}

impl Envelope {
    /// An envelope that ramps up from silence over the given number of frames.
    fn attack(frames: u64) -> Envelope {
        if frames == 0 {
            return Envelope::sustain();
        }
        Envelope {
            level: 0.0,
            delta: 1.0 / frames as f32,
            releasing: false,
        }
    }

    fn sustain() -> Envelope {
        Envelope {
            level: 1.0,
            delta: 0.0,
            releasing: false,
        }
    }

    /// Starts ramping down from the current level over the given number of frames.
    fn release(&mut self, frames: u64) {
        self.releasing = true;
        self.delta = -self.level / frames.max(1) as f32;
    }

    /// Advances one frame. Returns false once a release has reached silence.
    fn advance(&mut self) -> bool {
        self.level = (self.level + self.delta).clamp(0.0, 1.0);
        if self.level >= 1.0 && !self.releasing {
            self.delta = 0.0;
        }
        !(self.releasing && self.level <= 0.0)
    }
}

/// An instance currently being rendered by the mixer.
struct ActiveInstance {
    id: PlaybackId,
    buffer: SampleBuffer,
    /// Read position in buffer frames.
    position: f64,
    /// Buffer frames advanced per output frame.
    step: f64,
    gain: f32,
    looped: bool,
    envelope: Envelope,
}

impl ActiveInstance {
    /// Reads the interpolated sample for an output channel at the current position.
    fn read(&self, channel: usize) -> f32 {
        let frames = self.buffer.frame_count();
        let channels = self.buffer.channel_count() as usize;
        let data = self.buffer.data();

        let index = self.position as usize;
        let frac = (self.position - index as f64) as f32;
        let next = if index + 1 < frames {
            index + 1
        } else if self.looped {
            0
        } else {
            index
        };

        // Mono (or narrower) buffers are spread over every output channel.
        let source_channel = channel % channels;
        let s0 = data[index * channels + source_channel];
        let s1 = data[next * channels + source_channel];
        s0 * (1.0 - frac) + s1 * frac
    }

    /// Moves to the next frame. Returns false when the instance has finished.
    fn advance(&mut self) -> bool {
        if !self.envelope.advance() {
            return false;
        }

        let frames = self.buffer.frame_count() as f64;
        self.position += self.step;
        if self.position >= frames {
            if !self.looped {
                return false;
            }
            self.position %= frames;
        }
        true
    }
}

/// Mixes every active playback instance into interleaved output frames.
pub struct Mixer {
    /// Instances currently playing.
    instances: Mutex<Vec<ActiveInstance>>,
    /// Number of output channels.
    channel_count: u16,
    /// Output sample rate.
    sample_rate: u32,
    /// Completion notifications for instances that finish while rendering.
    completions: Sender<PlaybackId>,
}

impl Mixer {
    /// Creates a new mixer and the receiver for its completion notifications.
    pub fn new(channel_count: u16, sample_rate: u32) -> (Mixer, Receiver<PlaybackId>) {
        let (completions, receiver) = crossbeam_channel::unbounded();
        (
            Mixer {
                instances: Mutex::new(Vec::new()),
                channel_count: channel_count.max(1),
                sample_rate,
                completions,
            },
            receiver,
        )
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of instances being rendered.
    pub fn active_count(&self) -> usize {
        self.instances.lock().len()
    }

    /// Returns true if the given instance is still being rendered.
    pub fn is_active(&self, id: PlaybackId) -> bool {
        self.instances.lock().iter().any(|instance| instance.id == id)
    }

    /// Renders into an interleaved buffer, overwriting its contents. Instances that
    /// finish during the call are removed and reported on the completion channel.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);

        let channels = self.channel_count as usize;
        let mut instances = self.instances.lock();
        let mut finished = Vec::new();

        instances.retain_mut(|instance| {
            for frame in out.chunks_exact_mut(channels) {
                let gain = instance.gain * instance.envelope.level;
                for (channel, sample) in frame.iter_mut().enumerate() {
                    *sample += instance.read(channel) * gain;
                }
                if !instance.advance() {
                    finished.push(instance.id);
                    return false;
                }
            }
            true
        });
        drop(instances);

        for id in finished {
            debug!(%id, "Playback finished");
            if let Err(e) = self.completions.send(id) {
                warn!(error = %e, "Failed to report finished playback");
            }
        }
    }

    /// Converts a duration into output frames.
    fn frames(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as u64
    }

    /// Buffer frames to advance per output frame for the given rate.
    fn step(&self, buffer: &SampleBuffer, rate: f64) -> f64 {
        if self.sample_rate == 0 || buffer.sample_rate() == 0 {
            return rate;
        }
        rate * buffer.sample_rate() as f64 / self.sample_rate as f64
    }
}

impl fmt::Display for Mixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "software mixer ({} channels @ {}Hz)",
            self.channel_count, self.sample_rate
        )
    }
}

impl super::Output for Mixer {
    fn start(&self, request: PlaybackRequest) -> Result<PlaybackId, Box<dyn Error>> {
        if request.buffer.frame_count() == 0 {
            return Err(format!("sample {} is empty", request.buffer.name()).into());
        }

        let id = PlaybackId::next();
        let envelope = match request.attack {
            Some(attack) => Envelope::attack(self.frames(attack)),
            None => Envelope::sustain(),
        };
        let instance = ActiveInstance {
            id,
            step: self.step(&request.buffer, request.rate),
            buffer: request.buffer,
            position: 0.0,
            gain: db_to_gain(request.volume_db),
            looped: request.looped,
            envelope,
        };
        self.instances.lock().push(instance);
        Ok(id)
    }

    fn stop(&self, id: PlaybackId, release: Option<Duration>) {
        let mut instances = self.instances.lock();
        match release.map(|release| self.frames(release)) {
            Some(frames) if frames > 0 => {
                if let Some(instance) = instances.iter_mut().find(|instance| instance.id == id) {
                    instance.envelope.release(frames);
                }
            }
            _ => instances.retain(|instance| instance.id != id),
        }
    }

    fn set_rate(&self, id: PlaybackId, rate: f64) {
        let mut instances = self.instances.lock();
        if let Some(instance) = instances.iter_mut().find(|instance| instance.id == id) {
            instance.step = self.step(&instance.buffer, rate);
        }
    }

    fn set_volume(&self, id: PlaybackId, volume_db: f64) {
        let mut instances = self.instances.lock();
        if let Some(instance) = instances.iter_mut().find(|instance| instance.id == id) {
            instance.gain = db_to_gain(volume_db);
        }
    }
}
