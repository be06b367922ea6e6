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
use std::{
    collections::HashSet,
    error::Error,
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::info;

use super::{PlaybackId, PlaybackRequest};

/// Something that happened on a mock output.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputEvent {
    Started {
        id: PlaybackId,
        sample: String,
        rate: f64,
        volume_db: f64,
        looped: bool,
        attack: Option<Duration>,
    },
    Stopped {
        id: PlaybackId,
        release: Option<Duration>,
    },
    RateChanged {
        id: PlaybackId,
        rate: f64,
    },
    VolumeChanged {
        id: PlaybackId,
        volume_db: f64,
    },
}

/// A mock output. Doesn't actually play anything, it records every call in order
/// and only completes instances when told to.
pub struct Output {
    name: String,
    events: Mutex<Vec<OutputEvent>>,
    active: Mutex<HashSet<PlaybackId>>,
    completions: Sender<PlaybackId>,
    reject_starts: AtomicBool,
}

impl Output {
    /// Creates a mock output and the receiver for its completion notifications.
    pub fn new(name: &str) -> (Output, Receiver<PlaybackId>) {
        let (completions, receiver) = crossbeam_channel::unbounded();
        (
            Output {
                name: name.to_string(),
                events: Mutex::new(Vec::new()),
                active: Mutex::new(HashSet::new()),
                completions,
                reject_starts: AtomicBool::new(false),
            },
            receiver,
        )
    }

    /// Returns every event recorded so far.
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().clone()
    }

    /// Forgets recorded events.
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Returns the IDs of every started instance in start order.
    pub fn started(&self) -> Vec<PlaybackId> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Started { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of instances that are neither stopped nor completed.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Returns true if the given instance is still sounding.
    pub fn is_active(&self, id: PlaybackId) -> bool {
        self.active.lock().contains(&id)
    }

    /// Finishes an instance as if its sample had played out.
    pub fn complete(&self, id: PlaybackId) {
        if self.active.lock().remove(&id) {
            let _ = self.completions.send(id);
        }
    }

    /// Makes every following start fail.
    pub fn reject_starts(&self, reject: bool) {
        self.reject_starts.store(reject, Ordering::Relaxed);
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (mock)", self.name)
    }
}

impl super::Output for Output {
    fn start(&self, request: PlaybackRequest) -> Result<PlaybackId, Box<dyn Error>> {
        if self.reject_starts.load(Ordering::Relaxed) {
            return Err(format!("{} is not accepting playback", self.name).into());
        }

        let id = PlaybackId::next();
        info!(
            output = self.name,
            sample = request.buffer.name(),
            rate = request.rate,
            looped = request.looped,
            %id,
            "Starting playback (mock)."
        );
        self.active.lock().insert(id);
        self.events.lock().push(OutputEvent::Started {
            id,
            sample: request.buffer.name().to_string(),
            rate: request.rate,
            volume_db: request.volume_db,
            looped: request.looped,
            attack: request.attack,
        });
        Ok(id)
    }

    fn stop(&self, id: PlaybackId, release: Option<Duration>) {
        self.active.lock().remove(&id);
        self.events
            .lock()
            .push(OutputEvent::Stopped { id, release });
    }

    fn set_rate(&self, id: PlaybackId, rate: f64) {
        self.events
            .lock()
            .push(OutputEvent::RateChanged { id, rate });
    }

    fn set_volume(&self, id: PlaybackId, volume_db: f64) {
        self.events
            .lock()
            .push(OutputEvent::VolumeChanged { id, volume_db });
    }
}
