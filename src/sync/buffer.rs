//! Event buffering
//!
//! Gates whether incoming events are applied immediately or queued, so a
//! consumer can hold a frozen view of the store (say, while editing a
//! request) without losing or reordering anything that arrives meanwhile.

use crate::protocol::event::Event;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// Events flow straight through to the reducer
    Live,
    /// Events are appended to the replay queue
    Paused,
}

/// FIFO gate in front of the reducer.
///
/// While paused (including while a resume drain is still running), admitted
/// events go to the back of the queue; they can never overtake events queued
/// before them.
#[derive(Debug)]
pub struct EventBuffer {
    mode: BufferMode,
    queue: VecDeque<Event>,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuffer {
    pub fn new() -> Self {
        Self {
            mode: BufferMode::Live,
            queue: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    pub fn is_paused(&self) -> bool {
        self.mode == BufferMode::Paused
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Suspend live application. Idempotent.
    pub fn pause(&mut self) {
        self.mode = BufferMode::Paused;
    }

    /// Admit an incoming event: `Some` means apply it now, `None` means it
    /// was queued for replay.
    #[must_use]
    pub fn admit(&mut self, event: Event) -> Option<Event> {
        match self.mode {
            BufferMode::Live => Some(event),
            BufferMode::Paused => {
                self.queue.push_back(event);
                None
            }
        }
    }

    /// Pop the next event to replay, in original arrival order. The caller
    /// keeps draining until this returns `None`, then calls
    /// [`EventBuffer::finish_replay`].
    pub fn next_replay(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    /// Return to live mode once the queue has been observed empty.
    pub fn finish_replay(&mut self) {
        debug_assert!(self.queue.is_empty(), "replay finished with events queued");
        self.mode = BufferMode::Live;
    }
}
