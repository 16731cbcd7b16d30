// SPDX-License-Identifier: MIT OR Apache-2.0
//! Audio and captions bridge.
//!
//! The animator never decodes audio. It asks a [`SoundLibrary`] to start an
//! alias, then polls the returned [`SoundInstance`] once per tick for its
//! playback position and forwards pause state to it. Captions are driven by
//! seeking them to the sound position while a captioned sound is attached.

use crate::timeline::TimelineId;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A playing sound, as seen by the animator
pub trait SoundInstance {
    /// False once the sound was stopped or failed
    fn is_valid(&self) -> bool;
    /// Playback position in milliseconds
    fn position_ms(&self) -> f64;
    /// Total length in milliseconds
    fn length_ms(&self) -> f64;
    /// Pause playback
    fn pause(&self);
    /// Resume playback
    fn unpause(&self);
    /// Stop playback
    fn stop(&self);
}

/// Shared handle to a playing sound
pub type SoundHandle = Rc<dyn SoundInstance>;

/// One-shot notification from the sound library
pub type SoundCallback = Box<dyn FnOnce()>;

/// Source of sound instances
pub trait SoundLibrary {
    /// Start a sound. `on_finished` runs when it ends naturally and
    /// `on_started` once its final length is known.
    fn play(
        &self,
        alias: &str,
        on_finished: SoundCallback,
        on_started: SoundCallback,
    ) -> Option<SoundHandle>;

    /// Hint that an alias will be played soon
    fn preload(&self, _alias: &str) {}
}

/// Caption display synchronized to sounds
pub trait Captions {
    /// Whether captions exist for a sound alias
    fn has_caption(&self, alias: &str) -> bool;
    /// A slave captions object only moves when seeked
    fn set_slave(&self, slave: bool);
    /// Start the captions for an alias
    fn run(&self, alias: &str);
    /// Show the caption for a sound position in milliseconds
    fn seek(&self, position_ms: f64);
    /// Hide captions
    fn stop(&self);
}

/// Sound request attached to a play call
#[derive(Debug, Clone, PartialEq)]
pub struct SoundData {
    /// Sound alias
    pub alias: String,
    /// Seconds into the animation at which the sound starts
    pub start: f64,
}

impl SoundData {
    /// Sound that starts at a given offset
    pub fn new(alias: impl Into<String>, start: f64) -> Self {
        Self {
            alias: alias.into(),
            start: start.max(0.0),
        }
    }
}

impl From<&str> for SoundData {
    fn from(alias: &str) -> Self {
        Self::new(alias, 0.0)
    }
}

impl From<String> for SoundData {
    fn from(alias: String) -> Self {
        Self::new(alias, 0.0)
    }
}

/// Sound bookkeeping of one timeline
pub(crate) struct SoundSync {
    pub alias: String,
    /// Seconds into the animation where the sound starts
    pub start: f64,
    /// Seconds into the animation where the sound ends, once known
    pub end: f64,
    pub handle: Option<SoundHandle>,
    /// Sound requested but not started yet
    pub pending_play: bool,
    pub use_captions: bool,
}

impl SoundSync {
    pub fn new(data: SoundData, use_captions: bool) -> Self {
        Self {
            alias: data.alias,
            start: data.start,
            end: 0.0,
            handle: None,
            pending_play: true,
            use_captions,
        }
    }

    /// Start the sound through the library and hook captions to it
    pub fn attach(
        &mut self,
        timeline: TimelineId,
        library: Option<&Rc<dyn SoundLibrary>>,
        captions: Option<&Rc<dyn Captions>>,
        mailbox: &SoundMailbox,
    ) {
        self.pending_play = false;
        let Some(library) = library else {
            tracing::warn!("No sound library set, cannot play \"{}\"", self.alias);
            return;
        };

        let (on_finished, on_started) = mailbox.callbacks(timeline);
        self.handle = library.play(&self.alias, on_finished, on_started);
        if self.handle.is_none() {
            tracing::warn!("Sound library refused to play \"{}\"", self.alias);
            return;
        }

        if self.use_captions {
            if let Some(captions) = captions {
                captions.set_slave(true);
                captions.run(&self.alias);
            }
        }
    }

    pub fn set_paused(&self, paused: bool) {
        if let Some(handle) = &self.handle {
            if paused {
                handle.pause();
            } else {
                handle.unpause();
            }
        }
    }
}

/// Notification queued by a sound library callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SoundEvent {
    Started(TimelineId),
    Finished(TimelineId),
}

/// Queue between sound library callbacks and the tick loop.
///
/// Libraries may fire their callbacks from inside `play()`; queueing keeps
/// them from touching the registry while it is borrowed.
#[derive(Clone, Default)]
pub(crate) struct SoundMailbox {
    events: Rc<RefCell<VecDeque<SoundEvent>>>,
}

impl SoundMailbox {
    pub fn callbacks(&self, timeline: TimelineId) -> (SoundCallback, SoundCallback) {
        let finished = Rc::clone(&self.events);
        let started = Rc::clone(&self.events);
        (
            Box::new(move || finished.borrow_mut().push_back(SoundEvent::Finished(timeline))),
            Box::new(move || started.borrow_mut().push_back(SoundEvent::Started(timeline))),
        )
    }

    pub fn drain(&self) -> Vec<SoundEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_data_from_alias() {
        let data = SoundData::from("intro");
        assert_eq!(data.alias, "intro");
        assert_eq!(data.start, 0.0);
        assert_eq!(SoundData::new("late", -2.0).start, 0.0);
    }

    #[test]
    fn test_mailbox_orders_events() {
        let mailbox = SoundMailbox::default();
        let timeline = TimelineId::new();
        let (finished, started) = mailbox.callbacks(timeline);
        started();
        finished();
        assert_eq!(
            mailbox.drain(),
            vec![SoundEvent::Started(timeline), SoundEvent::Finished(timeline)]
        );
        assert!(mailbox.drain().is_empty());
    }
}
