// SPDX-License-Identifier: MIT OR Apache-2.0
//! Options accepted by the play calls.

use crate::animator::Animator;
use crate::audio::SoundData;
use crate::config::Addressing;
use std::fmt;
use std::rc::Rc;

/// Completion callback.
///
/// Receives the animator so it can chain further `play`/`stop` calls without
/// holding its own reference to it.
pub type CompletionFn = Rc<dyn Fn(&Animator)>;

/// Where playback starts inside a segment
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum StartPosition {
    /// The segment's first frame
    #[default]
    Beginning,
    /// Seconds into the segment
    Seconds(f64),
    /// Frames into the segment
    Frame(u32),
    /// A uniformly random point inside the segment
    Random,
}

/// Options for [`Animator::play`]
#[derive(Clone)]
pub struct PlayOptions {
    /// Called when the segment finishes, or on every loop of a looping one
    pub on_complete: Option<CompletionFn>,
    /// Multiplier on elapsed time
    pub speed: f64,
    /// Start position inside the segment
    pub start: StartPosition,
    /// Sound to synchronize to
    pub sound: Option<SoundData>,
    /// Suppress the completion callback of a timeline this call replaces
    pub cancel_previous_callback: bool,
    /// Allow frame dropping for this timeline (frame addressing only)
    pub drop_frames: bool,
    /// Override the configured addressing
    pub addressing: Option<Addressing>,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            on_complete: None,
            speed: 1.0,
            start: StartPosition::Beginning,
            sound: None,
            cancel_previous_callback: false,
            drop_frames: true,
            addressing: None,
        }
    }
}

impl PlayOptions {
    /// Options with every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the completion callback
    pub fn on_complete(mut self, callback: impl Fn(&Animator) + 'static) -> Self {
        self.on_complete = Some(Rc::new(callback));
        self
    }

    /// Set a completion callback that receives `args` on every call
    pub fn on_complete_with<A: 'static>(
        mut self,
        args: A,
        callback: impl Fn(&Animator, &A) + 'static,
    ) -> Self {
        self.on_complete = Some(Rc::new(move |animator: &Animator| callback(animator, &args)));
        self
    }

    /// Set the speed multiplier
    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Set the start position
    pub fn start(mut self, start: StartPosition) -> Self {
        self.start = start;
        self
    }

    /// Synchronize to a sound
    pub fn sound(mut self, sound: impl Into<SoundData>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    /// Whether a replaced timeline's callback is suppressed
    pub fn cancel_previous_callback(mut self, cancel: bool) -> Self {
        self.cancel_previous_callback = cancel;
        self
    }

    /// Allow or forbid frame dropping
    pub fn drop_frames(mut self, drop_frames: bool) -> Self {
        self.drop_frames = drop_frames;
        self
    }

    /// Force an addressing mode
    pub fn addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = Some(addressing);
        self
    }

    pub(crate) fn sanitized_speed(&self) -> f64 {
        if self.speed.is_finite() && self.speed > 0.0 {
            self.speed
        } else {
            1.0
        }
    }
}

impl fmt::Debug for PlayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayOptions")
            .field("on_complete", &self.on_complete.is_some())
            .field("speed", &self.speed)
            .field("start", &self.start)
            .field("sound", &self.sound)
            .field("cancel_previous_callback", &self.cancel_previous_callback)
            .field("drop_frames", &self.drop_frames)
            .field("addressing", &self.addressing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PlayOptions::new();
        assert_eq!(options.speed, 1.0);
        assert_eq!(options.start, StartPosition::Beginning);
        assert!(options.drop_frames);
        assert!(!options.cancel_previous_callback);
        assert!(options.on_complete.is_none());
    }

    #[test]
    fn test_false_is_respected() {
        let options = PlayOptions::new().drop_frames(false);
        assert!(!options.drop_frames);
    }

    #[test]
    fn test_invalid_speed_falls_back() {
        assert_eq!(PlayOptions::new().speed(0.0).sanitized_speed(), 1.0);
        assert_eq!(PlayOptions::new().speed(f64::NAN).sanitized_speed(), 1.0);
        assert_eq!(PlayOptions::new().speed(2.5).sanitized_speed(), 2.5);
    }

    #[test]
    fn test_sound_from_alias() {
        let options = PlayOptions::new().sound("voice");
        assert_eq!(options.sound.unwrap().alias, "voice");
    }
}
