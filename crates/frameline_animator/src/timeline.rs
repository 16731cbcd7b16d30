// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline records: the live state of one playing segment.

use crate::audio::SoundSync;
use crate::config::Addressing;
use crate::label::SegmentBounds;
use crate::options::CompletionFn;
use crate::skeletal::SkeletalCursor;
use crate::target::{ClipRef, InstanceId, SkeletonRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one playback.
///
/// Replaying a segment on the same instance yields a new ID, which keeps
/// stale removals from touching the replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineId(pub Uuid);

impl TimelineId {
    /// Create a new random timeline ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimelineId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by a successful play call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimelineHandle {
    /// Animated instance
    pub instance: InstanceId,
    /// This playback
    pub timeline: TimelineId,
}

/// Playback kind of a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackKind {
    /// Frame-addressed clip
    Frames,
    /// Time-addressed clip
    Time,
    /// Skeletal layers
    Skeletal,
}

impl From<Addressing> for PlaybackKind {
    fn from(addressing: Addressing) -> Self {
        match addressing {
            Addressing::Frames => Self::Frames,
            Addressing::Time => Self::Time,
        }
    }
}

/// Snapshot of a timeline, for callers and diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineInfo {
    /// Playback ID
    pub id: TimelineId,
    /// Animated instance
    pub instance: InstanceId,
    /// Segment or animation name
    pub segment: String,
    /// Playback kind
    pub kind: PlaybackKind,
    /// Segment frame bounds (clips only)
    pub bounds: Option<SegmentBounds>,
    /// Whether the timeline wraps instead of finishing
    pub looping: bool,
    /// Speed multiplier
    pub speed: f64,
    /// Playhead: frames into the segment for frame addressing, seconds otherwise
    pub position: f64,
    /// Segment length in the same unit as `position`
    pub duration: f64,
    /// Whether this timeline is paused
    pub paused: bool,
    /// Sound alias, if synchronized to one
    pub sound_alias: Option<String>,
    /// Whether the sound is currently attached and drives the clock
    pub sound_attached: bool,
}

/// Frame-addressed playhead state
#[derive(Debug, Clone)]
pub(crate) struct FrameCursor {
    pub bounds: SegmentBounds,
    /// Frame the drop-frame clock counts from
    pub real_start_frame: u32,
    /// Last frame has been shown once and is being held
    pub is_last_frame: bool,
    /// Milliseconds accrued for frame dropping
    pub time_passed: f64,
    pub drop_frames: bool,
}

impl FrameCursor {
    pub fn new(bounds: SegmentBounds, real_start_frame: u32, drop_frames: bool) -> Self {
        Self {
            bounds,
            real_start_frame,
            is_last_frame: false,
            time_passed: 0.0,
            drop_frames,
        }
    }

    /// Add a tick's worth of time, never less than one frame
    pub fn accrue(&mut self, elapsed_ms: f64, frame_length_ms: f64) {
        self.time_passed += elapsed_ms.max(frame_length_ms);
    }

    /// Frame the clip should be on given the accrued time
    pub fn expected_frame(&self, frames_per_ms: f64) -> u32 {
        ((self.time_passed * frames_per_ms).round().max(0.0) as u32)
            .saturating_add(self.real_start_frame)
    }

    /// Fold a frame past the segment end back into the segment
    pub fn wrap(&self, expected: u32) -> u32 {
        let first = self.bounds.first_frame;
        let length = self.bounds.length();
        if length == 0 {
            return first;
        }
        expected.saturating_sub(first) % length + first
    }

    /// Restart the drop-frame clock from a wrapped frame
    pub fn rebase(&mut self, frame: u32, frames_per_ms: f64) {
        let first = self.bounds.first_frame;
        self.time_passed = (frame.saturating_sub(first) as f64 / frames_per_ms).round();
        self.real_start_frame = first;
    }
}

/// Time-addressed playhead state
#[derive(Debug, Clone)]
pub(crate) struct TimeCursor {
    pub bounds: SegmentBounds,
    /// Segment start in seconds from frame zero
    pub start_time: f64,
    /// Segment length in seconds
    pub duration: f64,
    /// Seconds into the segment
    pub time: f64,
    /// Wraps already reported while a sound drove the playhead
    pub sound_loops: u32,
}

/// The position-advancement strategy of a timeline, with its target
pub(crate) enum PlaybackMode {
    Frames { clip: ClipRef, cursor: FrameCursor },
    Time { clip: ClipRef, cursor: TimeCursor },
    Skeletal { skeleton: SkeletonRef, cursor: SkeletalCursor },
}

impl PlaybackMode {
    pub fn kind(&self) -> PlaybackKind {
        match self {
            Self::Frames { .. } => PlaybackKind::Frames,
            Self::Time { .. } => PlaybackKind::Time,
            Self::Skeletal { .. } => PlaybackKind::Skeletal,
        }
    }
}

/// One active playback
pub(crate) struct TimelineRecord {
    pub id: TimelineId,
    pub instance: InstanceId,
    pub segment: String,
    pub mode: PlaybackMode,
    pub speed: f64,
    pub paused: bool,
    pub on_complete: Option<CompletionFn>,
    pub sound: Option<SoundSync>,
}

impl TimelineRecord {
    pub fn handle(&self) -> TimelineHandle {
        TimelineHandle {
            instance: self.instance,
            timeline: self.id,
        }
    }

    /// Pause or resume the record, its target, and its sound
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;

        match &self.mode {
            PlaybackMode::Frames { clip, .. } | PlaybackMode::Time { clip, .. } => {
                let mut clip = clip.borrow_mut();
                if paused {
                    clip.stop();
                } else {
                    clip.play();
                }
            }
            PlaybackMode::Skeletal { .. } => {}
        }

        if let Some(sound) = &self.sound {
            sound.set_paused(paused);
        }
    }

    /// Stop the target's own playback
    pub fn stop_target(&self) {
        match &self.mode {
            PlaybackMode::Frames { clip, .. } | PlaybackMode::Time { clip, .. } => {
                clip.borrow_mut().stop();
            }
            PlaybackMode::Skeletal { skeleton, .. } => skeleton.borrow_mut().stop(),
        }
    }

    /// Continue on elapsed time from where a finished sound ended.
    ///
    /// `end` is seconds since the segment start; a looping time cursor
    /// counts it from its last reported wrap.
    pub fn resume_after_sound(&mut self, end: f64) {
        if end <= 0.0 {
            return;
        }
        match &mut self.mode {
            PlaybackMode::Time { cursor, .. } => {
                let end = end - f64::from(cursor.sound_loops) * cursor.duration;
                if end > cursor.time {
                    cursor.time = end;
                }
            }
            PlaybackMode::Skeletal { cursor, .. } => {
                if end > cursor.time {
                    cursor.time = end;
                }
            }
            PlaybackMode::Frames { .. } => {}
        }
    }

    pub fn info(&self) -> TimelineInfo {
        let (bounds, looping, position, duration) = match &self.mode {
            PlaybackMode::Frames { clip, cursor } => {
                let current = clip.borrow().current_frame();
                (
                    Some(cursor.bounds),
                    cursor.bounds.looping,
                    current.saturating_sub(cursor.bounds.first_frame) as f64,
                    cursor.bounds.length() as f64,
                )
            }
            PlaybackMode::Time { cursor, .. } => (
                Some(cursor.bounds),
                cursor.bounds.looping,
                cursor.time,
                cursor.duration,
            ),
            PlaybackMode::Skeletal { cursor, .. } => {
                (None, cursor.looping(), cursor.position(), cursor.primary_duration())
            }
        };

        TimelineInfo {
            id: self.id,
            instance: self.instance,
            segment: self.segment.clone(),
            kind: self.mode.kind(),
            bounds,
            looping,
            speed: self.speed,
            position,
            duration,
            paused: self.paused,
            sound_alias: self.sound.as_ref().map(|s| s.alias.clone()),
            sound_attached: self.sound.as_ref().is_some_and(|s| s.handle.is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(first: u32, last: u32) -> FrameCursor {
        FrameCursor::new(
            SegmentBounds {
                first_frame: first,
                last_frame: last,
                looping: true,
            },
            first,
            true,
        )
    }

    #[test]
    fn test_accrue_never_less_than_a_frame() {
        let mut c = cursor(0, 10);
        c.accrue(5.0, 16.0);
        assert_eq!(c.time_passed, 16.0);
        c.accrue(40.0, 16.0);
        assert_eq!(c.time_passed, 56.0);
    }

    #[test]
    fn test_expected_frame_saturates() {
        let mut c = cursor(5, 10);
        c.time_passed = 1e300;
        assert_eq!(c.expected_frame(0.01), u32::MAX);
    }

    #[test]
    fn test_expected_frame_counts_from_real_start() {
        let mut c = cursor(10, 20);
        c.time_passed = 100.0;
        // 30fps: 0.03 frames per ms
        assert_eq!(c.expected_frame(0.03), 13);
    }

    #[test]
    fn test_wrap_at_loop_boundary() {
        let c = cursor(10, 20);
        assert_eq!(c.wrap(20), 10);
        assert_eq!(c.wrap(23), 13);
        assert_eq!(c.wrap(19), 19);
        assert_eq!(c.wrap(41), 11);
    }

    #[test]
    fn test_wrap_zero_length() {
        let c = cursor(5, 5);
        assert_eq!(c.wrap(9), 5);
    }

    #[test]
    fn test_rebase() {
        let mut c = cursor(10, 20);
        c.real_start_frame = 14;
        c.rebase(13, 0.03);
        assert_eq!(c.real_start_frame, 10);
        assert_eq!(c.time_passed, 100.0);
        assert_eq!(c.expected_frame(0.03), 13);
    }
}
