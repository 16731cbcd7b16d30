// SPDX-License-Identifier: MIT OR Apache-2.0
//! Skeletal (multi-track) playback.
//!
//! A skeleton plays either one named animation, an ordered list where only
//! the last entry may loop, or several layers at once. Each layer is a track
//! with its own clock; the animator poses every track once per tick. Layered
//! playback ends as soon as any non-looping layer reaches its end.

use crate::advance::{advance_clock, Clock, StepOutcome, TickContext};
use crate::animator::{Animator, RemovalCause};
use crate::audio::SoundSync;
use crate::error::{AnimatorError, Result};
use crate::options::{PlayOptions, StartPosition};
use crate::target::{Identified, Skeleton, SkeletonRef};
use crate::timeline::{PlaybackMode, TimelineHandle, TimelineId, TimelineRecord};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::rc::Rc;

/// One simultaneous layer of a layered request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletalLayer {
    /// Animation name
    pub animation: String,
    /// Whether this layer wraps
    #[serde(default)]
    pub looping: bool,
    /// Speed override, the play speed otherwise
    #[serde(default)]
    pub speed: Option<f64>,
}

impl SkeletalLayer {
    /// Layer playing an animation once
    pub fn new(animation: impl Into<String>) -> Self {
        Self {
            animation: animation.into(),
            looping: false,
            speed: None,
        }
    }

    /// Make the layer wrap
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Give the layer its own speed
    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

/// What to play on a skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkeletalRequest {
    /// A single animation
    Single {
        /// Animation name
        animation: String,
        /// Whether it wraps
        looping: bool,
    },
    /// Animations played back to back
    Sequence {
        /// Animation names, in order
        animations: Vec<String>,
        /// Whether the last animation wraps
        loop_last: bool,
    },
    /// Animations played at the same time
    Layered(Vec<SkeletalLayer>),
}

impl SkeletalRequest {
    /// A single animation
    pub fn single(animation: impl Into<String>, looping: bool) -> Self {
        Self::Single {
            animation: animation.into(),
            looping,
        }
    }

    /// Animations back to back
    pub fn sequence<S: Into<String>>(animations: impl IntoIterator<Item = S>, loop_last: bool) -> Self {
        Self::Sequence {
            animations: animations.into_iter().map(Into::into).collect(),
            loop_last,
        }
    }

    /// Simultaneous layers
    pub fn layered(layers: impl IntoIterator<Item = SkeletalLayer>) -> Self {
        Self::Layered(layers.into_iter().collect())
    }

    /// Every animation name the request refers to
    pub fn animation_names(&self) -> Vec<&str> {
        match self {
            Self::Single { animation, .. } => vec![animation.as_str()],
            Self::Sequence { animations, .. } => animations.iter().map(String::as_str).collect(),
            Self::Layered(layers) => layers.iter().map(|l| l.animation.as_str()).collect(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Layered(_) => self.animation_names().join("+"),
            _ => self.animation_names().join(","),
        }
    }
}

#[derive(Debug, Clone)]
struct TrackClip {
    animation: String,
    duration: f64,
    looping: bool,
}

/// One layer's playhead
#[derive(Debug, Clone)]
pub(crate) struct SkeletalTrack {
    clips: VecDeque<TrackClip>,
    /// Seconds into the current clip
    time: f64,
    speed: Option<f64>,
    finished: bool,
}

impl SkeletalTrack {
    fn new(clips: Vec<TrackClip>, speed: Option<f64>) -> Self {
        Self {
            clips: clips.into(),
            time: 0.0,
            speed,
            finished: false,
        }
    }

    fn rate(&self, timeline_speed: f64) -> f64 {
        self.speed
            .filter(|speed| speed.is_finite() && *speed > 0.0)
            .unwrap_or(timeline_speed)
    }

    /// Move the playhead; returns how often the current clip wrapped and
    /// whether the track ended
    fn advance(&mut self, delta: f64) -> (u32, bool) {
        if self.finished {
            return (0, true);
        }
        self.time += delta.max(0.0);

        let mut loops = 0;
        loop {
            let Some(clip) = self.clips.front() else {
                self.finished = true;
                return (loops, true);
            };
            if self.time < clip.duration {
                return (loops, false);
            }

            if clip.looping {
                if clip.duration > 0.0 {
                    let wraps = (self.time / clip.duration).floor();
                    self.time -= wraps * clip.duration;
                    loops += wraps as u32;
                } else {
                    self.time = 0.0;
                    loops += 1;
                }
                return (loops, false);
            }

            if self.clips.len() > 1 {
                self.time -= clip.duration;
                self.clips.pop_front();
                continue;
            }

            self.time = clip.duration;
            self.finished = true;
            return (loops, true);
        }
    }
}

/// Skeletal playhead: a shared clock plus one track per layer
#[derive(Debug, Clone)]
pub(crate) struct SkeletalCursor {
    tracks: Vec<SkeletalTrack>,
    /// Seconds since the timeline started
    pub time: f64,
}

impl SkeletalCursor {
    fn new(tracks: Vec<SkeletalTrack>) -> Self {
        Self { tracks, time: 0.0 }
    }

    /// Whether the timeline can only end by being stopped
    pub fn looping(&self) -> bool {
        self.tracks.iter().all(|track| {
            track.clips.len() == 1 && track.clips.front().is_some_and(|clip| clip.looping)
        })
    }

    /// Length of the first layer's current animation
    pub fn primary_duration(&self) -> f64 {
        self.tracks
            .first()
            .and_then(|track| track.clips.front())
            .map_or(0.0, |clip| clip.duration)
    }

    /// Seconds into the first layer's current animation
    pub fn position(&self) -> f64 {
        self.tracks.first().map_or(0.0, |track| track.time)
    }

    fn advance_tracks(&mut self, delta: f64, speed: f64) -> StepOutcome {
        let mut primary_loops = 0;
        let mut finished = false;
        for (index, track) in self.tracks.iter_mut().enumerate() {
            let (loops, done) = track.advance(delta * track.rate(speed));
            if index == 0 {
                primary_loops = loops;
            }
            finished |= done;
        }

        if finished {
            StepOutcome::Finished
        } else if primary_loops > 0 {
            StepOutcome::Looped(primary_loops)
        } else {
            StepOutcome::Playing
        }
    }

    fn apply(&self, skeleton: &mut dyn Skeleton) {
        for (layer, track) in self.tracks.iter().enumerate() {
            if let Some(clip) = track.clips.front() {
                skeleton.apply(layer, &clip.animation, track.time, clip.looping);
            }
        }
    }

    pub(crate) fn step(
        &mut self,
        timeline: TimelineId,
        skeleton: &SkeletonRef,
        sound: &mut Option<SoundSync>,
        speed: f64,
        ctx: &TickContext<'_>,
    ) -> StepOutcome {
        let previous = self.time;
        let clock = advance_clock(timeline, &mut self.time, sound, 1.0, ctx);
        if clock == Clock::SoundLost {
            tracing::debug!("Sound lost, ending skeletal timeline");
            return StepOutcome::Finished;
        }

        let outcome = self.advance_tracks(self.time - previous, speed);
        self.apply(&mut *skeleton.borrow_mut());
        outcome
    }
}

impl Animator {
    /// Play animations on a skeleton.
    ///
    /// Same replacement and failure rules as [`Animator::play`]: an unknown
    /// animation name runs the callback at once and returns the error.
    pub fn play_skeleton(
        &self,
        skeleton: SkeletonRef,
        request: SkeletalRequest,
        options: PlayOptions,
    ) -> Result<TimelineHandle> {
        self.ensure_initialized();
        let instance = skeleton.id();

        if self.has_timeline(&instance) {
            self.remove_timeline(
                instance,
                None,
                !options.cancel_previous_callback,
                RemovalCause::Interrupted,
            );
        }

        let result = self.build_skeletal_record(&skeleton, &request, &options);
        self.finish_play(instance, &request.describe(), result, &options)
    }

    fn build_skeletal_record(
        &self,
        skeleton: &SkeletonRef,
        request: &SkeletalRequest,
        options: &PlayOptions,
    ) -> Result<TimelineRecord> {
        let mut state = self.inner.borrow_mut();
        let state = &mut *state;
        let mut target = skeleton.borrow_mut();
        let instance = target.id();

        let clip = |animation: &str, looping: bool| -> Result<TrackClip> {
            let duration = target
                .animation_duration(animation)
                .filter(|duration| duration.is_finite())
                .ok_or_else(|| AnimatorError::AnimationNotFound {
                    instance,
                    animation: animation.to_string(),
                })?;
            Ok(TrackClip {
                animation: animation.to_string(),
                duration: duration.max(0.0),
                looping,
            })
        };

        let tracks = match request {
            SkeletalRequest::Single { animation, looping } => {
                vec![SkeletalTrack::new(vec![clip(animation, *looping)?], None)]
            }
            SkeletalRequest::Sequence {
                animations,
                loop_last,
            } => {
                let last = animations.len().saturating_sub(1);
                let clips = animations
                    .iter()
                    .enumerate()
                    .map(|(index, animation)| clip(animation, *loop_last && index == last))
                    .collect::<Result<Vec<_>>>()?;
                if clips.is_empty() {
                    Vec::new()
                } else {
                    vec![SkeletalTrack::new(clips, None)]
                }
            }
            SkeletalRequest::Layered(layers) => layers
                .iter()
                .map(|layer| {
                    Ok(SkeletalTrack::new(
                        vec![clip(&layer.animation, layer.looping)?],
                        layer.speed,
                    ))
                })
                .collect::<Result<Vec<_>>>()?,
        };
        if tracks.is_empty() {
            return Err(AnimatorError::EmptyRequest { instance });
        }

        let mut cursor = SkeletalCursor::new(tracks);
        let offset = match options.start {
            StartPosition::Beginning => 0.0,
            StartPosition::Seconds(seconds) if seconds.is_finite() => seconds.max(0.0),
            StartPosition::Seconds(_) => 0.0,
            StartPosition::Frame(frame) => frame as f64 / state.config.resolve_fps(None),
            StartPosition::Random => state.rng.gen::<f64>() * cursor.primary_duration(),
        };

        let speed = options.sanitized_speed();
        if offset > 0.0 {
            cursor.time = offset;
            cursor.advance_tracks(offset, speed);
        }
        cursor.apply(&mut *target);

        let timeline = TimelineId::new();
        let sound = options
            .sound
            .clone()
            .map(|data| self.prepare_sound(state, timeline, data, cursor.time));

        Ok(TimelineRecord {
            id: timeline,
            instance,
            segment: request.describe(),
            mode: PlaybackMode::Skeletal {
                skeleton: Rc::clone(skeleton),
                cursor,
            },
            speed,
            paused: false,
            on_complete: options.on_complete.clone(),
            sound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnimatorError;
    use crate::target::AnimationTarget;
    use crate::test_support::{counter, MockSkeleton, MockSoundLibrary};
    use std::cell::RefCell;

    fn skeleton() -> Rc<RefCell<MockSkeleton>> {
        Rc::new(RefCell::new(
            MockSkeleton::new()
                .with_animation("walk", 1.0)
                .with_animation("jump", 0.5)
                .with_animation("wave", 2.0),
        ))
    }

    #[test]
    fn test_track_sequence_pops_finished_clips() {
        let clips = vec![
            TrackClip {
                animation: "a".into(),
                duration: 1.0,
                looping: false,
            },
            TrackClip {
                animation: "b".into(),
                duration: 1.0,
                looping: true,
            },
        ];
        let mut track = SkeletalTrack::new(clips, None);

        assert_eq!(track.advance(1.5), (0, false));
        assert_eq!(track.clips.front().unwrap().animation, "b");
        assert_eq!(track.time, 0.5);

        assert_eq!(track.advance(2.0), (2, false));
        assert_eq!(track.time, 0.5);
    }

    #[test]
    fn test_single_animation_finishes() {
        let animator = Animator::default();
        let target = skeleton();
        let (hits, on_complete) = counter();

        animator
            .play_skeleton(
                target.clone(),
                SkeletalRequest::single("walk", false),
                PlayOptions::new().on_complete(on_complete),
            )
            .unwrap();
        assert_eq!(target.borrow().last_pose(0), Some(("walk".to_string(), 0.0)));

        animator.update(500.0);
        assert_eq!(hits.get(), 0);
        assert_eq!(target.borrow().last_pose(0), Some(("walk".to_string(), 0.5)));

        animator.update(500.0);
        assert_eq!(hits.get(), 1);
        assert!(!animator.has_timeline(&target));
        assert_eq!(target.borrow().stops, 1);
    }

    #[test]
    fn test_single_looping_reports_loops() {
        let animator = Animator::default();
        let target = skeleton();
        let (hits, on_complete) = counter();

        animator
            .play_skeleton(
                target.clone(),
                SkeletalRequest::single("jump", true),
                PlayOptions::new().on_complete(on_complete),
            )
            .unwrap();
        animator.update(1250.0);

        assert_eq!(hits.get(), 2);
        let info = animator.get_timeline(&target).unwrap();
        assert!(info.looping);
        assert_eq!(info.position, 0.25);
    }

    #[test]
    fn test_sequence_plays_in_order() {
        let animator = Animator::default();
        let target = skeleton();
        let (hits, on_complete) = counter();

        animator
            .play_skeleton(
                target.clone(),
                SkeletalRequest::sequence(["jump", "walk"], false),
                PlayOptions::new().on_complete(on_complete),
            )
            .unwrap();

        animator.update(750.0);
        assert_eq!(target.borrow().last_pose(0), Some(("walk".to_string(), 0.25)));
        assert_eq!(hits.get(), 0);

        animator.update(750.0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_layered_ends_with_first_non_looping_layer() {
        let animator = Animator::default();
        let target = skeleton();
        let (hits, on_complete) = counter();

        animator
            .play_skeleton(
                target.clone(),
                SkeletalRequest::layered([
                    SkeletalLayer::new("walk").looping(true),
                    SkeletalLayer::new("wave").speed(4.0),
                ]),
                PlayOptions::new().on_complete(on_complete),
            )
            .unwrap();

        animator.update(250.0);
        assert_eq!(target.borrow().last_pose(1), Some(("wave".to_string(), 1.0)));
        assert_eq!(hits.get(), 0);

        animator.update(250.0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unknown_animation_fails_with_callback() {
        let animator = Animator::default();
        let target = skeleton();
        let (hits, on_complete) = counter();

        let result = animator.play_skeleton(
            target.clone(),
            SkeletalRequest::sequence(["walk", "fly"], false),
            PlayOptions::new().on_complete(on_complete),
        );

        assert!(matches!(
            result,
            Err(AnimatorError::AnimationNotFound { ref animation, .. }) if animation == "fly"
        ));
        assert_eq!(hits.get(), 1);
        assert!(animator.get_timeline(&target).is_none());
    }

    #[test]
    fn test_empty_request_rejected() {
        let animator = Animator::default();
        let result = animator.play_skeleton(
            skeleton(),
            SkeletalRequest::Layered(Vec::new()),
            PlayOptions::new(),
        );
        assert!(matches!(result, Err(AnimatorError::EmptyRequest { .. })));
    }

    #[test]
    fn test_start_offset_applied() {
        let animator = Animator::default();
        let target = skeleton();

        animator
            .play_skeleton(
                target.clone(),
                SkeletalRequest::single("wave", false),
                PlayOptions::new().start(StartPosition::Seconds(0.5)),
            )
            .unwrap();
        assert_eq!(target.borrow().last_pose(0), Some(("wave".to_string(), 0.5)));
    }

    #[test]
    fn test_instance_has_animation_for_skeletons() {
        let animator = Animator::default();
        let target = AnimationTarget::skeleton(skeleton());
        assert!(animator.instance_has_animation(&target, "walk"));
        assert!(!animator.instance_has_animation(&target, "fly"));
    }

    #[test]
    fn test_looping_layer_keeps_running_on_sound_clock() {
        let library = Rc::new(MockSoundLibrary::default());
        let animator = Animator::default();
        animator.set_sound_library(library.clone());
        let target = skeleton();
        let (hits, on_complete) = counter();

        animator
            .play_skeleton(
                target.clone(),
                SkeletalRequest::single("jump", true),
                PlayOptions::new().sound("music").on_complete(on_complete),
            )
            .unwrap();
        let sound = library.last_sound().unwrap();

        sound.position.set(1250.0);
        animator.update(16.0);
        assert_eq!(hits.get(), 2);
        assert!(animator.has_timeline(&target));
        assert_eq!(target.borrow().last_pose(0), Some(("jump".to_string(), 0.25)));
    }
}
