// SPDX-License-Identifier: MIT OR Apache-2.0
//! The timeline scheduler.
//!
//! [`Animator`] owns the registry of active timelines, at most one per
//! instance, kept in registration order. It subscribes to the host update
//! source while at least one timeline is active and unsubscribes when the
//! last one goes away.
//!
//! Completion callbacks run with no internal borrow held, so they may call
//! back into any animator method. Removal is identity-checked: a callback
//! that already stopped its own timeline is never processed twice.

use crate::audio::{Captions, SoundData, SoundLibrary, SoundMailbox, SoundSync};
use crate::config::{Addressing, AnimatorConfig};
use crate::error::{AnimatorError, Result};
use crate::label::{has_segment, resolve_segment};
use crate::options::{CompletionFn, PlayOptions, StartPosition};
use crate::target::{AnimationTarget, ClipRef, Container, Identified, InstanceId};
use crate::timeline::{
    FrameCursor, PlaybackMode, TimeCursor, TimelineHandle, TimelineId, TimelineInfo,
    TimelineRecord,
};
use crate::update::UpdateSource;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::rc::Rc;

/// Registry and collaborators, only touched through [`Animator`]
pub(crate) struct AnimatorState {
    pub config: AnimatorConfig,
    pub timelines: IndexMap<InstanceId, TimelineRecord>,
    /// Timelines that finished during the current tick
    pub removals: Vec<TimelineHandle>,
    pub paused: bool,
    pub subscribed: bool,
    pub updating: bool,
    pub initialized: bool,
    pub update_source: Option<Rc<dyn UpdateSource>>,
    pub sound_library: Option<Rc<dyn SoundLibrary>>,
    pub captions: Option<Rc<dyn Captions>>,
    pub rng: StdRng,
}

/// Why a timeline leaves the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemovalCause {
    /// Reached its end during a tick; its sound plays out
    Finished,
    /// Stopped or replaced; its sound is stopped
    Interrupted,
}

/// Frame-label animation scheduler.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Animator {
    pub(crate) inner: Rc<RefCell<AnimatorState>>,
    pub(crate) mailbox: SoundMailbox,
}

impl Animator {
    /// Create a scheduler
    pub fn new(config: AnimatorConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            inner: Rc::new(RefCell::new(AnimatorState {
                config,
                timelines: IndexMap::new(),
                removals: Vec::new(),
                paused: false,
                subscribed: false,
                updating: false,
                initialized: true,
                update_source: None,
                sound_library: None,
                captions: None,
                rng,
            })),
            mailbox: SoundMailbox::default(),
        }
    }

    /// Reset every collection to its initial, empty state
    pub fn init(&self) {
        {
            let mut state = self.inner.borrow_mut();
            self.stop_update(&mut state);
            state.timelines.clear();
            state.removals.clear();
            state.paused = false;
            state.updating = false;
            state.initialized = true;
        }
        self.mailbox.clear();
        tracing::debug!("Animator initialized");
    }

    /// Stop everything and release all timelines.
    ///
    /// A later play call initializes the scheduler again.
    pub fn destroy(&self) {
        self.stop_all();
        {
            let mut state = self.inner.borrow_mut();
            self.stop_update(&mut state);
            state.timelines.clear();
            state.removals.clear();
            state.paused = false;
            state.initialized = false;
        }
        self.mailbox.clear();
        tracing::debug!("Animator destroyed");
    }

    pub(crate) fn ensure_initialized(&self) {
        if !self.inner.borrow().initialized {
            self.init();
        }
    }

    /// Set the host update source, moving an active subscription over to it
    pub fn set_update_source(&self, source: Rc<dyn UpdateSource>) {
        let mut state = self.inner.borrow_mut();
        self.stop_update(&mut state);
        state.update_source = Some(source);
        if !state.paused && !state.timelines.is_empty() {
            self.start_update(&mut state);
        }
    }

    /// Set the sound library used for synchronized sounds
    pub fn set_sound_library(&self, library: Rc<dyn SoundLibrary>) {
        self.inner.borrow_mut().sound_library = Some(library);
    }

    /// Set or clear the captions display
    pub fn set_captions(&self, captions: Option<Rc<dyn Captions>>) {
        self.inner.borrow_mut().captions = captions;
    }

    /// Current configuration
    pub fn config(&self) -> AnimatorConfig {
        self.inner.borrow().config.clone()
    }

    /// Toggle engine-wide frame dropping
    pub fn set_use_frame_dropping(&self, enabled: bool) {
        self.inner.borrow_mut().config.use_frame_dropping = enabled;
    }

    /// Play a labelled segment on a clip.
    ///
    /// A timeline already running on the clip is stopped first; its callback
    /// fires unless `cancel_previous_callback` is set. When the segment can't
    /// be resolved the callback runs immediately and the error is returned.
    pub fn play(
        &self,
        clip: ClipRef,
        segment: &str,
        options: PlayOptions,
    ) -> Result<TimelineHandle> {
        self.ensure_initialized();
        let instance = clip.id();

        if self.has_timeline(&instance) {
            self.remove_timeline(
                instance,
                None,
                !options.cancel_previous_callback,
                RemovalCause::Interrupted,
            );
        }

        let result = self.build_clip_record(&clip, segment, &options);
        self.finish_play(instance, segment, result, &options)
    }

    /// Play a labelled segment starting at a random point inside it
    pub fn play_at_random_frame(
        &self,
        clip: ClipRef,
        segment: &str,
        options: PlayOptions,
    ) -> Result<TimelineHandle> {
        self.play(clip, segment, options.start(StartPosition::Random))
    }

    /// Register a built record, or report the failure
    pub(crate) fn finish_play(
        &self,
        instance: InstanceId,
        segment: &str,
        result: Result<TimelineRecord>,
        options: &PlayOptions,
    ) -> Result<TimelineHandle> {
        match result {
            Ok(record) => {
                // A callback fired while building may have started a new timeline here
                if self.has_timeline(&instance) {
                    self.remove_timeline(instance, None, false, RemovalCause::Interrupted);
                }
                Ok(self.activate(record))
            }
            Err(err) => {
                tracing::warn!("Cannot play \"{segment}\" on {instance}: {err}");
                if let Some(callback) = &options.on_complete {
                    callback(self);
                }
                Err(err)
            }
        }
    }

    fn build_clip_record(
        &self,
        clip: &ClipRef,
        segment: &str,
        options: &PlayOptions,
    ) -> Result<TimelineRecord> {
        let mut state = self.inner.borrow_mut();
        let state = &mut *state;
        let mut target = clip.borrow_mut();
        let instance = target.id();

        if target.labels().is_empty() {
            return Err(AnimatorError::IncompatibleTarget {
                instance,
                reason: "clip has no frame labels".to_string(),
            });
        }
        let bounds = resolve_segment(target.labels(), segment)?;

        let own_fps = target.framerate().filter(|fps| fps.is_finite() && *fps > 0.0);
        let fps = state.config.resolve_fps(own_fps);
        if own_fps.is_none() {
            target.set_framerate(fps);
        }
        target.set_advance_during_ticks(false);

        let timeline = TimelineId::new();
        let addressing = options.addressing.unwrap_or(state.config.addressing);

        let (mode, sound) = match addressing {
            Addressing::Time => {
                let duration = bounds.duration(fps);
                let time = match options.start {
                    StartPosition::Beginning => 0.0,
                    StartPosition::Seconds(seconds) => clamp_time(seconds, duration),
                    StartPosition::Frame(frame) => clamp_time(frame as f64 / fps, duration),
                    StartPosition::Random => state.rng.gen::<f64>() * duration,
                };
                let start_time = bounds.start_time(fps);
                target.set_elapsed_time(start_time + time);
                target.play();
                target.advance();

                let sound = options
                    .sound
                    .clone()
                    .map(|data| self.prepare_sound(state, timeline, data, time));
                let cursor = TimeCursor {
                    bounds,
                    start_time,
                    duration,
                    time,
                    sound_loops: 0,
                };
                (
                    PlaybackMode::Time {
                        clip: Rc::clone(clip),
                        cursor,
                    },
                    sound,
                )
            }
            Addressing::Frames => {
                let length = bounds.length();
                let offset = match options.start {
                    StartPosition::Beginning => 0,
                    StartPosition::Frame(frame) => frame.min(length),
                    StartPosition::Seconds(seconds) => {
                        ((seconds * fps).round().max(0.0) as u32).min(length)
                    }
                    StartPosition::Random => {
                        (state.rng.gen::<f64>() * length as f64).floor() as u32
                    }
                };
                let real_start = bounds.first_frame + offset;
                target.goto_and_play(real_start);

                if let Some(data) = &options.sound {
                    tracing::warn!(
                        "Sound \"{}\" ignored: frame-addressed timelines don't sync to sound",
                        data.alias
                    );
                }
                (
                    PlaybackMode::Frames {
                        clip: Rc::clone(clip),
                        cursor: FrameCursor::new(bounds, real_start, options.drop_frames),
                    },
                    None,
                )
            }
        };

        Ok(TimelineRecord {
            id: timeline,
            instance,
            segment: segment.to_string(),
            mode,
            speed: options.sanitized_speed(),
            paused: false,
            on_complete: options.on_complete.clone(),
            sound,
        })
    }

    /// Set up sound sync for a new timeline whose playhead is at `time`.
    ///
    /// A sound that starts with the animation is started right away; a later
    /// one is preloaded and attached by the tick loop.
    pub(crate) fn prepare_sound(
        &self,
        state: &AnimatorState,
        timeline: TimelineId,
        data: SoundData,
        time: f64,
    ) -> SoundSync {
        let use_captions = state
            .captions
            .as_ref()
            .is_some_and(|captions| captions.has_caption(&data.alias));
        let mut sync = SoundSync::new(data, use_captions);

        if sync.start <= 0.0 && time <= 0.0 {
            sync.attach(
                timeline,
                state.sound_library.as_ref(),
                state.captions.as_ref(),
                &self.mailbox,
            );
        } else if sync.start > 0.0 {
            if let Some(library) = &state.sound_library {
                library.preload(&sync.alias);
            }
        }
        sync
    }

    fn activate(&self, mut record: TimelineRecord) -> TimelineHandle {
        let mut state = self.inner.borrow_mut();
        if state.paused {
            record.set_paused(true);
        }
        let handle = record.handle();
        tracing::debug!("Playing \"{}\" on {}", record.segment, record.instance);
        state.timelines.insert(record.instance, record);
        if !state.paused {
            self.start_update(&mut state);
        }
        handle
    }

    /// Stop the timeline of an instance.
    ///
    /// The completion callback only runs when `do_callback` is set. Returns
    /// false when the instance had no timeline.
    pub fn stop(&self, instance: &impl Identified, do_callback: bool) -> bool {
        let id = instance.id();
        if self.remove_timeline(id, None, do_callback, RemovalCause::Interrupted) {
            true
        } else {
            tracing::debug!("No timeline was found matching the instance id {id}");
            false
        }
    }

    /// Stop every timeline without running callbacks
    pub fn stop_all(&self) {
        self.stop_matching(|_| true);
    }

    /// Stop every timeline whose instance lives in `container`, without callbacks
    pub fn stop_all_in<C: Container + ?Sized>(&self, container: &C) {
        self.stop_matching(|instance| container.contains(instance));
    }

    fn stop_matching(&self, filter: impl Fn(InstanceId) -> bool) {
        let handles: Vec<TimelineHandle> = self
            .inner
            .borrow()
            .timelines
            .values()
            .filter(|record| filter(record.instance))
            .map(TimelineRecord::handle)
            .collect();

        for handle in handles {
            self.remove_timeline(
                handle.instance,
                Some(handle.timeline),
                false,
                RemovalCause::Interrupted,
            );
        }
    }

    /// Remove a timeline if it is still the expected one.
    ///
    /// The sound keeps playing only when the timeline finished by itself.
    /// Returns false when there was nothing to remove.
    pub(crate) fn remove_timeline(
        &self,
        instance: InstanceId,
        expected: Option<TimelineId>,
        do_callback: bool,
        cause: RemovalCause,
    ) -> bool {
        let callback: Option<CompletionFn> = {
            let mut state = self.inner.borrow_mut();
            let matches = state
                .timelines
                .get(&instance)
                .is_some_and(|record| expected.map_or(true, |id| id == record.id));
            if !matches {
                return false;
            }
            let Some(record) = state.timelines.shift_remove(&instance) else {
                return false;
            };
            state.removals.retain(|handle| handle.timeline != record.id);

            record.stop_target();
            if let Some(sound) = &record.sound {
                if let Some(handle) = &sound.handle {
                    if cause == RemovalCause::Interrupted {
                        handle.stop();
                    }
                }
                if sound.use_captions && !sound.pending_play {
                    if let Some(captions) = &state.captions {
                        captions.stop();
                    }
                }
            }

            if state.timelines.is_empty() {
                self.stop_update(&mut state);
            }
            tracing::debug!("Removed \"{}\" from {}", record.segment, instance);
            record.on_complete.clone()
        };

        if do_callback {
            if let Some(callback) = callback {
                callback(self);
            }
        }
        true
    }

    /// Pause every timeline and leave the host update source
    pub fn pause(&self) {
        let mut state = self.inner.borrow_mut();
        if !state.initialized || state.paused {
            return;
        }
        state.paused = true;
        for record in state.timelines.values_mut() {
            record.set_paused(true);
        }
        self.stop_update(&mut state);
    }

    /// Resume every timeline paused by [`Animator::pause`]
    pub fn resume(&self) {
        let mut state = self.inner.borrow_mut();
        if !state.initialized || !state.paused {
            return;
        }
        state.paused = false;
        for record in state.timelines.values_mut() {
            record.set_paused(false);
        }
        if !state.timelines.is_empty() {
            self.start_update(&mut state);
        }
    }

    /// Pause or resume the timelines of instances inside `container`
    pub fn pause_in_group<C: Container + ?Sized>(&self, paused: bool, container: &C) {
        let mut state = self.inner.borrow_mut();
        for record in state.timelines.values_mut() {
            if container.contains(record.instance) {
                record.set_paused(paused);
            }
        }
    }

    /// Pause or resume a single timeline
    pub fn set_paused(&self, instance: &impl Identified, paused: bool) -> bool {
        let id = instance.id();
        let mut state = self.inner.borrow_mut();
        match state.timelines.get_mut(&id) {
            Some(record) => {
                record.set_paused(paused);
                true
            }
            None => false,
        }
    }

    /// Change the speed of a running timeline
    pub fn set_speed(&self, instance: &impl Identified, speed: f64) -> bool {
        let id = instance.id();
        let mut state = self.inner.borrow_mut();
        match state.timelines.get_mut(&id) {
            Some(record) if speed.is_finite() && speed > 0.0 => {
                record.speed = speed;
                true
            }
            _ => false,
        }
    }

    /// Snapshot of an instance's timeline
    pub fn get_timeline(&self, instance: &impl Identified) -> Option<TimelineInfo> {
        let id = instance.id();
        self.inner.borrow().timelines.get(&id).map(TimelineRecord::info)
    }

    /// Whether an instance has an active timeline
    pub fn has_timeline(&self, instance: &impl Identified) -> bool {
        let id = instance.id();
        self.inner.borrow().timelines.contains_key(&id)
    }

    /// Whether the scheduler is globally paused
    pub fn get_paused(&self) -> bool {
        self.inner.borrow().paused
    }

    /// Number of active timelines
    pub fn timeline_count(&self) -> usize {
        self.inner.borrow().timelines.len()
    }

    /// Whether the scheduler is subscribed to the host update source
    pub fn is_subscribed(&self) -> bool {
        self.inner.borrow().subscribed
    }

    /// Whether a target can play a segment or animation, without side effects
    pub fn instance_has_animation(&self, target: &AnimationTarget, name: &str) -> bool {
        match target {
            AnimationTarget::Clip(clip) => has_segment(clip.borrow().labels(), name),
            AnimationTarget::Skeleton(skeleton) => {
                skeleton.borrow().animation_duration(name).is_some()
            }
        }
    }

    pub(crate) fn start_update(&self, state: &mut AnimatorState) {
        if state.subscribed {
            return;
        }
        let Some(source) = state.update_source.clone() else {
            tracing::trace!("No update source set, timelines advance only on manual update");
            return;
        };

        let weak = Rc::downgrade(&self.inner);
        let mailbox = self.mailbox.clone();
        source.add_update_callback(
            &state.config.update_alias,
            Rc::new(move |elapsed: f64| {
                if let Some(inner) = weak.upgrade() {
                    let animator = Animator {
                        inner,
                        mailbox: mailbox.clone(),
                    };
                    animator.update(elapsed);
                }
            }),
        );
        state.subscribed = true;
        tracing::trace!("Subscribed to update source as \"{}\"", state.config.update_alias);
    }

    pub(crate) fn stop_update(&self, state: &mut AnimatorState) {
        if !state.subscribed {
            return;
        }
        if let Some(source) = &state.update_source {
            source.remove_update_callback(&state.config.update_alias);
        }
        state.subscribed = false;
        tracing::trace!("Unsubscribed \"{}\" from update source", state.config.update_alias);
    }
}

impl Default for Animator {
    fn default() -> Self {
        Self::new(AnimatorConfig::default())
    }
}

fn clamp_time(seconds: f64, duration: f64) -> f64 {
    if seconds.is_finite() {
        seconds.clamp(0.0, duration)
    } else {
        0.0
    }
}
