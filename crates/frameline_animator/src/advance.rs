// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-tick advancement of every active timeline.
//!
//! Each tick first applies queued sound notifications, then steps every
//! active, unpaused record in registration order over a snapshot of handles.
//! Finished records are only collected during the pass; they are removed,
//! with their completion callbacks, once every record has been stepped.

use crate::animator::{Animator, RemovalCause};
use crate::audio::{Captions, SoundEvent, SoundLibrary, SoundMailbox, SoundSync};
use crate::options::CompletionFn;
use crate::target::ClipRef;
use crate::timeline::{
    FrameCursor, PlaybackMode, TimeCursor, TimelineHandle, TimelineId, TimelineRecord,
};
use std::rc::Rc;

/// Result of stepping one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// Still running
    Playing,
    /// Wrapped around this many times; the record stays active
    Looped(u32),
    /// Reached its end; the record is removed after the pass
    Finished,
}

/// What drove a record's playhead this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clock {
    /// Mirrored from the attached sound's position
    Sound,
    /// Accrued from elapsed host time
    Elapsed,
    /// The attached sound went invalid
    SoundLost,
}

/// Everything a record needs from the scheduler while being stepped
pub(crate) struct TickContext<'a> {
    pub elapsed_ms: f64,
    pub frame_dropping: bool,
    /// Host frame rate; frame-addressed clips step once per host frame
    pub host_fps: f64,
    pub sound_library: Option<&'a Rc<dyn SoundLibrary>>,
    pub captions: Option<&'a Rc<dyn Captions>>,
    pub mailbox: &'a SoundMailbox,
}

impl Animator {
    /// Advance every active timeline by `elapsed_ms`.
    ///
    /// Normally called by the host update source; calling it directly is
    /// fine when no source is set.
    pub fn update(&self, elapsed_ms: f64) {
        {
            let mut state = self.inner.borrow_mut();
            if !state.initialized {
                return;
            }
            if state.updating {
                tracing::warn!("Animator::update called from inside a tick, ignored");
                return;
            }
            state.updating = true;
        }

        let elapsed_ms = if elapsed_ms.is_finite() {
            elapsed_ms.max(0.0)
        } else {
            0.0
        };

        self.process_sound_events();

        let handles: Vec<TimelineHandle> = self
            .inner
            .borrow()
            .timelines
            .values()
            .map(TimelineRecord::handle)
            .collect();

        for handle in handles {
            match self.step_timeline(handle, elapsed_ms) {
                Some(StepOutcome::Looped(loops)) => {
                    for _ in 0..loops {
                        match self.live_callback(handle) {
                            Some(Some(callback)) => callback(self),
                            Some(None) => {}
                            None => break,
                        }
                    }
                }
                Some(StepOutcome::Finished) => {
                    self.inner.borrow_mut().removals.push(handle);
                }
                Some(StepOutcome::Playing) | None => {}
            }
        }

        loop {
            let next = {
                let mut state = self.inner.borrow_mut();
                if state.removals.is_empty() {
                    None
                } else {
                    Some(state.removals.remove(0))
                }
            };
            let Some(handle) = next else { break };
            self.remove_timeline(
                handle.instance,
                Some(handle.timeline),
                true,
                RemovalCause::Finished,
            );
        }

        self.inner.borrow_mut().updating = false;
    }

    /// The callback of a record that is still the one behind `handle`.
    ///
    /// `None` once the record was stopped or replaced.
    fn live_callback(&self, handle: TimelineHandle) -> Option<Option<CompletionFn>> {
        let state = self.inner.borrow();
        state
            .timelines
            .get(&handle.instance)
            .filter(|record| record.id == handle.timeline)
            .map(|record| record.on_complete.clone())
    }

    fn process_sound_events(&self) {
        let events = self.mailbox.drain();
        if events.is_empty() {
            return;
        }

        let mut state = self.inner.borrow_mut();
        for event in events {
            let id = match event {
                SoundEvent::Started(id) | SoundEvent::Finished(id) => id,
            };
            let Some(record) = state.timelines.values_mut().find(|record| record.id == id) else {
                continue;
            };

            match event {
                SoundEvent::Started(_) => {
                    if let Some(sound) = &mut record.sound {
                        if let Some(handle) = &sound.handle {
                            sound.end = sound.start + handle.length_ms() * 0.001;
                        }
                    }
                }
                SoundEvent::Finished(_) => {
                    let Some(sound) = &mut record.sound else {
                        continue;
                    };
                    sound.handle = None;
                    let end = sound.end;
                    record.resume_after_sound(end);
                }
            }
        }
    }

    fn step_timeline(&self, handle: TimelineHandle, elapsed_ms: f64) -> Option<StepOutcome> {
        let mut state = self.inner.borrow_mut();
        let state = &mut *state;
        let record = state
            .timelines
            .get_mut(&handle.instance)
            .filter(|record| record.id == handle.timeline && !record.paused)?;

        let ctx = TickContext {
            elapsed_ms,
            frame_dropping: state.config.use_frame_dropping,
            host_fps: state.config.resolve_fps(None),
            sound_library: state.sound_library.as_ref(),
            captions: state.captions.as_ref(),
            mailbox: &self.mailbox,
        };

        let speed = record.speed;
        let outcome = match &mut record.mode {
            PlaybackMode::Frames { clip, cursor } => step_frames(clip, cursor, speed, &ctx),
            PlaybackMode::Time { clip, cursor } => {
                step_time(record.id, clip, cursor, &mut record.sound, speed, &ctx)
            }
            PlaybackMode::Skeletal { skeleton, cursor } => {
                cursor.step(record.id, skeleton, &mut record.sound, speed, &ctx)
            }
        };
        Some(outcome)
    }
}

/// Move a seconds-based playhead, from the sound if one is attached.
///
/// A pending sound is attached once the playhead reaches its start, and the
/// playhead is held at that start for the tick.
pub(crate) fn advance_clock(
    timeline: TimelineId,
    time: &mut f64,
    sound: &mut Option<SoundSync>,
    rate: f64,
    ctx: &TickContext<'_>,
) -> Clock {
    if let Some(sync) = sound.as_ref() {
        if let Some(handle) = &sync.handle {
            if !handle.is_valid() {
                return Clock::SoundLost;
            }
            let position = handle.position_ms();
            *time = sync.start + position * 0.001;
            if sync.use_captions {
                if let Some(captions) = ctx.captions {
                    captions.seek(position);
                }
            }
            return Clock::Sound;
        }
    }

    *time += ctx.elapsed_ms * 0.001 * rate;

    if let Some(sync) = sound.as_mut() {
        if sync.pending_play && *time >= sync.start {
            *time = sync.start;
            sync.attach(timeline, ctx.sound_library, ctx.captions, ctx.mailbox);
        }
    }
    Clock::Elapsed
}

fn step_time(
    timeline: TimelineId,
    clip: &ClipRef,
    cursor: &mut TimeCursor,
    sound: &mut Option<SoundSync>,
    speed: f64,
    ctx: &TickContext<'_>,
) -> StepOutcome {
    let clock = advance_clock(timeline, &mut cursor.time, sound, speed, ctx);
    if clock == Clock::SoundLost {
        return StepOutcome::Finished;
    }

    let mut clip = clip.borrow_mut();
    let mut outcome = StepOutcome::Playing;

    if cursor.bounds.looping && clock == Clock::Sound {
        // The sound runs on past the segment end; only the display wraps
        if cursor.duration > 0.0 {
            let wraps = (cursor.time / cursor.duration).floor().max(0.0);
            cursor.time -= wraps * cursor.duration;
            let wraps = wraps as u32;
            if wraps > cursor.sound_loops {
                outcome = StepOutcome::Looped(wraps - cursor.sound_loops);
                cursor.sound_loops = wraps;
            }
        } else {
            cursor.time = 0.0;
        }
    } else if cursor.time >= cursor.duration {
        if cursor.bounds.looping {
            if cursor.duration > 0.0 {
                let loops = (cursor.time / cursor.duration).floor();
                cursor.time -= loops * cursor.duration;
                outcome = StepOutcome::Looped(loops as u32);
            } else {
                cursor.time = 0.0;
                outcome = StepOutcome::Looped(1);
            }
        } else {
            cursor.time = cursor.duration;
            clip.goto_and_stop(cursor.bounds.last_frame);
            return StepOutcome::Finished;
        }
    }

    clip.set_elapsed_time(cursor.start_time + cursor.time);
    clip.advance();
    outcome
}

fn step_frames(
    clip: &ClipRef,
    cursor: &mut FrameCursor,
    speed: f64,
    ctx: &TickContext<'_>,
) -> StepOutcome {
    let mut clip = clip.borrow_mut();
    let frames_per_ms = ctx.host_fps * 0.001;
    let frame_length_ms = 1000.0 / ctx.host_fps;
    let elapsed_ms = ctx.elapsed_ms * speed;
    let dropping = ctx.frame_dropping && cursor.drop_frames;

    let first = cursor.bounds.first_frame;
    let last = cursor.bounds.last_frame;
    let current = clip.current_frame();

    if current >= last || current < first || cursor.is_last_frame {
        // Hold the last frame for one tick before looping or finishing
        if current == last && !cursor.is_last_frame {
            cursor.is_last_frame = true;
            cursor.accrue(elapsed_ms, frame_length_ms);
            clip.stop();
            return StepOutcome::Playing;
        }

        if cursor.bounds.looping {
            cursor.is_last_frame = false;
            if dropping {
                cursor.accrue(elapsed_ms, frame_length_ms);
                let wrapped = cursor.wrap(cursor.expected_frame(frames_per_ms));
                cursor.rebase(wrapped, frames_per_ms);
                clip.goto_and_play(wrapped);
            } else {
                clip.goto_and_play(first);
            }
            return StepOutcome::Looped(1);
        }

        clip.goto_and_stop(last);
        return StepOutcome::Finished;
    }

    if dropping {
        cursor.accrue(elapsed_ms, frame_length_ms);
        let expected = cursor.expected_frame(frames_per_ms);
        if current < expected {
            if expected == last {
                cursor.is_last_frame = true;
                clip.goto_and_stop(last);
                return StepOutcome::Playing;
            }
            if expected > last {
                if cursor.bounds.looping {
                    let wrapped = cursor.wrap(expected);
                    clip.goto_and_play(wrapped);
                    cursor.rebase(wrapped, frames_per_ms);
                    return StepOutcome::Looped(1);
                }
                clip.goto_and_stop(last);
                return StepOutcome::Finished;
            }
            clip.goto_and_play(expected);
            return StepOutcome::Playing;
        }
    }

    clip.advance();
    StepOutcome::Playing
}
