// SPDX-License-Identifier: MIT OR Apache-2.0
//! Character controller.
//!
//! Plays a queue of segments back to back on one character clip through the
//! [`Animator`]. Each queued clip repeats a number of times (`0` repeats
//! forever) before the next one starts; when the queue runs dry the caller's
//! callback runs with `interrupted == false`.

use crate::animator::Animator;
use crate::label::label_position;
use crate::options::PlayOptions;
use crate::target::{AnimationTarget, Animatable, ClipRef};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

/// Called when a clip queue finishes; the flag tells whether it was interrupted
pub type CharacterCallback = Box<dyn FnOnce(bool)>;

/// One entry of a character's clip queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterClip {
    /// Segment name
    pub event: String,
    /// Times to play it, `0` for forever
    pub loops: u32,
}

impl CharacterClip {
    /// Play a segment a number of times
    pub fn new(event: impl Into<String>, loops: u32) -> Self {
        Self {
            event: event.into(),
            loops,
        }
    }

    /// Play a segment once
    pub fn once(event: impl Into<String>) -> Self {
        Self::new(event, 1)
    }

    /// Repeat a segment until interrupted
    pub fn forever(event: impl Into<String>) -> Self {
        Self::new(event, 0)
    }
}

/// Options for [`CharacterController::play_clips`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayClipsOptions {
    /// Whether a later `play_clips` may replace this queue
    pub interruptable: bool,
    /// Skip the callback of a queue this call replaces
    pub cancel_previous_callback: bool,
    /// Let the animator drop frames to keep up
    pub allow_frame_dropping: bool,
}

impl Default for PlayClipsOptions {
    fn default() -> Self {
        Self {
            interruptable: true,
            cancel_previous_callback: true,
            allow_frame_dropping: true,
        }
    }
}

struct ControllerState {
    animator: Animator,
    character: Option<ClipRef>,
    queue: VecDeque<CharacterClip>,
    current: Option<CharacterClip>,
    loops: u32,
    interruptable: bool,
    allow_frame_dropping: bool,
    callback: Option<CharacterCallback>,
    destroyed: bool,
}

enum Next {
    Play(ClipRef, String),
    Done(Option<CharacterCallback>),
}

enum AfterLoop {
    Replay(ClipRef, String),
    KeepLooping,
    Advance,
    Nothing,
}

/// Queue-driven animation of a single character clip
#[derive(Clone)]
pub struct CharacterController {
    inner: Rc<RefCell<ControllerState>>,
}

impl CharacterController {
    /// Create a controller that plays through `animator`
    pub fn new(animator: &Animator) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ControllerState {
                animator: animator.clone(),
                character: None,
                queue: VecDeque::new(),
                current: None,
                loops: 0,
                interruptable: true,
                allow_frame_dropping: false,
                callback: None,
                destroyed: false,
            })),
        }
    }

    /// Set the controlled clip, clearing any queue; the new clip is stopped
    pub fn set_character(&self, character: Option<ClipRef>) {
        self.clear();
        if let Some(character) = &character {
            character.borrow_mut().stop();
        }
        self.inner.borrow_mut().character = character;
    }

    /// The controlled clip
    pub fn character(&self) -> Option<ClipRef> {
        self.inner.borrow().character.clone()
    }

    /// Stop everything and hold a frame
    pub fn goto_frame_and_stop(&self, frame: u32) -> bool {
        let (animator, character) = {
            let mut state = self.inner.borrow_mut();
            let Some(character) = state.character.clone() else {
                tracing::warn!("goto_frame_and_stop needs a character");
                return false;
            };
            state.queue.clear();
            (state.animator.clone(), character)
        };

        animator.stop(&character, false);
        character.borrow_mut().goto_and_stop(frame);
        true
    }

    /// Stop everything and hold the frame a label points at
    pub fn goto_label_and_stop(&self, label: &str) -> bool {
        let Some(character) = self.character() else {
            return false;
        };
        let position = label_position(character.borrow().labels(), label);
        match position {
            Some(frame) => self.goto_frame_and_stop(frame),
            None => {
                tracing::debug!("Character has no label \"{label}\"");
                false
            }
        }
    }

    /// Replace the queue with `clips` and start playing it.
    ///
    /// Returns false when there is no character or the running queue is not
    /// interruptable.
    pub fn play_clips(
        &self,
        clips: impl IntoIterator<Item = CharacterClip>,
        callback: Option<CharacterCallback>,
        options: PlayClipsOptions,
    ) -> bool {
        let (animator, character) = {
            let state = self.inner.borrow();
            if state.destroyed {
                return false;
            }
            let Some(character) = state.character.clone() else {
                tracing::warn!("play_clips needs a character");
                return false;
            };
            if !state.interruptable {
                tracing::debug!("Character queue is not interruptable, play_clips ignored");
                return false;
            }
            (state.animator.clone(), character)
        };

        animator.stop(&character, false);

        let previous = {
            let mut state = self.inner.borrow_mut();
            state.interruptable = options.interruptable;
            state.callback.take()
        };
        if !options.cancel_previous_callback {
            if let Some(previous) = previous {
                previous(true);
            }
        }

        {
            let mut state = self.inner.borrow_mut();
            state.callback = callback;
            state.queue = clips.into_iter().collect();
            state.allow_frame_dropping = options.allow_frame_dropping;
        }
        self.start_next();
        true
    }

    /// Stop the character and forget the queue and its callback
    pub fn clear(&self) {
        let (animator, character) = {
            let mut state = self.inner.borrow_mut();
            state.current = None;
            state.interruptable = true;
            state.callback = None;
            state.queue.clear();
            state.loops = 0;
            (state.animator.clone(), state.character.clone())
        };
        if let Some(character) = character {
            animator.stop(&character, false);
        }
    }

    /// Clear and release the character; the controller is unusable afterwards
    pub fn destroy(&self) {
        if self.inner.borrow().destroyed {
            return;
        }
        self.clear();
        let mut state = self.inner.borrow_mut();
        state.destroyed = true;
        state.character = None;
    }

    /// Whether a `play_clips` call would be accepted
    pub fn is_interruptable(&self) -> bool {
        self.inner.borrow().interruptable
    }

    /// Segment currently playing
    pub fn current_event(&self) -> Option<String> {
        self.inner.borrow().current.as_ref().map(|clip| clip.event.clone())
    }

    /// Clips waiting after the current one
    pub fn queued(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    fn start_next(&self) {
        let next = {
            let mut state = self.inner.borrow_mut();
            state.loops = 0;
            match (state.queue.pop_front(), state.character.clone()) {
                (Some(clip), Some(character)) => {
                    let event = clip.event.clone();
                    state.current = Some(clip);
                    Next::Play(character, event)
                }
                _ => {
                    state.current = None;
                    state.interruptable = true;
                    Next::Done(state.callback.take())
                }
            }
        };

        match next {
            Next::Play(character, event) => self.play_event(character, &event),
            Next::Done(Some(callback)) => callback(false),
            Next::Done(None) => {}
        }
    }

    fn play_event(&self, character: ClipRef, event: &str) {
        let (animator, allow_frame_dropping) = {
            let state = self.inner.borrow();
            (state.animator.clone(), state.allow_frame_dropping)
        };

        let weak: Weak<RefCell<ControllerState>> = Rc::downgrade(&self.inner);
        let options = PlayOptions::new()
            .cancel_previous_callback(true)
            .drop_frames(allow_frame_dropping)
            .on_complete(move |_: &Animator| {
                if let Some(inner) = weak.upgrade() {
                    CharacterController { inner }.animation_complete();
                }
            });

        if let Err(err) = animator.play(character, event, options) {
            tracing::debug!("Character clip \"{event}\" skipped: {err}");
        }
    }

    fn animation_complete(&self) {
        let action = {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;
            match (&state.current, &state.character) {
                (Some(current), Some(character)) if !state.destroyed => {
                    state.loops += 1;
                    if current.loops == 0 || state.loops < current.loops {
                        // A looping segment is still running and wraps by itself
                        if state.animator.has_timeline(character) {
                            AfterLoop::KeepLooping
                        } else {
                            AfterLoop::Replay(Rc::clone(character), current.event.clone())
                        }
                    } else if state.loops == current.loops {
                        AfterLoop::Advance
                    } else {
                        AfterLoop::Nothing
                    }
                }
                _ => AfterLoop::Nothing,
            }
        };

        match action {
            AfterLoop::Replay(character, event) => {
                let animator = self.inner.borrow().animator.clone();
                let target = AnimationTarget::Clip(Rc::clone(&character));
                if animator.instance_has_animation(&target, &event) {
                    self.play_event(character, &event);
                } else {
                    self.start_next();
                }
            }
            AfterLoop::Advance => self.start_next(),
            AfterLoop::KeepLooping | AfterLoop::Nothing => {}
        }
    }
}
