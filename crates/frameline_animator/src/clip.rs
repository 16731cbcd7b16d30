// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless frame-labelled clip.
//!
//! [`LabeledClip`] implements [`Animatable`] without any renderer. It keeps a
//! playhead, honours the animator's seek/advance protocol and records every
//! command it receives, which makes it the adapter of choice for tools,
//! servers and tests.

use crate::label::FrameLabel;
use crate::target::{Animatable, Identified, InstanceId};
use std::cell::RefCell;
use std::rc::Rc;

/// A playback command received by a [`LabeledClip`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipCommand {
    /// Jump and keep playing
    GotoAndPlay(u32),
    /// Jump and hold
    GotoAndStop(u32),
    /// Resume
    Play,
    /// Stop
    Stop,
}

/// A clip with a label table and a playhead
#[derive(Debug, Clone)]
pub struct LabeledClip {
    id: InstanceId,
    labels: Vec<FrameLabel>,
    total_frames: u32,
    framerate: Option<f64>,
    current_frame: u32,
    playing: bool,
    advance_during_ticks: bool,
    pending_elapsed: Option<f64>,
    elapsed_time: f64,
    history: Vec<ClipCommand>,
}

impl LabeledClip {
    /// Create a clip with a number of frames and no labels
    pub fn new(total_frames: u32) -> Self {
        Self {
            id: InstanceId::new(),
            labels: Vec::new(),
            total_frames: total_frames.max(1),
            framerate: None,
            current_frame: 0,
            playing: true,
            advance_during_ticks: true,
            pending_elapsed: None,
            elapsed_time: 0.0,
            history: Vec::new(),
        }
    }

    /// Add a label, keeping the table ordered by position
    pub fn with_label(mut self, label: impl Into<String>, position: u32) -> Self {
        self.add_label(label, position);
        self
    }

    /// Set the clip's own frame rate
    pub fn with_framerate(mut self, fps: f64) -> Self {
        self.framerate = Some(fps);
        self
    }

    /// Wrap into the shared handle the animator takes
    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Add a label, keeping the table ordered by position
    pub fn add_label(&mut self, label: impl Into<String>, position: u32) {
        let label = FrameLabel::new(label, position);
        let index = self.labels.partition_point(|l| l.position <= position);
        self.labels.insert(index, label);
    }

    /// Number of frames
    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    /// Whether the clip's own playback is running
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether the clip still advances by itself on host ticks
    pub fn advances_during_ticks(&self) -> bool {
        self.advance_during_ticks
    }

    /// Last elapsed time assigned, in seconds
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    /// Every command received so far
    pub fn history(&self) -> &[ClipCommand] {
        &self.history
    }

    /// Forget recorded commands
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// The clip's own per-tick step, used when nothing manages it
    pub fn tick(&mut self) {
        if self.advance_during_ticks {
            self.advance();
        }
    }

    fn clamp(&self, frame: u32) -> u32 {
        frame.min(self.total_frames.saturating_sub(1))
    }
}

impl Identified for LabeledClip {
    fn id(&self) -> InstanceId {
        self.id
    }
}

impl Animatable for LabeledClip {
    fn labels(&self) -> &[FrameLabel] {
        &self.labels
    }

    fn framerate(&self) -> Option<f64> {
        self.framerate
    }

    fn set_framerate(&mut self, fps: f64) {
        self.framerate = Some(fps);
    }

    fn current_frame(&self) -> u32 {
        self.current_frame
    }

    fn goto_and_play(&mut self, frame: u32) {
        self.current_frame = self.clamp(frame);
        self.playing = true;
        self.pending_elapsed = None;
        self.history.push(ClipCommand::GotoAndPlay(frame));
    }

    fn goto_and_stop(&mut self, frame: u32) {
        self.current_frame = self.clamp(frame);
        self.playing = false;
        self.pending_elapsed = None;
        self.history.push(ClipCommand::GotoAndStop(frame));
    }

    fn play(&mut self) {
        self.playing = true;
        self.history.push(ClipCommand::Play);
    }

    fn stop(&mut self) {
        self.playing = false;
        self.history.push(ClipCommand::Stop);
    }

    fn set_elapsed_time(&mut self, seconds: f64) {
        self.elapsed_time = seconds.max(0.0);
        self.pending_elapsed = Some(self.elapsed_time);
    }

    fn advance(&mut self) {
        if let Some(elapsed) = self.pending_elapsed.take() {
            let fps = self.framerate.unwrap_or(0.0);
            if fps > 0.0 {
                // Nudge keeps exact frame boundaries from rounding down
                let frame = (elapsed * fps + 1e-6).floor() as u32;
                self.current_frame = self.clamp(frame);
            }
        } else if self.playing {
            self.current_frame = self.clamp(self.current_frame + 1);
        }
    }

    fn set_advance_during_ticks(&mut self, enabled: bool) {
        self.advance_during_ticks = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_stay_sorted() {
        let clip = LabeledClip::new(20)
            .with_label("b", 10)
            .with_label("a", 0)
            .with_label("b_stop", 15);
        let names: Vec<&str> = clip.labels().iter().map(|l| l.label.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "b_stop"]);
    }

    #[test]
    fn test_elapsed_time_selects_frame() {
        let mut clip = LabeledClip::new(30).with_framerate(24.0);
        clip.set_elapsed_time(0.5);
        clip.advance();
        assert_eq!(clip.current_frame(), 12);

        // Without a new elapsed time a playing clip steps
        clip.advance();
        assert_eq!(clip.current_frame(), 13);
    }

    #[test]
    fn test_frames_clamped_to_length() {
        let mut clip = LabeledClip::new(5);
        clip.goto_and_play(9);
        assert_eq!(clip.current_frame(), 4);
        clip.advance();
        assert_eq!(clip.current_frame(), 4);
        assert_eq!(clip.history(), &[ClipCommand::GotoAndPlay(9)]);
    }

    #[test]
    fn test_stopped_clip_holds() {
        let mut clip = LabeledClip::new(10);
        clip.goto_and_stop(3);
        clip.advance();
        clip.tick();
        assert_eq!(clip.current_frame(), 3);
    }
}
