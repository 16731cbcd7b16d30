// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scripted demo scenes.
//!
//! A scene lists headless clips with their frame labels, the sounds the
//! console library knows, and a tick-indexed script of animator calls. The
//! runner wires an [`UpdateLoop`] as the host render loop and replays the
//! script against it.

use crate::error::{DemoError, Result};
use crate::sound::ConsoleSoundLibrary;
use frameline_animator::{
    Animator, AnimatorConfig, CharacterClip, CharacterController, FrameLabel, LabeledClip,
    PlayClipsOptions, PlayOptions, StartPosition, UpdateLoop, UpdateSource,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

/// Alias the sound library subscribes under; registered before the animator
const SOUND_UPDATE_ALIAS: &str = "Sound";

/// A headless clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipDefinition {
    /// Name used by the script
    pub name: String,
    /// Number of frames
    pub total_frames: u32,
    /// The clip's own frame rate
    #[serde(default)]
    pub framerate: Option<f64>,
    /// Frame labels
    pub labels: Vec<FrameLabel>,
}

/// A sound the console library can play
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundDefinition {
    /// Sound alias
    pub alias: String,
    /// Length in milliseconds
    pub length_ms: f64,
}

/// One animator call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SceneAction {
    /// Play a segment on a clip
    Play {
        /// Clip name
        clip: String,
        /// Segment name
        segment: String,
        /// Sound to synchronize to
        #[serde(default)]
        sound: Option<String>,
        /// Start somewhere random inside the segment
        #[serde(default)]
        random_start: bool,
        /// Suppress the callback of a timeline this replaces
        #[serde(default)]
        cancel_previous: bool,
    },
    /// Queue segments through a character controller
    PlayClips {
        /// Clip name
        clip: String,
        /// Queue
        clips: Vec<CharacterClip>,
    },
    /// Stop a clip's timeline
    Stop {
        /// Clip name
        clip: String,
    },
    /// Pause everything
    Pause,
    /// Resume everything
    Resume,
}

/// An action and the tick it runs on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledAction {
    /// Tick index, run before that tick is dispatched
    pub tick: u32,
    /// What to do
    pub action: SceneAction,
}

/// A complete demo scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDefinition {
    /// Milliseconds per simulated frame
    pub frame_ms: f64,
    /// Number of frames to simulate
    pub ticks: u32,
    /// Known sounds
    #[serde(default)]
    pub sounds: Vec<SoundDefinition>,
    /// Clips
    pub clips: Vec<ClipDefinition>,
    /// Script
    pub script: Vec<ScheduledAction>,
}

impl SceneDefinition {
    /// Parse from RON
    pub fn from_ron(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// The scene shipped with the demo
    pub fn builtin() -> Result<Self> {
        Self::from_ron(include_str!("../scenes/intro.ron"))
    }
}

/// What happened during a run
#[derive(Debug, Default, Clone)]
pub struct SceneReport {
    /// Completion notifications, in order
    pub completions: Vec<String>,
    /// Frames dispatched
    pub frames: u64,
    /// Timelines still active at the end
    pub active_timelines: usize,
    /// Sounds still playing at the end
    pub sounds_playing: usize,
}

/// Runs a scene against a fresh animator
pub struct SceneRunner {
    update_loop: Rc<UpdateLoop>,
    animator: Animator,
    sounds: Rc<ConsoleSoundLibrary>,
    clips: BTreeMap<String, Rc<RefCell<LabeledClip>>>,
    controllers: RefCell<BTreeMap<String, CharacterController>>,
    completions: Rc<RefCell<Vec<String>>>,
}

impl SceneRunner {
    /// Build clips, the sound library and the animator for a scene
    pub fn new(config: AnimatorConfig, scene: &SceneDefinition) -> Self {
        let update_loop = Rc::new(UpdateLoop::new());
        let sounds = Rc::new(ConsoleSoundLibrary::new(
            scene
                .sounds
                .iter()
                .map(|sound| (sound.alias.clone(), sound.length_ms)),
        ));

        let clock = Rc::clone(&sounds);
        update_loop.add_update_callback(
            SOUND_UPDATE_ALIAS,
            Rc::new(move |elapsed: f64| clock.advance(elapsed)),
        );

        let animator = Animator::new(config);
        animator.set_update_source(update_loop.clone());
        animator.set_sound_library(sounds.clone());

        let clips = scene
            .clips
            .iter()
            .map(|definition| {
                let mut clip = LabeledClip::new(definition.total_frames);
                for label in &definition.labels {
                    clip.add_label(label.label.clone(), label.position);
                }
                if let Some(fps) = definition.framerate {
                    clip = clip.with_framerate(fps);
                }
                (definition.name.clone(), clip.shared())
            })
            .collect();

        Self {
            update_loop,
            animator,
            sounds,
            clips,
            controllers: RefCell::new(BTreeMap::new()),
            completions: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// The animator driving the scene
    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    /// Replay the script
    pub fn run(&self, scene: &SceneDefinition) -> Result<SceneReport> {
        tracing::info!(
            "Running scene: {} clips, {} ticks of {:.1}ms",
            self.clips.len(),
            scene.ticks,
            scene.frame_ms
        );

        for tick in 0..scene.ticks {
            for scheduled in scene.script.iter().filter(|s| s.tick == tick) {
                self.apply(tick, &scheduled.action)?;
            }
            self.update_loop.tick(scene.frame_ms);
        }

        let report = SceneReport {
            completions: self.completions.borrow().clone(),
            frames: self.update_loop.frame_count(),
            active_timelines: self.animator.timeline_count(),
            sounds_playing: self.sounds.active_count(),
        };

        for (name, clip) in &self.clips {
            match self.animator.get_timeline(clip) {
                Some(info) => tracing::info!(
                    "{name}: \"{}\" at {:.2}/{:.2}{}",
                    info.segment,
                    info.position,
                    info.duration,
                    if info.looping { " (looping)" } else { "" }
                ),
                None => tracing::info!("{name}: idle"),
            }
        }
        if !self.sounds.preloaded().is_empty() {
            tracing::debug!("Preloaded sounds: {:?}", self.sounds.preloaded());
        }

        Ok(report)
    }

    fn clip(&self, name: &str) -> Result<Rc<RefCell<LabeledClip>>> {
        self.clips
            .get(name)
            .cloned()
            .ok_or_else(|| DemoError::UnknownClip(name.to_string()))
    }

    fn apply(&self, tick: u32, action: &SceneAction) -> Result<()> {
        match action {
            SceneAction::Play {
                clip,
                segment,
                sound,
                random_start,
                cancel_previous,
            } => {
                let target = self.clip(clip)?;
                tracing::info!("[{tick}] play {clip} \"{segment}\"");

                let completions = Rc::clone(&self.completions);
                let mut options = PlayOptions::new()
                    .cancel_previous_callback(*cancel_previous)
                    .on_complete_with(format!("{clip}:{segment}"), move |_, name: &String| {
                        tracing::info!("{name} complete");
                        completions.borrow_mut().push(name.clone());
                    });
                if let Some(sound) = sound {
                    options = options.sound(sound.as_str());
                }
                if *random_start {
                    options = options.start(StartPosition::Random);
                }

                if let Err(err) = self.animator.play(target, segment, options) {
                    tracing::warn!("[{tick}] {clip}: {err}");
                }
            }
            SceneAction::PlayClips { clip, clips } => {
                let target = self.clip(clip)?;
                let controller = self
                    .controllers
                    .borrow_mut()
                    .entry(clip.clone())
                    .or_insert_with(|| {
                        let controller = CharacterController::new(&self.animator);
                        controller.set_character(Some(target));
                        controller
                    })
                    .clone();

                let events: Vec<&str> = clips.iter().map(|c| c.event.as_str()).collect();
                tracing::info!("[{tick}] {clip} queue {events:?}");

                let completions = Rc::clone(&self.completions);
                let name = format!("{clip}:queue");
                let accepted = controller.play_clips(
                    clips.iter().cloned(),
                    Some(Box::new(move |interrupted| {
                        tracing::info!("{name} done (interrupted: {interrupted})");
                        completions.borrow_mut().push(name);
                    })),
                    PlayClipsOptions::default(),
                );
                if !accepted {
                    tracing::warn!("[{tick}] {clip} queue rejected");
                }
            }
            SceneAction::Stop { clip } => {
                let target = self.clip(clip)?;
                tracing::info!("[{tick}] stop {clip}");
                self.animator.stop(&target, false);
            }
            SceneAction::Pause => {
                tracing::info!("[{tick}] pause");
                self.animator.pause();
            }
            SceneAction::Resume => {
                tracing::info!("[{tick}] resume");
                self.animator.resume();
            }
        }
        Ok(())
    }
}

impl Drop for SceneRunner {
    fn drop(&mut self) {
        for controller in self.controllers.borrow().values() {
            controller.destroy();
        }
        self.animator.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scene_parses() {
        let scene = SceneDefinition::builtin().unwrap();
        assert!(scene.ticks > 0);
        assert!(scene.clips.iter().any(|c| c.name == "door"));
    }

    #[test]
    fn test_builtin_scene_runs() {
        let scene = SceneDefinition::builtin().unwrap();
        let runner = SceneRunner::new(AnimatorConfig::default(), &scene);
        let report = runner.run(&scene).unwrap();

        assert_eq!(report.frames, u64::from(scene.ticks));
        assert!(report.completions.contains(&"door:open".to_string()));
        // A missing segment still reports completion
        assert!(report.completions.contains(&"door:slam".to_string()));
    }

    #[test]
    fn test_unknown_clip_is_an_error() {
        let scene = SceneDefinition::from_ron(
            r#"(
                frame_ms: 16.0,
                ticks: 2,
                clips: [],
                script: [(tick: 0, action: Stop(clip: "ghost"))],
            )"#,
        )
        .unwrap();
        let runner = SceneRunner::new(AnimatorConfig::default(), &scene);
        assert!(matches!(runner.run(&scene), Err(DemoError::UnknownClip(name)) if name == "ghost"));
    }

    #[test]
    fn test_sound_synced_play() {
        let scene = SceneDefinition::from_ron(
            r#"(
                frame_ms: 100.0,
                ticks: 5,
                sounds: [(alias: "line", length_ms: 300.0)],
                clips: [(
                    name: "actor",
                    total_frames: 40,
                    framerate: Some(10.0),
                    labels: [(label: "talk", position: 0), (label: "talk_stop", position: 30)],
                )],
                script: [(tick: 0, action: Play(clip: "actor", segment: "talk", sound: Some("line")))],
            )"#,
        )
        .unwrap();
        let runner = SceneRunner::new(AnimatorConfig::default(), &scene);
        runner.run(&scene).unwrap();

        let clip = runner.clip("actor").unwrap();
        let info = runner.animator().get_timeline(&clip).unwrap();
        // Sound ended at 0.3s, then the clock kept going on elapsed time
        assert!(info.position > 0.3);
        assert!(!info.sound_attached);
    }
}
