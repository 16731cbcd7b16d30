// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recording collaborators for unit tests.

use crate::animator::Animator;
use crate::audio::{Captions, SoundCallback, SoundHandle, SoundInstance, SoundLibrary};
use crate::target::{Identified, InstanceId, Skeleton};
use crate::update::{UpdateCallback, UpdateLoop, UpdateSource};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// A completion callback that counts its calls
pub fn counter() -> (Rc<Cell<u32>>, impl Fn(&Animator) + 'static) {
    let hits = Rc::new(Cell::new(0));
    let inner = Rc::clone(&hits);
    (hits, move |_: &Animator| inner.set(inner.get() + 1))
}

/// Sound whose state the test sets directly
pub struct MockSound {
    pub valid: Cell<bool>,
    pub position: Cell<f64>,
    pub length: Cell<f64>,
    pub paused: Cell<bool>,
    pub stopped: Cell<bool>,
}

impl Default for MockSound {
    fn default() -> Self {
        Self {
            valid: Cell::new(true),
            position: Cell::new(0.0),
            length: Cell::new(0.0),
            paused: Cell::new(false),
            stopped: Cell::new(false),
        }
    }
}

impl SoundInstance for MockSound {
    fn is_valid(&self) -> bool {
        self.valid.get() && !self.stopped.get()
    }

    fn position_ms(&self) -> f64 {
        self.position.get()
    }

    fn length_ms(&self) -> f64 {
        self.length.get()
    }

    fn pause(&self) {
        self.paused.set(true);
    }

    fn unpause(&self) {
        self.paused.set(false);
    }

    fn stop(&self) {
        self.stopped.set(true);
    }
}

/// Sound library that keeps the callbacks of the last sound it started
#[derive(Default)]
pub struct MockSoundLibrary {
    played: RefCell<Vec<String>>,
    preloaded: RefCell<Vec<String>>,
    sounds: RefCell<Vec<Rc<MockSound>>>,
    on_finished: RefCell<Option<SoundCallback>>,
    on_started: RefCell<Option<SoundCallback>>,
}

impl MockSoundLibrary {
    pub fn played(&self) -> Vec<String> {
        self.played.borrow().clone()
    }

    pub fn preloaded(&self) -> Vec<String> {
        self.preloaded.borrow().clone()
    }

    pub fn last_sound(&self) -> Option<Rc<MockSound>> {
        self.sounds.borrow().last().cloned()
    }

    pub fn fire_started(&self) {
        let callback = self.on_started.borrow_mut().take();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn fire_finished(&self) {
        let callback = self.on_finished.borrow_mut().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl SoundLibrary for MockSoundLibrary {
    fn play(
        &self,
        alias: &str,
        on_finished: SoundCallback,
        on_started: SoundCallback,
    ) -> Option<SoundHandle> {
        self.played.borrow_mut().push(alias.to_string());
        let sound = Rc::new(MockSound::default());
        self.sounds.borrow_mut().push(Rc::clone(&sound));
        *self.on_finished.borrow_mut() = Some(on_finished);
        *self.on_started.borrow_mut() = Some(on_started);
        Some(sound)
    }

    fn preload(&self, alias: &str) {
        self.preloaded.borrow_mut().push(alias.to_string());
    }
}

/// Captions that record what they were told
#[derive(Default)]
pub struct MockCaptions {
    aliases: Vec<String>,
    pub slave: Cell<bool>,
    pub runs: RefCell<Vec<String>>,
    seeks: RefCell<Vec<f64>>,
    pub stops: Cell<u32>,
}

impl MockCaptions {
    pub fn with_aliases(aliases: &[&str]) -> Self {
        Self {
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.borrow().clone()
    }
}

impl Captions for MockCaptions {
    fn has_caption(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }

    fn set_slave(&self, slave: bool) {
        self.slave.set(slave);
    }

    fn run(&self, alias: &str) {
        self.runs.borrow_mut().push(alias.to_string());
    }

    fn seek(&self, position_ms: f64) {
        self.seeks.borrow_mut().push(position_ms);
    }

    fn stop(&self) {
        self.stops.set(self.stops.get() + 1);
    }
}

/// Update loop that counts subscription changes
#[derive(Default)]
pub struct RecordingUpdateSource {
    update_loop: UpdateLoop,
    pub adds: Cell<u32>,
    pub removes: Cell<u32>,
}

impl RecordingUpdateSource {
    pub fn tick(&self, elapsed_ms: f64) {
        self.update_loop.tick(elapsed_ms);
    }

    pub fn is_registered(&self, alias: &str) -> bool {
        self.update_loop.has_callback(alias)
    }
}

impl UpdateSource for RecordingUpdateSource {
    fn add_update_callback(&self, alias: &str, callback: UpdateCallback) {
        self.adds.set(self.adds.get() + 1);
        self.update_loop.add_update_callback(alias, callback);
    }

    fn remove_update_callback(&self, alias: &str) {
        self.removes.set(self.removes.get() + 1);
        self.update_loop.remove_update_callback(alias);
    }
}

/// Skeleton with fixed animation lengths that remembers each layer's pose
pub struct MockSkeleton {
    id: InstanceId,
    durations: HashMap<String, f64>,
    poses: HashMap<usize, (String, f64)>,
    pub stops: u32,
}

impl MockSkeleton {
    pub fn new() -> Self {
        Self {
            id: InstanceId::new(),
            durations: HashMap::new(),
            poses: HashMap::new(),
            stops: 0,
        }
    }

    pub fn with_animation(mut self, name: &str, duration: f64) -> Self {
        self.durations.insert(name.to_string(), duration);
        self
    }

    pub fn last_pose(&self, layer: usize) -> Option<(String, f64)> {
        self.poses.get(&layer).cloned()
    }
}

impl Identified for MockSkeleton {
    fn id(&self) -> InstanceId {
        self.id
    }
}

impl Skeleton for MockSkeleton {
    fn animation_duration(&self, animation: &str) -> Option<f64> {
        self.durations.get(animation).copied()
    }

    fn apply(&mut self, layer: usize, animation: &str, time: f64, _looping: bool) {
        self.poses.insert(layer, (animation.to_string(), time));
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}
