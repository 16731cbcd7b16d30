// SPDX-License-Identifier: MIT OR Apache-2.0
//! Console sound library.
//!
//! Pretends to play sounds of known lengths. Each sound advances on the
//! library's own clock, which the scene ticks just before the animator, and
//! reports start and natural end the way a real audio backend would: the
//! start notification arrives on the first tick after `play`.

use frameline_animator::{SoundCallback, SoundHandle, SoundInstance, SoundLibrary};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// A simulated playing sound
pub struct ConsoleSound {
    alias: String,
    length_ms: f64,
    position_ms: Cell<f64>,
    paused: Cell<bool>,
    stopped: Cell<bool>,
    finished: Cell<bool>,
}

impl ConsoleSound {
    fn new(alias: &str, length_ms: f64) -> Self {
        Self {
            alias: alias.to_string(),
            length_ms,
            position_ms: Cell::new(0.0),
            paused: Cell::new(false),
            stopped: Cell::new(false),
            finished: Cell::new(false),
        }
    }
}

impl SoundInstance for ConsoleSound {
    fn is_valid(&self) -> bool {
        !self.stopped.get()
    }

    fn position_ms(&self) -> f64 {
        self.position_ms.get()
    }

    fn length_ms(&self) -> f64 {
        self.length_ms
    }

    fn pause(&self) {
        self.paused.set(true);
    }

    fn unpause(&self) {
        self.paused.set(false);
    }

    fn stop(&self) {
        if !self.stopped.replace(true) {
            tracing::info!("[sound] {} stopped at {:.0}ms", self.alias, self.position_ms.get());
        }
    }
}

struct Playing {
    sound: Rc<ConsoleSound>,
    on_started: Option<SoundCallback>,
    on_finished: Option<SoundCallback>,
}

/// Sound library with a fixed catalogue of lengths
#[derive(Default)]
pub struct ConsoleSoundLibrary {
    lengths: HashMap<String, f64>,
    playing: RefCell<Vec<Playing>>,
    preloaded: RefCell<Vec<String>>,
}

impl ConsoleSoundLibrary {
    /// Library knowing the given `(alias, length in ms)` pairs
    pub fn new(lengths: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            lengths: lengths.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Advance every playing sound and deliver notifications
    pub fn advance(&self, elapsed_ms: f64) {
        let mut callbacks = Vec::new();
        {
            let mut playing = self.playing.borrow_mut();
            for entry in playing.iter_mut() {
                if let Some(started) = entry.on_started.take() {
                    callbacks.push(started);
                }
                let sound = &entry.sound;
                if sound.stopped.get() || sound.paused.get() {
                    continue;
                }
                let position = (sound.position_ms.get() + elapsed_ms).min(sound.length_ms);
                sound.position_ms.set(position);
                if position >= sound.length_ms && !sound.finished.replace(true) {
                    tracing::info!("[sound] {} finished", sound.alias);
                    if let Some(finished) = entry.on_finished.take() {
                        callbacks.push(finished);
                    }
                }
            }
            playing.retain(|entry| !entry.sound.stopped.get() && !entry.sound.finished.get());
        }

        for callback in callbacks {
            callback();
        }
    }

    /// Number of sounds still playing
    pub fn active_count(&self) -> usize {
        self.playing.borrow().len()
    }

    /// Aliases preloaded so far
    pub fn preloaded(&self) -> Vec<String> {
        self.preloaded.borrow().clone()
    }
}

impl SoundLibrary for ConsoleSoundLibrary {
    fn play(
        &self,
        alias: &str,
        on_finished: SoundCallback,
        on_started: SoundCallback,
    ) -> Option<SoundHandle> {
        let Some(length) = self.lengths.get(alias).copied() else {
            tracing::warn!("[sound] unknown alias \"{alias}\"");
            return None;
        };
        tracing::info!("[sound] {alias} playing ({length:.0}ms)");

        let sound = Rc::new(ConsoleSound::new(alias, length));
        self.playing.borrow_mut().push(Playing {
            sound: Rc::clone(&sound),
            on_started: Some(on_started),
            on_finished: Some(on_finished),
        });
        Some(sound)
    }

    fn preload(&self, alias: &str) {
        tracing::debug!("[sound] preloading {alias}");
        self.preloaded.borrow_mut().push(alias.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> SoundCallback {
        Box::new(|| {})
    }

    #[test]
    fn test_unknown_alias_refused() {
        let library = ConsoleSoundLibrary::new([("beep".to_string(), 100.0)]);
        assert!(library.play("missing", noop(), noop()).is_none());
        assert!(library.play("beep", noop(), noop()).is_some());
    }

    #[test]
    fn test_sound_runs_to_its_end() {
        let library = ConsoleSoundLibrary::new([("beep".to_string(), 100.0)]);
        let finished = Rc::new(Cell::new(false));
        let flag = Rc::clone(&finished);
        let sound = library
            .play("beep", Box::new(move || flag.set(true)), noop())
            .unwrap();

        library.advance(60.0);
        assert_eq!(sound.position_ms(), 60.0);
        assert!(!finished.get());

        library.advance(60.0);
        assert_eq!(sound.position_ms(), 100.0);
        assert!(finished.get());
        assert_eq!(library.active_count(), 0);
    }

    #[test]
    fn test_paused_sound_holds_position() {
        let library = ConsoleSoundLibrary::new([("beep".to_string(), 100.0)]);
        let sound = library.play("beep", noop(), noop()).unwrap();
        sound.pause();
        library.advance(50.0);
        assert_eq!(sound.position_ms(), 0.0);
        sound.unpause();
        library.advance(50.0);
        assert_eq!(sound.position_ms(), 50.0);
    }
}
