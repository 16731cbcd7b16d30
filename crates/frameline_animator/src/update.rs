// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host update source.
//!
//! The embedding render loop calls every registered callback once per frame
//! with the elapsed milliseconds. The animator registers itself only while it
//! has something to advance.

use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Per-frame callback, receives elapsed milliseconds
pub type UpdateCallback = Rc<dyn Fn(f64)>;

/// A render loop that dispatches named per-frame callbacks
pub trait UpdateSource {
    /// Register a callback under an alias; an alias already in use is kept
    fn add_update_callback(&self, alias: &str, callback: UpdateCallback);

    /// Remove the callback registered under an alias
    fn remove_update_callback(&self, alias: &str);
}

/// In-process update source.
///
/// Callbacks may add or remove registrations while being dispatched; a
/// callback removed during a tick is not called for the rest of that tick.
#[derive(Default)]
pub struct UpdateLoop {
    callbacks: RefCell<IndexMap<String, UpdateCallback>>,
    frame_count: Cell<u64>,
    elapsed_total: Cell<f64>,
}

impl UpdateLoop {
    /// Create an empty loop
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch one frame
    pub fn tick(&self, elapsed_ms: f64) {
        self.frame_count.set(self.frame_count.get() + 1);
        self.elapsed_total.set(self.elapsed_total.get() + elapsed_ms);

        let snapshot: Vec<(String, UpdateCallback)> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(alias, cb)| (alias.clone(), Rc::clone(cb)))
            .collect();

        for (alias, callback) in snapshot {
            let still_registered = self
                .callbacks
                .borrow()
                .get(&alias)
                .is_some_and(|current| Rc::ptr_eq(current, &callback));
            if still_registered {
                callback(elapsed_ms);
            }
        }
    }

    /// Whether an alias is registered
    pub fn has_callback(&self, alias: &str) -> bool {
        self.callbacks.borrow().contains_key(alias)
    }

    /// Number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Frames dispatched so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count.get()
    }

    /// Milliseconds dispatched so far
    pub fn elapsed_total(&self) -> f64 {
        self.elapsed_total.get()
    }
}

impl UpdateSource for UpdateLoop {
    fn add_update_callback(&self, alias: &str, callback: UpdateCallback) {
        let mut callbacks = self.callbacks.borrow_mut();
        if callbacks.contains_key(alias) {
            tracing::trace!("Update callback \"{alias}\" already registered");
            return;
        }
        callbacks.insert(alias.to_string(), callback);
    }

    fn remove_update_callback(&self, alias: &str) {
        self.callbacks.borrow_mut().shift_remove(alias);
    }
}
