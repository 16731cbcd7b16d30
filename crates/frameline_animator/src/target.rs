// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animatable targets and their identity.
//!
//! The animator never owns the objects it drives. Callers hand it shared
//! references ([`ClipRef`], [`SkeletonRef`]) and keep their own copies for
//! rendering; every managed object is keyed by its [`InstanceId`].

use crate::label::FrameLabel;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Identity of an animated display object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// Create a new random instance ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything that can name the instance it refers to
pub trait Identified {
    /// The per-instance identity key
    fn id(&self) -> InstanceId;
}

impl Identified for InstanceId {
    fn id(&self) -> InstanceId {
        *self
    }
}

impl<T: Identified + ?Sized> Identified for RefCell<T> {
    fn id(&self) -> InstanceId {
        self.borrow().id()
    }
}

impl<T: Identified + ?Sized> Identified for Rc<T> {
    fn id(&self) -> InstanceId {
        (**self).id()
    }
}

/// A frame-labelled clip (MovieClip-style display object).
///
/// Once a clip is under management the animator is its only driver: it turns
/// off the clip's own per-tick advancement and calls [`Animatable::advance`]
/// itself.
pub trait Animatable: Identified {
    /// Frame labels, ordered by ascending position
    fn labels(&self) -> &[FrameLabel];

    /// The clip's own frame rate, if it has one
    fn framerate(&self) -> Option<f64>;

    /// Assign a frame rate to a clip that had none
    fn set_framerate(&mut self, fps: f64);

    /// The frame currently shown
    fn current_frame(&self) -> u32;

    /// Jump to a frame and keep playing
    fn goto_and_play(&mut self, frame: u32);

    /// Jump to a frame and hold it
    fn goto_and_stop(&mut self, frame: u32);

    /// Resume the clip's own playback
    fn play(&mut self);

    /// Stop the clip's own playback
    fn stop(&mut self);

    /// Set the clip's elapsed time in seconds from frame zero
    fn set_elapsed_time(&mut self, seconds: f64);

    /// Render one tick.
    ///
    /// When an elapsed time was assigned since the last call the clip shows
    /// the frame for that time; otherwise a playing clip steps one frame.
    fn advance(&mut self);

    /// Enable or disable the clip's autonomous advancement during host ticks
    fn set_advance_during_ticks(&mut self, enabled: bool);
}

/// A skeletal (Spine-style) display object with named animations
pub trait Skeleton: Identified {
    /// Length of an animation in seconds, `None` if the skeleton lacks it
    fn animation_duration(&self, animation: &str) -> Option<f64>;

    /// Pose one layer of the skeleton at `time` seconds into `animation`
    fn apply(&mut self, layer: usize, animation: &str, time: f64, looping: bool);

    /// Called when the animator releases the skeleton
    fn stop(&mut self) {}
}

/// Shared handle to a clip
pub type ClipRef = Rc<RefCell<dyn Animatable>>;

/// Shared handle to a skeleton
pub type SkeletonRef = Rc<RefCell<dyn Skeleton>>;

/// Something the animator can drive
#[derive(Clone)]
pub enum AnimationTarget {
    /// Frame-labelled clip
    Clip(ClipRef),
    /// Skeletal object
    Skeleton(SkeletonRef),
}

impl AnimationTarget {
    /// Wrap a concrete clip
    pub fn clip<T: Animatable + 'static>(clip: Rc<RefCell<T>>) -> Self {
        Self::Clip(clip)
    }

    /// Wrap a concrete skeleton
    pub fn skeleton<T: Skeleton + 'static>(skeleton: Rc<RefCell<T>>) -> Self {
        Self::Skeleton(skeleton)
    }
}

impl Identified for AnimationTarget {
    fn id(&self) -> InstanceId {
        match self {
            Self::Clip(clip) => clip.id(),
            Self::Skeleton(skeleton) => skeleton.id(),
        }
    }
}

impl fmt::Debug for AnimationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clip(clip) => write!(f, "Clip({})", clip.id()),
            Self::Skeleton(skeleton) => write!(f, "Skeleton({})", skeleton.id()),
        }
    }
}

/// A display container, used to filter bulk operations
pub trait Container {
    /// Whether the instance lives inside this container
    fn contains(&self, instance: InstanceId) -> bool;
}

impl Container for [InstanceId] {
    fn contains(&self, instance: InstanceId) -> bool {
        self.iter().any(|id| *id == instance)
    }
}

impl Container for Vec<InstanceId> {
    fn contains(&self, instance: InstanceId) -> bool {
        self.as_slice().contains(&instance)
    }
}

impl Container for HashSet<InstanceId> {
    fn contains(&self, instance: InstanceId) -> bool {
        HashSet::contains(self, &instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_through_shared_handles() {
        let id = InstanceId::new();
        let shared = Rc::new(RefCell::new(id));
        assert_eq!(shared.id(), id);
        assert_eq!(id.id(), id);
    }

    #[test]
    fn test_containers() {
        let a = InstanceId::new();
        let b = InstanceId::new();

        let list = vec![a];
        assert!(Container::contains(&list, a));
        assert!(!Container::contains(&list, b));

        let set: HashSet<InstanceId> = [b].into_iter().collect();
        assert!(Container::contains(&set, b));
        assert!(!Container::contains(&set, a));
    }
}
