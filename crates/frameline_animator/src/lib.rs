// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame-label driven animation scheduler.
//!
//! This crate plays named segments of display objects and keeps them in step
//! with the host render loop:
//! - Segment resolution from `E` / `E_stop` / `E_loop` frame labels
//! - A registry with at most one timeline per instance
//! - Frame-addressed, time-addressed and skeletal playback
//! - Sound-synchronized timelines with captions
//! - A character controller for queued clips
//!
//! ## Architecture
//!
//! The scheduler is built on:
//! - [`Animatable`] and [`Skeleton`] capability traits implemented by target adapters
//! - An [`UpdateSource`] it subscribes to only while timelines are active
//! - A [`SoundLibrary`] whose sound instances become the clock once attached
//! - Completion callbacks that may freely call back into the [`Animator`]

pub mod animator;
pub mod audio;
pub mod character;
pub mod clip;
pub mod config;
pub mod error;
pub mod label;
pub mod options;
pub mod skeletal;
pub mod target;
pub mod timeline;
pub mod update;

mod advance;

#[cfg(test)]
mod test_support;

pub use animator::Animator;
pub use audio::{Captions, SoundCallback, SoundData, SoundHandle, SoundInstance, SoundLibrary};
pub use character::{CharacterCallback, CharacterClip, CharacterController, PlayClipsOptions};
pub use clip::{ClipCommand, LabeledClip};
pub use config::{Addressing, AnimatorConfig, CONFIG_FORMAT_VERSION};
pub use error::{AnimatorError, Result};
pub use label::{has_segment, resolve_segment, FrameLabel, SegmentBounds};
pub use options::{CompletionFn, PlayOptions, StartPosition};
pub use skeletal::{SkeletalLayer, SkeletalRequest};
pub use target::{
    AnimationTarget, Animatable, ClipRef, Container, Identified, InstanceId, Skeleton,
    SkeletonRef,
};
pub use timeline::{PlaybackKind, TimelineHandle, TimelineId, TimelineInfo};
pub use update::{UpdateCallback, UpdateLoop, UpdateSource};
