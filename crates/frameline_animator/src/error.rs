// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animator errors.

use crate::target::InstanceId;
use thiserror::Error;

/// Animator errors
#[derive(Debug, Error)]
pub enum AnimatorError {
    /// The start label of a segment is not on the clip
    #[error("No event \"{segment}\" was found")]
    SegmentNotFound {
        /// Requested segment name
        segment: String,
    },

    /// The start label exists but no `_stop`/`_loop` label follows it
    #[error("Event \"{segment}\" lacks a _stop or _loop end label")]
    SegmentUnterminated {
        /// Requested segment name
        segment: String,
    },

    /// A skeleton has no animation with the requested name
    #[error("Skeleton {instance} has no animation named \"{animation}\"")]
    AnimationNotFound {
        /// Skeleton identity
        instance: InstanceId,
        /// Requested animation name
        animation: String,
    },

    /// A skeletal request without any animation in it
    #[error("Skeletal request for {instance} contains no animations")]
    EmptyRequest {
        /// Skeleton identity
        instance: InstanceId,
    },

    /// The target can't be driven by the animator
    #[error("Instance {instance} cannot be animated: {reason}")]
    IncompatibleTarget {
        /// Target identity
        instance: InstanceId,
        /// Why the target was rejected
        reason: String,
    },

    /// Config file written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedConfigVersion {
        /// Version found in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },

    /// Config parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Config serialization error
    #[error("Config serialization error: {0}")]
    ConfigWrite(#[from] ron::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for animator operations
pub type Result<T> = std::result::Result<T, AnimatorError>;
