// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo errors.

use thiserror::Error;

/// Errors that stop the demo
#[derive(Debug, Error)]
pub enum DemoError {
    /// Animator setup failed
    #[error(transparent)]
    Animator(#[from] frameline_animator::AnimatorError),

    /// Scene file could not be parsed
    #[error("Scene parse error: {0}")]
    SceneParse(#[from] ron::error::SpannedError),

    /// A scene action names a clip the scene doesn't define
    #[error("Scene references unknown clip \"{0}\"")]
    UnknownClip(String),

    /// Log filter directive was malformed
    #[error("Invalid log directive: {0}")]
    LogDirective(#[from] tracing_subscriber::filter::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the demo
pub type Result<T> = std::result::Result<T, DemoError>;
