// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame labels and segment resolution.
//!
//! A playable segment `E` is a label on the clip followed, somewhere later in
//! the label list, by either `E_stop` (plays once) or `E_loop` (wraps back to
//! `E`). Whichever terminator comes first wins. A start label without a
//! terminator is not a segment.

use crate::error::{AnimatorError, Result};
use serde::{Deserialize, Serialize};

/// Suffix of the label that ends a one-shot segment
pub const STOP_SUFFIX: &str = "_stop";

/// Suffix of the label that ends a looping segment
pub const LOOP_SUFFIX: &str = "_loop";

/// A named frame on a clip's timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLabel {
    /// Label name
    pub label: String,
    /// Frame index
    pub position: u32,
}

impl FrameLabel {
    /// Create a new label
    pub fn new(label: impl Into<String>, position: u32) -> Self {
        Self {
            label: label.into(),
            position,
        }
    }
}

/// Frame bounds of a resolved segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBounds {
    /// Frame of the start label
    pub first_frame: u32,
    /// Frame of the `_stop`/`_loop` label
    pub last_frame: u32,
    /// Whether the terminator was `_loop`
    pub looping: bool,
}

impl SegmentBounds {
    /// Segment length in frames
    pub fn length(&self) -> u32 {
        self.last_frame - self.first_frame
    }

    /// Start of the segment in seconds
    pub fn start_time(&self, fps: f64) -> f64 {
        self.first_frame as f64 / fps
    }

    /// Duration of the segment in seconds
    pub fn duration(&self, fps: f64) -> f64 {
        self.length() as f64 / fps
    }
}

/// Resolve a segment name against an ordered label list.
pub fn resolve_segment(labels: &[FrameLabel], segment: &str) -> Result<SegmentBounds> {
    let start = labels
        .iter()
        .position(|l| l.label == segment)
        .ok_or_else(|| AnimatorError::SegmentNotFound {
            segment: segment.to_string(),
        })?;

    let stop_label = format!("{segment}{STOP_SUFFIX}");
    let loop_label = format!("{segment}{LOOP_SUFFIX}");
    let first_frame = labels[start].position;

    labels[start + 1..]
        .iter()
        .find_map(|l| {
            if l.label == stop_label {
                Some((l.position, false))
            } else if l.label == loop_label {
                Some((l.position, true))
            } else {
                None
            }
        })
        .filter(|(last_frame, _)| *last_frame >= first_frame)
        .map(|(last_frame, looping)| SegmentBounds {
            first_frame,
            last_frame,
            looping,
        })
        .ok_or_else(|| AnimatorError::SegmentUnterminated {
            segment: segment.to_string(),
        })
}

/// Whether a label list contains a complete segment
pub fn has_segment(labels: &[FrameLabel], segment: &str) -> bool {
    resolve_segment(labels, segment).is_ok()
}

/// Position of a single label, if present
pub fn label_position(labels: &[FrameLabel], label: &str) -> Option<u32> {
    labels.iter().find(|l| l.label == label).map(|l| l.position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, u32)]) -> Vec<FrameLabel> {
        pairs.iter().map(|(l, p)| FrameLabel::new(*l, *p)).collect()
    }

    #[test]
    fn test_loop_terminator() {
        let bounds = resolve_segment(&labels(&[("run", 0), ("run_loop", 10)]), "run").unwrap();
        assert_eq!(bounds.first_frame, 0);
        assert_eq!(bounds.last_frame, 10);
        assert!(bounds.looping);
        assert_eq!(bounds.length(), 10);
    }

    #[test]
    fn test_stop_terminator() {
        let bounds = resolve_segment(&labels(&[("run", 0), ("run_stop", 10)]), "run").unwrap();
        assert_eq!(bounds.last_frame, 10);
        assert!(!bounds.looping);
    }

    #[test]
    fn test_missing_terminator() {
        let result = resolve_segment(&labels(&[("run", 0)]), "run");
        assert!(matches!(result, Err(AnimatorError::SegmentUnterminated { .. })));
    }

    #[test]
    fn test_missing_start() {
        let result = resolve_segment(&labels(&[("walk", 0), ("walk_stop", 4)]), "run");
        assert!(matches!(result, Err(AnimatorError::SegmentNotFound { .. })));
    }

    #[test]
    fn test_first_terminator_wins() {
        let table = labels(&[("idle", 5), ("idle_loop", 12), ("idle_stop", 20)]);
        let bounds = resolve_segment(&table, "idle").unwrap();
        assert_eq!(bounds.last_frame, 12);
        assert!(bounds.looping);
    }

    #[test]
    fn test_terminator_before_start_is_ignored() {
        let table = labels(&[("open_stop", 0), ("open", 4)]);
        assert!(!has_segment(&table, "open"));
    }

    #[test]
    fn test_other_segments_do_not_terminate() {
        let table = labels(&[
            ("open", 0),
            ("opened", 8),
            ("opened_loop", 12),
            ("open_stop", 24),
        ]);
        let bounds = resolve_segment(&table, "open").unwrap();
        assert_eq!((bounds.first_frame, bounds.last_frame), (0, 24));
        assert!(!bounds.looping);
    }

    #[test]
    fn test_time_conversion() {
        let bounds = SegmentBounds {
            first_frame: 12,
            last_frame: 36,
            looping: false,
        };
        assert!((bounds.start_time(24.0) - 0.5).abs() < 1e-9);
        assert!((bounds.duration(24.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_label_position() {
        let table = labels(&[("a", 3), ("b", 7)]);
        assert_eq!(label_position(&table, "b"), Some(7));
        assert_eq!(label_position(&table, "c"), None);
    }
}
