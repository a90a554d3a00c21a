//! Advisory decorations for the interactive preview.
//!
//! Derived purely from the streamed content's line count. The presentation
//! surface may render them or not; nothing downstream reads them back.

use std::ops::Range;

use serde::Serialize;

use crate::core::text::line_count;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PreviewDecorations {
    /// Zero-based line range already written by the producer.
    pub faded: Range<usize>,
    /// Zero-based frontier line currently being streamed.
    pub active_line: Option<usize>,
}

impl PreviewDecorations {
    pub fn is_empty(&self) -> bool {
        self.faded.is_empty() && self.active_line.is_none()
    }
}

/// Compute decorations for the current streamed content.
pub fn preview_decorations(streamed: &str) -> PreviewDecorations {
    let lines = line_count(streamed);
    if lines == 0 {
        return PreviewDecorations::default();
    }
    let frontier = lines - 1;
    PreviewDecorations {
        faded: 0..frontier,
        active_line: Some(frontier),
    }
}
