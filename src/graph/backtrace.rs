//! Backtrace of the stepping cursor
//!
//! Follows the recorded parent edges from the current position back to the
//! root. Innermost frame first.

use serde::Serialize;

use super::{Frame, Metaprogram};

/// Frames from the cursor position to the root
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Backtrace {
    frames: Vec<Frame>,
}

impl Backtrace {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame `n`, where 0 is the current frame
    pub fn get(&self, n: usize) -> Option<&Frame> {
        self.frames.get(n)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl<'a> IntoIterator for &'a Backtrace {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

impl Metaprogram {
    /// Backtrace of the cursor position; empty when the cursor is finished
    pub fn backtrace(&self) -> Backtrace {
        let Some(start) = self.state().current() else {
            return Backtrace::default();
        };

        let mut frames = Vec::new();
        let mut edge = start;
        while let Some(e) = edge {
            if frames.len() > self.edge_count() {
                tracing::warn!(edge = e.0, "parent edges form a loop, truncating backtrace");
                break;
            }
            frames.push(self.to_frame(e));
            edge = self.parent_edge(self.source(e));
        }
        frames.push(self.root_frame());
        Backtrace { frames }
    }
}
