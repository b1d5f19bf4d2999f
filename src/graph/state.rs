//! Stepping cursor and persistent discovered marks
//!
//! The cursor walks the graph one frame at a time in depth-first order, the
//! way the debugger's `step` command does. It also owns the persistent
//! discovered set that trace iterators snapshot on construction.

use super::{EdgeId, Frame, Metaprogram, Mode, VertexId};

/// Error types for cursor movement.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StepError {
    /// No frame left to step into
    #[error("metaprogram finished: no more frames to step into")]
    Finished,

    /// Nothing to step back to
    #[error("metaprogram at start: cannot step back")]
    AtStart,
}

/// Cursor position and discovery marks of a metaprogram
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaprogramState {
    discovered: Vec<bool>,
    /// Edge through which each vertex was most recently expanded
    parent_edge: Vec<Option<EdgeId>>,
    /// Pending positions; the top is the current one, `None` is the root
    edge_stack: Vec<Option<EdgeId>>,
}

impl MetaprogramState {
    pub(crate) fn new() -> Self {
        Self {
            discovered: Vec::new(),
            parent_edge: Vec::new(),
            edge_stack: vec![None],
        }
    }

    pub(crate) fn push_vertex(&mut self) {
        self.discovered.push(false);
        self.parent_edge.push(None);
    }

    /// Bring a state saved before the graph grew up to the current vertex count
    fn grow_to(&mut self, vertex_count: usize) {
        if self.discovered.len() < vertex_count {
            self.discovered.resize(vertex_count, false);
            self.parent_edge.resize(vertex_count, None);
        }
    }

    pub fn discovered(&self) -> &[bool] {
        &self.discovered
    }

    pub fn is_discovered(&self, v: VertexId) -> bool {
        self.discovered[v.index()]
    }

    /// Current position: `Some(None)` is the root, `None` means finished
    pub fn current(&self) -> Option<Option<EdgeId>> {
        self.edge_stack.last().copied()
    }

    pub fn is_finished(&self) -> bool {
        self.edge_stack.is_empty()
    }

    /// Number of positions still waiting on the cursor stack
    pub fn pending(&self) -> usize {
        self.edge_stack.len()
    }
}

impl Metaprogram {
    /// Edge of the current cursor position; None at the root or when finished
    pub fn current_edge(&self) -> Option<EdgeId> {
        self.state().current().flatten()
    }

    /// Frame at the cursor, None when finished
    pub fn current_frame(&self) -> Option<Frame> {
        self.state().current().map(|edge| self.frame_at(edge))
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    pub fn is_at_start(&self) -> bool {
        self.history.is_empty()
    }

    /// Number of steps taken since the last reset
    pub fn steps_taken(&self) -> usize {
        self.history.len()
    }

    /// Move the cursor to the next frame in depth-first order
    ///
    /// Expanding a vertex marks it discovered permanently. Children are stepped
    /// in discovery order. In minimized mode edges leading to discovered
    /// vertices are skipped.
    pub fn step(&mut self) -> Result<(), StepError> {
        let current = self.state().current().ok_or(StepError::Finished)?;
        self.history.push(self.state().clone());

        let vertex = match current {
            Some(e) => self.target(e),
            None => self.root(),
        };
        let expand = self.mode() == Mode::Full || !self.state().is_discovered(vertex);
        let children: Vec<EdgeId> = if expand {
            self.filtered_out_edges(vertex)
                .rev()
                .filter(|&e| {
                    self.mode() == Mode::Full || !self.state().is_discovered(self.target(e))
                })
                .collect()
        } else {
            Vec::new()
        };

        let state = self.state_mut();
        state.edge_stack.pop();
        if expand {
            state.discovered[vertex.index()] = true;
            state.parent_edge[vertex.index()] = current;
            state.edge_stack.extend(children.into_iter().map(Some));
        }
        Ok(())
    }

    /// Step `n` times, stopping early at the end
    ///
    /// Returns the number of steps actually taken.
    pub fn step_n(&mut self, n: usize) -> usize {
        let mut taken = 0;
        while taken < n && self.step().is_ok() {
            taken += 1;
        }
        taken
    }

    /// Undo the most recent step
    pub fn step_back(&mut self) -> Result<(), StepError> {
        let mut previous = self.history.pop().ok_or(StepError::AtStart)?;
        previous.grow_to(self.vertex_count());
        *self.state_mut() = previous;
        Ok(())
    }

    /// Return the cursor to the root and forget all discovery marks
    pub fn reset_state(&mut self) {
        let mut state = MetaprogramState::new();
        state.grow_to(self.vertex_count());
        *self.state_mut() = state;
        self.history.clear();
    }

    pub(crate) fn parent_edge(&self, v: VertexId) -> Option<EdgeId> {
        self.state().parent_edge[v.index()]
    }
}
