//! Metaprogram graph: vertices, edges and traversal views
//!
//! A [`Metaprogram`] is an append-only directed graph over compile-time
//! evaluation frames. It is populated by a [`MetaprogramBuilder`] from a stream
//! of trace events and read by the traversal views ([`ForwardTraceIter`],
//! [`Backtrace`]).
//!
//! # Storage
//!
//! Vertices and edges live in growable arenas and are referenced by
//! [`VertexId`] / [`EdgeId`] indices. Nothing is ever removed: an index handed
//! out once stays valid for the lifetime of the graph.
//!
//! # Modes
//!
//! [`Mode`] is fixed at construction and read by both the stepping cursor and
//! every trace iterator:
//! - [`Mode::Full`]: re-expand shared vertices every time they are reached
//!   (exact call-stack shape, possibly exponential)
//! - [`Mode::Minimized`]: expand each vertex at most once per traversal

mod backtrace;
mod builder;
mod forward_trace;
mod schema;
mod state;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use backtrace::Backtrace;
pub use builder::{BuilderError, MetaprogramBuilder};

/// Largest number of vertices or edges an arena can index
const MAX_ARENA_LEN: usize = u32::MAX as usize;
pub use forward_trace::{CallGraphNode, ForwardTraceIter};
pub use schema::{Edge, EvaluationResult, EventKind, FileLocation, Frame, MetaprogramNode, Vertex};
pub use state::{MetaprogramState, StepError};

/// Index of a vertex in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub u32);

/// Index of an edge in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl VertexId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EdgeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Traversal mode of a metaprogram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Exact call stacks; shared vertices are expanded on every visit
    Full,
    /// Each vertex's children are expanded at most once
    #[default]
    Minimized,
}

impl Mode {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "full" => Some(Mode::Full),
            "minimized" | "min" | "normal" => Some(Mode::Minimized),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Full => f.write_str("full"),
            Mode::Minimized => f.write_str("minimized"),
        }
    }
}

/// Compile-time call graph of one evaluation
#[derive(Debug, Clone)]
pub struct Metaprogram {
    mode: Mode,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    /// Out-edges per vertex, in discovery order
    out_edges: Vec<Vec<EdgeId>>,
    root: VertexId,
    result: Option<EvaluationResult>,
    state: MetaprogramState,
    /// Cursor states preceding each step, for stepping back
    history: Vec<MetaprogramState>,
}

impl Metaprogram {
    /// Create a graph holding only the synthetic root vertex
    pub fn new(mode: Mode, root_name: &str, root_source_location: FileLocation) -> Self {
        let mut state = MetaprogramState::new();
        state.push_vertex();
        Self {
            mode,
            vertices: vec![Vertex {
                node: MetaprogramNode::code(root_name),
                source_location: root_source_location,
            }],
            edges: Vec::new(),
            out_edges: vec![Vec::new()],
            root: VertexId(0),
            result: None,
            state,
            history: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn root(&self) -> VertexId {
        self.root
    }

    pub fn root_frame(&self) -> Frame {
        Frame::root(self.vertex(self.root))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex(&self, v: VertexId) -> &Vertex {
        &self.vertices[v.index()]
    }

    pub fn edge(&self, e: EdgeId) -> &Edge {
        &self.edges[e.index()]
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> {
        (0..self.vertices.len() as u32).map(VertexId)
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len() as u32).map(EdgeId)
    }

    pub fn source(&self, e: EdgeId) -> VertexId {
        self.edge(e).source
    }

    pub fn target(&self, e: EdgeId) -> VertexId {
        self.edge(e).target
    }

    /// Frame of the callee reached through `e`
    pub fn to_frame(&self, e: EdgeId) -> Frame {
        let edge = self.edge(e);
        Frame::from_edge(edge, self.vertex(edge.target))
    }

    /// Frame at `edge`, or the root frame when `edge` is None
    pub fn frame_at(&self, edge: Option<EdgeId>) -> Frame {
        match edge {
            Some(e) => self.to_frame(e),
            None => self.root_frame(),
        }
    }

    /// All edges leaving `v`, in discovery order
    pub fn out_edges(&self, v: VertexId) -> &[EdgeId] {
        &self.out_edges[v.index()]
    }

    /// Enabled edges leaving `v`, in discovery order
    pub fn filtered_out_edges(&self, v: VertexId) -> impl DoubleEndedIterator<Item = EdgeId> + '_ {
        self.out_edges(v)
            .iter()
            .copied()
            .filter(move |&e| self.edges[e.index()].enabled)
    }

    pub fn enabled_out_degree(&self, v: VertexId) -> usize {
        self.filtered_out_edges(v).count()
    }

    pub fn set_edge_enabled(&mut self, e: EdgeId, enabled: bool) {
        self.edges[e.index()].enabled = enabled;
    }

    /// Enable or disable every edge whose kind matches `pred`
    ///
    /// Returns the number of edges whose status changed.
    pub fn set_kind_enabled<F>(&mut self, pred: F, enabled: bool) -> usize
    where
        F: Fn(EventKind) -> bool,
    {
        let mut changed = 0;
        for edge in self.edges.iter_mut().filter(|edge| pred(edge.kind)) {
            if edge.enabled != enabled {
                edge.enabled = enabled;
                changed += 1;
            }
        }
        changed
    }

    /// Show or hide macro, include and directive edges
    pub fn enable_preprocessor_edges(&mut self, enabled: bool) -> usize {
        self.set_kind_enabled(EventKind::is_preprocessor, enabled)
    }

    /// Final result, once evaluation has ended
    pub fn result(&self) -> Option<&EvaluationResult> {
        self.result.as_ref()
    }

    /// A frozen graph has received its evaluation end and accepts no more events
    pub fn is_frozen(&self) -> bool {
        self.result.is_some()
    }

    pub fn state(&self) -> &MetaprogramState {
        &self.state
    }

    /// Persistent discovered marks, indexed by vertex
    pub fn discovered(&self) -> &[bool] {
        self.state.discovered()
    }

    /// Forward trace from the current cursor position
    pub fn forward_trace(&self, max_depth: Option<usize>) -> ForwardTraceIter<'_> {
        ForwardTraceIter::new(self, max_depth)
    }

    /// Append a vertex; fails once the arena cannot index another one
    pub(crate) fn add_vertex(
        &mut self,
        node: MetaprogramNode,
        source_location: FileLocation,
    ) -> Result<VertexId, BuilderError> {
        let id = VertexId(arena_index(self.vertices.len())?);
        self.vertices.push(Vertex {
            node,
            source_location,
        });
        self.out_edges.push(Vec::new());
        self.state.push_vertex();
        Ok(id)
    }

    pub(crate) fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, BuilderError> {
        let id = EdgeId(arena_index(self.edges.len())?);
        self.out_edges[edge.source.index()].push(id);
        self.edges.push(edge);
        Ok(id)
    }

    pub(crate) fn edge_mut(&mut self, e: EdgeId) -> &mut Edge {
        &mut self.edges[e.index()]
    }

    pub(crate) fn set_result(&mut self, result: EvaluationResult) {
        self.result = Some(result);
    }

    pub(crate) fn state_mut(&mut self) -> &mut MetaprogramState {
        &mut self.state
    }
}

/// Index of the next arena slot; the arena length itself must stay within `u32`
fn arena_index(len: usize) -> Result<u32, BuilderError> {
    match u32::try_from(len) {
        Ok(index) if len < MAX_ARENA_LEN => Ok(index),
        _ => Err(BuilderError::CapacityExceeded {
            capacity: MAX_ARENA_LEN,
        }),
    }
}
