//! Trace-to-graph builder
//!
//! Consumes the linear event stream of one evaluation and grows a
//! [`Metaprogram`] in place.
//!
//! Two independent structures do the work:
//! - the **edge stack** reconstructs who called whom: every begin event pushes a
//!   fresh edge from the current top (or the root), every end event pops it;
//! - the **element map** reconstructs which calls are the same compile-time
//!   object: template steps with an equal `(node, source location)` key reuse
//!   one vertex, everything else gets a fresh vertex.

use std::collections::HashMap;

use super::{Edge, EdgeId, EvaluationResult, EventKind, FileLocation, Metaprogram, MetaprogramNode, Mode, VertexId};

/// Structural faults: the event source and the builder are out of sync.
///
/// The graph under construction must be abandoned after any of these.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BuilderError {
    /// End event with no open begin
    #[error("unbalanced trace: `{event}` without a matching begin event")]
    UnbalancedEnd { event: &'static str },

    /// End event closing an edge opened by a different kind of begin
    #[error("mismatched trace: `{event}` closes an edge opened by {open}")]
    MismatchedEnd { event: &'static str, open: EventKind },

    /// Evaluation end while edges are still open
    #[error("evaluation ended with {open} open edge(s)")]
    OpenEdgesAtEnd { open: usize },

    /// Event after evaluation end
    #[error("metaprogram is frozen: evaluation already ended")]
    Frozen,

    /// More events than the configured trace capacity
    #[error("trace capacity of {capacity} events exceeded")]
    CapacityExceeded { capacity: usize },

    /// Template begin carrying a preprocessor kind
    #[error("`{kind}` is not a template evaluation kind")]
    NotATemplateKind { kind: EventKind },

    /// Event stream ended before evaluation end
    #[error("trace ended without an evaluation_end event ({open} open edge(s))")]
    MissingEvaluationEnd { open: usize },
}

type ElementKey = (MetaprogramNode, FileLocation);

/// Builds a [`Metaprogram`] from begin/end events
#[derive(Debug)]
pub struct MetaprogramBuilder {
    mp: Metaprogram,
    edge_stack: Vec<EdgeId>,
    element_vertex_map: HashMap<ElementKey, VertexId>,
    preprocessor_edges: bool,
    trace_capacity: Option<usize>,
}

impl MetaprogramBuilder {
    pub fn new(mode: Mode, root_name: &str, root_source_location: FileLocation) -> Self {
        Self {
            mp: Metaprogram::new(mode, root_name, root_source_location),
            edge_stack: Vec::new(),
            element_vertex_map: HashMap::new(),
            preprocessor_edges: false,
            trace_capacity: None,
        }
    }

    /// Record macro, include and directive edges as enabled
    ///
    /// They are always recorded; when disabled they are hidden from filtered
    /// traversals.
    pub fn with_preprocessor_edges(mut self, enabled: bool) -> Self {
        self.preprocessor_edges = enabled;
        self
    }

    /// Limit the number of edges the trace may create
    pub fn with_trace_capacity(mut self, capacity: Option<usize>) -> Self {
        self.trace_capacity = capacity;
        self
    }

    pub fn metaprogram(&self) -> &Metaprogram {
        &self.mp
    }

    pub fn into_metaprogram(self) -> Metaprogram {
        self.mp
    }

    /// Number of begin events still waiting for their end event
    pub fn open_edges(&self) -> usize {
        self.edge_stack.len()
    }

    pub fn handle_template_begin(
        &mut self,
        kind: EventKind,
        type_name: &str,
        point_of_event: &FileLocation,
        source_location: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        if !kind.is_template() {
            tracing::warn!(%kind, name = type_name, "template begin with a preprocessor kind");
            return Err(BuilderError::NotATemplateKind { kind });
        }
        let vertex = self.shared_vertex(MetaprogramNode::type_name(type_name), source_location)?;
        self.begin(kind, vertex, point_of_event, timestamp)
    }

    pub fn handle_template_end(&mut self, timestamp: f64) -> Result<(), BuilderError> {
        self.end("template end", EventKind::is_template, timestamp)
            .map(|_| ())
    }

    pub fn handle_macro_expansion_begin(
        &mut self,
        name: &str,
        args: Option<Vec<String>>,
        point_of_event: &FileLocation,
        source_location: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let node = MetaprogramNode::Macro {
            name: name.to_string(),
            args,
        };
        let vertex = self.fresh_vertex(node, source_location.clone())?;
        self.begin(EventKind::MacroExpansion, vertex, point_of_event, timestamp)
    }

    pub fn handle_rescanning(&mut self, code: &str, timestamp: f64) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let vertex = self.fresh_vertex(MetaprogramNode::code(code), FileLocation::default())?;
        self.leaf(EventKind::Rescanning, vertex, &FileLocation::default(), timestamp)
    }

    pub fn handle_expanded_code(
        &mut self,
        code: &str,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let vertex = self.fresh_vertex(MetaprogramNode::code(code), point_of_event.clone())?;
        self.leaf(EventKind::ExpandedCode, vertex, point_of_event, timestamp)
    }

    pub fn handle_macro_expansion_end(&mut self, timestamp: f64) -> Result<(), BuilderError> {
        self.end(
            "macro expansion end",
            |kind| kind == EventKind::MacroExpansion,
            timestamp,
        )
        .map(|_| ())
    }

    pub fn handle_token_generation(
        &mut self,
        category: &str,
        value: &str,
        point_of_event: &FileLocation,
        source_location: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let vertex = self.fresh_vertex(token(category, value), source_location.clone())?;
        self.leaf(EventKind::GeneratedToken, vertex, point_of_event, timestamp)
    }

    pub fn handle_token_skipping(
        &mut self,
        category: &str,
        value: &str,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let vertex = self.fresh_vertex(token(category, value), point_of_event.clone())?;
        self.leaf(EventKind::SkippedToken, vertex, point_of_event, timestamp)
    }

    pub fn handle_include_begin(
        &mut self,
        path: &str,
        system: bool,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let node = MetaprogramNode::Include {
            path: path.to_string(),
            system,
        };
        let kind = if system {
            EventKind::SysInclude
        } else {
            EventKind::QuoteInclude
        };
        let vertex = self.fresh_vertex(node, point_of_event.clone())?;
        self.begin(kind, vertex, point_of_event, timestamp)
    }

    pub fn handle_include_end(&mut self, timestamp: f64) -> Result<(), BuilderError> {
        self.end(
            "include end",
            |kind| matches!(kind, EventKind::QuoteInclude | EventKind::SysInclude),
            timestamp,
        )
        .map(|_| ())
    }

    pub fn handle_define(
        &mut self,
        name: &str,
        args: Option<Vec<String>>,
        body: &str,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let node = MetaprogramNode::Define {
            name: name.to_string(),
            args,
            body: body.to_string(),
        };
        let vertex = self.fresh_vertex(node, point_of_event.clone())?;
        self.leaf(EventKind::MacroDefinition, vertex, point_of_event, timestamp)
    }

    pub fn handle_undefine(
        &mut self,
        name: &str,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let vertex = self.fresh_vertex(MetaprogramNode::code(format!("#undef {}", name)), point_of_event.clone())?;
        self.leaf(EventKind::MacroDeletion, vertex, point_of_event, timestamp)
    }

    pub fn handle_preprocessing_condition_begin(
        &mut self,
        expression: &str,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let vertex = self.fresh_vertex(MetaprogramNode::code(expression), point_of_event.clone())?;
        self.begin(EventKind::PreprocessingCondition, vertex, point_of_event, timestamp)
    }

    /// Close the open condition and store which branch was taken
    pub fn handle_preprocessing_condition_end(
        &mut self,
        result: bool,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        let edge = self.end(
            "preprocessing condition end",
            |kind| kind == EventKind::PreprocessingCondition,
            timestamp,
        )?;
        self.mp.edge_mut(edge).condition_result = Some(result);
        Ok(())
    }

    pub fn handle_preprocessing_else(
        &mut self,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let vertex = self.fresh_vertex(MetaprogramNode::code("#else"), point_of_event.clone())?;
        self.leaf(EventKind::PreprocessingElse, vertex, point_of_event, timestamp)
    }

    pub fn handle_preprocessing_endif(
        &mut self,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let vertex = self.fresh_vertex(MetaprogramNode::code("#endif"), point_of_event.clone())?;
        self.leaf(EventKind::PreprocessingEndif, vertex, point_of_event, timestamp)
    }

    pub fn handle_error_directive(
        &mut self,
        message: &str,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let node = MetaprogramNode::Message {
            text: message.to_string(),
        };
        let vertex = self.fresh_vertex(node, point_of_event.clone())?;
        self.leaf(EventKind::ErrorDirective, vertex, point_of_event, timestamp)
    }

    pub fn handle_line_directive(
        &mut self,
        arg: &str,
        point_of_event: &FileLocation,
        source_location: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        self.check_accepting()?;
        let vertex = self.fresh_vertex(MetaprogramNode::code(format!("#line {}", arg)), source_location.clone())?;
        self.leaf(EventKind::LineDirective, vertex, point_of_event, timestamp)
    }

    /// Record the final result and freeze the metaprogram
    pub fn handle_evaluation_end(&mut self, result: EvaluationResult) -> Result<(), BuilderError> {
        if self.mp.is_frozen() {
            return Err(BuilderError::Frozen);
        }
        if !self.edge_stack.is_empty() {
            let open = self.edge_stack.len();
            tracing::warn!(open, "evaluation end with open edges");
            return Err(BuilderError::OpenEdgesAtEnd { open });
        }
        tracing::debug!(
            vertices = self.mp.vertex_count(),
            edges = self.mp.edge_count(),
            error = result.is_error(),
            "evaluation ended"
        );
        self.mp.set_result(result);
        Ok(())
    }

    fn check_accepting(&self) -> Result<(), BuilderError> {
        if self.mp.is_frozen() {
            return Err(BuilderError::Frozen);
        }
        if let Some(capacity) = self.trace_capacity {
            if self.mp.edge_count() >= capacity {
                return Err(BuilderError::CapacityExceeded { capacity });
            }
        }
        Ok(())
    }

    /// Vertex for a template step, reused for an equal key
    fn shared_vertex(
        &mut self,
        node: MetaprogramNode,
        source_location: &FileLocation,
    ) -> Result<VertexId, BuilderError> {
        let key = (node, source_location.clone());
        if let Some(&vertex) = self.element_vertex_map.get(&key) {
            tracing::debug!(vertex = vertex.0, node = %key.0, "reusing vertex");
            return Ok(vertex);
        }
        let vertex = self.mp.add_vertex(key.0.clone(), key.1.clone())?;
        self.element_vertex_map.insert(key, vertex);
        Ok(vertex)
    }

    /// Vertex for a sequential textual event, never shared
    fn fresh_vertex(
        &mut self,
        node: MetaprogramNode,
        source_location: FileLocation,
    ) -> Result<VertexId, BuilderError> {
        self.mp.add_vertex(node, source_location)
    }

    fn add_edge(
        &mut self,
        kind: EventKind,
        target: VertexId,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<EdgeId, BuilderError> {
        let source = match self.edge_stack.last() {
            Some(&top) => self.mp.target(top),
            None => self.mp.root(),
        };
        let enabled = kind.is_template() || self.preprocessor_edges;
        tracing::trace!(%kind, source = source.0, target = target.0, timestamp, "edge");
        self.mp.add_edge(Edge {
            source,
            target,
            kind,
            point_of_event: point_of_event.clone(),
            begin_timestamp: timestamp,
            end_timestamp: None,
            condition_result: None,
            enabled,
        })
    }

    fn begin(
        &mut self,
        kind: EventKind,
        target: VertexId,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        let edge = self.add_edge(kind, target, point_of_event, timestamp)?;
        self.edge_stack.push(edge);
        Ok(())
    }

    /// Begin and end in one event
    fn leaf(
        &mut self,
        kind: EventKind,
        target: VertexId,
        point_of_event: &FileLocation,
        timestamp: f64,
    ) -> Result<(), BuilderError> {
        let edge = self.add_edge(kind, target, point_of_event, timestamp)?;
        self.mp.edge_mut(edge).end_timestamp = Some(timestamp);
        Ok(())
    }

    /// Pop the open edge, which must have been opened by a kind `closes` accepts
    fn end<F>(&mut self, event: &'static str, closes: F, timestamp: f64) -> Result<EdgeId, BuilderError>
    where
        F: Fn(EventKind) -> bool,
    {
        if self.mp.is_frozen() {
            return Err(BuilderError::Frozen);
        }
        let Some(&edge) = self.edge_stack.last() else {
            tracing::warn!(event, "end event with empty edge stack");
            return Err(BuilderError::UnbalancedEnd { event });
        };
        let open = self.mp.edge(edge).kind;
        if !closes(open) {
            tracing::warn!(event, %open, "end event closes a different kind of edge");
            return Err(BuilderError::MismatchedEnd { event, open });
        }
        self.edge_stack.pop();
        self.mp.edge_mut(edge).end_timestamp = Some(timestamp);
        Ok(edge)
    }
}

fn token(category: &str, value: &str) -> MetaprogramNode {
    MetaprogramNode::Token {
        category: category.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(row: u32) -> FileLocation {
        FileLocation::new("main.cpp", row, 1)
    }

    fn builder() -> MetaprogramBuilder {
        MetaprogramBuilder::new(Mode::Minimized, "<root>", FileLocation::default())
    }

    #[test]
    fn test_equal_keys_share_one_vertex() {
        let mut b = builder();
        for ts in 0..3 {
            b.handle_template_begin(EventKind::TemplateInstantiation, "fib<2>", &loc(10), &loc(1), ts as f64)
                .unwrap();
            b.handle_template_end(ts as f64 + 0.5).unwrap();
        }
        let mp = b.metaprogram();
        assert_eq!(mp.vertex_count(), 2, "root + one shared vertex");
        assert_eq!(mp.edge_count(), 3, "every begin creates an edge");
        assert_eq!(mp.out_edges(mp.root()).len(), 3);
    }

    #[test]
    fn test_different_source_location_creates_distinct_vertex() {
        let mut b = builder();
        b.handle_template_begin(EventKind::TemplateInstantiation, "fib<2>", &loc(10), &loc(1), 0.0)
            .unwrap();
        b.handle_template_end(1.0).unwrap();
        b.handle_template_begin(EventKind::TemplateInstantiation, "fib<2>", &loc(10), &loc(2), 2.0)
            .unwrap();
        b.handle_template_end(3.0).unwrap();
        assert_eq!(b.metaprogram().vertex_count(), 3);
    }

    #[test]
    fn test_memoization_reenters_instantiation_vertex() {
        let mut b = builder();
        b.handle_template_begin(EventKind::TemplateInstantiation, "fib<1>", &loc(10), &loc(1), 0.0)
            .unwrap();
        b.handle_template_end(1.0).unwrap();
        b.handle_template_begin(EventKind::Memoization, "fib<1>", &loc(11), &loc(1), 2.0)
            .unwrap();
        b.handle_template_end(2.0).unwrap();

        let mp = b.metaprogram();
        let edges = mp.out_edges(mp.root());
        assert_eq!(mp.target(edges[0]), mp.target(edges[1]));
        assert_eq!(mp.edge(edges[1]).kind, EventKind::Memoization);
    }

    #[test]
    fn test_nested_begin_links_from_top_of_stack() {
        let mut b = builder();
        b.handle_template_begin(EventKind::TemplateInstantiation, "outer", &loc(1), &loc(1), 0.0)
            .unwrap();
        b.handle_template_begin(EventKind::TemplateInstantiation, "inner", &loc(2), &loc(2), 0.1)
            .unwrap();
        assert_eq!(b.open_edges(), 2);
        b.handle_template_end(0.2).unwrap();
        b.handle_template_end(0.3).unwrap();
        assert_eq!(b.open_edges(), 0);

        let mp = b.metaprogram();
        let outer_edge = mp.out_edges(mp.root())[0];
        let outer = mp.target(outer_edge);
        let inner_edge = mp.out_edges(outer)[0];
        assert_eq!(mp.source(inner_edge), outer);
        assert_eq!(mp.vertex(mp.target(inner_edge)).node, MetaprogramNode::type_name("inner"));
        assert_eq!(mp.edge(outer_edge).time_taken(), Some(0.3));
    }

    #[test]
    fn test_end_with_empty_stack_is_structural_fault() {
        let mut b = builder();
        assert_eq!(
            b.handle_template_end(0.0),
            Err(BuilderError::UnbalancedEnd {
                event: "template end"
            })
        );
    }

    #[test]
    fn test_end_of_wrong_kind_is_structural_fault() {
        let mut b = builder();
        b.handle_macro_expansion_begin("M", None, &loc(1), &loc(1), 0.0).unwrap();
        assert!(matches!(
            b.handle_template_end(1.0),
            Err(BuilderError::MismatchedEnd {
                open: EventKind::MacroExpansion,
                ..
            })
        ));
    }

    #[test]
    fn test_evaluation_end_requires_empty_stack() {
        let mut b = builder();
        b.handle_template_begin(EventKind::TemplateInstantiation, "x", &loc(1), &loc(1), 0.0)
            .unwrap();
        assert_eq!(
            b.handle_evaluation_end(EvaluationResult::Type("x".to_string())),
            Err(BuilderError::OpenEdgesAtEnd { open: 1 })
        );
    }

    #[test]
    fn test_events_after_evaluation_end_are_rejected() {
        let mut b = builder();
        b.handle_evaluation_end(EvaluationResult::Type("int".to_string()))
            .unwrap();
        assert!(b.metaprogram().is_frozen());
        assert_eq!(
            b.handle_template_begin(EventKind::TemplateInstantiation, "x", &loc(1), &loc(1), 0.0),
            Err(BuilderError::Frozen)
        );
        assert_eq!(
            b.handle_evaluation_end(EvaluationResult::Type("int".to_string())),
            Err(BuilderError::Frozen)
        );
    }

    #[test]
    fn test_preprocessor_frames_never_deduplicate() {
        let mut b = builder();
        for ts in 0..2 {
            b.handle_macro_expansion_begin("M", None, &loc(1), &loc(1), ts as f64)
                .unwrap();
            b.handle_macro_expansion_end(ts as f64).unwrap();
        }
        assert_eq!(b.metaprogram().vertex_count(), 3);
    }

    #[test]
    fn test_preprocessor_edges_disabled_by_default() {
        let mut b = builder();
        b.handle_define("ONE", None, "1", &loc(1), 0.0).unwrap();
        b.handle_template_begin(EventKind::TemplateInstantiation, "x", &loc(2), &loc(2), 0.1)
            .unwrap();
        b.handle_template_end(0.2).unwrap();

        let mp = b.metaprogram();
        assert_eq!(mp.out_edges(mp.root()).len(), 2);
        assert_eq!(mp.enabled_out_degree(mp.root()), 1);

        let mut b = builder().with_preprocessor_edges(true);
        b.handle_define("ONE", None, "1", &loc(1), 0.0).unwrap();
        assert_eq!(b.metaprogram().enabled_out_degree(b.metaprogram().root()), 1);
    }

    #[test]
    fn test_condition_end_stores_branch_outcome() {
        let mut b = builder().with_preprocessor_edges(true);
        b.handle_preprocessing_condition_begin("FOO > 1", &loc(3), 0.0)
            .unwrap();
        b.handle_macro_expansion_begin("FOO", None, &loc(3), &loc(1), 0.1)
            .unwrap();
        b.handle_macro_expansion_end(0.2).unwrap();
        b.handle_preprocessing_condition_end(true, 0.3).unwrap();
        b.handle_preprocessing_endif(&loc(5), 0.4).unwrap();

        let mp = b.metaprogram();
        let condition = mp.out_edges(mp.root())[0];
        let frame = mp.to_frame(condition);
        assert_eq!(frame.condition_result, Some(true));
        assert_eq!(mp.enabled_out_degree(mp.target(condition)), 1);
        assert_eq!(mp.out_edges(mp.root()).len(), 2);
    }

    #[test]
    fn test_template_begin_rejects_preprocessor_kind() {
        let mut b = builder();
        assert_eq!(
            b.handle_template_begin(EventKind::MacroExpansion, "M", &loc(1), &loc(1), 0.0),
            Err(BuilderError::NotATemplateKind {
                kind: EventKind::MacroExpansion
            })
        );
        let mp = b.metaprogram();
        assert_eq!(mp.vertex_count(), 1, "no vertex for the rejected begin");
        assert_eq!(mp.edge_count(), 0);
        assert_eq!(b.open_edges(), 0);
    }

    #[test]
    fn test_trace_capacity_is_enforced() {
        let mut b = builder().with_trace_capacity(Some(1));
        b.handle_template_begin(EventKind::TemplateInstantiation, "a", &loc(1), &loc(1), 0.0)
            .unwrap();
        b.handle_template_end(0.1).unwrap();
        assert_eq!(
            b.handle_template_begin(EventKind::TemplateInstantiation, "b", &loc(2), &loc(2), 0.2),
            Err(BuilderError::CapacityExceeded { capacity: 1 })
        );
    }
}
