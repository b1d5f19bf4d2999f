//! Lazy depth-first forward trace over a metaprogram
//!
//! Starts at the metaprogram's cursor position (the root when nothing was
//! stepped) and yields one [`CallGraphNode`] per visited frame. Pending edges
//! are kept on a stack, so siblings come out in reverse discovery order.
//!
//! Each iterator owns a private copy of the discovered marks taken at
//! construction. In minimized mode it marks vertices in that copy as it
//! expands them; the metaprogram itself is never written.

use serde::Serialize;

use super::{EdgeId, Frame, Metaprogram, Mode, VertexId};

/// A frame as positioned in one traversal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallGraphNode {
    pub frame: Frame,
    /// Distance from the traversal start
    pub depth: usize,
    /// Number of children emitted directly below this node
    pub children: usize,
}

/// Forward trace iterator
#[derive(Debug, Clone)]
pub struct ForwardTraceIter<'a> {
    mp: Option<&'a Metaprogram>,
    max_depth: Option<usize>,
    discovered: Vec<bool>,
    to_visit: Vec<(EdgeId, usize)>,
    current: Option<CallGraphNode>,
    finished: bool,
    /// Vertices on the path to the current node, full mode without a depth limit only
    path: Vec<VertexId>,
    on_path: Vec<bool>,
    cycle_detected: bool,
}

impl<'a> ForwardTraceIter<'a> {
    pub fn new(mp: &'a Metaprogram, max_depth: Option<usize>) -> Self {
        let mut iter = Self {
            mp: Some(mp),
            max_depth,
            discovered: mp.discovered().to_vec(),
            to_visit: Vec::new(),
            current: None,
            finished: false,
            path: Vec::new(),
            on_path: Vec::new(),
            cycle_detected: false,
        };
        match mp.state().current() {
            Some(start) => iter.visit(start, 0),
            None => iter.finished = true,
        }
        iter
    }

    /// The finished sentinel every exhausted iterator compares equal to
    pub fn end() -> Self {
        Self {
            mp: None,
            max_depth: None,
            discovered: Vec::new(),
            to_visit: Vec::new(),
            current: None,
            finished: true,
            path: Vec::new(),
            on_path: Vec::new(),
            cycle_detected: false,
        }
    }

    /// Node the next call to `next` yields
    pub fn current(&self) -> Option<&CallGraphNode> {
        self.current.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True once a vertex was reached again through its own subtree
    pub fn cycle_detected(&self) -> bool {
        self.cycle_detected
    }

    fn guards_cycles(&self, mp: &Metaprogram) -> bool {
        mp.mode() == Mode::Full && self.max_depth.is_none()
    }

    fn visit(&mut self, edge: Option<EdgeId>, depth: usize) {
        let Some(mp) = self.mp else {
            self.finished = true;
            return;
        };
        let vertex = match edge {
            Some(e) => mp.target(e),
            None => mp.root(),
        };
        let under_limit = self.max_depth.map_or(true, |max| depth < max);

        let on_cycle = self.guards_cycles(mp) && self.enter_path(vertex, depth);
        if on_cycle {
            self.cycle_detected = true;
            tracing::warn!(
                vertex = vertex.0,
                depth,
                node = %mp.vertex(vertex).node,
                "recursion cycle in full-mode trace, not expanding"
            );
        }

        let expand = !self.discovered[vertex.index()] && !on_cycle;
        let children = if expand && under_limit {
            mp.enabled_out_degree(vertex)
        } else {
            0
        };
        self.current = Some(CallGraphNode {
            frame: mp.frame_at(edge),
            depth,
            children,
        });

        if expand {
            if mp.mode() != Mode::Full {
                self.discovered[vertex.index()] = true;
            }
            if under_limit {
                self.to_visit
                    .extend(mp.filtered_out_edges(vertex).map(|e| (e, depth + 1)));
            }
        }
    }

    /// Move `vertex` onto the path at `depth`; true if it already was on it
    fn enter_path(&mut self, vertex: VertexId, depth: usize) -> bool {
        for left in self.path.drain(depth.min(self.path.len())..) {
            self.on_path[left.index()] = false;
        }
        if self.on_path.len() < self.discovered.len() {
            self.on_path.resize(self.discovered.len(), false);
        }
        if self.on_path[vertex.index()] {
            return true;
        }
        self.on_path[vertex.index()] = true;
        self.path.push(vertex);
        false
    }
}

impl Iterator for ForwardTraceIter<'_> {
    type Item = CallGraphNode;

    fn next(&mut self) -> Option<CallGraphNode> {
        let node = self.current.take()?;
        match self.to_visit.pop() {
            Some((edge, depth)) => self.visit(Some(edge), depth),
            None => self.finished = true,
        }
        Some(node)
    }
}

/// Iterators are equal when both are finished; unfinished ones never compare equal
impl PartialEq for ForwardTraceIter<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.finished && other.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EventKind, FileLocation, MetaprogramBuilder};

    fn chain(mode: Mode) -> Metaprogram {
        let mut b = MetaprogramBuilder::new(mode, "<root>", FileLocation::default());
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            let loc = FileLocation::new("chain.hpp", i as u32 + 1, 1);
            b.handle_template_begin(EventKind::TemplateInstantiation, name, &loc, &loc, i as f64)
                .unwrap();
        }
        for ts in 0..3 {
            b.handle_template_end(10.0 + ts as f64).unwrap();
        }
        b.into_metaprogram()
    }

    #[test]
    fn test_depth_limit_cuts_children() {
        let mp = chain(Mode::Full);
        let nodes: Vec<_> = mp.forward_trace(Some(1)).collect();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].children, 1);
        assert_eq!(nodes[1].depth, 1);
        assert_eq!(nodes[1].children, 0, "depth limit reports no children");
    }

    #[test]
    fn test_depth_zero_yields_root_only() {
        let mp = chain(Mode::Minimized);
        let nodes: Vec<_> = mp.forward_trace(Some(0)).collect();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children, 0);
        assert_eq!(nodes[0].frame.kind, None);
    }

    #[test]
    fn test_finished_after_last_node() {
        let mp = chain(Mode::Minimized);
        let mut iter = mp.forward_trace(None);
        assert!(iter != ForwardTraceIter::end());
        assert_eq!(iter.by_ref().count(), 4);
        assert!(iter.is_finished());
        assert!(iter == ForwardTraceIter::end());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_current_peeks_next_node() {
        let mp = chain(Mode::Full);
        let mut iter = mp.forward_trace(None);
        let peeked = iter.current().cloned();
        assert_eq!(iter.next(), peeked);
        assert_eq!(iter.current().map(|n| n.depth), Some(1));
    }

    #[test]
    fn test_end_sentinel_is_empty() {
        let mut end = ForwardTraceIter::end();
        assert!(end.next().is_none());
        assert!(!end.cycle_detected());
    }
}
