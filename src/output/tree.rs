//! Text renderers for traces and backtraces
//!
//! ```text
//! fib<3>
//! + fib<2> at fib.hpp:4:1 (TemplateInstantiation from fib.hpp:9:20)
//! | ` fib<1> at fib.hpp:4:1 (Memoization from fib.hpp:9:20)
//! ` fib<1> at fib.hpp:4:1 (Memoization from fib.hpp:9:40)
//! ```

use crate::graph::{Backtrace, CallGraphNode, EvaluationResult};

/// Render trace nodes as an indented tree
///
/// Connectors are derived from the child counts of the projection, so the
/// nodes must come in traversal order.
pub fn render_tree<I>(nodes: I) -> Vec<String>
where
    I: IntoIterator<Item = CallGraphNode>,
{
    // Children not yet printed below the node open at each depth
    let mut pending: Vec<usize> = Vec::new();
    let mut lines = Vec::new();

    for node in nodes {
        let depth = node.depth;
        if depth == 0 {
            pending.clear();
            lines.push(node.frame.to_string());
            pending.push(node.children);
            continue;
        }

        pending.truncate(depth);
        if pending.len() < depth {
            pending.resize(depth, 0);
        }
        let parent = depth - 1;
        pending[parent] = pending[parent].saturating_sub(1);

        let mut line = String::new();
        for &open in &pending[..parent] {
            line.push_str(if open > 0 { "| " } else { "  " });
        }
        line.push_str(if pending[parent] > 0 { "+ " } else { "` " });
        line.push_str(&node.frame.to_string());
        lines.push(line);

        pending.push(node.children);
    }
    lines
}

/// Render a backtrace as `#n frame` lines, current frame first
pub fn render_backtrace(backtrace: &Backtrace) -> Vec<String> {
    backtrace
        .iter()
        .enumerate()
        .map(|(n, frame)| format!("#{} {}", n, frame))
        .collect()
}

/// Evaluation outcome as printed by `evaluate` and `status`
pub fn render_result(result: Option<&EvaluationResult>) -> String {
    match result {
        Some(result) if result.is_error() => format!("error: {}", result),
        Some(result) => result.to_string(),
        None => "(none)".to_string(),
    }
}
