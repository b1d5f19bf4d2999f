//! Forwardtrace command implementation
//!
//! Prints the call tree below the cursor, optionally after stepping.

use anyhow::{Context, Result};
use metatrace::output::{
    generate_execution_id, output_json, render_tree, ForwardTraceResponse, JsonResponse, TraceNode,
};
use metatrace::{load_trace, Metaprogram, StepError};

use crate::cli::TraceOptions;

/// Step the cursor exactly `steps` times
pub fn step_cursor(mp: &mut Metaprogram, steps: usize) -> Result<()> {
    let taken = mp.step_n(steps);
    if taken < steps {
        return Err(anyhow::Error::new(StepError::Finished))
            .with_context(|| format!("metaprogram finished after {} of {} steps", taken, steps));
    }
    Ok(())
}

/// Usage: metatrace forwardtrace --trace <FILE> [--max-depth <N>] [--steps <N>]
pub fn run_forwardtrace(options: TraceOptions, max_depth: Option<usize>, steps: usize) -> Result<()> {
    let mut mp = load_trace(&options.trace, &options.config)?;
    step_cursor(&mut mp, steps)?;

    let mut iter = mp.forward_trace(max_depth);
    let nodes: Vec<_> = iter.by_ref().collect();
    let cycle_detected = iter.cycle_detected();

    if options.output_format.is_json() {
        let response = ForwardTraceResponse {
            mode: mp.mode(),
            max_depth,
            steps,
            cycle_detected,
            nodes: nodes.into_iter().map(TraceNode::from).collect(),
        };
        let exec_id = generate_execution_id();
        output_json(&JsonResponse::new(response, &exec_id), options.output_format)?;
        return Ok(());
    }

    if nodes.is_empty() {
        println!("Metaprogram finished");
        return Ok(());
    }
    for line in render_tree(nodes) {
        println!("{}", line);
    }
    if cycle_detected {
        eprintln!("warning: recursion cycle detected, repeated frames were not expanded");
    }
    Ok(())
}
