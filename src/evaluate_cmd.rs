//! Evaluate command implementation
//!
//! Replays a trace and prints the evaluation result. A failed evaluation is
//! output, not a command failure.

use anyhow::Result;
use metatrace::output::{
    generate_execution_id, output_json, render_result, EvaluateResponse, JsonResponse,
};
use metatrace::load_trace;

use crate::cli::TraceOptions;

/// Usage: metatrace evaluate --trace <FILE>
pub fn run_evaluate(options: TraceOptions) -> Result<()> {
    let mp = load_trace(&options.trace, &options.config)?;

    if options.output_format.is_json() {
        let response = EvaluateResponse::from(mp.result());
        let exec_id = generate_execution_id();
        output_json(&JsonResponse::new(response, &exec_id), options.output_format)?;
        return Ok(());
    }

    println!("{}", render_result(mp.result()));
    Ok(())
}
