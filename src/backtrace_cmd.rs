//! Backtrace command implementation

use anyhow::Result;
use metatrace::load_trace;
use metatrace::output::{
    generate_execution_id, output_json, render_backtrace, BacktraceResponse, JsonResponse,
};

use crate::cli::TraceOptions;
use crate::forwardtrace_cmd::step_cursor;

/// Usage: metatrace backtrace --trace <FILE> [--steps <N>]
pub fn run_backtrace(options: TraceOptions, steps: usize) -> Result<()> {
    let mut mp = load_trace(&options.trace, &options.config)?;
    step_cursor(&mut mp, steps)?;
    let backtrace = mp.backtrace();

    if options.output_format.is_json() {
        let response = BacktraceResponse {
            steps,
            finished: mp.is_finished(),
            frames: backtrace.frames().to_vec(),
        };
        let exec_id = generate_execution_id();
        output_json(&JsonResponse::new(response, &exec_id), options.output_format)?;
        return Ok(());
    }

    if backtrace.is_empty() {
        println!("Metaprogram finished");
        return Ok(());
    }
    for line in render_backtrace(&backtrace) {
        println!("{}", line);
    }
    Ok(())
}
