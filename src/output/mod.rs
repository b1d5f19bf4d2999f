//! Output module for CLI commands
//!
//! JSON response envelopes and the text renderers for traces.

pub mod command;
pub mod tree;

pub use command::{
    generate_execution_id, output_json, BacktraceResponse, ErrorResponse, EvaluateResponse,
    ForwardTraceResponse, JsonResponse, OutputFormat, StatusResponse, TraceNode,
};
pub use tree::{render_backtrace, render_result, render_tree};
