//! Status command implementation for Metatrace
//!
//! Replays a trace and reports the size and outcome of the metaprogram.

use anyhow::Result;
use metatrace::output::{
    generate_execution_id, output_json, render_result, JsonResponse, StatusResponse,
};
use metatrace::{load_trace, Metaprogram, OutputFormat};

use crate::cli::TraceOptions;

/// Usage: metatrace status --trace <FILE>
pub fn run_status(options: TraceOptions) -> Result<()> {
    let mp = load_trace(&options.trace, &options.config)?;
    let response = status_of(&mp);

    match options.output_format {
        OutputFormat::Json | OutputFormat::Pretty => {
            let exec_id = generate_execution_id();
            let json_response = JsonResponse::new(response, &exec_id);
            output_json(&json_response, options.output_format)?;
        }
        OutputFormat::Human => {
            println!("mode: {}", response.mode);
            println!("vertices: {}", response.vertices);
            println!("edges: {}", response.edges);
            println!("enabled_edges: {}", response.enabled_edges);
            println!("result: {}", render_result(response.result.as_ref()));
        }
    }
    Ok(())
}

fn status_of(mp: &Metaprogram) -> StatusResponse {
    StatusResponse {
        mode: mp.mode(),
        vertices: mp.vertex_count(),
        edges: mp.edge_count(),
        enabled_edges: mp.edges().filter(|&e| mp.edge(e).enabled).count(),
        result: mp.result().cloned(),
    }
}
