//! JSON output types for CLI commands
//!
//! Every JSON response is wrapped in a [`JsonResponse`] envelope carrying the
//! schema version, an execution id and a timestamp so consumers can detect
//! format changes and correlate runs.

use serde::{Deserialize, Serialize};

use crate::graph::{CallGraphNode, EvaluationResult, Frame, Mode};

/// Current JSON output schema version
pub const METATRACE_JSON_SCHEMA_VERSION: &str = "1.0.0";

/// Wrapper for all JSON responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    /// Schema version for parsing stability
    pub schema_version: String,
    /// Unique execution ID for this run
    pub execution_id: String,
    pub tool: String,
    /// RFC 3339, seconds precision
    pub timestamp: String,
    /// Response data
    pub data: T,
}

impl<T> JsonResponse<T> {
    pub fn new(data: T, execution_id: &str) -> Self {
        JsonResponse {
            schema_version: METATRACE_JSON_SCHEMA_VERSION.to_string(),
            execution_id: execution_id.to_string(),
            tool: "metatrace".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            data,
        }
    }
}

/// Response for the evaluate command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    /// None while the evaluation has not ended
    pub result: Option<EvaluationResult>,
    pub is_error: bool,
}

impl From<Option<&EvaluationResult>> for EvaluateResponse {
    fn from(result: Option<&EvaluationResult>) -> Self {
        EvaluateResponse {
            is_error: result.map_or(false, EvaluationResult::is_error),
            result: result.cloned(),
        }
    }
}

/// Response for the forwardtrace command
#[derive(Debug, Clone, Serialize)]
pub struct ForwardTraceResponse {
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Steps taken before tracing
    pub steps: usize,
    pub nodes: Vec<TraceNode>,
    pub cycle_detected: bool,
}

/// One line of a forward trace
#[derive(Debug, Clone, Serialize)]
pub struct TraceNode {
    /// Stable id of the frame's compile-time object
    pub frame_id: String,
    #[serde(flatten)]
    pub node: CallGraphNode,
}

impl From<CallGraphNode> for TraceNode {
    fn from(node: CallGraphNode) -> Self {
        TraceNode {
            frame_id: node.frame.id(),
            node,
        }
    }
}

/// Response for the backtrace command
#[derive(Debug, Clone, Serialize)]
pub struct BacktraceResponse {
    pub steps: usize,
    pub finished: bool,
    pub frames: Vec<Frame>,
}

/// Response for the status command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub mode: Mode,
    pub vertices: usize,
    pub edges: usize,
    /// Edges shown by filtered traversals
    pub enabled_edges: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<EvaluationResult>,
}

/// Error response for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error category/type
    pub error: String,
    /// Stable error code, see [`crate::error_codes`]
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Human,
    /// Compact JSON
    Json,
    /// Indented JSON
    Pretty,
}

impl OutputFormat {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Some(OutputFormat::Human),
            "json" => Some(OutputFormat::Json),
            "pretty" => Some(OutputFormat::Pretty),
            _ => None,
        }
    }

    pub fn is_json(self) -> bool {
        !matches!(self, OutputFormat::Human)
    }
}

/// Generate a unique execution ID for this run
///
/// Uses timestamp + process ID for uniqueness.
pub fn generate_execution_id() -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let pid = std::process::id();
    format!("{:x}-{:x}", timestamp, pid)
}

/// Serialize `data` to stdout in the given JSON flavor
pub fn output_json<T: Serialize>(data: &T, format: OutputFormat) -> anyhow::Result<()> {
    let json = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(data)?,
        OutputFormat::Json | OutputFormat::Human => serde_json::to_string(data)?,
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FileLocation, MetaprogramNode};

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("human"), Some(OutputFormat::Human));
        assert_eq!(OutputFormat::from_str("TEXT"), Some(OutputFormat::Human));
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("pretty"), Some(OutputFormat::Pretty));
        assert_eq!(OutputFormat::from_str("yaml"), None);
    }

    #[test]
    fn test_json_response_envelope() {
        let response = JsonResponse::new(
            EvaluateResponse::from(Some(&EvaluationResult::Type("int".to_string()))),
            "abc-1",
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["schema_version"], METATRACE_JSON_SCHEMA_VERSION);
        assert_eq!(json["execution_id"], "abc-1");
        assert_eq!(json["tool"], "metatrace");
        assert_eq!(json["data"]["result"]["value"], "int");
        assert_eq!(json["data"]["is_error"], false);
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_trace_node_flattens_projection() {
        let node = CallGraphNode {
            frame: Frame::root(&crate::graph::Vertex {
                node: MetaprogramNode::code("<root>"),
                source_location: FileLocation::default(),
            }),
            depth: 0,
            children: 2,
        };
        let json = serde_json::to_value(TraceNode::from(node)).unwrap();
        assert_eq!(json["depth"], 0);
        assert_eq!(json["children"], 2);
        assert_eq!(json["frame_id"].as_str().unwrap().len(), 16);
    }

    #[test]
    fn test_execution_id_format() {
        let id = generate_execution_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| u64::from_str_radix(p, 16).is_ok()));
    }
}
