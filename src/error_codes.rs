//! Metatrace error codes
//!
//! Error codes follow the pattern: MTR-{CATEGORY}-{3-digit number}
//!
//! Categories (1-3 uppercase letters):
//! - BLD: Structural faults while building the metaprogram
//! - ING: Malformed trace input
//! - STP: Cursor movement errors
//! - QRY: Invalid command arguments
//! - IO: I/O-related errors (file access, permissions)
//!
//! Each error code is stable and should not be reused.
//!
//! | Code | Description | Remediation |
//! |------|-------------|-------------|
//! | MTR-BLD-001 | End event without begin | Check the trace producer emits balanced events |
//! | MTR-BLD-002 | Mismatched end event | Check nesting of template, macro and include events |
//! | MTR-BLD-003 | Evaluation ended with open edges | Close every begin before `evaluation_end` |
//! | MTR-BLD-004 | Event after evaluation end | One evaluation per trace |
//! | MTR-BLD-005 | Trace capacity exceeded | Raise `--capacity` |
//! | MTR-BLD-006 | Missing evaluation end | Trace is truncated |
//! | MTR-BLD-007 | Template begin with a preprocessor kind | Emit macro and include events with their own event names |
//! | MTR-ING-001 | Malformed trace line | Fix the reported line |
//! | MTR-STP-001 | No more frames | Use fewer `--steps` |
//! | MTR-STP-002 | Nothing to step back to | |
//! | MTR-QRY-001 | Invalid arguments | See `metatrace --help` |
//! | MTR-IO-001 | File not found | Check trace path |
//! | MTR-IO-002 | Permission denied | Check file read permissions |
//! | MTR-IO-003 | Read failed | |

use crate::graph::{BuilderError, StepError};
use crate::ingest::IngestError;

/// End event without a matching begin
pub const MTR_BLD_001_UNBALANCED_END: &str = "MTR-BLD-001";

/// End event closing a different kind of begin
pub const MTR_BLD_002_MISMATCHED_END: &str = "MTR-BLD-002";

/// Evaluation end with open edges
pub const MTR_BLD_003_OPEN_EDGES: &str = "MTR-BLD-003";

/// Event after evaluation end
pub const MTR_BLD_004_FROZEN: &str = "MTR-BLD-004";

/// Trace capacity exceeded
pub const MTR_BLD_005_CAPACITY_EXCEEDED: &str = "MTR-BLD-005";

/// Trace ended without evaluation end
pub const MTR_BLD_006_MISSING_EVALUATION_END: &str = "MTR-BLD-006";

/// Template begin with a preprocessor kind
pub const MTR_BLD_007_NOT_A_TEMPLATE_KIND: &str = "MTR-BLD-007";

/// Malformed trace line
pub const MTR_ING_001_MALFORMED_EVENT: &str = "MTR-ING-001";

/// Stepped past the last frame
pub const MTR_STP_001_FINISHED: &str = "MTR-STP-001";

/// Stepped back before the first frame
pub const MTR_STP_002_AT_START: &str = "MTR-STP-002";

/// Invalid command arguments
pub const MTR_QRY_001_INVALID_ARGS: &str = "MTR-QRY-001";

/// Trace file not found
pub const MTR_IO_001_FILE_NOT_FOUND: &str = "MTR-IO-001";

/// Permission denied
pub const MTR_IO_002_PERMISSION_DENIED: &str = "MTR-IO-002";

/// Any other read failure
pub const MTR_IO_003_READ_FAILED: &str = "MTR-IO-003";

/// Category and stable code for an error chain
///
/// The first typed cause in the chain decides; anything untyped is an argument error.
pub fn classify(error: &anyhow::Error) -> (&'static str, &'static str) {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<BuilderError>() {
            let code = match e {
                BuilderError::UnbalancedEnd { .. } => MTR_BLD_001_UNBALANCED_END,
                BuilderError::MismatchedEnd { .. } => MTR_BLD_002_MISMATCHED_END,
                BuilderError::OpenEdgesAtEnd { .. } => MTR_BLD_003_OPEN_EDGES,
                BuilderError::Frozen => MTR_BLD_004_FROZEN,
                BuilderError::CapacityExceeded { .. } => MTR_BLD_005_CAPACITY_EXCEEDED,
                BuilderError::MissingEvaluationEnd { .. } => MTR_BLD_006_MISSING_EVALUATION_END,
                BuilderError::NotATemplateKind { .. } => MTR_BLD_007_NOT_A_TEMPLATE_KIND,
            };
            return ("build", code);
        }
        if let Some(e) = cause.downcast_ref::<StepError>() {
            let code = match e {
                StepError::Finished => MTR_STP_001_FINISHED,
                StepError::AtStart => MTR_STP_002_AT_START,
            };
            return ("step", code);
        }
        if let Some(e) = cause.downcast_ref::<IngestError>() {
            return match e {
                IngestError::Decode { .. } => ("ingest", MTR_ING_001_MALFORMED_EVENT),
                IngestError::Open { source, .. } | IngestError::Read { source, .. } => ("io", io_code(source)),
            };
        }
        if let Some(e) = cause.downcast_ref::<std::io::Error>() {
            return ("io", io_code(e));
        }
    }
    ("args", MTR_QRY_001_INVALID_ARGS)
}

fn io_code(error: &std::io::Error) -> &'static str {
    match error.kind() {
        std::io::ErrorKind::NotFound => MTR_IO_001_FILE_NOT_FOUND,
        std::io::ErrorKind::PermissionDenied => MTR_IO_002_PERMISSION_DENIED,
        _ => MTR_IO_003_READ_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [&str; 14] = [
        MTR_BLD_001_UNBALANCED_END,
        MTR_BLD_002_MISMATCHED_END,
        MTR_BLD_003_OPEN_EDGES,
        MTR_BLD_004_FROZEN,
        MTR_BLD_005_CAPACITY_EXCEEDED,
        MTR_BLD_006_MISSING_EVALUATION_END,
        MTR_BLD_007_NOT_A_TEMPLATE_KIND,
        MTR_ING_001_MALFORMED_EVENT,
        MTR_STP_001_FINISHED,
        MTR_STP_002_AT_START,
        MTR_QRY_001_INVALID_ARGS,
        MTR_IO_001_FILE_NOT_FOUND,
        MTR_IO_002_PERMISSION_DENIED,
        MTR_IO_003_READ_FAILED,
    ];

    /// Verify all error codes are unique
    #[test]
    fn test_error_codes_are_unique() {
        let mut unique = std::collections::HashSet::new();
        for code in ALL {
            assert!(
                unique.insert(code),
                "Duplicate error code detected: {}",
                code
            );
        }
    }

    /// Verify error code format
    #[test]
    fn test_error_code_format() {
        for code in ALL {
            // Format: MTR-{CATEGORY}-{3-digit number}
            assert!(
                code.starts_with("MTR-"),
                "Error code must start with 'MTR-': {}",
                code
            );
            let parts: Vec<&str> = code.split('-').collect();
            assert_eq!(parts.len(), 3, "Error code must have 3 parts: {}", code);

            assert!(
                !parts[1].is_empty() && parts[1].len() <= 3,
                "Category must be 1-3 chars: {}",
                code
            );
            assert!(parts[1].chars().all(|c| c.is_ascii_uppercase()));

            assert_eq!(parts[2].len(), 3, "Number must be 3 digits: {}", code);
            assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_classify_walks_context_chain() {
        let err = anyhow::Error::new(BuilderError::Frozen).context("event #3 (template_begin)");
        assert_eq!(classify(&err), ("build", MTR_BLD_004_FROZEN));

        let err = anyhow::Error::new(StepError::Finished);
        assert_eq!(classify(&err), ("step", MTR_STP_001_FINISHED));

        let err = anyhow::anyhow!("--max-depth requires an argument");
        assert_eq!(classify(&err), ("args", MTR_QRY_001_INVALID_ARGS));
    }

    #[test]
    fn test_classify_uses_types_not_message_text() {
        let err = anyhow::anyhow!("Unknown argument for status: evaluation_end");
        assert_eq!(classify(&err), ("args", MTR_QRY_001_INVALID_ARGS));

        let err = anyhow::Error::new(BuilderError::MissingEvaluationEnd { open: 2 })
            .context("failed to replay trace fib.jsonl");
        assert_eq!(classify(&err), ("build", MTR_BLD_006_MISSING_EVALUATION_END));

        let err = anyhow::Error::new(BuilderError::NotATemplateKind {
            kind: crate::graph::EventKind::SysInclude,
        });
        assert_eq!(classify(&err), ("build", MTR_BLD_007_NOT_A_TEMPLATE_KIND));
    }

    #[test]
    fn test_classify_io_errors() {
        let err = anyhow::Error::new(IngestError::Open {
            path: "missing.jsonl".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        });
        assert_eq!(classify(&err), ("io", MTR_IO_001_FILE_NOT_FOUND));
    }
}
