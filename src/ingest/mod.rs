//! Logical trace events and their replay into a builder
//!
//! [`Event`] mirrors the builder's handlers one-to-one. The [`jsonl`] module
//! reads events from a JSON-lines file so traces can be stored and replayed.

pub mod jsonl;

pub use jsonl::{open_trace, read_events, EventReader};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::graph::{BuilderError, EvaluationResult, EventKind, FileLocation, MetaprogramBuilder};

/// Errors produced while reading a trace
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Line is not a valid event
    #[error("line {line}: malformed trace event: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot open trace {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Line could not be read, e.g. it is not valid UTF-8
    #[error("line {line}: failed to read trace: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

/// One observed event of an evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    TemplateBegin {
        kind: EventKind,
        name: String,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        source_location: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    TemplateEnd {
        #[serde(default)]
        timestamp: f64,
    },
    MacroExpansionBegin {
        name: String,
        #[serde(default)]
        args: Option<Vec<String>>,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        source_location: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    Rescanning {
        code: String,
        #[serde(default)]
        timestamp: f64,
    },
    ExpandedCode {
        code: String,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    MacroExpansionEnd {
        #[serde(default)]
        timestamp: f64,
    },
    TokenGeneration {
        category: String,
        value: String,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        source_location: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    TokenSkipping {
        category: String,
        value: String,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    IncludeBegin {
        path: String,
        #[serde(default)]
        system: bool,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    IncludeEnd {
        #[serde(default)]
        timestamp: f64,
    },
    Define {
        name: String,
        #[serde(default)]
        args: Option<Vec<String>>,
        #[serde(default)]
        body: String,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    Undefine {
        name: String,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    ConditionBegin {
        expression: String,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    ConditionEnd {
        result: bool,
        #[serde(default)]
        timestamp: f64,
    },
    Else {
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    Endif {
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    ErrorDirective {
        message: String,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    LineDirective {
        arg: String,
        #[serde(default)]
        point_of_event: FileLocation,
        #[serde(default)]
        source_location: FileLocation,
        #[serde(default)]
        timestamp: f64,
    },
    EvaluationEnd {
        result: EvaluationResult,
    },
}

impl Event {
    /// Event name as written in traces
    pub fn name(&self) -> &'static str {
        match self {
            Event::TemplateBegin { .. } => "template_begin",
            Event::TemplateEnd { .. } => "template_end",
            Event::MacroExpansionBegin { .. } => "macro_expansion_begin",
            Event::Rescanning { .. } => "rescanning",
            Event::ExpandedCode { .. } => "expanded_code",
            Event::MacroExpansionEnd { .. } => "macro_expansion_end",
            Event::TokenGeneration { .. } => "token_generation",
            Event::TokenSkipping { .. } => "token_skipping",
            Event::IncludeBegin { .. } => "include_begin",
            Event::IncludeEnd { .. } => "include_end",
            Event::Define { .. } => "define",
            Event::Undefine { .. } => "undefine",
            Event::ConditionBegin { .. } => "condition_begin",
            Event::ConditionEnd { .. } => "condition_end",
            Event::Else { .. } => "else",
            Event::Endif { .. } => "endif",
            Event::ErrorDirective { .. } => "error_directive",
            Event::LineDirective { .. } => "line_directive",
            Event::EvaluationEnd { .. } => "evaluation_end",
        }
    }

    /// Forward this event to the matching builder handler
    pub fn apply(self, builder: &mut MetaprogramBuilder) -> Result<(), BuilderError> {
        match self {
            Event::TemplateBegin {
                kind,
                name,
                point_of_event,
                source_location,
                timestamp,
            } => builder.handle_template_begin(kind, &name, &point_of_event, &source_location, timestamp),
            Event::TemplateEnd { timestamp } => builder.handle_template_end(timestamp),
            Event::MacroExpansionBegin {
                name,
                args,
                point_of_event,
                source_location,
                timestamp,
            } => builder.handle_macro_expansion_begin(&name, args, &point_of_event, &source_location, timestamp),
            Event::Rescanning { code, timestamp } => builder.handle_rescanning(&code, timestamp),
            Event::ExpandedCode {
                code,
                point_of_event,
                timestamp,
            } => builder.handle_expanded_code(&code, &point_of_event, timestamp),
            Event::MacroExpansionEnd { timestamp } => builder.handle_macro_expansion_end(timestamp),
            Event::TokenGeneration {
                category,
                value,
                point_of_event,
                source_location,
                timestamp,
            } => builder.handle_token_generation(&category, &value, &point_of_event, &source_location, timestamp),
            Event::TokenSkipping {
                category,
                value,
                point_of_event,
                timestamp,
            } => builder.handle_token_skipping(&category, &value, &point_of_event, timestamp),
            Event::IncludeBegin {
                path,
                system,
                point_of_event,
                timestamp,
            } => builder.handle_include_begin(&path, system, &point_of_event, timestamp),
            Event::IncludeEnd { timestamp } => builder.handle_include_end(timestamp),
            Event::Define {
                name,
                args,
                body,
                point_of_event,
                timestamp,
            } => builder.handle_define(&name, args, &body, &point_of_event, timestamp),
            Event::Undefine {
                name,
                point_of_event,
                timestamp,
            } => builder.handle_undefine(&name, &point_of_event, timestamp),
            Event::ConditionBegin {
                expression,
                point_of_event,
                timestamp,
            } => builder.handle_preprocessing_condition_begin(&expression, &point_of_event, timestamp),
            Event::ConditionEnd { result, timestamp } => {
                builder.handle_preprocessing_condition_end(result, timestamp)
            }
            Event::Else {
                point_of_event,
                timestamp,
            } => builder.handle_preprocessing_else(&point_of_event, timestamp),
            Event::Endif {
                point_of_event,
                timestamp,
            } => builder.handle_preprocessing_endif(&point_of_event, timestamp),
            Event::ErrorDirective {
                message,
                point_of_event,
                timestamp,
            } => builder.handle_error_directive(&message, &point_of_event, timestamp),
            Event::LineDirective {
                arg,
                point_of_event,
                source_location,
                timestamp,
            } => builder.handle_line_directive(&arg, &point_of_event, &source_location, timestamp),
            Event::EvaluationEnd { result } => builder.handle_evaluation_end(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Mode;

    #[test]
    fn test_event_json_shape() {
        let json = r#"{"event":"template_begin","kind":"memoization","name":"fib<1>","source_location":{"name":"fib.hpp","row":4,"column":8},"timestamp":0.5}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.name(), "template_begin");
        match event {
            Event::TemplateBegin {
                kind,
                point_of_event,
                source_location,
                ..
            } => {
                assert_eq!(kind, EventKind::Memoization);
                assert!(point_of_event.is_unknown());
                assert_eq!(source_location.to_string(), "fib.hpp:4:8");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_evaluation_end_carries_result() {
        let json = r#"{"event":"evaluation_end","result":{"result":"error","value":"no member named 'type'"}}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        let mut builder = MetaprogramBuilder::new(Mode::Full, "<root>", FileLocation::default());
        event.apply(&mut builder).unwrap();
        assert_eq!(
            builder.metaprogram().result(),
            Some(&EvaluationResult::Error("no member named 'type'".to_string()))
        );
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result: Result<Event, _> = serde_json::from_str(r#"{"event":"pragma","text":"once"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_reports_structural_fault() {
        let mut builder = MetaprogramBuilder::new(Mode::Full, "<root>", FileLocation::default());
        let err = Event::IncludeEnd { timestamp: 1.0 }
            .apply(&mut builder)
            .unwrap_err();
        assert!(matches!(err, BuilderError::UnbalancedEnd { .. }));
    }
}
