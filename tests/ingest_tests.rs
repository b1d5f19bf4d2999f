//! Reading JSON-lines traces from disk

use std::fs;
use std::io::BufReader;
use std::path::Path;

use metatrace::{load_trace, read_events, BuilderError, Event, EventKind, IngestError, SessionConfig};
use tempfile::TempDir;

const FIB_TRACE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fib.jsonl");

#[test]
fn test_fixture_decodes_completely() {
    let file = fs::File::open(FIB_TRACE).unwrap();
    let events: Vec<Event> = read_events(BufReader::new(file))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(events.len(), 17);
    assert_eq!(events.first().map(Event::name), Some("template_begin"));
    assert_eq!(events.last().map(Event::name), Some("evaluation_end"));
}

#[test]
fn test_malformed_line_reports_line_number() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.jsonl");
    fs::write(
        &path,
        "{\"event\":\"template_begin\",\"kind\":\"template_instantiation\",\"name\":\"a\"}\n\
         \n\
         {\"event\":\"template_end\",\"timestamp\":\"late\"}\n",
    )
    .unwrap();

    let err = load_trace(&path, &SessionConfig::default()).unwrap_err();
    let decode = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<IngestError>())
        .unwrap();
    match decode {
        IngestError::Decode { line, .. } => assert_eq!(*line, 3),
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[test]
fn test_missing_file() {
    let err = load_trace(Path::new("/nonexistent/trace.jsonl"), &SessionConfig::default())
        .unwrap_err();
    assert!(err
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<IngestError>(), Some(IngestError::Open { .. }))));
}

#[test]
fn test_truncated_trace_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("truncated.jsonl");
    let full = fs::read_to_string(FIB_TRACE).unwrap();
    let truncated: Vec<&str> = full.lines().take(8).collect();
    fs::write(&path, truncated.join("\n")).unwrap();

    let err = load_trace(&path, &SessionConfig::default()).unwrap_err();
    assert!(format!("{:#}", err).contains("evaluation_end"));
    assert!(matches!(
        err.downcast_ref::<BuilderError>(),
        Some(BuilderError::MissingEvaluationEnd { open }) if *open > 0
    ));
}

#[test]
fn test_template_begin_with_macro_kind_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("macro_kind.jsonl");
    fs::write(
        &path,
        "{\"event\":\"template_begin\",\"kind\":\"macro_expansion\",\"name\":\"M\"}\n\
         {\"event\":\"template_end\"}\n",
    )
    .unwrap();

    let err = load_trace(&path, &SessionConfig::default()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<BuilderError>(),
        Some(&BuilderError::NotATemplateKind {
            kind: EventKind::MacroExpansion
        })
    );
}

#[test]
fn test_events_round_trip_through_json_lines() {
    let file = fs::File::open(FIB_TRACE).unwrap();
    let events: Vec<Event> = read_events(BufReader::new(file))
        .collect::<Result<_, _>>()
        .unwrap();

    let mut text = String::new();
    for event in &events {
        text.push_str(&serde_json::to_string(event).unwrap());
        text.push('\n');
    }
    let again: Vec<Event> = read_events(text.as_bytes())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(events, again);
}
