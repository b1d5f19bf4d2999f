//! Metatrace: debugger core for compile-time template metaprograms
//!
//! Metatrace turns the flat begin/end event stream a compiler front end emits
//! while evaluating templates and macros into a call graph, and walks that
//! graph the way an interactive debugger does.
//!
//! # Pipeline
//!
//! 1. [`ingest`] decodes [`Event`]s (JSON lines for replay).
//! 2. A [`Session`] feeds them to a [`MetaprogramBuilder`], which grows a
//!    [`Metaprogram`]: one edge per begin event, one vertex per distinct
//!    template step.
//! 3. Traversals read the frozen graph: [`ForwardTraceIter`] for call trees,
//!    the stepping cursor and [`Backtrace`] for `step` / `bt` style debugging.
//!
//! # Modes
//!
//! [`Mode::Full`] reproduces the exact call-stack shape, re-expanding shared
//! vertices every time they are reached. [`Mode::Minimized`] expands each
//! vertex once per traversal.
//!
//! # Example
//!
//! ```
//! use metatrace::{EventKind, EvaluationResult, FileLocation, MetaprogramBuilder, Mode};
//!
//! let mut builder = MetaprogramBuilder::new(Mode::Minimized, "<root>", FileLocation::default());
//! let loc = FileLocation::new("fib.hpp", 4, 1);
//! builder.handle_template_begin(EventKind::TemplateInstantiation, "fib<1>", &loc, &loc, 0.0)?;
//! builder.handle_template_end(0.1)?;
//! builder.handle_evaluation_end(EvaluationResult::Type("int_<1>".to_string()))?;
//!
//! let mp = builder.into_metaprogram();
//! assert_eq!(mp.forward_trace(None).count(), 2);
//! # Ok::<(), metatrace::BuilderError>(())
//! ```

pub mod error_codes;
pub mod graph;
pub mod ingest;
pub mod output;
pub mod session;
pub mod version;

pub use graph::{
    Backtrace, BuilderError, CallGraphNode, Edge, EdgeId, EvaluationResult, EventKind,
    FileLocation, ForwardTraceIter, Frame, Metaprogram, MetaprogramBuilder, MetaprogramNode,
    MetaprogramState, Mode, StepError, Vertex, VertexId,
};
pub use ingest::{open_trace, read_events, Event, IngestError};
pub use output::{JsonResponse, OutputFormat};
pub use session::{load_trace, replay, Session, SessionConfig};
