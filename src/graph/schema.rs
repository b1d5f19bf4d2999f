//! Frame and event model for metaprogram graphs
//!
//! Defines the vertex and edge payloads stored in a [`Metaprogram`](super::Metaprogram)
//! and the [`Frame`] view assembled from them.
//!
//! # Identity vs. occurrence
//!
//! A compile-time evaluation step has two halves:
//! - **Identity** ([`MetaprogramNode`] + definition [`FileLocation`]): what is being
//!   evaluated. Stored once per vertex and used as the deduplication key.
//! - **Occurrence** ([`EventKind`], point of event, timestamps): why and when it was
//!   reached. Stored on every edge, because each begin event creates a fresh edge.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A position in a source file
///
/// Rows and columns are 1-indexed as reported by the compiler front end.
/// The default value (empty name, row 0, column 0) stands for "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileLocation {
    /// File name as reported by the front end
    pub name: String,
    /// 1-indexed line
    pub row: u32,
    /// 1-indexed column
    pub column: u32,
}

impl FileLocation {
    pub fn new(name: impl Into<String>, row: u32, column: u32) -> Self {
        Self {
            name: name.into(),
            row,
            column,
        }
    }

    /// True for the default "unknown" location
    pub fn is_unknown(&self) -> bool {
        self.name.is_empty() && self.row == 0 && self.column == 0
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.row, self.column)
    }
}

/// Kind of the event that opened an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    // Template evaluation
    TemplateInstantiation,
    Memoization,
    ExplicitTemplateArgumentSubstitution,
    DeducedTemplateArgumentSubstitution,
    DefaultTemplateArgumentInstantiation,
    DefaultFunctionArgumentInstantiation,
    PriorTemplateArgumentSubstitution,
    ExceptionSpecInstantiation,
    DeclaringSpecialMember,
    DefiningSynthesizedFunction,
    NonTemplateType,

    // Preprocessing
    MacroExpansion,
    Rescanning,
    ExpandedCode,
    GeneratedToken,
    SkippedToken,
    QuoteInclude,
    SysInclude,
    MacroDefinition,
    MacroDeletion,
    PreprocessingCondition,
    PreprocessingElse,
    PreprocessingEndif,
    ErrorDirective,
    LineDirective,
}

impl EventKind {
    /// Template evaluation steps are the only kinds subject to vertex sharing
    pub fn is_template(self) -> bool {
        matches!(
            self,
            EventKind::TemplateInstantiation
                | EventKind::Memoization
                | EventKind::ExplicitTemplateArgumentSubstitution
                | EventKind::DeducedTemplateArgumentSubstitution
                | EventKind::DefaultTemplateArgumentInstantiation
                | EventKind::DefaultFunctionArgumentInstantiation
                | EventKind::PriorTemplateArgumentSubstitution
                | EventKind::ExceptionSpecInstantiation
                | EventKind::DeclaringSpecialMember
                | EventKind::DefiningSynthesizedFunction
                | EventKind::NonTemplateType
        )
    }

    pub fn is_preprocessor(self) -> bool {
        !self.is_template()
    }

    /// Name used by the human-readable renderers
    pub fn display_name(self) -> &'static str {
        match self {
            EventKind::TemplateInstantiation => "TemplateInstantiation",
            EventKind::Memoization => "Memoization",
            EventKind::ExplicitTemplateArgumentSubstitution => {
                "ExplicitTemplateArgumentSubstitution"
            }
            EventKind::DeducedTemplateArgumentSubstitution => {
                "DeducedTemplateArgumentSubstitution"
            }
            EventKind::DefaultTemplateArgumentInstantiation => {
                "DefaultTemplateArgumentInstantiation"
            }
            EventKind::DefaultFunctionArgumentInstantiation => {
                "DefaultFunctionArgumentInstantiation"
            }
            EventKind::PriorTemplateArgumentSubstitution => "PriorTemplateArgumentSubstitution",
            EventKind::ExceptionSpecInstantiation => "ExceptionSpecInstantiation",
            EventKind::DeclaringSpecialMember => "DeclaringSpecialMember",
            EventKind::DefiningSynthesizedFunction => "DefiningSynthesizedFunction",
            EventKind::NonTemplateType => "NonTemplateType",
            EventKind::MacroExpansion => "MacroExpansion",
            EventKind::Rescanning => "Rescanning",
            EventKind::ExpandedCode => "ExpandedCode",
            EventKind::GeneratedToken => "GeneratedToken",
            EventKind::SkippedToken => "SkippedToken",
            EventKind::QuoteInclude => "QuoteInclude",
            EventKind::SysInclude => "SysInclude",
            EventKind::MacroDefinition => "MacroDefinition",
            EventKind::MacroDeletion => "MacroDeletion",
            EventKind::PreprocessingCondition => "PreprocessingCondition",
            EventKind::PreprocessingElse => "PreprocessingElse",
            EventKind::PreprocessingEndif => "PreprocessingEndif",
            EventKind::ErrorDirective => "ErrorDirective",
            EventKind::LineDirective => "LineDirective",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The identity half of a frame
///
/// Two begin events whose nodes and definition locations compare equal are the
/// same compile-time object and share one vertex (template kinds only).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetaprogramNode {
    /// Fully resolved type or value, e.g. `fib<5>`
    Type { name: String },
    /// A piece of source text (root name, expanded code, condition expression)
    Code { code: String },
    /// A single preprocessor token
    Token { category: String, value: String },
    /// Argument of an `#include` directive
    Include { path: String, system: bool },
    /// A macro invocation
    Macro {
        name: String,
        #[serde(default)]
        args: Option<Vec<String>>,
    },
    /// A `#define`
    Define {
        name: String,
        #[serde(default)]
        args: Option<Vec<String>>,
        body: String,
    },
    /// Text of an `#error` directive
    Message { text: String },
}

impl MetaprogramNode {
    pub fn type_name(name: impl Into<String>) -> Self {
        MetaprogramNode::Type { name: name.into() }
    }

    pub fn code(code: impl Into<String>) -> Self {
        MetaprogramNode::Code { code: code.into() }
    }
}

impl MetaprogramNode {
    /// Feed the variant tag and every field, length-prefixed, into `hasher`
    fn hash_identity(&self, hasher: &mut Sha256) {
        match self {
            MetaprogramNode::Type { name } => {
                hash_field(hasher, b"type");
                hash_field(hasher, name.as_bytes());
            }
            MetaprogramNode::Code { code } => {
                hash_field(hasher, b"code");
                hash_field(hasher, code.as_bytes());
            }
            MetaprogramNode::Token { category, value } => {
                hash_field(hasher, b"token");
                hash_field(hasher, category.as_bytes());
                hash_field(hasher, value.as_bytes());
            }
            MetaprogramNode::Include { path, system } => {
                hash_field(hasher, b"include");
                hash_field(hasher, path.as_bytes());
                hasher.update([u8::from(*system)]);
            }
            MetaprogramNode::Macro { name, args } => {
                hash_field(hasher, b"macro");
                hash_field(hasher, name.as_bytes());
                hash_args(hasher, args);
            }
            MetaprogramNode::Define { name, args, body } => {
                hash_field(hasher, b"define");
                hash_field(hasher, name.as_bytes());
                hash_args(hasher, args);
                hash_field(hasher, body.as_bytes());
            }
            MetaprogramNode::Message { text } => {
                hash_field(hasher, b"message");
                hash_field(hasher, text.as_bytes());
            }
        }
    }
}

fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn hash_args(hasher: &mut Sha256, args: &Option<Vec<String>>) {
    match args {
        None => hasher.update([0u8]),
        Some(args) => {
            hasher.update([1u8]);
            hasher.update((args.len() as u64).to_le_bytes());
            for arg in args {
                hash_field(hasher, arg.as_bytes());
            }
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &Option<Vec<String>>) -> fmt::Result {
    if let Some(args) = args {
        write!(f, "({})", args.join(", "))?;
    }
    Ok(())
}

impl fmt::Display for MetaprogramNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaprogramNode::Type { name } => f.write_str(name),
            MetaprogramNode::Code { code } => f.write_str(code),
            MetaprogramNode::Token { value, .. } => f.write_str(value),
            MetaprogramNode::Include { path, system: true } => write!(f, "<{}>", path),
            MetaprogramNode::Include { path, system: false } => write!(f, "\"{}\"", path),
            MetaprogramNode::Macro { name, args } => {
                f.write_str(name)?;
                write_args(f, args)
            }
            MetaprogramNode::Define { name, args, body } => {
                write!(f, "#define {}", name)?;
                write_args(f, args)?;
                if !body.is_empty() {
                    write!(f, " {}", body)?;
                }
                Ok(())
            }
            MetaprogramNode::Message { text } => write!(f, "#error {}", text),
        }
    }
}

/// Vertex payload: one canonical node per deduplication key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub node: MetaprogramNode,
    /// Where the underlying definition lives
    pub source_location: FileLocation,
}

/// Edge payload: one per observed begin (or leaf) event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: super::VertexId,
    pub target: super::VertexId,
    pub kind: EventKind,
    /// Where the event was triggered
    pub point_of_event: FileLocation,
    pub begin_timestamp: f64,
    /// Set when the matching end event closes the edge; leaf events close immediately
    pub end_timestamp: Option<f64>,
    /// Branch outcome of a preprocessing condition
    pub condition_result: Option<bool>,
    /// Disabled edges are skipped by filtered traversals
    pub enabled: bool,
}

impl Edge {
    /// Wall time spent between the begin and end events, if closed
    pub fn time_taken(&self) -> Option<f64> {
        self.end_timestamp.map(|end| end - self.begin_timestamp)
    }
}

/// A single compile-time evaluation step, as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub node: MetaprogramNode,
    pub source_location: FileLocation,
    /// None for the synthetic root frame
    pub kind: Option<EventKind>,
    pub point_of_event: Option<FileLocation>,
    pub time_taken: Option<f64>,
    pub condition_result: Option<bool>,
}

impl Frame {
    /// Frame of the synthetic root vertex
    pub fn root(vertex: &Vertex) -> Self {
        Self {
            node: vertex.node.clone(),
            source_location: vertex.source_location.clone(),
            kind: None,
            point_of_event: None,
            time_taken: None,
            condition_result: None,
        }
    }

    /// Frame reached through `edge`, whose target is `vertex`
    pub fn from_edge(edge: &Edge, vertex: &Vertex) -> Self {
        Self {
            node: vertex.node.clone(),
            source_location: vertex.source_location.clone(),
            kind: Some(edge.kind),
            point_of_event: Some(edge.point_of_event.clone()),
            time_taken: edge.time_taken(),
            condition_result: edge.condition_result,
        }
    }

    /// Stable identifier of the frame's compile-time object
    ///
    /// First 8 bytes of SHA-256 over the node's variant and fields followed by
    /// the source location, hex encoded. Frames that share a vertex share an
    /// id; the edge kind does not participate.
    pub fn generate_id(node: &MetaprogramNode, source_location: &FileLocation) -> String {
        let mut hasher = Sha256::new();
        node.hash_identity(&mut hasher);
        hash_field(&mut hasher, source_location.name.as_bytes());
        hasher.update(source_location.row.to_le_bytes());
        hasher.update(source_location.column.to_le_bytes());
        let hash = hasher.finalize();
        hex::encode(&hash[..8])
    }

    pub fn id(&self) -> String {
        Self::generate_id(&self.node, &self.source_location)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)?;
        if let Some(result) = self.condition_result {
            write!(f, " = {}", result)?;
        }
        if !self.source_location.is_unknown() {
            write!(f, " at {}", self.source_location)?;
        }
        match (self.kind, &self.point_of_event) {
            (Some(kind), Some(poe)) if !poe.is_unknown() => write!(f, " ({} from {})", kind, poe)?,
            (Some(kind), _) => write!(f, " ({})", kind)?,
            (None, _) => {}
        }
        Ok(())
    }
}

/// Final outcome of an evaluation
///
/// An error here is the traced computation failing, not a builder fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum EvaluationResult {
    Type(String),
    Code(String),
    Error(String),
}

impl EvaluationResult {
    pub fn is_error(&self) -> bool {
        matches!(self, EvaluationResult::Error(_))
    }
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationResult::Type(t) => f.write_str(t),
            EvaluationResult::Code(c) => f.write_str(c),
            EvaluationResult::Error(e) => f.write_str(e),
        }
    }
}
