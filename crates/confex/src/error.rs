//! Error types shared by every stage of the engine
//!
//! Each failed operation yields exactly one [Error]. Evaluation failures are wrapped once in
//! [Error::InExpression] which carries the canonical expression text with the failing node
//! underlined; use [Error::root] to look through that wrapper.
use crate::expression::lexer::LexErrorKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{kind} at offset {offset}\n{excerpt}")]
    Lex {
        kind: LexErrorKind,
        offset: usize,
        excerpt: String,
    },

    #[error("{message}, found {token} at offset {offset}\n{excerpt}")]
    Parse {
        message: String,
        token: String,
        offset: usize,
        excerpt: String,
    },

    #[error("path exceeds {max} segments at offset {offset}\n{excerpt}")]
    PathTooLong {
        max: usize,
        offset: usize,
        excerpt: String,
    },

    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("undefined function `{name}`")]
    UndefinedFunction { name: String },

    #[error("function `{function}` takes {expected} argument(s) but {actual} were given")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid function signature for `{function}`: {reason}")]
    BadFunctionSignature { function: String, reason: String },

    #[error("argument {index} of `{function}` must be {expected}, got {found}")]
    IncompatibleArgType {
        function: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("function `{function}` failed: {message}")]
    Function { function: String, message: String },

    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("invalid path `{0}`")]
    InvalidPath(String),

    #[error("variable `{name}` is {found} and cannot be used as a path segment")]
    InvalidPathSegment { name: String, found: &'static str },

    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{vertex} references itself")]
    SelfReferencingDependency { vertex: String },

    #[error("dependency {from} -> {to} would create a loop")]
    CyclicDependency { from: String, to: String },

    #[error("unknown vertex {0}")]
    UnknownVertex(String),

    #[error("expected a single expression but found {count}")]
    MultipleTopLevelExpressions { count: usize },

    #[error("unsupported document value: {0}")]
    Document(String),

    #[error("{source}\n{context}")]
    InExpression {
        #[source]
        source: Box<Error>,
        context: String,
    },
}

impl Error {
    /// The innermost error, looking through [Error::InExpression] wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::InExpression { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Single line of `source` around byte `offset` with a caret under the offending column
pub(crate) fn excerpt_at(source: &str, offset: usize) -> String {
    let offset = offset.min(source.len());
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[offset..]
        .find('\n')
        .map_or(source.len(), |i| offset + i);

    let line = &source[line_start..line_end];
    let column = source[line_start..offset].chars().count();

    format!("  {line}\n  {}^", " ".repeat(column))
}

/// `text` with the byte range `span` underlined
pub(crate) fn underline(text: &str, span: std::ops::Range<usize>) -> String {
    let lead = text[..span.start].chars().count();
    let width = text[span.start..span.end].chars().count().max(1);

    format!("  {text}\n  {}{}", " ".repeat(lead), "^".repeat(width))
}
