//! Evaluation errors.
//!
//! An error carries its kind plus the contextual prefixes pushed while it
//! unwound (`while evaluating the file …`, `while evaluating the attribute
//! …`). Frames push as the error travels outward; the rendered message
//! shows the outermost prefix first.

use rill_common::Span;
use std::fmt;
use thiserror::Error;

/// The kind of an evaluation failure.
#[derive(Debug, Error)]
pub enum EvalErrorKind {
    /// Evaluation-time semantic error.
    #[error("{0}")]
    Eval(String),

    /// A value had the wrong shape.
    #[error("{0}")]
    Type(String),

    /// An `assert` predicate was false.
    #[error("assertion failed at byte {}", .0.start.0)]
    Assertion(Span),

    /// Name resolution failed.
    #[error("undefined variable `{0}'")]
    UndefinedVariable(String),

    /// A thunk was forced while already being forced.
    #[error("infinite recursion encountered")]
    InfiniteRecursion,

    /// Cooperative cancellation was requested.
    #[error("evaluation interrupted")]
    Interrupted,
}

/// An evaluation error with its contextual prefixes.
#[derive(Debug)]
pub struct EvalError {
    context: Vec<String>,
    kind: EvalErrorKind,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        Self {
            context: Vec::new(),
            kind,
        }
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Eval(msg.into()))
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Type(msg.into()))
    }

    pub fn kind(&self) -> &EvalErrorKind {
        &self.kind
    }

    /// Push a contextual prefix. The most recently pushed prefix is the
    /// outermost frame and is rendered first.
    pub fn add_context(&mut self, prefix: impl Into<String>) {
        self.context.push(prefix.into());
    }

    pub fn with_context(mut self, prefix: impl Into<String>) -> Self {
        self.add_context(prefix);
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for prefix in self.context.iter().rev() {
            writeln!(f, "{}", prefix)?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for EvalError {}

impl From<rill_parser::ParseError> for EvalError {
    fn from(e: rill_parser::ParseError) -> Self {
        EvalError::eval(e.to_string())
    }
}

impl From<rill_store::StoreError> for EvalError {
    fn from(e: rill_store::StoreError) -> Self {
        EvalError::eval(e.to_string())
    }
}
