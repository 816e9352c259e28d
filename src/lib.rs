//! rill: a pure, lazy, functional configuration language for describing
//! software package builds.
//!
//! This umbrella crate re-exports the member crates; most users want
//! [`eval::EvalSession`].

pub use rill_common as common;
pub use rill_eval as eval;
pub use rill_lexer as lexer;
pub use rill_parser as parser;
pub use rill_store as store;
pub use rill_syntax as syntax;
