//! AST types for the rill language.
//!
//! The parser produces these trees; the evaluator consumes them. Child
//! links are reference-counted so that thunks created during evaluation can
//! share subtrees with the AST they came from.

mod expr;
mod pattern;

pub use expr::{Binding, Expr, ExprKind};
pub use pattern::{Formal, Pattern};
