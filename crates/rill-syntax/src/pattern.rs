//! Lambda parameter patterns.

use crate::Expr;
use rill_common::Symbol;
use std::rc::Rc;

/// A lambda parameter pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A single positional parameter: `x: body`.
    Var(Symbol),
    /// An attribute set pattern: `{ a, b ? default, ... } @ alias: body`.
    Attrs {
        formals: Vec<Formal>,
        /// Whether extra attributes are tolerated (`...`).
        ellipsis: bool,
        /// Binds the whole argument set, from `@ name` (either side).
        alias: Option<Symbol>,
    },
}

/// One formal argument of an attribute set pattern.
#[derive(Debug, Clone)]
pub struct Formal {
    pub name: Symbol,
    /// Default expression, evaluated in the function body's scope so it may
    /// refer to other formals.
    pub default: Option<Rc<Expr>>,
}
