//! The rill expression evaluator.
//!
//! Reduces parsed rill expressions to values under call-by-need semantics:
//! thunk-based laziness with in-place memoization, lexical scoping composed
//! with dynamically scoped `with` frames, curried built-ins, and the
//! string/path coercions that connect evaluation to the object store.

mod builtin;
mod coerce;
mod env;
mod error;
mod eval;
mod value;

pub use env::{lookup_var, Env};
pub use error::{EvalError, EvalErrorKind};
pub use eval::EvalSession;
pub use value::{
    show_type, AttrsRef, Bindings, Lambda, PathSet, PrimOp, PrimOpFn, Value, ValueRef,
};
