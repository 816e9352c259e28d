//! Expression AST nodes.

use crate::Pattern;
use rill_common::{Span, Symbol};
use std::rc::Rc;

/// An expression.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// A named attribute binding inside an attribute set literal.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: Symbol,
    pub value: Rc<Expr>,
    pub span: Span,
}

/// Expression kind.
///
/// This is the full set of shapes the evaluator recognizes. Surface forms
/// the parser desugars (`let … in`, `+`, string interpolation, `inherit`)
/// do not appear here.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Variable reference
    Var(Symbol),
    /// Integer literal
    Int(i64),
    /// String literal (no interpolation left at this level)
    Str(String),
    /// Path literal, already resolved to an absolute path
    Path(String),

    /// Non-recursive attribute set `{ a = 1; }`
    Attrs(Vec<Binding>),
    /// Recursive attribute set `rec { a = b; b = 1; }`.
    ///
    /// The recursive bindings see the set itself; the non-recursive ones
    /// (produced by `inherit`) are evaluated in the enclosing scope.
    Rec {
        rec_bindings: Vec<Binding>,
        non_rec_bindings: Vec<Binding>,
    },
    /// Attribute selection `e.name`
    Select(Rc<Expr>, Symbol),

    /// Lambda `x: body` or `{ a, b ? d, ... } @ args: body`
    Lambda { pat: Rc<Pattern>, body: Rc<Expr> },
    /// Function application `f x`
    Call(Rc<Expr>, Rc<Expr>),

    /// Dynamic scoping `with e; body`
    With(Rc<Expr>, Rc<Expr>),

    /// List literal `[ a b c ]`
    List(Vec<Rc<Expr>>),

    /// Equality `a == b`
    OpEq(Rc<Expr>, Rc<Expr>),
    /// Inequality `a != b`
    OpNeq(Rc<Expr>, Rc<Expr>),
    /// List concatenation `a ++ b`
    OpConcat(Rc<Expr>, Rc<Expr>),
    /// String/path concatenation; `+` and `"a${b}c"` both produce this
    ConcatStrings(Vec<Rc<Expr>>),

    /// Conditional `if c then t else f`
    If {
        cond: Rc<Expr>,
        then: Rc<Expr>,
        els: Rc<Expr>,
    },
    /// Assertion `assert c; body`
    Assert {
        cond: Rc<Expr>,
        body: Rc<Expr>,
        pos: Span,
    },

    /// Boolean negation `!a`
    OpNot(Rc<Expr>),
    /// Implication `a -> b`
    OpImpl(Rc<Expr>, Rc<Expr>),
    /// Conjunction `a && b`
    OpAnd(Rc<Expr>, Rc<Expr>),
    /// Disjunction `a || b`
    OpOr(Rc<Expr>, Rc<Expr>),

    /// Attribute set update `a // b`
    OpUpdate(Rc<Expr>, Rc<Expr>),
    /// Attribute existence test `e ? name`
    OpHasAttr(Rc<Expr>, Symbol),
}
