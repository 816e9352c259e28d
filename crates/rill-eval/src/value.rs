//! Runtime values.

use crate::env::Env;
use crate::error::EvalError;
use crate::eval::EvalSession;
use rill_common::Symbol;
use rill_syntax::{Expr, Pattern};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// A slot holding a value. Forcing a thunk overwrites the slot in place,
/// so every reference to the slot sees the result exactly once.
pub type ValueRef = Rc<RefCell<Value>>;

/// The bindings of an attribute set, keyed by interned symbol. The map is
/// ordered so that equality and printing iterate deterministically.
pub type Bindings = BTreeMap<Symbol, ValueRef>;

/// A shared attribute set. A recursive attribute set shares this map with
/// the environment frame its thunks are evaluated in.
pub type AttrsRef = Rc<RefCell<Bindings>>;

/// The store paths a string depends on.
pub type PathSet = BTreeSet<String>;

/// A user-defined function closure.
pub struct Lambda {
    pub env: Rc<Env>,
    pub pat: Rc<Pattern>,
    pub body: Rc<Expr>,
}

/// The function pointer type of a built-in operation. Arguments arrive as
/// slots and may still be thunks; built-ins force what they inspect.
pub type PrimOpFn = fn(&EvalSession, &[ValueRef]) -> Result<Value, EvalError>;

/// A built-in operation of known arity.
#[derive(Clone)]
pub struct PrimOp {
    pub name: &'static str,
    pub arity: usize,
    pub fun: PrimOpFn,
}

/// A runtime value.
///
/// Thunk, Copy, App and Blackhole are the unforced tags; nothing outside
/// the forcing machinery may observe them.
#[derive(Clone)]
pub enum Value {
    /// Integer value
    Int(i64),
    /// Boolean value
    Bool(bool),
    /// String with the set of store paths it refers to
    String { s: Rc<String>, context: PathSet },
    /// Filesystem path, not yet copied to the store
    Path(Rc<String>),
    /// The unit value
    Null,
    /// Attribute set
    Attrs(AttrsRef),
    /// List value
    List(Vec<ValueRef>),
    /// Closure
    Lambda(Rc<Lambda>),
    /// Built-in operation
    PrimOp(PrimOp),
    /// Partial application of a built-in
    PrimOpApp {
        left: ValueRef,
        right: ValueRef,
        args_left: usize,
    },
    /// Suspended expression
    Thunk { env: Rc<Env>, expr: Rc<Expr> },
    /// Alias for another slot; forcing flattens it
    Copy(ValueRef),
    /// Suspended function application
    App { left: ValueRef, right: ValueRef },
    /// Sentinel replacing a thunk while it is being forced
    Blackhole,
}

impl Value {
    /// Wrap a value in a fresh slot.
    pub fn into_ref(self) -> ValueRef {
        Rc::new(RefCell::new(self))
    }

    /// A string value with no context.
    pub fn string_bare<S: Into<String>>(s: S) -> Self {
        Value::String {
            s: Rc::new(s.into()),
            context: PathSet::new(),
        }
    }

    /// Whether this value still needs forcing before it can be observed.
    pub fn is_unforced(&self) -> bool {
        matches!(
            self,
            Value::Thunk { .. } | Value::Copy(_) | Value::App { .. } | Value::Blackhole
        )
    }
}

/// Describe a value's type for error messages.
pub fn show_type(v: &Value) -> &'static str {
    match v {
        Value::Int(_) => "an integer",
        Value::Bool(_) => "a boolean",
        Value::String { .. } => "a string",
        Value::Path(_) => "a path",
        Value::Null => "null",
        Value::Attrs(_) => "an attribute set",
        Value::List(_) => "a list",
        Value::Lambda(_) => "a function",
        Value::PrimOp(_) => "a built-in function",
        Value::PrimOpApp { .. } => "a partially applied built-in function",
        Value::Thunk { .. } | Value::Copy(_) | Value::App { .. } => "an unevaluated expression",
        Value::Blackhole => "a value under evaluation",
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::String { s, context } => {
                write!(f, "String({:?}, {} context paths)", s, context.len())
            }
            Value::Path(p) => write!(f, "Path({})", p),
            Value::Null => write!(f, "Null"),
            Value::Attrs(attrs) => write!(f, "Attrs({} attributes)", attrs.borrow().len()),
            Value::List(elems) => write!(f, "List({} elements)", elems.len()),
            Value::Lambda(_) => write!(f, "Lambda"),
            Value::PrimOp(op) => write!(f, "PrimOp({})", op.name),
            Value::PrimOpApp { args_left, .. } => write!(f, "PrimOpApp({} left)", args_left),
            Value::Thunk { .. } => write!(f, "Thunk"),
            Value::Copy(_) => write!(f, "Copy"),
            Value::App { .. } => write!(f, "App"),
            Value::Blackhole => write!(f, "Blackhole"),
        }
    }
}
