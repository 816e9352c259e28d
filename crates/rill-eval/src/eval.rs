//! The rill expression evaluator.
//!
//! Call-by-need reduction: evaluating an expression produces a value whose
//! sub-values may be thunks; forcing a slot reduces it to weak-head normal
//! form in place, so shared references evaluate at most once.

use crate::builtin;
use crate::env::{lookup_var, Env};
use crate::error::{EvalError, EvalErrorKind};
use crate::value::{
    show_type, AttrsRef, Bindings, Lambda, PathSet, PrimOp, PrimOpFn, Value, ValueRef,
};
use log::{debug, info};
use rill_common::{canon_path, Interner, Symbol};
use rill_store::{LocalStore, Store};
use rill_syntax::{Expr, ExprKind, Pattern};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One evaluation session.
///
/// Owns the symbol interner, the base environment, the per-session caches
/// and counters, and the handle to the object store. Values and
/// environments created during the session stay alive until it is dropped;
/// the reference cycles recursive attribute sets create are reclaimed
/// wholesale at teardown.
pub struct EvalSession {
    symbols: RefCell<Interner>,
    base_env: Rc<Env>,
    /// The `builtins` attribute set; constants and primops are mirrored
    /// into it as they are registered.
    builtins_attrs: AttrsRef,

    /// Parse trees, keyed by absolute file path.
    parse_trees: RefCell<HashMap<PathBuf, Rc<Expr>>>,
    /// Source paths already copied (or computed) into the store.
    pub(crate) src_to_store: RefCell<HashMap<String, String>>,
    pub(crate) store: Rc<dyn Store>,
    /// When set, path coercion computes store paths without copying.
    pub read_only: bool,
    /// Parsed from `RILL_NO_UNSAFE_EQ`; reserved for context-aware string
    /// equality, which is not yet implemented.
    pub allow_unsafe_equality: bool,

    interrupted: Arc<AtomicBool>,

    nr_values: Cell<usize>,
    nr_envs: Cell<usize>,
    nr_evaluated: Cell<usize>,
    depth: Cell<usize>,
    max_depth: Cell<usize>,

    pub(crate) s_with: Symbol,
    pub(crate) s_type: Symbol,
    pub(crate) s_out_path: Symbol,
}

impl EvalSession {
    /// Construct a session against the store at the configured default
    /// location, with the base environment populated.
    pub fn new() -> Self {
        Self::with_store(Rc::new(LocalStore::default_location()))
    }

    /// Construct a session against the given store.
    pub fn with_store(store: Rc<dyn Store>) -> Self {
        let mut symbols = Interner::new();
        // Not spellable as an identifier, so it can never collide with a
        // user binding.
        let s_with = symbols.intern("<with>");
        let s_type = symbols.intern("type");
        let s_out_path = symbols.intern("outPath");

        let session = Self {
            symbols: RefCell::new(symbols),
            base_env: Env::root(),
            builtins_attrs: Rc::new(RefCell::new(Bindings::new())),
            parse_trees: RefCell::new(HashMap::new()),
            src_to_store: RefCell::new(HashMap::new()),
            store,
            read_only: false,
            allow_unsafe_equality: std::env::var("RILL_NO_UNSAFE_EQ")
                .map(|v| v.is_empty())
                .unwrap_or(true),
            interrupted: Arc::new(AtomicBool::new(false)),
            nr_values: Cell::new(0),
            nr_envs: Cell::new(1),
            nr_evaluated: Cell::new(0),
            depth: Cell::new(0),
            max_depth: Cell::new(0),
            s_with,
            s_type,
            s_out_path,
        };

        builtin::register(&session);
        session
    }

    /// Intern a name.
    pub fn intern(&self, name: &str) -> Symbol {
        self.symbols.borrow_mut().intern(name)
    }

    /// The string a symbol was interned from.
    pub fn symbol_name(&self, sym: Symbol) -> String {
        self.symbols.borrow().resolve(sym).to_string()
    }

    /// The flag polled at every evaluation step; set it (e.g. from a
    /// signal handler) to abort the running evaluation cleanly.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub(crate) fn alloc_value(&self, v: Value) -> ValueRef {
        self.nr_values.set(self.nr_values.get() + 1);
        v.into_ref()
    }

    fn alloc_env(&self, parent: &Rc<Env>) -> Rc<Env> {
        self.nr_envs.set(self.nr_envs.get() + 1);
        Env::child(parent)
    }

    // ------------------------------------------------------------------
    // Base environment
    // ------------------------------------------------------------------

    /// Bind a constant in the base environment, mirrored under
    /// `builtins.<name>`; a `__` prefix is stripped from the mirror.
    pub fn add_constant(&self, name: &str, v: Value) {
        let slot = self.alloc_value(v);
        let sym = self.intern(name);
        self.base_env.bindings.borrow_mut().insert(sym, slot.clone());
        let mirror = self.intern(name.strip_prefix("__").unwrap_or(name));
        self.builtins_attrs.borrow_mut().insert(mirror, slot);
        self.nr_values.set(self.nr_values.get() + 1);
    }

    /// Register a built-in operation, mirrored like a constant.
    pub fn add_prim_op(&self, name: &'static str, arity: usize, fun: PrimOpFn) {
        debug_assert!(arity >= 1);
        self.add_constant(name, Value::PrimOp(PrimOp { name, arity, fun }));
    }

    pub(crate) fn builtins_attrs(&self) -> AttrsRef {
        self.builtins_attrs.clone()
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Parse an expression string; relative paths resolve against `base_dir`.
    pub fn parse_str(&self, source: &str, base_dir: &Path) -> Result<Rc<Expr>, EvalError> {
        let mut symbols = self.symbols.borrow_mut();
        Ok(rill_parser::parse_expr_from_str(source, base_dir, &mut symbols)?)
    }

    /// Evaluate an expression in the base environment.
    pub fn eval(&self, expr: &Rc<Expr>) -> Result<ValueRef, EvalError> {
        let v = self.eval_expr(&self.base_env, expr)?;
        Ok(self.alloc_value(v))
    }

    /// Parse (memoized) and evaluate a file.
    pub fn eval_file(&self, path: &Path) -> Result<ValueRef, EvalError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| EvalError::eval(e.to_string()))?
                .join(path)
        };
        let absolute = PathBuf::from(canon_path(&absolute.display().to_string()));

        let cached = self.parse_trees.borrow().get(&absolute).cloned();
        let expr = match cached {
            Some(expr) => expr,
            None => {
                let expr = {
                    let mut symbols = self.symbols.borrow_mut();
                    rill_parser::parse_expr_from_file(&absolute, &mut symbols)?
                };
                self.parse_trees
                    .borrow_mut()
                    .insert(absolute.clone(), expr.clone());
                expr
            }
        };

        self.eval(&expr).map_err(|mut e| {
            e.add_context(format!(
                "while evaluating the file `{}':",
                absolute.display()
            ));
            e
        })
    }

    // ------------------------------------------------------------------
    // The evaluator
    // ------------------------------------------------------------------

    pub(crate) fn eval_expr(&self, env: &Rc<Env>, expr: &Expr) -> Result<Value, EvalError> {
        if self.interrupted.load(Ordering::Relaxed) {
            return Err(EvalError::new(EvalErrorKind::Interrupted));
        }

        self.nr_evaluated.set(self.nr_evaluated.get() + 1);
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        if depth > self.max_depth.get() {
            self.max_depth.set(depth);
        }

        let result = self.eval_expr_inner(env, expr);
        self.depth.set(depth - 1);
        result
    }

    fn eval_expr_inner(&self, env: &Rc<Env>, expr: &Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Var(name) => {
                let slot = lookup_var(env, *name, self.s_with).ok_or_else(|| {
                    EvalError::new(EvalErrorKind::UndefinedVariable(self.symbol_name(*name)))
                })?;
                self.force_value(&slot)?;
                let v = slot.borrow().clone();
                Ok(v)
            }

            ExprKind::Int(n) => Ok(Value::Int(*n)),

            ExprKind::Str(s) => Ok(Value::string_bare(s.clone())),

            ExprKind::Path(p) => Ok(Value::Path(Rc::new(p.clone()))),

            ExprKind::Attrs(bindings) => {
                let mut attrs = Bindings::new();
                for b in bindings {
                    attrs.insert(
                        b.name,
                        self.alloc_value(Value::Thunk {
                            env: env.clone(),
                            expr: b.value.clone(),
                        }),
                    );
                }
                Ok(Value::Attrs(Rc::new(RefCell::new(attrs))))
            }

            ExprKind::Rec {
                rec_bindings,
                non_rec_bindings,
            } => {
                // The new frame's bindings ARE the attribute set, so the
                // recursive thunks can see their siblings through it.
                let env2 = self.alloc_env(env);
                {
                    let mut bindings = env2.bindings.borrow_mut();
                    for b in rec_bindings {
                        bindings.insert(
                            b.name,
                            self.alloc_value(Value::Thunk {
                                env: env2.clone(),
                                expr: b.value.clone(),
                            }),
                        );
                    }
                    for b in non_rec_bindings {
                        bindings.insert(
                            b.name,
                            self.alloc_value(Value::Thunk {
                                env: env.clone(),
                                expr: b.value.clone(),
                            }),
                        );
                    }
                }
                Ok(Value::Attrs(env2.bindings.clone()))
            }

            ExprKind::Select(e, name) => {
                let v = self.eval_expr(env, e)?;
                let attrs = self.expect_attrs(v)?;
                let slot = attrs.borrow().get(name).cloned().ok_or_else(|| {
                    EvalError::eval(format!("attribute `{}' missing", self.symbol_name(*name)))
                })?;
                self.force_value(&slot).map_err(|mut err| {
                    err.add_context(format!(
                        "while evaluating the attribute `{}':",
                        self.symbol_name(*name)
                    ));
                    err
                })?;
                let v = slot.borrow().clone();
                Ok(v)
            }

            ExprKind::Lambda { pat, body } => Ok(Value::Lambda(Rc::new(Lambda {
                env: env.clone(),
                pat: pat.clone(),
                body: body.clone(),
            }))),

            ExprKind::Call(fun, arg) => {
                let vfun = self.eval_expr(env, fun)?;
                let varg = self.alloc_value(Value::Thunk {
                    env: env.clone(),
                    expr: arg.clone(),
                });
                self.apply(&vfun, varg)
            }

            ExprKind::With(attrs, body) => {
                let env2 = self.alloc_env(env);
                let vattrs = self.eval_expr(env, attrs)?;
                let vattrs = Value::Attrs(self.expect_attrs(vattrs)?);
                env2.bindings
                    .borrow_mut()
                    .insert(self.s_with, self.alloc_value(vattrs));
                self.eval_expr(&env2, body)
            }

            ExprKind::List(elems) => {
                let list = elems
                    .iter()
                    .map(|e| {
                        self.alloc_value(Value::Thunk {
                            env: env.clone(),
                            expr: e.clone(),
                        })
                    })
                    .collect();
                Ok(Value::List(list))
            }

            ExprKind::OpEq(e1, e2) => {
                let v1 = self.alloc_value(self.eval_expr(env, e1)?);
                let v2 = self.alloc_value(self.eval_expr(env, e2)?);
                Ok(Value::Bool(self.eq_values(&v1, &v2)?))
            }

            ExprKind::OpNeq(e1, e2) => {
                let v1 = self.alloc_value(self.eval_expr(env, e1)?);
                let v2 = self.alloc_value(self.eval_expr(env, e2)?);
                Ok(Value::Bool(!self.eq_values(&v1, &v2)?))
            }

            ExprKind::OpConcat(e1, e2) => {
                let l1 = self.expect_list(self.eval_expr(env, e1)?)?;
                let l2 = self.expect_list(self.eval_expr(env, e2)?)?;
                // Shallow concatenation: the element slots are shared with
                // the operands, not re-thunked.
                let mut elems = l1;
                elems.extend(l2);
                Ok(Value::List(elems))
            }

            ExprKind::ConcatStrings(parts) => self.eval_concat_strings(env, parts),

            ExprKind::If { cond, then, els } => {
                if self.eval_bool(env, cond)? {
                    self.eval_expr(env, then)
                } else {
                    self.eval_expr(env, els)
                }
            }

            ExprKind::Assert { cond, body, pos } => {
                if !self.eval_bool(env, cond)? {
                    return Err(EvalError::new(EvalErrorKind::Assertion(*pos)));
                }
                self.eval_expr(env, body)
            }

            ExprKind::OpNot(e) => Ok(Value::Bool(!self.eval_bool(env, e)?)),

            ExprKind::OpImpl(e1, e2) => Ok(Value::Bool(
                !self.eval_bool(env, e1)? || self.eval_bool(env, e2)?,
            )),

            ExprKind::OpAnd(e1, e2) => Ok(Value::Bool(
                self.eval_bool(env, e1)? && self.eval_bool(env, e2)?,
            )),

            ExprKind::OpOr(e1, e2) => Ok(Value::Bool(
                self.eval_bool(env, e1)? || self.eval_bool(env, e2)?,
            )),

            ExprKind::OpUpdate(e1, e2) => {
                let a = self.expect_attrs(self.eval_expr(env, e1)?)?;
                // Copy nodes keep the left operand's slots shared, so a
                // thunk selected through both sets still forces once.
                let mut result = Bindings::new();
                for (name, slot) in a.borrow().iter() {
                    result.insert(*name, self.alloc_value(Value::Copy(slot.clone())));
                }
                let b = self.expect_attrs(self.eval_expr(env, e2)?)?;
                for (name, slot) in b.borrow().iter() {
                    result.insert(*name, slot.clone());
                }
                Ok(Value::Attrs(Rc::new(RefCell::new(result))))
            }

            ExprKind::OpHasAttr(e, name) => {
                let attrs = self.expect_attrs(self.eval_expr(env, e)?)?;
                let present = attrs.borrow().contains_key(name);
                Ok(Value::Bool(present))
            }
        }
    }

    /// ConcatStrings: the first element decides the result kind. An
    /// integer makes `+` numeric addition; a path yields a path, which
    /// must not accumulate any context; anything else yields a string
    /// whose context is the union of the elements' contexts.
    fn eval_concat_strings(
        &self,
        env: &Rc<Env>,
        parts: &[Rc<Expr>],
    ) -> Result<Value, EvalError> {
        let mut context = PathSet::new();
        let mut s = String::new();
        let mut sum: i64 = 0;
        let mut is_path = false;
        let mut is_int = false;

        for (n, part) in parts.iter().enumerate() {
            let v = self.alloc_value(self.eval_expr(env, part)?);
            if n == 0 {
                match &*v.borrow() {
                    Value::Path(_) => is_path = true,
                    Value::Int(_) => is_int = true,
                    _ => {}
                }
            }
            if is_int {
                match &*v.borrow() {
                    Value::Int(i) => sum += i,
                    other => {
                        return Err(EvalError::type_error(format!(
                            "cannot add {} to an integer",
                            show_type(other)
                        )))
                    }
                }
            } else {
                s.push_str(&self.coerce_to_string(&v, &mut context, false, !is_path)?);
            }
        }

        if is_int {
            return Ok(Value::Int(sum));
        }

        if is_path && !context.is_empty() {
            return Err(EvalError::eval(format!(
                "a string that refers to a store path cannot be appended to a path, in `{}'",
                s
            )));
        }

        if is_path {
            Ok(Value::Path(Rc::new(s)))
        } else {
            Ok(Value::String {
                s: Rc::new(s),
                context,
            })
        }
    }

    fn eval_bool(&self, env: &Rc<Env>, expr: &Expr) -> Result<bool, EvalError> {
        match self.eval_expr(env, expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::type_error(format!(
                "value is {} while a Boolean was expected",
                show_type(&other)
            ))),
        }
    }

    pub(crate) fn expect_attrs(&self, v: Value) -> Result<AttrsRef, EvalError> {
        match v {
            Value::Attrs(attrs) => Ok(attrs),
            other => Err(EvalError::type_error(format!(
                "value is {} while an attribute set was expected",
                show_type(&other)
            ))),
        }
    }

    fn expect_list(&self, v: Value) -> Result<Vec<ValueRef>, EvalError> {
        match v {
            Value::List(elems) => Ok(elems),
            other => Err(EvalError::type_error(format!(
                "value is {} while a list was expected",
                show_type(&other)
            ))),
        }
    }

    // ------------------------------------------------------------------
    // The thunk engine
    // ------------------------------------------------------------------

    /// Reduce a slot to weak-head normal form in place.
    ///
    /// A thunk is replaced by a blackhole while its expression evaluates;
    /// observing the blackhole from within means the thunk depends on
    /// itself. On failure the original thunk is restored so a later retry
    /// (after an interrupt, say) is legal.
    pub fn force_value(&self, v: &ValueRef) -> Result<(), EvalError> {
        enum Unforced {
            Thunk(Rc<Env>, Rc<Expr>),
            Copy(ValueRef),
            App(ValueRef, ValueRef),
        }

        let unforced = match &*v.borrow() {
            Value::Thunk { env, expr } => Unforced::Thunk(env.clone(), expr.clone()),
            Value::Copy(target) => Unforced::Copy(target.clone()),
            Value::App { left, right } => Unforced::App(left.clone(), right.clone()),
            Value::Blackhole => {
                return Err(EvalError::new(EvalErrorKind::InfiniteRecursion));
            }
            _ => return Ok(()),
        };

        match unforced {
            Unforced::Thunk(env, expr) => {
                *v.borrow_mut() = Value::Blackhole;
                match self.eval_expr(&env, &expr) {
                    Ok(value) => {
                        *v.borrow_mut() = value;
                        Ok(())
                    }
                    Err(e) => {
                        *v.borrow_mut() = Value::Thunk { env, expr };
                        Err(e)
                    }
                }
            }
            Unforced::Copy(target) => {
                self.force_value(&target)?;
                let value = target.borrow().clone();
                *v.borrow_mut() = value;
                Ok(())
            }
            Unforced::App(left, right) => {
                self.force_value(&left)?;
                let fun = left.borrow().clone();
                let value = self.apply(&fun, right)?;
                *v.borrow_mut() = value;
                Ok(())
            }
        }
    }

    /// Force a value and everything reachable from it.
    pub fn strict_force_value(&self, v: &ValueRef) -> Result<(), EvalError> {
        self.force_value(v)?;

        let children: Vec<ValueRef> = match &*v.borrow() {
            Value::Attrs(attrs) => attrs.borrow().values().cloned().collect(),
            Value::List(elems) => elems.clone(),
            _ => return Ok(()),
        };

        for child in children {
            self.strict_force_value(&child)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Function application
    // ------------------------------------------------------------------

    /// Apply a forced function value to an argument slot. The argument
    /// stays unforced unless the parameter pattern requires inspection.
    pub fn call_function(&self, fun: &ValueRef, arg: ValueRef) -> Result<Value, EvalError> {
        self.force_value(fun)?;
        let fun = fun.borrow().clone();
        self.apply(&fun, arg)
    }

    fn apply(&self, fun: &Value, arg: ValueRef) -> Result<Value, EvalError> {
        match fun {
            Value::PrimOp(PrimOp { arity, .. }) => self.apply_prim(fun, arg, *arity),
            Value::PrimOpApp { args_left, .. } => self.apply_prim(fun, arg, *args_left),

            Value::Lambda(lam) => {
                let env2 = self.alloc_env(&lam.env);

                match &*lam.pat {
                    Pattern::Var(name) => {
                        env2.bindings.borrow_mut().insert(*name, arg);
                    }

                    Pattern::Attrs {
                        formals,
                        ellipsis,
                        alias,
                    } => {
                        self.force_value(&arg)?;
                        let attrs = self.expect_attrs(arg.borrow().clone())?;

                        if let Some(alias) = alias {
                            env2.bindings.borrow_mut().insert(*alias, arg.clone());
                        }

                        let mut attrs_used = 0;
                        for formal in formals {
                            let supplied = attrs.borrow().get(&formal.name).cloned();
                            let slot = match supplied {
                                Some(slot) => {
                                    attrs_used += 1;
                                    // Alias, so forcing is shared with the
                                    // caller's copy of the argument.
                                    self.alloc_value(Value::Copy(slot))
                                }
                                None => match &formal.default {
                                    // Defaults see the new frame, so they
                                    // may refer to other formals.
                                    Some(default) => self.alloc_value(Value::Thunk {
                                        env: env2.clone(),
                                        expr: default.clone(),
                                    }),
                                    None => {
                                        return Err(EvalError::type_error(format!(
                                            "the argument named `{}' required by the function is missing",
                                            self.symbol_name(formal.name)
                                        )))
                                    }
                                },
                            };
                            env2.bindings.borrow_mut().insert(formal.name, slot);
                        }

                        if !*ellipsis && attrs_used != attrs.borrow().len() {
                            return Err(EvalError::type_error(
                                "function called with unexpected argument",
                            ));
                        }
                    }
                }

                self.eval_expr(&env2, &lam.body)
            }

            other => Err(EvalError::type_error(format!(
                "attempt to call something which is neither a function nor a primop (built-in operation) but {}",
                show_type(other)
            ))),
        }
    }

    fn apply_prim(&self, fun: &Value, arg: ValueRef, args_left: usize) -> Result<Value, EvalError> {
        if args_left > 1 {
            return Ok(Value::PrimOpApp {
                left: self.alloc_value(fun.clone()),
                right: arg,
                args_left: args_left - 1,
            });
        }

        // All arguments are in. Walk the left chain to the primop itself,
        // collecting arguments right to left.
        let mut args: Vec<ValueRef> = vec![arg];
        let mut current = fun.clone();
        loop {
            match current {
                Value::PrimOpApp { left, right, .. } => {
                    args.push(right);
                    let next = left.borrow().clone();
                    current = next;
                }
                Value::PrimOp(op) => {
                    args.reverse();
                    debug_assert_eq!(args.len(), op.arity);
                    return (op.fun)(self, &args);
                }
                other => {
                    return Err(EvalError::eval(format!(
                        "malformed partial application of {}",
                        show_type(&other)
                    )))
                }
            }
        }
    }

    /// Call a function whose argument is assembled from `args`: every
    /// formal with a matching candidate is supplied, the rest fall back to
    /// their defaults. Anything that is not an attribute set pattern
    /// lambda is returned unchanged.
    pub fn auto_call_function(
        &self,
        args: &Bindings,
        fun: &ValueRef,
    ) -> Result<Value, EvalError> {
        self.force_value(fun)?;

        let formals = match &*fun.borrow() {
            Value::Lambda(lam) => match &*lam.pat {
                Pattern::Attrs { formals, .. } => formals.clone(),
                Pattern::Var(_) => return Ok(fun.borrow().clone()),
            },
            _ => return Ok(fun.borrow().clone()),
        };

        let mut actual = Bindings::new();
        for formal in &formals {
            if let Some(slot) = args.get(&formal.name) {
                actual.insert(formal.name, slot.clone());
            } else if formal.default.is_none() {
                return Err(EvalError::type_error(format!(
                    "cannot auto-call a function that has an argument without a default value (`{}')",
                    self.symbol_name(formal.name)
                )));
            }
        }

        let arg = self.alloc_value(Value::Attrs(Rc::new(RefCell::new(actual))));
        self.call_function(fun, arg)
    }

    // ------------------------------------------------------------------
    // Typed forcers
    // ------------------------------------------------------------------

    pub fn force_int(&self, v: &ValueRef) -> Result<i64, EvalError> {
        self.force_value(v)?;
        match &*v.borrow() {
            Value::Int(n) => Ok(*n),
            other => Err(EvalError::type_error(format!(
                "value is {} while an integer was expected",
                show_type(other)
            ))),
        }
    }

    pub fn force_bool(&self, v: &ValueRef) -> Result<bool, EvalError> {
        self.force_value(v)?;
        match &*v.borrow() {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::type_error(format!(
                "value is {} while a Boolean was expected",
                show_type(other)
            ))),
        }
    }

    pub fn force_attrs(&self, v: &ValueRef) -> Result<AttrsRef, EvalError> {
        self.force_value(v)?;
        let value = v.borrow().clone();
        self.expect_attrs(value)
    }

    pub fn force_list(&self, v: &ValueRef) -> Result<Vec<ValueRef>, EvalError> {
        self.force_value(v)?;
        let value = v.borrow().clone();
        self.expect_list(value)
    }

    pub fn force_function(&self, v: &ValueRef) -> Result<(), EvalError> {
        self.force_value(v)?;
        match &*v.borrow() {
            Value::Lambda(_) | Value::PrimOp(_) | Value::PrimOpApp { .. } => Ok(()),
            other => Err(EvalError::type_error(format!(
                "value is {} while a function was expected",
                show_type(other)
            ))),
        }
    }

    pub fn force_string(&self, v: &ValueRef) -> Result<Rc<String>, EvalError> {
        self.force_value(v)?;
        match &*v.borrow() {
            Value::String { s, .. } => Ok(s.clone()),
            other => Err(EvalError::type_error(format!(
                "value is {} while a string was expected",
                show_type(other)
            ))),
        }
    }

    /// Force a string and merge its context into `context`.
    pub fn force_string_ctx(
        &self,
        v: &ValueRef,
        context: &mut PathSet,
    ) -> Result<Rc<String>, EvalError> {
        let s = self.force_string(v)?;
        if let Value::String { context: ctx, .. } = &*v.borrow() {
            context.extend(ctx.iter().cloned());
        }
        Ok(s)
    }

    /// Force a string that must not refer to any store path.
    pub fn force_string_no_ctx(&self, v: &ValueRef) -> Result<Rc<String>, EvalError> {
        let s = self.force_string(v)?;
        if let Value::String { context, .. } = &*v.borrow() {
            if let Some(path) = context.iter().next() {
                return Err(EvalError::eval(format!(
                    "the string `{}' is not allowed to refer to a store path (such as `{}')",
                    s, path
                )));
            }
        }
        Ok(s)
    }

    // ------------------------------------------------------------------
    // Equality
    // ------------------------------------------------------------------

    /// Structural equality after forcing both sides. String contexts are
    /// ignored; functions compare unequal to everything.
    pub fn eq_values(&self, v1: &ValueRef, v2: &ValueRef) -> Result<bool, EvalError> {
        self.force_value(v1)?;
        self.force_value(v2)?;

        let a = v1.borrow().clone();
        let b = v2.borrow().clone();

        Ok(match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::String { s: x, .. }, Value::String { s: y, .. }) => x == y,
            (Value::Path(x), Value::Path(y)) => x == y,
            (Value::Null, Value::Null) => true,

            (Value::List(x), Value::List(y)) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (ex, ey) in x.iter().zip(y.iter()) {
                    if !self.eq_values(ex, ey)? {
                        return Ok(false);
                    }
                }
                true
            }

            (Value::Attrs(x), Value::Attrs(y)) => {
                let pairs: Option<Vec<(ValueRef, ValueRef)>> = {
                    let xa = x.borrow();
                    let ya = y.borrow();
                    if xa.len() != ya.len() {
                        None
                    } else if xa.keys().zip(ya.keys()).any(|(kx, ky)| kx != ky) {
                        // The maps iterate in sorted symbol order, so equal
                        // sets have identical key sequences.
                        None
                    } else {
                        Some(
                            xa.values()
                                .cloned()
                                .zip(ya.values().cloned())
                                .collect(),
                        )
                    }
                };
                match pairs {
                    None => false,
                    Some(pairs) => {
                        for (ex, ey) in pairs {
                            if !self.eq_values(&ex, &ey)? {
                                return Ok(false);
                            }
                        }
                        true
                    }
                }
            }

            // Functions are incomparable.
            (Value::Lambda(_), _)
            | (_, Value::Lambda(_))
            | (Value::PrimOp(_), _)
            | (_, Value::PrimOp(_))
            | (Value::PrimOpApp { .. }, _)
            | (_, Value::PrimOpApp { .. }) => false,

            _ if a.is_unforced() || b.is_unforced() => {
                return Err(EvalError::eval(format!(
                    "cannot compare {} with {}",
                    show_type(&a),
                    show_type(&b)
                )))
            }

            _ => false,
        })
    }

    // ------------------------------------------------------------------
    // Printing and statistics
    // ------------------------------------------------------------------

    /// Render a value for display. Unforced sub-values print as `<code>`.
    pub fn show_value(&self, v: &ValueRef) -> String {
        match &*v.borrow() {
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => (if *b { "true" } else { "false" }).to_string(),
            Value::String { s, .. } => {
                let mut out = String::from("\"");
                for ch in s.chars() {
                    match ch {
                        '"' | '\\' => {
                            out.push('\\');
                            out.push(ch);
                        }
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\t' => out.push_str("\\t"),
                        _ => out.push(ch),
                    }
                }
                out.push('"');
                out
            }
            Value::Path(p) => p.to_string(),
            Value::Null => "null".to_string(),
            Value::Attrs(attrs) => {
                let mut out = String::from("{ ");
                for (name, slot) in attrs.borrow().iter() {
                    out.push_str(&self.symbol_name(*name));
                    out.push_str(" = ");
                    out.push_str(&self.show_value(slot));
                    out.push_str("; ");
                }
                out.push('}');
                out
            }
            Value::List(elems) => {
                let mut out = String::from("[ ");
                for elem in elems {
                    out.push_str(&self.show_value(elem));
                    out.push(' ');
                }
                out.push(']');
                out
            }
            Value::Lambda(_) => "<lambda>".to_string(),
            Value::PrimOp(_) => "<primop>".to_string(),
            Value::PrimOpApp { .. } => "<primop-app>".to_string(),
            Value::Copy(target) => self.show_value(target),
            Value::Thunk { .. } | Value::App { .. } | Value::Blackhole => "<code>".to_string(),
        }
    }

    /// Report the session counters through the log facade. Verbose when
    /// `RILL_SHOW_STATS` is set to anything but `"0"`.
    pub fn print_stats(&self) {
        let show = std::env::var("RILL_SHOW_STATS")
            .map(|v| v != "0")
            .unwrap_or(false);
        let message = format!(
            "evaluated {} expressions, reached {} nested evaluations, allocated {} values, allocated {} environments",
            self.nr_evaluated.get(),
            self.max_depth.get(),
            self.nr_values.get(),
            self.nr_envs.get()
        );
        if show {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}

impl Default for EvalSession {
    fn default() -> Self {
        Self::new()
    }
}
