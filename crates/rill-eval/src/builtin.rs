//! The base environment: constants and built-in operations.
//!
//! Every registration lands in the base environment and is mirrored into
//! the `builtins` attribute set; a leading `__` is stripped from the
//! mirrored name, so `__add` is reachable as `builtins.add`.

use crate::error::EvalError;
use crate::eval::EvalSession;
use crate::value::{PathSet, Value, ValueRef};
use std::path::Path;
use std::rc::Rc;

/// Populate the base environment of a fresh session.
pub(crate) fn register(session: &EvalSession) {
    session.add_constant("true", Value::Bool(true));
    session.add_constant("false", Value::Bool(false));
    session.add_constant("null", Value::Null);
    // `builtins` contains itself, like every other constant.
    session.add_constant("builtins", Value::Attrs(session.builtins_attrs()));

    // Arithmetic
    session.add_prim_op("__add", 2, prim_add);
    session.add_prim_op("__sub", 2, prim_sub);
    session.add_prim_op("__mul", 2, prim_mul);
    session.add_prim_op("__div", 2, prim_div);
    session.add_prim_op("__lessThan", 2, prim_less_than);

    // Lists
    session.add_prim_op("__length", 1, prim_length);
    session.add_prim_op("__head", 1, prim_head);
    session.add_prim_op("__tail", 1, prim_tail);
    session.add_prim_op("__elemAt", 2, prim_elem_at);

    // Attribute sets
    session.add_prim_op("__attrNames", 1, prim_attr_names);
    session.add_prim_op("__getAttr", 2, prim_get_attr);
    session.add_prim_op("__hasAttr", 2, prim_has_attr);

    // Type inspection
    session.add_prim_op("__isNull", 1, prim_is_null);
    // The null check is also callable without the prefix.
    session.add_prim_op("isNull", 1, prim_is_null);
    session.add_prim_op("__typeOf", 1, prim_type_of);
    session.add_prim_op("__isString", 1, prim_is_string);
    session.add_prim_op("__isInt", 1, prim_is_int);
    session.add_prim_op("__isBool", 1, prim_is_bool);
    session.add_prim_op("__isList", 1, prim_is_list);
    session.add_prim_op("__isAttrs", 1, prim_is_attrs);
    session.add_prim_op("__isFunction", 1, prim_is_function);

    // Evaluation control
    session.add_prim_op("__seq", 2, prim_seq);
    session.add_prim_op("__deepSeq", 2, prim_deep_seq);
    session.add_prim_op("throw", 1, prim_throw);
    session.add_prim_op("abort", 1, prim_abort);

    // Conversion and files
    session.add_prim_op("__toString", 1, prim_to_string);
    session.add_prim_op("import", 1, prim_import);
}

// === Arithmetic ===

fn prim_add(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    Ok(Value::Int(s.force_int(&args[0])? + s.force_int(&args[1])?))
}

fn prim_sub(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    Ok(Value::Int(s.force_int(&args[0])? - s.force_int(&args[1])?))
}

fn prim_mul(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    Ok(Value::Int(s.force_int(&args[0])? * s.force_int(&args[1])?))
}

fn prim_div(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let num = s.force_int(&args[0])?;
    let denom = s.force_int(&args[1])?;
    if denom == 0 {
        return Err(EvalError::eval("division by zero"));
    }
    Ok(Value::Int(num / denom))
}

fn prim_less_than(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    Ok(Value::Bool(
        s.force_int(&args[0])? < s.force_int(&args[1])?,
    ))
}

// === Lists ===

fn prim_length(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    Ok(Value::Int(s.force_list(&args[0])?.len() as i64))
}

fn elem_at(s: &EvalSession, list: &ValueRef, index: i64) -> Result<Value, EvalError> {
    let elems = s.force_list(list)?;
    let slot = usize::try_from(index)
        .ok()
        .and_then(|i| elems.get(i).cloned())
        .ok_or_else(|| EvalError::eval(format!("list index {} is out of bounds", index)))?;
    s.force_value(&slot)?;
    let v = slot.borrow().clone();
    Ok(v)
}

fn prim_head(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    elem_at(s, &args[0], 0)
}

fn prim_tail(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let elems = s.force_list(&args[0])?;
    if elems.is_empty() {
        return Err(EvalError::eval("`tail' called on an empty list"));
    }
    Ok(Value::List(elems[1..].to_vec()))
}

fn prim_elem_at(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let index = s.force_int(&args[1])?;
    elem_at(s, &args[0], index)
}

// === Attribute sets ===

fn prim_attr_names(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let attrs = s.force_attrs(&args[0])?;
    let mut names: Vec<String> = attrs
        .borrow()
        .keys()
        .map(|sym| s.symbol_name(*sym))
        .collect();
    names.sort();
    Ok(Value::List(
        names
            .into_iter()
            .map(|n| s.alloc_value(Value::string_bare(n)))
            .collect(),
    ))
}

fn prim_get_attr(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let name = s.force_string_no_ctx(&args[0])?;
    let attrs = s.force_attrs(&args[1])?;
    let sym = s.intern(&name);
    let slot = attrs
        .borrow()
        .get(&sym)
        .cloned()
        .ok_or_else(|| EvalError::eval(format!("attribute `{}' missing", name)))?;
    s.force_value(&slot)?;
    let v = slot.borrow().clone();
    Ok(v)
}

fn prim_has_attr(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let name = s.force_string_no_ctx(&args[0])?;
    let attrs = s.force_attrs(&args[1])?;
    let sym = s.intern(&name);
    let present = attrs.borrow().contains_key(&sym);
    Ok(Value::Bool(present))
}

// === Type inspection ===

fn prim_is_null(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.force_value(&args[0])?;
    Ok(Value::Bool(matches!(&*args[0].borrow(), Value::Null)))
}

fn prim_type_of(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.force_value(&args[0])?;
    let name = match &*args[0].borrow() {
        Value::Int(_) => "int",
        Value::Bool(_) => "bool",
        Value::String { .. } => "string",
        Value::Path(_) => "path",
        Value::Null => "null",
        Value::Attrs(_) => "set",
        Value::List(_) => "list",
        Value::Lambda(_) | Value::PrimOp(_) | Value::PrimOpApp { .. } => "lambda",
        _ => unreachable!("typeOf on an unforced value"),
    };
    Ok(Value::string_bare(name))
}

fn prim_is_string(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.force_value(&args[0])?;
    Ok(Value::Bool(matches!(
        &*args[0].borrow(),
        Value::String { .. }
    )))
}

fn prim_is_int(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.force_value(&args[0])?;
    Ok(Value::Bool(matches!(&*args[0].borrow(), Value::Int(_))))
}

fn prim_is_bool(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.force_value(&args[0])?;
    Ok(Value::Bool(matches!(&*args[0].borrow(), Value::Bool(_))))
}

fn prim_is_list(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.force_value(&args[0])?;
    Ok(Value::Bool(matches!(&*args[0].borrow(), Value::List(_))))
}

fn prim_is_attrs(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.force_value(&args[0])?;
    Ok(Value::Bool(matches!(&*args[0].borrow(), Value::Attrs(_))))
}

fn prim_is_function(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.force_value(&args[0])?;
    Ok(Value::Bool(matches!(
        &*args[0].borrow(),
        Value::Lambda(_) | Value::PrimOp(_) | Value::PrimOpApp { .. }
    )))
}

// === Evaluation control ===

fn prim_seq(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.force_value(&args[0])?;
    s.force_value(&args[1])?;
    let v = args[1].borrow().clone();
    Ok(v)
}

fn prim_deep_seq(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    s.strict_force_value(&args[0])?;
    s.force_value(&args[1])?;
    let v = args[1].borrow().clone();
    Ok(v)
}

fn prim_throw(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let mut context = PathSet::new();
    let msg = s.coerce_to_string(&args[0], &mut context, false, false)?;
    Err(EvalError::eval(format!("user-thrown exception: {}", msg)))
}

fn prim_abort(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let mut context = PathSet::new();
    let msg = s.coerce_to_string(&args[0], &mut context, false, false)?;
    Err(EvalError::eval(format!(
        "evaluation aborted with the following error message: `{}'",
        msg
    )))
}

// === Conversion and files ===

fn prim_to_string(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let mut context = PathSet::new();
    let string = s.coerce_to_string(&args[0], &mut context, true, false)?;
    Ok(Value::String {
        s: Rc::new(string),
        context,
    })
}

fn prim_import(s: &EvalSession, args: &[ValueRef]) -> Result<Value, EvalError> {
    let mut context = PathSet::new();
    let path = s.coerce_to_path(&args[0], &mut context)?;
    let result = s.eval_file(Path::new(&path))?;
    s.force_value(&result)?;
    let v = result.borrow().clone();
    Ok(v)
}
