//! Integration tests for the rill evaluator.
//!
//! Covers laziness, scoping, recursion, the operators, function
//! application, and the end-to-end behavior of small programs.

use rill_eval::{EvalError, EvalErrorKind, EvalSession, Value, ValueRef};
use std::path::Path;

fn eval_in(session: &EvalSession, source: &str) -> Result<ValueRef, EvalError> {
    let expr = session.parse_str(source, Path::new("/test"))?;
    session.eval(&expr)
}

fn eval_source(source: &str) -> Result<ValueRef, EvalError> {
    eval_in(&EvalSession::new(), source)
}

fn eval_int(source: &str) -> i64 {
    let session = EvalSession::new();
    let v = eval_in(&session, source).unwrap_or_else(|e| panic!("`{source}` failed: {e}"));
    session
        .force_int(&v)
        .unwrap_or_else(|e| panic!("`{source}` is not an integer: {e}"))
}

fn eval_bool(source: &str) -> bool {
    let session = EvalSession::new();
    let v = eval_in(&session, source).unwrap_or_else(|e| panic!("`{source}` failed: {e}"));
    session.force_bool(&v).unwrap()
}

fn eval_string(source: &str) -> String {
    let session = EvalSession::new();
    let v = eval_in(&session, source).unwrap_or_else(|e| panic!("`{source}` failed: {e}"));
    (*session.force_string(&v).unwrap()).clone()
}

// ============================================================================
// Laziness and forcing
// ============================================================================

#[test]
fn forcing_is_idempotent() {
    let session = EvalSession::new();
    let set = eval_in(&session, "{ a = 1; }").unwrap();
    let attrs = session.force_attrs(&set).unwrap();
    let slot = attrs
        .borrow()
        .get(&session.intern("a"))
        .cloned()
        .unwrap();

    session.force_value(&slot).unwrap();
    assert!(matches!(&*slot.borrow(), Value::Int(1)));
    session.force_value(&slot).unwrap();
    assert!(matches!(&*slot.borrow(), Value::Int(1)));
}

#[test]
fn unselected_attributes_stay_unevaluated() {
    assert_eq!(eval_int(r#"({ a = throw "boom"; b = 1; }).b"#), 1);
}

#[test]
fn unselected_list_elements_stay_unevaluated() {
    assert_eq!(eval_int(r#"__length [ (throw "boom") 1 ]"#), 2);
    assert_eq!(eval_int(r#"__elemAt [ (throw "boom") 1 ] 1"#), 1);
}

#[test]
fn thunks_are_memoized_across_shared_references() {
    // The same thunk selected through two names forces once; a second
    // force of an already-forced slot is a no-op either way.
    assert_eq!(eval_int("let a = __add 1 1; b = a; in __add a b"), 4);
}

#[test]
fn self_reference_is_detected() {
    let err = eval_source("let x = x; in x").unwrap_err();
    assert!(matches!(err.kind(), EvalErrorKind::InfiniteRecursion));
}

#[test]
fn mutual_recursion_is_detected() {
    let err = eval_source("let a = b; b = a; in a").unwrap_err();
    assert!(matches!(err.kind(), EvalErrorKind::InfiniteRecursion));
}

// ============================================================================
// Name resolution
// ============================================================================

#[test]
fn outer_with_takes_precedence() {
    assert_eq!(eval_int("with { x = 1; }; with { x = 2; }; x"), 1);
}

#[test]
fn lexical_bindings_shadow_with() {
    assert_eq!(eval_int("let x = 1; in with { x = 2; }; x"), 1);
}

#[test]
fn with_provides_missing_names() {
    assert_eq!(eval_int("with { a = { b = 42; }; }; a.b"), 42);
    assert_eq!(eval_int("with { x = 1; }; with { y = 2; }; __add x y"), 3);
}

#[test]
fn undefined_variable_is_reported() {
    let err = eval_source("nosuchvariable").unwrap_err();
    assert!(matches!(
        err.kind(),
        EvalErrorKind::UndefinedVariable(name) if name == "nosuchvariable"
    ));
}

// ============================================================================
// Recursive attribute sets
// ============================================================================

#[test]
fn recursive_bindings_see_their_siblings() {
    assert_eq!(eval_int("(rec { a = 1; b = a + 1; }).b"), 2);
    assert_eq!(eval_int("(rec { a = b; b = 1; }).a"), 1);
    assert_eq!(eval_int("(rec { x = y; y = 3; }).x"), 3);
}

#[test]
fn inherit_in_rec_uses_the_outer_scope() {
    assert_eq!(eval_int("let a = 5; in (rec { inherit a; b = a; }).b"), 5);
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn integer_addition() {
    assert_eq!(eval_int("1 + 1"), 2);
    assert_eq!(eval_int("__add 1 1"), 2);
    assert_eq!(eval_int("1 + 2 + 3"), 6);
}

#[test]
fn update_overrides_key_for_key() {
    assert!(eval_bool(
        "({ a = 1; b = 2; } // { b = 3; c = 4; }) == { a = 1; b = 3; c = 4; }"
    ));
    assert!(eval_bool("({ a = 1; } // { a = 2; b = 3; }) == { a = 2; b = 3; }"));
}

#[test]
fn update_keeps_left_thunks_shared() {
    assert_eq!(
        eval_int(r#"(({ a = throw "boom"; b = 7; } // { a = 1; })).b"#),
        7
    );
}

#[test]
fn has_attr_does_not_force() {
    assert!(eval_bool(r#"{ x = throw "boom"; } ? x"#));
    assert!(!eval_bool("{ } ? x"));
}

#[test]
fn list_concatenation_is_shallow() {
    let session = EvalSession::new();
    let v = eval_in(&session, "[1 2 3] ++ [4]").unwrap();
    session.strict_force_value(&v).unwrap();
    let elems = session.force_list(&v).unwrap();
    assert_eq!(elems.len(), 4);
    for (i, elem) in elems.iter().enumerate() {
        assert!(matches!(&*elem.borrow(), Value::Int(n) if *n == i as i64 + 1));
    }
    // Laziness survives concatenation.
    assert_eq!(eval_int(r#"__length ([ (throw "a") ] ++ [ (throw "b") ])"#), 2);
}

#[test]
fn boolean_operators_short_circuit() {
    assert!(!eval_bool(r#"false && throw "no""#));
    assert!(eval_bool(r#"true || throw "no""#));
    assert!(eval_bool(r#"false -> throw "no""#));
    assert!(eval_bool("true -> true"));
    assert!(!eval_bool("!true"));
}

#[test]
fn conditionals_select_one_branch() {
    assert_eq!(eval_string(r#"if true then "a" else throw "no""#), "a");
    assert_eq!(eval_int(r#"if false then throw "no" else 3"#), 3);
}

#[test]
fn assertions() {
    assert_eq!(eval_int("assert true; 1"), 1);
    let err = eval_source("assert false; 1").unwrap_err();
    assert!(matches!(err.kind(), EvalErrorKind::Assertion(_)));
}

// ============================================================================
// Equality
// ============================================================================

#[test]
fn structural_equality() {
    assert!(eval_bool("1 == 1"));
    assert!(eval_bool("1 != 2"));
    assert!(eval_bool("null == null"));
    assert!(eval_bool("[1 [2]] == [1 [2]]"));
    assert!(!eval_bool("[1] == [1 2]"));
    assert!(eval_bool(r#"{ a = 1; b = "x"; } == { b = "x"; a = 1; }"#));
    assert!(!eval_bool("{ a = 1; } == { b = 1; }"));
    assert!(!eval_bool(r#"1 == "1""#));
}

#[test]
fn equality_forces_both_sides() {
    assert!(eval_bool("let x = { a = __add 1 1; }; in x == { a = 2; }"));
}

#[test]
fn functions_are_never_equal() {
    assert!(!eval_bool("(x: x) == (x: x)"));
    assert!(!eval_bool("let f = x: x; in f == f"));
    assert!(!eval_bool("__add == __add"));
}

#[test]
fn string_equality_ignores_context() {
    // The right-hand string carries the derivation's output path in its
    // context; equality compares bytes only.
    assert!(eval_bool(
        r#""/rill/store/x" == "${ { type = "derivation"; outPath = "/rill/store/x"; } }""#
    ));
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn positional_parameters_are_lazy() {
    assert_eq!(eval_int(r#"(x: 1) (throw "boom")"#), 1);
}

#[test]
fn attrs_pattern_with_defaults() {
    assert_eq!(eval_int("let f = { x, y ? x + 1 }: y; in f { x = 10; }"), 11);
    assert_eq!(eval_int("let f = { x, y ? x + 1 }: y; in f { x = 1; y = 5; }"), 5);
}

#[test]
fn ellipsis_tolerates_extra_attributes() {
    assert_eq!(eval_int("let f = { x, ... }: x; in f { x = 1; y = 2; }"), 1);
}

#[test]
fn extra_attributes_are_rejected_without_ellipsis() {
    let err = eval_source("({ x }: x) { x = 1; y = 2; }").unwrap_err();
    assert!(matches!(err.kind(), EvalErrorKind::Type(_)));
    assert!(err.to_string().contains("unexpected argument"));
}

#[test]
fn missing_attributes_are_rejected() {
    let err = eval_source("({ x, y }: y) { x = 1; }").unwrap_err();
    assert!(matches!(err.kind(), EvalErrorKind::Type(_)));
    assert!(err.to_string().contains("`y'"));
}

#[test]
fn alias_binds_the_whole_argument() {
    assert_eq!(eval_int("(args @ { x, ... }: args.y) { x = 1; y = 5; }"), 5);
    assert_eq!(eval_int("({ x, ... } @ args: args.y) { x = 1; y = 5; }"), 5);
}

#[test]
fn calling_a_non_function_fails() {
    let err = eval_source("1 2").unwrap_err();
    assert!(matches!(err.kind(), EvalErrorKind::Type(_)));
    assert!(err.to_string().contains("neither a function nor a primop"));
}

#[test]
fn curried_primops() {
    assert_eq!(eval_int("__sub 10 4"), 6);
    assert_eq!(eval_int("(__sub 10) 4"), 6);
    assert_eq!(eval_int("let f = __sub 10; in __add (f 1) (f 2)"), 17);

    let session = EvalSession::new();
    let partial = eval_in(&session, "__sub 10").unwrap();
    assert!(matches!(
        &*partial.borrow(),
        Value::PrimOpApp { args_left: 1, .. }
    ));
}

// ============================================================================
// Built-ins
// ============================================================================

#[test]
fn builtins_are_mirrored() {
    assert_eq!(eval_int("builtins.add 1 2"), 3);
    assert_eq!(eval_int("builtins.builtins.add 1 2"), 3);
    assert!(eval_bool("__isNull null"));
    assert!(eval_bool("isNull null"));
    assert!(!eval_bool("builtins.isNull 1"));
    assert_eq!(eval_string(r#"builtins.typeOf "x""#), "string");
    assert_eq!(eval_string("__typeOf { }"), "set");
    assert_eq!(eval_string("builtins.typeOf (x: x)"), "lambda");
}

#[test]
fn list_builtins() {
    assert_eq!(eval_int("__head [7 8]"), 7);
    assert!(eval_bool("__tail [7 8] == [8]"));
    let err = eval_source("__elemAt [1] 5").unwrap_err();
    assert!(err.to_string().contains("out of bounds"));
}

#[test]
fn attr_builtins() {
    assert!(eval_bool(r#"__attrNames { b = 1; a = 2; } == ["a" "b"]"#));
    assert_eq!(eval_int(r#"__getAttr "a" { a = 3; }"#), 3);
    assert!(eval_bool(r#"__hasAttr "a" { a = 3; }"#));
}

#[test]
fn seq_forces_its_first_argument() {
    assert_eq!(eval_int("__seq 1 2"), 2);
    assert!(eval_source(r#"__seq (throw "no") 1"#).is_err());
    // Shallow seq does not reach into attribute values.
    assert_eq!(eval_int(r#"__seq { a = throw "no"; } 1"#), 1);
    assert!(eval_source(r#"__deepSeq { a = throw "no"; } 1"#).is_err());
}

#[test]
fn throw_and_abort_carry_their_message() {
    let err = eval_source(r#"throw "bad thing""#).unwrap_err();
    assert!(err.to_string().contains("bad thing"));
    let err = eval_source(r#"abort "stop here""#).unwrap_err();
    assert!(err.to_string().contains("stop here"));
}

#[test]
fn import_evaluates_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("lib.rill");
    std::fs::write(&file, "rec { answer = 42; double = x: x + x; }").unwrap();

    let session = EvalSession::new();
    let source = format!("(import {}).answer", file.display());
    let v = eval_in(&session, &source).unwrap();
    assert_eq!(session.force_int(&v).unwrap(), 42);

    let source = format!("(import {}).double 21", file.display());
    let v = eval_in(&session, &source).unwrap();
    assert_eq!(session.force_int(&v).unwrap(), 42);
}

// ============================================================================
// Strings and interpolation
// ============================================================================

#[test]
fn string_interpolation() {
    assert_eq!(eval_string(r#""a${"b"}c""#), "abc");
    assert_eq!(eval_string(r#"let x = "mid"; in "a ${x} c""#), "a mid c");
}

#[test]
fn select_error_carries_the_attribute_prefix() {
    let err = eval_source(r#"{ a = throw "inner"; }.a"#).unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains("while evaluating the attribute `a'"),
        "missing prefix: {message}"
    );
    assert!(message.contains("inner"));
}

#[test]
fn missing_attribute_is_reported() {
    let err = eval_source("{ a = 1; }.b").unwrap_err();
    assert!(err.to_string().contains("attribute `b' missing"));
}

// ============================================================================
// Printing
// ============================================================================

#[test]
fn values_print_in_source_syntax() {
    let session = EvalSession::new();

    let v = eval_in(&session, "null").unwrap();
    assert_eq!(session.show_value(&v), "null");

    let v = eval_in(&session, r#""quote \" slash \\""#).unwrap();
    assert_eq!(session.show_value(&v), r#""quote \" slash \\""#);

    let v = eval_in(&session, "{ a = 1; b = [ true ]; }").unwrap();
    session.strict_force_value(&v).unwrap();
    assert_eq!(session.show_value(&v), "{ a = 1; b = [ true ]; }");

    let v = eval_in(&session, "x: x").unwrap();
    assert_eq!(session.show_value(&v), "<lambda>");
}
