//! Integration tests for string/path coercion and store interaction.

use rill_eval::{EvalError, EvalSession, PathSet, Value, ValueRef};
use rill_store::LocalStore;
use std::path::Path;
use std::rc::Rc;

fn eval_in(session: &EvalSession, source: &str) -> Result<ValueRef, EvalError> {
    let expr = session.parse_str(source, Path::new("/test"))?;
    session.eval(&expr)
}

fn coerce(session: &EvalSession, source: &str) -> (String, PathSet) {
    let v = eval_in(session, source).unwrap_or_else(|e| panic!("`{source}` failed: {e}"));
    let mut context = PathSet::new();
    let s = session
        .coerce_to_string(&v, &mut context, true, false)
        .unwrap_or_else(|e| panic!("coercing `{source}` failed: {e}"));
    (s, context)
}

// ============================================================================
// Scalar and list coercions (coerce_more)
// ============================================================================

#[test]
fn scalars_coerce_shell_style() {
    let session = EvalSession::new();
    assert_eq!(coerce(&session, "true").0, "1");
    assert_eq!(coerce(&session, "false").0, "");
    assert_eq!(coerce(&session, "null").0, "");
    assert_eq!(coerce(&session, "42").0, "42");
}

#[test]
fn lists_coerce_space_joined() {
    let session = EvalSession::new();
    assert_eq!(coerce(&session, "[1 2 3]").0, "1 2 3");
    // No separator after an empty sub-list.
    assert_eq!(coerce(&session, "[1 [] 2]").0, "1 2");
    assert_eq!(coerce(&session, "[[] 1]").0, "1");
}

#[test]
fn to_string_builtin_uses_the_same_rules() {
    let session = EvalSession::new();
    let v = eval_in(&session, "__toString [true 7]").unwrap();
    assert_eq!(*session.force_string(&v).unwrap(), "1 7");
}

#[test]
fn functions_do_not_coerce() {
    let session = EvalSession::new();
    let v = eval_in(&session, "x: x").unwrap();
    let mut context = PathSet::new();
    let err = session
        .coerce_to_string(&v, &mut context, true, false)
        .unwrap_err();
    assert!(err.to_string().contains("cannot coerce"));
}

#[test]
fn without_coerce_more_scalars_are_rejected() {
    let session = EvalSession::new();
    let v = eval_in(&session, "42").unwrap();
    let mut context = PathSet::new();
    assert!(session
        .coerce_to_string(&v, &mut context, false, false)
        .is_err());
}

// ============================================================================
// Derivations
// ============================================================================

#[test]
fn derivations_coerce_to_their_output_path() {
    let session = EvalSession::new();
    let (s, context) = coerce(
        &session,
        r#"{ type = "derivation"; outPath = "/rill/store/x"; }"#,
    );
    assert_eq!(s, "/rill/store/x");
    assert!(context.contains("/rill/store/x"));
}

#[test]
fn plain_attribute_sets_do_not_coerce() {
    let session = EvalSession::new();
    let v = eval_in(&session, "{ a = 1; }").unwrap();
    let mut context = PathSet::new();
    let err = session
        .coerce_to_string(&v, &mut context, true, false)
        .unwrap_err();
    assert!(err.to_string().contains("except a derivation"));
}

#[test]
fn is_derivation_checks_the_type_attribute() {
    let session = EvalSession::new();
    let v = eval_in(
        &session,
        r#"{ type = "derivation"; outPath = "/rill/store/x"; }"#,
    )
    .unwrap();
    assert!(session.is_derivation(&v).unwrap());

    let v = eval_in(&session, r#"{ type = "package"; }"#).unwrap();
    assert!(!session.is_derivation(&v).unwrap());

    let v = eval_in(&session, "[1]").unwrap();
    assert!(!session.is_derivation(&v).unwrap());
}

// ============================================================================
// Paths
// ============================================================================

#[test]
fn path_concatenation_yields_a_canonical_path() {
    let session = EvalSession::new();
    let v = eval_in(&session, r#"./foo + "/bar""#).unwrap();
    match &*v.borrow() {
        Value::Path(p) => assert_eq!(**p, "/test/foo/bar"),
        other => panic!("expected a path, got {:?}", other),
    }

    let v = eval_in(&session, r#"./a/../b + "/c""#).unwrap();
    match &*v.borrow() {
        Value::Path(p) => assert_eq!(**p, "/test/b/c"),
        other => panic!("expected a path, got {:?}", other),
    };
}

#[test]
fn context_cannot_be_appended_to_a_path() {
    let err = eval_in(
        &EvalSession::new(),
        r#"./foo + "${ { type = "derivation"; outPath = "/rill/store/x"; } }""#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("cannot be appended to a path"));
}

#[test]
fn coerce_to_path_requires_an_absolute_result() {
    let session = EvalSession::new();
    let mut context = PathSet::new();

    let v = eval_in(&session, "/abs/dir").unwrap();
    assert_eq!(
        session.coerce_to_path(&v, &mut context).unwrap(),
        "/abs/dir"
    );

    let v = eval_in(&session, r#""relative/path""#).unwrap();
    let err = session.coerce_to_path(&v, &mut context).unwrap_err();
    assert!(err.to_string().contains("absolute path"));
}

#[test]
fn force_string_no_ctx_rejects_context() {
    let session = EvalSession::new();
    let v = eval_in(
        &session,
        r#""${ { type = "derivation"; outPath = "/rill/store/x"; } }""#,
    )
    .unwrap();
    let err = session.force_string_no_ctx(&v).unwrap_err();
    assert!(err.to_string().contains("not allowed to refer to a store path"));
}

// ============================================================================
// Copying sources into the store
// ============================================================================

fn session_with_store(root: &Path) -> EvalSession {
    EvalSession::with_store(Rc::new(LocalStore::new(root.to_path_buf())))
}

#[test]
fn interpolating_a_path_copies_it_to_the_store() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("src.txt"), b"source file").unwrap();
    let store_root = dir.path().join("store");

    let session = session_with_store(&store_root);
    let expr = session
        .parse_str(r#""prefix ${./src.txt} suffix""#, dir.path())
        .unwrap();
    let v = session.eval(&expr).unwrap();

    let mut context = PathSet::new();
    let s = session
        .coerce_to_string(&v, &mut context, false, false)
        .unwrap();

    assert_eq!(context.len(), 1);
    let store_path = context.iter().next().unwrap();
    assert!(store_path.starts_with(store_root.to_str().unwrap()));
    assert!(s.starts_with("prefix "));
    assert!(s.contains(store_path));
    assert_eq!(
        std::fs::read(Path::new(store_path)).unwrap(),
        b"source file"
    );
}

#[test]
fn interpolation_starting_with_a_path_stays_a_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("src.txt"), b"source file").unwrap();
    let store_root = dir.path().join("store");

    // The first element decides the kind, so this is path concatenation
    // and nothing is copied.
    let session = session_with_store(&store_root);
    let expr = session.parse_str(r#""${./src.txt}""#, dir.path()).unwrap();
    let v = session.eval(&expr).unwrap();
    assert!(matches!(&*v.borrow(), Value::Path(_)));
    assert!(!store_root.exists());
}

#[test]
fn read_only_mode_computes_without_copying() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("src.txt"), b"source file").unwrap();
    let store_root = dir.path().join("store");

    let mut session = session_with_store(&store_root);
    session.read_only = true;
    let expr = session.parse_str("./src.txt", dir.path()).unwrap();
    let v = session.eval(&expr).unwrap();

    let mut context = PathSet::new();
    let s = session
        .coerce_to_string(&v, &mut context, false, true)
        .unwrap();

    assert!(s.starts_with(store_root.to_str().unwrap()));
    assert!(context.contains(&s));
    // Nothing was copied.
    assert!(!store_root.exists());
}

#[test]
fn source_to_store_mapping_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("src.txt"), b"source file").unwrap();

    let session = session_with_store(&dir.path().join("store"));
    let expr = session.parse_str("./src.txt", dir.path()).unwrap();

    let mut coerce_once = || {
        let v = session.eval(&expr).unwrap();
        let mut context = PathSet::new();
        session
            .coerce_to_string(&v, &mut context, false, true)
            .unwrap()
    };
    let first = coerce_once();
    // Change the source; the session-local cache keeps the original
    // mapping for the rest of the session.
    std::fs::write(dir.path().join("src.txt"), b"changed").unwrap();
    let second = coerce_once();
    assert_eq!(first, second);
}

#[test]
fn derivation_files_may_not_be_copied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("evil.drv"), b"contents").unwrap();

    let session = session_with_store(&dir.path().join("store"));
    let expr = session
        .parse_str(r#""drv: ${./evil.drv}""#, dir.path())
        .unwrap();
    let err = session.eval(&expr).unwrap_err();
    assert!(err.to_string().contains("not allowed to end in"));
}
