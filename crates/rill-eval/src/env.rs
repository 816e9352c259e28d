//! Evaluation environments.
//!
//! Environments form a parent-linked chain rooted at the base environment
//! that holds the built-ins. A frame created by `with` carries the
//! attribute set under a reserved symbol; name resolution falls back to
//! those sets after the lexical chain is exhausted.

use crate::value::{AttrsRef, Bindings, Value, ValueRef};
use rill_common::Symbol;
use std::cell::RefCell;
use std::rc::Rc;

/// One environment frame.
pub struct Env {
    /// Parent frame, absent only for the base environment.
    pub up: Option<Rc<Env>>,
    /// Bindings of this frame. A recursive attribute set value aliases
    /// this map, which is what lets its thunks see their siblings.
    pub bindings: AttrsRef,
}

impl Env {
    /// Create the root frame.
    pub fn root() -> Rc<Env> {
        Rc::new(Env {
            up: None,
            bindings: Rc::new(RefCell::new(Bindings::new())),
        })
    }

    /// Create a child frame.
    pub fn child(parent: &Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            up: Some(parent.clone()),
            bindings: Rc::new(RefCell::new(Bindings::new())),
        })
    }
}

/// Resolve a variable.
///
/// First the lexical chain is searched for a direct binding. Failing that,
/// the `with` attribute sets on the chain are consulted, the OUTERMOST
/// `with` first, so `with {x=1;}; with {x=2;}; x` is `1`: an inner `with`
/// never shadows a name an outer one introduced.
pub fn lookup_var(env: &Rc<Env>, name: Symbol, s_with: Symbol) -> Option<ValueRef> {
    let mut frame = Some(env);
    while let Some(e) = frame {
        if let Some(slot) = e.bindings.borrow().get(&name) {
            return Some(slot.clone());
        }
        frame = e.up.as_ref();
    }

    lookup_with(env, name, s_with)
}

fn lookup_with(env: &Env, name: Symbol, s_with: Symbol) -> Option<ValueRef> {
    if let Some(up) = &env.up {
        if let Some(slot) = lookup_with(up, name, s_with) {
            return Some(slot);
        }
    }
    let bindings = env.bindings.borrow();
    let with_attrs = bindings.get(&s_with)?;
    // The `with` slot is forced to an attribute set when the frame is built.
    let result = match &*with_attrs.borrow() {
        Value::Attrs(attrs) => attrs.borrow().get(&name).cloned(),
        _ => None,
    };
    result
}
