//! String and path coercion.
//!
//! This is where the pure language touches the object store: coercing a
//! path into a string copies it into the store and records the resulting
//! store path in the string's context.

use crate::error::EvalError;
use crate::eval::EvalSession;
use crate::value::{show_type, PathSet, Value, ValueRef};
use log::debug;
use rill_common::canon_path;
use rill_store::DRV_EXTENSION;
use std::path::Path;

impl EvalSession {
    /// Coerce a value to a string, merging any store paths it refers to
    /// into `context`.
    ///
    /// `coerce_more` additionally admits booleans, integers, null and
    /// lists (shell-friendly: `true` is `"1"`, `false` and `null` are
    /// empty). `copy_to_store` controls whether paths are copied into the
    /// store or returned as-is.
    pub fn coerce_to_string(
        &self,
        v: &ValueRef,
        context: &mut PathSet,
        coerce_more: bool,
        copy_to_store: bool,
    ) -> Result<String, EvalError> {
        self.force_value(v)?;
        let value = v.borrow().clone();

        match value {
            Value::String { s, context: ctx } => {
                context.extend(ctx.iter().cloned());
                Ok((*s).clone())
            }

            Value::Path(p) => {
                let path = canon_path(&p);
                if !copy_to_store {
                    return Ok(path);
                }

                if path.ends_with(DRV_EXTENSION) {
                    return Err(EvalError::eval(format!(
                        "file names are not allowed to end in `{}'",
                        DRV_EXTENSION
                    )));
                }

                if let Some(dst) = self.src_to_store.borrow().get(&path).cloned() {
                    context.insert(dst.clone());
                    return Ok(dst);
                }

                let dst = if self.read_only {
                    self.store.compute_store_path(Path::new(&path))?.0
                } else {
                    self.store.add_to_store(Path::new(&path))?
                };
                let dst = dst.display().to_string();
                self.src_to_store
                    .borrow_mut()
                    .insert(path.clone(), dst.clone());
                debug!("copied source `{}' -> `{}'", path, dst);

                context.insert(dst.clone());
                Ok(dst)
            }

            // A derivation stringifies to its output path, and the result
            // is recorded as a dependency of the string being built.
            Value::Attrs(attrs) => {
                let slot = attrs.borrow().get(&self.s_out_path).cloned();
                match slot {
                    Some(slot) => {
                        let out =
                            self.coerce_to_string(&slot, context, coerce_more, copy_to_store)?;
                        if self.is_derivation(v)? {
                            context.insert(out.clone());
                        }
                        Ok(out)
                    }
                    None => Err(EvalError::type_error(
                        "cannot coerce an attribute set (except a derivation) to a string",
                    )),
                }
            }

            Value::Bool(true) if coerce_more => Ok("1".to_string()),
            Value::Bool(false) if coerce_more => Ok(String::new()),
            Value::Int(n) if coerce_more => Ok(n.to_string()),
            Value::Null if coerce_more => Ok(String::new()),

            Value::List(elems) if coerce_more => {
                let mut result = String::new();
                for (n, elem) in elems.iter().enumerate() {
                    result.push_str(&self.coerce_to_string(
                        elem,
                        context,
                        coerce_more,
                        copy_to_store,
                    )?);
                    // No separator after an empty sub-list.
                    let elem_is_empty_list =
                        matches!(&*elem.borrow(), Value::List(l) if l.is_empty());
                    if n + 1 < elems.len() && !elem_is_empty_list {
                        result.push(' ');
                    }
                }
                Ok(result)
            }

            other => Err(EvalError::type_error(format!(
                "cannot coerce {} to a string",
                show_type(&other)
            ))),
        }
    }

    /// Coerce a value to an absolute path string (never copying to the
    /// store).
    pub fn coerce_to_path(
        &self,
        v: &ValueRef,
        context: &mut PathSet,
    ) -> Result<String, EvalError> {
        let path = self.coerce_to_string(v, context, false, false)?;
        if !path.starts_with('/') {
            return Err(EvalError::eval(format!(
                "string `{}' doesn't represent an absolute path",
                path
            )));
        }
        Ok(path)
    }

    /// Whether a value is a derivation: an attribute set whose `type`
    /// attribute is the context-free string `"derivation"`.
    pub fn is_derivation(&self, v: &ValueRef) -> Result<bool, EvalError> {
        self.force_value(v)?;
        let slot = match &*v.borrow() {
            Value::Attrs(attrs) => attrs.borrow().get(&self.s_type).cloned(),
            _ => return Ok(false),
        };
        match slot {
            Some(slot) => Ok(*self.force_string_no_ctx(&slot)? == "derivation"),
            None => Ok(false),
        }
    }
}
