//! The single-cell reference primitive.
//!
//! Grounded on `sycamore-reactive`'s `Signal`/`ReadSignal` (`signals.rs`):
//! `get()`/`track()` push the active effect into the cell's own dependency
//! set, `set()` compares against the previous value before triggering. Unlike
//! a `sycamore` signal, whose `get`/`set` close over a `NodeId` into the
//! global arena, a `Cell` here owns its value and its dependency set
//! directly — there's no arena to look it up in.

use std::cell::RefCell;
use std::rc::Rc;

use crate::graph::{self, DepSet, TrackEvent, TrackOp, TriggerEvent, TriggerOp};
use crate::value::{self, Value};

struct CellInner {
    value: RefCell<Value>,
    dep_set: DepSet,
}

/// A reactive reference to a single value.
///
/// A cell read or written through an aggregate's property is auto-unwrapped;
/// reading a top-level `Cell` handle directly always requires the explicit
/// `.get()`/`.set()` calls below.
#[derive(Clone)]
pub struct Cell {
    inner: Rc<CellInner>,
}

impl Cell {
    pub(crate) fn target_ptr_eq(&self, other: &Cell) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn get(&self) -> Value {
        graph::track(
            &self.inner.dep_set,
            TrackEvent { op: TrackOp::Get, key: "value".into(), target: graph::target_id(&self.inner) },
        );
        self.inner.value.borrow().clone()
    }

    /// Reads the value without subscribing the currently active effect.
    pub fn peek(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    pub fn set(&self, new_value: impl Into<Value>) {
        let new_value = new_value.into();
        let changed = {
            let current = self.inner.value.borrow();
            !value::reactive_eq(&current, &new_value)
        };
        if !changed {
            return;
        }
        let old_value = self.inner.value.replace(value::deep_wrap(new_value.clone()));
        graph::trigger(
            [self.inner.dep_set.clone()],
            TriggerEvent {
                op: TriggerOp::Set,
                key: "value".into(),
                target: graph::target_id(&self.inner),
                new_value: Some(new_value),
                old_value: Some(old_value),
                old_target: None,
            },
        );
    }

    /// Reads, mutates in place via `f`, and triggers only if the result
    /// differs from the previous value.
    pub fn update(&self, f: impl FnOnce(&mut Value)) {
        let mut next = self.inner.value.borrow().clone();
        f(&mut next);
        self.set(next);
    }
}

/// Creates a new cell holding `value`.
pub fn cell(value: impl Into<Value>) -> Cell {
    Cell {
        inner: Rc::new(CellInner {
            value: RefCell::new(value.into()),
            dep_set: graph::new_dep_set(),
        }),
    }
}

/// Returns whether `value` is a [`Cell`].
pub fn is_cell(value: &Value) -> bool {
    value.is_cell()
}

/// If `value` is a [`Cell`], reads through it; otherwise returns `value`
/// itself.
pub fn unwrap(value: &Value) -> Value {
    match value {
        Value::Cell(c) => c.get(),
        other => other.clone(),
    }
}
