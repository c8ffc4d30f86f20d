//! Observable ordered sequences.
//!
//! An index behaves like a `ReactiveMap` key with one extra wrinkle: the
//! sequence's `length` is itself an observable slot that both `Push`/`Pop`
//! and an explicit length change notify, and the three search methods
//! (`includes`/`index_of`/`last_index_of`) have to read through *every*
//! index (not just the one that happens to match) so that an effect that
//! called `includes` reruns when an element is added anywhere, not only when
//! the matching element's own slot changes. Grounded on the same
//! `sycamore-reactive` `signals.rs` track/trigger shape as
//! [`crate::reactive_map`], generalized to a `Vec`-backed, index-keyed
//! target.

use std::cell::{Cell as StdCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::graph::{self, DepSet, TrackEvent, TrackOp, TriggerEvent, TriggerOp};
use crate::value::{self, Value};

struct RawList {
    data: RefCell<Vec<Value>>,
    index_deps: RefCell<HashMap<usize, DepSet>>,
    length_dep: DepSet,
    skip: StdCell<bool>,
}

impl RawList {
    fn dep_for_index(&self, index: usize) -> DepSet {
        self.index_deps.borrow_mut().entry(index).or_insert_with(graph::new_dep_set).clone()
    }
}

fn new_target() -> Rc<RawList> {
    Rc::new(RawList {
        data: RefCell::new(Vec::new()),
        index_deps: RefCell::new(HashMap::new()),
        length_dep: graph::new_dep_set(),
        skip: StdCell::new(false),
    })
}

/// A handle onto an observable ordered sequence. See [`crate::reactive_map`]
/// for the shared wrapper-mode conventions (`reactive`/`readonly`/
/// `shallow_*`, `as_reactive`/`as_readonly`, `to_raw`, `mark_raw`).
#[derive(Clone)]
pub struct ReactiveList {
    target: Rc<RawList>,
    readonly: bool,
    shallow: bool,
}

impl PartialEq for ReactiveList {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.target, &other.target)
            && self.readonly == other.readonly
            && self.shallow == other.shallow
    }
}

#[derive(Clone)]
pub struct RawListHandle {
    target: Rc<RawList>,
}

impl PartialEq for RawListHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.target, &other.target)
    }
}

impl std::fmt::Debug for RawListHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawListHandle({:p})", Rc::as_ptr(&self.target))
    }
}

impl RawListHandle {
    pub fn get(&self, index: usize) -> Option<Value> {
        self.target.data.borrow().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.target.data.borrow().clone()
    }
}

impl ReactiveList {
    pub fn reactive() -> Self {
        Self { target: new_target(), readonly: false, shallow: false }
    }

    pub fn readonly() -> Self {
        Self { target: new_target(), readonly: true, shallow: false }
    }

    pub fn shallow_reactive() -> Self {
        Self { target: new_target(), readonly: false, shallow: true }
    }

    pub fn shallow_readonly() -> Self {
        Self { target: new_target(), readonly: true, shallow: true }
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let list = Self::reactive();
        *list.target.data.borrow_mut() = values.into_iter().collect();
        list
    }

    pub fn is_reactive(&self) -> bool {
        !self.readonly
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.shallow
    }

    pub fn as_reactive(&self) -> Self {
        Self { target: self.target.clone(), readonly: false, shallow: self.shallow }
    }

    pub fn as_readonly(&self) -> Self {
        Self { target: self.target.clone(), readonly: true, shallow: self.shallow }
    }

    pub(crate) fn target_ptr_eq(&self, other: &ReactiveList) -> bool {
        Rc::ptr_eq(&self.target, &other.target)
    }

    pub fn to_raw(&self) -> RawListHandle {
        RawListHandle { target: self.target.clone() }
    }

    pub fn mark_raw(&self) {
        self.target.skip.set(true);
    }

    pub fn is_marked_raw(&self) -> bool {
        self.target.skip.get()
    }

    /// Reads the sequence's length, subscribing the active effect to future
    /// length changes (push/pop/splice/explicit `set_len`).
    pub fn len(&self) -> usize {
        if !self.readonly && !self.target.skip.get() {
            graph::track(
                &self.target.length_dep,
                TrackEvent { op: TrackOp::Get, key: "length".into(), target: graph::target_id(&self.target) },
            );
        }
        self.target.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        if self.target.skip.get() {
            return self.target.data.borrow().get(index).cloned();
        }
        if !self.readonly {
            graph::track(
                &self.target.dep_for_index(index),
                TrackEvent { op: TrackOp::Get, key: index.to_string(), target: graph::target_id(&self.target) },
            );
        }
        let raw = self.target.data.borrow().get(index).cloned()?;
        if self.shallow {
            return Some(raw);
        }
        Some(match raw {
            // Unlike a map key, an index never auto-unwraps a stored cell —
            // an ordered sequence only unwraps through the element's own
            // explicit `.get()`.
            Value::Map(m) if self.readonly => Value::Map(m.as_readonly()),
            Value::List(l) if self.readonly => Value::List(l.as_readonly()),
            other => other,
        })
    }

    /// Returns a snapshot of the whole sequence, subscribing to every
    /// element's slot plus `length` — reading the sequence this way is what
    /// backs [`ReactiveList::includes`]/[`ReactiveList::index_of`].
    pub fn snapshot(&self) -> Vec<Value> {
        let len = self.len();
        (0..len).map(|i| self.get(i).unwrap_or(Value::Null)).collect()
    }

    /// Mirrors the source model's instrumented `Array.prototype.includes`: a
    /// tracked scan first, falling back to a raw (untracked) scan against
    /// the same values if the tracked pass reports no match (matching how
    /// instrumented array search methods behave).
    pub fn includes(&self, needle: &Value) -> bool {
        if self.snapshot().iter().any(|v| value::reactive_eq(v, needle)) {
            return true;
        }
        self.target.data.borrow().iter().any(|v| value::reactive_eq(v, needle))
    }

    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        let snap = self.snapshot();
        snap.iter()
            .position(|v| value::reactive_eq(v, needle))
            .or_else(|| self.target.data.borrow().iter().position(|v| value::reactive_eq(v, needle)))
    }

    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        let snap = self.snapshot();
        snap.iter()
            .rposition(|v| value::reactive_eq(v, needle))
            .or_else(|| self.target.data.borrow().iter().rposition(|v| value::reactive_eq(v, needle)))
    }

    /// Sets the element at `index`, extending the sequence with `Null`
    /// padding if `index` is beyond the current length (an implicit
    /// `Add` that also triggers `length`). Returns `false` without writing
    /// anything if this wrapper is read-only.
    pub fn set(&self, index: usize, new_value: impl Into<Value>) -> bool {
        if self.readonly {
            #[cfg(debug_assertions)]
            crate::warn_debug(&format!("set operation on index {index} failed: target is readonly"));
            return false;
        }
        let new_value = new_value.into();
        let old_len = self.target.data.borrow().len();
        let existed = index < old_len;
        let old_value = if existed { self.target.data.borrow().get(index).cloned() } else { None };

        if self.target.skip.get() {
            if existed {
                self.target.data.borrow_mut()[index] = new_value;
            } else {
                let mut data = self.target.data.borrow_mut();
                while data.len() < index {
                    data.push(Value::Null);
                }
                data.push(new_value);
            }
            return true;
        }

        // Unlike `ReactiveMap::set`, a sequence element never writes through
        // an existing cell at that index — the slot itself is replaced, the
        // way Vue's array set trap skips the ref-unwrapping assignment for
        // `isArray(target)` targets.

        if existed {
            self.target.data.borrow_mut()[index] = value::deep_wrap(new_value.clone());
        } else {
            let mut data = self.target.data.borrow_mut();
            while data.len() < index {
                data.push(Value::Null);
            }
            data.push(value::deep_wrap(new_value.clone()));
        }

        if !existed {
            graph::trigger(
                [self.target.dep_for_index(index)],
                TriggerEvent {
                    op: TriggerOp::Add,
                    key: index.to_string(),
                    target: graph::target_id(&self.target),
                    new_value: Some(new_value.clone()),
                    old_value: None,
                    old_target: None,
                },
            );
            graph::trigger(
                [self.target.length_dep.clone()],
                TriggerEvent {
                    op: TriggerOp::Add,
                    key: "length".into(),
                    target: graph::target_id(&self.target),
                    new_value: Some(Value::Int(self.target.data.borrow().len() as i64)),
                    old_value: Some(Value::Int(old_len as i64)),
                    old_target: None,
                },
            );
        } else {
            let changed = old_value.as_ref().map(|old| !value::reactive_eq(old, &new_value)).unwrap_or(true);
            if changed {
                graph::trigger(
                    [self.target.dep_for_index(index)],
                    TriggerEvent {
                        op: TriggerOp::Set,
                        key: index.to_string(),
                        target: graph::target_id(&self.target),
                        new_value: Some(new_value),
                        old_value,
                        old_target: None,
                    },
                );
            }
        }
        true
    }

    pub fn push(&self, value: impl Into<Value>) -> bool {
        let idx = self.target.data.borrow().len();
        self.set(idx, value)
    }

    /// Removes and returns the last element, triggering that index's dep set
    /// and `length`.
    pub fn pop(&self) -> Option<Value> {
        if self.readonly {
            #[cfg(debug_assertions)]
            crate::warn_debug("pop operation failed: target is readonly");
            return None;
        }
        let idx = {
            let data = self.target.data.borrow();
            data.len().checked_sub(1)?
        };
        let old = self.target.data.borrow_mut().remove(idx);
        if self.target.skip.get() {
            return Some(old);
        }
        graph::trigger(
            [self.target.dep_for_index(idx)],
            TriggerEvent {
                op: TriggerOp::Delete,
                key: idx.to_string(),
                target: graph::target_id(&self.target),
                new_value: None,
                old_value: Some(old.clone()),
                old_target: None,
            },
        );
        graph::trigger(
            [self.target.length_dep.clone()],
            TriggerEvent {
                op: TriggerOp::Delete,
                key: "length".into(),
                target: graph::target_id(&self.target),
                new_value: Some(Value::Int(idx as i64)),
                old_value: Some(Value::Int(idx as i64 + 1)),
                old_target: None,
            },
        );
        Some(old)
    }

    /// Removes `delete_count` elements starting at `start` and inserts
    /// `replace_with` in their place, returning the removed elements.
    /// Invalidates every index from `start` through whichever of the old or
    /// new length is longer, plus `length` — a splice can reshuffle every
    /// later index, so per-index precision isn't worth the bookkeeping.
    pub fn splice(&self, start: usize, delete_count: usize, replace_with: Vec<Value>) -> Vec<Value> {
        if self.readonly {
            #[cfg(debug_assertions)]
            crate::warn_debug("splice operation failed: target is readonly");
            return Vec::new();
        }
        let old_len = self.target.data.borrow().len();
        let start = start.min(old_len);
        let delete_count = delete_count.min(old_len - start);
        let removed: Vec<Value> = {
            let mut data = self.target.data.borrow_mut();
            data.splice(start..start + delete_count, replace_with.into_iter().map(value::deep_wrap)).collect()
        };
        let new_len = self.target.data.borrow().len();
        if self.target.skip.get() {
            return removed;
        }
        let touched_end = old_len.max(new_len);

        let mut deps: Vec<DepSet> = (start..touched_end).map(|i| self.target.dep_for_index(i)).collect();
        deps.push(self.target.length_dep.clone());

        let op = match new_len.cmp(&old_len) {
            std::cmp::Ordering::Greater => TriggerOp::Add,
            std::cmp::Ordering::Less => TriggerOp::Delete,
            std::cmp::Ordering::Equal => TriggerOp::Set,
        };
        graph::trigger(
            deps,
            TriggerEvent {
                op,
                key: "splice".into(),
                target: graph::target_id(&self.target),
                new_value: Some(Value::Int(new_len as i64)),
                old_value: Some(Value::Int(old_len as i64)),
                old_target: None,
            },
        );
        removed
    }

    /// Explicitly grows or shrinks the sequence. Shrinking triggers every
    /// index beyond the new length as deleted, plus `length`.
    pub fn set_len(&self, new_len: usize) {
        if self.readonly {
            #[cfg(debug_assertions)]
            crate::warn_debug("length write failed: target is readonly");
            return;
        }
        let old_len = self.target.data.borrow().len();
        if new_len == old_len {
            return;
        }
        let mut deps = Vec::new();
        if new_len < old_len {
            self.target.data.borrow_mut().truncate(new_len);
            for i in new_len..old_len {
                deps.push(self.target.dep_for_index(i));
            }
        } else {
            self.target.data.borrow_mut().resize(new_len, Value::Null);
        }
        if self.target.skip.get() {
            return;
        }
        deps.push(self.target.length_dep.clone());
        let op = if new_len < old_len { TriggerOp::Delete } else { TriggerOp::Add };
        graph::trigger(
            deps,
            TriggerEvent {
                op,
                key: "length".into(),
                target: graph::target_id(&self.target),
                new_value: Some(Value::Int(new_len as i64)),
                old_value: Some(Value::Int(old_len as i64)),
                old_target: None,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::effect;
    use std::cell::Cell as StdCell2;
    use std::rc::Rc as StdRc;

    #[test]
    fn push_triggers_length_and_index() {
        let list = ReactiveList::reactive();
        let runs = StdRc::new(StdCell2::new(0));
        {
            let list = list.clone();
            let runs = runs.clone();
            effect(move || {
                runs.set(runs.get() + 1);
                let _ = list.len();
            });
        }
        assert_eq!(runs.get(), 1);
        list.push(1i64);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn includes_reruns_on_push() {
        let list = ReactiveList::reactive();
        list.push(1i64);
        list.push(2i64);
        let runs = StdRc::new(StdCell2::new(0));
        let found = StdRc::new(StdCell2::new(false));
        {
            let list = list.clone();
            let runs = runs.clone();
            let found = found.clone();
            effect(move || {
                runs.set(runs.get() + 1);
                found.set(list.includes(&Value::Int(3)));
            });
        }
        assert_eq!(runs.get(), 1);
        assert!(!found.get());

        list.push(3i64);
        assert_eq!(runs.get(), 2, "includes() must resubscribe on every element, not just the match");
        assert!(found.get());
    }

    #[test]
    fn splice_invalidates_shifted_indices() {
        let list = ReactiveList::from_values([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let seen = StdRc::new(StdCell2::new(0i64));
        {
            let list = list.clone();
            let seen = seen.clone();
            effect(move || {
                seen.set(list.get(2).unwrap().as_int().unwrap());
            });
        }
        assert_eq!(seen.get(), 3);
        list.splice(0, 1, vec![]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).unwrap().as_int(), Some(3));
    }

    #[test]
    fn shrinking_length_triggers_removed_indices_and_length() {
        let list = ReactiveList::from_values([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let runs = StdRc::new(StdCell2::new(0));
        {
            let list = list.clone();
            let runs = runs.clone();
            effect(move || {
                runs.set(runs.get() + 1);
                let _ = list.get(2);
            });
        }
        assert_eq!(runs.get(), 1);
        list.set_len(1);
        assert_eq!(runs.get(), 2, "truncating past index 2 must invalidate its subscribers");
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn readonly_blocks_mutation() {
        let list = ReactiveList::reactive();
        list.push(1i64);
        let ro = list.as_readonly();
        assert!(!ro.set(0, 2i64));
        assert_eq!(ro.get(0).unwrap().as_int(), Some(1));
    }

    #[test]
    fn mark_raw_suppresses_triggers_from_every_mutating_method() {
        let list = ReactiveList::reactive();
        list.push(1i64);
        list.push(2i64);
        list.push(3i64);
        list.mark_raw();

        let runs = StdRc::new(StdCell2::new(0));
        {
            let list = list.clone();
            let runs = runs.clone();
            effect(move || {
                runs.set(runs.get() + 1);
                let _ = list.len();
                let _ = list.get(0);
            });
        }
        assert_eq!(runs.get(), 1);

        list.set(0, 9i64);
        list.pop();
        list.splice(0, 1, vec![Value::Int(7)]);
        list.set_len(1);
        assert_eq!(runs.get(), 1, "a markRaw target must never notify any subscriber");
        assert_eq!(list.get(0).unwrap().as_int(), Some(7), "writes still apply, just untracked");
    }
}
