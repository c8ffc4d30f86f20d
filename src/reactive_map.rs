//! Observable keyed maps.
//!
//! Grounded on `sycamore-reactive`'s `signals.rs` `with`/`track`/`update`
//! triad, generalized from a single cell to a full keyed container the way
//! Vue 3's `baseHandlers`/`collectionHandlers` generalize a plain `ref` to
//! `reactive()`. Each key gets its own dep set, created lazily on first
//! access, plus two synthetic slots: `Iterate`, read by any enumeration of
//! the map's keys (`Object.keys`/`for...in`'s `ITERATE_KEY`), and
//! `MapKeyIterate`, read only by key-only iteration of a genuine key/value
//! collection (`Map.prototype.keys()`'s `MAP_KEY_ITERATE_KEY`) so that a
//! value-only update doesn't invalidate a live `.keys()` iterator.

use std::cell::{Cell as StdCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::graph::{self, DepSet, TrackEvent, TrackOp, TriggerEvent, TriggerOp};
use crate::value::{self, Value};

#[derive(Clone, PartialEq, Eq, Hash)]
enum MapKey {
    Prop(Rc<str>),
    Iterate,
    MapKeyIterate,
}

struct RawMap {
    data: RefCell<IndexMap<Rc<str>, Value>>,
    deps: RefCell<HashMap<MapKey, DepSet>>,
    /// Set by `mark_raw`: once set, every handle over this target becomes a
    /// plain untracked accessor regardless of its own readonly/shallow flags
    /// once marked raw.
    skip: StdCell<bool>,
}

impl RawMap {
    fn dep_for(&self, key: MapKey) -> DepSet {
        self.deps.borrow_mut().entry(key).or_insert_with(graph::new_dep_set).clone()
    }
}

/// A handle onto an observable keyed map. Cloning a handle is cheap and
/// shares the same underlying target; `reactive()`/`readonly()`/
/// `shallow_reactive()`/`shallow_readonly()` each produce a fresh handle
/// over a *new* target, while [`ReactiveMap::as_reactive`] /
/// [`ReactiveMap::as_readonly`] convert an existing handle's view without
/// copying its data.
#[derive(Clone)]
pub struct ReactiveMap {
    target: Rc<RawMap>,
    readonly: bool,
    shallow: bool,
}

impl PartialEq for ReactiveMap {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.target, &other.target)
            && self.readonly == other.readonly
            && self.shallow == other.shallow
    }
}

/// An untracked accessor over a map's target, obtained via
/// [`ReactiveMap::to_raw`]. Reads and writes through this handle never track
/// or trigger.
#[derive(Clone)]
pub struct RawMapHandle {
    target: Rc<RawMap>,
}

impl PartialEq for RawMapHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.target, &other.target)
    }
}

impl std::fmt::Debug for RawMapHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawMapHandle({:p})", Rc::as_ptr(&self.target))
    }
}

impl RawMapHandle {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.target.data.borrow().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.target.data.borrow_mut().insert(Rc::from(key), value.into());
    }

    pub fn keys(&self) -> Vec<Rc<str>> {
        self.target.data.borrow().keys().cloned().collect()
    }
}

fn new_target() -> Rc<RawMap> {
    Rc::new(RawMap {
        data: RefCell::new(IndexMap::new()),
        deps: RefCell::new(HashMap::new()),
        skip: StdCell::new(false),
    })
}

impl ReactiveMap {
    /// Creates a fresh, empty reactive (mutable, tracked) map.
    pub fn reactive() -> Self {
        Self { target: new_target(), readonly: false, shallow: false }
    }

    /// Creates a fresh, empty read-only map.
    pub fn readonly() -> Self {
        Self { target: new_target(), readonly: true, shallow: false }
    }

    /// Creates a fresh, empty shallow-reactive map: top-level keys are
    /// tracked, but values read back out are not themselves deep-wrapped.
    pub fn shallow_reactive() -> Self {
        Self { target: new_target(), readonly: false, shallow: true }
    }

    /// Creates a fresh, empty shallow read-only map.
    pub fn shallow_readonly() -> Self {
        Self { target: new_target(), readonly: true, shallow: true }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        let map = Self::reactive();
        for (k, v) in entries {
            map.target.data.borrow_mut().insert(Rc::from(k.as_str()), v);
        }
        map
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

    /// A mutable, tracked view over the same target.
    pub fn as_reactive(&self) -> Self {
        Self { target: self.target.clone(), readonly: false, shallow: self.shallow }
    }

    /// A read-only view over the same target.
    pub fn as_readonly(&self) -> Self {
        Self { target: self.target.clone(), readonly: true, shallow: self.shallow }
    }

    pub(crate) fn target_ptr_eq(&self, other: &ReactiveMap) -> bool {
        Rc::ptr_eq(&self.target, &other.target)
    }

    /// An untracked accessor over this map's underlying target.
    pub fn to_raw(&self) -> RawMapHandle {
        RawMapHandle { target: self.target.clone() }
    }

    /// Marks this map's target so that every handle over it — past, present
    /// and future — becomes untracked, as if it had never been passed
    /// through `reactive()`.
    pub fn mark_raw(&self) {
        self.target.skip.set(true);
    }

    pub fn is_marked_raw(&self) -> bool {
        self.target.skip.get()
    }

    pub fn len(&self) -> usize {
        if !self.readonly && !self.target.skip.get() {
            graph::track(
                &self.target.dep_for(MapKey::Iterate),
                TrackEvent { op: TrackOp::Iterate, key: "size".into(), target: graph::target_id(&self.target) },
            );
        }
        self.target.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads `key`, auto-unwrapping a [`crate::cell::Cell`] value and
    /// deep-wrapping a nested aggregate's readonly-ness to match this
    /// wrapper's own.
    pub fn get(&self, key: &str) -> Option<Value> {
        if self.target.skip.get() {
            return self.target.data.borrow().get(key).cloned();
        }
        if !self.readonly {
            graph::track(
                &self.target.dep_for(MapKey::Prop(Rc::from(key))),
                TrackEvent { op: TrackOp::Get, key: key.to_string(), target: graph::target_id(&self.target) },
            );
        }
        let raw = self.target.data.borrow().get(key).cloned()?;
        if self.shallow {
            return Some(raw);
        }
        Some(match raw {
            Value::Cell(c) => c.get(),
            Value::Map(m) if self.readonly => Value::Map(m.as_readonly()),
            Value::List(l) if self.readonly => Value::List(l.as_readonly()),
            other => other,
        })
    }

    pub fn has(&self, key: &str) -> bool {
        if !self.readonly && !self.target.skip.get() {
            graph::track(
                &self.target.dep_for(MapKey::Prop(Rc::from(key))),
                TrackEvent { op: TrackOp::Has, key: key.to_string(), target: graph::target_id(&self.target) },
            );
        }
        self.target.data.borrow().contains_key(key)
    }

    /// Returns the map's keys, subscribing the active effect to future
    /// additions and removals (not value updates, see [`ReactiveMap::set`]).
    pub fn keys(&self) -> Vec<Rc<str>> {
        if !self.readonly && !self.target.skip.get() {
            graph::track(
                &self.target.dep_for(MapKey::Iterate),
                TrackEvent { op: TrackOp::Iterate, key: "keys".into(), target: graph::target_id(&self.target) },
            );
            graph::track(
                &self.target.dep_for(MapKey::MapKeyIterate),
                TrackEvent { op: TrackOp::Iterate, key: "keys".into(), target: graph::target_id(&self.target) },
            );
        }
        self.target.data.borrow().keys().cloned().collect()
    }

    /// Returns a snapshot of the map's `(key, value)` pairs, subscribing to
    /// iteration the same way [`ReactiveMap::keys`] does, plus each
    /// individual key's value slot (an entries iterator observes both shape
    /// and content).
    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        if !self.readonly && !self.target.skip.get() {
            graph::track(
                &self.target.dep_for(MapKey::Iterate),
                TrackEvent { op: TrackOp::Iterate, key: "entries".into(), target: graph::target_id(&self.target) },
            );
        }
        let snapshot: Vec<_> = self.target.data.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        snapshot
            .into_iter()
            .map(|(k, v)| {
                let v = if !self.readonly && !self.target.skip.get() {
                    graph::track(
                        &self.target.dep_for(MapKey::Prop(k.clone())),
                        TrackEvent { op: TrackOp::Get, key: k.to_string(), target: graph::target_id(&self.target) },
                    );
                    v
                } else {
                    v
                };
                (k, v)
            })
            .collect()
    }

    /// Sets `key` to `new_value`. If the existing value at `key` is a cell
    /// and the new value isn't, writes through the cell instead of replacing
    /// it, preserving the existing cell's identity. Returns
    /// `false` without writing anything if this wrapper is read-only.
    pub fn set(&self, key: &str, new_value: impl Into<Value>) -> bool {
        if self.readonly {
            #[cfg(debug_assertions)]
            crate::warn_debug(&format!("set operation on key \"{key}\" failed: target is readonly"));
            return false;
        }
        let new_value = new_value.into();
        let existed = self.target.data.borrow().contains_key(key);
        let old_value = self.target.data.borrow().get(key).cloned();

        if self.target.skip.get() {
            self.target.data.borrow_mut().insert(Rc::from(key), new_value);
            return true;
        }

        if !self.shallow {
            if let Some(Value::Cell(existing_cell)) = &old_value {
                if !matches!(new_value, Value::Cell(_)) {
                    existing_cell.set(new_value);
                    return true;
                }
            }
        }

        self.target.data.borrow_mut().insert(Rc::from(key), value::deep_wrap(new_value.clone()));

        let rc_key: Rc<str> = Rc::from(key);
        if !existed {
            graph::trigger(
                [self.target.dep_for(MapKey::Prop(rc_key))],
                TriggerEvent {
                    op: TriggerOp::Add,
                    key: key.to_string(),
                    target: graph::target_id(&self.target),
                    new_value: Some(new_value.clone()),
                    old_value: None,
                    old_target: None,
                },
            );
            graph::trigger(
                [
                    self.target.dep_for(MapKey::Iterate),
                    self.target.dep_for(MapKey::MapKeyIterate),
                ],
                TriggerEvent {
                    op: TriggerOp::Add,
                    key: "iterate".into(),
                    target: graph::target_id(&self.target),
                    new_value: Some(new_value),
                    old_value: None,
                    old_target: None,
                },
            );
        } else {
            let changed = old_value.as_ref().map(|old| !value::reactive_eq(old, &new_value)).unwrap_or(true);
            if changed {
                graph::trigger(
                    [self.target.dep_for(MapKey::Prop(rc_key))],
                    TriggerEvent {
                        op: TriggerOp::Set,
                        key: key.to_string(),
                        target: graph::target_id(&self.target),
                        new_value: Some(new_value.clone()),
                        old_value,
                        old_target: None,
                    },
                );
                // A value update on a keyed-map target still invalidates a
                // live iteration.
                graph::trigger(
                    [self.target.dep_for(MapKey::Iterate)],
                    TriggerEvent {
                        op: TriggerOp::Set,
                        key: "iterate".into(),
                        target: graph::target_id(&self.target),
                        new_value: Some(new_value),
                        old_value: None,
                        old_target: None,
                    },
                );
            }
        }
        true
    }

    /// Removes `key`. Returns `false` without triggering anything if the key
    /// was absent or this wrapper is read-only.
    pub fn delete(&self, key: &str) -> bool {
        if self.readonly {
            #[cfg(debug_assertions)]
            crate::warn_debug(&format!("delete operation on key \"{key}\" failed: target is readonly"));
            return false;
        }
        let existed = self.target.data.borrow().contains_key(key);
        if !existed {
            return false;
        }
        let old_value = self.target.data.borrow_mut().shift_remove(key);
        if self.target.skip.get() {
            return true;
        }
        graph::trigger(
            [self.target.dep_for(MapKey::Prop(Rc::from(key)))],
            TriggerEvent {
                op: TriggerOp::Delete,
                key: key.to_string(),
                target: graph::target_id(&self.target),
                new_value: None,
                old_value: old_value.clone(),
                old_target: None,
            },
        );
        graph::trigger(
            [
                self.target.dep_for(MapKey::Iterate),
                self.target.dep_for(MapKey::MapKeyIterate),
            ],
            TriggerEvent {
                op: TriggerOp::Delete,
                key: "iterate".into(),
                target: graph::target_id(&self.target),
                new_value: None,
                old_value,
                old_target: None,
            },
        );
        true
    }

    /// Removes every key, firing a single `Clear` trigger against every dep
    /// set the target has ever allocated.
    pub fn clear(&self) {
        if self.readonly {
            #[cfg(debug_assertions)]
            crate::warn_debug("clear operation failed: target is readonly");
            return;
        }
        if self.target.data.borrow().is_empty() {
            return;
        }
        let old_entries: Vec<(Rc<str>, Value)> =
            self.target.data.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.target.data.borrow_mut().clear();
        if self.target.skip.get() {
            return;
        }
        let all_deps: Vec<_> = self.target.deps.borrow().values().cloned().collect();
        graph::trigger(
            all_deps,
            TriggerEvent {
                op: TriggerOp::Clear,
                key: "*".into(),
                target: graph::target_id(&self.target),
                new_value: None,
                old_value: None,
                old_target: Some(graph::TargetSnapshot::Map(old_entries)),
            },
        );
    }
}
