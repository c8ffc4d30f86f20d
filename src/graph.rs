//! The tracking graph: dependency sets shared by reference between an
//! observable slot and every effect subscribed to it, plus the
//! `Track`/`Trigger` operations that read and write that graph.
//!
//! Grounded on `sycamore-reactive`'s `root.rs` `DependencyTracker` (an
//! insertion-ordered list of edges built up during a tracked run) and
//! `signals.rs`'s `track()`/`with()` (push current node onto the signal's
//! `dependents`, push the signal onto the node's `dependencies`). That
//! version centers on a single global node arena; here each container owns
//! its own slots directly, so a dep set is simply an
//! `Rc<RefCell<IndexSet<EffectId>>>` living in two places at once: the
//! container's key → dep-set map, and the subscribing effect's own `deps`
//! list. Removing the effect from one side (via `EffectHandle::stop`) removes
//! it from the other automatically, because both sides hold the same `Rc`.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::effect::EffectId;
use crate::value::Value;

/// An ordered set of effects subscribed to one `(target, key)` slot.
///
/// Ordered so that notification order matches subscription order when
/// multiple effects observe the same slot.
pub(crate) type DepSet = Rc<RefCell<IndexSet<EffectId>>>;

pub(crate) fn new_dep_set() -> DepSet {
    Rc::new(RefCell::new(IndexSet::new()))
}

/// An opaque identifier for the observable target (a `ReactiveMap`/
/// `ReactiveList`/`Cell`/`Derived`'s underlying storage) that fired a
/// `Track`/`Trigger` call, so an `onTrack`/`onTrigger` callback watching more
/// than one target through the same effect can tell them apart.
///
/// Derived from the address of the `Rc` that owns the target's storage —
/// stable for the target's lifetime, meaningless once it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(usize);

/// Returns the [`TargetId`] for whichever container owns `rc`.
pub(crate) fn target_id<T>(rc: &Rc<T>) -> TargetId {
    TargetId(Rc::as_ptr(rc) as *const () as usize)
}

/// A snapshot of a target's contents just before a `Clear` trigger, passed as
/// `oldTarget` so a debug observer can see what was cleared.
#[derive(Debug, Clone)]
pub enum TargetSnapshot {
    Map(Vec<(Rc<str>, Value)>),
    List(Vec<Value>),
}

/// The three read operations distinguished for `onTrack` debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Bit-exact op-type strings for `onTrack`/`onTrigger` observers, kept
/// alongside the `TrackOp`/`TriggerOp` enums that drive the crate's own
/// internal logic.
pub const GET: &str = "get";
pub const HAS: &str = "has";
pub const ITERATE: &str = "iterate";
pub const SET: &str = "set";
pub const ADD: &str = "add";
pub const DELETE: &str = "delete";
pub const CLEAR: &str = "clear";

impl TrackOp {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackOp::Get => GET,
            TrackOp::Has => HAS,
            TrackOp::Iterate => ITERATE,
        }
    }
}

/// The four write operations distinguished for `onTrigger` debugging and for
/// the ITERATE_KEY fan-out rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

impl TriggerOp {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerOp::Set => "set",
            TriggerOp::Add => "add",
            TriggerOp::Delete => "delete",
            TriggerOp::Clear => "clear",
        }
    }
}

/// Passed to a subscribing effect's `onTrack` callback.
#[derive(Debug, Clone)]
pub struct TrackEvent {
    pub op: TrackOp,
    pub key: String,
    pub target: TargetId,
}

/// Passed to every effect notified by a [`trigger`] call.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub op: TriggerOp,
    pub key: String,
    pub target: TargetId,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    /// A snapshot of the target's contents just before a `Clear`; `None` for
    /// every other op.
    pub old_target: Option<TargetSnapshot>,
}

/// Registers the currently active effect into `dep_set`, and `dep_set` into
/// that effect's own dep list, unless tracking is paused or there is no
/// active effect.
pub(crate) fn track(dep_set: &DepSet, event: TrackEvent) {
    if !crate::effect::should_track() {
        return;
    }
    let Some(effect) = crate::effect::current_effect() else {
        return;
    };
    effect.fire_on_track(&event);
    let inserted = dep_set.borrow_mut().insert(effect.id());
    if inserted {
        effect.push_dep(dep_set.clone());
    }
}

/// Notifies every effect subscribed to any of `dep_sets`, in two passes:
/// derived-value recomputation first, then plain effects, each in
/// first-subscribed order, skipping the currently-running effect so that an
/// effect can never re-trigger itself mid-run (self-invalidation guard).
pub(crate) fn trigger(dep_sets: impl IntoIterator<Item = DepSet>, event: TriggerEvent) {
    let mut derived: IndexSet<EffectId> = IndexSet::new();
    let mut plain: IndexSet<EffectId> = IndexSet::new();

    for dep_set in dep_sets {
        for id in dep_set.borrow().iter().copied() {
            let Some(effect) = crate::effect::lookup(id) else {
                continue;
            };
            if effect.is_computed() {
                derived.insert(id);
            } else {
                plain.insert(id);
            }
        }
    }

    let active = crate::effect::current_effect_id();

    for id in derived.into_iter().chain(plain) {
        if Some(id) == active && crate::effect::should_track() {
            continue;
        }
        if let Some(effect) = crate::effect::lookup(id) {
            effect.fire_on_trigger(&event);
        }
        crate::effect::notify(id);
    }
}
