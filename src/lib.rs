//! A fine-grained dependency-tracking engine for observable maps, lists and
//! cells.
//!
//! `reactive-core` is the reactivity algorithm on its own: wrap a value in
//! [`reactive_map::ReactiveMap`]/[`reactive_list::ReactiveList`], read and
//! write it from inside an [`effect`], and the effect re-runs exactly when a
//! field it read changes. [`cell::Cell`] gives the same protocol for a single
//! value, and [`derived::Derived`] layers a lazy, cached computation on top
//! that is itself both a subscriber and a source. See each module's docs for
//! the read/write interception rules, the tracking graph, and the effect
//! runtime's re-entrancy and cancellation semantics.

#![warn(missing_docs)]

mod cell;
mod derived;
mod effect;
mod error;
mod graph;
mod reactive_list;
mod reactive_map;
mod value;

pub use cell::{cell, is_cell, Cell};
pub use derived::{derived, derived_with_setter, Derived};
pub use effect::{
    effect, effect_with, enable_tracking, on, pause_tracking, reset_tracking, try_effect, untrack,
    EffectHandle, EffectOptions, Trackable,
};
pub use error::ReactivityError;
pub use graph::{TargetId, TargetSnapshot, TrackEvent, TrackOp, TriggerEvent, TriggerOp};
pub use reactive_list::{RawListHandle, ReactiveList};
pub use reactive_map::{RawMapHandle, ReactiveMap};
pub use value::Value;

/// Returns whether `value` is a mutable, tracked observable view (a
/// [`ReactiveMap`] or [`ReactiveList`] obtained through `reactive`,
/// `shallow_reactive`, or one of the `as_reactive` conversions).
///
/// A [`Cell`] is always mutable and tracked, so it is also considered
/// reactive. Primitive and raw values are never reactive.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Map(m) => m.is_reactive(),
        Value::List(l) => l.is_reactive(),
        Value::Cell(_) => true,
        _ => false,
    }
}

/// Returns whether `value` is a read-only observable view.
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Map(m) => m.is_readonly(),
        Value::List(l) => l.is_readonly(),
        _ => false,
    }
}

/// Returns whether `value` is any kind of observable wrapper, reactive or
/// read-only.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Map(_) | Value::List(_))
}

/// Marks an aggregate so that it (and every handle ever taken over it) is
/// never wrapped or tracked, as if it had never been passed through
/// `reactive()`/`readonly()`.
///
/// A no-op for values that aren't aggregates — wrapping a non-aggregate is a
/// user-error case, not something `markRaw` needs to guard.
pub fn mark_raw(value: &Value) {
    match value {
        Value::Map(m) => m.mark_raw(),
        Value::List(l) => l.mark_raw(),
        _ => {
            #[cfg(debug_assertions)]
            warn_debug("markRaw called on a value that is not an aggregate");
        }
    }
}

/// Emits a user-error warning: always surfaced in debug builds via
/// `eprintln!` so the warning is visible with no feature flags, and
/// additionally routed through `tracing::warn!` when the `trace` feature is
/// enabled so host applications can capture it in their own log pipeline.
pub(crate) fn warn_debug(msg: &str) {
    #[cfg(feature = "trace")]
    tracing::warn!(target: "reactive_core", "{msg}");
    if cfg!(debug_assertions) {
        eprintln!("reactive-core: {msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive_map::ReactiveMap;

    #[test]
    fn is_reactive_readonly_proxy_agree_with_wrapper_mode() {
        let m = ReactiveMap::reactive();
        let v = Value::Map(m.clone());
        assert!(is_reactive(&v));
        assert!(!is_readonly(&v));
        assert!(is_proxy(&v));

        let ro = Value::Map(m.as_readonly());
        assert!(!is_reactive(&ro));
        assert!(is_readonly(&ro));
        assert!(is_proxy(&ro));

        assert!(!is_proxy(&Value::Int(1)));
    }

    #[test]
    fn mark_raw_is_idempotent_and_visible_through_every_handle() {
        let m = ReactiveMap::reactive();
        let other_handle = m.as_readonly();
        mark_raw(&Value::Map(m.clone()));
        assert!(m.is_marked_raw());
        assert!(other_handle.is_marked_raw());
    }
}
