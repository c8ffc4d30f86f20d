//! The `toRaw`/`markRaw`/readonly laws from the reactivity core's testable
//! properties: round-tripping through the raw/reactive/readonly views must
//! preserve target identity, and a read-only view must never let a mutation
//! through.

use reactive_core::{is_proxy, is_reactive, is_readonly, mark_raw, ReactiveList, ReactiveMap, Value};

#[test]
fn reactive_and_readonly_views_over_the_same_target_share_identity() {
    let m = ReactiveMap::reactive();
    let raw1 = m.to_raw();

    let rewrapped_reactive = m.as_reactive();
    let rewrapped_readonly = m.as_readonly();

    assert_eq!(raw1, rewrapped_reactive.to_raw());
    assert_eq!(raw1, rewrapped_readonly.to_raw());
}

#[test]
fn is_reactive_is_readonly_and_is_proxy_agree_across_both_container_kinds() {
    let m = ReactiveMap::reactive();
    assert!(is_reactive(&Value::Map(m.clone())));
    assert!(!is_readonly(&Value::Map(m.clone())));
    assert!(is_proxy(&Value::Map(m.clone())));

    let ro_m = m.as_readonly();
    assert!(!is_reactive(&Value::Map(ro_m.clone())));
    assert!(is_readonly(&Value::Map(ro_m)));

    let l = ReactiveList::reactive();
    assert!(is_reactive(&Value::List(l.clone())));
    let ro_l = l.as_readonly();
    assert!(is_readonly(&Value::List(ro_l)));

    assert!(!is_proxy(&Value::Text("plain".into())));
}

#[test]
fn mark_raw_stops_future_tracking_through_every_handle() {
    use reactive_core::effect;
    use std::cell::Cell as StdCell;
    use std::rc::Rc;

    let m = ReactiveMap::reactive();
    m.set("n", 1i64);
    mark_raw(&Value::Map(m.clone()));
    assert!(m.is_marked_raw());

    let runs = Rc::new(StdCell::new(0));
    {
        let m = m.clone();
        let runs = runs.clone();
        effect(move || {
            runs.set(runs.get() + 1);
            let _ = m.get("n");
        });
    }
    assert_eq!(runs.get(), 1);

    m.set("n", 2i64);
    assert_eq!(runs.get(), 1, "a markRaw target must never notify any subscriber");
    assert_eq!(m.get("n").unwrap().as_int(), Some(2), "writes still apply, just untracked");
}

#[test]
fn readonly_write_and_delete_are_no_ops_that_report_failure() {
    let m = ReactiveMap::reactive();
    m.set("a", 1i64);
    let r = m.as_readonly();

    assert!(!r.set("a", 2i64));
    assert!(!r.delete("a"));
    assert_eq!(r.get("a").unwrap().as_int(), Some(1));

    let l = ReactiveList::reactive();
    l.push(1i64);
    let ro_l = l.as_readonly();
    assert!(!ro_l.set(0, 2i64));
    assert_eq!(ro_l.get(0).unwrap().as_int(), Some(1));
}

#[test]
fn raw_handles_compare_by_map_identity() {
    // `to_raw()` handles compare by which map they were taken from, not by
    // contents — two empty maps are still distinct raw handles. NaN's
    // self-equality under the crate's `hasChanged`-style rule is covered by
    // `src/cell.rs`'s `nan_is_not_a_change`, not here.
    let m1 = ReactiveMap::reactive();
    let m2 = ReactiveMap::reactive();
    assert_eq!(m1.to_raw(), m1.to_raw());
    assert_ne!(m1.to_raw(), m2.to_raw());
}
