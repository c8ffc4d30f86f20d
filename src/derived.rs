//! Lazily-memoized derived values.
//!
//! Grounded on `sycamore-reactive`'s `create_selector_with` (`memos.rs`): a
//! derived value is itself a lazy, scheduler-driven effect whose scheduler
//! only flips a `dirty` flag and fans out to the derived value's own
//! subscribers on the dirty transition, rather than recomputing eagerly. The
//! value is only actually recomputed on the next `.value()` read, which is
//! what makes a chain of derived values collapse a burst of upstream writes
//! into at most one recomputation per derived value.

use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use crate::effect::{self, EffectHandle, EffectOptions};
use crate::graph::{self, DepSet, TrackEvent, TrackOp, TriggerEvent, TriggerOp};
use crate::value::Value;

struct DerivedInner {
    cached: RefCell<Option<Value>>,
    dirty: Rc<StdCell<bool>>,
    dep_set: DepSet,
    effect: EffectHandle,
    setter: Option<Box<dyn Fn(Value)>>,
}

/// A read-only (or read-write, via [`derived_with_setter`]) value computed
/// from other observables, recomputed at most once between any two reads.
#[derive(Clone)]
pub struct Derived {
    inner: Rc<DerivedInner>,
}

impl Derived {
    /// Recomputes if dirty, then returns the cached value, subscribing the
    /// active effect the same way a plain `Cell::get` would.
    pub fn value(&self) -> Value {
        if self.inner.dirty.get() {
            effect::invoke_or_panic(self.inner.effect.id());
            self.inner.dirty.set(false);
        }
        graph::track(
            &self.inner.dep_set,
            TrackEvent { op: TrackOp::Get, key: "value".into(), target: graph::target_id(&self.inner.dep_set) },
        );
        self.inner
            .cached
            .borrow()
            .clone()
            .expect("derived value is computed before being read")
    }

    /// Reads the cached value without forcing recomputation or subscribing.
    /// Returns `None` if the getter has never run.
    pub fn peek(&self) -> Option<Value> {
        self.inner.cached.borrow().clone()
    }

    /// Writes through this derived value's setter, if it has one
    /// (`derived_with_setter`). Writing to a getter-only derived value is a
    /// no-op that logs a warning in debug builds.
    pub fn set(&self, value: Value) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => {
                #[cfg(debug_assertions)]
                crate::warn_debug(
                    "write operation failed: computed value is readonly, set a setter if needed",
                );
                let _ = value;
            }
        }
    }

    /// Detaches this derived value's recomputation effect. A stopped derived
    /// value keeps whatever it last cached.
    pub fn stop(&self) {
        self.inner.effect.stop();
    }
}

/// Creates a read-only derived value.
pub fn derived(get: impl FnMut() -> Value + 'static) -> Derived {
    build(get, None)
}

/// Creates a derived value with an explicit setter, for cases that mirror
/// the source model's writable `computed({ get, set })`.
pub fn derived_with_setter(
    get: impl FnMut() -> Value + 'static,
    set: impl Fn(Value) + 'static,
) -> Derived {
    build(get, Some(Box::new(set)))
}

fn build(mut get: impl FnMut() -> Value + 'static, setter: Option<Box<dyn Fn(Value)>>) -> Derived {
    let cached: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
    let dirty = Rc::new(StdCell::new(true));
    let dep_set = graph::new_dep_set();

    let cached_for_run = cached.clone();
    let run = move || -> effect::EffectResult {
        *cached_for_run.borrow_mut() = Some(get());
        Ok(())
    };

    let dirty_for_sched = dirty.clone();
    let dep_set_for_sched = dep_set.clone();
    let scheduler = move |_handle: EffectHandle| {
        if !dirty_for_sched.replace(true) {
            graph::trigger(
                [dep_set_for_sched.clone()],
                TriggerEvent {
                    op: TriggerOp::Set,
                    key: "value".into(),
                    target: graph::target_id(&dep_set_for_sched),
                    new_value: None,
                    old_value: None,
                    old_target: None,
                },
            );
        }
    };

    let options = EffectOptions {
        lazy: true,
        computed: true,
        scheduler: Some(Box::new(scheduler)),
        ..Default::default()
    };
    let effect = effect::create_effect(Box::new(run), options);

    Derived { inner: Rc::new(DerivedInner { cached, dirty, dep_set, effect, setter }) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::cell;
    use crate::effect::effect;
    use std::cell::Cell as StdCell2;
    use std::rc::Rc as StdRc;

    #[test]
    fn recomputes_lazily_and_caches() {
        let src = cell(1i64);
        let calls = StdRc::new(StdCell2::new(0));
        let d = {
            let src = src.clone();
            let calls = calls.clone();
            derived(move || {
                calls.set(calls.get() + 1);
                Value::Int(src.get().as_int().unwrap() * 2)
            })
        };

        // Not computed until first read.
        assert_eq!(calls.get(), 0);
        assert_eq!(d.value().as_int(), Some(2));
        assert_eq!(calls.get(), 1);

        // Reading again without a write doesn't recompute.
        assert_eq!(d.value().as_int(), Some(2));
        assert_eq!(calls.get(), 1);

        src.set(5i64);
        assert_eq!(d.value().as_int(), Some(10));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn multiple_upstream_writes_collapse_to_one_recompute() {
        let src = cell(1i64);
        let calls = StdRc::new(StdCell2::new(0));
        let d = {
            let src = src.clone();
            let calls = calls.clone();
            derived(move || {
                calls.set(calls.get() + 1);
                src.get()
            })
        };
        d.value();
        assert_eq!(calls.get(), 1);

        src.set(2i64);
        src.set(3i64);
        src.set(4i64);
        assert_eq!(calls.get(), 1, "writes alone must not force recomputation");
        assert_eq!(d.value().as_int(), Some(4));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn downstream_effect_reruns_when_derived_changes() {
        let src = cell(1i64);
        let d = {
            let src = src.clone();
            derived(move || Value::Int(src.get().as_int().unwrap() + 1))
        };
        let seen = StdRc::new(StdCell2::new(0));
        {
            let d = d.clone();
            let seen = seen.clone();
            effect(move || seen.set(d.value().as_int().unwrap()));
        }
        assert_eq!(seen.get(), 2);
        src.set(10i64);
        assert_eq!(seen.get(), 11);
    }
}
