//! The effect runtime: the re-entrant effect stack, the active-effect
//! registry, and the tracking-enabled flag.
//!
//! Grounded on `sycamore-reactive`'s `root.rs` (the `Root`'s `current_node`
//! stack plus its node-update queue) and `effects.rs`/`memos.rs` (effects as
//! thin wrappers over a lazily-recomputed node with a scheduler). Unlike that
//! model, effect state here is *not* owned by a single global arena of
//! typed nodes — `Cell`/`ReactiveMap`/`ReactiveList`/`Derived` each own their
//! own dependency sets directly, and this module only owns the effects
//! themselves.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::graph::{DepSet, TrackEvent, TriggerEvent};

/// Most effects read a handful of slots; `SmallVec` keeps that common case
/// on the stack, falling back to the heap only for an effect that reads
/// unusually many dependencies. Mirrors `sycamore-reactive`'s own
/// `DependencyTracker`, which makes the same trade for the same reason.
type DepList = SmallVec<[DepSet; 4]>;

new_key_type! {
    /// Stable identity for a registered effect.
    pub struct EffectId;
}

pub(crate) type EffectResult = Result<(), Box<dyn std::error::Error>>;

/// Options controlling how an effect is created and scheduled.
///
/// Mirrors the `lazy`/`scheduler`/`onTrack`/`onTrigger` options,
/// plus an internal `computed` marker used only by [`crate::derived`] to ask
/// the tracking graph to notify derived-value subscribers before plain
/// effects.
#[derive(Default)]
pub struct EffectOptions {
    pub lazy: bool,
    pub(crate) computed: bool,
    pub scheduler: Option<Box<dyn Fn(EffectHandle)>>,
    pub on_track: Option<Box<dyn Fn(&TrackEvent)>>,
    pub on_trigger: Option<Box<dyn Fn(&TriggerEvent)>>,
    pub on_stop: Option<Box<dyn Fn()>>,
}

impl std::fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("computed", &self.computed)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

pub(crate) struct EffectState {
    id: Cell<EffectId>,
    run: RefCell<Box<dyn FnMut() -> EffectResult>>,
    active: Cell<bool>,
    deps: RefCell<DepList>,
    options: EffectOptions,
}

impl EffectState {
    pub(crate) fn id(&self) -> EffectId {
        self.id.get()
    }

    pub(crate) fn is_computed(&self) -> bool {
        self.options.computed
    }

    pub(crate) fn push_dep(&self, dep: DepSet) {
        self.deps.borrow_mut().push(dep);
    }

    pub(crate) fn fire_on_track(&self, event: &TrackEvent) {
        if cfg!(debug_assertions) {
            if let Some(cb) = &self.options.on_track {
                cb(event);
            }
        }
    }

    pub(crate) fn fire_on_trigger(&self, event: &TriggerEvent) {
        if cfg!(debug_assertions) {
            if let Some(cb) = &self.options.on_trigger {
                cb(event);
            }
        }
    }

    fn cleanup(&self) {
        for dep in self.deps.borrow_mut().drain(..) {
            dep.borrow_mut().shift_remove(&self.id());
        }
    }
}

/// A handle to a registered effect. Cheap to copy; the effect itself lives in
/// the thread-local registry until [`EffectHandle::stop`] is called.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EffectHandle {
    id: EffectId,
}

impl EffectHandle {
    pub(crate) fn id(self) -> EffectId {
        self.id
    }

    /// Permanently detaches this effect from every dep set it is currently
    /// subscribed to. Idempotent.
    pub fn stop(self) {
        stop(self.id);
    }

    /// Re-runs the effect body directly, as the scheduler would. Used by
    /// callers that take over scheduling (`options.scheduler`) to decide
    /// *when* a pending effect actually runs.
    ///
    /// If the effect has been [`stop`](EffectHandle::stop)ped and has no
    /// scheduler, this is a pass-through call: `fn` still runs once, with no
    /// cleanup and no tracking.
    pub fn run(self) {
        invoke_or_panic(self.id);
    }

    pub fn is_active(self) -> bool {
        lookup(self.id).map(|e| e.active.get()).unwrap_or(false)
    }
}

thread_local! {
    static EFFECTS: RefCell<SlotMap<EffectId, Rc<EffectState>>> =
        RefCell::new(SlotMap::with_key());
    static EFFECT_STACK: RefCell<Vec<EffectId>> = const { RefCell::new(Vec::new()) };
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
    static TRACK_STACK: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn lookup(id: EffectId) -> Option<Rc<EffectState>> {
    EFFECTS.with(|m| m.borrow().get(id).cloned())
}

/// The effect currently on top of the stack, if any.
pub(crate) fn current_effect() -> Option<Rc<EffectState>> {
    let id = EFFECT_STACK.with(|s| s.borrow().last().copied())?;
    lookup(id)
}

pub(crate) fn current_effect_id() -> Option<EffectId> {
    EFFECT_STACK.with(|s| s.borrow().last().copied())
}

pub(crate) fn should_track() -> bool {
    SHOULD_TRACK.with(Cell::get)
}

/// Registers `run` as a new effect per the given options, immediately
/// invoking it unless `options.lazy` is set.
pub(crate) fn create_effect(
    run: Box<dyn FnMut() -> EffectResult>,
    options: EffectOptions,
) -> EffectHandle {
    let lazy = options.lazy;
    let state = Rc::new(EffectState {
        id: Cell::new(EffectId::default()),
        run: RefCell::new(run),
        active: Cell::new(true),
        deps: RefCell::new(SmallVec::new()),
        options,
    });
    let id = EFFECTS.with(|m| m.borrow_mut().insert(state.clone()));
    state.id.set(id);
    let handle = EffectHandle { id };
    if !lazy {
        invoke_or_panic(id);
    }
    handle
}

/// Invokes the effect's body, pushing it onto the effect stack and enabling
/// tracking for the duration of the call.
///
/// A fallible effect's `Err` propagates to the caller as a panic: the source
/// system's `Trigger` aborts on the first throwing effect, and unwinding a
/// Rust panic through the (still-guarded) call stack gives the same
/// first-failure-wins semantics without threading `Result` through every
/// mutating API. See `DESIGN.md` for the reasoning.
pub(crate) fn invoke_or_panic(id: EffectId) {
    if let Err(e) = invoke(id) {
        panic!("{}", crate::error::ReactivityError::EffectFailed(e));
    }
}

pub(crate) fn invoke(id: EffectId) -> EffectResult {
    let Some(state) = lookup(id) else {
        return Ok(());
    };

    if !state.active.get() {
        // A stopped effect with no scheduler is a pass-through call — run
        // `fn` directly, with no cleanup and no
        // tracking, since there is nothing left to re-subscribe. A stopped
        // effect *with* a scheduler never reaches here (`notify` filters on
        // `active` before dispatching to the scheduler), so this branch
        // only fires for an explicit `EffectHandle::run()`.
        if state.options.scheduler.is_some() {
            return Ok(());
        }
        return (state.run.borrow_mut())();
    }

    let already_running = EFFECT_STACK.with(|s| s.borrow().contains(&id));
    if already_running {
        // Re-entrant self-trigger: a no-op, not a second run.
        return Ok(());
    }

    state.cleanup();

    struct StackGuard;
    impl Drop for StackGuard {
        fn drop(&mut self) {
            EFFECT_STACK.with(|s| {
                s.borrow_mut().pop();
            });
            let prev = TRACK_STACK.with(|s| s.borrow_mut().pop()).unwrap_or(true);
            SHOULD_TRACK.with(|c| c.set(prev));
        }
    }

    TRACK_STACK.with(|s| s.borrow_mut().push(should_track()));
    SHOULD_TRACK.with(|c| c.set(true));
    EFFECT_STACK.with(|s| s.borrow_mut().push(id));
    let _guard = StackGuard;

    (state.run.borrow_mut())()
}

/// Detaches the effect from all of its dep sets and marks it inactive. A
/// stopped effect's scheduler (if any) is never invoked again, and a direct
/// call to [`EffectHandle::run`] becomes a pass-through call with no tracking.
pub(crate) fn stop(id: EffectId) {
    let Some(state) = lookup(id) else { return };
    if state.active.get() {
        state.cleanup();
        state.active.set(false);
        if let Some(cb) = &state.options.on_stop {
            cb();
        }
    }
}

/// Called by the tracking graph when a dep set fires: runs the scheduler if
/// one was supplied, otherwise invokes the effect directly.
pub(crate) fn notify(id: EffectId) {
    let Some(state) = lookup(id) else { return };
    if !state.active.get() {
        return;
    }
    match &state.options.scheduler {
        Some(sched) => sched(EffectHandle { id }),
        None => invoke_or_panic(id),
    }
}

/// Pushes the current tracking state and disables tracking.
pub fn pause_tracking() {
    TRACK_STACK.with(|s| s.borrow_mut().push(should_track()));
    SHOULD_TRACK.with(|c| c.set(false));
}

/// Pushes the current tracking state and enables tracking.
pub fn enable_tracking() {
    TRACK_STACK.with(|s| s.borrow_mut().push(should_track()));
    SHOULD_TRACK.with(|c| c.set(true));
}

/// Restores tracking state to whatever it was before the last
/// `pause_tracking`/`enable_tracking` call.
pub fn reset_tracking() {
    let prev = TRACK_STACK.with(|s| s.borrow_mut().pop()).unwrap_or(true);
    SHOULD_TRACK.with(|c| c.set(prev));
}

/// Runs `f` with tracking disabled, restoring the previous state afterwards
/// even if `f` panics.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    pause_tracking();
    struct Reset;
    impl Drop for Reset {
        fn drop(&mut self) {
            reset_tracking();
        }
    }
    let _reset = Reset;
    f()
}

/// Creates and immediately runs a plain effect. Re-runs whenever any
/// observable it read changes, until [`EffectHandle::stop`] is called.
pub fn effect(mut f: impl FnMut() + 'static) -> EffectHandle {
    create_effect(Box::new(move || Ok(f())), EffectOptions::default())
}

/// Creates an effect with full control over laziness and the `onTrack`/
/// `onTrigger`/`scheduler` debug and scheduling hooks.
pub fn effect_with(f: impl FnMut() + 'static, options: EffectOptions) -> EffectHandle {
    let mut f = f;
    create_effect(Box::new(move || Ok(f())), options)
}

/// Like [`effect`], but the effect body can fail. A failure aborts the
/// triggering `Trigger` (see [`invoke_or_panic`]).
pub fn try_effect(
    f: impl FnMut() -> EffectResult + 'static,
    options: EffectOptions,
) -> EffectHandle {
    create_effect(Box::new(f), options)
}

/// Something that can be explicitly named as a dependency to [`on`]: a
/// [`crate::cell::Cell`] or a [`crate::derived::Derived`].
///
/// Grounded on `sycamore-reactive`'s `AnyReadSignal::track` (`lib.rs`), which
/// lets `on`'s dependency list hold a heterogeneous mix of signal types.
pub trait Trackable {
    /// Performs exactly the read this dependency's own tracked getter would
    /// (`Cell::get`/`Derived::value`), so it participates in `Track` without
    /// actually needing its value.
    fn track(&self);
}

impl Trackable for crate::cell::Cell {
    fn track(&self) {
        self.get();
    }
}

impl Trackable for crate::derived::Derived {
    fn track(&self) {
        self.value();
    }
}

/// Wraps `f` so that it explicitly subscribes to `dependencies` before
/// running the rest of its body untracked, instead of relying on whatever
/// `f` happens to read.
///
/// Mirrors `sycamore-reactive`'s own `on()` (`lib.rs`): track every
/// dependency up front, then run the callback with tracking suppressed so it
/// cannot pick up any *other* dependency by accident.
///
/// ```
/// # use reactive_core::{cell, effect, on};
/// let count = cell(0i64);
/// let runs = std::rc::Rc::new(std::cell::Cell::new(0));
/// {
///     let count = count.clone();
///     let runs = runs.clone();
///     effect(on(vec![Box::new(count.clone())], move || {
///         runs.set(runs.get() + 1);
///     }));
/// }
/// count.set(1);
/// assert_eq!(runs.get(), 2);
/// ```
pub fn on(
    dependencies: Vec<Box<dyn Trackable>>,
    mut f: impl FnMut() + 'static,
) -> impl FnMut() + 'static {
    move || {
        for dep in &dependencies {
            dep.track();
        }
        untrack(|| f());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::cell;
    use std::cell::Cell as StdCell;
    use std::rc::Rc;

    #[test]
    fn stopped_effect_is_never_invoked_again() {
        let c = cell(1i64);
        let runs = Rc::new(StdCell::new(0));
        let handle = {
            let c = c.clone();
            let runs = runs.clone();
            effect(move || {
                runs.set(runs.get() + 1);
                let _ = c.get();
            })
        };
        assert_eq!(runs.get(), 1);
        handle.stop();
        assert!(!handle.is_active());
        c.set(2i64);
        c.set(3i64);
        assert_eq!(runs.get(), 1, "a stopped effect must not re-run on further mutations");
    }

    #[test]
    fn effect_with_no_reads_has_no_deps() {
        let runs = Rc::new(StdCell::new(0));
        {
            let runs = runs.clone();
            effect(move || runs.set(runs.get() + 1));
        }
        assert_eq!(runs.get(), 1);
        // Mutating anything at all must not invoke an effect that read nothing.
        let c = cell(1i64);
        c.set(2i64);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn reentrant_self_mutation_does_not_loop() {
        let c = cell(0i64);
        {
            let c = c.clone();
            effect(move || {
                let n = c.get().as_int().unwrap();
                if n == 0 {
                    c.set(n + 1);
                }
                let _ = c.get();
            });
        }
        assert_eq!(c.peek().as_int(), Some(1));
    }

    #[test]
    fn untrack_suppresses_tracking_for_its_scope() {
        let c = cell(1i64);
        let runs = Rc::new(StdCell::new(0));
        {
            let c = c.clone();
            let runs = runs.clone();
            effect(move || {
                runs.set(runs.get() + 1);
                untrack(|| {
                    let _ = c.get();
                });
            });
        }
        assert_eq!(runs.get(), 1);
        c.set(2i64);
        assert_eq!(runs.get(), 1, "a read inside untrack must not subscribe");
    }

    #[test]
    fn on_track_fires_with_the_reading_operation_and_key() {
        use crate::graph::TrackOp;

        let c = cell(1i64);
        let seen_op = Rc::new(RefCell::new(None));
        {
            let c = c.clone();
            let seen_op = seen_op.clone();
            let options = EffectOptions {
                on_track: Some(Box::new(move |event| {
                    *seen_op.borrow_mut() = Some((event.op, event.key.clone()));
                })),
                ..Default::default()
            };
            effect_with(
                move || {
                    let _ = c.get();
                },
                options,
            );
        }
        assert_eq!(seen_op.borrow().as_ref().map(|(op, _)| *op), Some(TrackOp::Get));
        assert_eq!(seen_op.borrow().as_ref().map(|(_, key)| key.clone()), Some("value".to_string()));
    }

    #[test]
    fn on_trigger_fires_with_the_writing_operation_and_values() {
        use crate::graph::TriggerOp;

        let c = cell(1i64);
        let seen = Rc::new(RefCell::new(None));
        {
            let c = c.clone();
            let seen = seen.clone();
            let options = EffectOptions {
                on_trigger: Some(Box::new(move |event| {
                    *seen.borrow_mut() = Some((
                        event.op,
                        event.new_value.as_ref().and_then(|v| v.as_int()),
                        event.old_value.as_ref().and_then(|v| v.as_int()),
                    ));
                })),
                ..Default::default()
            };
            effect_with(
                move || {
                    let _ = c.get();
                },
                options,
            );
        }
        c.set(2i64);
        assert_eq!(*seen.borrow(), Some((TriggerOp::Set, Some(2), Some(1))));
    }

    #[test]
    fn on_stop_fires_exactly_once_when_the_effect_is_stopped() {
        let calls = Rc::new(StdCell::new(0));
        let handle = {
            let calls = calls.clone();
            let options = EffectOptions {
                on_stop: Some(Box::new(move || calls.set(calls.get() + 1))),
                ..Default::default()
            };
            effect_with(|| {}, options)
        };
        assert_eq!(calls.get(), 0);
        handle.stop();
        assert_eq!(calls.get(), 1);
        handle.stop();
        assert_eq!(calls.get(), 1, "stopping an already-stopped effect must not re-fire on_stop");
    }

    #[test]
    fn failing_effect_body_panics_and_restores_tracking_state() {
        let c = cell(1i64);
        let should_fail = Rc::new(StdCell::new(false));
        let handle = {
            let c = c.clone();
            let should_fail = should_fail.clone();
            try_effect(
                move || {
                    let _ = c.get();
                    if should_fail.get() {
                        return Err("boom".into());
                    }
                    Ok(())
                },
                EffectOptions::default(),
            )
        };

        should_fail.set(true);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            c.set(2i64);
        }));
        assert!(result.is_err(), "a failing effect body must abort the triggering mutation via panic");
        handle.stop();

        // The effect stack and tracking-enabled flag must be exactly as they
        // were before the panic: a fresh effect subscribes and reruns normally.
        let runs = Rc::new(StdCell::new(0));
        {
            let c = c.clone();
            let runs = runs.clone();
            effect(move || {
                runs.set(runs.get() + 1);
                let _ = c.get();
            });
        }
        assert_eq!(runs.get(), 1);
        c.set(3i64);
        assert_eq!(runs.get(), 2, "tracking must still work normally after a caught panic");
    }

    #[test]
    fn on_tracks_only_named_dependencies() {
        let watched = cell(1i64);
        let unwatched = cell(1i64);
        let runs = Rc::new(StdCell::new(0));
        {
            let watched = watched.clone();
            let unwatched = unwatched.clone();
            let runs = runs.clone();
            effect(on(vec![Box::new(watched.clone())], move || {
                runs.set(runs.get() + 1);
                // Read, but `on` wraps this in `untrack`, so it must not
                // subscribe to `unwatched`.
                let _ = unwatched.get();
            }));
        }
        assert_eq!(runs.get(), 1);
        unwatched.set(2i64);
        assert_eq!(runs.get(), 1, "dependencies not named in `on` must not retrigger");
        watched.set(2i64);
        assert_eq!(runs.get(), 2);
    }
}
