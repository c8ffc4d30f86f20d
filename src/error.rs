//! Error types for the reactive core.
//!
//! Mirrors the convention used throughout the retrieval pack (`reactive_graph`,
//! `leptos_reactive`, `rinch`, `blinc_*`): a single `thiserror`-derived enum
//! rather than hand-rolled `Display`/`Error` impls.

use thiserror::Error;

/// Errors surfaced by the reactivity core.
///
/// Most of the public API is deliberately infallible, matching a synchronous,
/// exception-free happy path; this type exists for the few places that need
/// to report a structural problem rather than just log a warning.
#[derive(Debug, Error)]
pub enum ReactivityError {
    /// A fallible effect body (see [`crate::effect::try_effect`]) returned an
    /// error. The effect runtime propagates this to the caller that performed
    /// the triggering mutation, aborting the remainder of that `Trigger`.
    #[error("effect body failed: {0}")]
    EffectFailed(#[source] Box<dyn std::error::Error>),

    /// An internal invariant was violated. These should never be observable
    /// outside of debug builds, which fail loudly on them instead of limping
    /// along.
    #[error("reactive-core invariant violated: {0}")]
    InvariantViolated(&'static str),
}
