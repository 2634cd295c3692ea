//! Stack safety for deep recursion over building-block trees.
//!
//! Construction, transformation and evaluation all recurse over trees whose
//! depth is controlled by the caller. Wrap recursive steps in
//! [`ensure_sufficient_stack`] to grow the stack on demand.
//!
//! - **Red zone**: 100KB; below this remaining space the stack grows
//! - **Growth size**: 1MB per growth

const RED_ZONE: usize = 100 * 1024;

const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Ensure sufficient stack space is available before executing `f`.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
