//! # Synchronization Helpers
//!
//! Read-mostly shared state (topology, tunables, capacities) lives behind
//! `spin::RwLock`. Placement decisions never hold a guard across their
//! scan: they copy what they need out under a short read section.
//!
//! ```text
//!   selector ──read()──► copy ──drop guard──► scan candidates
//!   embedder ──write()─► replace whole value
//! ```

use spin::RwLock;

/// Copy the current value out of `lock`.
#[inline]
pub fn snapshot<T: Copy>(lock: &RwLock<T>) -> T {
    *lock.read()
}

/// Run `f` on the current value with the read guard held.
///
/// Keep `f` short: writers spin for as long as it runs.
#[inline]
pub fn read_with<T, R, F>(lock: &RwLock<T>, f: F) -> R
where
    F: FnOnce(&T) -> R,
{
    let guard = lock.read();
    f(&guard)
}

/// Swap in a new value, returning the old one.
#[inline]
pub fn replace<T>(lock: &RwLock<T>, value: T) -> T {
    core::mem::replace(&mut *lock.write(), value)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
