//! # RT Factor Bank
//!
//! One signed accumulator per CPU holding the outstanding real-time
//! priority weight queued there. A task at `normal_prio` contributes
//! `MAX_RT_PRIO - normal_prio`, so urgent tasks weigh more.
//!
//! The bank is written from every CPU's enqueue/dequeue path without a
//! lock. Readers tolerate momentarily stale values; the only invariant is
//! conservation: matched `add`/`sub` pairs cancel exactly.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::config::{MAX_CPUS, MAX_RT_PRIO};

/// One cache line per CPU so neighbouring slots never share a line.
#[repr(C, align(64))]
struct Slot(AtomicI32);

impl Slot {
    const ZERO: Self = Self(AtomicI32::new(0));
}

/// Per-CPU real-time weight accumulators.
pub struct RtFactorBank {
    slots: [Slot; MAX_CPUS],
}

/// Weight a task at `normal_prio` adds to its CPU's slot.
#[inline]
pub const fn rt_factor(normal_prio: u8) -> i32 {
    MAX_RT_PRIO as i32 - normal_prio as i32
}

impl RtFactorBank {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::ZERO; MAX_CPUS],
        }
    }

    /// Account a real-time task at `normal_prio` enqueued on `cpu`.
    /// Out-of-range CPUs are ignored.
    #[inline]
    pub fn add(&self, cpu: usize, normal_prio: u8) {
        if let Some(slot) = self.slots.get(cpu) {
            slot.0.fetch_add(rt_factor(normal_prio), Ordering::Relaxed);
        }
    }

    /// Undo a matching [`add`](Self::add).
    #[inline]
    pub fn sub(&self, cpu: usize, normal_prio: u8) {
        if let Some(slot) = self.slots.get(cpu) {
            slot.0.fetch_sub(rt_factor(normal_prio), Ordering::Relaxed);
        }
    }

    /// Current accumulated weight of `cpu` (0 for out-of-range CPUs).
    #[inline]
    pub fn read(&self, cpu: usize) -> i32 {
        self.slots
            .get(cpu)
            .map_or(0, |slot| slot.0.load(Ordering::Relaxed))
    }
}

impl Default for RtFactorBank {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
