//! # Priority Mapper
//!
//! Folds the burst score into a fair-share task's priority and keeps its
//! scheduling weight and virtual deadline consistent with the result.
//!
//! ## Effective Priority
//!
//! ```text
//!   effective = min(39, (static_prio - MAX_RT_PRIO) + burst_score)
//! ```
//!
//! Index 0 is nice -20 (heaviest), 39 is nice +19 (lightest). The weight
//! tables below are the standard ones: each step is ~1.25x, and
//! `PRIO_TO_WMULT[i] ≈ 2^32 / PRIO_TO_WEIGHT[i]`.

use crate::config::{MAX_EFFECTIVE_PRIO, MAX_RT_PRIO, PENALTY_SHIFT};
use crate::task::Task;

/// Weight of each effective priority; index 20 (nice 0) is 1024.
pub const PRIO_TO_WEIGHT: [u32; 40] = [
    /* -20 */ 88761, 71755, 56483, 46273, 36291,
    /* -15 */ 29154, 23254, 18705, 14949, 11916,
    /* -10 */ 9548, 7620, 6100, 4904, 3906,
    /*  -5 */ 3121, 2501, 1991, 1586, 1277,
    /*   0 */ 1024, 820, 655, 526, 423,
    /*   5 */ 335, 272, 215, 172, 137,
    /*  10 */ 110, 87, 70, 56, 45,
    /*  15 */ 36, 29, 23, 18, 15,
];

/// Inverse weights, `2^32 / weight`.
pub const PRIO_TO_WMULT: [u32; 40] = [
    /* -20 */ 48388, 59856, 76040, 92818, 118348,
    /* -15 */ 147320, 184698, 229616, 287308, 360437,
    /* -10 */ 449829, 563644, 704093, 875809, 1099582,
    /*  -5 */ 1376151, 1717300, 2157191, 2708050, 3363326,
    /*   0 */ 4194304, 5237765, 6557202, 8165337, 10153587,
    /*   5 */ 12820798, 15790321, 19976592, 24970740, 31350126,
    /*  10 */ 39045157, 49367440, 61356676, 76695844, 95443717,
    /*  15 */ 119304647, 148102320, 186737708, 238609294, 286331153,
];

/// A scheduling weight and its precomputed inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadWeight {
    pub weight: u32,
    pub inv_weight: u32,
}

/// A weight change the external run queue must apply in place, without
/// moving the entity in its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reweight {
    pub prio: u8,
    pub load: LoadWeight,
}

/// Weight for an effective priority index (clamped to 0..=39).
#[inline]
pub const fn weight_of(prio: u8) -> LoadWeight {
    let i = if prio > MAX_EFFECTIVE_PRIO {
        MAX_EFFECTIVE_PRIO as usize
    } else {
        prio as usize
    };
    LoadWeight {
        weight: PRIO_TO_WEIGHT[i],
        inv_weight: PRIO_TO_WMULT[i],
    }
}

/// Static priority shifted by the burst score, clamped to `0..=39`.
#[inline]
pub fn effective_prio(task: &Task) -> u8 {
    let base = task.static_prio.saturating_sub(MAX_RT_PRIO);
    base.saturating_add(task.se.burst_score).min(MAX_EFFECTIVE_PRIO)
}

/// Burst score a task should carry: the integer part of its applied
/// penalty, or 0 for housekeeping threads.
#[inline]
pub fn burst_score_of(task: &Task) -> u8 {
    if task.is_kthread() {
        0
    } else {
        (task.se.burst_penalty >> PENALTY_SHIFT) as u8
    }
}

/// Re-derive the burst score; when that moves the effective priority,
/// install the new weight on the entity and report it.
pub fn update_burst_score(task: &mut Task) -> Option<Reweight> {
    let prev_prio = effective_prio(task);
    task.se.burst_score = burst_score_of(task);
    let new_prio = effective_prio(task);
    if new_prio == prev_prio {
        return None;
    }

    let load = weight_of(new_prio);
    task.se.load = load;
    log::trace!(
        "[bore] task {} prio {} -> {} weight {}",
        task.id,
        prev_prio,
        new_prio,
        load.weight
    );
    Some(Reweight {
        prio: new_prio,
        load,
    })
}

/// `(a * mul) >> shift` with a 128-bit intermediate.
#[inline]
const fn mul_shr(a: u64, mul: u32, shift: u32) -> u64 {
    ((a as u128 * mul as u128) >> shift) as u64
}

/// Virtual-time delta at `prio` to wall-clock-equivalent time.
#[inline]
pub const fn unscale_slice(delta: u64, prio: u8) -> u64 {
    mul_shr(delta, weight_of(prio).weight, 10)
}

/// Wall-clock-equivalent time to a virtual-time delta at `prio`.
#[inline]
pub const fn scale_slice(delta: u64, prio: u8) -> u64 {
    mul_shr(delta, weight_of(prio).inv_weight, 22)
}

/// Re-express the remaining virtual deadline after a priority raise.
///
/// Only applies when `new_prio` is a better (numerically lower) priority
/// than `prev_prio`; the sign of `deadline - vruntime` is preserved.
pub fn rescale_deadline(task: &mut Task, prev_prio: u8, new_prio: u8) {
    if prev_prio <= new_prio {
        return;
    }
    let se = &mut task.se;
    let vremain = se.deadline.wrapping_sub(se.vruntime) as i64;
    let wremain = unscale_slice(vremain.unsigned_abs(), prev_prio);
    let vscaled = scale_slice(wremain, new_prio);
    se.deadline = if vremain < 0 {
        se.vruntime.wrapping_sub(vscaled)
    } else {
        se.vruntime.wrapping_add(vscaled)
    };
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
