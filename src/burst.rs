//! # Burst Penalty Tracker
//!
//! Converts how long a task has run without sleeping into a priority
//! penalty, and smooths that penalty across bursts.
//!
//! ## Penalty Model
//!
//! A task's *greed* is the base-2 logarithm of its current burst length,
//! computed in fixed point with [`PENALTY_SHIFT`] fractional bits. Bursts
//! shorter than 2^[`PENALTY_OFFSET`] ns are tolerated; beyond that the
//! excess greed is scaled by `PENALTY_SCALE / 1024` and clamped to
//! [`MAX_PENALTY`]:
//!
//! ```text
//!   penalty
//!     ▲                               ┌──────── MAX_PENALTY
//!     │                          ____/
//!     │                    _____/
//!     │              _____/
//!     │        _____/      (log2 growth)
//!     │ ______/
//!     └──────┴─────────────────────────────────► log2(burst_time)
//!          OFFSET
//! ```
//!
//! ## Smoothing
//!
//! While running, the applied penalty ramps toward the current burst's
//! penalty in steps of `1 / burst_count` of the gap. At every sleep the
//! carried-over penalty moves toward the finished burst's penalty by
//! `ceil(gap / burst_count)`, and `burst_count` grows up to
//! [`SMOOTHNESS`]. A long-lived task therefore reacts slowly to a single
//! outlier burst in either direction.

use crate::config::{MAX_PENALTY, PENALTY_OFFSET, PENALTY_SCALE, PENALTY_SHIFT, SMOOTHNESS};
use crate::prio::{self, Reweight};
use crate::task::{SchedEntity, Task};

/// `log2(v) + 1` as fixed point with `fp` fractional bits; 0 for `v == 0`.
///
/// The integer part is the position of the highest set bit (1-based); the
/// fraction is the `fp` bits that follow it.
#[inline]
pub const fn log2p1_fixed(v: u64, fp: u32) -> u32 {
    if v == 0 {
        return 0;
    }
    let exponent = 64 - v.leading_zeros();
    let mantissa = ((v << (64 - exponent)) << 1 >> (64 - fp)) as u32;
    exponent << fp | mantissa
}

/// Penalty earned by a burst of `burst_time` nanoseconds.
///
/// Non-decreasing in `burst_time`, zero for short bursts and never above
/// [`MAX_PENALTY`].
pub const fn penalty_from_burst_time(burst_time: u64) -> u32 {
    let greed = log2p1_fixed(burst_time, PENALTY_SHIFT) as i32;
    let tolerance = (PENALTY_OFFSET << PENALTY_SHIFT) as i32;
    let penalty = if greed > tolerance { greed - tolerance } else { 0 };
    let scaled = (penalty * PENALTY_SCALE as i32) >> 10;
    if scaled as u32 > MAX_PENALTY {
        MAX_PENALTY
    } else {
        scaled as u32
    }
}

/// Move `old` toward `new` by `ceil(|new - old| / divider)`.
///
/// Never overshoots `new`, and always makes progress while the two differ.
#[inline]
pub const fn binary_smooth(new: u32, old: u32, divider: u8) -> u32 {
    let divider = if divider == 0 { 1 } else { divider as u32 };
    let abs_diff = new.abs_diff(old);
    let adj_diff = abs_diff / divider + (abs_diff % divider != 0) as u32;
    if new > old {
        old + adj_diff
    } else {
        old - adj_diff
    }
}

/// Account `delta_exec` nanoseconds of run time to the current burst.
///
/// Ramps the applied penalty only while the current burst's penalty exceeds
/// the carried-over one; otherwise the applied penalty is left untouched.
pub fn account_exec(se: &mut SchedEntity, delta_exec: u64) {
    se.burst_time = se.burst_time.saturating_add(delta_exec);
    se.curr_burst_penalty = penalty_from_burst_time(se.burst_time);
    if se.curr_burst_penalty > se.prev_burst_penalty {
        let gap = se.curr_burst_penalty - se.prev_burst_penalty;
        se.burst_penalty = se.prev_burst_penalty + gap / se.burst_count.max(1) as u32;
    }
}

/// Close the current burst: fold it into the carried-over penalty and widen
/// the smoothing window. Leaves `burst_penalty` alone.
pub fn close_burst(se: &mut SchedEntity) {
    se.prev_burst_penalty =
        binary_smooth(se.curr_burst_penalty, se.prev_burst_penalty, se.burst_count);
    se.burst_time = 0;
    se.curr_burst_penalty = 0;
    se.burst_count = if se.burst_count < SMOOTHNESS {
        se.burst_count + 1
    } else {
        SMOOTHNESS
    };
}

/// Per-tick hook: account run time and re-derive the burst score.
pub fn on_tick(task: &mut Task, delta_exec: u64) -> Option<Reweight> {
    account_exec(&mut task.se, delta_exec);
    prio::update_burst_score(task)
}

/// Sleep hook: restart the burst and apply the smoothed penalty.
pub fn on_sleep(task: &mut Task) -> Option<Reweight> {
    close_burst(&mut task.se);
    task.se.burst_penalty = task.se.prev_burst_penalty;
    prio::update_burst_score(task)
}

/// Zero all burst and cache state, as for a freshly created entity.
pub fn reset(task: &mut Task) {
    let se = &mut task.se;
    se.burst_time = 0;
    se.prev_burst_penalty = 0;
    se.curr_burst_penalty = 0;
    se.burst_penalty = 0;
    se.burst_score = 0;
    se.burst_count = 1;
    se.child_burst = Default::default();
    se.group_burst = Default::default();
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
