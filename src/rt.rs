//! # Real-Time CPU Selection
//!
//! Spreads real-time tasks by the priority weight already queued on each
//! CPU, as tracked by the [`RtFactorBank`]. The CPU whose bank would be
//! lowest after adding the task wins.
//!
//! ```text
//!   candidates = allowed ∩ active
//!              ∩ high-perf          (asymmetric platform, if non-empty)
//!              − prev_cpu           (wake/fork, prev busy with an RT task
//!                                    that outranks us or cannot move)
//!   factor     = bank[cpu] + (MAX_RT_PRIO - normal_prio)
//! ```
//!
//! Ties go to the lowest CPU id. The search starts from
//! `(prev_cpu, u32::MAX)`, so an exhausted candidate set keeps the task on
//! its previous CPU.

use crate::cpumask::CpuMask;
use crate::rt_bank::{self, RtFactorBank};
use crate::scheduler::{Candidate, RunQueueView, Wake, WakeFlags};
use crate::task::Task;
use crate::topology::CapacityTable;

/// Choose a CPU for real-time `task`, last run on `prev_cpu`.
pub fn select_cpu<R: RunQueueView + ?Sized>(
    task: &Task,
    prev_cpu: usize,
    wake: &Wake,
    rqs: &R,
    caps: &CapacityTable,
    bank: &RtFactorBank,
    active: &CpuMask,
) -> usize {
    let mut cpus = task.cpus_allowed.and(active);
    if cpus.is_empty() {
        let cpu = task.cpus_allowed.first().unwrap_or(0);
        log::debug!("[sss] rt task {}: no active allowed cpu, using {}", task.id, cpu);
        return cpu;
    }

    if caps.is_asymmetric() && cpus.intersects(caps.hp_mask()) {
        cpus = cpus.and(caps.hp_mask());
    }

    if wake.flags.intersects(WakeFlags::TTWU | WakeFlags::FORK) {
        if let Some(curr) = rqs.curr(prev_cpu) {
            if curr.donor_is_rt
                && (curr.nr_cpus_allowed < 2 || curr.donor_normal_prio <= task.normal_prio)
            {
                cpus.clear(prev_cpu);
            }
        }
    }

    let p_factor = rt_bank::rt_factor(task.normal_prio) as i64;
    let mut best = Candidate {
        cpu: prev_cpu,
        factor: u32::MAX as i64,
    };

    for cpu in cpus.iter() {
        let mut factor = bank.read(cpu) as i64;
        if !task.queued || cpu != prev_cpu {
            factor += p_factor;
        }
        if factor < best.factor {
            best = Candidate { cpu, factor };
        }
    }

    best.cpu
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
