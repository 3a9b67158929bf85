//! # Fair-Share CPU Selection
//!
//! Picks the CPU with the most capacity left over after subtracting what
//! is already committed there, nudged toward CPUs that keep the task's
//! cache footprint warm.
//!
//! ## Scoring
//!
//! ```text
//!   factor = capacity(cpu) - util_cfs - util_rt - util_dl - util(task)
//!
//!   if factor >= BUSY_MARGIN (and not an exec placement):
//!     + AFFINE_BIAS * BIAS_UNIT   wake-affine and cpu is waker's or prev
//!     + smt_bias    * BIAS_UNIT   non-affine wakeup, cpu is SMT sibling of prev
//!     + llc_bias    * BIAS_UNIT   cpu shares prev's last-level cache
//! ```
//!
//! The task's own utilization is not subtracted on its previous CPU when
//! it is still accounted there (queued, or it is the waker itself).
//!
//! Candidates are scanned in ascending id; a candidate replaces the best
//! so far only with a strictly greater factor. The search starts from
//! `(prev_cpu, 0)`, so when nothing scores above zero the task stays put.

use crate::config::{Tunables, AFFINE_BIAS, BIAS_UNIT, BUSY_MARGIN};
use crate::scheduler::{Candidate, RunQueueView, Wake, WakeFlags};
use crate::task::Task;
use crate::topology::{CapacityTable, Locality};

/// Choose a CPU for fair-share `task`, last run on `prev_cpu`.
///
/// `local` describes `prev_cpu`'s neighbourhood.
pub fn select_cpu<R: RunQueueView + ?Sized>(
    task: &Task,
    prev_cpu: usize,
    wake: &Wake,
    rqs: &R,
    caps: &CapacityTable,
    local: &Locality,
    tunables: &Tunables,
) -> usize {
    let cpus = task.cpus_allowed.and(&local.active);
    if cpus.is_empty() {
        let cpu = task.cpus_allowed.first().unwrap_or(0);
        log::debug!("[sss] task {}: no active allowed cpu, using {}", task.id, cpu);
        return cpu;
    }

    let mut affine = false;
    if wake.flags.contains(WakeFlags::TTWU) {
        let sync = wake.flags.contains(WakeFlags::SYNC) && !wake.waker_exiting;
        let valid = cpus.contains(wake.this_cpu);

        if (wake.flags.contains(WakeFlags::CURRENT_CPU) || sync) && valid {
            return wake.this_cpu;
        }
        affine = !wake.wake_wide && valid;
    }

    let exec = wake.flags.contains(WakeFlags::EXEC);
    let smt_bonus = (!affine && wake.flags.contains(WakeFlags::TTWU))
        .then_some(BIAS_UNIT * tunables.smt_bias() as i64);
    let llc_bonus = BIAS_UNIT * tunables.llc_bias() as i64;

    let p_util = task.util_est as i64;
    let p_queued = task.queued || wake.waker_is_task;

    let mut best = Candidate {
        cpu: prev_cpu,
        factor: 0,
    };

    for cpu in cpus.iter() {
        let util = rqs.util(cpu);
        let mut factor = caps.capacity(cpu) as i64 - util.cfs as i64 - util.rt as i64 - util.dl as i64;

        if !p_queued || cpu != prev_cpu {
            factor -= p_util;
        }

        // Locality only pays off on a CPU with room to spare.
        if !exec && factor >= BUSY_MARGIN {
            if affine && (cpu == wake.this_cpu || cpu == prev_cpu) {
                factor += BIAS_UNIT * AFFINE_BIAS;
            }
            if let Some(bonus) = smt_bonus {
                if local.smt.contains(cpu) {
                    factor += bonus;
                }
            }
            if local.llc.is_some_and(|llc| llc.contains(cpu)) {
                factor += llc_bonus;
            }
        }

        if factor > best.factor {
            best = Candidate { cpu, factor };
        }
    }

    best.cpu
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_CPUS;
    use crate::cpumask::CpuMask;
    use crate::scheduler::{RqCurr, RqUtil};
    use crate::task::{CloneFlags, TaskConfig, TaskTable};
    use crate::topology::Topology;

    /// Per-CPU utilization table.
    struct Rqs([RqUtil; MAX_CPUS]);

    impl Rqs {
        fn idle() -> Self {
            Self([RqUtil::default(); MAX_CPUS])
        }

        fn busy(mut self, cpu: usize, cfs: u32) -> Self {
            self.0[cpu].cfs = cfs;
            self
        }
    }

    impl RunQueueView for Rqs {
        fn util(&self, cpu: usize) -> RqUtil {
            self.0[cpu]
        }

        fn curr(&self, _cpu: usize) -> Option<RqCurr> {
            None
        }
    }

    fn fair_task(nr_cpus: usize, util: u32) -> Task {
        let mut table = TaskTable::new();
        let id = table.create(TaskConfig::fair(nr_cpus), None, CloneFlags::empty()).unwrap();
        let task = table.get_mut(id).unwrap();
        task.util_est = util;
        *task
    }

    fn pick(task: &Task, prev: usize, wake: Wake, rqs: &Rqs, topo: &Topology) -> usize {
        let caps = CapacityTable::uniform(topo.active.weight()).unwrap();
        select_cpu(task, prev, &wake, rqs, &caps, &topo.locality(prev), &Tunables::default())
    }

    #[test]
    fn test_equal_factors_pick_lowest_cpu() {
        let task = fair_task(4, 100);
        let topo = Topology::flat(4);
        assert_eq!(pick(&task, 3, Wake::fork(0), &Rqs::idle(), &topo), 0);
    }

    #[test]
    fn test_most_remaining_capacity_wins() {
        let task = fair_task(4, 100);
        let topo = Topology::flat(4);
        let rqs = Rqs::idle().busy(0, 300).busy(1, 200).busy(2, 50).busy(3, 400);
        assert_eq!(pick(&task, 0, Wake::fork(0), &rqs, &topo), 2);
    }

    #[test]
    fn test_deterministic() {
        let task = fair_task(8, 10);
        let topo = Topology::grouped(8, 2, 4);
        let rqs = Rqs::idle().busy(5, 10).busy(6, 10);
        let first = pick(&task, 5, Wake::ttwu(1), &rqs, &topo);
        for _ in 0..10 {
            assert_eq!(pick(&task, 5, Wake::ttwu(1), &rqs, &topo), first);
        }
    }

    #[test]
    fn test_no_active_allowed_cpu_falls_back() {
        let mut task = fair_task(0, 0);
        task.cpus_allowed = CpuMask::from_cpus(&[6, 7]);
        let topo = Topology::flat(4);
        assert_eq!(pick(&task, 1, Wake::ttwu(0), &Rqs::idle(), &topo), 6);

        task.cpus_allowed = CpuMask::empty();
        assert_eq!(pick(&task, 1, Wake::ttwu(0), &Rqs::idle(), &topo), 0);
    }

    #[test]
    fn test_sync_wakeup_stays_on_waker() {
        let task = fair_task(4, 0);
        let topo = Topology::flat(4);
        let rqs = Rqs::idle().busy(2, 1000);
        let wake = Wake::ttwu(2).with(WakeFlags::SYNC);
        assert_eq!(pick(&task, 0, wake, &rqs, &topo), 2);

        let wake = Wake::ttwu(2).with(WakeFlags::CURRENT_CPU);
        assert_eq!(pick(&task, 0, wake, &rqs, &topo), 2);
    }

    #[test]
    fn test_sync_ignored_when_waker_exiting() {
        let task = fair_task(4, 0);
        let topo = Topology::flat(4);
        let rqs = Rqs::idle().busy(2, 1000);
        let mut wake = Wake::ttwu(2).with(WakeFlags::SYNC);
        wake.waker_exiting = true;
        assert_ne!(pick(&task, 0, wake, &rqs, &topo), 2);
    }

    #[test]
    fn test_sync_needs_allowed_waker_cpu() {
        let mut task = fair_task(4, 0);
        task.cpus_allowed = CpuMask::from_cpus(&[0, 1]);
        let topo = Topology::flat(4);
        let wake = Wake::ttwu(3).with(WakeFlags::SYNC);
        // No shortcut; prev CPU 1 wins on its sibling bonus.
        assert_eq!(pick(&task, 1, wake, &Rqs::idle(), &topo), 1);
    }

    #[test]
    fn test_affine_bonus_favours_waker_and_prev() {
        let task = fair_task(4, 0);
        let topo = Topology::flat(4);
        // CPU 0 has 100 more spare capacity than the waker's CPU 2, less
        // than the affine bonus.
        let rqs = Rqs::idle().busy(1, 300).busy(2, 100).busy(3, 500);
        assert_eq!(pick(&task, 3, Wake::ttwu(2), &rqs, &topo), 2);

        // Wake-wide disables the affine bonus.
        assert_eq!(pick(&task, 3, Wake::ttwu(2).wide(), &rqs, &topo), 0);
    }

    #[test]
    fn test_smt_bonus_only_for_non_affine_wakeups() {
        let task = fair_task(4, 0);
        // SMT pairs {0,1} {2,3}, no shared LLC.
        let mut topo = Topology::grouped(4, 2, 1);
        topo.llc = [None; MAX_CPUS];
        let rqs = Rqs::idle().busy(2, 100).busy(3, 200);

        // Wake-wide is never affine, so prev's siblings {2, 3} get the bonus.
        assert_eq!(pick(&task, 3, Wake::ttwu(0).wide(), &rqs, &topo), 2);

        // Fork placement gets no SMT bonus: plain spare capacity wins.
        assert_eq!(pick(&task, 3, Wake::fork(0), &rqs, &topo), 0);
    }

    #[test]
    fn test_llc_bonus() {
        let task = fair_task(8, 0);
        let topo = Topology::grouped(8, 1, 4);
        let rqs = Rqs::idle().busy(4, 64).busy(5, 64).busy(6, 64).busy(7, 64);
        // Prev CPU 5 shares LLC with 4..7; the 64 deficit is below the bonus.
        assert_eq!(pick(&task, 5, Wake::fork(0), &rqs, &topo), 4);
    }

    #[test]
    fn test_exec_skips_locality() {
        let task = fair_task(8, 0);
        let topo = Topology::grouped(8, 1, 4);
        let rqs = Rqs::idle().busy(4, 64).busy(5, 64).busy(6, 64).busy(7, 64);
        assert_eq!(pick(&task, 5, Wake::exec(0), &rqs, &topo), 0);
    }

    #[test]
    fn test_busy_cpu_gets_no_bonus() {
        let task = fair_task(2, 0);
        let topo = Topology::flat(2);
        // Both CPUs are below the margin, so prev's LLC bonus is withheld.
        let rqs = Rqs::idle().busy(0, 1024 - 125).busy(1, 1024 - 120);
        assert_eq!(pick(&task, 1, Wake::fork(0), &rqs, &topo), 0);
    }

    #[test]
    fn test_own_util_not_double_counted_on_prev() {
        let mut task = fair_task(2, 300);
        let topo = Topology::flat(2);
        // Prev CPU 1 already carries the task's 300.
        let rqs = Rqs::idle().busy(0, 100).busy(1, 300);
        task.queued = true;
        assert_eq!(pick(&task, 1, Wake::fork(0), &rqs, &topo), 1);

        task.queued = false;
        assert_eq!(pick(&task, 1, Wake::fork(0), &rqs, &topo), 0);
    }

    #[test]
    fn test_overloaded_system_keeps_prev() {
        let task = fair_task(3, 200);
        let topo = Topology::flat(3);
        let rqs = Rqs::idle().busy(0, 1024).busy(1, 1024).busy(2, 1024);
        assert_eq!(pick(&task, 1, Wake::fork(0), &rqs, &topo), 1);
    }
}
