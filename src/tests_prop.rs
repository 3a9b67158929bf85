#![cfg(test)]
//! Property tests for the burst-penalty model, inheritance caching and
//! placement.
//!
//! Scenarios:
//!   - penalty is monotone in burst time and bounded by `MAX_PENALTY`
//!   - repeated sleeps converge `prev_burst_penalty` without overshoot
//!   - effective priority stays in `0..=39`; kernel threads score 0
//!   - a cache record is served unchanged inside its lifetime
//!   - matched RT enqueue/dequeue leaves the bank unchanged
//!   - fair and RT selection return an allowed CPU (or prev) and are
//!     deterministic

use proptest::prelude::*;

use crate::burst::{self, binary_smooth, penalty_from_burst_time};
use crate::config::{CACHE_LIFETIME_NS, MAX_CPUS, MAX_EFFECTIVE_PRIO, MAX_PENALTY, SMOOTHNESS, Tunables};
use crate::cpumask::CpuMask;
use crate::inherit::{self, Scope};
use crate::prio;
use crate::rt_bank::RtFactorBank;
use crate::scheduler::{RqCurr, RqUtil, RunQueueView, Wake};
use crate::task::{CloneFlags, Task, TaskConfig, TaskFlags, TaskTable};
use crate::topology::{CapacityTable, Topology};
use crate::{fair, rt};

struct Rqs {
    util: [RqUtil; MAX_CPUS],
}

impl RunQueueView for Rqs {
    fn util(&self, cpu: usize) -> RqUtil {
        self.util[cpu]
    }

    fn curr(&self, _cpu: usize) -> Option<RqCurr> {
        None
    }
}

fn make_task(config: TaskConfig) -> Task {
    let mut table = TaskTable::new();
    let id = table.create(config, None, CloneFlags::empty()).unwrap();
    *table.get(id).unwrap()
}

fn arb_mask(nr_cpus: usize) -> impl Strategy<Value = CpuMask> {
    any::<u64>().prop_map(move |bits| {
        let mut mask = CpuMask::empty();
        for cpu in 0..nr_cpus {
            if bits & (1 << cpu) != 0 {
                mask.set(cpu);
            }
        }
        mask
    })
}

proptest! {
    #[test]
    fn penalty_monotone_and_bounded(a in any::<u64>(), b in any::<u64>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(penalty_from_burst_time(lo) <= penalty_from_burst_time(hi));
        prop_assert!(penalty_from_burst_time(hi) <= MAX_PENALTY);
    }

    #[test]
    fn smoothing_converges_without_overshoot(
        target in 0u32..=MAX_PENALTY,
        start in 0u32..=MAX_PENALTY,
        divider in 1u8..=SMOOTHNESS,
    ) {
        let mut value = start;
        for _ in 0..=(MAX_PENALTY as usize) {
            let next = binary_smooth(target, value, divider);
            if target >= value {
                prop_assert!(next <= target && next >= value);
            } else {
                prop_assert!(next >= target && next <= value);
            }
            value = next;
            if value == target {
                break;
            }
        }
        prop_assert_eq!(value, target);
    }

    #[test]
    fn repeated_sleeps_reach_burst_penalty(
        burst_ms in 40u64..5_000,
        start in 0u32..=MAX_PENALTY,
    ) {
        let mut task = make_task(TaskConfig::fair(1));
        task.se.prev_burst_penalty = start;
        task.se.burst_penalty = start;
        task.se.burst_count = SMOOTHNESS;
        let curr = penalty_from_burst_time(burst_ms * 1_000_000);
        for _ in 0..=(MAX_PENALTY as usize) {
            burst::on_tick(&mut task, burst_ms * 1_000_000);
            let before = task.se.prev_burst_penalty;
            burst::on_sleep(&mut task);
            let after = task.se.prev_burst_penalty;
            prop_assert_eq!(task.se.burst_count, SMOOTHNESS);
            prop_assert_eq!(task.se.burst_penalty, after);
            if curr >= before {
                prop_assert!(after >= before && after <= curr);
            } else {
                prop_assert!(after <= before && after >= curr);
            }
            if before != curr {
                prop_assert!(after != before, "each sleep makes progress");
            }
            if after == curr {
                break;
            }
        }
        prop_assert_eq!(task.se.prev_burst_penalty, curr);
    }

    #[test]
    fn effective_prio_clamped(
        static_prio in 100u8..140,
        penalty in 0u32..=MAX_PENALTY,
        kthread in any::<bool>(),
    ) {
        let flags = if kthread { TaskFlags::KTHREAD } else { TaskFlags::empty() };
        let mut task = make_task(TaskConfig { static_prio, flags, ..TaskConfig::fair(1) });
        task.se.burst_penalty = penalty;
        prio::update_burst_score(&mut task);
        prop_assert!(prio::effective_prio(&task) <= MAX_EFFECTIVE_PRIO);
        if kthread {
            prop_assert_eq!(task.se.burst_score, 0);
        }
    }

    #[test]
    fn cache_fresh_within_lifetime(
        penalties in proptest::collection::vec(0u32..=MAX_PENALTY, 0..8),
        start in CACHE_LIFETIME_NS..(1u64 << 40),
        age in 0u64..CACHE_LIFETIME_NS,
        changed in 0u32..=MAX_PENALTY,
    ) {
        let mut tasks = TaskTable::new();
        let parent = tasks.create(TaskConfig::fair(1), None, CloneFlags::empty()).unwrap();
        let mut children = Vec::new();
        for p in &penalties {
            let c = tasks.create(TaskConfig::fair(1), Some(parent), CloneFlags::empty()).unwrap();
            tasks.get_mut(c).unwrap().se.burst_penalty = *p;
            children.push(c);
        }
        let first = inherit::inherited_penalty(&mut tasks, parent, Scope::Children, None, start);
        for &c in &children {
            tasks.get_mut(c).unwrap().se.burst_penalty = changed;
        }
        let again = inherit::inherited_penalty(&mut tasks, parent, Scope::Children, None, start + age);
        prop_assert_eq!(first, again);
        prop_assert_eq!(tasks.get(parent).unwrap().se.child_burst.timestamp, start);
    }

    #[test]
    fn bank_conserved(ops in proptest::collection::vec((0usize..4, 0u8..100), 0..64)) {
        let bank = RtFactorBank::new();
        bank.add(2, 7);
        let before: Vec<i32> = (0..4).map(|c| bank.read(c)).collect();
        for &(cpu, prio) in &ops {
            bank.add(cpu, prio);
        }
        for &(cpu, prio) in ops.iter().rev() {
            bank.sub(cpu, prio);
        }
        let after: Vec<i32> = (0..4).map(|c| bank.read(c)).collect();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn fair_pick_is_allowed_or_prev(
        allowed in arb_mask(8),
        utils in proptest::collection::vec(0u32..1200, 8),
        prev in 0usize..8,
        this_cpu in 0usize..8,
        util_est in 0u32..600,
    ) {
        let mut task = make_task(TaskConfig::fair(8));
        task.cpus_allowed = allowed;
        task.util_est = util_est;
        let mut rqs = Rqs { util: [RqUtil::default(); MAX_CPUS] };
        for (cpu, &u) in utils.iter().enumerate() {
            rqs.util[cpu].cfs = u;
        }
        let topo = Topology::grouped(8, 2, 4);
        let caps = CapacityTable::uniform(8).unwrap();
        let wake = Wake::ttwu(this_cpu);
        let local = topo.locality(prev);
        let tunables = Tunables::default();
        let cpu = fair::select_cpu(&task, prev, &wake, &rqs, &caps, &local, &tunables);
        prop_assert!(cpu == prev || allowed.contains(cpu) || (allowed.is_empty() && cpu == 0));
        prop_assert_eq!(cpu, fair::select_cpu(&task, prev, &wake, &rqs, &caps, &local, &tunables));
    }

    #[test]
    fn rt_pick_minimizes_bank(
        banks in proptest::collection::vec(0u8..100, 4),
        rt_priority in 1u8..99,
    ) {
        let task = make_task(TaskConfig::realtime(rt_priority, 4));
        let bank = RtFactorBank::new();
        for (cpu, &p) in banks.iter().enumerate() {
            bank.add(cpu, p);
        }
        let caps = CapacityTable::uniform(4).unwrap();
        let rqs = Rqs { util: [RqUtil::default(); MAX_CPUS] };
        let cpu = rt::select_cpu(&task, 0, &Wake::ttwu(0), &rqs, &caps, &bank, &CpuMask::first_n(4));
        let min = (0..4).map(|c| bank.read(c)).min().unwrap();
        prop_assert_eq!(bank.read(cpu), min);
        let first_min = (0..4).find(|&c| bank.read(c) == min).unwrap();
        prop_assert_eq!(cpu, first_min);
    }
}
