//! # Scheduler Core
//!
//! [`SchedCore`] bundles the policy state shared by every CPU and exposes
//! the lifecycle hooks the external run-queue engine calls.
//!
//! ## Hook Sequence
//!
//! ```text
//!   spawn ──► on_spawn ─────────────── seed penalty from relatives
//!   wake  ──► select_cpu_fair / _rt ── pick a CPU, engine enqueues
//!   run   ──► on_tick (every quantum)  may return Reweight
//!   block ──► on_sleep[_and_rescale] ─ close burst, may return Reweight
//!   RT enqueue / dequeue ──► on_enqueue_rt / on_dequeue_rt
//!   exec  ──► reset
//! ```
//!
//! ## Shared State
//!
//! | Field        | Written by                  | Read by           |
//! |--------------|-----------------------------|-------------------|
//! | `capacities` | `init`                      | both selectors    |
//! | `topology`   | `update_topology`           | both selectors    |
//! | `tunables`   | `set_tunables`              | fair selector     |
//! | `bank`       | RT enqueue / dequeue hooks  | RT selector       |
//!
//! Per-task state is passed in by `&mut` borrow: the caller holds the
//! owning run-queue lock, or the task is not runnable.

use bitflags::bitflags;
use spin::RwLock;

use crate::config::{ConfigError, Tunables};
use crate::prio::{self, Reweight};
use crate::rt_bank::RtFactorBank;
use crate::task::{CloneFlags, Task, TaskId, TaskTable};
use crate::topology::{CapacityTable, Topology};
use crate::{burst, fair, inherit, rt, sync};

/// Program name printed by the boot banner.
pub const PROGNAME: &str = "BORE CPU Scheduler modification";

/// Version printed by the boot banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Engine-facing types
// ---------------------------------------------------------------------------

bitflags! {
    /// Circumstances of a task becoming runnable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WakeFlags: u32 {
        /// Generic wakeup of a blocked task.
        const TTWU = 1 << 0;
        /// The waker is about to block; the wakee may run right here.
        const SYNC = 1 << 1;
        /// Task just replaced its program image.
        const EXEC = 1 << 2;
        /// Task was just created.
        const FORK = 1 << 3;
        /// Caller asks for the waking CPU.
        const CURRENT_CPU = 1 << 4;
    }
}

/// Wakeup context: flags plus what the engine knows about the waker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Wake {
    pub flags: WakeFlags,
    /// CPU performing the wakeup.
    pub this_cpu: usize,
    /// The waking task is exiting.
    pub waker_exiting: bool,
    /// The task being placed is the one currently running on `this_cpu`.
    pub waker_is_task: bool,
    /// The waker fans out to many wakees; affine placement would pile
    /// them onto one CPU.
    pub wake_wide: bool,
}

impl Wake {
    pub fn new(flags: WakeFlags, this_cpu: usize) -> Self {
        Self {
            flags,
            this_cpu,
            ..Self::default()
        }
    }

    /// Generic wakeup from `this_cpu`.
    pub fn ttwu(this_cpu: usize) -> Self {
        Self::new(WakeFlags::TTWU, this_cpu)
    }

    /// Placement of a freshly forked task.
    pub fn fork(this_cpu: usize) -> Self {
        Self::new(WakeFlags::FORK, this_cpu)
    }

    /// Placement after an exec.
    pub fn exec(this_cpu: usize) -> Self {
        Self::new(WakeFlags::EXEC, this_cpu)
    }

    #[must_use]
    pub fn with(mut self, flags: WakeFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn wide(mut self) -> Self {
        self.wake_wide = true;
        self
    }
}

/// Utilization figures of one run queue, in capacity units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RqUtil {
    /// Estimated fair-share utilization.
    pub cfs: u32,
    /// Average real-time utilization.
    pub rt: u32,
    /// Average deadline utilization.
    pub dl: u32,
}

/// What is running on a CPU right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RqCurr {
    /// Migratability of the task actually executing.
    pub nr_cpus_allowed: usize,
    /// Class of the task whose scheduling context is in use (the donor,
    /// which differs from the executing task under proxy execution).
    pub donor_is_rt: bool,
    pub donor_normal_prio: u8,
}

/// Read-only view of the engine's per-CPU run queues.
///
/// Values may be stale by the time they are used; the selectors treat them
/// as estimates.
pub trait RunQueueView {
    fn util(&self, cpu: usize) -> RqUtil;

    /// `None` when the CPU is idle or unknown.
    fn curr(&self, cpu: usize) -> Option<RqCurr>;
}

/// A CPU under consideration and its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub cpu: usize,
    pub factor: i64,
}

// ---------------------------------------------------------------------------
// SchedCore
// ---------------------------------------------------------------------------

/// Shared policy state and the hooks operating on it.
pub struct SchedCore {
    capacities: RwLock<CapacityTable>,
    topology: RwLock<Topology>,
    tunables: RwLock<Tunables>,
    bank: RtFactorBank,
}

impl SchedCore {
    /// A core with no CPUs, an empty topology and default tunables.
    pub const fn new() -> Self {
        Self {
            capacities: RwLock::new(CapacityTable::new()),
            topology: RwLock::new(Topology::empty()),
            tunables: RwLock::new(Tunables::DEFAULT),
            bank: RtFactorBank::new(),
        }
    }

    /// A core over an already classified capacity table and topology.
    pub fn with_topology(capacities: CapacityTable, topology: Topology) -> Self {
        let core = Self::new();
        core.install_capacities(capacities);
        sync::replace(&core.topology, topology);
        core
    }

    /// One-time capacity discovery: `capacities[cpu]` for every present
    /// CPU. Classifies the high-performance subset.
    pub fn init(&self, capacities: &[u32]) -> Result<(), ConfigError> {
        let table = CapacityTable::from_capacities(capacities)?;
        self.install_capacities(table);
        Ok(())
    }

    fn install_capacities(&self, table: CapacityTable) {
        log::info!("[bore] {} {}", PROGNAME, VERSION);
        log::info!(
            "[sss] {} cpus, {} high-performance, asymmetric: {}",
            table.present().weight(),
            table.hp_mask().weight(),
            table.is_asymmetric()
        );
        sync::replace(&self.capacities, table);
    }

    /// Reset the boot task's burst state.
    pub fn init_task(&self, tasks: &mut TaskTable, boot: TaskId) {
        if let Ok(task) = tasks.get_mut(boot) {
            burst::reset(task);
        }
    }

    pub fn capacities(&self) -> CapacityTable {
        sync::snapshot(&self.capacities)
    }

    pub fn topology(&self) -> Topology {
        sync::snapshot(&self.topology)
    }

    /// Install a new online topology.
    pub fn update_topology(&self, topology: Topology) {
        log::debug!("[sss] topology update: active {:?}", topology.active);
        sync::replace(&self.topology, topology);
    }

    pub fn tunables(&self) -> Tunables {
        sync::snapshot(&self.tunables)
    }

    /// Replace both bias multipliers.
    pub fn set_tunables(&self, smt_bias: u32, llc_bias: u32) -> Result<(), ConfigError> {
        match Tunables::new(smt_bias, llc_bias) {
            Ok(t) => {
                sync::replace(&self.tunables, t);
                log::info!("[sss] smt_bias={} llc_bias={}", smt_bias, llc_bias);
                Ok(())
            }
            Err(e) => {
                log::warn!("[sss] rejected tunables: {}", e);
                Err(e)
            }
        }
    }

    /// Set only the SMT-sibling bias, keeping the LLC bias.
    pub fn set_smt_bias(&self, smt_bias: u32) -> Result<(), ConfigError> {
        let llc_bias = self.tunables().llc_bias();
        self.set_tunables(smt_bias, llc_bias)
    }

    /// Set only the last-level-cache bias, keeping the SMT bias.
    pub fn set_llc_bias(&self, llc_bias: u32) -> Result<(), ConfigError> {
        let smt_bias = self.tunables().smt_bias();
        self.set_tunables(smt_bias, llc_bias)
    }

    // -- Burst lifecycle ----------------------------------------------------

    /// Seed `new_task`'s burst state from its relatives. `creator` is the
    /// task that performed the spawn.
    pub fn on_spawn(
        &self,
        tasks: &mut TaskTable,
        new_task: TaskId,
        creator: TaskId,
        flags: CloneFlags,
        now: u64,
    ) {
        inherit::seed_spawned(tasks, new_task, creator, flags, now);
    }

    /// Account `delta_exec` ns of run time.
    pub fn on_tick(&self, task: &mut Task, delta_exec: u64) -> Option<Reweight> {
        burst::on_tick(task, delta_exec)
    }

    /// The task blocked: close its burst.
    pub fn on_sleep(&self, task: &mut Task) -> Option<Reweight> {
        burst::on_sleep(task)
    }

    /// As [`on_sleep`](Self::on_sleep), and re-express the outstanding
    /// deadline if the task's priority improved.
    pub fn on_sleep_and_rescale(&self, task: &mut Task) -> Option<Reweight> {
        let prev_prio = prio::effective_prio(task);
        let reweight = burst::on_sleep(task);
        let new_prio = prio::effective_prio(task);
        prio::rescale_deadline(task, prev_prio, new_prio);
        reweight
    }

    /// Zero all burst and cache state, as after exec.
    pub fn reset(&self, task: &mut Task) {
        burst::reset(task);
    }

    // -- RT factor bank -----------------------------------------------------

    pub fn on_enqueue_rt(&self, cpu: usize, normal_prio: u8) {
        self.bank.add(cpu, normal_prio);
    }

    pub fn on_dequeue_rt(&self, cpu: usize, normal_prio: u8) {
        self.bank.sub(cpu, normal_prio);
    }

    pub fn rt_factor(&self, cpu: usize) -> i32 {
        self.bank.read(cpu)
    }

    // -- Placement ----------------------------------------------------------

    /// CPU for a fair-share task becoming runnable.
    pub fn select_cpu_fair<R: RunQueueView + ?Sized>(
        &self,
        task: &Task,
        prev_cpu: usize,
        wake: &Wake,
        rqs: &R,
    ) -> usize {
        let local = sync::read_with(&self.topology, |t| t.locality(prev_cpu));
        let tunables = self.tunables();
        let caps = self.capacities();
        fair::select_cpu(task, prev_cpu, wake, rqs, &caps, &local, &tunables)
    }

    /// CPU for a real-time task becoming runnable.
    pub fn select_cpu_rt<R: RunQueueView + ?Sized>(
        &self,
        task: &Task,
        prev_cpu: usize,
        wake: &Wake,
        rqs: &R,
    ) -> usize {
        let active = sync::read_with(&self.topology, |t| t.active);
        let caps = self.capacities();
        rt::select_cpu(task, prev_cpu, wake, rqs, &caps, &self.bank, &active)
    }
}

impl Default for SchedCore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
