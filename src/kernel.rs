//! # Kernel Interface
//!
//! The single global [`SchedCore`] and the free-function hooks the host
//! kernel calls into.
//!
//! ## Startup Sequence
//!
//! ```text
//! host boot
//!   ├─► kernel::init(capacities, topology)   ← banner, capacity classes
//!   ├─► kernel::init_task(tasks, boot_id)    ← zero boot task's burst state
//!   └─► scheduler running
//!         ├─► on_spawn / on_tick / on_sleep ...
//!         └─► select_cpu_fair / select_cpu_rt
//! ```
//!
//! Every hook before `init` is a no-op that returns the neutral answer
//! (`None`, or the previous CPU for placement).

use spin::Once;

use crate::config::{ConfigError, Tunables};
use crate::prio::Reweight;
use crate::scheduler::{RunQueueView, SchedCore, Wake};
use crate::task::{CloneFlags, Task, TaskId, TaskTable};
use crate::topology::{CapacityTable, Topology};

// ---------------------------------------------------------------------------
// Global instance
// ---------------------------------------------------------------------------

static CORE: Once<SchedCore> = Once::new();

/// Initialize the global core. Fails if already initialized or if the
/// capacity list is unusable.
pub fn init(capacities: &[u32], topology: Topology) -> Result<&'static SchedCore, ConfigError> {
    let table = CapacityTable::from_capacities(capacities)?;
    let mut fresh = false;
    let core = CORE.call_once(|| {
        fresh = true;
        SchedCore::with_topology(table, topology)
    });
    if !fresh {
        return Err(ConfigError::AlreadyInitialized);
    }
    Ok(core)
}

/// The global core, once initialized.
#[inline]
pub fn core() -> Option<&'static SchedCore> {
    CORE.get()
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

pub fn init_task(tasks: &mut TaskTable, boot: TaskId) {
    if let Some(core) = core() {
        core.init_task(tasks, boot);
    }
}

pub fn on_spawn(tasks: &mut TaskTable, new_task: TaskId, creator: TaskId, flags: CloneFlags, now: u64) {
    if let Some(core) = core() {
        core.on_spawn(tasks, new_task, creator, flags, now);
    }
}

pub fn on_tick(task: &mut Task, delta_exec: u64) -> Option<Reweight> {
    core()?.on_tick(task, delta_exec)
}

pub fn on_sleep(task: &mut Task) -> Option<Reweight> {
    core()?.on_sleep(task)
}

pub fn on_sleep_and_rescale(task: &mut Task) -> Option<Reweight> {
    core()?.on_sleep_and_rescale(task)
}

pub fn reset(task: &mut Task) {
    if let Some(core) = core() {
        core.reset(task);
    }
}

pub fn on_enqueue_rt(cpu: usize, normal_prio: u8) {
    if let Some(core) = core() {
        core.on_enqueue_rt(cpu, normal_prio);
    }
}

pub fn on_dequeue_rt(cpu: usize, normal_prio: u8) {
    if let Some(core) = core() {
        core.on_dequeue_rt(cpu, normal_prio);
    }
}

pub fn select_cpu_fair<R: RunQueueView + ?Sized>(task: &Task, prev_cpu: usize, wake: &Wake, rqs: &R) -> usize {
    core().map_or(prev_cpu, |core| core.select_cpu_fair(task, prev_cpu, wake, rqs))
}

pub fn select_cpu_rt<R: RunQueueView + ?Sized>(task: &Task, prev_cpu: usize, wake: &Wake, rqs: &R) -> usize {
    core().map_or(prev_cpu, |core| core.select_cpu_rt(task, prev_cpu, wake, rqs))
}

/// Update both bias multipliers (sysctl-style write).
///
/// Out-of-range values are rejected even before `init`; a valid write
/// before `init` is dropped.
pub fn set_tunables(smt_bias: u32, llc_bias: u32) -> Result<(), ConfigError> {
    let tunables = Tunables::new(smt_bias, llc_bias)?;
    match core() {
        Some(core) => core.set_tunables(tunables.smt_bias(), tunables.llc_bias()),
        None => Ok(()),
    }
}

pub fn update_topology(topology: Topology) {
    if let Some(core) = core() {
        core.update_topology(topology);
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
