//! # Task Model
//!
//! Defines the per-task state the burst-penalty and placement policies read
//! and write, and the fixed-capacity arena that stands in for the external
//! engine's task registry.
//!
//! ## Ownership Graph
//!
//! The parent/child/thread-group relations are plain indices into the
//! [`TaskTable`]:
//!
//! ```text
//!        ┌───────────── parent ──────────────┐
//!        ▼                                   │
//!   ┌─────────┐  children (scan parent==id)  ┌─────────┐
//!   │ anchor  │ ───────────────────────────► │  child  │
//!   └─────────┘                              └─────────┘
//!        ▲                                        │
//!        └──────────── group_leader ──────────────┘ (threads)
//! ```
//!
//! Children and threads are discovered by scanning the arena, so nothing
//! has to be unlinked when a task exits; an exiting task simply stops being
//! *eligible*.

use bitflags::bitflags;
use thiserror::Error;

use crate::config::{DEFAULT_PRIO, MAX_RT_PRIO, MAX_TASKS};
use crate::cpumask::CpuMask;
use crate::inherit::BurstCache;
use crate::prio::{self, LoadWeight};

/// Index of a task in the [`TaskTable`].
pub type TaskId = usize;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Scheduling class a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedClass {
    /// Fair-share time sharing. The only class burst penalties apply to.
    Fair,
    /// Fixed-priority real-time.
    RealTime,
    /// Deadline-driven.
    Deadline,
    /// Per-CPU idle task.
    Idle,
}

bitflags! {
    /// Per-task state flags relevant to the policies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TaskFlags: u32 {
        /// Housekeeping (kernel) thread; never receives a burst score.
        const KTHREAD = 1 << 0;
        /// Task is exiting and no longer counts toward any scope.
        const EXITING = 1 << 1;
    }
}

bitflags! {
    /// Flags describing how a task was spawned.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CloneFlags: u32 {
        /// New thread in the creator's thread group.
        const THREAD = 1 << 0;
        /// New task becomes a sibling of its creator (shares the
        /// creator's parent).
        const PARENT = 1 << 1;
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task table full")]
    TableFull,
    #[error("no task with id {0}")]
    NoSuchTask(TaskId),
}

// ---------------------------------------------------------------------------
// Schedulable entity
// ---------------------------------------------------------------------------

/// Burst-tracking and weight state of one task.
///
/// All penalty values are fixed-point with
/// [`PENALTY_SHIFT`](crate::config::PENALTY_SHIFT) fractional bits.
/// `vruntime` and `deadline` belong to the external engine; only
/// [`prio::rescale_deadline`] writes `deadline` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedEntity {
    /// Run time accumulated since the last sleep.
    pub burst_time: u64,
    /// Penalty of the current, still-running burst.
    pub curr_burst_penalty: u32,
    /// Smoothed penalty carried over from previous bursts.
    pub prev_burst_penalty: u32,
    /// Penalty actually applied to the priority.
    pub burst_penalty: u32,
    /// Whole priority levels subtracted from the task.
    pub burst_score: u8,
    /// Smoothing window. Starts at 1, saturates at
    /// [`SMOOTHNESS`](crate::config::SMOOTHNESS).
    pub burst_count: u8,
    /// Inheritance cache over this task's direct children.
    pub child_burst: BurstCache,
    /// Inheritance cache over this task's thread group.
    pub group_burst: BurstCache,
    /// Virtual runtime.
    pub vruntime: u64,
    /// Virtual deadline.
    pub deadline: u64,
    /// Current scheduling weight.
    pub load: LoadWeight,
}

impl SchedEntity {
    pub const fn new() -> Self {
        Self {
            burst_time: 0,
            curr_burst_penalty: 0,
            prev_burst_penalty: 0,
            burst_penalty: 0,
            burst_score: 0,
            burst_count: 1,
            child_burst: BurstCache::new(),
            group_burst: BurstCache::new(),
            vruntime: 0,
            deadline: 0,
            load: prio::weight_of(DEFAULT_PRIO - MAX_RT_PRIO),
        }
    }
}

impl Default for SchedEntity {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Task configuration
// ---------------------------------------------------------------------------

/// Static parameters of a task, supplied at creation.
#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
    pub class: SchedClass,
    /// Static priority, `MAX_RT_PRIO..MAX_PRIO`. 120 is nice 0.
    pub static_prio: u8,
    /// Real-time priority level `1..=99`; ignored for other classes.
    pub rt_priority: u8,
    pub flags: TaskFlags,
    pub cpus_allowed: CpuMask,
}

impl TaskConfig {
    /// A nice-0 fair-share task allowed on CPUs `0..nr_cpus`.
    pub fn fair(nr_cpus: usize) -> Self {
        Self {
            class: SchedClass::Fair,
            static_prio: DEFAULT_PRIO,
            rt_priority: 0,
            flags: TaskFlags::empty(),
            cpus_allowed: CpuMask::first_n(nr_cpus),
        }
    }

    /// A real-time task at `rt_priority` allowed on CPUs `0..nr_cpus`.
    pub fn realtime(rt_priority: u8, nr_cpus: usize) -> Self {
        Self {
            class: SchedClass::RealTime,
            rt_priority,
            ..Self::fair(nr_cpus)
        }
    }

    /// Normal priority derived from class: real-time tasks map
    /// `rt_priority` 99..1 onto 0..98, everything else uses `static_prio`.
    pub fn normal_prio(&self) -> u8 {
        match self.class {
            SchedClass::RealTime => (MAX_RT_PRIO - 1).saturating_sub(self.rt_priority),
            SchedClass::Deadline => 0,
            SchedClass::Fair | SchedClass::Idle => self.static_prio,
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Task {
    pub id: TaskId,
    /// Whether this slot holds a live task.
    pub active: bool,
    pub parent: TaskId,
    pub group_leader: TaskId,
    pub class: SchedClass,
    pub flags: TaskFlags,
    pub static_prio: u8,
    pub normal_prio: u8,
    pub cpus_allowed: CpuMask,
    /// Queued on (or running from) a run queue.
    pub queued: bool,
    /// Estimated utilization, in capacity units.
    pub util_est: u32,
    pub se: SchedEntity,
}

impl Task {
    /// Unallocated slot. Used to initialize the arena.
    pub const EMPTY: Self = Self {
        id: 0,
        active: false,
        parent: 0,
        group_leader: 0,
        class: SchedClass::Fair,
        flags: TaskFlags::empty(),
        static_prio: DEFAULT_PRIO,
        normal_prio: DEFAULT_PRIO,
        cpus_allowed: CpuMask::empty(),
        queued: false,
        util_est: 0,
        se: SchedEntity::new(),
    };

    fn init(&mut self, id: TaskId, parent: TaskId, group_leader: TaskId, config: &TaskConfig) {
        *self = Self {
            id,
            active: true,
            parent,
            group_leader,
            class: config.class,
            flags: config.flags,
            static_prio: config.static_prio,
            normal_prio: config.normal_prio(),
            cpus_allowed: config.cpus_allowed,
            ..Self::EMPTY
        };
        self.se.load = prio::weight_of(prio::effective_prio(self));
    }

    /// Fair-share and not exiting: the only tasks burst inheritance
    /// considers.
    #[inline]
    pub fn is_eligible(&self) -> bool {
        self.active && self.class == SchedClass::Fair && !self.flags.contains(TaskFlags::EXITING)
    }

    #[inline]
    pub fn is_kthread(&self) -> bool {
        self.flags.contains(TaskFlags::KTHREAD)
    }

    #[inline]
    pub fn is_rt(&self) -> bool {
        self.class == SchedClass::RealTime
    }

    #[inline]
    pub fn nr_cpus_allowed(&self) -> usize {
        self.cpus_allowed.weight()
    }
}

// ---------------------------------------------------------------------------
// Task table
// ---------------------------------------------------------------------------

/// Fixed-size task arena. Task ids are slot indices and are never reused
/// while a slot is active.
pub struct TaskTable {
    tasks: [Task; MAX_TASKS],
}

impl TaskTable {
    pub const fn new() -> Self {
        Self {
            tasks: [Task::EMPTY; MAX_TASKS],
        }
    }

    /// Create a task.
    ///
    /// With no `creator` the task is its own parent and group leader (the
    /// boot task). Otherwise the relations follow `flags`: `THREAD` joins
    /// the creator's thread group, and both `THREAD` and `PARENT` make the
    /// new task share the creator's parent.
    ///
    /// The entity starts zeroed; seed it with
    /// [`SchedCore::on_spawn`](crate::scheduler::SchedCore::on_spawn).
    pub fn create(
        &mut self,
        config: TaskConfig,
        creator: Option<TaskId>,
        flags: CloneFlags,
    ) -> Result<TaskId, TaskError> {
        let id = self
            .tasks
            .iter()
            .position(|t| !t.active)
            .ok_or(TaskError::TableFull)?;

        let (parent, group_leader) = match creator {
            None => (id, id),
            Some(c) => {
                let creator = self.get(c)?;
                let parent = if flags.intersects(CloneFlags::THREAD | CloneFlags::PARENT) {
                    creator.parent
                } else {
                    c
                };
                let leader = if flags.contains(CloneFlags::THREAD) {
                    creator.group_leader
                } else {
                    id
                };
                (parent, leader)
            }
        };

        self.tasks[id].init(id, parent, group_leader, &config);
        Ok(id)
    }

    /// Free a slot. Its cache records and children links simply go stale.
    pub fn release(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.get_mut(id) {
            task.active = false;
        }
    }

    pub fn get(&self, id: TaskId) -> Result<&Task, TaskError> {
        self.tasks
            .get(id)
            .filter(|t| t.active)
            .ok_or(TaskError::NoSuchTask(id))
    }

    pub fn get_mut(&mut self, id: TaskId) -> Result<&mut Task, TaskError> {
        self.tasks
            .get_mut(id)
            .filter(|t| t.active)
            .ok_or(TaskError::NoSuchTask(id))
    }

    /// Live tasks in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.active)
    }

    /// Direct children of `parent` (excluding `parent` itself).
    pub fn children(&self, parent: TaskId) -> impl Iterator<Item = &Task> {
        self.iter().filter(move |t| t.parent == parent && t.id != parent)
    }

    /// Every thread of the group led by `leader`, the leader included.
    pub fn threads(&self, leader: TaskId) -> impl Iterator<Item = &Task> {
        self.iter().filter(move |t| t.group_leader == leader)
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
