//! # Burst Inheritance
//!
//! A newly spawned task starts with the burst penalty typical of its
//! relatives, so a CPU hog cannot shed its penalty by forking.
//!
//! Each potential *scope anchor* carries two [`BurstCache`] records:
//!
//! | Record        | Anchor        | Scope scanned                  |
//! |---------------|---------------|--------------------------------|
//! | `child_burst` | parent        | eligible direct children       |
//! | `group_burst` | group leader  | eligible threads of the group  |
//!
//! A record stores `max(average member penalty, anchor's own penalty)` and
//! is served for [`CACHE_LIFETIME_NS`] before the scope is scanned again.
//! Records are never torn down; they only go stale.

use crate::burst;
use crate::config::CACHE_LIFETIME_NS;
use crate::task::{CloneFlags, Task, TaskId, TaskTable};

/// Time-expiring summary of a scope's burst penalties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BurstCache {
    /// Penalty handed to new members of the scope.
    pub value: u32,
    /// Eligible members seen by the last refresh.
    pub count: u32,
    /// Time of the last refresh, in nanoseconds.
    pub timestamp: u64,
}

impl BurstCache {
    pub const fn new() -> Self {
        Self {
            value: 0,
            count: 0,
            timestamp: 0,
        }
    }

    /// True once `CACHE_LIFETIME_NS` or more has elapsed since the last
    /// refresh. A clock reading behind `timestamp` counts as fresh.
    #[inline]
    pub fn expired(&self, now: u64) -> bool {
        let age = now.wrapping_sub(self.timestamp) as i64;
        age >= CACHE_LIFETIME_NS as i64
    }

    fn store(&mut self, count: u32, sum: u64, own_penalty: u32, now: u64) {
        let avg = if count > 0 { (sum / count as u64) as u32 } else { 0 };
        self.value = avg.max(own_penalty);
        self.count = count;
        self.timestamp = now;
    }
}

/// Which of an anchor's two records to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Direct children of the anchor.
    Children,
    /// Threads of the anchor's group.
    Group,
}

/// Count and penalty sum of the eligible members yielded by `members`.
fn tally<'a>(members: impl Iterator<Item = &'a Task>, exclude: Option<TaskId>) -> (u32, u64) {
    members
        .filter(|t| t.is_eligible() && Some(t.id) != exclude)
        .fold((0, 0), |(n, sum), t| (n + 1, sum + t.se.burst_penalty as u64))
}

/// Rescan `scope` of `anchor`, skipping `exclude` (the task being
/// spawned, which is not yet a member).
pub fn refresh(tasks: &mut TaskTable, anchor: TaskId, scope: Scope, exclude: Option<TaskId>, now: u64) {
    let (count, sum) = match scope {
        Scope::Children => tally(tasks.children(anchor), exclude),
        Scope::Group => tally(tasks.threads(anchor), exclude),
    };

    let Ok(anchor_task) = tasks.get_mut(anchor) else {
        return;
    };
    let own = anchor_task.se.burst_penalty;
    let cache = match scope {
        Scope::Children => &mut anchor_task.se.child_burst,
        Scope::Group => &mut anchor_task.se.group_burst,
    };
    cache.store(count, sum, own, now);
    log::trace!(
        "[bore] refreshed {:?} cache of task {}: {} members, value {}",
        scope,
        anchor,
        count,
        cache.value
    );
}

/// Penalty `anchor` hands to a new member of `scope`, refreshing the record
/// first if it has expired. Returns 0 for an unknown anchor.
pub fn inherited_penalty(
    tasks: &mut TaskTable,
    anchor: TaskId,
    scope: Scope,
    exclude: Option<TaskId>,
    now: u64,
) -> u32 {
    let expired = match tasks.get(anchor) {
        Ok(t) => match scope {
            Scope::Children => t.se.child_burst.expired(now),
            Scope::Group => t.se.group_burst.expired(now),
        },
        Err(_) => return 0,
    };
    if expired {
        refresh(tasks, anchor, scope, exclude, now);
    }
    tasks.get(anchor).map_or(0, |t| match scope {
        Scope::Children => t.se.child_burst.value,
        Scope::Group => t.se.group_burst.value,
    })
}

/// Anchor and scope a spawn inherits from.
///
/// Threads use the creator's group leader; other tasks use the creator, or
/// the creator's parent when spawned with [`CloneFlags::PARENT`].
pub fn spawn_anchor(tasks: &TaskTable, creator: TaskId, flags: CloneFlags) -> Option<(TaskId, Scope)> {
    let creator = tasks.get(creator).ok()?;
    if flags.contains(CloneFlags::THREAD) {
        Some((creator.group_leader, Scope::Group))
    } else if flags.contains(CloneFlags::PARENT) {
        Some((creator.parent, Scope::Children))
    } else {
        Some((creator.id, Scope::Children))
    }
}

/// Seed the burst state of `child`, spawned by `creator` with `flags`.
///
/// Non-eligible children are left untouched.
pub fn seed_spawned(tasks: &mut TaskTable, child: TaskId, creator: TaskId, flags: CloneFlags, now: u64) {
    if !tasks.get(child).is_ok_and(|t| t.is_eligible()) {
        return;
    }

    let penalty = match spawn_anchor(tasks, creator, flags) {
        Some((anchor, scope)) => inherited_penalty(tasks, anchor, scope, Some(child), now),
        None => 0,
    };

    let Ok(task) = tasks.get_mut(child) else {
        return;
    };
    let se = &mut task.se;
    burst::close_burst(se);
    se.prev_burst_penalty = se.prev_burst_penalty.max(penalty);
    se.burst_penalty = se.prev_burst_penalty;
    se.burst_count = 1;
    se.child_burst.timestamp = 0;
    se.group_burst.timestamp = 0;
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
