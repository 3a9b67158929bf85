//! # BORE: Burst-Oriented Response Enhancer
//!
//! Fairness and placement policies layered on top of a preemptive
//! multiprocessor scheduler.
//!
//! ## Overview
//!
//! The crate makes two kinds of decisions for the run-queue engine that
//! embeds it:
//!
//! - **Burst penalty**: how much to demote a fair-share task for running a
//!   long time without sleeping. CPU hogs sink in priority; interactive
//!   tasks that sleep often keep theirs.
//! - **CPU selection**: which core a task becoming runnable should go to,
//!   for fair-share tasks (spare capacity plus cache locality) and for
//!   real-time tasks (least queued real-time weight).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │            Run-queue engine (external)                  │
//! ├────────────────────────────────────────────────────────┤
//! │            Kernel API (kernel.rs)                       │
//! │     init() · on_spawn() · on_tick() · select_cpu_*()   │
//! ├────────────────────────────────────────────────────────┤
//! │            SchedCore (scheduler.rs)                     │
//! ├──────────────┬──────────────┬───────────┬─────────────┤
//! │ Burst        │ Inheritance  │ Fair CPU  │ RT CPU      │
//! │ burst.rs     │ inherit.rs   │ fair.rs   │ rt.rs       │
//! │ prio.rs      │              │           │ rt_bank.rs  │
//! ├──────────────┴──────────────┼───────────┴─────────────┤
//! │ Task model (task.rs)        │ Topology (topology.rs)  │
//! │ Entity · Task · TaskTable   │ capacities · SMT · LLC  │
//! ├─────────────────────────────┴─────────────────────────┤
//! │  config.rs · cpumask.rs · sync.rs                       │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Burst Model
//!
//! 1. Every tick adds run time to the current burst and recomputes its
//!    logarithmic penalty; the applied penalty ramps toward it.
//! 2. Every sleep folds the burst into a smoothed carry-over penalty.
//! 3. The integer part of the applied penalty is the *burst score*, added
//!    to the task's nice level. A priority change yields a [`Reweight`]
//!    the engine applies in place.
//! 4. A new task starts from the cached average penalty of its siblings or
//!    thread group, so forking does not reset a hog.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is fixed-size
//! - **No `alloc`**: `core` only outside tests
//! - **Per-CPU tables**: `[_; MAX_CPUS]` arrays indexed by CPU id
//! - **Tasks**: `[Task; MAX_TASKS]` arena, relations are indices
//! - **Shared state**: `spin::RwLock` snapshots, relaxed atomics for the
//!   RT bank
//!
//! [`Reweight`]: prio::Reweight

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod cpumask;
pub mod task;
pub mod burst;
pub mod prio;
pub mod inherit;
pub mod topology;
pub mod rt_bank;
pub mod fair;
pub mod rt;
pub mod scheduler;
pub mod kernel;
pub mod sync;

#[cfg(test)]
mod tests_prop;
