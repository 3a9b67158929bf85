//! # CPU Topology
//!
//! Two views of the machine:
//!
//! - [`CapacityTable`]: per-CPU compute capacity, discovered once at boot,
//!   plus the *high-performance* subset real-time placement prefers on
//!   asymmetric (big.LITTLE style) platforms.
//! - [`Topology`]: which CPUs are online and how they share execution units
//!   (SMT siblings) and caches (last-level-cache domains). Supplied by the
//!   embedder and replaceable at runtime; selectors copy it out under a
//!   read guard.
//!
//! ## Capacity Classification
//!
//! ```text
//!   capacities   [ 512  512  1024  1024  1024  1024 ]
//!   low-perf     { 0, 1 }          (all CPUs at the lowest capacity)
//!   high-perf    { 2, 3, 4, 5 }    (present minus low-perf)
//!   asymmetric   |low| <= |high|   -> true
//! ```
//!
//! A homogeneous machine puts every CPU in the low-performance set, leaving
//! the high-performance set empty and the platform symmetric.

use crate::config::{ConfigError, CAPACITY_SCALE, MAX_CPUS};
use crate::cpumask::CpuMask;

// ---------------------------------------------------------------------------
// Capacity table
// ---------------------------------------------------------------------------

/// Static capacity figures of every present CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityTable {
    capacity: [u32; MAX_CPUS],
    present: CpuMask,
    hp_mask: CpuMask,
    asymmetric: bool,
}

impl CapacityTable {
    /// Table with no CPUs present. Every capacity reads as 0.
    pub const fn new() -> Self {
        Self {
            capacity: [0; MAX_CPUS],
            present: CpuMask::empty(),
            hp_mask: CpuMask::empty(),
            asymmetric: false,
        }
    }

    /// Classify `capacities[cpu]` for CPUs `0..capacities.len()`.
    pub fn from_capacities(capacities: &[u32]) -> Result<Self, ConfigError> {
        if capacities.is_empty() {
            return Err(ConfigError::NoCpus);
        }
        if capacities.len() > MAX_CPUS {
            return Err(ConfigError::TooManyCpus(capacities.len()));
        }

        let mut table = Self::new();
        let mut lowest = u32::MAX;
        let mut lp_mask = CpuMask::empty();

        for (cpu, &cap) in capacities.iter().enumerate() {
            table.capacity[cpu] = cap;
            table.present.set(cpu);

            if cap < lowest {
                lp_mask = CpuMask::empty();
                lowest = cap;
            }
            if cap == lowest {
                lp_mask.set(cpu);
            }
        }

        table.hp_mask = table.present.and_not(&lp_mask);
        table.asymmetric = lp_mask.weight() <= table.hp_mask.weight();
        Ok(table)
    }

    /// `nr_cpus` CPUs, all at full capacity.
    pub fn uniform(nr_cpus: usize) -> Result<Self, ConfigError> {
        if nr_cpus > MAX_CPUS {
            return Err(ConfigError::TooManyCpus(nr_cpus));
        }
        Self::from_capacities(&[CAPACITY_SCALE; MAX_CPUS][..nr_cpus])
    }

    /// Capacity of `cpu`; 0 for CPUs that are not present.
    #[inline]
    pub fn capacity(&self, cpu: usize) -> u32 {
        self.capacity.get(cpu).copied().unwrap_or(0)
    }

    #[inline]
    pub fn present(&self) -> &CpuMask {
        &self.present
    }

    /// CPUs above the lowest capacity class.
    #[inline]
    pub fn hp_mask(&self) -> &CpuMask {
        &self.hp_mask
    }

    /// True when the low-performance class is no larger than the
    /// high-performance one.
    #[inline]
    pub fn is_asymmetric(&self) -> bool {
        self.asymmetric
    }
}

impl Default for CapacityTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Online topology
// ---------------------------------------------------------------------------

/// Online CPUs and their sharing domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    /// CPUs currently accepting work.
    pub active: CpuMask,
    /// SMT siblings of each CPU, the CPU itself included.
    pub smt: [CpuMask; MAX_CPUS],
    /// Last-level-cache domain of each CPU. `None` while the CPU is not
    /// attached to any domain.
    pub llc: [Option<CpuMask>; MAX_CPUS],
}

impl Topology {
    /// No CPUs online.
    pub const fn empty() -> Self {
        Self {
            active: CpuMask::empty(),
            smt: [CpuMask::empty(); MAX_CPUS],
            llc: [None; MAX_CPUS],
        }
    }

    /// CPUs `0..nr_cpus` online, no SMT, one shared last-level cache.
    pub fn flat(nr_cpus: usize) -> Self {
        let all = CpuMask::first_n(nr_cpus);
        let mut topo = Self::empty();
        topo.active = all;
        for cpu in all.iter() {
            topo.smt[cpu] = CpuMask::from_cpus(&[cpu]);
            topo.llc[cpu] = Some(all);
        }
        topo
    }

    /// CPUs `0..nr_cpus` online in SMT groups of `threads` consecutive ids,
    /// with consecutive groups of `llc_width` CPUs sharing a cache.
    pub fn grouped(nr_cpus: usize, threads: usize, llc_width: usize) -> Self {
        let threads = threads.max(1);
        let llc_width = llc_width.max(1);
        let mut topo = Self::empty();
        topo.active = CpuMask::first_n(nr_cpus);
        for cpu in topo.active.iter() {
            topo.smt[cpu] = span(cpu, threads, nr_cpus);
            topo.llc[cpu] = Some(span(cpu, llc_width, nr_cpus));
        }
        topo
    }

    /// SMT siblings of `cpu`; empty for out-of-range ids.
    #[inline]
    pub fn smt_mask(&self, cpu: usize) -> CpuMask {
        self.smt.get(cpu).copied().unwrap_or_default()
    }

    /// Last-level-cache domain of `cpu`, if attached.
    #[inline]
    pub fn llc_mask(&self, cpu: usize) -> Option<CpuMask> {
        self.llc.get(cpu).copied().flatten()
    }

    /// What the fair-share selector needs to know about `cpu`'s
    /// neighbourhood.
    pub fn locality(&self, cpu: usize) -> Locality {
        Locality {
            active: self.active,
            smt: self.smt_mask(cpu),
            llc: self.llc_mask(cpu),
        }
    }
}

/// Online set plus the sharing domains of one CPU, copied out of a
/// [`Topology`] for a single placement decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Locality {
    pub active: CpuMask,
    pub smt: CpuMask,
    pub llc: Option<CpuMask>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::empty()
    }
}

/// The aligned block of `width` CPU ids containing `cpu`, cut at `nr_cpus`.
fn span(cpu: usize, width: usize, nr_cpus: usize) -> CpuMask {
    let start = cpu - cpu % width;
    let mut mask = CpuMask::empty();
    for id in start..(start + width).min(nr_cpus) {
        mask.set(id);
    }
    mask
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
