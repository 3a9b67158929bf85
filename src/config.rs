//! # BORE Configuration
//!
//! Compile-time constants governing the burst-penalty model and CPU
//! placement, plus the small set of runtime tunables.
//! All per-CPU and per-task limits are fixed at compile time; there is no dynamic
//! allocation.

use thiserror::Error;

// ---------------------------------------------------------------------------
// System limits
// ---------------------------------------------------------------------------

/// Maximum number of processor cores. Bounds every per-CPU table and the
/// width of [`CpuMask`](crate::cpumask::CpuMask).
pub const MAX_CPUS: usize = 64;

/// Maximum number of tasks tracked by the [`TaskTable`](crate::task::TaskTable)
/// arena.
pub const MAX_TASKS: usize = 256;

// ---------------------------------------------------------------------------
// Priority space
// ---------------------------------------------------------------------------

/// Number of real-time priority levels. Real-time tasks use normal
/// priorities `0..MAX_RT_PRIO`; fair-share tasks sit above it.
pub const MAX_RT_PRIO: u8 = 100;

/// Width of the fair-share priority range (nice -20..=19).
pub const NICE_WIDTH: u8 = 40;

/// Lowest (numerically largest) priority a task may hold.
pub const MAX_PRIO: u8 = MAX_RT_PRIO + NICE_WIDTH;

/// Static priority of a nice-0 task.
pub const DEFAULT_PRIO: u8 = MAX_RT_PRIO + NICE_WIDTH / 2;

/// Highest effective fair-share priority index (nice +19).
pub const MAX_EFFECTIVE_PRIO: u8 = NICE_WIDTH - 1;

// ---------------------------------------------------------------------------
// Burst penalty model
// ---------------------------------------------------------------------------

/// Fractional bits of every fixed-point penalty value.
pub const PENALTY_SHIFT: u32 = 12;

/// Burst length, in log2 units, that is tolerated before any penalty
/// accrues. Roughly 2^25 ns ≈ 33 ms of uninterrupted running.
pub const PENALTY_OFFSET: u32 = 25;

/// Penalty scale numerator; the denominator is 1024.
pub const PENALTY_SCALE: u32 = 3180;

/// Upper bound on `burst_count`, i.e. the widest smoothing window.
pub const SMOOTHNESS: u8 = 40;

/// Largest representable burst penalty: just below 40 whole priority levels.
pub const MAX_PENALTY: u32 = (40 << PENALTY_SHIFT) - 1;

/// Lifetime of an inheritance cache entry, in nanoseconds (100 ms).
pub const CACHE_LIFETIME_NS: u64 = 100_000_000;

// ---------------------------------------------------------------------------
// CPU placement
// ---------------------------------------------------------------------------

/// Capacity of the most capable CPU in the system.
pub const CAPACITY_SCALE: u32 = 1024;

/// Base unit of every locality bonus.
pub const BIAS_UNIT: i64 = (CAPACITY_SCALE >> 5) as i64;

/// Remaining capacity below which a CPU is considered busy and receives no
/// locality bonus.
pub const BUSY_MARGIN: i64 = (CAPACITY_SCALE >> 3) as i64;

/// Multiplier of the wake-affine bonus.
pub const AFFINE_BIAS: i64 = 8;

/// Upper bound accepted for either bias tunable.
pub const MAX_BIAS: u32 = 8;

/// Default value of both bias tunables.
pub const DEFAULT_BIAS: u32 = 4;

// ---------------------------------------------------------------------------
// Runtime tunables
// ---------------------------------------------------------------------------

/// Errors raised at the configuration boundary.
///
/// Hot-path operations never fail; only tunable writes and one-time
/// initialization are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("smt bias {0} out of range 0..={max}", max = MAX_BIAS)]
    SmtBiasOutOfRange(u32),
    #[error("llc bias {0} out of range 0..={max}", max = MAX_BIAS)]
    LlcBiasOutOfRange(u32),
    #[error("{0} cpus exceed the supported maximum of {max}", max = MAX_CPUS)]
    TooManyCpus(usize),
    #[error("no cpu capacities supplied")]
    NoCpus,
    #[error("scheduler core already initialized")]
    AlreadyInitialized,
}

/// Locality bias multipliers used by the fair-share CPU selector.
///
/// Each field is a multiple of [`BIAS_UNIT`] and is validated to the range
/// `0..=MAX_BIAS`. A value of 0 disables that bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    /// Bonus for CPUs that are SMT siblings of the previous CPU.
    smt_bias: u32,
    /// Bonus for CPUs sharing the previous CPU's last-level cache.
    llc_bias: u32,
}

impl Tunables {
    /// Both biases at [`DEFAULT_BIAS`].
    pub const DEFAULT: Self = Self {
        smt_bias: DEFAULT_BIAS,
        llc_bias: DEFAULT_BIAS,
    };

    /// Build a validated set of tunables.
    pub const fn new(smt_bias: u32, llc_bias: u32) -> Result<Self, ConfigError> {
        if smt_bias > MAX_BIAS {
            return Err(ConfigError::SmtBiasOutOfRange(smt_bias));
        }
        if llc_bias > MAX_BIAS {
            return Err(ConfigError::LlcBiasOutOfRange(llc_bias));
        }
        Ok(Self { smt_bias, llc_bias })
    }

    #[inline]
    pub const fn smt_bias(&self) -> u32 {
        self.smt_bias
    }

    #[inline]
    pub const fn llc_bias(&self) -> u32 {
        self.llc_bias
    }

    /// Return a copy with a new SMT bias, validating it.
    pub const fn with_smt_bias(self, smt_bias: u32) -> Result<Self, ConfigError> {
        Self::new(smt_bias, self.llc_bias)
    }

    /// Return a copy with a new LLC bias, validating it.
    pub const fn with_llc_bias(self, llc_bias: u32) -> Result<Self, ConfigError> {
        Self::new(self.smt_bias, llc_bias)
    }
}

impl Default for Tunables {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tunables() {
        let t = Tunables::default();
        assert_eq!(t.smt_bias(), 4);
        assert_eq!(t.llc_bias(), 4);
    }

    #[test]
    fn test_tunable_range_validation() {
        assert!(Tunables::new(0, 8).is_ok());
        assert_eq!(Tunables::new(9, 0), Err(ConfigError::SmtBiasOutOfRange(9)));
        assert_eq!(Tunables::new(0, 42), Err(ConfigError::LlcBiasOutOfRange(42)));
    }

    #[test]
    fn test_tunable_update_keeps_other_field() {
        let t = Tunables::default().with_llc_bias(7).unwrap();
        assert_eq!(t.smt_bias(), 4);
        assert_eq!(t.llc_bias(), 7);
        assert!(t.with_smt_bias(100).is_err());
    }

    #[test]
    fn test_penalty_constants() {
        assert_eq!(MAX_PENALTY, 163_839);
        assert_eq!(DEFAULT_PRIO, 120);
        assert_eq!(BIAS_UNIT, 32);
        assert_eq!(BUSY_MARGIN, 128);
    }
}
