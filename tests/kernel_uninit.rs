//! Kernel API before `init`.
//!
//! Runs in its own binary so the global core is never initialized.

use bore::config::ConfigError;
use bore::kernel;

#[test]
fn test_set_tunables_validated_before_init() {
    assert!(kernel::core().is_none());

    assert_eq!(kernel::set_tunables(9, 0), Err(ConfigError::SmtBiasOutOfRange(9)));
    assert_eq!(kernel::set_tunables(0, 1000), Err(ConfigError::LlcBiasOutOfRange(1000)));
    assert_eq!(kernel::set_tunables(4, 4), Ok(()), "valid write before init is accepted and dropped");

    assert!(kernel::core().is_none(), "a tunable write must not initialize the core");
}
