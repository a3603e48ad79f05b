//! Provider health of a finished watch pass.
//!
//! A pass is judged only on its counts:
//!
//! | state    | condition                                 |
//! |----------|-------------------------------------------|
//! | Clean    | `provider_failures == 0`                  |
//! | Degraded | `0 < provider_failures < evaluated`       |
//! | Outage   | `provider_failures == evaluated > 0`      |

/// Provider health of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassHealth {
    /// No search failed (including a pass that evaluated nothing)
    Clean,
    /// Some searches failed, at least one succeeded
    Degraded { failed: usize, evaluated: usize },
    /// Every evaluated search failed
    Outage { evaluated: usize },
}

impl PassHealth {
    pub fn from_counts(evaluated: usize, provider_failures: usize) -> Self {
        if provider_failures == 0 {
            Self::Clean
        } else if provider_failures >= evaluated {
            Self::Outage { evaluated }
        } else {
            Self::Degraded {
                failed: provider_failures,
                evaluated,
            }
        }
    }
}

/// How the caller treats provider failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Any failed search fails the run
    Strict,
    /// Only a total outage fails the run
    #[default]
    Lenient,
}

impl ExitPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Lenient }
    }

    /// Whether `health` should fail the run under this policy.
    pub fn is_fatal(self, health: PassHealth) -> bool {
        match (self, health) {
            (_, PassHealth::Clean) => false,
            (_, PassHealth::Outage { .. }) => true,
            (Self::Strict, PassHealth::Degraded { .. }) => true,
            (Self::Lenient, PassHealth::Degraded { failed, evaluated }) => {
                log::warn!("provider degraded: {failed}/{evaluated} watch searches failed");
                false
            }
        }
    }
}
