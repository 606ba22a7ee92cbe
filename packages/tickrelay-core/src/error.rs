use crate::phase::Phase;
use thiserror::Error;

/// Rejected dispatch configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("spread count must be at least 1")]
    ZeroSpreadCount,
    #[error("budget must be a finite, non-negative number of milliseconds (got {0})")]
    InvalidBudget(f32),
    #[error("skip cooldown must be a finite, non-negative number of seconds (got {0})")]
    InvalidCooldown(f32),
    #[cfg(feature = "serde")]
    #[error("malformed relay config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// `pump` was called for a phase from inside one of that phase's callbacks.
    #[error("phase `{0}` is already being pumped")]
    ReentrantPump(Phase),
}
