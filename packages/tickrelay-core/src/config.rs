use crate::error::ConfigError;
use crate::phase::Phase;
use std::time::Duration;

/// How many of a phase's tasks a single pump runs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum DispatchPolicy {
    /// Every task, every pump.
    #[default]
    All,
    /// At most `count` task turns per pump, round-robin.
    Spread { count: u32 },
    /// As many task turns as fit in `max_millis` of wall-clock time, round-robin.
    Budget { max_millis: f32 },
}

impl DispatchPolicy {
    pub fn spread(count: u32) -> Result<Self, ConfigError> {
        let policy = DispatchPolicy::Spread { count };
        policy.validate()?;
        Ok(policy)
    }

    pub fn budget(max_millis: f32) -> Result<Self, ConfigError> {
        let policy = DispatchPolicy::Budget { max_millis };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            DispatchPolicy::All => Ok(()),
            DispatchPolicy::Spread { count: 0 } => Err(ConfigError::ZeroSpreadCount),
            DispatchPolicy::Spread { .. } => Ok(()),
            DispatchPolicy::Budget { max_millis } if max_millis.is_finite() && max_millis >= 0.0 => {
                Ok(())
            }
            DispatchPolicy::Budget { max_millis } => Err(ConfigError::InvalidBudget(max_millis)),
        }
    }

    pub(crate) fn budget_duration(max_millis: f32) -> Duration {
        Duration::try_from_secs_f64(f64::from(max_millis) / 1000.0).unwrap_or(Duration::MAX)
    }
}

/// Rate limit applied to tasks that are otherwise eligible.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum SkipPolicy {
    #[default]
    None,
    /// Run only on ticks where `tick_index % (n + 1) == 0`.
    Count { n: u32 },
    /// Per-task cooldown measured from the task's own last run.
    Time { seconds: f32 },
}

impl SkipPolicy {
    /// Runs once every `n + 1` ticks.
    pub fn every(n: u32) -> Self {
        SkipPolicy::Count { n }
    }

    pub fn cooldown(seconds: f32) -> Result<Self, ConfigError> {
        let skip = SkipPolicy::Time { seconds };
        skip.validate()?;
        Ok(skip)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            SkipPolicy::Time { seconds } if !(seconds.is_finite() && seconds >= 0.0) => {
                Err(ConfigError::InvalidCooldown(seconds))
            }
            _ => Ok(()),
        }
    }

    /// Whether an eligible task sits this tick out. A task that never ran is
    /// exempt from the cooldown so its first run is not delayed.
    pub(crate) fn throttles(&self, tick_index: u64, has_run: bool, elapsed: f32) -> bool {
        match *self {
            SkipPolicy::None => false,
            SkipPolicy::Count { n } => tick_index % (u64::from(n) + 1) != 0,
            SkipPolicy::Time { seconds } => has_run && elapsed < seconds,
        }
    }
}

/// Dispatch and throttle settings of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PhaseSettings {
    pub policy: DispatchPolicy,
    pub skip: SkipPolicy,
}

impl PhaseSettings {
    pub fn new(policy: DispatchPolicy, skip: SkipPolicy) -> Self {
        Self { policy, skip }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        self.skip.validate()
    }
}

/// Relay-wide defaults plus optional per-phase overrides.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RelayConfig {
    pub defaults: PhaseSettings,
    pub early: Option<PhaseSettings>,
    pub fixed: Option<PhaseSettings>,
    pub late: Option<PhaseSettings>,
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.defaults.validate()?;
        for settings in [self.early, self.fixed, self.late].iter().flatten() {
            settings.validate()?;
        }
        Ok(())
    }

    pub fn phase(&self, phase: Phase) -> Option<PhaseSettings> {
        match phase {
            Phase::Early => self.early,
            Phase::Fixed => self.fixed,
            Phase::Late => self.late,
        }
    }

    /// Effective settings of `phase`.
    pub fn resolve(&self, phase: Phase) -> PhaseSettings {
        self.phase(phase).unwrap_or(self.defaults)
    }

    pub(crate) fn phase_mut(&mut self, phase: Phase) -> &mut Option<PhaseSettings> {
        match phase {
            Phase::Early => &mut self.early,
            Phase::Fixed => &mut self.fixed,
            Phase::Late => &mut self.late,
        }
    }

    /// Parses and validates a JSON document such as
    /// `{"defaults": {"policy": {"kind": "spread", "count": 8}}}`.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RelayConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
