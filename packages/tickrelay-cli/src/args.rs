use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tickrelay_core::{DispatchPolicy, RelayConfig, SkipPolicy};

#[derive(Parser)]
#[command(name = "tickrelay")]
#[command(about = "Drive a tickrelay scheduler from a simulated host loop", long_about = None)]
pub struct Cli {
    /// Log every pump (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate a host loop pumping the early, fixed and late phases
    Run(RunArgs),
    /// Validate a JSON relay config and print the effective settings
    Check {
        /// Path to the config file
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyKind {
    All,
    Spread,
    Budget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SkipKind {
    None,
    Count,
    Time,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Frames to simulate
    #[arg(long, default_value_t = 600)]
    pub frames: u32,

    /// Tasks to subscribe, spread evenly over the three phases
    #[arg(long, default_value_t = 300)]
    pub tasks: usize,

    /// Dispatch policy (overrides the config file defaults)
    #[arg(long, value_enum)]
    pub policy: Option<PolicyKind>,

    /// Turns per pump for the spread policy
    #[arg(long, default_value_t = 32)]
    pub count: u32,

    /// Milliseconds per pump for the budget policy
    #[arg(long, default_value_t = 1.0)]
    pub budget_ms: f32,

    /// Skip policy (overrides the config file defaults)
    #[arg(long, value_enum)]
    pub skip: Option<SkipKind>,

    /// Ticks skipped between runs for the count skip policy
    #[arg(long, default_value_t = 1)]
    pub skip_n: u32,

    /// Per-task cooldown for the time skip policy
    #[arg(long, default_value_t = 0.1)]
    pub skip_seconds: f32,

    /// Unscaled seconds per frame
    #[arg(long, default_value_t = 1.0 / 60.0)]
    pub frame_seconds: f32,

    /// Scaled time per unscaled second
    #[arg(long, default_value_t = 1.0)]
    pub time_scale: f32,

    /// Scaled seconds per fixed-phase tick
    #[arg(long, default_value_t = 0.02)]
    pub fixed_step: f32,

    /// Give every Nth task a host that goes inactive on odd seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    pub inactive_every: usize,

    /// Drop every Nth task halfway through the run (0 disables)
    #[arg(long, default_value_t = 0)]
    pub drop_every: usize,

    /// JSON relay config
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    /// The config file (if any) with command-line overrides applied.
    pub fn relay_config(&self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RelayConfig::default(),
        };
        if let Some(kind) = self.policy {
            config.defaults.policy = match kind {
                PolicyKind::All => DispatchPolicy::All,
                PolicyKind::Spread => DispatchPolicy::spread(self.count)?,
                PolicyKind::Budget => DispatchPolicy::budget(self.budget_ms)?,
            };
        }
        if let Some(kind) = self.skip {
            config.defaults.skip = match kind {
                SkipKind::None => SkipPolicy::None,
                SkipKind::Count => SkipPolicy::every(self.skip_n),
                SkipKind::Time => SkipPolicy::cooldown(self.skip_seconds)?,
            };
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.frame_seconds.is_finite() && self.frame_seconds > 0.0) {
            anyhow::bail!("--frame-seconds must be positive");
        }
        if !(self.fixed_step.is_finite() && self.fixed_step > 0.0) {
            anyhow::bail!("--fixed-step must be positive");
        }
        if !(self.time_scale.is_finite() && self.time_scale >= 0.0) {
            anyhow::bail!("--time-scale must not be negative");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<RelayConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    RelayConfig::from_json(&json).with_context(|| format!("invalid config {}", path.display()))
}
