use crate::config::{DispatchPolicy, PhaseSettings, RelayConfig, SkipPolicy};
use crate::dispatch::{self, PumpContext, PumpReport, Stop};
use crate::error::{ConfigError, RelayError};
use crate::phase::Phase;
use crate::queue::PhaseQueue;
use crate::task::TaskHandle;
use crate::wrapper::TickTime;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::time::Instant;

type DestroyListener = Box<dyn FnOnce()>;

/// Distributes subscribed tasks across the early, fixed and late phases.
///
/// A relay is single-threaded and shared by `Rc`; every method takes `&self`.
/// No internal borrow is held while a task callback runs, so callbacks may
/// subscribe or unsubscribe freely, themselves included.
pub struct Relay {
    queues: [RefCell<PhaseQueue>; 3],
    pumping: [Cell<bool>; 3],
    config: Cell<RelayConfig>,
    tick_index: Cell<u64>,
    now: [Cell<Option<TickTime>>; 3],
    destroyed: Cell<bool>,
    listeners: RefCell<SmallVec<[DestroyListener; 2]>>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay {
    pub fn new() -> Self {
        Self {
            queues: [
                RefCell::new(PhaseQueue::new()),
                RefCell::new(PhaseQueue::new()),
                RefCell::new(PhaseQueue::new()),
            ],
            pumping: [Cell::new(false), Cell::new(false), Cell::new(false)],
            config: Cell::new(RelayConfig::default()),
            tick_index: Cell::new(0),
            now: [Cell::new(None), Cell::new(None), Cell::new(None)],
            destroyed: Cell::new(false),
            listeners: RefCell::new(SmallVec::new()),
        }
    }

    pub fn with_config(config: RelayConfig) -> Result<Self, ConfigError> {
        let relay = Self::new();
        relay.apply_config(config)?;
        Ok(relay)
    }

    fn queue(&self, phase: Phase) -> &RefCell<PhaseQueue> {
        &self.queues[phase.index()]
    }

    /// Adds `task` to `phase`. Subscribing a task that is already there does nothing.
    ///
    /// The task's timestamps start at the phase's latest clock reading, or at the
    /// reading of the first pump that reaches it if the phase was never pumped.
    pub fn subscribe(&self, phase: Phase, task: &TaskHandle) {
        if self.destroyed.get() {
            tracing::debug!("Ignoring subscribe to {} on a destroyed relay", phase);
            return;
        }
        if self.queue(phase).borrow_mut().admit(task, self.now[phase.index()].get()) {
            tracing::trace!("Subscribed task to {} phase", phase);
        }
    }

    pub fn unsubscribe(&self, phase: Phase, task: &TaskHandle) -> bool {
        if self.destroyed.get() {
            return false;
        }
        let removed = self.queue(phase).borrow_mut().remove_task(task);
        if removed {
            tracing::trace!("Unsubscribed task from {} phase", phase);
        }
        removed
    }

    pub fn contains(&self, phase: Phase, task: &TaskHandle) -> bool {
        self.queue(phase).borrow().contains_task(task)
    }

    pub fn len(&self, phase: Phase) -> usize {
        self.queue(phase).borrow().len()
    }

    pub fn is_empty(&self, phase: Phase) -> bool {
        self.queue(phase).borrow().is_empty()
    }

    /// Runs one tick of `phase`. `elapsed_time` is the host's cumulative time in
    /// seconds and serves as both the scaled and the unscaled reading.
    pub fn pump(&self, phase: Phase, elapsed_time: f32) -> Result<PumpReport, RelayError> {
        self.pump_at(phase, TickTime::uniform(elapsed_time))
    }

    pub fn pump_at(&self, phase: Phase, now: TickTime) -> Result<PumpReport, RelayError> {
        if self.destroyed.get() {
            return Ok(PumpReport::default());
        }
        let flag = &self.pumping[phase.index()];
        if flag.replace(true) {
            return Err(RelayError::ReentrantPump(phase));
        }
        let _guard = PumpGuard(flag);

        self.now[phase.index()].set(Some(now));
        let tick_index = self.tick_index.get();
        let settings = self.settings(phase);
        let queue = self.queue(phase);

        let report = if queue.borrow().is_empty() {
            PumpReport::default()
        } else {
            let ctx = PumpContext {
                phase,
                now,
                tick_index,
                skip: settings.skip,
            };
            match settings.policy {
                DispatchPolicy::All => dispatch::run_all(queue, &ctx),
                DispatchPolicy::Spread { count } => dispatch::rotate(queue, &ctx, Stop::Turns(count)),
                DispatchPolicy::Budget { max_millis } => {
                    let stop = Stop::Budget {
                        started: Instant::now(),
                        budget: DispatchPolicy::budget_duration(max_millis),
                    };
                    dispatch::rotate(queue, &ctx, stop)
                }
            }
        };

        // Nested pumps of other phases may have advanced the index meanwhile.
        self.tick_index.set(self.tick_index.get().wrapping_add(1));
        tracing::trace!(
            "Pumped {} phase at tick {}: {} invoked, {} throttled, {} failed, {} evicted",
            phase,
            tick_index,
            report.invoked,
            report.throttled,
            report.failed,
            report.evicted
        );
        Ok(report)
    }

    /// Sets the relay-wide dispatch policy.
    pub fn set_policy(&self, policy: DispatchPolicy) -> Result<(), ConfigError> {
        policy.validate()?;
        self.update_config(|config| config.defaults.policy = policy);
        Ok(())
    }

    /// Sets the relay-wide skip policy.
    pub fn set_skip(&self, skip: SkipPolicy) -> Result<(), ConfigError> {
        skip.validate()?;
        self.update_config(|config| config.defaults.skip = skip);
        Ok(())
    }

    /// Overrides the relay-wide settings for one phase.
    pub fn set_phase_settings(&self, phase: Phase, settings: PhaseSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        self.update_config(|config| *config.phase_mut(phase) = Some(settings));
        Ok(())
    }

    pub fn clear_phase_settings(&self, phase: Phase) {
        self.update_config(|config| *config.phase_mut(phase) = None);
    }

    pub fn apply_config(&self, config: RelayConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config.set(config);
        tracing::debug!("Applied relay config: {:?}", config);
        Ok(())
    }

    fn update_config(&self, f: impl FnOnce(&mut RelayConfig)) {
        let mut config = self.config.get();
        f(&mut config);
        self.config.set(config);
    }

    pub fn config(&self) -> RelayConfig {
        self.config.get()
    }

    /// Effective settings of `phase`.
    pub fn settings(&self, phase: Phase) -> PhaseSettings {
        self.config.get().resolve(phase)
    }

    pub fn policy(&self, phase: Phase) -> DispatchPolicy {
        self.settings(phase).policy
    }

    pub fn skip(&self, phase: Phase) -> SkipPolicy {
        self.settings(phase).skip
    }

    /// Number of completed pumps across all phases.
    pub fn tick_index(&self) -> u64 {
        self.tick_index.get()
    }

    /// Clock reading of the most recent pump of `phase`.
    pub fn now(&self, phase: Phase) -> Option<TickTime> {
        self.now[phase.index()].get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Registers a teardown listener. If the relay is already destroyed the
    /// listener runs right away.
    pub fn on_destroyed(&self, listener: impl FnOnce() + 'static) {
        if self.destroyed.get() {
            listener();
        } else {
            self.listeners.borrow_mut().push(Box::new(listener));
        }
    }

    /// Tears the relay down: drops every subscription and notifies listeners.
    /// Later calls are no-ops.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        for queue in &self.queues {
            queue.borrow_mut().clear();
        }
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        tracing::info!("Relay destroyed, notifying {} listener(s)", listeners.len());
        for listener in listeners {
            listener();
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.destroy();
    }
}

struct PumpGuard<'a>(&'a Cell<bool>);

impl Drop for PumpGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
