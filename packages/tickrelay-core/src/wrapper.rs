use crate::task::{TaskHandle, TaskKey, WeakTask};
use std::rc::Rc;

/// Cumulative host clock readings, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickTime {
    pub scaled: f32,
    pub unscaled: f32,
}

impl TickTime {
    pub fn new(scaled: f32, unscaled: f32) -> Self {
        Self { scaled, unscaled }
    }

    /// Same reading on both clocks.
    pub fn uniform(seconds: f32) -> Self {
        Self::new(seconds, seconds)
    }

    fn pick(&self, unscaled: bool) -> f32 {
        if unscaled { self.unscaled } else { self.scaled }
    }
}

/// Scheduling bookkeeping for one subscribed task.
///
/// The timestamps only move when the task actually runs, so a task that was
/// throttled or failed for a while still sees the full time since its last run.
/// A wrapper admitted before its phase has ever been pumped has no clock
/// reading to start from; it is seeded by the first pump that visits it.
pub(crate) struct TaskWrapper {
    task: WeakTask,
    key: TaskKey,
    last: Option<TickTime>,
    has_run: bool,
    lap: u64,
}

impl TaskWrapper {
    pub(crate) fn new(task: &TaskHandle, now: Option<TickTime>) -> Self {
        Self {
            task: Rc::downgrade(task),
            key: TaskKey::of(task),
            last: now,
            has_run: false,
            lap: 0,
        }
    }

    pub(crate) fn key(&self) -> TaskKey {
        self.key
    }

    pub(crate) fn task(&self) -> &WeakTask {
        &self.task
    }

    pub(crate) fn has_run(&self) -> bool {
        self.has_run
    }

    pub(crate) fn seed(&mut self, now: TickTime) {
        self.last.get_or_insert(now);
    }

    /// Time since the last successful invocation, on the unscaled clock if
    /// `unscaled` is set. An unseeded wrapper reports zero.
    pub(crate) fn elapsed_since(&self, now: TickTime, unscaled: bool) -> f32 {
        self.last.map_or(0.0, |last| now.pick(unscaled) - last.pick(unscaled))
    }

    /// Stamps the wrapper as visited during rotation `lap`. Returns `false` if
    /// it was already visited in that lap.
    pub(crate) fn enter_lap(&mut self, lap: u64) -> bool {
        if self.lap == lap {
            return false;
        }
        self.lap = lap;
        true
    }

    pub(crate) fn mark_invoked(&mut self, now: TickTime) {
        self.last = Some(now);
        self.has_run = true;
    }
}
