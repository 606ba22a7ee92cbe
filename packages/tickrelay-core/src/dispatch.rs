use crate::config::SkipPolicy;
use crate::phase::Phase;
use crate::queue::{PhaseQueue, WrapperId};
use crate::task::{Eligibility, TaskFlags};
use crate::wrapper::TickTime;
use smallvec::SmallVec;
use std::any::Any;
use std::cell::RefCell;
use std::ops::AddAssign;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

/// What happened during one pump of a phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Wrappers whose eligibility was resolved.
    pub visited: usize,
    /// Callbacks that ran, panicked ones included.
    pub invoked: usize,
    /// Eligible tasks held back by the skip policy.
    pub throttled: usize,
    pub failed: usize,
    pub evicted: usize,
    pub panicked: usize,
}

impl AddAssign for PumpReport {
    fn add_assign(&mut self, other: Self) {
        self.visited += other.visited;
        self.invoked += other.invoked;
        self.throttled += other.throttled;
        self.failed += other.failed;
        self.evicted += other.evicted;
        self.panicked += other.panicked;
    }
}

pub(crate) struct PumpContext {
    pub phase: Phase,
    pub now: TickTime,
    pub tick_index: u64,
    pub skip: SkipPolicy,
}

/// When a rotation hands control back to the host.
pub(crate) enum Stop {
    Turns(u32),
    Budget { started: Instant, budget: Duration },
}

impl Stop {
    fn reached(&self, turns: u32) -> bool {
        match *self {
            Stop::Turns(count) => turns >= count,
            Stop::Budget { started, budget } => started.elapsed() >= budget,
        }
    }
}

/// Evicts every dead wrapper, then walks the rest in queue order. Each wrapper
/// is resolved again when it is reached, since earlier callbacks in the same
/// pump may have changed its host.
pub(crate) fn run_all(queue: &RefCell<PhaseQueue>, ctx: &PumpContext) -> PumpReport {
    let mut report = PumpReport::default();
    let order = queue.borrow().snapshot();
    let mut live: SmallVec<[WrapperId; 16]> = SmallVec::with_capacity(order.len());

    for id in order {
        match queue.borrow_mut().get_mut(id) {
            Some(wrapper) => wrapper.seed(ctx.now),
            None => continue,
        }
        let Some((eligibility, _)) = resolve(queue, id) else {
            continue;
        };
        if eligibility == Eligibility::Remove {
            queue.borrow_mut().evict(id);
            report.visited += 1;
            report.evicted += 1;
        } else {
            live.push(id);
        }
    }

    for id in live {
        let Some((eligibility, flags)) = resolve(queue, id) else {
            continue;
        };
        report.visited += 1;
        match eligibility {
            Eligibility::Remove => {
                queue.borrow_mut().evict(id);
                report.evicted += 1;
            }
            Eligibility::Fail => report.failed += 1,
            Eligibility::Success => run_task(queue, id, ctx, flags, &mut report),
        }
    }
    queue.borrow_mut().compact();
    report
}

/// Round-robin over the queue: pop the head, process it, put it at the back.
///
/// A lap ends when a wrapper comes up a second time within the same pump, which
/// also bounds a queue where nothing is eligible to a single pass. Throttled
/// tasks still use up a turn.
pub(crate) fn rotate(queue: &RefCell<PhaseQueue>, ctx: &PumpContext, stop: Stop) -> PumpReport {
    let mut report = PumpReport::default();
    let lap = ctx.tick_index.wrapping_add(1);
    let mut turns = 0u32;

    loop {
        if report.visited > 0 && stop.reached(turns) {
            break;
        }
        let Some(id) = queue.borrow_mut().pop_front() else {
            break;
        };
        let first_visit = match queue.borrow_mut().get_mut(id) {
            Some(wrapper) => {
                wrapper.seed(ctx.now);
                wrapper.enter_lap(lap)
            }
            None => continue,
        };
        if !first_visit {
            queue.borrow_mut().push_front(id);
            break;
        }

        let Some((eligibility, flags)) = resolve(queue, id) else {
            continue;
        };
        report.visited += 1;
        match eligibility {
            Eligibility::Remove => {
                queue.borrow_mut().evict(id);
                report.evicted += 1;
                continue;
            }
            Eligibility::Fail => report.failed += 1,
            Eligibility::Success => {
                turns += 1;
                run_task(queue, id, ctx, flags, &mut report);
            }
        }
        queue.borrow_mut().requeue(id);
    }
    report
}

fn resolve(queue: &RefCell<PhaseQueue>, id: WrapperId) -> Option<(Eligibility, TaskFlags)> {
    // Liveness predicates are host code; keep the queue unborrowed while they run.
    let task = queue.borrow().get(id)?.task().clone();
    Some(Eligibility::resolve(&task))
}

fn run_task(
    queue: &RefCell<PhaseQueue>,
    id: WrapperId,
    ctx: &PumpContext,
    flags: TaskFlags,
    report: &mut PumpReport,
) {
    let prepared = {
        let queue = queue.borrow();
        queue.get(id).and_then(|wrapper| {
            let task = wrapper.task().upgrade()?;
            let elapsed = wrapper.elapsed_since(ctx.now, flags.unscaled_delta);
            let throttled = ctx.skip.throttles(ctx.tick_index, wrapper.has_run(), elapsed);
            Some((task, elapsed, throttled))
        })
    };
    let Some((task, elapsed, throttled)) = prepared else {
        return;
    };
    if throttled {
        report.throttled += 1;
        return;
    }

    let outcome = match task.try_borrow_mut() {
        Ok(mut task) => catch_unwind(AssertUnwindSafe(|| task.update(elapsed))),
        Err(_) => {
            report.failed += 1;
            return;
        }
    };
    report.invoked += 1;
    if let Err(payload) = outcome {
        report.panicked += 1;
        tracing::error!(
            "Task callback panicked during {} pump (tick {}): {}",
            ctx.phase,
            ctx.tick_index,
            panic_message(payload.as_ref())
        );
    }

    if let Some(wrapper) = queue.borrow_mut().get_mut(id) {
        wrapper.mark_invoked(ctx.now);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
