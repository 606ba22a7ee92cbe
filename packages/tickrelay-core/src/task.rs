use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Scheduling flags a task reports to the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFlags {
    /// Skip the host liveness check entirely. Required for tasks without a host.
    pub unsafe_updates: bool,
    /// Run even while the host reports itself inactive.
    pub always_update: bool,
    /// Measure elapsed time against the unscaled clock.
    pub unscaled_delta: bool,
}

/// A unit of per-tick work.
///
/// Tasks are owned by the host as a [`TaskHandle`]. The relay only keeps a weak
/// reference, so dropping the last handle is enough to retire a task: it is
/// evicted the next time a dispatch policy visits it.
pub trait Task {
    /// Called when the task is selected. `elapsed` is the time in seconds since
    /// this task last ran (or since it was subscribed).
    fn update(&mut self, elapsed: f32);

    fn flags(&self) -> TaskFlags;

    /// `None` when the task has no host, otherwise whether the host is active.
    fn host_liveness(&self) -> Option<bool>;
}

pub type TaskHandle = Rc<RefCell<dyn Task>>;
pub(crate) type WeakTask = Weak<RefCell<dyn Task>>;

/// Identity of a task allocation. Stable for as long as any weak reference to it
/// lives, which the owning wrapper guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TaskKey(usize);

impl TaskKey {
    pub(crate) fn of(handle: &TaskHandle) -> Self {
        TaskKey(Rc::as_ptr(handle) as *const () as usize)
    }
}

/// Per-visit liveness classification of a subscribed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The task is gone or misconfigured; evict it.
    Remove,
    /// The task exists but should not run this time.
    Fail,
    Success,
}

impl Eligibility {
    pub fn evaluate(task: &dyn Task) -> Eligibility {
        let flags = task.flags();
        if flags.unsafe_updates {
            return Eligibility::Success;
        }
        match task.host_liveness() {
            None => Eligibility::Remove,
            Some(false) if !flags.always_update => Eligibility::Fail,
            Some(_) => Eligibility::Success,
        }
    }

    /// Resolves a weak handle, returning the flags read alongside the verdict so
    /// that the invocation uses the same reading.
    pub(crate) fn resolve(task: &WeakTask) -> (Eligibility, TaskFlags) {
        let Some(task) = task.upgrade() else {
            return (Eligibility::Remove, TaskFlags::default());
        };
        // A task that is mid-callback cannot be inspected; try again on a later visit.
        match task.try_borrow() {
            Ok(task) => (Eligibility::evaluate(&*task), task.flags()),
            Err(_) => (Eligibility::Fail, TaskFlags::default()),
        }
    }
}

type Liveness = Box<dyn Fn() -> Option<bool>>;

/// Closure-backed [`Task`].
///
/// ```
/// use tickrelay_core::FnTask;
///
/// let handle = FnTask::new(|dt| println!("tick {dt}")).always_update().handle();
/// # drop(handle);
/// ```
pub struct FnTask<F> {
    callback: F,
    flags: TaskFlags,
    liveness: Option<Liveness>,
}

impl<F> FnTask<F>
where
    F: FnMut(f32) + 'static,
{
    /// A hostless task. It is always eligible until its handle is dropped.
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            flags: TaskFlags {
                unsafe_updates: true,
                ..TaskFlags::default()
            },
            liveness: None,
        }
    }

    /// Track liveness through `liveness`. Returning `None` marks the host as
    /// gone and the task is evicted.
    pub fn with_host(mut self, liveness: impl Fn() -> Option<bool> + 'static) -> Self {
        self.flags.unsafe_updates = false;
        self.liveness = Some(Box::new(liveness));
        self
    }

    pub fn always_update(mut self) -> Self {
        self.flags.always_update = true;
        self
    }

    pub fn unscaled(mut self) -> Self {
        self.flags.unscaled_delta = true;
        self
    }

    pub fn with_flags(mut self, flags: TaskFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn handle(self) -> TaskHandle {
        Rc::new(RefCell::new(self))
    }
}

impl<F> Task for FnTask<F>
where
    F: FnMut(f32),
{
    fn update(&mut self, elapsed: f32) {
        (self.callback)(elapsed);
    }

    fn flags(&self) -> TaskFlags {
        self.flags
    }

    fn host_liveness(&self) -> Option<bool> {
        self.liveness.as_ref().and_then(|liveness| liveness())
    }
}
