//! The thread's default relay.
//!
//! Created on first use and torn down at most once. After [`teardown`] every
//! lookup yields `None`; the default relay is never recreated. A relay still
//! live when its thread exits is destroyed with the thread, and its listeners
//! observe the default relay as torn down.

use crate::phase::Phase;
use crate::scheduler::Relay;
use crate::task::TaskHandle;
use std::cell::RefCell;
use std::rc::Rc;

enum Slot {
    Vacant,
    Live(Rc<Relay>),
    TornDown,
}

thread_local! {
    static DEFAULT: RefCell<Slot> = const { RefCell::new(Slot::Vacant) };
}

/// Returns the default relay, creating it on first use.
pub fn default_relay() -> Option<Rc<Relay>> {
    DEFAULT
        .try_with(|slot| {
            let mut slot = slot.borrow_mut();
            match &*slot {
                Slot::Live(relay) => Some(relay.clone()),
                Slot::TornDown => None,
                Slot::Vacant => {
                    tracing::debug!("Creating default relay");
                    let relay = Rc::new(Relay::new());
                    *slot = Slot::Live(relay.clone());
                    Some(relay)
                }
            }
        })
        .ok()
        .flatten()
}

/// Destroys the default relay. Returns `false` if it was already torn down.
pub fn teardown() -> bool {
    let Ok(previous) = DEFAULT.try_with(|slot| std::mem::replace(&mut *slot.borrow_mut(), Slot::TornDown))
    else {
        return false;
    };
    match previous {
        Slot::TornDown => false,
        Slot::Vacant => true,
        // Listeners run after the slot is sealed, so they observe the teardown.
        Slot::Live(relay) => {
            relay.destroy();
            true
        }
    }
}

/// Also `true` while the thread's locals are being destroyed.
pub fn is_torn_down() -> bool {
    DEFAULT
        .try_with(|slot| matches!(&*slot.borrow(), Slot::TornDown))
        .unwrap_or(true)
}

/// Subscribes `task` on the default relay. Returns `false` after teardown.
pub fn subscribe(phase: Phase, task: &TaskHandle) -> bool {
    match default_relay() {
        Some(relay) => {
            relay.subscribe(phase, task);
            true
        }
        None => false,
    }
}

pub fn unsubscribe(phase: Phase, task: &TaskHandle) -> bool {
    default_relay().is_some_and(|relay| relay.unsubscribe(phase, task))
}
