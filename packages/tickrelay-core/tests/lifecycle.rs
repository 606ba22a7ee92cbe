use std::cell::Cell;
use std::rc::Rc;
use tickrelay_core::{FnTask, Phase, PumpReport, Relay, global};

fn noop() -> tickrelay_core::TaskHandle {
    FnTask::new(|_| {}).handle()
}

#[test]
fn test_destroy_notifies_listeners_once() {
    let relay = Relay::new();
    let fired = Rc::new(Cell::new(0));
    {
        let fired = fired.clone();
        relay.on_destroyed(move || fired.set(fired.get() + 1));
    }

    relay.destroy();
    relay.destroy();
    assert_eq!(fired.get(), 1);

    // Late listeners learn about the teardown immediately.
    let late = fired.clone();
    relay.on_destroyed(move || late.set(late.get() + 10));
    assert_eq!(fired.get(), 11);
}

#[test]
fn test_destroyed_relay_is_inert() {
    let relay = Relay::new();
    let task = noop();
    relay.subscribe(Phase::Late, &task);
    relay.destroy();

    assert!(relay.is_empty(Phase::Late));
    relay.subscribe(Phase::Late, &task);
    assert!(relay.is_empty(Phase::Late));
    assert!(!relay.unsubscribe(Phase::Late, &task));

    assert_eq!(relay.pump(Phase::Late, 1.0), Ok(PumpReport::default()));
    assert_eq!(relay.tick_index(), 0);
}

#[test]
fn test_dropping_relay_counts_as_teardown() {
    let fired = Rc::new(Cell::new(false));
    {
        let relay = Relay::new();
        let fired = fired.clone();
        relay.on_destroyed(move || fired.set(true));
    }
    assert!(fired.get());
}

#[test]
fn test_default_relay_is_shared_until_teardown() {
    let first = global::default_relay().unwrap();
    let second = global::default_relay().unwrap();
    assert!(Rc::ptr_eq(&first, &second));

    let runs = Rc::new(Cell::new(0));
    let task = {
        let runs = runs.clone();
        FnTask::new(move |_| runs.set(runs.get() + 1)).handle()
    };
    assert!(global::subscribe(Phase::Early, &task));
    first.pump(Phase::Early, 0.0).unwrap();
    assert_eq!(runs.get(), 1);
    assert!(global::unsubscribe(Phase::Early, &task));
}

#[test]
fn test_teardown_is_one_shot() {
    let relay = global::default_relay().unwrap();
    let observed = Rc::new(Cell::new(None));
    {
        let observed = observed.clone();
        relay.on_destroyed(move || observed.set(Some(global::default_relay().is_none())));
    }

    assert!(global::teardown());
    assert_eq!(observed.get(), Some(true));
    assert!(global::is_torn_down());
    assert!(relay.is_destroyed());

    assert!(global::default_relay().is_none());
    let task = noop();
    assert!(!global::subscribe(Phase::Late, &task));
    assert!(!global::unsubscribe(Phase::Late, &task));
    assert!(!global::teardown());
}

#[test]
fn test_default_relay_is_torn_down_with_its_thread() {
    let (sender, receiver) = std::sync::mpsc::channel();
    let worker = std::thread::spawn(move || {
        let relay = global::default_relay().unwrap();
        relay.subscribe(Phase::Early, &noop());
        relay.on_destroyed(move || {
            let observed = (global::is_torn_down(), global::default_relay().is_none());
            sender.send(observed).unwrap();
        });
    });

    assert!(worker.join().is_ok());
    assert_eq!(receiver.recv().unwrap(), (true, true));
}
