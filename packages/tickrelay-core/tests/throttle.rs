use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tickrelay_core::{DispatchPolicy, FnTask, Phase, Relay, SkipPolicy, TickTime};

type Runs = Rc<RefCell<Vec<f32>>>;

fn recording(runs: Runs) -> FnTask<impl FnMut(f32)> {
    FnTask::new(move |elapsed| runs.borrow_mut().push(elapsed))
}

#[test]
fn test_count_skip_runs_every_third_tick() {
    let relay = Relay::new();
    relay.set_skip(SkipPolicy::every(2)).unwrap();
    let runs = Runs::default();
    let task = recording(runs.clone()).handle();
    relay.subscribe(Phase::Late, &task);

    let mut ran_at = Vec::new();
    for tick in 0..6 {
        if relay.pump(Phase::Late, 0.0).unwrap().invoked == 1 {
            ran_at.push(tick);
        }
    }

    assert_eq!(ran_at, vec![0, 3]);
}

#[test]
fn test_time_skip_is_a_per_task_cooldown() {
    let relay = Relay::new();
    relay.set_skip(SkipPolicy::cooldown(1.0).unwrap()).unwrap();
    let runs = Runs::default();
    let task = recording(runs.clone()).handle();
    relay.subscribe(Phase::Late, &task);

    let mut now = 0.0f32;
    let mut ran_at = Vec::new();
    for _ in 0..4 {
        if relay.pump(Phase::Late, now).unwrap().invoked == 1 {
            ran_at.push(now);
        }
        now += 0.4;
    }

    assert_eq!(ran_at.len(), 2);
    assert_eq!(ran_at[0], 0.0);
    assert!((ran_at[1] - 1.2).abs() < 1e-5);
    assert!((runs.borrow()[1] - 1.2).abs() < 1e-5);
}

#[test]
fn test_cooldown_measures_from_last_real_run() {
    let relay = Relay::new();
    relay.set_skip(SkipPolicy::cooldown(1.0).unwrap()).unwrap();
    let runs = Runs::default();
    let active = Rc::new(Cell::new(true));
    let task = {
        let active = active.clone();
        recording(runs.clone()).with_host(move || Some(active.get())).handle()
    };
    relay.subscribe(Phase::Late, &task);

    relay.pump(Phase::Late, 0.0).unwrap();
    active.set(false);
    assert_eq!(relay.pump(Phase::Late, 0.5).unwrap().failed, 1);
    assert_eq!(relay.pump(Phase::Late, 1.0).unwrap().failed, 1);
    active.set(true);
    relay.pump(Phase::Late, 1.5).unwrap();

    assert_eq!(*runs.borrow(), vec![0.0, 1.5]);
}

#[test]
fn test_elapsed_spans_skipped_ticks() {
    let relay = Relay::new();
    let runs = Runs::default();
    let active = Rc::new(Cell::new(true));
    let task = {
        let active = active.clone();
        recording(runs.clone()).with_host(move || Some(active.get())).handle()
    };
    relay.subscribe(Phase::Fixed, &task);

    relay.pump(Phase::Fixed, 0.0).unwrap();
    active.set(false);
    relay.pump(Phase::Fixed, 1.0).unwrap();
    relay.pump(Phase::Fixed, 2.0).unwrap();
    active.set(true);
    relay.pump(Phase::Fixed, 3.0).unwrap();

    assert_eq!(*runs.borrow(), vec![0.0, 3.0]);
}

#[test]
fn test_elapsed_starts_at_subscription() {
    let relay = Relay::new();
    relay.pump(Phase::Early, 5.0).unwrap();

    let runs = Runs::default();
    let task = recording(runs.clone()).handle();
    relay.subscribe(Phase::Early, &task);
    relay.pump(Phase::Early, 6.0).unwrap();

    assert_eq!(*runs.borrow(), vec![1.0]);
}

#[test]
fn test_unscaled_tasks_use_unscaled_clock() {
    let relay = Relay::new();
    let scaled_runs = Runs::default();
    let unscaled_runs = Runs::default();
    let scaled = recording(scaled_runs.clone()).handle();
    let unscaled = recording(unscaled_runs.clone()).unscaled().handle();
    relay.subscribe(Phase::Late, &scaled);
    relay.subscribe(Phase::Late, &unscaled);

    relay.pump_at(Phase::Late, TickTime::default()).unwrap();
    // Host running at half speed.
    relay.pump_at(Phase::Late, TickTime::new(0.5, 1.0)).unwrap();

    assert_eq!(*scaled_runs.borrow(), vec![0.0, 0.5]);
    assert_eq!(*unscaled_runs.borrow(), vec![0.0, 1.0]);
}

#[test]
fn test_tasks_subscribed_before_first_pump_start_at_that_pump() {
    let relay = Relay::new();
    let runs = Runs::default();
    let task = recording(runs.clone()).handle();
    relay.subscribe(Phase::Late, &task);
    assert_eq!(relay.now(Phase::Late), None);

    relay.pump(Phase::Late, 100.0).unwrap();
    relay.pump(Phase::Late, 100.5).unwrap();

    assert_eq!(*runs.borrow(), vec![0.0, 0.5]);
}

#[test]
fn test_subscribing_from_another_phase_uses_that_phase_clock() {
    let relay = Rc::new(Relay::new());
    relay.pump(Phase::Fixed, 0.0).unwrap();

    let runs = Runs::default();
    let fixed_task = recording(runs.clone()).handle();
    let joiner = {
        let relay = relay.clone();
        let fixed_task = fixed_task.clone();
        FnTask::new(move |_| relay.subscribe(Phase::Fixed, &fixed_task)).handle()
    };
    relay.subscribe(Phase::Early, &joiner);

    // The early clock runs ahead of the fixed-step clock.
    relay.pump(Phase::Early, 0.033).unwrap();
    relay.pump(Phase::Fixed, 0.02).unwrap();

    assert_eq!(runs.borrow().len(), 1);
    assert!((runs.borrow()[0] - 0.02).abs() < 1e-6);
}

#[test]
fn test_cross_phase_subscription_to_unpumped_phase_starts_at_zero() {
    let relay = Rc::new(Relay::new());
    let runs = Runs::default();
    let fixed_task = recording(runs.clone()).handle();
    let joiner = {
        let relay = relay.clone();
        let fixed_task = fixed_task.clone();
        FnTask::new(move |_| relay.subscribe(Phase::Fixed, &fixed_task)).handle()
    };
    relay.subscribe(Phase::Early, &joiner);

    relay.pump(Phase::Early, 0.033).unwrap();
    relay.pump(Phase::Fixed, 0.02).unwrap();
    relay.pump(Phase::Fixed, 0.04).unwrap();

    assert_eq!(runs.borrow()[0], 0.0);
    assert!((runs.borrow()[1] - 0.02).abs() < 1e-6);
}

#[test]
fn test_throttled_tasks_use_up_their_turn() {
    let relay = Relay::new();
    relay.set_policy(DispatchPolicy::spread(2).unwrap()).unwrap();
    relay.set_skip(SkipPolicy::every(1)).unwrap();
    let runs = Runs::default();
    let tasks: Vec<_> = (0..3).map(|_| recording(runs.clone()).handle()).collect();
    for task in &tasks {
        relay.subscribe(Phase::Late, task);
    }

    let first = relay.pump(Phase::Late, 0.0).unwrap();
    assert_eq!((first.invoked, first.throttled), (2, 0));

    let second = relay.pump(Phase::Late, 0.0).unwrap();
    assert_eq!((second.invoked, second.throttled), (0, 2));
    assert_eq!(second.visited, 2);

    let third = relay.pump(Phase::Late, 0.0).unwrap();
    assert_eq!((third.invoked, third.throttled), (2, 0));
    assert_eq!(runs.borrow().len(), 4);
}
