use crate::args::RunArgs;
use anyhow::Result;
use std::cell::Cell;
use std::rc::Rc;
use tickrelay_core::{FnTask, Phase, PumpReport, Relay, RelayConfig, TaskHandle, TickTime};

/// Scaled and unscaled clocks plus the fixed-step accumulator of a host loop.
#[derive(Debug, Clone)]
pub struct HostClock {
    pub scaled: f32,
    pub unscaled: f32,
    pub fixed_time: f32,
    time_scale: f32,
    fixed_step: f32,
    accumulator: f32,
}

impl HostClock {
    pub fn new(time_scale: f32, fixed_step: f32) -> Self {
        Self {
            scaled: 0.0,
            unscaled: 0.0,
            fixed_time: 0.0,
            time_scale,
            fixed_step,
            accumulator: 0.0,
        }
    }

    /// Advances by one frame and returns how many fixed steps are due.
    pub fn advance(&mut self, frame_seconds: f32) -> u32 {
        let delta = frame_seconds * self.time_scale;
        self.unscaled += frame_seconds;
        self.scaled += delta;
        self.accumulator += delta;

        let mut steps = 0;
        while self.accumulator >= self.fixed_step {
            self.accumulator -= self.fixed_step;
            steps += 1;
        }
        steps
    }

    pub fn now(&self) -> TickTime {
        TickTime::new(self.scaled, self.unscaled)
    }

    pub fn step_fixed(&mut self) -> TickTime {
        self.fixed_time += self.fixed_step;
        TickTime::new(self.fixed_time, self.unscaled)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Summary {
    pub frames: u32,
    pub pumps: [u64; 3],
    pub totals: [PumpReport; 3],
    pub remaining: [usize; 3],
    pub callbacks: u64,
}

impl Summary {
    pub fn phase(&self, phase: Phase) -> (u64, PumpReport, usize) {
        let i = phase.index();
        (self.pumps[i], self.totals[i], self.remaining[i])
    }
}

/// A host loop driving one relay.
pub struct Simulation {
    relay: Rc<Relay>,
    clock: HostClock,
    tasks: Vec<Option<TaskHandle>>,
    hosts: Vec<Rc<Cell<bool>>>,
    callbacks: Rc<Cell<u64>>,
    summary: Summary,
    args: RunArgs,
}

impl Simulation {
    pub fn new(args: RunArgs, config: RelayConfig) -> Result<Self> {
        args.validate()?;
        let relay = Rc::new(Relay::with_config(config)?);
        let callbacks = Rc::new(Cell::new(0));
        let mut tasks = Vec::with_capacity(args.tasks);
        let mut hosts = Vec::new();

        for i in 0..args.tasks {
            let counter = callbacks.clone();
            let task = FnTask::new(move |_| counter.set(counter.get() + 1));
            let handle = if args.inactive_every > 0 && i % args.inactive_every == 0 {
                let host = Rc::new(Cell::new(true));
                hosts.push(host.clone());
                task.with_host(move || Some(host.get())).handle()
            } else {
                task.handle()
            };
            relay.subscribe(Phase::ALL[i % 3], &handle);
            tasks.push(Some(handle));
        }
        tracing::info!(
            "Subscribed {} tasks ({} with hosts), config: {:?}",
            tasks.len(),
            hosts.len(),
            relay.config()
        );

        Ok(Self {
            relay,
            clock: HostClock::new(args.time_scale, args.fixed_step),
            tasks,
            hosts,
            callbacks,
            summary: Summary::default(),
            args,
        })
    }

    pub fn relay(&self) -> &Rc<Relay> {
        &self.relay
    }

    /// Runs one frame: early once, fixed as often as the accumulator allows, late once.
    pub fn frame(&mut self) -> Result<()> {
        let frame = self.summary.frames;
        if self.args.drop_every > 0 && frame == self.args.frames / 2 {
            self.drop_tasks();
        }

        let steps = self.clock.advance(self.args.frame_seconds);
        let active = (self.clock.unscaled as u64) % 2 == 0;
        for host in &self.hosts {
            host.set(active);
        }

        self.pump(Phase::Early, self.clock.now())?;
        for _ in 0..steps {
            let now = self.clock.step_fixed();
            self.pump(Phase::Fixed, now)?;
        }
        self.pump(Phase::Late, self.clock.now())?;

        self.summary.frames += 1;
        Ok(())
    }

    pub fn run(mut self) -> Result<Summary> {
        for _ in 0..self.args.frames {
            self.frame()?;
        }
        Ok(self.finish())
    }

    fn pump(&mut self, phase: Phase, now: TickTime) -> Result<()> {
        let report = self.relay.pump_at(phase, now)?;
        let i = phase.index();
        self.summary.pumps[i] += 1;
        self.summary.totals[i] += report;
        Ok(())
    }

    fn drop_tasks(&mut self) {
        let every = self.args.drop_every;
        let mut dropped = 0;
        for (i, task) in self.tasks.iter_mut().enumerate() {
            if i % every == 0 && task.take().is_some() {
                dropped += 1;
            }
        }
        tracing::info!("Dropped {} task handles at frame {}", dropped, self.summary.frames);
    }

    pub fn finish(mut self) -> Summary {
        for phase in Phase::ALL {
            self.summary.remaining[phase.index()] = self.relay.len(phase);
        }
        self.summary.callbacks = self.callbacks.get();
        self.relay.destroy();
        self.summary
    }
}
