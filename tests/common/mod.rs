//! Shared test fixtures.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use rc_car_controller::consumer::{Actuator, ActuatorError};
use rc_car_controller::sample::ActuationCommand;
use rc_car_controller::schedule::Clock;

/// Simulated time. `relax` advances by a fixed step, `sleep_until` jumps.
pub struct ManualClock {
    now: AtomicU64,
    relax_step_us: u64,
}

impl ManualClock {
    pub fn new(relax_step_us: u64) -> Self {
        Self {
            now: AtomicU64::new(0),
            relax_step_us,
        }
    }

    pub fn set(&self, now_us: u64) {
        self.now.store(now_us, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_us: u64) {
        self.now.fetch_add(delta_us, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_until(&self, deadline_us: u64) {
        self.now.fetch_max(deadline_us, Ordering::SeqCst);
    }

    fn relax(&self) {
        self.advance(self.relax_step_us);
    }
}

/// Wall-clock time for threaded tests.
pub struct WallClock {
    start: std::time::Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for WallClock {
    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    fn sleep_until(&self, deadline_us: u64) {
        let now = self.now_us();
        if deadline_us > now {
            std::thread::sleep(std::time::Duration::from_micros(deadline_us - now));
        }
    }

    fn relax(&self) {
        std::thread::sleep(std::time::Duration::from_micros(200));
    }
}

/// Actuator recording every applied duty.
#[derive(Default)]
pub struct RecordingActuator {
    pub applied: Vec<f32>,
}

impl Actuator for RecordingActuator {
    fn apply(&mut self, command: ActuationCommand) -> Result<(), ActuatorError> {
        self.applied.push(command.duty());
        Ok(())
    }
}

impl RecordingActuator {
    pub fn last(&self) -> Option<f32> {
        self.applied.last().copied()
    }
}
