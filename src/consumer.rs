//! Actuation consumer with fail-safe.
//!
//! # Contract
//!
//! "Apply the last command on time; without fresh data, stop the motor."
//!
//! Each period the consumer first applies the command computed in the
//! previous period, then waits at most P/2 for the next sample. A missing
//! sample is never fatal: the next command becomes the stationary duty and
//! the consumer stays in `FailSafe` until data flows again.
//!
//! # Timeline
//!
//! ```text
//! period k:   apply(cmd[k-1]) ── recv_timeout(P/2) ──▶ cmd[k]
//!                                   │
//!                                   ├─ sample  → Driving,  cmd = input duty
//!                                   └─ timeout → FailSafe, cmd = stationary
//! ```

use core::fmt;

use crate::config::ControllerConfig;
use crate::fault::{FaultCode, FaultState};
use crate::logging::LogRing;
use crate::producer::ActuationQueue;
use crate::sample::ActuationCommand;
use crate::schedule::Clock;

const TAG: &str = "actuation";

/// Output driver failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActuatorError {
    /// Driver rejected the duty update; carries the driver's raw code.
    Rejected(i32),
}

impl ActuatorError {
    /// Short error code.
    pub fn code(&self) -> &'static str {
        match self {
            ActuatorError::Rejected(_) => "A01",
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &'static str {
        match self {
            ActuatorError::Rejected(_) => "duty update rejected",
        }
    }

    /// Raw driver code, recorded as fault data.
    pub fn raw(&self) -> i32 {
        match self {
            ActuatorError::Rejected(raw) => *raw,
        }
    }
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.code(), self.message(), self.raw())
    }
}

/// Output stage driving the speed controller.
pub trait Actuator {
    /// Set the output duty. Must not block.
    fn apply(&mut self, command: ActuationCommand) -> Result<(), ActuatorError>;
}

impl<A: Actuator + ?Sized> Actuator for &mut A {
    #[inline]
    fn apply(&mut self, command: ActuationCommand) -> Result<(), ActuatorError> {
        (**self).apply(command)
    }
}

/// Consumer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// Fresh samples arriving, input duty passed through.
    Driving,
    /// Last receive timed out, stationary duty applied.
    FailSafe,
}

/// Periodic consumer of the actuation queue.
pub struct ActuationConsumer<'a, A: Actuator> {
    actuator: A,
    queue: &'a ActuationQueue,
    faults: &'a FaultState,
    log: &'a LogRing,
    stationary: ActuationCommand,
    timeout_us: u64,
    state: ControllerState,
    next_command: ActuationCommand,
    consecutive_misses: u32,
    actuator_errors: u32,
}

impl<'a, A: Actuator> ActuationConsumer<'a, A> {
    /// Create a consumer in `FailSafe` with the stationary command pending.
    pub fn new(
        config: &ControllerConfig,
        actuator: A,
        queue: &'a ActuationQueue,
        faults: &'a FaultState,
        log: &'a LogRing,
    ) -> Self {
        let stationary = config.stationary_command();
        Self {
            actuator,
            queue,
            faults,
            log,
            stationary,
            timeout_us: config.receive_timeout_us(),
            state: ControllerState::FailSafe,
            next_command: stationary,
            consecutive_misses: 0,
            actuator_errors: 0,
        }
    }

    /// Run one period. Returns the state after the receive.
    pub fn cycle<C: Clock>(&mut self, clock: &C) -> ControllerState {
        if let Err(e) = self.actuator.apply(self.next_command) {
            self.actuator_errors = self.actuator_errors.wrapping_add(1);
            crate::rt_error!(
                self.log,
                TAG,
                clock.now_us(),
                "output {:.2} % not applied: {}",
                self.next_command.duty(),
                e
            );
            self.faults.record(FaultCode::ActuatorError, e.raw() as u32);
        }

        match self.queue.recv_timeout(self.timeout_us, clock) {
            Some(sample) => {
                self.state = ControllerState::Driving;
                self.next_command = sample.command(self.stationary);
                self.consecutive_misses = 0;
            }
            None => {
                self.state = ControllerState::FailSafe;
                self.next_command = self.stationary;
                self.consecutive_misses = self.consecutive_misses.saturating_add(1);
                crate::rt_error!(
                    self.log,
                    TAG,
                    clock.now_us(),
                    "no sample within {} us ({} in a row), output stationary",
                    self.timeout_us,
                    self.consecutive_misses
                );
                self.faults
                    .record(FaultCode::MeasurementTimeout, self.consecutive_misses);
            }
        }

        self.state
    }

    #[inline]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Command the next cycle applies.
    #[inline]
    pub fn next_command(&self) -> ActuationCommand {
        self.next_command
    }

    /// Receive timeouts since the last sample.
    #[inline]
    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    /// Failed output updates since startup.
    #[inline]
    pub fn actuator_errors(&self) -> u32 {
        self.actuator_errors
    }

    #[inline]
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    #[inline]
    pub fn faults(&self) -> &'a FaultState {
        self.faults
    }

    #[inline]
    pub fn log(&self) -> &'a LogRing {
        self.log
    }
}
