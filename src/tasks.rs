//! Periodic task loops.
//!
//! ```text
//! t0        t0+P      t0+2P     t0+3P
//! │ cycle ──│ cycle ──│ cycle ──│ ...
//! └─ sleep_until ─────┘
//! ```
//!
//! A cycle that runs past its deadline skips the missed periods rather
//! than running them back to back; each skip is a `DeadlineOverrun` fault.

use crate::consumer::{ActuationConsumer, Actuator};
use crate::fault::{FaultCode, FaultState};
use crate::logging::LogRing;
use crate::producer::MeasurementProducer;
use crate::schedule::{Clock, PeriodicSchedule};

/// Deadline keeping for one periodic task.
pub struct PeriodicRunner<'a> {
    tag: &'static str,
    schedule: PeriodicSchedule,
    faults: &'a FaultState,
    log: &'a LogRing,
}

impl<'a> PeriodicRunner<'a> {
    /// Start the period grid at the current time.
    pub fn new<C: Clock>(
        tag: &'static str,
        period_us: u64,
        clock: &C,
        faults: &'a FaultState,
        log: &'a LogRing,
    ) -> Self {
        Self {
            tag,
            schedule: PeriodicSchedule::new(period_us, clock.now_us()),
            faults,
            log,
        }
    }

    /// Sleep until the next period starts. Returns the periods skipped.
    pub fn wait<C: Clock>(&mut self, clock: &C) -> u32 {
        let missed = self.schedule.wait(clock);
        if missed > 0 {
            self.faults.record(FaultCode::DeadlineOverrun, missed);
            crate::rt_warn!(
                self.log,
                self.tag,
                clock.now_us(),
                "deadline overrun, {} periods skipped",
                missed
            );
        }
        missed
    }
}

/// Run the measurement producer forever, one cycle per period.
pub fn run_producer<C: Clock, const N: usize>(
    mut producer: MeasurementProducer<'_, N>,
    period_us: u64,
    clock: &C,
) -> ! {
    let (faults, log) = (producer.faults(), producer.log());
    let mut runner = PeriodicRunner::new("producer", period_us, clock, faults, log);
    crate::rt_info!(
        log,
        "producer",
        clock.now_us(),
        "running, period {} us",
        period_us
    );
    loop {
        producer.cycle(clock);
        runner.wait(clock);
    }
}

/// Run the actuation consumer forever, one cycle per period.
pub fn run_consumer<C: Clock, A: Actuator>(
    mut consumer: ActuationConsumer<'_, A>,
    period_us: u64,
    clock: &C,
) -> ! {
    let (faults, log) = (consumer.faults(), consumer.log());
    let mut runner = PeriodicRunner::new("actuation", period_us, clock, faults, log);
    crate::rt_info!(
        log,
        "actuation",
        clock.now_us(),
        "running, period {} us",
        period_us
    );
    loop {
        consumer.cycle(clock);
        runner.wait(clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct SimClock {
        now: Cell<u64>,
    }

    impl Clock for SimClock {
        fn now_us(&self) -> u64 {
            self.now.get()
        }
        fn sleep_until(&self, deadline_us: u64) {
            self.now.set(self.now.get().max(deadline_us));
        }
        fn relax(&self) {
            self.now.set(self.now.get() + 1);
        }
    }

    #[test]
    fn test_runner_on_time() {
        let clock = SimClock { now: Cell::new(0) };
        let faults = FaultState::new();
        let log = LogRing::new();
        let mut runner = PeriodicRunner::new("t", 50_000, &clock, &faults, &log);

        assert_eq!(runner.wait(&clock), 0);
        assert_eq!(clock.now_us(), 50_000);
        assert_eq!(faults.total(), 0);
    }

    #[test]
    fn test_runner_records_overrun() {
        let clock = SimClock { now: Cell::new(0) };
        let faults = FaultState::new();
        let log = LogRing::new();
        let mut runner = PeriodicRunner::new("t", 50_000, &clock, &faults, &log);

        clock.now.set(160_000);
        assert_eq!(runner.wait(&clock), 3);
        assert_eq!(clock.now_us(), 200_000);
        assert_eq!(faults.count(FaultCode::DeadlineOverrun), 1);
        assert_eq!(faults.snapshot().last_data, 3);
        assert_eq!(log.drain().unwrap().tag, "t");
    }
}
