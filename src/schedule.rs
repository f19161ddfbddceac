//! Time source and fixed-period scheduling.
//!
//! Periodic tasks suspend in exactly two places: sleeping until their
//! next deadline and waiting on a queue receive with a timeout. Both go
//! through [`Clock`], so the whole pipeline runs against a simulated
//! clock in tests and against `esp_timer` + FreeRTOS delays on target.

/// Monotonic microsecond time source with the two blocking primitives.
pub trait Clock {
    /// Microseconds since boot (monotonic).
    fn now_us(&self) -> u64;

    /// Block the calling task until `deadline_us` (returns at once if past).
    fn sleep_until(&self, deadline_us: u64);

    /// Give up the CPU briefly while polling a queue.
    fn relax(&self);
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }

    #[inline]
    fn sleep_until(&self, deadline_us: u64) {
        (**self).sleep_until(deadline_us)
    }

    #[inline]
    fn relax(&self) {
        (**self).relax()
    }
}

/// Absolute-deadline period timer (like `vTaskDelayUntil`).
///
/// Deadlines are `start + k * period`, so jitter in one cycle never
/// shifts the following ones. A cycle that ends after its deadline
/// skips forward to the next future deadline and reports how many
/// periods were missed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodicSchedule {
    period_us: u64,
    next_deadline_us: u64,
    missed_total: u32,
}

impl PeriodicSchedule {
    /// First deadline is one period after `start_us`.
    pub fn new(period_us: u64, start_us: u64) -> Self {
        let period_us = period_us.max(1);
        Self {
            period_us,
            next_deadline_us: start_us.saturating_add(period_us),
            missed_total: 0,
        }
    }

    /// Skip deadlines already in the past at `now_us`.
    ///
    /// Returns the number of periods skipped.
    pub fn catch_up(&mut self, now_us: u64) -> u32 {
        if now_us <= self.next_deadline_us {
            return 0;
        }
        let missed = (now_us - self.next_deadline_us) / self.period_us + 1;
        self.next_deadline_us += missed * self.period_us;
        let missed = missed.min(u32::MAX as u64) as u32;
        self.missed_total = self.missed_total.saturating_add(missed);
        missed
    }

    /// Sleep until the next deadline, then arm the one after it.
    ///
    /// Returns the number of periods missed before sleeping.
    pub fn wait<C: Clock>(&mut self, clock: &C) -> u32 {
        let missed = self.catch_up(clock.now_us());
        clock.sleep_until(self.next_deadline_us);
        self.next_deadline_us += self.period_us;
        missed
    }

    /// Deadline the next `wait` sleeps until (before catch-up).
    #[inline]
    pub fn next_deadline_us(&self) -> u64 {
        self.next_deadline_us
    }

    /// Period [µs].
    #[inline]
    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Periods missed since creation.
    #[inline]
    pub fn missed_total(&self) -> u32 {
        self.missed_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct StepClock {
        now: Cell<u64>,
    }

    impl Clock for StepClock {
        fn now_us(&self) -> u64 {
            self.now.get()
        }
        fn sleep_until(&self, deadline_us: u64) {
            if deadline_us > self.now.get() {
                self.now.set(deadline_us);
            }
        }
        fn relax(&self) {
            self.now.set(self.now.get() + 1);
        }
    }

    #[test]
    fn test_on_time_cycles_keep_grid() {
        let clock = StepClock { now: Cell::new(0) };
        let mut schedule = PeriodicSchedule::new(50_000, 0);

        for k in 1..=5u64 {
            clock.now.set(clock.now.get() + 7_000); // work
            assert_eq!(schedule.wait(&clock), 0);
            assert_eq!(clock.now_us(), k * 50_000);
        }
        assert_eq!(schedule.missed_total(), 0);
    }

    #[test]
    fn test_overrun_skips_to_next_deadline() {
        let clock = StepClock { now: Cell::new(0) };
        let mut schedule = PeriodicSchedule::new(50_000, 0);

        // Cycle overruns its 50ms deadline and ends at 120ms
        clock.now.set(120_000);
        assert_eq!(schedule.wait(&clock), 2);
        assert_eq!(clock.now_us(), 150_000);
        assert_eq!(schedule.next_deadline_us(), 200_000);
        assert_eq!(schedule.missed_total(), 2);
    }

    #[test]
    fn test_deadline_exactly_now_is_not_missed() {
        let mut schedule = PeriodicSchedule::new(10, 0);
        assert_eq!(schedule.catch_up(10), 0);
        assert_eq!(schedule.catch_up(11), 1);
        assert_eq!(schedule.next_deadline_us(), 20);
    }
}
