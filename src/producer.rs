//! Measurement producer.
//!
//! # Architecture
//!
//! ```text
//!                   ┌──overwrite()──▶ ActuationQueue (depth 1) ──▶ consumer
//! Latches ──▶ cycle ┤
//!                   └──offer()──────▶ TelemetryQueue (depth N) ──▶ transmitter
//! ```
//!
//! # Rules
//!
//! - Runs once per period P; each cycle is bounded by `producer_budget_ms`.
//! - Never blocks on either queue.
//! - Timestamps never go backwards.
//! - A throttle input that stops publishing is reported once, not per cycle.

use crate::capture::CaptureChannels;
use crate::config::{ControllerConfig, TELEMETRY_QUEUE_LEN};
use crate::convert::Calibration;
use crate::fault::{FaultCode, FaultState};
use crate::logging::LogRing;
use crate::queue::BoundedQueue;
use crate::sample::{ActuationCommand, MeasurementSample};
use crate::schedule::Clock;
use crate::telemetry::{TelemetryFanout, TelemetryOutcome};

const TAG: &str = "producer";

/// Cycles without a new throttle input pair before the input counts as silent.
pub const SILENT_INPUT_CYCLES: u32 = 4;

/// Latest-value link from the producer to the actuation consumer.
pub type ActuationQueue = BoundedQueue<MeasurementSample, 1>;

/// Outcome of one producer cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleReport {
    pub sample: MeasurementSample,
    pub telemetry: TelemetryOutcome,
    /// Time spent in the cycle [µs].
    pub elapsed_us: u64,
}

/// Periodic snapshot, conversion and fan-out of the capture channels.
pub struct MeasurementProducer<'a, const N: usize = TELEMETRY_QUEUE_LEN> {
    channels: CaptureChannels<'a>,
    calibration: Calibration,
    actuation: &'a ActuationQueue,
    telemetry: TelemetryFanout<'a, N>,
    faults: &'a FaultState,
    log: &'a LogRing,
    stationary: ActuationCommand,
    budget_us: u64,
    last_timestamp_us: u64,
    last_input_updates: u32,
    unchanged_cycles: u32,
}

impl<'a, const N: usize> MeasurementProducer<'a, N> {
    pub fn new(
        config: &ControllerConfig,
        calibration: Calibration,
        channels: CaptureChannels<'a>,
        actuation: &'a ActuationQueue,
        telemetry: TelemetryFanout<'a, N>,
        faults: &'a FaultState,
        log: &'a LogRing,
    ) -> Self {
        Self {
            channels,
            calibration,
            actuation,
            telemetry,
            faults,
            log,
            stationary: config.stationary_command(),
            budget_us: config.producer_budget_us(),
            last_timestamp_us: 0,
            last_input_updates: 0,
            unchanged_cycles: 0,
        }
    }

    /// Run one period: snapshot, convert, publish.
    pub fn cycle<C: Clock>(&mut self, clock: &C) -> CycleReport {
        let started_us = clock.now_us();
        let timestamp_us = started_us.max(self.last_timestamp_us);
        self.last_timestamp_us = timestamp_us;

        let raw = self.channels.snapshot();
        self.watch_input(raw.throttle_in_updates, timestamp_us);
        let mut sample = self.calibration.convert(timestamp_us, raw);
        sample.throttle_out_duty = sample.command(self.stationary).duty();

        self.actuation.overwrite(sample);

        let telemetry = self.telemetry.offer(&sample);
        if telemetry == TelemetryOutcome::Sentinel {
            crate::rt_error!(
                self.log,
                TAG,
                timestamp_us,
                "telemetry queue full, data may be lost"
            );
            self.faults
                .record(FaultCode::TelemetryOverflow, self.telemetry.sentinels());
        }

        let elapsed_us = clock.now_us().saturating_sub(started_us);
        if elapsed_us > self.budget_us {
            crate::rt_warn!(
                self.log,
                TAG,
                timestamp_us,
                "cycle took {} us (budget {} us)",
                elapsed_us,
                self.budget_us
            );
            let data = elapsed_us.min(u32::MAX as u64) as u32;
            self.faults.record(FaultCode::ProducerBudget, data);
        }

        CycleReport {
            sample,
            telemetry,
            elapsed_us,
        }
    }

    fn watch_input(&mut self, updates: u32, timestamp_us: u64) {
        if updates != self.last_input_updates {
            if self.input_silent() {
                crate::rt_info!(self.log, TAG, timestamp_us, "throttle input back");
            }
            self.last_input_updates = updates;
            self.unchanged_cycles = 0;
            return;
        }

        self.unchanged_cycles = self.unchanged_cycles.saturating_add(1);
        if self.unchanged_cycles == SILENT_INPUT_CYCLES {
            crate::rt_warn!(
                self.log,
                TAG,
                timestamp_us,
                "throttle input silent for {} cycles, holding last value",
                SILENT_INPUT_CYCLES
            );
        }
    }

    /// No throttle input pair seen for `SILENT_INPUT_CYCLES` or more.
    #[inline]
    pub fn input_silent(&self) -> bool {
        self.unchanged_cycles >= SILENT_INPUT_CYCLES
    }

    /// Telemetry fan-out counters.
    #[inline]
    pub fn telemetry(&self) -> &TelemetryFanout<'a, N> {
        &self.telemetry
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
