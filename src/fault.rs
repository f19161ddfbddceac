//! Fault bookkeeping for the control pipeline.
//!
//! Every runtime fault in this system is recovered locally (fail-safe
//! command, sentinel record, session reset). Nothing here stops the
//! vehicle by itself: `FaultState` only counts what happened so the log
//! drain can report it.
//!
//! All counters are atomics, so interrupt callbacks and every task may
//! record concurrently without a lock.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Fault codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault recorded yet.
    None = 0,

    /// Actuation consumer received no sample within its timeout.
    /// Output degraded to the stationary duty.
    MeasurementTimeout = 1,

    /// Telemetry queue down to its last slot; sentinel row enqueued.
    TelemetryOverflow = 2,

    /// Edge capture saw an out-of-order edge (missed falling or orphan falling).
    EdgeSequence = 3,

    /// A periodic task woke after its deadline and skipped periods.
    DeadlineOverrun = 4,

    /// Producer cycle exceeded its conversion budget.
    ProducerBudget = 5,

    /// Telemetry client link failed; session closed.
    LinkError = 6,

    /// Output driver rejected a duty update.
    ActuatorError = 7,
}

impl FaultCode {
    /// Number of codes (including `None`).
    pub const COUNT: usize = 8;

    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::MeasurementTimeout,
            2 => FaultCode::TelemetryOverflow,
            3 => FaultCode::EdgeSequence,
            4 => FaultCode::DeadlineOverrun,
            5 => FaultCode::ProducerBudget,
            6 => FaultCode::LinkError,
            7 => FaultCode::ActuatorError,
            _ => FaultCode::None,
        }
    }

    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::None => "none",
            FaultCode::MeasurementTimeout => "measurement-timeout",
            FaultCode::TelemetryOverflow => "telemetry-overflow",
            FaultCode::EdgeSequence => "edge-sequence",
            FaultCode::DeadlineOverrun => "deadline-overrun",
            FaultCode::ProducerBudget => "producer-budget",
            FaultCode::LinkError => "link-error",
            FaultCode::ActuatorError => "actuator-error",
        }
    }

    /// All codes that can be recorded.
    pub const RECORDABLE: [FaultCode; FaultCode::COUNT - 1] = [
        FaultCode::MeasurementTimeout,
        FaultCode::TelemetryOverflow,
        FaultCode::EdgeSequence,
        FaultCode::DeadlineOverrun,
        FaultCode::ProducerBudget,
        FaultCode::LinkError,
        FaultCode::ActuatorError,
    ];
}

/// Lock-free per-code fault counters.
///
/// # Usage
///
/// ```ignore
/// static FAULTS: FaultState = FaultState::new();
///
/// // Actuation consumer, on receive timeout:
/// FAULTS.record(FaultCode::MeasurementTimeout, consecutive_misses);
///
/// // Log drain, every few seconds:
/// for code in FaultCode::RECORDABLE {
///     report(code, FAULTS.count(code));
/// }
/// ```
pub struct FaultState {
    counts: [AtomicU32; FaultCode::COUNT],
    last: AtomicU8,
    last_data: AtomicU32,
}

impl FaultState {
    /// Create empty fault state.
    pub const fn new() -> Self {
        const ZERO: AtomicU32 = AtomicU32::new(0);
        Self {
            counts: [ZERO; FaultCode::COUNT],
            last: AtomicU8::new(FaultCode::None as u8),
            last_data: AtomicU32::new(0),
        }
    }

    /// Record one occurrence of `code` with code-specific data.
    ///
    /// ISR-safe: atomics only.
    #[inline]
    pub fn record(&self, code: FaultCode, data: u32) {
        if code == FaultCode::None {
            return;
        }
        self.counts[code as usize].fetch_add(1, Ordering::Relaxed);
        self.last_data.store(data, Ordering::Relaxed);
        self.last.store(code as u8, Ordering::Release);
    }

    /// Occurrences of `code` since boot.
    #[inline]
    pub fn count(&self, code: FaultCode) -> u32 {
        self.counts[code as usize].load(Ordering::Relaxed)
    }

    /// Most recently recorded code.
    #[inline]
    pub fn last(&self) -> FaultCode {
        FaultCode::from_u8(self.last.load(Ordering::Acquire))
    }

    /// Total faults of any kind since boot.
    pub fn total(&self) -> u32 {
        FaultCode::RECORDABLE
            .iter()
            .fold(0u32, |acc, code| acc.wrapping_add(self.count(*code)))
    }

    /// Get a snapshot of the current fault state.
    pub fn snapshot(&self) -> FaultSnapshot {
        FaultSnapshot {
            last: self.last(),
            last_data: self.last_data.load(Ordering::Relaxed),
            total: self.total(),
        }
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of fault state at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultSnapshot {
    pub last: FaultCode,
    pub last_data: u32,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_state_basic() {
        let faults = FaultState::new();

        assert_eq!(faults.last(), FaultCode::None);
        assert_eq!(faults.total(), 0);

        faults.record(FaultCode::MeasurementTimeout, 2);

        assert_eq!(faults.last(), FaultCode::MeasurementTimeout);
        assert_eq!(faults.count(FaultCode::MeasurementTimeout), 1);
        assert_eq!(faults.snapshot().last_data, 2);
    }

    #[test]
    fn test_counts_are_per_code() {
        let faults = FaultState::new();

        faults.record(FaultCode::TelemetryOverflow, 0);
        faults.record(FaultCode::TelemetryOverflow, 0);
        faults.record(FaultCode::EdgeSequence, 7);
        faults.record(FaultCode::None, 9);

        assert_eq!(faults.count(FaultCode::TelemetryOverflow), 2);
        assert_eq!(faults.count(FaultCode::EdgeSequence), 1);
        assert_eq!(faults.count(FaultCode::None), 0);
        assert_eq!(faults.total(), 3);
        assert_eq!(faults.last(), FaultCode::EdgeSequence);
    }

    #[test]
    fn test_code_round_trip() {
        for code in FaultCode::RECORDABLE {
            assert_eq!(FaultCode::from_u8(code as u8), code);
        }
        assert_eq!(FaultCode::from_u8(200), FaultCode::None);
    }
}
