//! Console output of the log rings.
//!
//! Runs in a low-priority task and may block on the console. Entries are
//! written in ESP-IDF console style:
//!
//! ```text
//! E (12345) actuation: no sample within 25000 us (2 in a row)
//! ```
//!
//! where the number in parentheses is milliseconds since boot. Dropped
//! message counts and fault counters are reported every
//! `report_interval_us`.

use core::fmt::{self, Write};

use crate::fault::{FaultCode, FaultState};
use crate::logging::{LogEntry, LogRing};

/// Default interval between dropped/fault reports [µs].
pub const REPORT_INTERVAL_US: u64 = 10_000_000;

/// Format one entry (newline-terminated).
pub fn format_entry<W: Write>(entry: &LogEntry, out: &mut W) -> fmt::Result {
    writeln!(
        out,
        "{} ({}) {}: {}",
        entry.level.letter(),
        entry.timestamp_us / 1000,
        entry.tag,
        entry.msg
    )
}

/// Write every pending entry of `ring`. Returns the number written.
pub fn drain<const N: usize, W: Write>(ring: &LogRing<N>, out: &mut W) -> usize {
    let mut written = 0;
    while let Some(entry) = ring.drain() {
        let _ = format_entry(&entry, out);
        written += 1;
    }
    written
}

/// Report and clear the dropped counter of `ring`.
pub fn report_dropped<const N: usize, W: Write>(
    name: &str,
    ring: &LogRing<N>,
    out: &mut W,
) -> fmt::Result {
    let dropped = ring.take_dropped();
    if dropped > 0 {
        writeln!(out, "W log: {} dropped {} messages", name, dropped)?;
    }
    Ok(())
}

/// Report non-zero fault counters, one line per code.
pub fn report_faults<W: Write>(faults: &FaultState, out: &mut W) -> fmt::Result {
    if faults.total() == 0 {
        return Ok(());
    }
    for code in FaultCode::RECORDABLE {
        let count = faults.count(code);
        if count > 0 {
            writeln!(out, "W fault: {} x{}", code.as_str(), count)?;
        }
    }
    let snapshot = faults.snapshot();
    writeln!(
        out,
        "W fault: last {} (data {})",
        snapshot.last.as_str(),
        snapshot.last_data
    )
}

/// Drain state for the console task.
pub struct LogDrain {
    report_interval_us: u64,
    last_report_us: u64,
}

impl LogDrain {
    pub const fn new(report_interval_us: u64) -> Self {
        Self {
            report_interval_us,
            last_report_us: 0,
        }
    }

    /// Drain both rings (control first) and emit the periodic report when due.
    ///
    /// Returns the number of entries written.
    pub fn poll<const N: usize, W: Write>(
        &mut self,
        now_us: u64,
        control: &LogRing<N>,
        net: &LogRing<N>,
        faults: &FaultState,
        out: &mut W,
    ) -> usize {
        let written = drain(control, out) + drain(net, out);

        if now_us.saturating_sub(self.last_report_us) >= self.report_interval_us {
            self.last_report_us = now_us;
            let _ = report_dropped("control", control, out);
            let _ = report_dropped("net", net, out);
            let _ = report_faults(faults, out);
        }

        written
    }
}

impl Default for LogDrain {
    fn default() -> Self {
        Self::new(REPORT_INTERVAL_US)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{format_message, LogLevel};

    #[test]
    fn test_format_entry() {
        let entry = LogEntry {
            timestamp_us: 12_345_678,
            level: LogLevel::Error,
            tag: "actuation",
            msg: format_message(format_args!("no sample")),
        };
        let mut out = String::new();
        format_entry(&entry, &mut out).unwrap();
        assert_eq!(out, "E (12345) actuation: no sample\n");
    }

    #[test]
    fn test_drain_empties_ring() {
        let ring = LogRing::<8>::new();
        crate::rt_info!(ring, "producer", 1_000, "one");
        crate::rt_warn!(ring, "producer", 2_000, "two");

        let mut out = String::new();
        assert_eq!(drain(&ring, &mut out), 2);
        assert_eq!(out, "I (1) producer: one\nW (2) producer: two\n");
        assert_eq!(ring.pending(), 0);
    }

    #[test]
    fn test_report_faults_lists_counts() {
        let faults = FaultState::new();
        let mut out = String::new();
        report_faults(&faults, &mut out).unwrap();
        assert!(out.is_empty());

        faults.record(FaultCode::MeasurementTimeout, 3);
        report_faults(&faults, &mut out).unwrap();
        assert!(out.contains("measurement-timeout x1"));
        assert!(out.contains("last measurement-timeout (data 3)"));
    }

    #[test]
    fn test_poll_reports_on_interval() {
        let control = LogRing::<2>::new();
        let net = LogRing::<2>::new();
        let faults = FaultState::new();
        let mut log_drain = LogDrain::new(1_000);

        for _ in 0..3 {
            crate::rt_error!(control, "producer", 0, "x");
        }

        let mut out = String::new();
        assert_eq!(log_drain.poll(500, &control, &net, &faults, &mut out), 2);
        assert!(!out.contains("dropped"));

        out.clear();
        log_drain.poll(1_500, &control, &net, &faults, &mut out);
        assert_eq!(out, "W log: control dropped 1 messages\n");
    }
}
