//! Telemetry records and the producer-side fan-out policy.
//!
//! # Architecture
//!
//! ```text
//! Producer ──offer()──▶ TelemetryFanout ──▶ TelemetryQueue ──▶ Transmitter
//!                        │
//!                        ├─ free > 1  → data row
//!                        ├─ free == 1 → sentinel row
//!                        └─ free == 0 → drop (counted)
//! ```
//!
//! The producer never waits on the network side. When the transmitter
//! falls behind, the last free slot is spent on a sentinel row so the
//! client can see that rows are missing from the stream.

use core::fmt::Write;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use heapless::String;

use crate::config::TELEMETRY_QUEUE_LEN;
use crate::queue::BoundedQueue;
use crate::sample::MeasurementSample;

/// Maximum length of one record, newline included [bytes].
pub const RECORD_LEN: usize = 96;

/// First line sent on every new client session.
pub const HEADER: &str =
    "time[us], rot/s, throttle in duty[%], throttle out duty[%], distance[m]\n";

/// Row enqueued in place of data when the queue is about to overflow.
pub const SENTINEL: &str = "WARNING: data may be lost\n";

/// One newline-terminated telemetry row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    text: String<RECORD_LEN>,
}

impl TelemetryRecord {
    /// Format a sample as a CSV row.
    ///
    /// A row that does not fit [`RECORD_LEN`] is replaced by the sentinel.
    pub fn from_sample(sample: &MeasurementSample) -> Self {
        let mut text = String::new();
        let written = writeln!(
            text,
            "{}, {:.6}, {:.6}, {:.6}, {:.6}",
            sample.timestamp_us,
            sample.rot_velocity,
            sample.throttle_in_duty,
            sample.throttle_out_duty,
            sample.distance
        );
        match written {
            Ok(()) => Self { text },
            Err(_) => Self::sentinel(),
        }
    }

    /// The data-loss marker row.
    pub fn sentinel() -> Self {
        let mut text = String::new();
        // SENTINEL is shorter than RECORD_LEN
        let _ = text.push_str(SENTINEL);
        Self { text }
    }

    /// True for the data-loss marker.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.text.as_str() == SENTINEL
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Parse a data row back into a sample.
    ///
    /// Returns `None` for the sentinel and for malformed rows.
    pub fn parse(&self) -> Option<MeasurementSample> {
        let mut fields = self.text.trim_end().split(", ");
        let sample = MeasurementSample {
            timestamp_us: fields.next()?.parse().ok()?,
            rot_velocity: fields.next()?.parse().ok()?,
            throttle_in_duty: fields.next()?.parse().ok()?,
            throttle_out_duty: fields.next()?.parse().ok()?,
            distance: fields.next()?.parse().ok()?,
        };
        if fields.next().is_some() {
            return None;
        }
        Some(sample)
    }
}

/// Queue between the producer and the transmitter.
pub type TelemetryQueue = BoundedQueue<TelemetryRecord, TELEMETRY_QUEUE_LEN>;

/// What the producer may enqueue given the free slots left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Record,
    Sentinel,
    Drop,
}

impl Admission {
    #[inline]
    pub fn for_free_slots(free: usize) -> Self {
        match free {
            0 => Admission::Drop,
            1 => Admission::Sentinel,
            _ => Admission::Record,
        }
    }
}

/// Result of offering one sample to telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TelemetryOutcome {
    /// No client connected, nothing enqueued.
    Offline,
    /// Data row enqueued.
    Queued,
    /// Sentinel row enqueued in place of the data row.
    Sentinel,
    /// Queue full, sample dropped.
    Dropped,
}

/// Client session flag shared by the transmitter and the producer.
pub struct LinkState {
    connected: AtomicBool,
    sessions: AtomicU32,
}

impl LinkState {
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            sessions: AtomicU32::new(0),
        }
    }

    /// Mark a new session as started.
    #[inline]
    pub fn connect(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
        self.connected.store(true, Ordering::Release);
    }

    #[inline]
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Sessions started since boot.
    #[inline]
    pub fn sessions(&self) -> u32 {
        self.sessions.load(Ordering::Relaxed)
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer-side admission into the telemetry queue.
pub struct TelemetryFanout<'a, const N: usize = TELEMETRY_QUEUE_LEN> {
    queue: &'a BoundedQueue<TelemetryRecord, N>,
    link: &'a LinkState,
    sentinels: u32,
    dropped: u32,
}

impl<'a, const N: usize> TelemetryFanout<'a, N> {
    pub const fn new(queue: &'a BoundedQueue<TelemetryRecord, N>, link: &'a LinkState) -> Self {
        Self {
            queue,
            link,
            sentinels: 0,
            dropped: 0,
        }
    }

    /// Apply the backpressure policy to one sample. Never blocks.
    pub fn offer(&mut self, sample: &MeasurementSample) -> TelemetryOutcome {
        if !self.link.is_connected() {
            return TelemetryOutcome::Offline;
        }

        let record = match Admission::for_free_slots(self.queue.free_slots()) {
            Admission::Record => TelemetryRecord::from_sample(sample),
            Admission::Sentinel => TelemetryRecord::sentinel(),
            Admission::Drop => {
                self.dropped = self.dropped.wrapping_add(1);
                return TelemetryOutcome::Dropped;
            }
        };

        // The transmitter only removes entries, so the slot seen above is still free
        let sentinel = record.is_sentinel();
        match self.queue.try_send(record) {
            Ok(()) if sentinel => {
                self.sentinels = self.sentinels.wrapping_add(1);
                TelemetryOutcome::Sentinel
            }
            Ok(()) => TelemetryOutcome::Queued,
            Err(_) => {
                self.dropped = self.dropped.wrapping_add(1);
                TelemetryOutcome::Dropped
            }
        }
    }

    /// Sentinel rows enqueued.
    #[inline]
    pub fn sentinels(&self) -> u32 {
        self.sentinels
    }

    /// Samples dropped on a full queue.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}
