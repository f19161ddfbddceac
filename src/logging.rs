//! RT-safe logging for the control pipeline.
//!
//! # Architecture
//!
//! ```text
//! Periodic tasks          LogRing               Log drain task
//! ──────────────          ───────               ──────────────
//!
//! rt_error!() ─────────▶ [L0][L1][L2] ───────▶ console (UART0)
//! stack-formatted         fixed ring            blocking ok
//! never blocks            own section           low priority
//! ```
//!
//! # Rules
//!
//! - Control tasks never write to the console directly; they use the `rt_*!` macros.
//! - Messages are dropped (and counted) when the ring is full.
//! - Messages longer than [`MAX_MSG_LEN`] are truncated.

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::{Deque, String};

use crate::config::LOG_RING_LEN;
use crate::latch::Guarded;

/// Maximum message length.
pub const MAX_MSG_LEN: usize = 96;

/// Bounded message text.
pub type Message = String<MAX_MSG_LEN>;

/// Log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    /// Convert to string for output.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Single-letter prefix in ESP-IDF console style.
    pub fn letter(self) -> char {
        match self {
            LogLevel::Error => 'E',
            LogLevel::Warn => 'W',
            LogLevel::Info => 'I',
            LogLevel::Debug => 'D',
        }
    }
}

/// A single log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Timestamp in microseconds since boot.
    pub timestamp_us: u64,
    /// Log level.
    pub level: LogLevel,
    /// Component tag (`"producer"`, `"actuation"`, ...).
    pub tag: &'static str,
    /// Message text.
    pub msg: Message,
}

/// Fixed-size log ring.
///
/// Any task may push; one drain task pops. Push takes the ring's own
/// section for a single move of the entry and never waits for the drain.
pub struct LogRing<const N: usize = LOG_RING_LEN> {
    entries: Guarded<Deque<LogEntry, N>>,
    dropped: AtomicU32,
}

impl<const N: usize> LogRing<N> {
    /// Create a new empty ring.
    pub const fn new() -> Self {
        Self {
            entries: Guarded::new(Deque::new()),
            dropped: AtomicU32::new(0),
        }
    }

    /// Push a log entry (never blocks).
    ///
    /// Returns `true` if queued, `false` if dropped (ring full).
    #[inline]
    pub fn push(
        &self,
        timestamp_us: u64,
        level: LogLevel,
        tag: &'static str,
        msg: Message,
    ) -> bool {
        let entry = LogEntry {
            timestamp_us,
            level,
            tag,
            msg,
        };
        let queued = self.entries.with(|q| q.push_back(entry).is_ok());
        if !queued {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queued
    }

    /// Pop the oldest entry (for the drain task).
    #[inline]
    pub fn drain(&self) -> Option<LogEntry> {
        self.entries.with(|q| q.pop_front())
    }

    /// Entries waiting to be drained.
    #[inline]
    pub fn pending(&self) -> usize {
        self.entries.with(|q| q.len())
    }

    /// Messages dropped since the last reset.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Read and clear the dropped counter.
    #[inline]
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl<const N: usize> Default for LogRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Format `args` into a bounded message, truncating at [`MAX_MSG_LEN`].
pub fn format_message(args: core::fmt::Arguments<'_>) -> Message {
    use core::fmt::Write;

    struct Truncating<'a>(&'a mut Message);

    impl Write for Truncating<'_> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            for c in s.chars() {
                if self.0.push(c).is_err() {
                    break;
                }
            }
            Ok(())
        }
    }

    let mut msg = Message::new();
    let _ = Truncating(&mut msg).write_fmt(args);
    msg
}

/// RT-safe log macro.
///
/// # Example
///
/// ```ignore
/// rt_log!(LogLevel::Info, CONTROL_LOG, "producer", now_us, "period {} us", period);
/// ```
#[macro_export]
macro_rules! rt_log {
    ($level:expr, $ring:expr, $tag:expr, $timestamp:expr, $($arg:tt)*) => {{
        let msg = $crate::logging::format_message(format_args!($($arg)*));
        $ring.push($timestamp, $level, $tag, msg);
    }};
}

/// RT-safe error log.
#[macro_export]
macro_rules! rt_error {
    ($ring:expr, $tag:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Error, $ring, $tag, $timestamp, $($arg)*)
    };
}

/// RT-safe warning log.
#[macro_export]
macro_rules! rt_warn {
    ($ring:expr, $tag:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Warn, $ring, $tag, $timestamp, $($arg)*)
    };
}

/// RT-safe info log.
#[macro_export]
macro_rules! rt_info {
    ($ring:expr, $tag:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Info, $ring, $tag, $timestamp, $($arg)*)
    };
}

/// RT-safe debug log.
#[macro_export]
macro_rules! rt_debug {
    ($ring:expr, $tag:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Debug, $ring, $tag, $timestamp, $($arg)*)
    };
}
