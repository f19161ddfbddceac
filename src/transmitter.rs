//! Telemetry transmitter: one client session at a time.
//!
//! # Session
//!
//! ```text
//! accept ──▶ reset queue ──▶ connect ──▶ HEADER ──▶ loop { recv_timeout ──▶ send }
//!                                                              │
//!                                    send error ◀──────────────┘
//!                                        │
//!                                        └──▶ disconnect ──▶ reset queue
//! ```
//!
//! Link errors end the session and nothing else; the control tasks only
//! see the link flag go down and stop enqueuing.

use core::convert::Infallible;
use core::fmt;

use crate::fault::{FaultCode, FaultState};
use crate::logging::LogRing;
use crate::queue::BoundedQueue;
use crate::schedule::Clock;
use crate::telemetry::{LinkState, TelemetryRecord, HEADER};

const TAG: &str = "telemetry";

/// Receive timeout between records while the queue is idle [µs].
pub const IDLE_POLL_US: u64 = 100_000;

/// Client link failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkError {
    /// Peer closed the connection.
    Closed,
    /// Transport error while sending.
    Io,
}

impl LinkError {
    /// Short error code.
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::Closed => "L01",
            LinkError::Io => "L02",
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &'static str {
        match self {
            LinkError::Closed => "client closed the connection",
            LinkError::Io => "send failed",
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// Byte sink of one client session.
pub trait ClientLink {
    /// Send every byte of `bytes` or fail.
    fn send_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
}

impl<L: ClientLink + ?Sized> ClientLink for &mut L {
    #[inline]
    fn send_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).send_all(bytes)
    }
}

/// Drains the telemetry queue into the connected client.
pub struct TelemetryTransmitter<'a, const N: usize> {
    queue: &'a BoundedQueue<TelemetryRecord, N>,
    link: &'a LinkState,
    faults: &'a FaultState,
    log: &'a LogRing,
    poll_timeout_us: u64,
}

impl<'a, const N: usize> TelemetryTransmitter<'a, N> {
    pub const fn new(
        queue: &'a BoundedQueue<TelemetryRecord, N>,
        link: &'a LinkState,
        faults: &'a FaultState,
        log: &'a LogRing,
    ) -> Self {
        Self {
            queue,
            link,
            faults,
            log,
            poll_timeout_us: IDLE_POLL_US,
        }
    }

    /// Serve one client until its link fails. Returns the error that ended it.
    pub fn serve<L: ClientLink, C: Clock>(&self, client: &mut L, clock: &C) -> LinkError {
        let stale = self.queue.reset();
        self.link.connect();
        crate::rt_info!(
            self.log,
            TAG,
            clock.now_us(),
            "session {} started ({} stale records discarded)",
            self.link.sessions(),
            stale
        );

        let error = match self.stream(client, clock) {
            Ok(never) => match never {},
            Err(error) => error,
        };

        self.link.disconnect();
        let pending = self.queue.reset();
        self.faults.record(FaultCode::LinkError, pending as u32);
        crate::rt_warn!(
            self.log,
            TAG,
            clock.now_us(),
            "session {} ended: {} ({} records discarded)",
            self.link.sessions(),
            error,
            pending
        );

        error
    }

    fn stream<L: ClientLink, C: Clock>(
        &self,
        client: &mut L,
        clock: &C,
    ) -> Result<Infallible, LinkError> {
        client.send_all(HEADER.as_bytes())?;
        loop {
            if let Some(record) = self.queue.recv_timeout(self.poll_timeout_us, clock) {
                client.send_all(record.as_bytes())?;
            }
        }
    }
}
