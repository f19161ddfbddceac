//! Capture engine: interrupt-context event producers.
//!
//! # Architecture
//!
//! ```text
//! esp_timer (200ms) ──▶ PulseLatcher ──────┐
//!                                          ├──▶ Latch (one per channel)
//! MCPWM capture ISR ──▶ EdgePairCapture ───┘
//! ```
//!
//! Two kinds of hardware event source feed the same [`Latch`] type:
//! - a periodic latch-and-clear of a free-running pulse counter
//! - an edge-pair state machine measuring rising→falling tick deltas
//!
//! Both run in interrupt/callback context. They never block and touch
//! their latch for exactly one scalar write.

use crate::fault::{FaultCode, FaultState};
use crate::latch::Latch;

/// Edge reported by a capture channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// State of an edge-pair capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeState {
    /// Idle, next valid edge is rising.
    WaitingRising,
    /// Rising edge seen, timestamp pending.
    WaitingFalling,
}

/// Edge sequence counters of one channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeStats {
    /// Completed rising→falling pairs (published).
    pub pairs: u32,
    /// Rising edge arrived while a falling edge was expected.
    pub missed_falling: u32,
    /// Falling edge arrived with no pending rising edge.
    pub orphan_falling: u32,
}

/// Rising→falling tick delta measurement (PWM high time, echo time of flight).
///
/// Owned by the capture callback of its channel; the latch is the only
/// state visible to tasks.
pub struct EdgePairCapture<'a> {
    latch: &'a Latch,
    faults: Option<&'a FaultState>,
    state: EdgeState,
    rising_ticks: u32,
    stats: EdgeStats,
}

impl<'a> EdgePairCapture<'a> {
    /// Create a capture publishing into `latch`.
    pub const fn new(latch: &'a Latch) -> Self {
        Self {
            latch,
            faults: None,
            state: EdgeState::WaitingRising,
            rising_ticks: 0,
            stats: EdgeStats {
                pairs: 0,
                missed_falling: 0,
                orphan_falling: 0,
            },
        }
    }

    /// Also record sequence errors in `faults`.
    pub fn with_faults(mut self, faults: &'a FaultState) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Feed one captured edge with its capture timer value.
    ///
    /// Returns the published tick delta when the edge completes a pair.
    ///
    /// # Timing
    ///
    /// O(1), safe in ISR context. The capture timer is free running and
    /// wraps at 32 bits, so the delta uses wrapping subtraction.
    #[inline]
    pub fn on_edge(&mut self, edge: Edge, ticks: u32) -> Option<u32> {
        match (self.state, edge) {
            (state, Edge::Rising) => {
                if state == EdgeState::WaitingFalling {
                    // Falling edge lost: restart the pair on the newer edge
                    self.stats.missed_falling = self.stats.missed_falling.wrapping_add(1);
                    self.record_sequence_error();
                }
                self.rising_ticks = ticks;
                self.state = EdgeState::WaitingFalling;
                None
            }
            (EdgeState::WaitingFalling, Edge::Falling) => {
                let delta = ticks.wrapping_sub(self.rising_ticks);
                self.latch.update(delta);
                self.stats.pairs = self.stats.pairs.wrapping_add(1);
                self.state = EdgeState::WaitingRising;
                Some(delta)
            }
            (EdgeState::WaitingRising, Edge::Falling) => {
                self.stats.orphan_falling = self.stats.orphan_falling.wrapping_add(1);
                self.record_sequence_error();
                None
            }
        }
    }

    #[inline]
    fn record_sequence_error(&self) {
        if let Some(faults) = self.faults {
            faults.record(FaultCode::EdgeSequence, self.rising_ticks);
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> EdgeState {
        self.state
    }

    /// Sequence counters.
    #[inline]
    pub fn stats(&self) -> EdgeStats {
        self.stats
    }
}

/// Periodic latch of a hardware pulse counter.
///
/// The timer callback reads and clears the counter, then hands the count
/// here, so the latch always holds pulses over one interval.
pub struct PulseLatcher<'a> {
    latch: &'a Latch,
    intervals: u32,
}

impl<'a> PulseLatcher<'a> {
    pub const fn new(latch: &'a Latch) -> Self {
        Self { latch, intervals: 0 }
    }

    /// Publish the pulses accumulated over the last interval.
    ///
    /// Negative hardware counts (counter underflow) latch as zero.
    #[inline]
    pub fn on_interval(&mut self, count: i32) {
        self.latch.update(count.max(0) as u32);
        self.intervals = self.intervals.wrapping_add(1);
    }

    /// Intervals latched since boot.
    #[inline]
    pub fn intervals(&self) -> u32 {
        self.intervals
    }
}

/// Raw values of all capture channels at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawReadings {
    /// Tachometer pulses over one latch interval.
    pub pulse_count: u32,
    /// Throttle input high time [capture ticks].
    pub throttle_in_ticks: u32,
    /// Echo time of flight [capture ticks].
    pub echo_ticks: u32,
    /// Throttle input publications since boot (wraps).
    pub throttle_in_updates: u32,
}

/// The three capture channels as seen from task context.
#[derive(Clone, Copy)]
pub struct CaptureChannels<'a> {
    pub pulses: &'a Latch,
    pub throttle_in: &'a Latch,
    pub echo: &'a Latch,
}

impl<'a> CaptureChannels<'a> {
    /// Snapshot every channel, each through its own section.
    #[inline]
    pub fn snapshot(&self) -> RawReadings {
        let throttle_in = self.throttle_in.snapshot();
        RawReadings {
            pulse_count: self.pulses.snapshot().raw,
            throttle_in_ticks: throttle_in.raw,
            echo_ticks: self.echo.snapshot().raw,
            throttle_in_updates: throttle_in.updates,
        }
    }
}
