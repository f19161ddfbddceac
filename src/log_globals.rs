//! Global log ring instances.
//!
//! One ring per side of the pipeline: the periodic control tasks never
//! compete with the network side for ring slots.

use crate::logging::LogRing;

/// Control log ring (producer, actuation consumer, capture callbacks).
pub static CONTROL_LOG: LogRing = LogRing::new();

/// Network log ring (telemetry transmitter, session handling).
pub static NET_LOG: LogRing = LogRing::new();
