//! # RC car controller
//!
//! Driver-assist controller between an RC receiver and a motor speed
//! controller: samples wheel speed, throttle input and obstacle distance,
//! drives the throttle output and streams telemetry to one TCP client.
//!
//! ## Architecture
//!
//! ```text
//! ISR / timer callbacks     producer task (P)          consumer task (P)
//! ─────────────────────     ─────────────────          ─────────────────
//! EdgePairCapture ─┐
//! PulseLatcher ────┴──▶ Latch ──▶ MeasurementProducer ──▶ ActuationQueue ──▶ ActuationConsumer ──▶ PWM
//!                                        │
//!                                        └──▶ TelemetryQueue ──▶ TelemetryTransmitter ──▶ TCP
//! ```
//!
//! - Interrupt context only writes latches; tasks only read them.
//! - Tasks talk exclusively through bounded queues.
//! - A missing sample degrades the output to the stationary duty.
//!
//! Hardware bindings live in `hal` and exist only on ESP-IDF targets; the
//! rest of the crate runs unchanged on the host.

#![cfg_attr(not(test), no_std)]

pub mod capture;
pub mod config;
pub mod consumer;
pub mod convert;
pub mod fault;
pub mod latch;
pub mod log_drain;
pub mod log_globals;
pub mod logging;
pub mod producer;
pub mod queue;
pub mod sample;
pub mod schedule;
pub mod tasks;
pub mod telemetry;
pub mod transmitter;

#[cfg(target_os = "espidf")]
pub mod hal;

pub use capture::{CaptureChannels, Edge, EdgePairCapture, PulseLatcher};
pub use config::{ConfigError, ControllerConfig};
pub use consumer::{ActuationConsumer, Actuator, ActuatorError, ControllerState};
pub use convert::Calibration;
pub use fault::{FaultCode, FaultState};
pub use latch::Latch;
pub use log_globals::{CONTROL_LOG, NET_LOG};
pub use producer::{ActuationQueue, MeasurementProducer};
pub use queue::BoundedQueue;
pub use sample::{ActuationCommand, MeasurementSample};
pub use schedule::{Clock, PeriodicSchedule};
pub use telemetry::{LinkState, TelemetryFanout, TelemetryQueue, TelemetryRecord};
pub use transmitter::{ClientLink, LinkError, TelemetryTransmitter};
