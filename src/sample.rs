//! Module: sample
//!
//! Purpose: Value types flowing through the control pipeline: one
//! `MeasurementSample` per producer period and the `ActuationCommand`
//! derived from it.
//!
//! Architecture:
//! - `Copy` types, moved into queues, never shared mutably
//! - Physical units only (raw ticks stay in the capture engine)
//!
//! Safety: Safe. No unsafe blocks.

use crate::config::THROTTLE_STATIONARY_DUTY;

/// One period's worth of converted measurements.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeasurementSample {
    /// Time of the snapshot since boot [µs].
    pub timestamp_us: u64,
    /// Wheel rotational velocity [rev/s].
    pub rot_velocity: f32,
    /// Duty cycle read from the RC receiver [%].
    pub throttle_in_duty: f32,
    /// Duty cycle the actuation consumer derives from this sample [%].
    pub throttle_out_duty: f32,
    /// Distance to the nearest obstacle ahead [m].
    pub distance: f32,
}

impl MeasurementSample {
    /// All-zero sample.
    pub const EMPTY: Self = Self {
        timestamp_us: 0,
        rot_velocity: 0.0,
        throttle_in_duty: 0.0,
        throttle_out_duty: 0.0,
        distance: 0.0,
    };

    /// Output command for this sample: the receiver duty passed through,
    /// or `fallback` when the reading is not a number.
    #[inline]
    pub fn command(&self, fallback: ActuationCommand) -> ActuationCommand {
        ActuationCommand::from_duty(self.throttle_in_duty).unwrap_or(fallback)
    }
}

/// Duty cycle applied to the speed controller, always within [0, 100] %.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct ActuationCommand(f32);

impl ActuationCommand {
    /// Lowest duty [%].
    pub const MIN_DUTY: f32 = 0.0;

    /// Highest duty [%].
    pub const MAX_DUTY: f32 = 100.0;

    /// Speed controller neutral: motor stopped.
    pub const STATIONARY: Self = Self(THROTTLE_STATIONARY_DUTY);

    /// Build a command from a duty percentage, clamped to range.
    ///
    /// Returns `None` for NaN or infinite input; callers substitute the
    /// stationary command.
    #[inline]
    pub fn from_duty(duty: f32) -> Option<Self> {
        if duty.is_finite() {
            Some(Self(duty.clamp(Self::MIN_DUTY, Self::MAX_DUTY)))
        } else {
            None
        }
    }

    /// Duty cycle [%].
    #[inline]
    pub const fn duty(self) -> f32 {
        self.0
    }

    /// Scale to a PWM compare value with `max_duty` as 100 %.
    #[inline]
    pub fn to_ticks(self, max_duty: u32) -> u32 {
        let ticks = self.0 / Self::MAX_DUTY * max_duty as f32;
        (ticks as u32).min(max_duty)
    }
}
