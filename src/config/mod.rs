//! Module: config
//!
//! Purpose: Controller configuration consumed as constants by the control core.
//!
//! Architecture:
//! - `ControllerConfig::DEFAULT`: values of the reference vehicle
//! - Queue capacities are compile-time constants (static storage, no heap)
//! - `validate()` runs once at startup; any error is fatal
//!
//! Safety: Safe. Plain data, no interior mutability.

mod error;

pub use error::ConfigError;

use crate::sample::ActuationCommand;

/// Telemetry queue capacity (records).
pub const TELEMETRY_QUEUE_LEN: usize = 5;

/// Log ring capacity (entries per ring).
pub const LOG_RING_LEN: usize = 32;

/// Speed controller duty cycle with the motor stopped [%].
pub const THROTTLE_STATIONARY_DUTY: f32 = 11.258452;

/// GPIO assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pins {
    /// PWM throttle command output (to speed controller).
    pub throttle_out: i32,
    /// PWM throttle command input (from RC receiver).
    pub throttle_in: i32,
    /// Tachometer pulse input.
    pub tachometer: i32,
    /// Ultrasonic sensor trigger output.
    pub echo_trigger: i32,
    /// Ultrasonic sensor echo input.
    pub echo: i32,
}

/// Runtime configuration of the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Producer and consumer period P [ms].
    pub sample_period_ms: u32,
    /// Producer conversion budget inside one period [ms].
    pub producer_budget_ms: u32,
    /// Neutral duty applied in fail-safe [%].
    pub stationary_duty: f32,
    /// Tachometer counts per wheel revolution (both edges counted).
    pub tacho_counts_per_rev: u32,
    /// Interval of the pulse counter latch-and-clear callback [ms].
    pub tacho_latch_period_ms: u32,
    /// Rotational velocity limit used to size the pulse counter [rev/s].
    pub max_rot_velocity: f32,
    /// PWM frequency of the speed controller [Hz].
    pub pwm_freq_hz: u32,
    /// Speed of sound [m/s].
    pub speed_of_sound: f32,
    /// Period of the ultrasonic trigger pulse [ms].
    pub echo_trigger_period_ms: u32,
    /// Capture timer clock used when the driver cannot report it [Hz].
    pub capture_clock_hz: u32,
    /// TCP port of the telemetry server.
    pub telemetry_port: u16,
    /// Pin assignment.
    pub pins: Pins,
}

impl ControllerConfig {
    /// Reference vehicle configuration.
    pub const DEFAULT: Self = Self {
        sample_period_ms: 50,
        producer_budget_ms: 10,
        stationary_duty: THROTTLE_STATIONARY_DUTY,
        tacho_counts_per_rev: 8,
        tacho_latch_period_ms: 200,
        max_rot_velocity: 100.0,
        pwm_freq_hz: 74,
        speed_of_sound: 343.0,
        echo_trigger_period_ms: 100,
        capture_clock_hz: 80_000_000,
        telemetry_port: 3333,
        pins: Pins {
            throttle_out: 33,
            throttle_in: 34,
            tachometer: 35,
            echo_trigger: 16,
            echo: 17,
        },
    };

    /// Check the configuration for values no runtime policy can recover from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.producer_budget_ms >= self.sample_period_ms {
            return Err(ConfigError::BudgetExceedsPeriod);
        }
        if !(0.0..=100.0).contains(&self.stationary_duty) {
            return Err(ConfigError::StationaryOutOfRange);
        }
        if self.tacho_counts_per_rev == 0 || self.tacho_latch_period_ms == 0 {
            return Err(ConfigError::InvalidTachometer);
        }
        if !(self.max_rot_velocity > 0.0) {
            return Err(ConfigError::InvalidTachometer);
        }
        if self.pwm_freq_hz == 0 {
            return Err(ConfigError::InvalidPwmFrequency);
        }
        if !(self.speed_of_sound > 0.0) {
            return Err(ConfigError::InvalidSpeedOfSound);
        }
        if self.capture_clock_hz == 0 {
            return Err(ConfigError::ZeroCaptureClock);
        }
        if self.echo_trigger_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }

    /// Producer/consumer period [µs].
    #[inline]
    pub const fn sample_period_us(&self) -> u64 {
        self.sample_period_ms as u64 * 1000
    }

    /// Actuation receive timeout, half a period [µs].
    #[inline]
    pub const fn receive_timeout_us(&self) -> u64 {
        self.sample_period_us() / 2
    }

    /// Command applied in fail-safe.
    #[inline]
    pub fn stationary_command(&self) -> ActuationCommand {
        ActuationCommand::from_duty(self.stationary_duty).unwrap_or(ActuationCommand::STATIONARY)
    }

    /// Producer conversion budget [µs].
    #[inline]
    pub const fn producer_budget_us(&self) -> u64 {
        self.producer_budget_ms as u64 * 1000
    }

    /// Upper limit of the pulse counter for one latch interval.
    pub fn pulse_counter_limit(&self) -> i32 {
        let limit = self.max_rot_velocity
            * self.tacho_counts_per_rev as f32
            * self.tacho_latch_period_ms as f32
            / 1000.0;
        (limit as i32).clamp(1, i16::MAX as i32)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(ControllerConfig::DEFAULT.validate(), Ok(()));
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut config = ControllerConfig::DEFAULT;
        config.sample_period_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPeriod));
    }

    #[test]
    fn test_budget_must_fit_period() {
        let mut config = ControllerConfig::DEFAULT;
        config.producer_budget_ms = 50;
        assert_eq!(config.validate(), Err(ConfigError::BudgetExceedsPeriod));
    }

    #[test]
    fn test_stationary_duty_range() {
        let mut config = ControllerConfig::DEFAULT;
        config.stationary_duty = 101.0;
        assert_eq!(config.validate(), Err(ConfigError::StationaryOutOfRange));

        config.stationary_duty = f32::NAN;
        assert_eq!(config.validate(), Err(ConfigError::StationaryOutOfRange));
    }

    #[test]
    fn test_receive_timeout_is_half_period() {
        let config = ControllerConfig::DEFAULT;
        assert_eq!(config.sample_period_us(), 50_000);
        assert_eq!(config.receive_timeout_us(), 25_000);
    }

    #[test]
    fn test_pulse_counter_limit() {
        // 100 rev/s * 8 counts * 0.2 s
        assert_eq!(ControllerConfig::DEFAULT.pulse_counter_limit(), 160);
    }
}
