//! Raw capture values to physical units.
//!
//! Runs in the producer task, never in interrupt context. Scale factors
//! are computed once at startup in `f64` and applied per sample as a
//! single `f32` multiply.
//!
//! - velocity [rev/s] = pulses / counts_per_rev / latch_interval_s
//! - duty [%]         = ticks * tick_period * 100 / pwm_period
//! - distance [m]     = ticks * tick_period * speed_of_sound / 2

use crate::capture::RawReadings;
use crate::config::{ConfigError, ControllerConfig};
use crate::sample::MeasurementSample;

/// Per-channel scale factors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    /// rev/s per latched pulse.
    velocity_per_pulse: f32,
    /// % duty per capture tick.
    duty_per_tick: f32,
    /// Metres per capture tick of echo time of flight.
    distance_per_tick: f32,
}

impl Calibration {
    /// Derive scale factors from the configuration and the capture timer clock.
    pub fn new(config: &ControllerConfig, capture_clock_hz: u32) -> Result<Self, ConfigError> {
        if capture_clock_hz == 0 {
            return Err(ConfigError::ZeroCaptureClock);
        }
        if config.tacho_counts_per_rev == 0 || config.tacho_latch_period_ms == 0 {
            return Err(ConfigError::InvalidTachometer);
        }
        if config.pwm_freq_hz == 0 {
            return Err(ConfigError::InvalidPwmFrequency);
        }

        let tick_period_s = 1.0 / capture_clock_hz as f64;
        let latch_interval_s = config.tacho_latch_period_ms as f64 / 1000.0;
        let pwm_period_s = 1.0 / config.pwm_freq_hz as f64;

        Ok(Self {
            velocity_per_pulse: (1.0 / (config.tacho_counts_per_rev as f64 * latch_interval_s))
                as f32,
            duty_per_tick: (tick_period_s * 100.0 / pwm_period_s) as f32,
            distance_per_tick: (tick_period_s * config.speed_of_sound as f64 / 2.0) as f32,
        })
    }

    /// Rotational velocity from pulses over one latch interval [rev/s].
    #[inline]
    pub fn velocity(&self, pulse_count: u32) -> f32 {
        pulse_count as f32 * self.velocity_per_pulse
    }

    /// Duty cycle from a high-time tick delta [%], at most 100.
    ///
    /// A high time longer than one PWM period (line stuck high, a lost
    /// falling edge) saturates at full duty.
    #[inline]
    pub fn duty(&self, ticks: u32) -> f32 {
        (ticks as f32 * self.duty_per_tick).min(100.0)
    }

    /// Obstacle distance from an echo time-of-flight tick delta [m].
    #[inline]
    pub fn distance(&self, ticks: u32) -> f32 {
        ticks as f32 * self.distance_per_tick
    }

    /// Duty resolution: one capture tick [%].
    #[inline]
    pub fn duty_per_tick(&self) -> f32 {
        self.duty_per_tick
    }

    /// Convert a full set of raw readings. `throttle_out_duty` is left at 0.
    #[inline]
    pub fn convert(&self, timestamp_us: u64, raw: RawReadings) -> MeasurementSample {
        MeasurementSample {
            timestamp_us,
            rot_velocity: self.velocity(raw.pulse_count),
            throttle_in_duty: self.duty(raw.throttle_in_ticks),
            throttle_out_duty: 0.0,
            distance: self.distance(raw.echo_ticks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> Calibration {
        Calibration::new(&ControllerConfig::DEFAULT, 80_000_000).unwrap()
    }

    #[test]
    fn test_velocity() {
        // 8 counts per rev over 200ms: 16 counts = 2 rev in 0.2s = 10 rev/s
        let cal = calibration();
        assert!((cal.velocity(16) - 10.0).abs() < 1e-4);
        assert_eq!(cal.velocity(0), 0.0);
    }

    #[test]
    fn test_duty_full_period() {
        // One PWM period at 74Hz is 80e6 / 74 ticks
        let cal = calibration();
        let period_ticks = 80_000_000 / 74;
        assert!((cal.duty(period_ticks) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_duty_saturates_past_one_period() {
        // 30ms high at 80MHz is more than two 74Hz periods
        let cal = calibration();
        assert_eq!(cal.duty(2_400_000), 100.0);
        assert_eq!(cal.duty(u32::MAX), 100.0);
        assert_eq!(cal.duty(0), 0.0);
    }

    #[test]
    fn test_distance() {
        // 1ms time of flight: 0.001 * 343 / 2 = 0.1715 m
        let cal = calibration();
        assert!((cal.distance(80_000) - 0.1715).abs() < 1e-4);
    }

    #[test]
    fn test_zero_clock_rejected() {
        assert_eq!(
            Calibration::new(&ControllerConfig::DEFAULT, 0),
            Err(ConfigError::ZeroCaptureClock)
        );
    }

    #[test]
    fn test_convert_leaves_output_duty() {
        let cal = calibration();
        let raw = RawReadings {
            pulse_count: 8,
            throttle_in_ticks: 0,
            echo_ticks: 0,
            throttle_in_updates: 1,
        };
        let sample = cal.convert(123, raw);
        assert_eq!(sample.timestamp_us, 123);
        assert_eq!(sample.throttle_out_duty, 0.0);
        assert!((sample.rot_velocity - 5.0).abs() < 1e-4);
    }
}
