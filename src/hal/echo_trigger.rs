//! Ultrasonic trigger: 10 µs pulse from a periodic esp_timer callback.

use core::time::Duration;

use esp_idf_svc::hal::delay::Ets;
use esp_idf_svc::hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::sys::EspError;
use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};

/// Trigger pulse width [µs].
pub const TRIGGER_PULSE_US: u32 = 10;

/// Running trigger. Drop stops the pulses.
pub struct EchoTrigger {
    _timer: EspTimer<'static>,
}

impl EchoTrigger {
    pub fn start(
        pin: AnyOutputPin,
        period: Duration,
        timers: &EspTaskTimerService,
    ) -> Result<Self, EspError> {
        let mut trigger: PinDriver<'static, AnyOutputPin, Output> = PinDriver::output(pin)?;
        trigger.set_low()?;

        let timer = timers.timer(move || {
            let _ = trigger.set_high();
            Ets::delay_us(TRIGGER_PULSE_US);
            let _ = trigger.set_low();
        })?;
        timer.every(period)?;

        Ok(Self { _timer: timer })
    }
}
