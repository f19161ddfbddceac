//! Throttle output: LEDC PWM into the speed controller.

use esp_idf_svc::hal::gpio::AnyOutputPin;
use esp_idf_svc::hal::ledc::config::TimerConfig;
use esp_idf_svc::hal::ledc::{LedcChannel, LedcDriver, LedcTimer, LedcTimerDriver, Resolution};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::sys::EspError;

use crate::consumer::{Actuator, ActuatorError};
use crate::sample::ActuationCommand;

/// PWM output applying `ActuationCommand`s.
pub struct ThrottleOutput {
    driver: LedcDriver<'static>,
    max_duty: u32,
}

impl ThrottleOutput {
    /// Configure `timer` at `freq_hz` and drive `pin` from `channel`,
    /// starting at `initial`.
    pub fn new<T, C>(
        timer: impl Peripheral<P = T> + 'static,
        channel: impl Peripheral<P = C> + 'static,
        pin: AnyOutputPin,
        freq_hz: u32,
        initial: ActuationCommand,
    ) -> Result<Self, EspError>
    where
        T: LedcTimer<SpeedMode = <C as LedcChannel>::SpeedMode> + 'static,
        C: LedcChannel + 'static,
    {
        let timer_config = TimerConfig::default()
            .frequency(Hertz(freq_hz))
            .resolution(Resolution::Bits14);
        let timer = LedcTimerDriver::new(timer, &timer_config)?;
        let mut driver = LedcDriver::new(channel, timer, pin)?;

        let max_duty = driver.get_max_duty();
        driver.set_duty(initial.to_ticks(max_duty))?;

        Ok(Self { driver, max_duty })
    }
}

impl Actuator for ThrottleOutput {
    fn apply(&mut self, command: ActuationCommand) -> Result<(), ActuatorError> {
        self.driver
            .set_duty(command.to_ticks(self.max_duty))
            .map_err(|e| ActuatorError::Rejected(e.code()))
    }
}
