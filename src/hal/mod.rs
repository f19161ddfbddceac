//! Hardware Abstraction Layer for the RC car controller.
//!
//! Thin wrappers around ESP-IDF peripherals.
//! Control logic stays in core modules, HAL is just I/O and callbacks.

pub mod capture;
pub mod echo_trigger;
pub mod tacho;
pub mod throttle;

use core::fmt;

use esp_idf_svc::hal::delay::{Ets, FreeRtos};
use esp_idf_svc::sys::{self, EspError};

use crate::config::ConfigError;
use crate::schedule::Clock;

pub use capture::EdgeCaptureUnit;
pub use echo_trigger::EchoTrigger;
pub use tacho::Tachometer;
pub use throttle::ThrottleOutput;

/// Startup failure. Always fatal.
#[derive(Debug)]
pub enum SetupError {
    /// Configuration rejected by `validate()`.
    Config(ConfigError),
    /// Peripheral or service bring-up failed.
    Esp(EspError),
    /// Task could not be spawned.
    Spawn,
}

impl From<ConfigError> for SetupError {
    fn from(e: ConfigError) -> Self {
        SetupError::Config(e)
    }
}

impl From<EspError> for SetupError {
    fn from(e: EspError) -> Self {
        SetupError::Esp(e)
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Config(e) => write!(f, "config: {}", e),
            SetupError::Esp(e) => write!(f, "esp-idf: {}", e),
            SetupError::Spawn => write!(f, "task spawn failed"),
        }
    }
}

/// `esp_timer` time base with FreeRTOS delays.
///
/// Needs `CONFIG_FREERTOS_HZ=1000` so `relax` yields for 1 ms.
#[derive(Clone, Copy, Debug, Default)]
pub struct EspClock;

impl Clock for EspClock {
    #[inline]
    fn now_us(&self) -> u64 {
        // SAFETY: esp_timer is started by the IDF before main
        unsafe { sys::esp_timer_get_time() as u64 }
    }

    fn sleep_until(&self, deadline_us: u64) {
        let now = self.now_us();
        if deadline_us <= now {
            return;
        }
        let remaining = deadline_us - now;
        let whole_ms = (remaining / 1000) as u32;
        if whole_ms > 0 {
            FreeRtos::delay_ms(whole_ms);
        }
        let now = self.now_us();
        if deadline_us > now {
            Ets::delay_us((deadline_us - now) as u32);
        }
    }

    #[inline]
    fn relax(&self) {
        FreeRtos::delay_ms(1);
    }
}
