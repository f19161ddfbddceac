//! Tachometer: PCNT unit latched by a periodic esp_timer callback.

use core::ptr;
use core::time::Duration;

use esp_idf_svc::sys::{self, esp, EspError};
use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};

use super::EspClock;
use crate::capture::PulseLatcher;
use crate::log_globals::CONTROL_LOG;
use crate::schedule::Clock;

/// Pulses shorter than this are ignored [ns].
pub const GLITCH_FILTER_NS: u32 = 10_000;

/// PCNT unit handle moved into the timer callback.
struct UnitHandle(sys::pcnt_unit_handle_t);

// SAFETY: after setup the handle is used only from the timer callback
unsafe impl Send for UnitHandle {}

impl UnitHandle {
    /// Read and clear the counter.
    fn take_count(&self) -> Result<i32, EspError> {
        let mut count = 0;
        // SAFETY: the unit is live for the program lifetime
        unsafe {
            esp!(sys::pcnt_unit_get_count(self.0, &mut count))?;
            esp!(sys::pcnt_unit_clear_count(self.0))?;
        }
        Ok(count)
    }
}

/// Running tachometer. Drop stops the latch timer.
pub struct Tachometer {
    _timer: EspTimer<'static>,
}

impl Tachometer {
    /// Count both edges on `gpio` (up to `limit` per interval) and latch
    /// every `interval`.
    pub fn start(
        gpio: i32,
        limit: i32,
        interval: Duration,
        timers: &EspTaskTimerService,
        mut latcher: PulseLatcher<'static>,
    ) -> Result<Self, EspError> {
        let unit = new_unit(gpio, limit)?;

        // A failed read keeps the previous latch value
        let timer = timers.timer(move || match unit.take_count() {
            Ok(count) => latcher.on_interval(count),
            Err(e) => {
                crate::rt_error!(CONTROL_LOG, "tacho", EspClock.now_us(), "pulse count: {}", e);
            }
        })?;
        timer.every(interval)?;

        Ok(Self { _timer: timer })
    }
}

fn new_unit(gpio: i32, limit: i32) -> Result<UnitHandle, EspError> {
    let unit_config = sys::pcnt_unit_config_t {
        low_limit: -limit,
        high_limit: limit,
        ..Default::default()
    };
    let channel_config = sys::pcnt_chan_config_t {
        edge_gpio_num: gpio,
        level_gpio_num: -1,
        ..Default::default()
    };

    let filter_config = sys::pcnt_glitch_filter_config_t {
        max_glitch_ns: GLITCH_FILTER_NS,
    };

    let mut unit: sys::pcnt_unit_handle_t = ptr::null_mut();
    let mut channel: sys::pcnt_channel_handle_t = ptr::null_mut();
    // SAFETY: configs and out-pointers are valid for each call
    unsafe {
        esp!(sys::pcnt_new_unit(&unit_config, &mut unit))?;
        esp!(sys::pcnt_unit_set_glitch_filter(unit, &filter_config))?;
        esp!(sys::pcnt_new_channel(unit, &channel_config, &mut channel))?;
        esp!(sys::pcnt_channel_set_edge_action(
            channel,
            sys::pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_INCREASE,
            sys::pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_INCREASE,
        ))?;
        esp!(sys::pcnt_unit_enable(unit))?;
        esp!(sys::pcnt_unit_clear_count(unit))?;
        esp!(sys::pcnt_unit_start(unit))?;
    }
    Ok(UnitHandle(unit))
}
