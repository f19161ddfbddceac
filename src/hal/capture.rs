//! MCPWM capture channels feeding `EdgePairCapture`.
//!
//! One capture timer (group 0) timestamps both edges of the throttle input
//! and of the ultrasonic echo. Each channel has its own ISR callback whose
//! user context is the channel's `EdgePairCapture`.

use core::ffi::c_void;
use core::ptr;

use esp_idf_svc::sys::{self, esp, EspError};

use crate::capture::{Edge, EdgePairCapture};

/// Capture timer shared by the edge channels.
pub struct EdgeCaptureUnit {
    timer: sys::mcpwm_cap_timer_handle_t,
}

/// Handle of one running capture channel. Never torn down.
pub struct CaptureChannel {
    _handle: sys::mcpwm_cap_channel_handle_t,
}

impl EdgeCaptureUnit {
    /// Create and start the capture timer of MCPWM group 0.
    pub fn new() -> Result<Self, EspError> {
        let config = sys::mcpwm_capture_timer_config_t {
            group_id: 0,
            clk_src: sys::soc_periph_mcpwm_capture_clk_src_t_MCPWM_CAPTURE_CLK_SRC_DEFAULT,
            ..Default::default()
        };
        let mut timer: sys::mcpwm_cap_timer_handle_t = ptr::null_mut();
        // SAFETY: config and out-pointer are valid for the call
        unsafe {
            esp!(sys::mcpwm_new_capture_timer(&config, &mut timer))?;
            esp!(sys::mcpwm_capture_timer_enable(timer))?;
            esp!(sys::mcpwm_capture_timer_start(timer))?;
        }
        Ok(Self { timer })
    }

    /// Capture timer resolution [Hz].
    pub fn resolution_hz(&self) -> Result<u32, EspError> {
        let mut hz = 0u32;
        // SAFETY: timer handle is live for the program lifetime
        unsafe { esp!(sys::mcpwm_capture_timer_get_resolution(self.timer, &mut hz))? };
        Ok(hz)
    }

    /// Capture both edges of `gpio` into `capture`.
    pub fn attach(
        &mut self,
        gpio: i32,
        capture: &'static mut EdgePairCapture<'static>,
    ) -> Result<CaptureChannel, EspError> {
        let mut config = sys::mcpwm_capture_channel_config_t {
            gpio_num: gpio,
            prescale: 1,
            ..Default::default()
        };
        config.flags.set_pos_edge(1);
        config.flags.set_neg_edge(1);

        let callbacks = sys::mcpwm_capture_event_callbacks_t {
            on_cap: Some(on_capture),
        };

        let mut handle: sys::mcpwm_cap_channel_handle_t = ptr::null_mut();
        let user_ctx = capture as *mut EdgePairCapture<'static> as *mut c_void;
        // SAFETY: `capture` is 'static and only touched by this channel's ISR from here on
        unsafe {
            esp!(sys::mcpwm_new_capture_channel(self.timer, &config, &mut handle))?;
            esp!(sys::mcpwm_capture_channel_register_event_callbacks(
                handle, &callbacks, user_ctx
            ))?;
            esp!(sys::mcpwm_capture_channel_enable(handle))?;
        }

        Ok(CaptureChannel { _handle: handle })
    }
}

/// ISR: hand one edge to the channel's state machine.
unsafe extern "C" fn on_capture(
    _channel: sys::mcpwm_cap_channel_handle_t,
    edata: *const sys::mcpwm_capture_event_data_t,
    user_ctx: *mut c_void,
) -> bool {
    // SAFETY: user_ctx was registered in `attach` from a &'static mut
    let capture = unsafe { &mut *(user_ctx as *mut EdgePairCapture<'static>) };
    let data = unsafe { &*edata };

    let edge = if data.cap_edge == sys::mcpwm_capture_edge_t_MCPWM_CAP_EDGE_POS {
        Edge::Rising
    } else {
        Edge::Falling
    };
    capture.on_edge(edge, data.cap_value);

    // No task woken
    false
}
