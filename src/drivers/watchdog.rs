//! Task Watchdog Timer (TWDT) driver.
//!
//! Subscribes the control-loop task to the ESP-IDF TWDT.  Every
//! cooperative yield feeds it, so the only way to trip it is a handler
//! that stops passing through the scheduler.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

/// Default reset timeout.  Generous compared to the 50 ms tick ceiling.
pub const DEFAULT_TIMEOUT_MS: u32 = 5_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    feeds: u64,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl Watchdog {
    /// Configure the TWDT and subscribe the current task.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            // SAFETY: plain FFI calls with a valid config; a null handle
            // means "the calling task".
            let subscribed = unsafe {
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!("TWDT reconfigure returned {ret} (may already be configured)");
                }
                esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK
            };
            if subscribed {
                info!("Watchdog: subscribed ({timeout_ms} ms, panic on trigger)");
            } else {
                log::warn!("Watchdog: failed to subscribe");
            }
            Self {
                subscribed,
                feeds: 0,
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): no-op, timeout {timeout_ms} ms");
            Self { feeds: 0 }
        }
    }

    /// Feed the watchdog.
    pub fn feed(&mut self) {
        self.feeds += 1;
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: the task subscribed itself in `new`.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    /// Number of feeds so far.
    pub fn feeds(&self) -> u64 {
        self.feeds
    }
}
