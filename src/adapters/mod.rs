//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements   | Connects to                    |
//! |-----------------|--------------|--------------------------------|
//! | `http_server`   | ControlPort  | TCP listener (lwIP / host)     |
//! | `log_presenter` | Presenter    | Serial log as a text display   |
//! | `log_sink`      | EventSink    | Serial log output              |
//! | `time`          | ClockPort    | ESP32 system timer + watchdog  |
//!
//! The sensor and estimator ports are implemented by
//! [`drivers::max30102`](crate::drivers::max30102),
//! [`sensors::simulated`](crate::sensors::simulated) and
//! [`sensors::estimator`](crate::sensors::estimator).

pub mod http_server;
pub mod log_presenter;
pub mod log_sink;
pub mod time;
