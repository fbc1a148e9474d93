//! HTTP binding of the control/status surface.
//!
//! [`codec`] turns bytes into a [`codec::Request`] and a
//! [`codec::Response`] back into bytes; [`routes`] maps requests onto
//! [`ControlCommand`](crate::app::commands::ControlCommand)s.  Neither
//! touches a socket; the transport lives in
//! [`adapters::http_server`](crate::adapters::http_server).

pub mod codec;
pub mod routes;

pub use codec::{MAX_REQUEST_SIZE, Parse, Request, Response, parse_request, write_response};
pub use routes::dispatch;
