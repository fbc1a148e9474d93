//! Route table for the control surface.
//!
//! | Method  | Path      | Command                 |
//! |---------|-----------|-------------------------|
//! | POST    | `/start`  | Begin (optional `name`) |
//! | POST    | `/stop`   | Cancel                  |
//! | GET     | `/status` | Status                  |
//! | OPTIONS | any above | pre-flight, 204         |

use serde::Deserialize;

use crate::app::commands::{ControlCommand, ControlReply};
use crate::error::HttpError;
use crate::session::make_label;

use super::codec::{Method, Request, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Start,
    Stop,
    Status,
}

impl Endpoint {
    fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/start" => Some(Self::Start),
            "/stop" => Some(Self::Stop),
            "/status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// What a request asks for once routed.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Command(ControlCommand),
    Preflight,
}

#[derive(Deserialize)]
struct BeginBody {
    #[serde(default)]
    name: Option<String>,
}

/// Subject label from a begin body.  Anything unparseable means "no label".
fn begin_label(body: &[u8]) -> ControlCommand {
    let label = serde_json::from_slice::<BeginBody>(body)
        .ok()
        .and_then(|b| b.name)
        .and_then(|n| make_label(&n));
    ControlCommand::Begin { label }
}

pub fn route(req: &Request<'_>) -> Result<Action, HttpError> {
    let endpoint = Endpoint::from_path(req.path).ok_or(HttpError::NotFound)?;
    match (req.method, endpoint) {
        (Method::Options, _) => Ok(Action::Preflight),
        (Method::Post, Endpoint::Start) => Ok(Action::Command(begin_label(req.body))),
        (Method::Post, Endpoint::Stop) => Ok(Action::Command(ControlCommand::Cancel)),
        (Method::Get, Endpoint::Status) => Ok(Action::Command(ControlCommand::Status)),
        _ => Err(HttpError::MethodNotAllowed),
    }
}

pub fn reply_response(reply: &ControlReply) -> Response {
    match reply {
        ControlReply::Ack => Response::json("200 OK", r#"{"ok":true}"#.into()),
        ControlReply::Status(snapshot) => match serde_json::to_string(snapshot) {
            Ok(body) => Response::json("200 OK", body),
            Err(_) => Response::json(
                "500 Internal Server Error",
                r#"{"ok":false,"error":"status encoding failed"}"#.into(),
            ),
        },
    }
}

pub fn error_response(err: HttpError) -> Response {
    let body = serde_json::json!({ "ok": false, "error": err.to_string() }).to_string();
    Response::json(err.status_line(), body)
}

/// Route a complete request and run it through `handler`.
pub fn dispatch(
    req: &Request<'_>,
    handler: &mut dyn FnMut(ControlCommand) -> ControlReply,
) -> Response {
    match route(req) {
        Ok(Action::Preflight) => Response::no_content(),
        Ok(Action::Command(cmd)) => reply_response(&handler(cmd)),
        Err(e) => error_response(e),
    }
}
