//! Minimal HTTP/1.1 request parser and response writer.
//!
//! Only what the control surface needs: one request per connection, no
//! chunked bodies, `Content-Length` only, no keep-alive.  The parser is
//! incremental in the simplest sense: call it again with more bytes
//! until it stops asking for them.
//!
//! ```text
//! ┌──────────────────────────┬────────────┬──────┬──────────────┐
//! │ METHOD SP PATH SP HTTP/x │ headers... │ CRLF │ body (CL B)  │
//! └──────────────────────────┴────────────┴──────┴──────────────┘
//! ```

use std::io::{self, Write};

use crate::error::HttpError;

/// Upper bound for a whole request (headers + body).
pub const MAX_REQUEST_SIZE: usize = 1024;

const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
    Other,
}

impl Method {
    fn parse(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "OPTIONS" => Self::Options,
            _ => Self::Other,
        }
    }
}

/// A fully received request borrowing from the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub method: Method,
    pub path: &'a str,
    pub body: &'a [u8],
}

#[derive(Debug, PartialEq, Eq)]
pub enum Parse<'a> {
    Complete(Request<'a>),
    NeedMore,
}

/// Parse the bytes received so far.
pub fn parse_request(buf: &[u8]) -> Result<Parse<'_>, HttpError> {
    let Some(head_len) = buf
        .windows(HEADER_END.len())
        .position(|w| w == HEADER_END)
        .map(|i| i + HEADER_END.len())
    else {
        return if buf.len() >= MAX_REQUEST_SIZE {
            Err(HttpError::TooLarge)
        } else {
            Ok(Parse::NeedMore)
        };
    };

    let head = core::str::from_utf8(&buf[..head_len]).map_err(|_| HttpError::Malformed)?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::Malformed);
    };
    if method.is_empty() || !target.starts_with('/') || !version.starts_with("HTTP/1.") {
        return Err(HttpError::Malformed);
    }
    // Query strings are accepted and ignored.
    let path = target.split('?').next().unwrap_or(target);

    let mut content_length = 0usize;
    for line in lines.filter(|l| !l.is_empty()) {
        let (name, value) = line.split_once(':').ok_or(HttpError::Malformed)?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value
                .trim()
                .parse()
                .map_err(|_| HttpError::Malformed)?;
        }
    }

    let total = head_len.saturating_add(content_length);
    if total > MAX_REQUEST_SIZE {
        return Err(HttpError::TooLarge);
    }
    if buf.len() < total {
        return Ok(Parse::NeedMore);
    }

    Ok(Parse::Complete(Request {
        method: Method::parse(method),
        path,
        body: &buf[head_len..total],
    }))
}

// ───────────────────────────────────────────────────────────────
// Responses
// ───────────────────────────────────────────────────────────────

/// Permissive CORS so browser dashboards on other origins can poll.
const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
     Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
     Access-Control-Allow-Headers: Content-Type\r\n\
     Access-Control-Allow-Private-Network: true\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status_line: &'static str,
    pub body: String,
}

impl Response {
    pub fn json(status_line: &'static str, body: String) -> Self {
        Self { status_line, body }
    }

    /// Pre-flight answer: CORS headers, no body.
    pub fn no_content() -> Self {
        Self {
            status_line: "204 No Content",
            body: String::new(),
        }
    }

    pub fn is_no_content(&self) -> bool {
        self.status_line.starts_with("204")
    }
}

/// Serialize `resp` onto the wire.  Always `Connection: close`.
pub fn write_response<W: Write + ?Sized>(w: &mut W, resp: &Response) -> io::Result<()> {
    write!(w, "HTTP/1.1 {}\r\n{}", resp.status_line, CORS_HEADERS)?;
    if resp.is_no_content() {
        w.write_all(b"Connection: close\r\n\r\n")?;
    } else {
        write!(
            w,
            "Content-Type: application/json\r\n\
             Connection: close\r\n\
             Content-Length: {}\r\n\
             \r\n",
            resp.body.len()
        )?;
        w.write_all(resp.body.as_bytes())?;
    }
    w.flush()
}
