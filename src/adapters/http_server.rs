//! HTTP control-surface transport.
//!
//! Implements [`ControlPort`] over a non-blocking `std::net::TcpListener`
//! (lwIP sockets on ESP-IDF, the host stack in the simulator).  Nothing
//! here ever waits on a client: each [`serve_one`](ControlPort::serve_one)
//! call accepts or resumes one connection, takes whatever bytes are
//! already buffered, and answers once the request is complete.  A request
//! still arriving is parked until the next call, so the control loop can
//! call in on every cooperative tick.
//!
//! ```text
//!  accept (non-blocking) ──▶ read what is buffered ──▶ complete? ──▶ dispatch ──▶ write ──▶ close
//!        WouldBlock ──▶ return false          │ no
//!                                             ▼
//!                                    park until next call ──▶ deadline passed ──▶ 408
//! ```

use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::app::commands::{ControlCommand, ControlReply};
use crate::app::ports::ControlPort;
use crate::error::HttpError;
use crate::http::routes::error_response;
use crate::http::{MAX_REQUEST_SIZE, Parse, Response, dispatch, parse_request, write_response};

/// Wall time a client gets to deliver one whole request, counted from
/// accept.  Spent across many `serve_one` calls, never inside one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Upper bound on the one blocking step: flushing the response.
const WRITE_TIMEOUT: Duration = Duration::from_millis(50);

/// A connection whose request has not fully arrived yet.
struct Pending {
    stream: TcpStream,
    buf: [u8; MAX_REQUEST_SIZE],
    len: usize,
    accepted: Instant,
}

enum Fill {
    /// The buffer holds a complete request (or a parse error).
    Ready,
    /// Need more bytes; try again next call.
    Waiting,
    /// Give up on the connection with this error.
    Failed(HttpError),
    /// Peer left before sending anything.
    Closed,
}

impl Pending {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buf: [0; MAX_REQUEST_SIZE],
            len: 0,
            accepted: Instant::now(),
        }
    }

    /// Pull in whatever the socket has buffered, without blocking.
    fn fill(&mut self, deadline: Duration) -> Fill {
        loop {
            if !matches!(parse_request(&self.buf[..self.len]), Ok(Parse::NeedMore)) {
                return Fill::Ready;
            }
            if self.len == self.buf.len() {
                return Fill::Failed(HttpError::TooLarge);
            }
            match self.stream.read(&mut self.buf[self.len..]) {
                Ok(0) if self.len == 0 => return Fill::Closed,
                Ok(0) => return Fill::Failed(HttpError::Incomplete),
                Ok(n) => self.len += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if self.accepted.elapsed() >= deadline {
                        return Fill::Failed(HttpError::Timeout);
                    }
                    return Fill::Waiting;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!("HTTP: read failed after {} bytes: {e}", self.len);
                    if self.len == 0 {
                        return Fill::Closed;
                    }
                    return Fill::Failed(HttpError::Incomplete);
                }
            }
        }
    }

    fn respond(
        &self,
        handler: &mut dyn FnMut(ControlCommand) -> ControlReply,
    ) -> Response {
        match parse_request(&self.buf[..self.len]) {
            Ok(Parse::Complete(req)) => {
                debug!("HTTP: {:?} {}", req.method, req.path);
                dispatch(&req, handler)
            }
            Ok(Parse::NeedMore) => error_response(HttpError::Incomplete),
            Err(e) => error_response(e),
        }
    }
}

pub struct HttpServer {
    listener: TcpListener,
    request_timeout: Duration,
    pending: Option<Box<Pending>>,
    served: u64,
}

impl HttpServer {
    /// Bind `0.0.0.0:<port>`.  Port `0` lets the OS pick one; see
    /// [`local_addr`](Self::local_addr).
    pub fn bind(port: u16) -> io::Result<Self> {
        Self::bind_addr(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    pub fn bind_addr(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!("HTTP: listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pending: None,
            served: 0,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Requests answered so far, error replies included.
    pub fn served(&self) -> u64 {
        self.served
    }

    fn accept(&mut self) -> Option<Box<Pending>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                debug!("HTTP: connection from {peer}");
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!("HTTP: cannot make connection non-blocking: {e}");
                    return None;
                }
                Some(Box::new(Pending::new(stream)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("HTTP: accept error: {e}");
                None
            }
        }
    }

    fn finish(&mut self, conn: &mut Pending, resp: &Response) -> io::Result<()> {
        debug!("HTTP: -> {}", resp.status_line);
        conn.stream.set_nonblocking(false)?;
        conn.stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        self.served += 1;
        write_response(&mut conn.stream, resp)
    }
}

impl ControlPort for HttpServer {
    fn serve_one(&mut self, handler: &mut dyn FnMut(ControlCommand) -> ControlReply) -> bool {
        let Some(mut conn) = self.pending.take().or_else(|| self.accept()) else {
            return false;
        };
        let resp = match conn.fill(self.request_timeout) {
            Fill::Ready => conn.respond(handler),
            Fill::Waiting => {
                self.pending = Some(conn);
                return false;
            }
            Fill::Failed(e) => {
                debug!("HTTP: giving up on connection: {e}");
                error_response(e)
            }
            Fill::Closed => return false,
        };
        if let Err(e) = self.finish(&mut conn, &resp) {
            warn!("HTTP: connection dropped: {e}");
        }
        true
    }
}
