//! Transport: sends one fully-formed request and returns its response.
//!
//! `CurlTransport` drives libcurl easy handles. Handles are kept in a small
//! pool and `reset` between requests, which keeps their connection caches alive
//! so consecutive chunk requests reuse TCP/TLS connections. The response body is
//! buffered in full before returning, so the caller owns its bytes independently
//! of the connection.

use std::cell::RefCell;
use std::io::SeekFrom;
use std::str;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use curl::easy::{Easy, List, ReadError, SeekResult};

use super::request::{redacted_url, Method, Request};
use super::response::Response;
use crate::context::Context;
use crate::error::{Error, Result, TransportError};

/// Terminal stage of the pipeline. Implementations must be safe for concurrent
/// `send` calls from many chunk workers and must observe cancellation promptly.
pub trait Transport: Send + Sync {
    fn send(&self, ctx: &Context, request: &mut Request<'_>) -> Result<Response>;
}

/// Connection-level knobs for `CurlTransport`.
#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below this many bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard cap per request; `None` means no wall-clock limit.
    pub timeout: Option<Duration>,
    /// Idle easy handles kept for reuse.
    pub max_idle_handles: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Some(Duration::from_secs(3600)),
            max_idle_handles: 64,
        }
    }
}

pub struct CurlTransport {
    options: TransportOptions,
    idle: Mutex<Vec<Easy>>,
}

impl CurlTransport {
    pub fn new(options: TransportOptions) -> Self {
        Self {
            options,
            idle: Mutex::new(Vec::new()),
        }
    }

    fn checkout(&self) -> Easy {
        let pooled = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
        match pooled {
            Some(mut easy) => {
                easy.reset();
                easy
            }
            None => Easy::new(),
        }
    }

    fn checkin(&self, easy: Easy) {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < self.options.max_idle_handles {
            idle.push(easy);
        }
    }

    fn configure(&self, easy: &mut Easy, request: &Request<'_>) -> std::result::Result<(), curl::Error> {
        easy.url(request.url().as_str())?;
        easy.connect_timeout(self.options.connect_timeout)?;
        easy.low_speed_limit(self.options.low_speed_limit)?;
        easy.low_speed_time(self.options.low_speed_time)?;
        if let Some(t) = self.options.timeout {
            easy.timeout(t)?;
        }
        easy.progress(true)?;

        let body_len = request.body_len();
        match request.method() {
            Method::Get => {
                easy.get(true)?;
                easy.follow_location(true)?;
            }
            Method::Head => {
                easy.nobody(true)?;
                easy.follow_location(true)?;
            }
            Method::Put => {
                easy.upload(true)?;
                easy.in_filesize(body_len)?;
            }
            Method::Post => {
                easy.post(true)?;
                easy.post_field_size(body_len)?;
            }
            Method::Delete | Method::Patch => {
                easy.custom_request(request.method().as_str())?;
                if body_len > 0 {
                    easy.upload(true)?;
                    easy.in_filesize(body_len)?;
                }
            }
        }

        let mut list = List::new();
        for (name, value) in request.headers().iter() {
            // curl computes the length from in_filesize/post_field_size.
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            list.append(&format!("{}: {}", name.trim(), value.trim()))?;
        }
        // Suppress `Expect: 100-continue` round trips on uploads.
        list.append("Expect:")?;
        easy.http_headers(list)?;
        Ok(())
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new(TransportOptions::default())
    }
}

impl Transport for CurlTransport {
    fn send(&self, ctx: &Context, request: &mut Request<'_>) -> Result<Response> {
        ctx.check()?;
        let started = Instant::now();
        let mut easy = self.checkout();
        self.configure(&mut easy, request)
            .map_err(|e| Error::Transport(TransportError::from(e)))?;

        let method = request.method();
        let url = redacted_url(request.url());
        let mut status_line = String::new();
        let mut header_lines: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();
        let read_error: RefCell<Option<std::io::Error>> = RefCell::new(None);
        let upload = RefCell::new(request.body_mut());

        let performed = 'transfer: {
            let mut transfer = easy.transfer();
            let header_set = transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    let line = s.trim_end();
                    if line.starts_with("HTTP/") {
                        // New status line (redirect or interim response): start over.
                        status_line = line.to_string();
                        header_lines.clear();
                    } else if !line.is_empty() {
                        header_lines.push(line.to_string());
                    }
                }
                true
            });
            if let Err(e) = header_set {
                break 'transfer Err(e);
            }
            let write_set = transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            });
            if let Err(e) = write_set {
                break 'transfer Err(e);
            }
            let read_set = transfer.read_function(|buf| match upload.borrow_mut().as_mut() {
                Some(b) => b.read(buf).map_err(|e| {
                    read_error.borrow_mut().replace(e);
                    ReadError::Abort
                }),
                None => Ok(0),
            });
            if let Err(e) = read_set {
                break 'transfer Err(e);
            }
            let seek_set = transfer.seek_function(|whence| match whence {
                SeekFrom::Start(0) => match upload.borrow_mut().as_mut() {
                    Some(b) => match b.rewind() {
                        Ok(()) => SeekResult::Ok,
                        Err(_) => SeekResult::Fail,
                    },
                    None => SeekResult::Ok,
                },
                _ => SeekResult::CantSeek,
            });
            if let Err(e) = seek_set {
                break 'transfer Err(e);
            }
            let progress_set = transfer.progress_function(|_, _, _, _| !ctx.is_cancelled());
            if let Err(e) = progress_set {
                break 'transfer Err(e);
            }
            transfer.perform()
        };

        if let Err(e) = performed {
            self.checkin(easy);
            if e.is_aborted_by_callback() {
                if let Some(io_err) = read_error.into_inner() {
                    return Err(Error::Io(io_err));
                }
                if ctx.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }
            tracing::debug!(%method, %url, error = %e, "transport failure");
            return Err(Error::Transport(TransportError::from(e)));
        }

        let code = easy
            .response_code()
            .map_err(|e| Error::Transport(TransportError::from(e)))?;
        self.checkin(easy);

        let mut response = Response::new(code as u16, parse_reason(&status_line)).with_body(body);
        for line in &header_lines {
            response.headers_mut().push_raw_line(line);
        }
        tracing::trace!(
            %method,
            %url,
            status = code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "transport response"
        );
        Ok(response)
    }
}

/// Reason phrase from a status line such as `HTTP/1.1 206 Partial Content`.
fn parse_reason(status_line: &str) -> String {
    let mut parts = status_line.splitn(3, ' ');
    let _version = parts.next();
    let _code = parts.next();
    parts.next().unwrap_or("").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_from_status_line() {
        assert_eq!(parse_reason("HTTP/1.1 206 Partial Content"), "Partial Content");
        assert_eq!(parse_reason("HTTP/2 200"), "");
        assert_eq!(parse_reason(""), "");
    }

    #[test]
    fn cancelled_context_short_circuits() {
        let transport = CurlTransport::default();
        let ctx = Context::new();
        ctx.cancel();
        let url = url::Url::parse("http://127.0.0.1:9/never").unwrap();
        let mut req = Request::new(Method::Get, url);
        assert!(matches!(transport.send(&ctx, &mut req), Err(Error::Cancelled)));
    }

    #[test]
    fn refused_connection_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let transport = CurlTransport::default();
        let url = url::Url::parse(&format!("http://127.0.0.1:{}/x", port)).unwrap();
        let mut req = Request::new(Method::Get, url);
        match transport.send(&Context::new(), &mut req) {
            Err(Error::Transport(e)) => {
                assert_eq!(e.kind, crate::error::TransportErrorKind::Connection)
            }
            other => panic!("expected transport error, got {:?}", other.map(|r| r.status())),
        }
    }
}
