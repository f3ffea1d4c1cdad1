//! Minimal HTTP endpoint serving the Prometheus text exposition.
//!
//! One thread per connection, one request per connection, at most
//! `MAX_CONCURRENT_CONNECTIONS` at a time; extra connections get a 503. Only
//! `GET` on `/metrics` or `/` is served; everything else gets a 404 or 405.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use realtime_core::{render_prometheus, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::state::SharedState;

const READ_TIMEOUT_SECS: u64 = 2;
const MAX_REQUEST_LINE_BYTES: usize = 8 * 1024;
const MAX_CONCURRENT_CONNECTIONS: usize = 32;

/// Counts connections currently being handled.
struct ConnectionLimit {
    active: AtomicUsize,
    max: usize,
}

/// Holds one connection slot; released on drop.
struct ConnectionPermit {
    limit: Arc<ConnectionLimit>,
}

impl ConnectionLimit {
    fn new(max: usize) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            max,
        })
    }

    fn try_acquire(self: &Arc<Self>) -> Option<ConnectionPermit> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < self.max).then_some(active + 1)
            })
            .ok()
            .map(|_| ConnectionPermit {
                limit: Arc::clone(self),
            })
    }

    fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.limit.active.fetch_sub(1, Ordering::AcqRel);
    }
}

pub fn bind(address: &str) -> std::io::Result<TcpListener> {
    TcpListener::bind(address)
}

/// Accepts connections on a background thread.
pub fn spawn(listener: TcpListener, state: Arc<SharedState>) -> thread::JoinHandle<()> {
    spawn_with_limit(listener, state, MAX_CONCURRENT_CONNECTIONS)
}

fn spawn_with_limit(
    listener: TcpListener,
    state: Arc<SharedState>,
    max_connections: usize,
) -> thread::JoinHandle<()> {
    let limit = ConnectionLimit::new(max_connections);
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => match limit.try_acquire() {
                    Some(permit) => {
                        let state = Arc::clone(&state);
                        thread::spawn(move || {
                            handle_connection(stream, &state);
                            drop(permit);
                        });
                    }
                    None => reject_busy(stream, limit.active()),
                },
                Err(err) => {
                    warn!(error = %err, "Failed to accept metrics connection");
                }
            }
        }
    })
}

fn reject_busy(mut stream: TcpStream, active: usize) {
    warn!(active = active, "Too many metrics connections; rejecting");
    let _ = stream.set_write_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));
    let response = http_response(
        "503 Service Unavailable",
        "text/plain",
        "Service Unavailable\n",
    );
    if let Err(err) = stream.write_all(&response) {
        debug!(error = %err, "Failed to write busy response");
    }
}

fn handle_connection(mut stream: TcpStream, state: &SharedState) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let request_line = match read_request_head(&stream) {
        Ok(line) => line,
        Err(err) => {
            debug!(error = %err, "Failed to read metrics request");
            return;
        }
    };

    let response = route(&request_line, state);
    if let Err(err) = stream.write_all(&response).and_then(|_| stream.flush()) {
        debug!(error = %err, "Failed to write metrics response");
    }
}

/// Reads the request line and drains headers up to the blank line.
fn read_request_head(stream: &TcpStream) -> std::io::Result<String> {
    let mut reader = BufReader::new(stream).take(MAX_REQUEST_LINE_BYTES as u64);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let mut header = String::new();
    loop {
        header.clear();
        let read = reader.read_line(&mut header)?;
        if read == 0 || header.trim().is_empty() {
            break;
        }
    }

    Ok(request_line.trim_end().to_string())
}

fn route(request_line: &str, state: &SharedState) -> Vec<u8> {
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default();

    debug!(method = %method, path = %path, "Metrics request received");

    match (method, path) {
        ("GET", "/metrics") | ("GET", "/") => {
            let body = render_prometheus(&state.metric_snapshot());
            http_response("200 OK", CONTENT_TYPE, &body)
        }
        ("GET", _) => http_response("404 Not Found", "text/plain", "Not Found\n"),
        _ => http_response("405 Method Not Allowed", "text/plain", "Method Not Allowed\n"),
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
    .into_bytes()
}
