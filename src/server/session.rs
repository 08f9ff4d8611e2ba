//! Per-connection request/response loop.
//!
//! Requests are newline-delimited; bytes are accumulated in a buffer
//! until a full line is available, so partial reads and payloads larger
//! than one network buffer are handled. A malformed request answers
//! `error` and leaves the connection open; only `quit`/`bye`, an empty
//! line, peer disconnect, or a write failure end the session.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::engine::MetricsEngine;
use crate::protocol::{encode_response, parse_request, Request, Response};

enum Outcome {
    Continue,
    Close,
}

pub struct Session {
    stream: TcpStream,
    engine: Arc<MetricsEngine>,
    buffer: BytesMut,
    peer_addr: SocketAddr,
}

impl Session {
    pub fn new(stream: TcpStream, engine: Arc<MetricsEngine>, peer_addr: SocketAddr) -> Self {
        Session {
            stream,
            engine,
            buffer: BytesMut::with_capacity(8192),
            peer_addr,
        }
    }

    pub async fn run(mut self) {
        info!(peer = %self.peer_addr, "client connected");

        let mut read_buf = [0u8; 4096];
        loop {
            while let Some(line) = self.next_line() {
                if let Outcome::Close = self.handle_line(&line).await {
                    info!(peer = %self.peer_addr, "session closed");
                    return;
                }
            }

            match self.stream.read(&mut read_buf).await {
                Ok(0) => {
                    info!(peer = %self.peer_addr, "client disconnected");
                    return;
                }
                Ok(n) => self.buffer.extend_from_slice(&read_buf[..n]),
                Err(e) => {
                    // Peer reset or similar: close silently, no retry.
                    debug!(peer = %self.peer_addr, error = %e, "read failed");
                    return;
                }
            }
        }
    }

    /// Pop the next complete line off the buffer, with `\n`/`\r\n`
    /// stripped. Returns `None` until a full line has arrived.
    fn next_line(&mut self) -> Option<String> {
        let newline = memchr::memchr(b'\n', &self.buffer)?;
        let mut line = self.buffer.split_to(newline + 1);
        line.truncate(newline);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    async fn handle_line(&mut self, line: &str) -> Outcome {
        debug!(peer = %self.peer_addr, line, "request");

        match parse_request(line) {
            Ok(Request::Quit) => Outcome::Close,
            Ok(Request::Set(args)) => {
                self.engine.apply_set(args);
                self.send(&Response::Ok).await
            }
            Ok(Request::Get(names)) => {
                let values = self.engine.lookup(&names);
                self.send(&Response::OkValues(values)).await
            }
            Ok(Request::Unknown(verb)) => {
                // Legacy behavior: unsupported verbs get no response.
                warn!(peer = %self.peer_addr, verb = %verb, "unsupported verb");
                Outcome::Continue
            }
            Err(e) => {
                warn!(peer = %self.peer_addr, error = %e, "bad request");
                self.send(&Response::Error).await
            }
        }
    }

    async fn send(&mut self, response: &Response) -> Outcome {
        let encoded = encode_response(response);
        match self.stream.write_all(encoded.as_bytes()).await {
            Ok(()) => Outcome::Continue,
            Err(e) => {
                debug!(peer = %self.peer_addr, error = %e, "write failed");
                Outcome::Close
            }
        }
    }
}
