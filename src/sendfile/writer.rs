//! Response writer abstraction.
//!
//! # Responsibilities
//! - Describe the capability set a handler uses to emit a response
//!   (header map, status line, body chunks, flush)
//! - Provide an in-memory writer that assembles an axum `Response`
//!
//! # Design Decisions
//! - Header map access is synchronous; committing the status and body are
//!   async so that writers backed by sockets or channels can apply backpressure
//! - Whole bodies can be handed over as a stream to avoid buffering files

use std::io;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use futures_util::StreamExt;

/// Capability set of an HTTP response writer.
#[async_trait]
pub trait ResponseWriter: Send {
    /// Header map that will be sent with the status line.
    fn headers(&self) -> &HeaderMap;

    /// Mutable header map. Changes are visible until the status is written.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status line and current headers.
    async fn write_header(&mut self, status: StatusCode);

    /// Append a body chunk, returning the number of bytes accepted.
    async fn write(&mut self, data: Bytes) -> io::Result<usize>;

    /// Append a complete body stream.
    async fn write_body(&mut self, body: Body) -> io::Result<()>;

    /// Push buffered data towards the client.
    async fn flush(&mut self) -> io::Result<()>;
}

/// Writer that collects status, headers and body into a `Response`.
///
/// Implicit `200 OK` is committed on the first body write, and a second
/// status is ignored with a warning, matching how an HTTP/1 connection
/// behaves once the status line is on the wire.
#[derive(Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<Body>,
    pending: Vec<u8>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from headers already set by a handler.
    pub fn with_headers(headers: HeaderMap) -> Self {
        Self {
            headers,
            ..Self::default()
        }
    }

    /// Committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    fn commit_pending(&mut self) {
        if !self.pending.is_empty() {
            let chunk = Bytes::from(std::mem::take(&mut self.pending));
            self.body.push(Body::from(chunk));
        }
    }

    /// Assemble the final response.
    pub fn into_response(mut self) -> Response {
        self.commit_pending();
        let body = match self.body.len() {
            0 => Body::empty(),
            1 => self.body.pop().unwrap_or_default(),
            _ => Body::from_stream(
                futures_util::stream::iter(self.body).flat_map(Body::into_data_stream),
            ),
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

#[async_trait]
impl ResponseWriter for ResponseBuffer {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    async fn write_header(&mut self, status: StatusCode) {
        if let Some(committed) = self.status {
            tracing::warn!(%committed, ignored = %status, "Superfluous write_header call");
            return;
        }
        self.status = Some(status);
    }

    async fn write(&mut self, data: Bytes) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.pending.extend_from_slice(&data);
        Ok(data.len())
    }

    async fn write_body(&mut self, body: Body) -> io::Result<()> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.commit_pending();
        self.body.push(body);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.commit_pending();
        Ok(())
    }
}
