//! Alternate delivery backends.
//!
//! # Data Flow
//! ```text
//! ResponseInterceptor decides to hijack
//!     → Dispatcher picks the adapter for the DeliveryKind
//!     → file.rs (X-Sendfile: serve a local file)
//!     → blob.rs (send-data signal: hand off to a blob service)
//!     → adapter writes status, headers and body into the real writer
//! ```
//!
//! # Design Decisions
//! - Adapters own the whole response once invoked
//! - Adapters translate their own failures into client-visible statuses;
//!   the returned error is only for logging

pub mod blob;
pub mod file;

use axum::http::{HeaderMap, Method, Request, Uri, Version};
use thiserror::Error;

pub use blob::{BlobDelivery, UpstreamBlobSender};
pub use file::{FileDelivery, LocalFileSender};

/// Errors reported by delivery adapters after they took over a response.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blob backend could not be reached or answered garbage.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The outgoing request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Request line and headers of the original client request.
///
/// The body has already been handed to the application by the time a
/// response is hijacked, so adapters only see the head.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Rebuild a body-less request, e.g. to drive a tower service.
    pub fn to_request(&self) -> Request<()> {
        let mut request = Request::new(());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        request
    }
}

impl<B> From<&Request<B>> for RequestHead {
    fn from(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }
}
