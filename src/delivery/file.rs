//! Local file delivery for `X-Sendfile`.
//!
//! # Responsibilities
//! - Serve a file named by the application instead of its response body
//! - Honor conditional requests (`If-Modified-Since`, `If-Unmodified-Since`)
//!   and byte ranges
//! - Answer 404 when the path cannot be opened as a regular file
//!
//! # Design Decisions
//! - The path is trusted: the application produced it, no validation here
//! - Byte transfer, ranges and freshness come from `tower_http::services::ServeFile`
//! - The file handle lives inside the response body and is released when
//!   the body is dropped (completion, client disconnect or error)

use std::io;
use std::path::Path;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, Method, StatusCode},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::delivery::{DeliveryError, RequestHead};
use crate::sendfile::ResponseWriter;

/// Serves a local file into a response writer.
#[async_trait]
pub trait FileDelivery: Send + Sync {
    async fn send_file(
        &self,
        writer: &mut dyn ResponseWriter,
        request: &RequestHead,
        path: &str,
    ) -> Result<(), DeliveryError>;
}

/// `FileDelivery` backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSender;

impl LocalFileSender {
    pub fn new() -> Self {
        Self
    }
}

/// Check that `path` opens as a regular file. The handle is dropped on return.
async fn probe(path: &Path) -> io::Result<()> {
    let file = tokio::fs::File::open(path).await?;
    let metadata = file.metadata().await?;
    if metadata.is_file() {
        Ok(())
    } else {
        Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"))
    }
}

async fn not_found(writer: &mut dyn ResponseWriter) -> io::Result<()> {
    let headers = writer.headers_mut();
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    writer.write_header(StatusCode::NOT_FOUND).await;
    writer.write(Bytes::from_static(b"404 page not found\n")).await?;
    Ok(())
}

#[async_trait]
impl FileDelivery for LocalFileSender {
    async fn send_file(
        &self,
        writer: &mut dyn ResponseWriter,
        request: &RequestHead,
        path: &str,
    ) -> Result<(), DeliveryError> {
        tracing::info!(
            file = %path,
            method = %request.method,
            uri = %request.uri,
            "Sending file"
        );

        if let Err(e) = probe(Path::new(path)).await {
            tracing::debug!(file = %path, error = %e, "File cannot be served");
            not_found(writer).await?;
            return Ok(());
        }

        // The application already accepted the method; serve the file for
        // anything but HEAD the way a GET would be served.
        let mut file_request = request.to_request();
        if file_request.method() != Method::HEAD {
            *file_request.method_mut() = Method::GET;
        }

        let response = match ServeFile::new(path).oneshot(file_request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let (mut parts, body) = response.into_parts();
        let headers = writer.headers_mut();
        headers.remove(header::CONTENT_LENGTH);
        // A Content-Type chosen by the application beats the extension guess.
        if headers.contains_key(header::CONTENT_TYPE) {
            parts.headers.remove(header::CONTENT_TYPE);
        }
        headers.extend(parts.headers);
        writer.write_header(parts.status).await;
        writer.write_body(Body::new(body)).await?;
        Ok(())
    }
}
