//! Axum middleware wiring the interceptor in front of a handler.
//!
//! The inner handler runs to completion and produces an ordinary response;
//! its status, headers and body are then replayed through a
//! `ResponseInterceptor` exactly as a handler writing to the interceptor
//! directly would have produced them.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::delivery::RequestHead;
use crate::sendfile::registry::X_SENDFILE_TYPE;
use crate::sendfile::{Dispatcher, ResponseBuffer, ResponseInterceptor, ResponseWriter};

/// Advertise `X-Sendfile` to the handler and divert signalled responses.
pub async fn sendfile_middleware(
    State(dispatcher): State<Arc<Dispatcher>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request
        .headers_mut()
        .insert(X_SENDFILE_TYPE, HeaderValue::from_static("X-Sendfile"));
    let head = RequestHead::from(&request);

    let (parts, body) = next.run(request).await.into_parts();

    let mut buffer = ResponseBuffer::with_headers(parts.headers);
    let hijacked = {
        let mut interceptor = ResponseInterceptor::new(&mut buffer, &head, &dispatcher);
        interceptor.write_header(parts.status).await;
        if let Err(e) = interceptor.write_body(body).await {
            tracing::warn!(uri = %head.uri, error = %e, "Failed to forward response body");
        }
        interceptor.is_hijacked()
    };

    let mut response = buffer.into_response();
    if !hijacked {
        *response.version_mut() = parts.version;
        *response.extensions_mut() = parts.extensions;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{BlobDelivery, DeliveryError, LocalFileSender};
    use async_trait::async_trait;
    use axum::{
        body::Bytes,
        http::{HeaderMap, HeaderName, StatusCode},
        routing::get,
        Router,
    };
    use std::io::Write;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Blob backend answering with a fixed body and remembering the signal.
    #[derive(Default)]
    struct EchoBlob {
        signals: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlobDelivery for EchoBlob {
        async fn send_blob(
            &self,
            writer: &mut dyn ResponseWriter,
            _request: &RequestHead,
            signal: &str,
        ) -> Result<(), DeliveryError> {
            self.signals.lock().unwrap().push(signal.to_string());
            writer.write_header(StatusCode::OK).await;
            writer.write(Bytes::from_static(b"blob contents")).await?;
            Ok(())
        }
    }

    fn app(file_path: String, blob: Arc<EchoBlob>) -> Router {
        let dispatcher = Dispatcher::new(Arc::new(LocalFileSender::new())).with_blob(
            HeaderName::from_static("x-send-data"),
            "git-blob:",
            "git-blob",
            blob,
        );

        let file_for_ok = file_path.clone();
        Router::new()
            .route(
                "/file",
                get(move || async move { ([("x-sendfile", file_for_ok)], "application body") }),
            )
            .route(
                "/error",
                get(move || async move {
                    (StatusCode::FORBIDDEN, [("x-sendfile", file_path)], "denied")
                }),
            )
            .route(
                "/missing",
                get(|| async { ([("x-sendfile", "/nonexistent/sendfile-proxy/file")], "") }),
            )
            .route(
                "/blob",
                get(|| async { ([("x-send-data", "git-blob:payload")], "") }),
            )
            .route(
                "/type",
                get(|headers: HeaderMap| async move {
                    headers
                        .get("x-sendfile-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("absent")
                        .to_string()
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(dispatcher),
                sendfile_middleware,
            ))
    }

    fn fixture() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file contents").unwrap();
        file
    }

    async fn get_path(app: Router, path: &str) -> (StatusCode, HeaderMap, Bytes) {
        let response = app
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_sendfile_serves_file() {
        let file = fixture();
        let app = app(file.path().to_str().unwrap().into(), Arc::default());

        let (status, headers, body) = get_path(app, "/file").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key("x-sendfile"));
        assert_eq!(&body[..], b"file contents");
    }

    #[tokio::test]
    async fn test_sendfile_missing_file() {
        let file = fixture();
        let app = app(file.path().to_str().unwrap().into(), Arc::default());

        let (status, headers, _) = get_path(app, "/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!headers.contains_key("x-sendfile"));
    }

    #[tokio::test]
    async fn test_error_response_untouched() {
        let file = fixture();
        let path = file.path().to_str().unwrap().to_string();
        let app = app(path.clone(), Arc::default());

        let (status, headers, body) = get_path(app, "/error").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(headers["x-sendfile"], path.as_str());
        assert_eq!(&body[..], b"denied");
    }

    #[tokio::test]
    async fn test_send_data_goes_to_blob_backend() {
        let file = fixture();
        let blob = Arc::new(EchoBlob::default());
        let app = app(file.path().to_str().unwrap().into(), blob.clone());

        let (status, headers, body) = get_path(app, "/blob").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key("x-send-data"));
        assert_eq!(&body[..], b"blob contents");
        assert_eq!(*blob.signals.lock().unwrap(), vec!["git-blob:payload".to_string()]);
    }

    #[tokio::test]
    async fn test_handler_sees_sendfile_type() {
        let file = fixture();
        let app = app(file.path().to_str().unwrap().into(), Arc::default());

        let (status, _, body) = get_path(app, "/type").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"X-Sendfile");
    }
}
