//! Blob delivery through a dedicated backend.
//!
//! A blob backend takes over the whole response once the interceptor sees a
//! send-data signal with its prefix. The signal string is passed on
//! verbatim, prefix included; decoding it is the backend's business.

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderName, HeaderValue, Method, Request, StatusCode, Uri},
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::delivery::{DeliveryError, RequestHead};
use crate::sendfile::ResponseWriter;

/// Hands a signalled response to a blob backend.
#[async_trait]
pub trait BlobDelivery: Send + Sync {
    async fn send_blob(
        &self,
        writer: &mut dyn ResponseWriter,
        request: &RequestHead,
        signal: &str,
    ) -> Result<(), DeliveryError>;
}

/// Client request headers the blob service needs for ranges and revalidation.
const FORWARDED_HEADERS: [HeaderName; 5] = [
    header::RANGE,
    header::IF_RANGE,
    header::IF_MODIFIED_SINCE,
    header::IF_NONE_MATCH,
    header::ACCEPT_ENCODING,
];

/// `BlobDelivery` that fetches the blob from an HTTP service.
///
/// The service receives `GET <endpoint>` with the signal in `signal_header`
/// and its response is streamed to the client as-is.
#[derive(Clone)]
pub struct UpstreamBlobSender {
    client: Client<HttpConnector, Body>,
    endpoint: Uri,
    signal_header: HeaderName,
}

impl UpstreamBlobSender {
    pub fn new(client: Client<HttpConnector, Body>, endpoint: Uri, signal_header: HeaderName) -> Self {
        Self {
            client,
            endpoint,
            signal_header,
        }
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    fn build_request(&self, request: &RequestHead, signal: &str) -> Result<Request<Body>, DeliveryError> {
        let value = HeaderValue::from_bytes(signal.as_bytes())
            .map_err(|e| DeliveryError::InvalidRequest(e.to_string()))?;

        let mut upstream = Request::new(Body::empty());
        *upstream.method_mut() = Method::GET;
        *upstream.uri_mut() = self.endpoint.clone();

        let headers = upstream.headers_mut();
        headers.insert(self.signal_header.clone(), value);
        for name in FORWARDED_HEADERS {
            for value in request.headers.get_all(&name) {
                headers.append(name.clone(), value.clone());
            }
        }
        Ok(upstream)
    }
}

#[async_trait]
impl BlobDelivery for UpstreamBlobSender {
    async fn send_blob(
        &self,
        writer: &mut dyn ResponseWriter,
        request: &RequestHead,
        signal: &str,
    ) -> Result<(), DeliveryError> {
        tracing::info!(
            endpoint = %self.endpoint,
            method = %request.method,
            uri = %request.uri,
            "Sending blob"
        );

        let upstream = self.build_request(request, signal)?;
        match self.client.request(upstream).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                let headers = writer.headers_mut();
                headers.remove(header::CONTENT_LENGTH);
                headers.extend(parts.headers);
                writer.write_header(parts.status).await;
                writer.write_body(Body::new(body)).await?;
                Ok(())
            }
            Err(e) => {
                tracing::error!(endpoint = %self.endpoint, error = %e, "Blob backend request failed");
                writer.headers_mut().remove(header::CONTENT_LENGTH);
                writer.write_header(StatusCode::BAD_GATEWAY).await;
                writer.write(Bytes::from_static(b"Blob backend unavailable")).await?;
                Err(DeliveryError::Upstream(e.to_string()))
            }
        }
    }
}
