//! Delivery dispatch table.
//!
//! # Responsibilities
//! - Pair every registered signal with the adapter that serves it
//! - Route a hijacked response to its adapter
//! - Log and count adapter failures (no rollback: the response is already
//!   owned by the adapter)
//!
//! # Design Decisions
//! - Signals and adapters are registered together so a matched signal always
//!   has a backend
//! - The file signal is registered first and therefore wins over blob signals

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderName, StatusCode, Uri},
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::config::validation::ValidationError;
use crate::config::SendfileConfig;
use crate::delivery::{BlobDelivery, DeliveryError, FileDelivery, LocalFileSender, RequestHead, UpstreamBlobSender};
use crate::observability::metrics;
use crate::sendfile::registry::{DeliveryKind, DeliverySpec, SignalEntry, SignalRegistry};
use crate::sendfile::ResponseWriter;

/// Signal registry plus the adapters behind it.
pub struct Dispatcher {
    registry: SignalRegistry,
    files: Arc<dyn FileDelivery>,
    blobs: HashMap<String, Arc<dyn BlobDelivery>>,
    strip_unmatched: bool,
}

impl Dispatcher {
    /// Dispatcher that understands `X-Sendfile` only.
    pub fn new(files: Arc<dyn FileDelivery>) -> Self {
        let mut registry = SignalRegistry::new();
        registry.register(SignalEntry::file());
        Self {
            registry,
            files,
            blobs: HashMap::new(),
            strip_unmatched: false,
        }
    }

    /// Register a blob kind recognized by `prefix` on `header`.
    pub fn with_blob(
        mut self,
        header: HeaderName,
        prefix: impl Into<String>,
        kind: impl Into<String>,
        backend: Arc<dyn BlobDelivery>,
    ) -> Self {
        let kind = kind.into();
        self.registry.register(SignalEntry::blob(header, prefix, kind.clone()));
        self.blobs.insert(kind, backend);
        self
    }

    /// Also strip empty or unrecognized signal headers from `200` responses
    /// that are passed through.
    pub fn strip_unmatched_signals(mut self, enabled: bool) -> Self {
        self.strip_unmatched = enabled;
        self
    }

    /// Build from configuration, sending blobs through `client`.
    pub fn from_config(
        config: &SendfileConfig,
        client: Client<HttpConnector, Body>,
    ) -> Result<Self, ValidationError> {
        let header = HeaderName::try_from(config.send_data_header.as_str())
            .map_err(|_| ValidationError::InvalidHeaderName(config.send_data_header.clone()))?;

        let mut dispatcher = Self::new(Arc::new(LocalFileSender::new()))
            .strip_unmatched_signals(config.strip_unmatched_signals);

        for blob in &config.blobs {
            let endpoint: Uri = blob
                .endpoint
                .parse()
                .map_err(|_| ValidationError::InvalidEndpoint(blob.endpoint.clone()))?;
            let backend = UpstreamBlobSender::new(client.clone(), endpoint, header.clone());
            tracing::info!(
                kind = %blob.kind,
                prefix = %blob.prefix,
                endpoint = %backend.endpoint(),
                "Blob backend registered"
            );
            dispatcher = dispatcher.with_blob(header.clone(), blob.prefix.clone(), blob.kind.clone(), Arc::new(backend));
        }

        Ok(dispatcher)
    }

    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    pub fn strips_unmatched(&self) -> bool {
        self.strip_unmatched
    }

    /// Hand a hijacked response to its adapter.
    pub async fn dispatch(
        &self,
        spec: DeliverySpec,
        writer: &mut dyn ResponseWriter,
        request: &RequestHead,
    ) {
        let result = match &spec.kind {
            DeliveryKind::File => self.files.send_file(writer, request, &spec.payload).await,
            DeliveryKind::Blob(kind) => match self.blobs.get(kind) {
                Some(backend) => backend.send_blob(writer, request, &spec.payload).await,
                None => {
                    writer.write_header(StatusCode::INTERNAL_SERVER_ERROR).await;
                    Err(DeliveryError::InvalidRequest(format!("no backend for blob kind {kind}")))
                }
            },
        };

        if let Err(e) = result {
            tracing::error!(kind = %spec.kind.label(), error = %e, "Delivery failed");
            metrics::record_delivery_failure(spec.kind.label());
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("blob_kinds", &self.blobs.keys().collect::<Vec<_>>())
            .field("strip_unmatched", &self.strip_unmatched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlobBackendConfig;
    use hyper_util::rt::TokioExecutor;

    fn client() -> Client<HttpConnector, Body> {
        Client::builder(TokioExecutor::new()).build(HttpConnector::new())
    }

    #[test]
    fn test_from_config_registers_file_first() {
        let mut config = SendfileConfig::default();
        config.blobs.push(BlobBackendConfig {
            kind: "git-blob".into(),
            prefix: "git-blob:".into(),
            endpoint: "http://127.0.0.1:9000/blob".into(),
        });

        let dispatcher = Dispatcher::from_config(&config, client()).unwrap();
        let entries = dispatcher.registry().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind(), &DeliveryKind::File);
        assert_eq!(entries[1].kind(), &DeliveryKind::Blob("git-blob".into()));
        assert_eq!(entries[1].header().as_str(), "gitlab-workhorse-send-data");
        assert_eq!(entries[1].value_prefix(), Some("git-blob:"));
    }

    #[test]
    fn test_from_config_rejects_bad_header() {
        let config = SendfileConfig {
            send_data_header: "bad header".into(),
            ..SendfileConfig::default()
        };

        let err = Dispatcher::from_config(&config, client()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidHeaderName(_)));
    }
}
