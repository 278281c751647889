//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, header names and blob endpoints
//! - Detect ambiguous blob kinds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, Uri};
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::sendfile::X_SENDFILE;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    #[error("send-data header must differ from X-Sendfile")]
    SendDataHeaderIsSendfile,

    #[error("blob #{0}: kind and prefix must not be empty")]
    EmptyBlobSignal(usize),

    #[error("duplicate blob kind {0:?}")]
    DuplicateBlobKind(String),

    #[error("duplicate blob prefix {0:?}")]
    DuplicateBlobPrefix(String),

    #[error("blob endpoint {0:?} must be an absolute http:// URL")]
    InvalidEndpoint(String),
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);
    check_address("upstream.address", &config.upstream.address, &mut errors);
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }

    let sendfile = &config.sendfile;
    match HeaderName::try_from(sendfile.send_data_header.as_str()) {
        Ok(name) if name == X_SENDFILE => errors.push(ValidationError::SendDataHeaderIsSendfile),
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::InvalidHeaderName(
            sendfile.send_data_header.clone(),
        )),
    }

    let mut kinds = HashSet::new();
    let mut prefixes = HashSet::new();
    for (i, blob) in sendfile.blobs.iter().enumerate() {
        if blob.kind.is_empty() || blob.prefix.is_empty() {
            errors.push(ValidationError::EmptyBlobSignal(i));
        }
        if !kinds.insert(blob.kind.as_str()) {
            errors.push(ValidationError::DuplicateBlobKind(blob.kind.clone()));
        }
        if !prefixes.insert(blob.prefix.as_str()) {
            errors.push(ValidationError::DuplicateBlobPrefix(blob.prefix.clone()));
        }

        let valid_endpoint = blob
            .endpoint
            .parse::<Uri>()
            .map(|uri| uri.scheme_str() == Some("http") && uri.authority().is_some())
            .unwrap_or(false);
        if !valid_endpoint {
            errors.push(ValidationError::InvalidEndpoint(blob.endpoint.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
