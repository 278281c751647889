//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::sendfile::DEFAULT_SEND_DATA_HEADER;

/// Root configuration for the sendfile proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Application server the proxy sits in front of.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Signal headers and delivery backends.
    pub sendfile: SendfileConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Application address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed to produce response headers, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Signal header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SendfileConfig {
    /// Header carrying prefixed blob signals.
    pub send_data_header: String,

    /// Remove empty or unrecognized signal headers from passed-through
    /// `200` responses too.
    pub strip_unmatched_signals: bool,

    /// Blob kinds, checked in order after `X-Sendfile`.
    pub blobs: Vec<BlobBackendConfig>,
}

impl Default for SendfileConfig {
    fn default() -> Self {
        Self {
            send_data_header: DEFAULT_SEND_DATA_HEADER.to_string(),
            strip_unmatched_signals: false,
            blobs: Vec::new(),
        }
    }
}

/// One blob kind and the service that delivers it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlobBackendConfig {
    /// Kind name for logging/metrics (e.g., "git-blob").
    pub kind: String,

    /// Signal prefix selecting this kind (e.g., "git-blob:").
    pub prefix: String,

    /// Absolute URL of the blob service (e.g., "http://127.0.0.1:9000/blob").
    pub endpoint: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
