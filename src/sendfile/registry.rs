//! Signal header lookup.
//!
//! # Responsibilities
//! - Hold the ordered table of signal headers the interceptor understands
//! - Resolve a response header map to the first matching delivery kind
//! - Strip signal headers before a response leaves the proxy
//!
//! # Design Decisions
//! - First match wins, in registration order (the file signal is registered first)
//! - Empty, non-UTF-8 or unprefixed values count as absent
//! - Immutable once built; shared read-only across requests

use axum::http::{HeaderMap, HeaderName};

/// Header carrying the path of a local file to serve.
pub const X_SENDFILE: HeaderName = HeaderName::from_static("x-sendfile");

/// Header advertising the supported file-delivery convention to the handler.
pub const X_SENDFILE_TYPE: HeaderName = HeaderName::from_static("x-sendfile-type");

/// Default header carrying prefixed blob-delivery signals.
pub const DEFAULT_SEND_DATA_HEADER: &str = "gitlab-workhorse-send-data";

/// Which delivery path a signal selects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryKind {
    /// Serve a local file.
    File,
    /// Hand the response to the named blob backend.
    Blob(String),
}

impl DeliveryKind {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &str {
        match self {
            DeliveryKind::File => "file",
            DeliveryKind::Blob(kind) => kind,
        }
    }
}

/// What an adapter receives once a response is hijacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySpec {
    pub kind: DeliveryKind,
    /// Raw header value. For blob kinds this still carries the prefix.
    pub payload: String,
}

/// One row of the registry.
#[derive(Debug, Clone)]
pub struct SignalEntry {
    header: HeaderName,
    value_prefix: Option<String>,
    kind: DeliveryKind,
}

impl SignalEntry {
    /// Entry for the `X-Sendfile` convention: any non-empty value is a path.
    pub fn file() -> Self {
        Self {
            header: X_SENDFILE,
            value_prefix: None,
            kind: DeliveryKind::File,
        }
    }

    /// Entry for a blob kind recognized by `prefix` on `header`.
    pub fn blob(header: HeaderName, prefix: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            header,
            value_prefix: Some(prefix.into()),
            kind: DeliveryKind::Blob(kind.into()),
        }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    pub fn value_prefix(&self) -> Option<&str> {
        self.value_prefix.as_deref()
    }

    pub fn kind(&self) -> &DeliveryKind {
        &self.kind
    }

    fn matches(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        match &self.value_prefix {
            Some(prefix) => value.starts_with(prefix.as_str()),
            None => true,
        }
    }
}

/// Ordered table of signal entries.
#[derive(Debug, Clone, Default)]
pub struct SignalRegistry {
    entries: Vec<SignalEntry>,
}

impl SignalRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Entries registered earlier take precedence.
    pub fn register(&mut self, entry: SignalEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[SignalEntry] {
        &self.entries
    }

    /// Find the first entry whose header is present with a matching value.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<(&SignalEntry, DeliverySpec)> {
        self.entries.iter().find_map(|entry| {
            let value = headers.get(&entry.header)?;
            let value = std::str::from_utf8(value.as_bytes()).ok()?;
            if !entry.matches(value) {
                return None;
            }
            let spec = DeliverySpec {
                kind: entry.kind.clone(),
                payload: value.to_string(),
            };
            Some((entry, spec))
        })
    }

    /// Remove every registered signal header from `headers`.
    pub fn strip(&self, headers: &mut HeaderMap) {
        for entry in &self.entries {
            headers.remove(&entry.header);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn registry() -> SignalRegistry {
        let send_data = HeaderName::from_static(DEFAULT_SEND_DATA_HEADER);
        let mut registry = SignalRegistry::new();
        registry.register(SignalEntry::file());
        registry.register(SignalEntry::blob(send_data.clone(), "git-blob:", "git-blob"));
        registry.register(SignalEntry::blob(send_data, "git-archive:", "git-archive"));
        registry
    }

    #[test]
    fn test_resolve_file_signal() {
        let mut headers = HeaderMap::new();
        headers.insert(X_SENDFILE, HeaderValue::from_static("/tmp/a.txt"));

        let registry = registry();
        let (entry, spec) = registry.resolve(&headers).unwrap();
        assert_eq!(entry.kind(), &DeliveryKind::File);
        assert_eq!(spec.payload, "/tmp/a.txt");
    }

    #[test]
    fn test_resolve_keeps_prefix_in_payload() {
        let mut headers = HeaderMap::new();
        headers.insert(DEFAULT_SEND_DATA_HEADER, HeaderValue::from_static("git-archive:eyJ9"));

        let (_, spec) = registry().resolve(&headers).unwrap();
        assert_eq!(spec.kind, DeliveryKind::Blob("git-archive".into()));
        assert_eq!(spec.payload, "git-archive:eyJ9");
    }

    #[test]
    fn test_file_signal_wins_over_blob_signal() {
        let mut headers = HeaderMap::new();
        headers.insert(DEFAULT_SEND_DATA_HEADER, HeaderValue::from_static("git-blob:abc"));
        headers.insert(X_SENDFILE, HeaderValue::from_static("/srv/file"));

        let (_, spec) = registry().resolve(&headers).unwrap();
        assert_eq!(spec.kind, DeliveryKind::File);
    }

    #[test]
    fn test_malformed_signals_are_absent() {
        let registry = registry();

        let mut headers = HeaderMap::new();
        headers.insert(X_SENDFILE, HeaderValue::from_static(""));
        assert!(registry.resolve(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(DEFAULT_SEND_DATA_HEADER, HeaderValue::from_static("unknown:abc"));
        assert!(registry.resolve(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(X_SENDFILE, HeaderValue::from_bytes(b"/tmp/\xff").unwrap());
        assert!(registry.resolve(&headers).is_none());
    }

    #[test]
    fn test_strip_removes_all_signal_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(X_SENDFILE, HeaderValue::from_static(""));
        headers.insert(DEFAULT_SEND_DATA_HEADER, HeaderValue::from_static("junk"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        registry().strip(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("content-type"));
    }
}
