//! X-Sendfile interception subsystem.
//!
//! # Data Flow
//! ```text
//! Application handler sets headers and writes its response
//!     → interceptor.rs (first write_header / write / flush decides)
//!     → registry.rs (is there a signal header on a 200?)
//!         ├─ no  → writer.rs (forward status, headers and body unchanged)
//!         └─ yes → dispatcher.rs (strip signals, hand off to an adapter)
//!                     → delivery::file (X-Sendfile)
//!                     → delivery::blob (send-data prefix)
//!
//! middleware.rs adapts this to axum: it advertises X-Sendfile-Type on the
//! request and replays the handler's response through the interceptor.
//! ```
//!
//! # Design Decisions
//! - One interceptor per request; nothing shared but the immutable dispatcher
//! - Exactly one decision per response, no rollback after a hijack
//! - Signal headers never reach the client on the hijack path

pub mod dispatcher;
pub mod interceptor;
pub mod middleware;
pub mod registry;
pub mod writer;

pub use dispatcher::Dispatcher;
pub use interceptor::{Decision, ResponseInterceptor};
pub use middleware::sendfile_middleware;
pub use registry::{
    DeliveryKind, DeliverySpec, SignalEntry, SignalRegistry, DEFAULT_SEND_DATA_HEADER, X_SENDFILE,
    X_SENDFILE_TYPE,
};
pub use writer::{ResponseBuffer, ResponseWriter};
