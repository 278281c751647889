//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout layers)
//!     → sendfile middleware (advertise X-Sendfile-Type)
//!     → server.rs proxy handler (forward to the upstream application)
//!     → sendfile middleware (pass through or hijack the response)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{RequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
