//! X-Sendfile offloading proxy library.

pub mod config;
pub mod delivery;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod sendfile;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use sendfile::{Dispatcher, ResponseInterceptor};
