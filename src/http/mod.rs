//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → request.rs (header access, If-Modified-Since)
//!     → [routing decides manifest vs static]
//!     → [manifest matcher + build cache for manifest routes]
//!     → encoding.rs (negotiated compression)
//!     → response.rs (headers, error → status mapping)
//!     → Send to client
//! ```

pub mod encoding;
pub mod request;
pub mod response;
pub mod server;

pub use encoding::Encoding;
pub use request::X_REQUEST_ID;
pub use response::ServeError;
pub use server::{HttpServer, ServerError};
