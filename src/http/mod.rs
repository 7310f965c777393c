//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → [routing layer resolves the path]
//!     → forward.rs (rewritten request to upstream) or JSON resolution
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod server;

pub use forward::Upstream;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer, RuntimeState, X_REWRITE_DESTINATION};
