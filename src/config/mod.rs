//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (compile every rule, check addresses)
//!     → RewriterConfig (validated, immutable)
//!     → compiled into a RewriteTable, shared via Arc
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the compiled table
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - No `[[rewrites]]` means the built-in platform table
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use watcher::ConfigWatcher;
pub use schema::{
    AdminConfig, ListenerConfig, LogFormat, ObservabilityConfig, RewriteRule, RewriterConfig,
    RewritingConfig, TimeoutConfig, UpstreamConfig,
};
