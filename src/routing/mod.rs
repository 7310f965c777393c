//! Rewrite subsystem.
//!
//! # Data Flow
//! ```text
//! Table Compilation (at startup):
//!     RewriteRule[] (config order)
//!     → pattern.rs (lex + parse source templates)
//!     → matcher.rs (one anchored regex per rule)
//!     → destination.rs (parse destination templates)
//!     → Freeze as immutable RewriteTable
//!
//! Request path
//!     → normalize.rs (leading/trailing slash policy)
//!     → router.rs (linear scan, first match wins)
//!     → Return: Resolution or None
//! ```
//!
//! # Design Decisions
//! - Tables compiled at startup, immutable at runtime
//! - Deterministic: same input always resolves to the same rule
//! - First match wins (table order is precedence)
//! - No match is a normal outcome, not an error

pub mod builtin;
pub mod destination;
pub mod matcher;
pub mod normalize;
pub mod pattern;
pub mod router;

pub use matcher::{ParamValue, Params};
pub use normalize::normalize_path;
pub use router::{CompiledRule, Resolution, RewriteError, RewriteTable, RuleError, TableOptions};
