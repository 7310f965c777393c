//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every rewrite rule and report each broken one
//! - Validate addresses, the upstream URL and timeouts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RewriterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RewriterConfig;
use crate::routing::router::{CompiledRule, RewriteError, TableOptions};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Rule(#[from] RewriteError),

    #[error("invalid {field} `{value}`")]
    Address { field: &'static str, value: String },

    #[error("invalid upstream url `{value}`: {reason}")]
    Upstream { value: String, reason: String },

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,
}

pub fn validate_config(config: &RewriterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let options = TableOptions::from(&config.rewriting);
    for (index, rule) in config.effective_rules().iter().enumerate() {
        if let Err(error) = CompiledRule::compile(rule, &options) {
            errors.push(ValidationError::Rule(RewriteError {
                index,
                pattern: rule.source.clone(),
                error,
            }));
        }
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if let Some(url) = &config.upstream.url {
        if let Err(reason) = check_upstream(url) {
            errors.push(ValidationError::Upstream {
                value: url.clone(),
                reason,
            });
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field,
            value: value.to_string(),
        });
    }
}

fn check_upstream(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err("only http upstreams are supported".to_string());
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(())
}
