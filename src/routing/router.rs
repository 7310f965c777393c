//! Rewrite table lookup.
//!
//! # Responsibilities
//! - Compile the ordered rule list once, at startup
//! - Resolve a request path to the first matching rule
//! - Return a [`Resolution`] or explicit no-match (`None`)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) linear scan in list order; order is precedence
//! - Any malformed rule fails construction as a whole

use serde::Serialize;
use thiserror::Error;

use crate::config::{RewriteRule, RewritingConfig};
use crate::routing::destination::Destination;
use crate::routing::matcher::{CompileError, CompiledPattern, Params};
use crate::routing::normalize::normalize_path;
use crate::routing::pattern::{Key, Pattern, PatternError};

/// Table-wide matching options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableOptions {
    pub case_sensitive: bool,
}

impl From<&RewritingConfig> for TableOptions {
    fn from(config: &RewritingConfig) -> Self {
        Self {
            case_sensitive: config.case_sensitive,
        }
    }
}

/// What is wrong with a single rule.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("source must start with '/'")]
    SourceNotAbsolute,

    #[error("destination must start with '/'")]
    DestinationNotAbsolute,

    #[error("invalid source: {0}")]
    Source(PatternError),

    #[error("invalid destination: {0}")]
    Destination(PatternError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("destination cannot contain unnamed groups")]
    UnnamedDestinationParam,

    #[error("destination parameter `{0}` is not captured by the source")]
    UnknownDestinationParam(String),

    #[error("destination requires `{0}`, which is optional in the source")]
    OptionalDestinationParam(String),
}

/// A rule that failed to compile, with its position in the table.
#[derive(Debug, Error)]
#[error("rewrite rule {index} (`{pattern}`): {error}")]
pub struct RewriteError {
    pub index: usize,
    pub pattern: String,
    pub error: RuleError,
}

/// A single compiled rule.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: RewriteRule,
    matcher: CompiledPattern,
    destination: Destination,
}

impl CompiledRule {
    pub fn compile(rule: &RewriteRule, options: &TableOptions) -> Result<Self, RuleError> {
        if !rule.source.starts_with('/') {
            return Err(RuleError::SourceNotAbsolute);
        }
        if !rule.destination.starts_with('/') {
            return Err(RuleError::DestinationNotAbsolute);
        }

        let source = Pattern::parse(&rule.source).map_err(RuleError::Source)?;
        let destination = Destination::parse(&rule.destination).map_err(RuleError::Destination)?;

        for param in destination.pattern().params() {
            let Key::Named(name) = &param.key else {
                return Err(RuleError::UnnamedDestinationParam);
            };
            let captured = source
                .param(name)
                .ok_or_else(|| RuleError::UnknownDestinationParam(name.clone()))?;
            if captured.modifier.is_optional() && !param.modifier.is_optional() {
                return Err(RuleError::OptionalDestinationParam(name.clone()));
            }
        }

        let matcher = CompiledPattern::compile(&source, options.case_sensitive)?;

        Ok(Self {
            rule: rule.clone(),
            matcher,
            destination,
        })
    }

    pub fn rule(&self) -> &RewriteRule {
        &self.rule
    }

    pub fn source(&self) -> &str {
        &self.rule.source
    }

    pub fn destination(&self) -> &str {
        &self.rule.destination
    }

    pub fn regex(&self) -> &str {
        self.matcher.as_regex()
    }

    /// Matches an already-normalized path.
    fn resolve_normalized(&self, index: usize, path: &str) -> Option<Resolution> {
        let params = self.matcher.match_path(path)?;
        let rendered = self.destination.render(&params);
        Some(Resolution {
            rule_index: index,
            source: self.rule.source.clone(),
            destination: rendered.path,
            query: rendered.query,
            params,
        })
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Position of the winning rule in the table.
    pub rule_index: usize,
    /// The winning rule's source pattern.
    pub source: String,
    /// Rendered destination path (the page identifier).
    pub destination: String,
    /// Query pairs the destination hands to the page.
    pub query: Vec<(String, String)>,
    pub params: Params,
}

impl Resolution {
    /// Request target for the rewritten request: destination path plus the
    /// merged query string.
    pub fn rewritten_uri(&self, original_query: Option<&str>) -> String {
        crate::routing::destination::Rendered {
            path: self.destination.clone(),
            query: self.query.clone(),
        }
        .to_uri(original_query)
    }
}

/// Ordered, immutable rewrite table.
#[derive(Debug, Clone, Default)]
pub struct RewriteTable {
    rules: Vec<CompiledRule>,
}

impl RewriteTable {
    /// Compile rules in order. Stops at the first malformed rule.
    pub fn compile(rules: &[RewriteRule], options: &TableOptions) -> Result<Self, RewriteError> {
        let compiled = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                CompiledRule::compile(rule, options).map_err(|error| RewriteError {
                    index,
                    pattern: rule.source.clone(),
                    error,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(rules = compiled.len(), "Rewrite table compiled");
        Ok(Self { rules: compiled })
    }

    /// First matching rule for `path`, or `None` when nothing applies.
    pub fn resolve(&self, path: &str) -> Option<Resolution> {
        let path = normalize_path(path);
        self.rules
            .iter()
            .enumerate()
            .find_map(|(index, rule)| rule.resolve_normalized(index, &path))
    }

    /// Every matching rule, in table order. The first entry is what
    /// [`resolve`](Self::resolve) returns; the rest are shadowed.
    pub fn matches(&self, path: &str) -> Vec<Resolution> {
        let path = normalize_path(path);
        self.rules
            .iter()
            .enumerate()
            .filter_map(|(index, rule)| rule.resolve_normalized(index, &path))
            .collect()
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
