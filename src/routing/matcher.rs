//! Pattern matching against request paths.
//!
//! # Responsibilities
//! - Compile a parsed [`Pattern`] into one anchored regex
//! - Match a normalized path and extract named parameters
//!
//! # Design Decisions
//! - Whole-path anchoring (`^...$`), strict about trailing slashes
//! - Case-insensitive unless configured otherwise
//! - Unnamed groups constrain the match but never reach [`Params`]
//! - An absent optional parameter is omitted, never bound to ""
//! - Matching runs on the encoded path; captured values are percent-decoded

use percent_encoding::percent_decode_str;
use regex::{Regex, RegexBuilder};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::routing::pattern::{Param, Pattern, Token};

/// Value captured for one parameter.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    /// Captured by `*` or `+` parameters, one entry per segment.
    Repeated(Vec<String>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(value) => Some(value),
            ParamValue::Repeated(_) => None,
        }
    }

    /// Every captured value, in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(value) => vec![value.as_str()],
            ParamValue::Repeated(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

/// Named parameters captured by a match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Shorthand for single-valued parameters.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Params {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, ParamValue::from(value));
        }
        params
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Why a pattern could not be turned into a regex.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("constraints must not contain capturing groups")]
    CapturingGroup,
}

/// A pattern compiled for matching.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    /// One entry per capture group, in group order.
    keys: Vec<Param>,
}

impl CompiledPattern {
    pub fn compile(pattern: &Pattern, case_sensitive: bool) -> Result<Self, CompileError> {
        let mut route = String::from("^");
        let mut keys = Vec::new();

        for token in pattern.tokens() {
            match token {
                Token::Literal(text) => route.push_str(&regex::escape(text)),
                Token::Group { text, modifier } => {
                    route.push_str(&format!("(?:{}){}", regex::escape(text), modifier.as_str()));
                }
                Token::Param(param) => {
                    route.push_str(&param_regex(param));
                    keys.push(param.clone());
                }
            }
        }
        route.push('$');

        let regex = RegexBuilder::new(&route)
            .case_insensitive(!case_sensitive)
            .build()?;

        // An inline `(?P<x>...)` would shift every later capture index.
        if regex.captures_len() != keys.len() + 1 {
            return Err(CompileError::CapturingGroup);
        }

        Ok(Self { regex, keys })
    }

    /// The generated regex source, for diagnostics.
    pub fn as_regex(&self) -> &str {
        self.regex.as_str()
    }

    /// Matches a normalized path as it appears on the wire. Captured values
    /// come back percent-decoded. `None` means the pattern does not apply.
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let mut params = Params::new();

        for (i, key) in self.keys.iter().enumerate() {
            let Some(name) = key.name() else { continue };
            let Some(m) = captures.get(i + 1) else { continue };

            let value = if key.modifier.is_repeated() {
                let separator = format!("{}{}", key.suffix, key.prefix);
                let parts = if separator.is_empty() {
                    vec![decode(m.as_str())?]
                } else {
                    m.as_str()
                        .split(separator.as_str())
                        .map(decode)
                        .collect::<Option<Vec<_>>>()?
                };
                ParamValue::Repeated(parts)
            } else {
                ParamValue::Single(decode(m.as_str())?)
            };
            params.insert(name, value);
        }

        Some(params)
    }
}

/// Percent-decodes a captured value. Escapes that decode to invalid UTF-8
/// make the whole match fail.
fn decode(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|value| value.into_owned())
}

fn param_regex(param: &Param) -> String {
    let prefix = regex::escape(&param.prefix);
    let suffix = regex::escape(&param.suffix);
    let pattern = &param.pattern;
    let modifier = param.modifier;

    if prefix.is_empty() && suffix.is_empty() {
        if modifier.is_repeated() {
            format!("((?:{}){})", pattern, modifier.as_str())
        } else {
            format!("({}){}", pattern, modifier.as_str())
        }
    } else if modifier.is_repeated() {
        let outer = if modifier.is_optional() { "?" } else { "" };
        format!(
            "(?:{prefix}((?:{pattern})(?:{suffix}{prefix}(?:{pattern}))*){suffix}){outer}"
        )
    } else {
        format!("(?:{}({}){}){}", prefix, pattern, suffix, modifier.as_str())
    }
}
