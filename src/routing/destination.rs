//! Destination templates.
//!
//! A destination is a path, optionally followed by `?query`, which may
//! reference source parameters as `:name`. Parameters referenced in the path
//! are substituted. When the path references none, every captured parameter
//! is handed to the page through the query string instead.

use url::form_urlencoded;

use crate::routing::matcher::{ParamValue, Params};
use crate::routing::pattern::{Key, Modifier, Pattern, PatternError, Token};

#[derive(Debug, Clone)]
pub struct Destination {
    raw: String,
    path: Pattern,
    query: Vec<(String, String)>,
}

/// A destination filled in with captured parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Destination {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let (path, query) = match query_start(raw) {
            Some(i) => (&raw[..i], Some(&raw[i + 1..])),
            None => (raw, None),
        };

        let query = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Ok(Self {
            raw: raw.to_string(),
            path: Pattern::parse(path)?,
            query,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn pattern(&self) -> &Pattern {
        &self.path
    }

    /// True when the path substitutes at least one parameter.
    pub fn has_params(&self) -> bool {
        self.path.params().next().is_some()
    }

    /// Fills the template. Required parameters are checked at table
    /// construction, so a missing one here renders as nothing.
    pub fn render(&self, params: &Params) -> Rendered {
        let mut path = String::new();

        for token in self.path.tokens() {
            match token {
                Token::Literal(text) => path.push_str(text),
                Token::Group { text, modifier } => {
                    if *modifier == Modifier::One || *modifier == Modifier::OneOrMore {
                        path.push_str(text);
                    }
                }
                Token::Param(param) => {
                    let Key::Named(name) = &param.key else { continue };
                    let Some(value) = params.get(name) else { continue };
                    for segment in value.values() {
                        path.push_str(&param.prefix);
                        path.push_str(segment);
                        path.push_str(&param.suffix);
                    }
                }
            }
        }

        let mut query = self.query.clone();
        if !self.has_params() {
            for (name, value) in params.iter() {
                if self.query.iter().any(|(k, _)| k == name) {
                    continue;
                }
                match value {
                    ParamValue::Single(v) => query.push((name.to_string(), v.clone())),
                    ParamValue::Repeated(vs) => {
                        query.extend(vs.iter().map(|v| (name.to_string(), v.clone())))
                    }
                }
            }
        }

        Rendered { path, query }
    }
}

/// Byte offset of the `?` that starts the query. A `?` directly after a
/// parameter name, a `(...)` constraint or a `{...}` group is that token's
/// optional modifier instead.
fn query_start(raw: &str) -> Option<usize> {
    let mut chars = raw.char_indices();
    let mut depth = 0usize;
    let mut in_name = false;
    let mut takes_modifier = false;

    while let Some((i, c)) = chars.next() {
        if depth > 0 {
            match c {
                '\\' => {
                    chars.next();
                }
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    takes_modifier = depth == 0;
                }
                _ => {}
            }
            continue;
        }

        if in_name && (c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }
        in_name = false;

        match c {
            '\\' => {
                chars.next();
                takes_modifier = false;
            }
            ':' => {
                in_name = true;
                takes_modifier = true;
            }
            '(' => depth = 1,
            '}' => takes_modifier = true,
            '?' if takes_modifier => takes_modifier = false,
            '?' => return Some(i),
            _ => takes_modifier = false,
        }
    }
    None
}

impl Rendered {
    /// Builds the rewritten request target. Keys present in the rendered
    /// query replace the same keys from `original_query`.
    pub fn to_uri(&self, original_query: Option<&str>) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());

        if let Some(original) = original_query {
            for (k, v) in form_urlencoded::parse(original.as_bytes()) {
                if !self.query.iter().any(|(key, _)| *key == k) {
                    serializer.append_pair(&k, &v);
                }
            }
        }
        for (k, v) in &self.query {
            serializer.append_pair(k, v);
        }

        let query = serializer.finish();
        if query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_static_destination_moves_params_to_query() {
        let dest = Destination::parse("/collective-page").unwrap();
        let rendered = dest.render(&params(&[("slug", "acme"), ("action", "apply")]));
        assert_eq!(rendered.path, "/collective-page");
        assert_eq!(
            rendered.to_uri(None),
            "/collective-page?slug=acme&action=apply"
        );
    }

    #[test]
    fn test_substituted_params_stay_out_of_query() {
        let dest = Destination::parse("/pages/:slug/:section?").unwrap();

        let full = dest.render(&params(&[("slug", "acme"), ("section", "info")]));
        assert_eq!(full.to_uri(None), "/pages/acme/info");

        let partial = dest.render(&params(&[("slug", "acme"), ("other", "x")]));
        assert_eq!(partial.to_uri(None), "/pages/acme");
    }

    #[test]
    fn test_destination_query_wins() {
        let dest = Destination::parse("/signin?form=create-account").unwrap();
        let rendered = dest.render(&params(&[("form", "other"), ("next", "/home")]));
        assert_eq!(
            rendered.query,
            vec![
                ("form".to_string(), "create-account".to_string()),
                ("next".to_string(), "/home".to_string()),
            ]
        );
    }

    #[test]
    fn test_original_query_is_merged() {
        let dest = Destination::parse("/signin").unwrap();
        let rendered = dest.render(&params(&[("token", "abc")]));
        assert_eq!(
            rendered.to_uri(Some("next=%2Fdashboard&token=old")),
            "/signin?next=%2Fdashboard&token=abc"
        );
        assert_eq!(Destination::parse("/home").unwrap().render(&Params::new()).to_uri(Some("")), "/home");
    }

    #[test]
    fn test_optional_marker_is_not_a_query() {
        let dest = Destination::parse("/pages/:slug/:section??tab=info").unwrap();
        assert!(dest.pattern().param("section").unwrap().modifier.is_optional());
        assert_eq!(dest.query, vec![("tab".to_string(), "info".to_string())]);

        let full = dest.render(&params(&[("slug", "acme"), ("section", "about")]));
        assert_eq!(full.to_uri(None), "/pages/acme/about?tab=info");
        let bare = dest.render(&params(&[("slug", "acme")]));
        assert_eq!(bare.to_uri(None), "/pages/acme?tab=info");

        let optional_only = Destination::parse("/b/:x?").unwrap();
        assert!(optional_only.query.is_empty());
        assert_eq!(optional_only.pattern().source(), "/b/:x?");
    }

    #[test]
    fn test_query_start() {
        assert_eq!(query_start("/signin?form=create-account"), Some(7));
        assert_eq!(query_start("/b/:x?"), None);
        assert_eq!(query_start("/b/:id([0-9]+)??v=1"), Some(15));
        assert_eq!(query_start("/docs{/v2}?"), None);
        assert_eq!(query_start("/what\\??q"), Some(7));
    }

    #[test]
    fn test_repeated_values() {
        let dest = Destination::parse("/docs/:path*").unwrap();
        let mut p = Params::new();
        p.insert("path", ParamValue::Repeated(vec!["a".into(), "b".into()]));
        assert_eq!(dest.render(&p).path, "/docs/a/b");

        let query_dest = Destination::parse("/docs").unwrap();
        assert_eq!(query_dest.render(&p).to_uri(None), "/docs?path=a&path=b");
    }
}
