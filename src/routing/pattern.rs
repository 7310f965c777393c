//! Source pattern parsing.
//!
//! # Responsibilities
//! - Lex a path template into characters, names, groups and modifiers
//! - Parse the lexemes into literal and parameter tokens
//! - Attach a leading `/` or `.` to the parameter that follows it
//!
//! # Syntax
//! ```text
//! /orders/:id([0-9]+)/confirm      constrained capture
//! /signin/:token?                  optional capture (prefix `/` is optional too)
//! /:collectiveSlug/(widget|x).html unnamed group, matched but not captured
//! /docs/:path*                     zero or more segments
//! /foo{-:id}?                      explicit group with its own prefix
//! /a\:b                            escaped literal
//! ```

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// Constraint applied to a parameter that has no inline regex.
pub const DEFAULT_SEGMENT_PATTERN: &str = "[^/]+?";

/// Characters that become a parameter's prefix when they directly precede it.
const PREFIXES: &[char] = &['/', '.'];

/// Error raised while parsing a pattern. Offsets are char indices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("missing parameter name at {0}")]
    MissingName(usize),

    #[error("dangling escape at {0}")]
    DanglingEscape(usize),

    #[error("pattern cannot start with '?' at {0}")]
    LeadingQuestionMark(usize),

    #[error("capturing groups are not allowed at {0}")]
    CapturingGroup(usize),

    #[error("unbalanced group at {0}")]
    Unbalanced(usize),

    #[error("missing pattern at {0}")]
    MissingPattern(usize),

    #[error("unexpected {found} at {index}, expected {expected}")]
    Unexpected {
        found: &'static str,
        index: usize,
        expected: &'static str,
    },

    #[error("duplicate parameter name `{0}`")]
    DuplicateName(String),
}

/// How often a parameter may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modifier {
    #[default]
    One,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Modifier {
    fn from_lexeme(value: &str) -> Self {
        match value {
            "?" => Modifier::Optional,
            "*" => Modifier::ZeroOrMore,
            "+" => Modifier::OneOrMore,
            _ => Modifier::One,
        }
    }

    /// The regex quantifier for this modifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Modifier::One => "",
            Modifier::Optional => "?",
            Modifier::ZeroOrMore => "*",
            Modifier::OneOrMore => "+",
        }
    }

    /// True when the parameter may be absent from a match.
    pub fn is_optional(self) -> bool {
        matches!(self, Modifier::Optional | Modifier::ZeroOrMore)
    }

    /// True when the parameter captures a list of segments.
    pub fn is_repeated(self) -> bool {
        matches!(self, Modifier::ZeroOrMore | Modifier::OneOrMore)
    }
}

/// Identifies a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Named(String),
    /// Bare `(...)` groups, numbered from 0 in order of appearance.
    Unnamed(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Named(name) => write!(f, ":{}", name),
            Key::Unnamed(index) => write!(f, "#{}", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub key: Key,
    pub prefix: String,
    pub suffix: String,
    /// Regex source the captured text must match.
    pub pattern: String,
    pub modifier: Modifier,
}

impl Param {
    pub fn name(&self) -> Option<&str> {
        match &self.key {
            Key::Named(name) => Some(name),
            Key::Unnamed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Param(Param),
    /// A `{...}` group holding only literal text.
    Group { text: String, modifier: Modifier },
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    tokens: Vec<Token>,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let tokens = Parser::new(lex(source)?).parse()?;

        let mut seen = HashSet::new();
        for token in &tokens {
            if let Token::Param(param) = token {
                if let Some(name) = param.name() {
                    if !seen.insert(name) {
                        return Err(PatternError::DuplicateName(name.to_string()));
                    }
                }
            }
        }

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Parameters in order of appearance, named and unnamed.
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Param(p) => Some(p),
            _ => None,
        })
    }

    /// Looks up a named parameter.
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params().find(|p| p.name() == Some(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexKind {
    Open,
    Close,
    Pattern,
    Name,
    Char,
    EscapedChar,
    Modifier,
    End,
}

impl LexKind {
    fn describe(self) -> &'static str {
        match self {
            LexKind::Open => "'{'",
            LexKind::Close => "'}'",
            LexKind::Pattern => "group",
            LexKind::Name => "name",
            LexKind::Char => "character",
            LexKind::EscapedChar => "escaped character",
            LexKind::Modifier => "modifier",
            LexKind::End => "end of pattern",
        }
    }
}

#[derive(Debug)]
struct Lexeme {
    kind: LexKind,
    index: usize,
    value: String,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn lex(source: &str) -> Result<Vec<Lexeme>, PatternError> {
    let chars: Vec<char> = source.chars().collect();
    let mut lexemes = Vec::new();
    let mut i = 0;

    let single = |kind, index, c: char| Lexeme {
        kind,
        index,
        value: c.to_string(),
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' | '+' | '?' => {
                lexemes.push(single(LexKind::Modifier, i, c));
                i += 1;
            }
            '\\' => {
                let escaped = *chars.get(i + 1).ok_or(PatternError::DanglingEscape(i))?;
                lexemes.push(single(LexKind::EscapedChar, i, escaped));
                i += 2;
            }
            '{' => {
                lexemes.push(single(LexKind::Open, i, c));
                i += 1;
            }
            '}' => {
                lexemes.push(single(LexKind::Close, i, c));
                i += 1;
            }
            ':' => {
                let name: String = chars[i + 1..]
                    .iter()
                    .take_while(|c| is_name_char(**c))
                    .collect();
                if name.is_empty() {
                    return Err(PatternError::MissingName(i));
                }
                let len = name.chars().count();
                lexemes.push(Lexeme {
                    kind: LexKind::Name,
                    index: i,
                    value: name,
                });
                i += 1 + len;
            }
            '(' => {
                let (pattern, end) = lex_group(&chars, i)?;
                lexemes.push(Lexeme {
                    kind: LexKind::Pattern,
                    index: i,
                    value: pattern,
                });
                i = end;
            }
            _ => {
                lexemes.push(single(LexKind::Char, i, c));
                i += 1;
            }
        }
    }

    lexemes.push(Lexeme {
        kind: LexKind::End,
        index: chars.len(),
        value: String::new(),
    });
    Ok(lexemes)
}

/// Reads a balanced `(...)` group starting at `start`. Returns its inner
/// text and the index just past the closing paren.
fn lex_group(chars: &[char], start: usize) -> Result<(String, usize), PatternError> {
    let mut depth = 1;
    let mut pattern = String::new();
    let mut j = start + 1;

    if chars.get(j) == Some(&'?') {
        return Err(PatternError::LeadingQuestionMark(j));
    }

    while j < chars.len() {
        match chars[j] {
            '\\' => {
                pattern.push('\\');
                if let Some(next) = chars.get(j + 1) {
                    pattern.push(*next);
                }
                j += 2;
                continue;
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    j += 1;
                    break;
                }
            }
            '(' => {
                depth += 1;
                if chars.get(j + 1) != Some(&'?') {
                    return Err(PatternError::CapturingGroup(j));
                }
            }
            _ => {}
        }
        pattern.push(chars[j]);
        j += 1;
    }

    if depth != 0 {
        return Err(PatternError::Unbalanced(start));
    }
    if pattern.is_empty() {
        return Err(PatternError::MissingPattern(start));
    }
    Ok((pattern, j))
}

struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
    next_unnamed: usize,
}

impl Parser {
    fn new(lexemes: Vec<Lexeme>) -> Self {
        Self {
            lexemes,
            pos: 0,
            next_unnamed: 0,
        }
    }

    fn try_consume(&mut self, kind: LexKind) -> Option<String> {
        match self.lexemes.get(self.pos) {
            Some(lexeme) if lexeme.kind == kind => {
                self.pos += 1;
                Some(lexeme.value.clone())
            }
            _ => None,
        }
    }

    fn must_consume(&mut self, kind: LexKind) -> Result<String, PatternError> {
        if let Some(value) = self.try_consume(kind) {
            return Ok(value);
        }
        let (found, index) = self
            .lexemes
            .get(self.pos)
            .map(|l| (l.kind.describe(), l.index))
            .unwrap_or((LexKind::End.describe(), 0));
        Err(PatternError::Unexpected {
            found,
            index,
            expected: kind.describe(),
        })
    }

    fn consume_text(&mut self) -> String {
        let mut text = String::new();
        while let Some(value) = self
            .try_consume(LexKind::Char)
            .or_else(|| self.try_consume(LexKind::EscapedChar))
        {
            text.push_str(&value);
        }
        text
    }

    fn modifier(&mut self) -> Modifier {
        self.try_consume(LexKind::Modifier)
            .map(|m| Modifier::from_lexeme(&m))
            .unwrap_or_default()
    }

    fn unnamed_key(&mut self) -> Key {
        let key = Key::Unnamed(self.next_unnamed);
        self.next_unnamed += 1;
        key
    }

    fn parse(mut self) -> Result<Vec<Token>, PatternError> {
        let mut tokens = Vec::new();
        let mut path = String::new();

        fn flush(path: &mut String, tokens: &mut Vec<Token>) {
            if !path.is_empty() {
                tokens.push(Token::Literal(std::mem::take(path)));
            }
        }

        while self.pos < self.lexemes.len() {
            let ch = self.try_consume(LexKind::Char);
            let name = self.try_consume(LexKind::Name);
            let pattern = self.try_consume(LexKind::Pattern);

            if name.is_some() || pattern.is_some() {
                let mut prefix = ch.unwrap_or_default();
                if !prefix.chars().all(|c| PREFIXES.contains(&c)) {
                    path.push_str(&prefix);
                    prefix.clear();
                }
                flush(&mut path, &mut tokens);

                let key = match name {
                    Some(name) => Key::Named(name),
                    None => self.unnamed_key(),
                };
                let modifier = self.modifier();
                tokens.push(Token::Param(Param {
                    key,
                    prefix,
                    suffix: String::new(),
                    pattern: pattern.unwrap_or_else(|| DEFAULT_SEGMENT_PATTERN.to_string()),
                    modifier,
                }));
                continue;
            }

            if let Some(value) = ch.or_else(|| self.try_consume(LexKind::EscapedChar)) {
                path.push_str(&value);
                continue;
            }

            flush(&mut path, &mut tokens);

            if self.try_consume(LexKind::Open).is_some() {
                let prefix = self.consume_text();
                let name = self.try_consume(LexKind::Name);
                let pattern = self.try_consume(LexKind::Pattern);
                let suffix = self.consume_text();
                self.must_consume(LexKind::Close)?;
                let modifier = self.modifier();

                let token = match (name, pattern) {
                    (Some(name), pattern) => Token::Param(Param {
                        key: Key::Named(name),
                        prefix,
                        suffix,
                        pattern: pattern.unwrap_or_else(|| DEFAULT_SEGMENT_PATTERN.to_string()),
                        modifier,
                    }),
                    (None, Some(pattern)) => Token::Param(Param {
                        key: self.unnamed_key(),
                        prefix,
                        suffix,
                        pattern,
                        modifier,
                    }),
                    (None, None) => Token::Group {
                        text: format!("{}{}", prefix, suffix),
                        modifier,
                    },
                };
                tokens.push(token);
                continue;
            }

            self.must_consume(LexKind::End)?;
        }

        Ok(tokens)
    }
}
