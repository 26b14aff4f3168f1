//! LDAP-style filters over resource properties.
//!
//! Supported syntax:
//!
//! ```text
//! (&(a=1)(b=2))   conjunction
//! (|(a=1)(b=2))   disjunction
//! (!(a=1))        negation
//! (a=x)           equality          (a=*)   presence
//! (a=x*y*)        substring         (a~=x)  approximate
//! (a>=3)          greater or equal  (a<=3)  less or equal
//! ```
//!
//! A backslash escapes the next character in a value. Keys match
//! case-insensitively. A multi-valued property matches if any of its values
//! does. Numbers and booleans compare by value.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use serde_json::Value;

use crate::error::{RegistryError, RegistryResult};
use crate::reference::{OBJECT_CLASS, Properties, lookup};

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// All sub-filters match.
    And(Vec<Filter>),
    /// At least one sub-filter matches.
    Or(Vec<Filter>),
    /// The sub-filter does not match.
    Not(Box<Filter>),
    /// The property is present.
    Present(String),
    /// The property equals a value.
    Equals(String, String),
    /// The property approximately equals a value, ignoring case and whitespace.
    Approx(String, String),
    /// The property is greater than or equal to a value.
    GreaterEq(String, String),
    /// The property is less than or equal to a value.
    LessEq(String, String),
    /// The property matches a wildcard pattern. Parts sit between the `*`s.
    Substring(String, Vec<String>),
}

impl Filter {
    /// Parse a filter string.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidFilter`] if the text is not a filter.
    pub fn parse(text: &str) -> RegistryResult<Self> {
        let mut parser = Parser {
            chars: text.chars().peekable(),
        };
        parser
            .parse_root()
            .map_err(|reason| RegistryError::InvalidFilter {
                filter: text.to_string(),
                reason,
            })
    }

    /// Matches resources published under `type_name`.
    #[must_use]
    pub fn object_class(type_name: impl Into<String>) -> Self {
        Self::Equals(OBJECT_CLASS.to_string(), type_name.into())
    }

    /// Matches resources published under `type_name` that also satisfy `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidFilter`] if `query` does not parse.
    pub fn for_type(type_name: impl Into<String>, query: Option<&str>) -> RegistryResult<Self> {
        let base = Self::object_class(type_name);
        match query {
            Some(query) => Ok(base.and(Self::parse(query)?)),
            None => Ok(base),
        }
    }

    /// Combine two filters with AND, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Self::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Self::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        Self::And(parts)
    }

    /// Evaluate the filter against a property map.
    #[must_use]
    pub fn matches(&self, properties: &Properties) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|f| f.matches(properties)),
            Self::Or(parts) => parts.iter().any(|f| f.matches(properties)),
            Self::Not(inner) => !inner.matches(properties),
            Self::Present(key) => lookup(properties, key).is_some_and(|v| !v.is_null()),
            Self::Equals(key, expected) => compare(properties, key, expected, Op::Eq),
            Self::Approx(key, expected) => compare(properties, key, expected, Op::Approx),
            Self::GreaterEq(key, expected) => compare(properties, key, expected, Op::Ge),
            Self::LessEq(key, expected) => compare(properties, key, expected, Op::Le),
            Self::Substring(key, parts) => lookup(properties, key)
                .is_some_and(|v| any_string(v, &|s| substring_matches(s, parts))),
        }
    }
}

impl FromStr for Filter {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(parts) => write_list(f, '&', parts),
            Self::Or(parts) => write_list(f, '|', parts),
            Self::Not(inner) => write!(f, "(!{inner})"),
            Self::Present(key) => write!(f, "({key}=*)"),
            Self::Equals(key, value) => write!(f, "({key}={})", escape(value)),
            Self::Approx(key, value) => write!(f, "({key}~={})", escape(value)),
            Self::GreaterEq(key, value) => write!(f, "({key}>={})", escape(value)),
            Self::LessEq(key, value) => write!(f, "({key}<={})", escape(value)),
            Self::Substring(key, parts) => {
                let pattern: Vec<String> = parts.iter().map(|p| escape(p)).collect();
                write!(f, "({key}={})", pattern.join("*"))
            },
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, op: char, parts: &[Filter]) -> fmt::Result {
    write!(f, "({op}")?;
    for part in parts {
        write!(f, "{part}")?;
    }
    write!(f, ")")
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Clone, Copy)]
enum Op {
    Eq,
    Approx,
    Ge,
    Le,
}

impl Op {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq | Self::Approx => ordering == Ordering::Equal,
            Self::Ge => ordering != Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

fn compare(properties: &Properties, key: &str, expected: &str, op: Op) -> bool {
    lookup(properties, key).is_some_and(|actual| compare_value(actual, expected, op))
}

fn compare_value(actual: &Value, expected: &str, op: Op) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| compare_value(item, expected, op)),
        Value::String(s) => match op {
            Op::Approx => normalize(s) == normalize(expected),
            _ => op.accepts(s.as_str().cmp(expected)),
        },
        Value::Number(n) => {
            let expected = expected.trim();
            if let (Some(a), Ok(b)) = (n.as_i64(), expected.parse::<i64>()) {
                op.accepts(a.cmp(&b))
            } else if let (Some(a), Ok(b)) = (n.as_f64(), expected.parse::<f64>()) {
                a.partial_cmp(&b).is_some_and(|o| op.accepts(o))
            } else {
                false
            }
        },
        Value::Bool(b) => {
            matches!(op, Op::Eq | Op::Approx)
                && expected
                    .trim()
                    .parse::<bool>()
                    .or_else(|_| expected.trim().to_ascii_lowercase().parse::<bool>())
                    .is_ok_and(|e| e == *b)
        },
        Value::Null | Value::Object(_) => false,
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn any_string(value: &Value, check: &dyn Fn(&str) -> bool) -> bool {
    match value {
        Value::String(s) => check(s),
        Value::Array(items) => items.iter().any(|item| any_string(item, check)),
        _ => false,
    }
}

fn substring_matches(s: &str, parts: &[String]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return false;
    };
    let Some(mut remaining) = s.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for part in middle {
        match remaining.split_once(part.as_str()) {
            Some((_, after)) => remaining = after,
            None => return false,
        }
    }
    remaining.ends_with(last.as_str())
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn parse_root(&mut self) -> Result<Filter, String> {
        let filter = self.parse_filter()?;
        self.skip_whitespace();
        match self.chars.next() {
            None => Ok(filter),
            Some(c) => Err(format!("unexpected '{c}' after filter")),
        }
    }

    fn parse_filter(&mut self) -> Result<Filter, String> {
        self.skip_whitespace();
        self.expect('(')?;
        self.skip_whitespace();
        let filter = match self.chars.peek() {
            Some('&') => {
                self.chars.next();
                Filter::And(self.parse_list()?)
            },
            Some('|') => {
                self.chars.next();
                Filter::Or(self.parse_list()?)
            },
            Some('!') => {
                self.chars.next();
                Filter::Not(Box::new(self.parse_filter()?))
            },
            Some(_) => self.parse_item()?,
            None => return Err("unexpected end of filter".to_string()),
        };
        self.skip_whitespace();
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_list(&mut self) -> Result<Vec<Filter>, String> {
        let mut parts = Vec::new();
        self.skip_whitespace();
        while self.chars.peek() == Some(&'(') {
            parts.push(self.parse_filter()?);
            self.skip_whitespace();
        }
        if parts.is_empty() {
            return Err("empty filter list".to_string());
        }
        Ok(parts)
    }

    fn parse_item(&mut self) -> Result<Filter, String> {
        let mut key = String::new();
        while let Some(&c) = self.chars.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            key.push(c);
            self.chars.next();
        }
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err("missing attribute name".to_string());
        }

        let op = match self.chars.next() {
            Some('=') => '=',
            Some(c @ ('~' | '<' | '>')) => {
                self.expect('=')?;
                c
            },
            Some(c) => return Err(format!("unexpected '{c}' after attribute '{key}'")),
            None => return Err("unexpected end of filter".to_string()),
        };

        let segments = self.parse_value()?;
        match (op, segments.as_slice()) {
            ('=', [a, b]) if a.is_empty() && b.is_empty() => Ok(Filter::Present(key)),
            ('=', [single]) => Ok(Filter::Equals(key, single.clone())),
            ('=', parts) => Ok(Filter::Substring(key, parts.to_vec())),
            (_, [single]) => Ok(match op {
                '~' => Filter::Approx(key, single.clone()),
                '>' => Filter::GreaterEq(key, single.clone()),
                _ => Filter::LessEq(key, single.clone()),
            }),
            _ => Err(format!("wildcard not allowed with '{op}=' on '{key}'")),
        }
    }

    /// Read a value up to the closing parenthesis, split at unescaped `*`.
    fn parse_value(&mut self) -> Result<Vec<String>, String> {
        let mut segments = vec![String::new()];
        loop {
            match self.chars.peek() {
                None => return Err("unterminated value".to_string()),
                Some(')') => return Ok(segments),
                Some('(') => return Err("unescaped '(' in value".to_string()),
                Some(_) => {},
            }
            match self.chars.next() {
                Some('*') => segments.push(String::new()),
                Some('\\') => {
                    let escaped = self
                        .chars
                        .next()
                        .ok_or_else(|| "dangling escape".to_string())?;
                    push_char(&mut segments, escaped);
                },
                Some(c) => push_char(&mut segments, c),
                None => return Err("unterminated value".to_string()),
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        match self.chars.next() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(format!("expected '{expected}', found '{c}'")),
            None => Err(format!("expected '{expected}', found end of filter")),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }
}

fn push_char(segments: &mut [String], c: char) {
    if let Some(last) = segments.last_mut() {
        last.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::properties;

    fn props() -> Properties {
        properties([
            ("name", Value::from("Primary Store")),
            ("port", Value::from(8080)),
            ("weight", Value::from(0.5)),
            ("secure", Value::from(true)),
            ("tags", Value::from(["fast", "local"].as_slice())),
            (OBJECT_CLASS, Value::from(["Store", "Cache"].as_slice())),
        ])
    }

    #[test]
    fn test_parse_equality() {
        let f = Filter::parse("(name=Primary Store)").unwrap();
        assert_eq!(f, Filter::Equals("name".into(), "Primary Store".into()));
        assert!(f.matches(&props()));
    }

    #[test]
    fn test_parse_composites() {
        let f = Filter::parse("(&(port>=8000)(|(tags=slow)(tags=local))(!(secure=false)))").unwrap();
        assert!(f.matches(&props()));

        let f = Filter::parse("(&(port<=8000)(secure=true))").unwrap();
        assert!(!f.matches(&props()));
    }

    #[test]
    fn test_presence_and_substring() {
        assert!(Filter::parse("(port=*)").unwrap().matches(&props()));
        assert!(!Filter::parse("(missing=*)").unwrap().matches(&props()));
        assert!(Filter::parse("(name=Prim*Sto*)").unwrap().matches(&props()));
        assert!(Filter::parse("(name=*Store)").unwrap().matches(&props()));
        assert!(!Filter::parse("(name=*Cache*)").unwrap().matches(&props()));
    }

    #[test]
    fn test_approx_and_case_insensitive_keys() {
        assert!(Filter::parse("(NAME~=primarystore)").unwrap().matches(&props()));
        assert!(Filter::parse("(Secure=TRUE)").unwrap().matches(&props()));
    }

    #[test]
    fn test_numeric_comparison() {
        assert!(Filter::parse("(weight<=0.75)").unwrap().matches(&props()));
        assert!(Filter::parse("(port=8080)").unwrap().matches(&props()));
        assert!(!Filter::parse("(port=80)").unwrap().matches(&props()));
    }

    #[test]
    fn test_multi_valued_object_class() {
        assert!(Filter::object_class("Cache").matches(&props()));
        assert!(!Filter::object_class("Queue").matches(&props()));
    }

    #[test]
    fn test_for_type_combines_query() {
        let f = Filter::for_type("Store", Some("(port=8080)")).unwrap();
        assert_eq!(f.to_string(), "(&(objectClass=Store)(port=8080))");
        assert!(f.matches(&props()));

        let bare = Filter::for_type("Store", None).unwrap();
        assert_eq!(bare, Filter::object_class("Store"));
    }

    #[test]
    fn test_display_round_trips_escapes() {
        let f = Filter::parse(r"(path=a\*b*c)").unwrap();
        assert_eq!(
            f,
            Filter::Substring("path".into(), vec!["a*b".into(), "c".into()])
        );
        assert_eq!(Filter::parse(&f.to_string()).unwrap(), f);
    }

    #[test]
    fn test_invalid_filters() {
        for text in ["", "name=x", "(name=x", "(&)", "(=x)", "(a=b))", "(a>=*x)", "(a=(b)"] {
            let err = Filter::parse(text).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidFilter { .. }),
                "expected invalid filter for {text:?}"
            );
        }
    }
}
