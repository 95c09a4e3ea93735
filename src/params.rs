//! Parameter binding and substitution.
//!
//! Bound values are written into the SQL text as literals before parsing.
//! String values are stripped of characters and keywords that could change
//! the statement's structure, then quoted.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::types::Value;

/// Fragments removed from bound strings, matched case-insensitively.
const DENYLIST_PATTERN: &str = r"(?i)\?|\(|\)|@|#|union|where|rename";

fn denylist() -> &'static Regex {
    static DENYLIST: OnceLock<Regex> = OnceLock::new();
    DENYLIST.get_or_init(|| Regex::new(DENYLIST_PATTERN).expect("denylist pattern is valid"))
}

/// Placeholder a value is bound to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamKey {
    /// `?` placeholder, numbered from 1 left to right.
    Position(usize),
    /// `:name` placeholder.
    Name(String),
}

impl From<usize> for ParamKey {
    fn from(position: usize) -> Self {
        Self::Position(position)
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        Self::Name(name.trim_start_matches(':').to_string())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

/// Values bound to a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<ParamKey, Value>,
}

impl Params {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` to `key`, replacing any earlier binding.
    pub fn bind(&mut self, key: impl Into<ParamKey>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the value bound to `key`.
    pub fn get(&self, key: &ParamKey) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Positional values in placeholder order.
    fn positional(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().filter_map(|(key, value)| match key {
            ParamKey::Position(_) => Some(value),
            ParamKey::Name(_) => None,
        })
    }
}

/// Removes denylisted fragments until none remain.
///
/// Repeating matters: stripping `where` from `uniwhereon` would otherwise
/// leave `union` behind.
pub fn sanitize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = denylist().replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Renders a bound value as an SQL literal.
pub fn to_sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => format!("'{}'", sanitize(s).replace('\'', "''")),
    }
}

/// Writes bound values into `sql`.
///
/// `?` placeholders take positional values in order; `:name` placeholders
/// take the named value. Placeholders inside quoted literals, unbound
/// placeholders and `::` casts are left untouched.
pub fn substitute(sql: &str, params: &Params) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut positional = params.positional();
    let mut chars = sql.char_indices().peekable();
    let mut in_quote = false;
    let mut prev: Option<char> = None;

    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            in_quote = !in_quote;
            out.push(c);
        } else if in_quote {
            out.push(c);
        } else if c == '?' {
            match positional.next() {
                Some(value) => out.push_str(&to_sql_literal(value)),
                None => out.push(c),
            }
        } else if c == ':'
            && prev != Some(':')
            && chars
                .peek()
                .is_some_and(|(_, n)| n.is_ascii_alphabetic() || *n == '_')
        {
            let start = i + 1;
            let mut end = start;
            while let Some((j, n)) = chars.peek().copied() {
                if n.is_ascii_alphanumeric() || n == '_' {
                    end = j + n.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let name = &sql[start..end];
            match params.get(&ParamKey::Name(name.to_string())) {
                Some(value) => out.push_str(&to_sql_literal(value)),
                None => {
                    out.push(':');
                    out.push_str(name);
                }
            }
            prev = name.chars().last();
            continue;
        } else {
            out.push(c);
        }
        prev = Some(c);
    }

    out
}

/// Splits a script into statements on `;` outside quoted literals.
///
/// Statements are trimmed and empty ones dropped.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in sql.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ';') => {
                statements.push(&sql[start..i]);
                start = i + 1;
            }
            (None, _) => {}
        }
    }
    statements.push(&sql[start..]);

    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
