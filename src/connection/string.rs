//! ADO-style `key=value;key=value` connection strings

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use super::keys;
use crate::error::{DbMetaError, Result};

/// Ordered key/value pairs with case-insensitive key lookup
///
/// Keys keep the spelling they were first written with. `Display` and
/// `Debug` mask the password.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    entries: Vec<(String, String)>,
}

impl ConnectionString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` segments separated by `;`
    ///
    /// Values may be quoted with `"` or `'` (a doubled quote escapes it) or
    /// be a parenthesized TNS descriptor. Empty segments are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut rest = text;

        loop {
            rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
            if rest.is_empty() {
                break;
            }

            let key_end = rest.find(['=', ';']).unwrap_or(rest.len());
            if !rest[key_end..].starts_with('=') {
                return Err(DbMetaError::InvalidConnectionString(format!(
                    "segment '{}' has no '='",
                    rest[..key_end].trim()
                )));
            }
            let key = rest[..key_end].trim();
            if key.is_empty() {
                return Err(DbMetaError::InvalidConnectionString(
                    "segment with an empty key".to_string(),
                ));
            }

            let (value, remainder) = parse_value(rest[key_end + 1..].trim_start())?;
            entries.push((key.to_string(), value));
            rest = remainder;
        }

        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    /// Overwrite an existing key in place, or append it
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Append an entry after the existing ones, even if the key is present
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    /// Value of the first alias present
    pub fn get_any(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| self.get(alias))
    }

    /// Write to the first alias present, else insert under the first alias
    pub fn set_any(&mut self, aliases: &[&str], value: impl Into<String>) {
        let key = aliases
            .iter()
            .find(|alias| self.contains_key(alias))
            .or_else(|| aliases.first());
        if let Some(key) = key {
            self.set(key, value);
        }
    }

    pub fn server(&self) -> Option<&str> {
        self.get_any(keys::SERVER)
    }

    pub fn port(&self) -> Result<Option<u16>> {
        self.get_any(keys::PORT)
            .map(|port| {
                port.trim().parse::<u16>().map_err(|_| {
                    DbMetaError::InvalidConnectionString(format!(
                        "port '{}' is not a valid port number",
                        port
                    ))
                })
            })
            .transpose()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.get_any(keys::USER_NAME)
    }

    pub fn set_user_name(&mut self, user_name: impl Into<String>) {
        self.set_any(keys::USER_NAME, user_name);
    }

    pub fn password(&self) -> Option<&str> {
        self.get_any(keys::PASSWORD)
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.set_any(keys::PASSWORD, password);
    }

    pub fn database_name(&self) -> Option<&str> {
        self.get_any(keys::DATABASE_NAME)
    }

    pub fn set_database_name(&mut self, database_name: impl Into<String>) {
        self.set_any(keys::DATABASE_NAME, database_name);
    }

    /// The full string, password included
    pub fn expose(&self) -> String {
        render(self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// The full string with every password alias masked
    pub fn masked(&self) -> String {
        render(self.entries.iter().map(|(k, v)| {
            if keys::PASSWORD.iter().any(|alias| alias.eq_ignore_ascii_case(k)) {
                (k.as_str(), keys::PASSWORD_MASK)
            } else {
                (k.as_str(), v.as_str())
            }
        }))
    }

    fn position(&self, key: &str) -> Option<usize> {
        let key = key.trim();
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

impl FromStr for ConnectionString {
    type Err = DbMetaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionString").field(&self.masked()).finish()
    }
}

/// Returns the value and the text after it
fn parse_value(text: &str) -> Result<(String, &str)> {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, quote @ ('"' | '\''))) => {
            let mut value = String::new();
            let mut iter = text[1..].char_indices().peekable();
            while let Some((i, c)) = iter.next() {
                if c != quote {
                    value.push(c);
                    continue;
                }
                if matches!(iter.peek(), Some((_, next)) if *next == quote) {
                    value.push(quote);
                    iter.next();
                    continue;
                }
                let after = text[1 + i + c.len_utf8()..].trim_start();
                if !after.is_empty() && !after.starts_with(';') {
                    return Err(DbMetaError::InvalidConnectionString(format!(
                        "unexpected text after quoted value: '{}'",
                        after
                    )));
                }
                return Ok((value, after));
            }
            Err(DbMetaError::InvalidConnectionString(format!(
                "unterminated quoted value: {}",
                text
            )))
        }
        Some((_, '(')) => {
            let mut depth = 0usize;
            for (i, c) in text.char_indices() {
                match c {
                    '(' => depth += 1,
                    ')' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            let end = i + 1;
                            let tail_end = text[end..].find(';').map_or(text.len(), |p| end + p);
                            let value = text[..tail_end].trim_end().to_string();
                            return Ok((value, &text[tail_end..]));
                        }
                    }
                    _ => {}
                }
            }
            Err(DbMetaError::InvalidConnectionString(format!(
                "unbalanced parentheses in value: {}",
                text
            )))
        }
        _ => {
            let end = text.find(';').unwrap_or(text.len());
            Ok((text[..end].trim_end().to_string(), &text[end..]))
        }
    }
}

fn render<'a>(entries: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    entries
        .map(|(key, value)| format!("{}={}", key, quote(value)))
        .collect::<Vec<_>>()
        .join(";")
}

fn quote(value: &str) -> Cow<'_, str> {
    if is_descriptor(value) {
        return Cow::Borrowed(value);
    }

    let needs_quotes = value.contains([';', '=', '"', '\''])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if !needs_quotes {
        Cow::Borrowed(value)
    } else if !value.contains('"') {
        Cow::Owned(format!("\"{}\"", value))
    } else if !value.contains('\'') {
        Cow::Owned(format!("'{}'", value))
    } else {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    }
}

/// A balanced `( ... )` value without separators, such as a TNS descriptor
fn is_descriptor(value: &str) -> bool {
    if !value.starts_with('(') || !value.ends_with(')') || value.contains([';', '"', '\'']) {
        return false;
    }
    let mut depth = 0i32;
    for (i, c) in value.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && i + c.len_utf8() < value.len() {
            return false;
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}
