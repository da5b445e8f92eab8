//! Untyped request parameters with typed accessors.
//!
//! Hosts hand over query-string style key/value pairs. Each accessor parses
//! on demand and turns a type mismatch into an input error that names the
//! parameter, so callers never see a bare parse failure.

use std::collections::BTreeMap;
use std::str::FromStr;

use url::form_urlencoded;

use crate::error::TileError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    /// Parse an `application/x-www-form-urlencoded` query string. A leading
    /// `?` is ignored and later duplicates win.
    pub fn parse_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Insert every pair of `other`, replacing existing keys.
    pub fn extend(&mut self, other: Params) {
        self.values.extend(other.values);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, TileError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| incorrect_type(key)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>, TileError> {
        self.parse::<i64>(key)
    }

    /// Non-negative integer that fits in u32.
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, TileError> {
        self.parse::<u32>(key)
    }

    pub fn get_float(&self, key: &str) -> Result<Option<f64>, TileError> {
        match self.parse::<f64>(key)? {
            Some(v) if !v.is_finite() => Err(incorrect_type(key)),
            other => Ok(other),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, TileError> {
        match self.values.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(None),
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(incorrect_type(key)),
            },
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

fn incorrect_type(key: &str) -> TileError {
    TileError::input(format!("The {} parameter is an incorrect type.", key))
}
