//! Request parameters and their canonical query-string form
//!
//! The canonical string is both what gets signed and what gets sent, so it
//! must be reproducible byte for byte by the server. Parameters therefore
//! keep their insertion order; they are never sorted.

use std::fmt;

/// Value of a single request parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A plain value
    Single(String),
    /// Several values sent as one newline-joined value (e.g. route type filters)
    Multi(Vec<String>),
}

impl ParamValue {
    /// Build a multi-valued parameter from anything displayable
    pub fn multi<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Self::Multi(values.into_iter().map(|v| v.to_string()).collect())
    }

    /// The raw (unencoded) value as it appears in the query string
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            Self::Single(value) => value.clone(),
            Self::Multi(values) => values.join("\n"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

/// Insertion-ordered set of request parameters with unique keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    /// Create an empty parameter set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert a parameter
    ///
    /// An existing key keeps its position and has its value replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Builder-style [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a parameter only when a value is present
    #[must_use]
    pub fn with_opt<V: Into<ParamValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    /// Remove a parameter, returning its value
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Look up a parameter value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether a parameter is present
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Canonical query string for this set, see [`canonicalize`]
    #[must_use]
    pub fn to_query_string(&self) -> String {
        canonicalize(self)
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&canonicalize(self))
    }
}

/// Render a parameter set as `key=value` pairs joined by `&`
///
/// Keys and values are form-urlencoded and emitted in insertion order.
/// Multi-valued parameters become a single pair whose value is the
/// newline-joined list.
#[must_use]
pub fn canonicalize(params: &ParameterSet) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(&value.joined())))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode a string for use in a query string
///
/// Keeps unreserved characters (`A-Z`, `a-z`, `0-9`, `-`, `_`, `.`, `~`),
/// encodes spaces as `+` and everything else as `%XX` per UTF-8 byte.
#[must_use]
pub fn encode(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(char::from(byte));
            },
            b' ' => result.push('+'),
            _ => result.push_str(&format!("%{byte:02X}")),
        }
    }
    result
}
