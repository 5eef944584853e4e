use std::collections::BTreeMap;

use thiserror::Error;

/// A single value in an [`Options`] dictionary.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// An opaque key-value dictionary passed through to a backend.
///
/// The solver does not interpret these entries. Each backend parses the
/// keys it understands into a typed config and rejects the rest.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Options(BTreeMap<String, OptionValue>);

/// Errors that can occur when a backend reads an [`Options`] dictionary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptionsError {
    #[error("unknown option '{key}'")]
    Unknown { key: String },

    #[error("option '{key}' expects {expected}, got {value:?}")]
    Type {
        key: String,
        expected: &'static str,
        value: OptionValue,
    },

    #[error("option '{key}' is invalid: {reason}")]
    Invalid { key: String, reason: String },
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any previous value for `key`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fails on the first key not listed in `known`.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Unknown`] for an unrecognized key.
    pub fn check_keys(&self, known: &[&str]) -> Result<(), OptionsError> {
        match self.0.keys().find(|key| !known.contains(&key.as_str())) {
            Some(key) => Err(OptionsError::Unknown { key: key.clone() }),
            None => Ok(()),
        }
    }

    /// Reads a boolean entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but is not a boolean.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, OptionsError> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(type_error(key, "a boolean", other)),
        }
    }

    /// Reads a real entry, accepting integers.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but is not numeric.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, OptionsError> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Float(v)) => Ok(Some(*v)),
            Some(OptionValue::Int(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(type_error(key, "a number", other)),
        }
    }

    /// Reads a non-negative integer entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but is not a non-negative integer.
    pub fn get_usize(&self, key: &str) -> Result<Option<usize>, OptionsError> {
        match self.get(key) {
            None => Ok(None),
            Some(value @ OptionValue::Int(v)) => usize::try_from(*v)
                .map(Some)
                .map_err(|_| type_error(key, "a non-negative integer", value)),
            Some(other) => Err(type_error(key, "a non-negative integer", other)),
        }
    }

    /// Reads a text entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but is not text.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>, OptionsError> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Text(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(type_error(key, "text", other)),
        }
    }
}

fn type_error(key: &str, expected: &'static str, value: &OptionValue) -> OptionsError {
    OptionsError::Type {
        key: key.to_owned(),
        expected,
        value: value.clone(),
    }
}
