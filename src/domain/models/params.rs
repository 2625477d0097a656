//! The provider-agnostic parameter map shared by mission fixed-config and item
//! input-params.
//!
//! Re-architecture note: the source represents these as untyped dicts. Here they are a
//! tagged map over a small value ADT; the core never introspects individual values beyond
//! merging and (de)serializing them, so the ADT only needs enough shape to round-trip
//! through JSON and SQLite.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single parameter value: a string, a number, or a boolean. A URL or opaque
/// provider handle (e.g. an uploaded-media reference) is just a `String` — both
/// decode from a bare JSON string, and the core only ever reads either through
/// [`Self::as_str`], so a separate `Url` variant bought no type safety and, under
/// `#[serde(untagged)]`, could never round-trip (it always shadowed `String` on
/// decode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A free-form string, URL, or opaque provider handle.
    String(String),
    /// A numeric value (durations, aspect-ratio components expressed numerically, etc).
    Number(f64),
    /// A boolean flag.
    Bool(bool),
}

impl ParamValue {
    /// Returns the value as a string slice if it is the string variant.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Number(_) | Self::Bool(_) => None,
        }
    }
}

/// A provider-agnostic map of parameter name to value.
///
/// `ParamMap` merges item-level `input_params` over mission-level `fixed_config` at
/// submit time (item wins on key collision); the merge is a pure, associative operation
/// so it's exercised directly by property tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamMap(pub HashMap<String, ParamValue>);

impl ParamMap {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inserts a value, returning the map for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Merges `overrides` on top of `self`, with `overrides` winning key collisions.
    /// Neither input is mutated; a new map is returned.
    #[must_use]
    pub fn merged_with(&self, overrides: &Self) -> Self {
        let mut merged = self.0.clone();
        for (key, value) in &overrides.0 {
            merged.insert(key.clone(), value.clone());
        }
        Self(merged)
    }

    /// Serializes to a JSON string for storage.
    ///
    /// # Errors
    /// Returns an error if the map contains a value `serde_json` cannot encode (not
    /// possible for the current ADT, but the Store never unwraps this).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Deserializes from a JSON string previously produced by [`Self::to_json`].
    ///
    /// # Errors
    /// Returns an error if `s` is not valid JSON or does not decode to the expected
    /// shape.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        if s.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(Self(serde_json::from_str(s)?))
    }
}
