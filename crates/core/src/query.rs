//! Acquisition criteria.
//!
//! Clients send a list of conditions (`id`, `logicalType`, `value`). The job
//! layer only cares about the criteria map: condition id -> value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{DomainError, DomainResult};

/// A single search condition as supplied by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub id: String,
    #[serde(default)]
    pub logical_type: Option<String>,
    pub value: JsonValue,
}

/// Immutable criteria of one acquisition, keyed by condition id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryCriteria(BTreeMap<String, JsonValue>);

impl QueryCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Fold client conditions into criteria.
    ///
    /// Condition ids must be non-empty and unique.
    pub fn from_conditions(conditions: Vec<Condition>) -> DomainResult<Self> {
        let mut map = BTreeMap::new();
        for condition in conditions {
            let id = condition.id.trim();
            if id.is_empty() {
                return Err(DomainError::validation("condition id must not be empty"));
            }
            if map.insert(id.to_string(), condition.value).is_some() {
                return Err(DomainError::validation(format!("duplicate condition id: {id}")));
            }
        }
        Ok(Self(map))
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
