//! Result payload of a completed acquisition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An item returned by the external system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub type_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, JsonValue>,
}

impl Entity {
    pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Direction of a link between two entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkDirection {
    Both,
    #[default]
    None,
}

/// A relationship between two returned entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub type_id: String,
    pub from_end_id: String,
    pub to_end_id: String,
    #[serde(default)]
    pub link_direction: LinkDirection,
    #[serde(default)]
    pub properties: BTreeMap<String, JsonValue>,
}

/// Entities and links produced by one acquisition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl QueryResult {
    pub fn new(entities: Vec<Entity>, links: Vec<Link>) -> Self {
        Self { entities, links }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn link_uses_wire_field_names() {
        let link: Link = serde_json::from_value(json!({
            "id": "l1",
            "typeId": "LAC1",
            "fromEndId": "e1",
            "toEndId": "e2",
            "linkDirection": "BOTH"
        }))
        .unwrap();
        assert_eq!(link.link_direction, LinkDirection::Both);
        assert!(link.properties.is_empty());
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let result: QueryResult = serde_json::from_value(json!({})).unwrap();
        assert!(result.is_empty());
    }
}
