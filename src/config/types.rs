//! Raw config types matching the JSON page document (`{"pages": {...}}`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Explicit field kind. Optional in the document; when present it must agree
/// with the populated `choices` / `wq:ForeignKey` keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKindName {
    Plain,
    Choice,
    ForeignKey,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChoiceEntry {
    pub name: String,
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKindName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<ChoiceEntry>>,
    #[serde(
        default,
        rename = "wq:ForeignKey",
        alias = "foreignKey",
        skip_serializing_if = "Option::is_none"
    )]
    pub foreign_key: Option<String>,
    /// Filter spec: key -> scalar or array of scalars. String values containing `{{` are templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<BindConfig>,
    #[serde(default, rename = "wq:length", skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

/// One entry under `pages`. Entries with `list: true` are model-backed entity types.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub list: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postsave: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form: Vec<FieldEntry>,
}

/// Whole configuration document for in-memory loading.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub pages: BTreeMap<String, PageEntry>,
}
