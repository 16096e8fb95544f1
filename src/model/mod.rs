//! Domain entities: [`Model`], [`Field`], [`Index`], [`Trigger`], [`Preset`].
//!
//! These are the typed sum types the Design Notes in spec.md §9 call for in
//! place of walking untyped JSON: a caller's schema catalogue deserializes
//! directly into `Vec<Model>` via `serde`, matching how pgorm's own
//! configuration types (`monitor::config`, `pg_client::config`) are plain
//! `serde`-derived structs.

pub mod registry;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

pub use registry::Registry;

/// One of the seven fields every model implicitly owns.
pub const SYSTEM_FIELD_SLUGS: [&str; 7] = [
    "id",
    "ronin.locked",
    "ronin.createdAt",
    "ronin.createdBy",
    "ronin.updatedAt",
    "ronin.updatedBy",
    "ronin",
];

/// The singleton meta-table that persists user model definitions.
pub const RONIN_SCHEMA_SLUG: &str = "ronin_schema";
pub const RONIN_SCHEMA_TABLE: &str = "ronin_schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Blob,
    Json,
    Link,
}

impl FieldType {
    /// SQLite storage-class mapping used by the DDL compiler.
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldType::String | FieldType::Json | FieldType::Link => "TEXT",
            FieldType::Number => "INTEGER",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Date => "DATETIME",
            FieldType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkKind {
    One,
    Many,
}

impl Default for LinkKind {
    fn default() -> Self {
        LinkKind::One
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkActions {
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputedKind {
    #[serde(rename = "STORED")]
    Stored,
    #[serde(rename = "VIRTUAL")]
    Virtual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedAs {
    pub kind: ComputedKind,
    pub value: String,
}

/// A field descriptor on a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub slug: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub check: Option<String>,
    #[serde(default)]
    pub collation: Option<String>,
    #[serde(default)]
    pub increment: bool,
    #[serde(default)]
    pub default_value: Option<Json>,
    #[serde(default)]
    pub computed_as: Option<ComputedAs>,
    /// Only meaningful when `field_type == FieldType::Link`: the target
    /// model's slug.
    #[serde(default)]
    pub target: Option<String>,
    /// Only meaningful when `field_type == FieldType::Link`.
    #[serde(default)]
    pub kind: LinkKind,
    /// Only meaningful when `field_type == FieldType::Link`.
    #[serde(default)]
    pub actions: LinkActions,
}

impl Field {
    pub fn system(slug: &str, field_type: FieldType) -> Self {
        Field {
            slug: slug.to_string(),
            field_type,
            required: false,
            unique: false,
            check: None,
            collation: None,
            increment: false,
            default_value: None,
            computed_as: None,
            target: None,
            kind: LinkKind::One,
            actions: LinkActions::default(),
        }
    }

    pub fn is_link_many(&self) -> bool {
        matches!(self.field_type, FieldType::Link) && matches!(self.kind, LinkKind::Many)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexField {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub order: Option<SortOrder>,
    #[serde(default)]
    pub collation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub slug: String,
    pub fields: Vec<IndexField>,
    #[serde(default)]
    pub filter: Option<Json>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerWhen {
    #[serde(rename = "BEFORE")]
    Before,
    #[serde(rename = "AFTER")]
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerAction {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerFieldRef {
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub slug: String,
    pub when: TriggerWhen,
    pub action: TriggerAction,
    #[serde(default)]
    pub fields: Option<Vec<TriggerFieldRef>>,
    pub effects: Vec<Json>,
    #[serde(default)]
    pub filter: Option<Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub slug: String,
    pub instructions: Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identifiers {
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// The user-visible schema for a kind of record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub slug: String,
    pub plural_slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub plural_name: Option<String>,
    #[serde(default)]
    pub id_prefix: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub identifiers: Identifiers,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub presets: Vec<Preset>,
}

impl Model {
    /// Ordered mapping of field-slug -> field descriptor, the shape spec.md
    /// §3.1 describes (`fields` as an "ordered mapping").
    pub fn field_map(&self) -> BTreeMap<&str, &Field> {
        self.fields.iter().map(|f| (f.slug.as_str(), f)).collect()
    }

    pub fn find_field(&self, slug: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.slug == slug)
    }

    pub fn find_index(&self, slug: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.slug == slug)
    }

    pub fn find_trigger(&self, slug: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.slug == slug)
    }

    pub fn find_preset(&self, slug: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.slug == slug)
    }
}
