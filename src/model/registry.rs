//! Schema Registry (C3).
//!
//! Owns an augmented, mutable clone of the caller's model list for the
//! lifetime of one [`crate::transaction::Transaction`] — mirroring pgorm's
//! `Table` builder, which validates and normalizes a table name once before
//! every downstream builder call reuses it.

use heck::ToSnakeCase;

use super::{
    Field, FieldType, Identifiers, Index, Model, Preset, SYSTEM_FIELD_SLUGS, Trigger,
};
use crate::error::{CompileError, CompileResult};
use crate::ident::Ident;

/// The effective SQL selector for a resolved field path, plus the field
/// descriptor when the path addresses a modeled field directly (as opposed
/// to an arbitrary nested JSON sub-property).
#[derive(Debug, Clone)]
pub struct FieldSelector {
    pub sql: String,
    pub field: Option<Field>,
}

/// Owns the augmented model list for one transaction.
#[derive(Debug, Clone)]
pub struct Registry {
    models: Vec<Model>,
}

fn system_fields() -> Vec<Field> {
    vec![
        {
            let mut f = Field::system("id", FieldType::String);
            f.required = true;
            f.unique = true;
            f
        },
        {
            let mut f = Field::system("ronin.locked", FieldType::Boolean);
            f.default_value = Some(serde_json::json!(false));
            f
        },
        {
            let mut f = Field::system("ronin.createdAt", FieldType::Date);
            f.required = true;
            f
        },
        Field::system("ronin.createdBy", FieldType::String),
        {
            let mut f = Field::system("ronin.updatedAt", FieldType::Date);
            f.required = true;
            f
        },
        Field::system("ronin.updatedBy", FieldType::String),
        // Synthetic grouping marker, never materialized as a column; lets
        // the result formatter (C8) recognize "ronin" as a nested group
        // prefix. See SYSTEM_FIELD_SLUGS.
        Field::system("ronin", FieldType::Json),
    ]
}

/// Slugs of the physical (materialized) system columns, i.e. all
/// `SYSTEM_FIELD_SLUGS` except the synthetic `ronin` group marker.
pub fn physical_system_field_slugs() -> impl Iterator<Item = &'static str> {
    SYSTEM_FIELD_SLUGS.iter().copied().filter(|s| *s != "ronin")
}

fn default_table_name(model: &Model) -> String {
    model.plural_slug.to_snake_case()
}

fn default_id_prefix(model: &Model) -> String {
    let lower = model.slug.to_lowercase();
    lower.chars().take(3).collect()
}

fn default_identifiers(model: &Model) -> Identifiers {
    let name = model
        .fields
        .iter()
        .find(|f| f.slug == "name" && f.required && matches!(f.field_type, FieldType::String))
        .map(|f| f.slug.clone())
        .unwrap_or_else(|| "id".to_string());

    let slug = model
        .fields
        .iter()
        .find(|f| {
            (f.slug == "slug" || f.slug == "handle")
                && f.required
                && f.unique
                && matches!(f.field_type, FieldType::String)
        })
        .map(|f| f.slug.clone())
        .unwrap_or_else(|| "id".to_string());

    Identifiers {
        name: Some(name),
        slug: Some(slug),
    }
}

/// Augment a single model with system fields, default table name, default
/// id prefix, and default identifiers. Idempotent: augmenting an
/// already-augmented model is a no-op (testable property #1, spec.md §8).
fn augment_model(mut model: Model) -> Model {
    let already_augmented = model
        .fields
        .first()
        .map(|f| f.slug == "id")
        .unwrap_or(false)
        && model.fields.iter().any(|f| f.slug == "ronin.createdAt");

    if !already_augmented {
        let mut fields = system_fields();
        fields.append(&mut model.fields);
        model.fields = fields;
    }

    if model.table.is_none() {
        model.table = Some(default_table_name(&model));
    }
    if model.id_prefix.is_none() {
        model.id_prefix = Some(default_id_prefix(&model));
    }
    if model.identifiers.name.is_none() || model.identifiers.slug.is_none() {
        let defaults = default_identifiers(&model);
        if model.identifiers.name.is_none() {
            model.identifiers.name = defaults.name;
        }
        if model.identifiers.slug.is_none() {
            model.identifiers.slug = defaults.slug;
        }
    }

    model
}

impl Registry {
    /// Augment and take ownership of a caller-supplied model list.
    pub fn new(models: Vec<Model>) -> Self {
        Self {
            models: models.into_iter().map(augment_model).collect(),
        }
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn into_models(self) -> Vec<Model> {
        self.models
    }

    /// Resolve a model by its singular or plural slug.
    ///
    /// The grammatical form of the slug the caller used (`account` vs.
    /// `accounts`) signals single-vs-multiple to the query compiler; the
    /// registry itself is agnostic and just finds the match.
    pub fn find_model(&self, slug_or_plural: &str) -> CompileResult<&Model> {
        self.models
            .iter()
            .find(|m| m.slug == slug_or_plural || m.plural_slug == slug_or_plural)
            .ok_or_else(|| CompileError::ModelNotFound(slug_or_plural.to_string()))
    }

    /// Whether `slug_or_plural` names a model via its plural form (used by
    /// C6 to pick singular-vs-plural compilation strategy).
    pub fn is_plural_reference(&self, model: &Model, slug_or_plural: &str) -> bool {
        slug_or_plural == model.plural_slug && model.slug != model.plural_slug
    }

    pub fn find_model_mut(&mut self, slug_or_plural: &str) -> CompileResult<&mut Model> {
        self.models
            .iter_mut()
            .find(|m| m.slug == slug_or_plural || m.plural_slug == slug_or_plural)
            .ok_or_else(|| CompileError::ModelNotFound(slug_or_plural.to_string()))
    }

    pub fn table_name(&self, model: &Model) -> String {
        model
            .table
            .clone()
            .unwrap_or_else(|| default_table_name(model))
    }

    /// `ronin_link_<modelSlug>_<fieldSlug>` — the associative table backing
    /// a many-cardinality link field.
    pub fn associative_table_name(model: &Model, field_slug: &str) -> String {
        format!("ronin_link_{}_{}", model.slug, field_slug)
    }

    /// Resolve a dotted field path on `model` into its effective SQL
    /// selector, qualified against `table_alias`.
    pub fn get_field(&self, model: &Model, path: &str, table_alias: &str) -> CompileResult<FieldSelector> {
        if let Some(field) = model.find_field(path) {
            let sql = Ident::qualify(table_alias, &field.slug)?.to_sql();
            return Ok(FieldSelector {
                sql,
                field: Some(field.clone()),
            });
        }

        if let Some(dot) = path.find('.') {
            let (head, rest) = (&path[..dot], &path[dot + 1..]);
            if let Some(field) = model.find_field(head) {
                if matches!(field.field_type, FieldType::Json) {
                    let root = Ident::qualify(table_alias, &field.slug)?.to_sql();
                    let json_path = format!("$.{rest}");
                    let sql = format!("json_extract({root}, '{json_path}')");
                    return Ok(FieldSelector { sql, field: None });
                }
            }
        }

        Err(CompileError::FieldNotFound {
            model: model.slug.clone(),
            field: path.to_string(),
        })
    }

    // ==================== In-batch mutation (C7 live updates) ====================

    pub fn add_model(&mut self, model: Model) -> CompileResult<()> {
        if self.models.iter().any(|m| m.slug == model.slug) {
            return Err(CompileError::ExistingModelEntity {
                kind: "model",
                model: model.slug.clone(),
                slug: model.slug,
            });
        }
        self.models.push(augment_model(model));
        Ok(())
    }

    pub fn rename_model(&mut self, old_slug: &str, new_slug: &str) -> CompileResult<()> {
        let model = self.find_model_mut(old_slug)?;
        model.slug = new_slug.to_string();
        Ok(())
    }

    pub fn drop_model(&mut self, slug: &str) -> CompileResult<Model> {
        let idx = self
            .models
            .iter()
            .position(|m| m.slug == slug)
            .ok_or_else(|| CompileError::ModelNotFound(slug.to_string()))?;
        Ok(self.models.remove(idx))
    }

    pub fn add_field(&mut self, model_slug: &str, field: Field) -> CompileResult<()> {
        let model = self.find_model_mut(model_slug)?;
        if model.find_field(&field.slug).is_some() {
            return Err(CompileError::ExistingModelEntity {
                kind: "field",
                model: model_slug.to_string(),
                slug: field.slug,
            });
        }
        model.fields.push(field);
        Ok(())
    }

    pub fn rename_field(&mut self, model_slug: &str, old: &str, new: &str) -> CompileResult<()> {
        let model = self.find_model_mut(model_slug)?;
        let field = model
            .fields
            .iter_mut()
            .find(|f| f.slug == old)
            .ok_or_else(|| CompileError::RequiredModelEntity {
                kind: "field",
                model: model_slug.to_string(),
                slug: old.to_string(),
            })?;
        field.slug = new.to_string();
        Ok(())
    }

    pub fn drop_field(&mut self, model_slug: &str, slug: &str) -> CompileResult<Field> {
        let model = self.find_model_mut(model_slug)?;
        let idx = model
            .fields
            .iter()
            .position(|f| f.slug == slug)
            .ok_or_else(|| CompileError::RequiredModelEntity {
                kind: "field",
                model: model_slug.to_string(),
                slug: slug.to_string(),
            })?;
        Ok(model.fields.remove(idx))
    }

    pub fn add_index(&mut self, model_slug: &str, index: Index) -> CompileResult<()> {
        let model = self.find_model_mut(model_slug)?;
        if model.find_index(&index.slug).is_some() {
            return Err(CompileError::ExistingModelEntity {
                kind: "index",
                model: model_slug.to_string(),
                slug: index.slug,
            });
        }
        model.indexes.push(index);
        Ok(())
    }

    pub fn drop_index(&mut self, model_slug: &str, slug: &str) -> CompileResult<Index> {
        let model = self.find_model_mut(model_slug)?;
        let idx = model
            .indexes
            .iter()
            .position(|i| i.slug == slug)
            .ok_or_else(|| CompileError::IndexNotFound {
                model: model_slug.to_string(),
                index: slug.to_string(),
            })?;
        Ok(model.indexes.remove(idx))
    }

    pub fn add_trigger(&mut self, model_slug: &str, trigger: Trigger) -> CompileResult<()> {
        let model = self.find_model_mut(model_slug)?;
        if model.find_trigger(&trigger.slug).is_some() {
            return Err(CompileError::ExistingModelEntity {
                kind: "trigger",
                model: model_slug.to_string(),
                slug: trigger.slug,
            });
        }
        model.triggers.push(trigger);
        Ok(())
    }

    pub fn drop_trigger(&mut self, model_slug: &str, slug: &str) -> CompileResult<Trigger> {
        let model = self.find_model_mut(model_slug)?;
        let idx = model
            .triggers
            .iter()
            .position(|t| t.slug == slug)
            .ok_or_else(|| CompileError::TriggerNotFound {
                model: model_slug.to_string(),
                trigger: slug.to_string(),
            })?;
        Ok(model.triggers.remove(idx))
    }

    pub fn add_preset(&mut self, model_slug: &str, preset: Preset) -> CompileResult<()> {
        let model = self.find_model_mut(model_slug)?;
        if model.find_preset(&preset.slug).is_some() {
            return Err(CompileError::ExistingModelEntity {
                kind: "preset",
                model: model_slug.to_string(),
                slug: preset.slug,
            });
        }
        model.presets.push(preset);
        Ok(())
    }

    pub fn drop_preset(&mut self, model_slug: &str, slug: &str) -> CompileResult<Preset> {
        let model = self.find_model_mut(model_slug)?;
        let idx = model
            .presets
            .iter()
            .position(|p| p.slug == slug)
            .ok_or_else(|| CompileError::PresetNotFound(slug.to_string()))?;
        Ok(model.presets.remove(idx))
    }
}
