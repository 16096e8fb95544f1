//! Model DDL Compiler (C7).
//!
//! Turns `create`/`alter`/`drop` meta-queries into physical SQLite DDL plus
//! the paired `ronin_schema` maintenance statement, mutating the live
//! [`Registry`] as it goes so later queries in the same transaction see the
//! updated shape (spec.md §5, §9: "the registry must reflect schema changes
//! made earlier in the same batch").
//!
//! Unlike [`crate::compiler`], this module needs a `&mut Registry` — meta
//! queries are processed one at a time, never recursively, so there's no
//! need for the `SubqueryCompiler` indirection C6 uses.

use serde_json::Value as Json;

use crate::compiler::{self, CompileOptions};
use crate::condition::{self, ConditionContext};
use crate::error::{CompileError, CompileResult};
use crate::ident::Ident;
use crate::model::registry::Registry;
use crate::model::{Field, Index, Model, Preset, Trigger, TriggerAction, TriggerWhen, RONIN_SCHEMA_TABLE};
use crate::query::Query;
use crate::statement::Statement;
use crate::value::{Binder, Param};

fn obj(value: &Json) -> CompileResult<&serde_json::Map<String, Json>> {
    value
        .as_object()
        .ok_or_else(|| CompileError::InvalidModelValue("meta-query body must be an object".to_string()))
}

fn require_str<'a>(map: &'a serde_json::Map<String, Json>, key: &str, context: &str) -> CompileResult<&'a str> {
    map.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| CompileError::missing_field(context.to_string(), key.to_string()))
}

fn require_field<'a>(map: &'a serde_json::Map<String, Json>, key: &str, context: &str) -> CompileResult<&'a Json> {
    map.get(key)
        .ok_or_else(|| CompileError::missing_field(context.to_string(), key.to_string()))
}

fn parse_as<T: serde::de::DeserializeOwned>(value: &Json, context: &str) -> CompileResult<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| CompileError::InvalidModelValue(format!("{context}: {e}")))
}

/// Compile a `create`/`alter`/`drop` meta-query, mutating `registry` in
/// place and returning the physical-DDL statements plus the `ronin_schema`
/// maintenance statements that keep the catalogue in sync.
pub fn compile_meta(registry: &mut Registry, query: &Query) -> CompileResult<Vec<Statement>> {
    let statements = match query.kind {
        crate::query::QueryKind::Create => compile_create(registry, &query.target, &query.raw),
        crate::query::QueryKind::Alter => compile_alter(registry, &query.target, &query.raw),
        crate::query::QueryKind::Drop => compile_drop(registry, &query.target, &query.raw),
        other => Err(CompileError::InvalidQueryShape(format!(
            "{other:?} is not a meta query"
        ))),
    }?;
    for statement in &statements {
        crate::telemetry::trace_compiled_statement(query.kind.as_str(), &query.target, &statement.sql);
    }
    Ok(statements)
}

fn schema_upsert_statement(model: &Model) -> Statement {
    let mut binder = Binder::new(false);
    let slug_ph = binder.bind_param(Param::Text(model.slug.clone()));
    let data_ph = binder.bind_param(Param::Text(serde_json::to_string(model).unwrap_or_default()));
    let sql = format!(
        r#"INSERT INTO "{RONIN_SCHEMA_TABLE}" ("slug", "data") VALUES ({slug_ph}, {data_ph}) ON CONFLICT("slug") DO UPDATE SET "data" = excluded."data""#
    );
    Statement::new(sql, binder.into_params(), false)
}

fn schema_delete_statement(slug: &str) -> Statement {
    let mut binder = Binder::new(false);
    let ph = binder.bind_param(Param::Text(slug.to_string()));
    let sql = format!(r#"DELETE FROM "{RONIN_SCHEMA_TABLE}" WHERE "slug" = {ph}"#);
    Statement::new(sql, binder.into_params(), false)
}

fn literal_sql(value: &Json) -> String {
    Param::from(value).to_inline_sql()
}

/// `"<col>" <SQLTYPE> [NOT NULL] [UNIQUE] [DEFAULT <lit>] [CHECK (<expr>)]
/// [REFERENCES ...] [GENERATED ALWAYS AS (<expr>) STORED|VIRTUAL]`.
fn column_def(registry: &Registry, field: &Field) -> CompileResult<String> {
    let ident = Ident::quoted(&field.slug)?.to_sql();
    let mut parts = vec![ident, field.field_type.sql_type().to_string()];

    if let Some(computed) = &field.computed_as {
        let kind = match computed.kind {
            crate::model::ComputedKind::Stored => "STORED",
            crate::model::ComputedKind::Virtual => "VIRTUAL",
        };
        parts.push(format!("GENERATED ALWAYS AS ({}) {kind}", computed.value));
        return Ok(parts.join(" "));
    }

    if field.required {
        parts.push("NOT NULL".to_string());
    }
    if field.unique {
        parts.push("UNIQUE".to_string());
    }
    if let Some(default) = &field.default_value {
        parts.push(format!("DEFAULT {}", literal_sql(default)));
    }
    if let Some(check) = &field.check {
        parts.push(format!("CHECK ({check})"));
    }
    if matches!(field.field_type, crate::model::FieldType::Link) && !field.is_link_many() {
        if let Some(target_slug) = &field.target {
            let target_model = registry.find_model(target_slug)?;
            let target_table = registry.table_name(target_model);
            let mut reference = format!(r#"REFERENCES "{target_table}"("id")"#);
            if let Some(action) = field.actions.on_delete {
                reference.push_str(&format!(" ON DELETE {}", action.as_sql()));
            }
            if let Some(action) = field.actions.on_update {
                reference.push_str(&format!(" ON UPDATE {}", action.as_sql()));
            }
            parts.push(reference);
        }
    }

    Ok(parts.join(" "))
}

fn create_table_sql(registry: &Registry, model: &Model) -> CompileResult<String> {
    let table = registry.table_name(model);
    let mut cols = Vec::new();
    for field in model.fields.iter().filter(|f| !f.is_link_many()) {
        cols.push(column_def(registry, field)?);
    }
    cols.push(r#"PRIMARY KEY ("id")"#.to_string());
    Ok(format!(r#"CREATE TABLE "{table}" ({})"#, cols.join(", ")))
}

/// `ronin_link_<model>_<field>` holds `(source, target)` id pairs for a
/// many-cardinality link field (spec.md §3.2).
fn associative_table_sql(registry: &Registry, model: &Model, field: &Field) -> CompileResult<String> {
    let assoc_table = Registry::associative_table_name(model, &field.slug);
    let own_table = registry.table_name(model);
    let target_slug = field
        .target
        .as_deref()
        .ok_or_else(|| CompileError::InvalidModelValue(format!("link field '{}' has no target", field.slug)))?;
    let target_model = registry.find_model(target_slug)?;
    let target_table = registry.table_name(target_model);

    Ok(format!(
        r#"CREATE TABLE "{assoc_table}" ("source" TEXT NOT NULL REFERENCES "{own_table}"("id") ON DELETE CASCADE, "target" TEXT NOT NULL REFERENCES "{target_table}"("id") ON DELETE CASCADE, PRIMARY KEY ("source", "target"))"#
    ))
}

fn index_field_sql(field: &crate::model::IndexField) -> CompileResult<String> {
    let mut sql = match (&field.slug, &field.expression) {
        (Some(slug), _) => Ident::quoted(slug)?.to_sql(),
        (None, Some(expr)) => format!("({expr})"),
        (None, None) => {
            return Err(CompileError::InvalidModelValue(
                "index field needs a `slug` or `expression`".to_string(),
            ))
        }
    };
    if let Some(collation) = &field.collation {
        sql.push_str(&format!(" COLLATE {collation}"));
    }
    if let Some(order) = field.order {
        sql.push_str(match order {
            crate::model::SortOrder::Asc => " ASC",
            crate::model::SortOrder::Desc => " DESC",
        });
    }
    Ok(sql)
}

fn create_index_sql(registry: &Registry, model: &Model, index: &Index) -> CompileResult<String> {
    let table = registry.table_name(model);
    let name = format!("{}_{}", model.slug, index.slug);
    let cols = index
        .fields
        .iter()
        .map(index_field_sql)
        .collect::<CompileResult<Vec<_>>>()?
        .join(", ");
    let unique = if index.unique { "UNIQUE " } else { "" };
    let mut sql = format!(r#"CREATE {unique}INDEX "{name}" ON "{table}" ({cols})"#);
    if let Some(filter) = &index.filter {
        let mut binder = Binder::new(true);
        let mut engine = compiler::Engine::new(registry, CompileOptions { inline_params: true });
        let ctx = ConditionContext::with(model, registry, &table);
        let filter_sql = condition::compile(&ctx, filter, &mut binder, &mut engine)?;
        sql.push_str(&format!(" WHERE {filter_sql}"));
    }
    Ok(sql)
}

fn trigger_event_clause(trigger: &Trigger) -> String {
    match (trigger.action, &trigger.fields) {
        (TriggerAction::Update, Some(fields)) if !fields.is_empty() => {
            let cols: Vec<String> = fields.iter().map(|f| Ident::quoted(&f.slug).unwrap().to_sql()).collect();
            format!("UPDATE OF {}", cols.join(", "))
        }
        (TriggerAction::Insert, _) => "INSERT".to_string(),
        (TriggerAction::Update, _) => "UPDATE".to_string(),
        (TriggerAction::Delete, _) => "DELETE".to_string(),
    }
}

/// `CREATE TRIGGER "<model>_<slug>" <BEFORE|AFTER> <event> ON "<table>"
/// FOR EACH ROW [WHEN (<filter>)] BEGIN <effect>; ... END`. Effect bodies
/// are themselves queries (`set`/`add`/`remove`), recompiled through the
/// ordinary query compiler in inline-parameter mode since SQLite trigger
/// bodies can't bind `?N` placeholders.
fn create_trigger_sql(registry: &Registry, model: &Model, trigger: &Trigger) -> CompileResult<String> {
    let table = registry.table_name(model);
    let name = format!("{}_{}", model.slug, trigger.slug);
    let when = match trigger.when {
        TriggerWhen::Before => "BEFORE",
        TriggerWhen::After => "AFTER",
    };
    let event = trigger_event_clause(trigger);

    let mut sql = format!(r#"CREATE TRIGGER "{name}" {when} {event} ON "{table}" FOR EACH ROW"#);

    if let Some(filter) = &trigger.filter {
        let mut binder = Binder::new(true);
        let mut engine = compiler::Engine::new(registry, CompileOptions { inline_params: true });
        let ctx = ConditionContext::with(model, registry, &table);
        let filter_sql = condition::compile(&ctx, filter, &mut binder, &mut engine)?;
        sql.push_str(&format!(" WHEN ({filter_sql})"));
    }

    sql.push_str(" BEGIN ");
    for effect in &trigger.effects {
        let effect_query = Query::parse(effect)?;
        let stmt = compiler::compile_query(registry, &effect_query, CompileOptions { inline_params: true })?;
        sql.push_str(&stmt.sql);
        sql.push_str("; ");
    }
    sql.push_str("END");

    Ok(sql)
}

fn compile_create(registry: &mut Registry, target: &str, raw: &Json) -> CompileResult<Vec<Statement>> {
    match target {
        "model" => {
            let model: Model = parse_as(raw, "create.model")?;
            let slug = model.slug.clone();
            registry.add_model(model)?;
            let model = registry.find_model(&slug)?.clone();

            let mut statements = vec![Statement::new(create_table_sql(registry, &model)?, Vec::new(), false)];
            for field in model.fields.iter().filter(|f| f.is_link_many()) {
                statements.push(Statement::new(associative_table_sql(registry, &model, field)?, Vec::new(), false));
            }
            statements.push(schema_upsert_statement(&model));
            Ok(statements)
        }
        "field" => {
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "create.field")?.to_string();
            let field_value = require_field(map, "field", "create.field")?;
            let field: Field = parse_as(field_value, "create.field.field")?;

            registry.add_field(&model_slug, field.clone())?;
            let model = registry.find_model(&model_slug)?.clone();

            let ddl = if field.is_link_many() {
                associative_table_sql(registry, &model, &field)?
            } else {
                let table = registry.table_name(&model);
                format!(r#"ALTER TABLE "{table}" ADD COLUMN {}"#, column_def(registry, &field)?)
            };
            Ok(vec![
                Statement::new(ddl, Vec::new(), false),
                schema_upsert_statement(&model),
            ])
        }
        "index" => {
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "create.index")?.to_string();
            let index_value = require_field(map, "index", "create.index")?;
            let index: Index = parse_as(index_value, "create.index.index")?;

            registry.add_index(&model_slug, index.clone())?;
            let model = registry.find_model(&model_slug)?.clone();
            let ddl = create_index_sql(registry, &model, &index)?;
            Ok(vec![
                Statement::new(ddl, Vec::new(), false),
                schema_upsert_statement(&model),
            ])
        }
        "trigger" => {
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "create.trigger")?.to_string();
            let trigger_value = require_field(map, "trigger", "create.trigger")?;
            let trigger: Trigger = parse_as(trigger_value, "create.trigger.trigger")?;

            registry.add_trigger(&model_slug, trigger.clone())?;
            let model = registry.find_model(&model_slug)?.clone();
            let ddl = create_trigger_sql(registry, &model, &trigger)?;
            Ok(vec![
                Statement::new(ddl, Vec::new(), false),
                schema_upsert_statement(&model),
            ])
        }
        "preset" => {
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "create.preset")?.to_string();
            let preset_value = require_field(map, "preset", "create.preset")?;
            let preset: Preset = parse_as(preset_value, "create.preset.preset")?;

            registry.add_preset(&model_slug, preset)?;
            let model = registry.find_model(&model_slug)?.clone();
            Ok(vec![schema_upsert_statement(&model)])
        }
        other => Err(CompileError::InvalidQueryShape(format!("unknown create target '{other}'"))),
    }
}

fn compile_alter(registry: &mut Registry, target: &str, raw: &Json) -> CompileResult<Vec<Statement>> {
    match target {
        "model" => {
            let map = obj(raw)?;
            let slug = require_str(map, "slug", "alter.model")?.to_string();
            let to = require_field(map, "to", "alter.model")?;
            let to_map = obj(to)?;

            let mut statements = Vec::new();
            let old_table = registry.table_name(registry.find_model(&slug)?);

            if let Some(new_slug) = to_map.get("slug").and_then(Json::as_str) {
                registry.rename_model(&slug, new_slug)?;
            }
            let effective_slug = to_map
                .get("slug")
                .and_then(Json::as_str)
                .unwrap_or(slug.as_str());
            if let Some(new_table) = to_map.get("table").and_then(Json::as_str) {
                let model = registry.find_model_mut(effective_slug)?;
                model.table = Some(new_table.to_string());
                statements.push(Statement::new(
                    format!(r#"ALTER TABLE "{old_table}" RENAME TO "{new_table}""#),
                    Vec::new(),
                    false,
                ));
            }

            let model = registry.find_model(effective_slug)?.clone();
            statements.push(schema_upsert_statement(&model));
            if slug != effective_slug {
                statements.push(schema_delete_statement(&slug));
            }
            Ok(statements)
        }
        "field" => {
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "alter.field")?.to_string();
            let slug = require_str(map, "slug", "alter.field")?.to_string();
            let to = require_field(map, "to", "alter.field")?;
            let to_map = obj(to)?;
            let new_slug = require_str(to_map, "slug", "alter.field.to")?.to_string();

            registry.rename_field(&model_slug, &slug, &new_slug)?;
            let model = registry.find_model(&model_slug)?.clone();
            let table = registry.table_name(&model);
            let ddl = format!(
                r#"ALTER TABLE "{table}" RENAME COLUMN {} TO {}"#,
                Ident::quoted(&slug)?.to_sql(),
                Ident::quoted(&new_slug)?.to_sql()
            );
            Ok(vec![
                Statement::new(ddl, Vec::new(), false),
                schema_upsert_statement(&model),
            ])
        }
        "index" | "trigger" | "preset" => {
            // SQLite has no `ALTER INDEX`/`ALTER TRIGGER`; replace in place.
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "alter")?.to_string();
            let slug = require_str(map, "slug", "alter")?.to_string();
            let to = require_field(map, "to", "alter")?.clone();

            let drop_raw = serde_json::json!({"model": model_slug, "slug": slug});
            let mut dropped = compile_drop(registry, target, &drop_raw)?;

            let mut create_raw = serde_json::Map::new();
            create_raw.insert("model".to_string(), Json::String(model_slug));
            create_raw.insert(target.to_string(), to);
            let created = compile_create(registry, target, &Json::Object(create_raw))?;

            dropped.extend(created);
            Ok(dropped)
        }
        other => Err(CompileError::InvalidQueryShape(format!("unknown alter target '{other}'"))),
    }
}

fn compile_drop(registry: &mut Registry, target: &str, raw: &Json) -> CompileResult<Vec<Statement>> {
    match target {
        "model" => {
            let map = obj(raw)?;
            let slug = require_str(map, "slug", "drop.model")?.to_string();
            let model = registry.drop_model(&slug)?;
            let table = registry.table_name(&model);

            let mut statements = Vec::new();
            for field in model.fields.iter().filter(|f| f.is_link_many()) {
                let assoc = Registry::associative_table_name(&model, &field.slug);
                statements.push(Statement::new(format!(r#"DROP TABLE "{assoc}""#), Vec::new(), false));
            }
            statements.push(Statement::new(format!(r#"DROP TABLE "{table}""#), Vec::new(), false));
            statements.push(schema_delete_statement(&slug));
            Ok(statements)
        }
        "field" => {
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "drop.field")?.to_string();
            let slug = require_str(map, "slug", "drop.field")?.to_string();

            let model_before = registry.find_model(&model_slug)?.clone();
            let field = registry.drop_field(&model_slug, &slug)?;
            let model = registry.find_model(&model_slug)?.clone();

            let ddl = if field.is_link_many() {
                let assoc = Registry::associative_table_name(&model_before, &field.slug);
                format!(r#"DROP TABLE "{assoc}""#)
            } else {
                let table = registry.table_name(&model);
                format!(r#"ALTER TABLE "{table}" DROP COLUMN {}"#, Ident::quoted(&slug)?.to_sql())
            };
            Ok(vec![
                Statement::new(ddl, Vec::new(), false),
                schema_upsert_statement(&model),
            ])
        }
        "index" => {
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "drop.index")?.to_string();
            let slug = require_str(map, "slug", "drop.index")?.to_string();
            registry.drop_index(&model_slug, &slug)?;
            let model = registry.find_model(&model_slug)?.clone();
            let name = format!("{}_{}", model_slug, slug);
            Ok(vec![
                Statement::new(format!(r#"DROP INDEX "{name}""#), Vec::new(), false),
                schema_upsert_statement(&model),
            ])
        }
        "trigger" => {
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "drop.trigger")?.to_string();
            let slug = require_str(map, "slug", "drop.trigger")?.to_string();
            registry.drop_trigger(&model_slug, &slug)?;
            let model = registry.find_model(&model_slug)?.clone();
            let name = format!("{}_{}", model_slug, slug);
            Ok(vec![
                Statement::new(format!(r#"DROP TRIGGER "{name}""#), Vec::new(), false),
                schema_upsert_statement(&model),
            ])
        }
        "preset" => {
            let map = obj(raw)?;
            let model_slug = require_str(map, "model", "drop.preset")?.to_string();
            let slug = require_str(map, "slug", "drop.preset")?.to_string();
            registry.drop_preset(&model_slug, &slug)?;
            let model = registry.find_model(&model_slug)?.clone();
            Ok(vec![schema_upsert_statement(&model)])
        }
        other => Err(CompileError::InvalidQueryShape(format!("unknown drop target '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;
    use serde_json::json;

    fn empty_registry() -> Registry {
        Registry::new(vec![])
    }

    #[test]
    fn create_model_emits_table_and_schema_row() {
        let mut reg = empty_registry();
        let query = Query::parse(&json!({
            "create": {
                "model": {
                    "slug": "account",
                    "pluralSlug": "accounts",
                    "fields": [
                        {"slug": "handle", "type": "string", "required": true, "unique": true}
                    ]
                }
            }
        }))
        .unwrap();
        let statements = compile_meta(&mut reg, &query).unwrap();
        assert!(statements[0].sql.starts_with(r#"CREATE TABLE "accounts""#));
        assert!(statements[0].sql.contains(r#""handle" TEXT NOT NULL UNIQUE"#));
        assert!(statements.last().unwrap().sql.contains("ronin_schema"));
        assert!(reg.find_model("account").is_ok());
    }

    #[test]
    fn create_field_alters_table() {
        let mut reg = empty_registry();
        let create_model = Query::parse(&json!({
            "create": {"model": {"slug": "account", "pluralSlug": "accounts", "fields": []}}
        }))
        .unwrap();
        compile_meta(&mut reg, &create_model).unwrap();

        let create_field = Query::parse(&json!({
            "create": {"field": {"model": "account", "field": {"slug": "age", "type": "number"}}}
        }))
        .unwrap();
        let statements = compile_meta(&mut reg, &create_field).unwrap();
        assert!(statements[0].sql.starts_with(r#"ALTER TABLE "accounts" ADD COLUMN "age" INTEGER"#));
        assert!(reg.find_model("account").unwrap().find_field("age").is_some());
    }

    #[test]
    fn create_many_link_field_makes_associative_table() {
        let mut reg = empty_registry();
        let create_model = Query::parse(&json!({
            "create": {"model": {"slug": "account", "pluralSlug": "accounts", "fields": []}}
        }))
        .unwrap();
        compile_meta(&mut reg, &create_model).unwrap();
        let create_member = Query::parse(&json!({
            "create": {"model": {"slug": "member", "pluralSlug": "members", "fields": []}}
        }))
        .unwrap();
        compile_meta(&mut reg, &create_member).unwrap();

        let mut field = Field::system("members", FieldType::Link);
        field.target = Some("member".to_string());
        field.kind = crate::model::LinkKind::Many;
        let create_field = Query::parse(&json!({
            "create": {"field": {"model": "account", "field": {
                "slug": "members", "type": "link", "target": "member", "kind": "many"
            }}}
        }))
        .unwrap();
        let statements = compile_meta(&mut reg, &create_field).unwrap();
        assert!(statements[0].sql.starts_with(r#"CREATE TABLE "ronin_link_account_members""#));
    }

    #[test]
    fn drop_model_drops_table_and_schema_row() {
        let mut reg = empty_registry();
        let create_model = Query::parse(&json!({
            "create": {"model": {"slug": "account", "pluralSlug": "accounts", "fields": []}}
        }))
        .unwrap();
        compile_meta(&mut reg, &create_model).unwrap();

        let drop_model = Query::parse(&json!({"drop": {"model": {"slug": "account"}}})).unwrap();
        let statements = compile_meta(&mut reg, &drop_model).unwrap();
        assert!(statements.iter().any(|s| s.sql.starts_with(r#"DROP TABLE "accounts""#)));
        assert!(statements.iter().any(|s| s.sql.contains("DELETE FROM")));
        assert!(reg.find_model("account").is_err());
    }

    #[test]
    fn create_trigger_wraps_effect_in_for_each_row_body() {
        let mut reg = empty_registry();
        let create_model = Query::parse(&json!({
            "create": {"model": {"slug": "account", "pluralSlug": "accounts", "fields": [
                {"slug": "handle", "type": "string", "required": true}
            ]}}
        }))
        .unwrap();
        compile_meta(&mut reg, &create_model).unwrap();

        let create_trigger = Query::parse(&json!({
            "create": {"trigger": {"model": "account", "trigger": {
                "slug": "touchUpdatedAt",
                "when": "BEFORE",
                "action": "UPDATE",
                "effects": [
                    {"set": {"account": {"with": {"id": "__RONIN_FIELD_PARENT_OLD_id"}, "to": {"handle": "__RONIN_FIELD_PARENT_NEW_handle"}}}}
                ]
            }}}
        }))
        .unwrap();
        let statements = compile_meta(&mut reg, &create_trigger).unwrap();
        assert!(statements[0].sql.contains("FOR EACH ROW"));
        assert!(statements[0].sql.contains("BEGIN"));
        assert!(statements[0].sql.contains("OLD."));
        assert!(statements[0].sql.contains("NEW."));
    }

    #[test]
    fn create_index_on_missing_model_errors() {
        let mut reg = empty_registry();
        let query = Query::parse(&json!({
            "create": {"index": {"model": "nope", "index": {"slug": "byHandle", "fields": [{"slug": "handle"}]}}}
        }))
        .unwrap();
        assert!(compile_meta(&mut reg, &query).is_err());
    }
}
