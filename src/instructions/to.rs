//! `to` compilation for `add` (INSERT) and `set` (UPDATE) (spec.md §4.5,
//! §6.4).

use rand::Rng;
use serde_json::Value as Json;

use crate::condition::{self, ConditionContext, ConditionMode, SubqueryCompiler};
use crate::error::{CompileError, CompileResult};
use crate::ident::Ident;
use crate::model::registry::Registry;
use crate::model::{Field, FieldType, Model};
use crate::value::{Binder, Param};

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// `<idPrefix>_<16 lowercase alphanumerics>`, matching `/^[a-z]{3}_[a-z0-9]{16}$/`.
pub fn generate_record_id(id_prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..16)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{id_prefix}_{suffix}")
}

/// `YYYY-MM-DDTHH:MM:SS.sssZ`.
pub fn now_timestamp() -> String {
    format_timestamp(chrono::Utc::now())
}

pub fn format_timestamp(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn normalize_param(field: &Field, value: &Json) -> Param {
    match field.field_type {
        FieldType::Json => Param::Text(serde_json::to_string(value).unwrap_or_default()),
        FieldType::Boolean => match value {
            Json::Bool(b) => Param::Integer(if *b { 1 } else { 0 }),
            other => Param::from(other),
        },
        _ => Param::from(value),
    }
}

pub struct InsertPlan {
    pub columns: Vec<String>,
    pub placeholders: Vec<String>,
}

/// Build the `(<columns>) VALUES (<placeholders>)` halves of an `add`
/// statement, auto-generating `id`/`ronin.createdAt`/`ronin.updatedAt`
/// when the caller's `to` value didn't supply them.
pub fn compile_insert(model: &Model, to_value: Option<&Json>, binder: &mut Binder) -> CompileResult<InsertPlan> {
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    let mut provided: Vec<String> = Vec::new();

    if let Some(Json::Object(map)) = to_value {
        for (slug, value) in map {
            let field = model
                .find_field(slug)
                .ok_or_else(|| CompileError::FieldNotFound {
                    model: model.slug.clone(),
                    field: slug.clone(),
                })?;
            columns.push(Ident::quoted(slug)?.to_sql());
            placeholders.push(binder.bind_param(normalize_param(field, value)));
            provided.push(slug.clone());
        }
    } else if to_value.is_some() {
        return Err(CompileError::invalid_to("", "`to` must be an object"));
    }

    let id_prefix = model.id_prefix.as_deref().unwrap_or("xxx");
    if !provided.iter().any(|p| p == "id") {
        columns.push(Ident::quoted("id")?.to_sql());
        placeholders.push(binder.bind_param(Param::Text(generate_record_id(id_prefix))));
    }

    let stamp = now_timestamp();
    if !provided.iter().any(|p| p == "ronin.createdAt") {
        columns.push(Ident::quoted("ronin.createdAt")?.to_sql());
        placeholders.push(binder.bind_param(Param::Text(stamp.clone())));
    }
    if !provided.iter().any(|p| p == "ronin.updatedAt") {
        columns.push(Ident::quoted("ronin.updatedAt")?.to_sql());
        placeholders.push(binder.bind_param(Param::Text(stamp)));
    }

    Ok(InsertPlan { columns, placeholders })
}

fn touches_updated_at(to_value: &Json) -> bool {
    match to_value.as_object() {
        Some(map) => {
            map.contains_key("ronin.updatedAt")
                || map
                    .get("ronin")
                    .and_then(Json::as_object)
                    .map(|m| m.contains_key("updatedAt"))
                    .unwrap_or(false)
        }
        None => false,
    }
}

/// Build the `SET col = val, ...` list for a `set` query, auto-touching
/// `ronin.updatedAt` unless the caller already set it explicitly.
pub fn compile_set(
    model: &Model,
    registry: &Registry,
    table_alias: &str,
    to_value: &Json,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
) -> CompileResult<String> {
    let ctx = ConditionContext {
        mode: ConditionMode::To,
        ..ConditionContext::with(model, registry, table_alias)
    };
    let mut sql = condition::compile(&ctx, to_value, binder, subq)?;

    if !touches_updated_at(to_value) {
        let selector = registry.get_field(model, "ronin.updatedAt", table_alias)?;
        let ph = binder.bind(&Json::String(now_timestamp()), false);
        sql.push_str(&format!(", {} = {}", selector.sql, ph));
    }

    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::registry::Registry;
    use crate::model::{FieldType, Identifiers};
    use serde_json::json;

    struct NoSubqueries;
    impl SubqueryCompiler for NoSubqueries {
        fn compile_inner_get(
            &mut self,
            _inner: &Json,
            _parent_table: &str,
            _parent_model: &Model,
            _binder: &mut Binder,
        ) -> CompileResult<String> {
            unreachable!("not exercised in this test")
        }
    }

    fn account_model() -> Model {
        let mut handle = Field::system("handle", FieldType::String);
        handle.required = true;
        Model {
            slug: "account".to_string(),
            plural_slug: "accounts".to_string(),
            name: None,
            plural_name: None,
            id_prefix: None,
            table: None,
            identifiers: Identifiers::default(),
            fields: vec![handle],
            indexes: vec![],
            triggers: vec![],
            presets: vec![],
        }
    }

    #[test]
    fn record_id_matches_expected_shape() {
        let id = generate_record_id("acc");
        assert!(regex::Regex::new(r"^[a-z]{3}_[a-z0-9]{16}$").unwrap().is_match(&id));
    }

    #[test]
    fn timestamp_matches_expected_shape() {
        let ts = now_timestamp();
        assert!(regex::Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$")
            .unwrap()
            .is_match(&ts));
    }

    #[test]
    fn insert_auto_generates_id_and_timestamps() {
        let reg = Registry::new(vec![account_model()]);
        let model = reg.find_model("account").unwrap();
        let mut binder = Binder::new(false);
        let plan = compile_insert(model, Some(&json!({"handle": "elaine"})), &mut binder).unwrap();
        assert_eq!(plan.columns.len(), 4);
        assert_eq!(plan.placeholders.len(), 4);
        assert_eq!(binder.len(), 4);
    }

    #[test]
    fn insert_respects_explicit_id() {
        let reg = Registry::new(vec![account_model()]);
        let model = reg.find_model("account").unwrap();
        let mut binder = Binder::new(false);
        let plan = compile_insert(
            model,
            Some(&json!({"handle": "elaine", "id": "acc_0000000000000000"})),
            &mut binder,
        )
        .unwrap();
        assert_eq!(plan.columns.len(), 3);
    }

    #[test]
    fn set_touches_updated_at_by_default() {
        let reg = Registry::new(vec![account_model()]);
        let model = reg.find_model("account").unwrap();
        let mut binder = Binder::new(false);
        let mut subq = NoSubqueries;
        let sql = compile_set(
            model,
            &reg,
            "accounts",
            &json!({"handle": "elaine"}),
            &mut binder,
            &mut subq,
        )
        .unwrap();
        assert!(sql.contains(r#""accounts"."ronin.updatedAt""#));
        assert_eq!(binder.len(), 2);
    }
}
