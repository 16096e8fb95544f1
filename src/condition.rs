//! Condition Compiler (C4).
//!
//! Builds WHERE / ON / SET fragments from a `with`/`to` instruction value
//! tree. This is the compiler's largest component and mirrors the shape of
//! pgorm's own `condition::Condition` builder — a small recursive grammar
//! over a value tree, rather than one fixed function per operator — except
//! here the tree is untyped caller JSON rather than a typed `Condition`
//! enum, so the recursion is driven by value shape instead of variants.

use serde_json::Value as Json;

use crate::error::{CompileError, CompileResult};
use crate::ident::Ident;
use crate::model::registry::Registry;
use crate::model::{Field, FieldType, Model};
use crate::symbol::{self, FieldScope, Symbol};
use crate::value::Binder;

const OPERATORS: &[&str] = &[
    "being",
    "notBeing",
    "greaterThan",
    "greaterOrEqual",
    "lessThan",
    "lessOrEqual",
    "startingWith",
    "endingWith",
    "containing",
    "notContaining",
];

fn is_operator(key: &str) -> bool {
    OPERATORS.contains(&key)
}

/// Whether a value tree is being compiled as a boolean filter (`with`) or a
/// column-assignment list (`to`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionMode {
    With,
    To,
}

/// Lets the condition compiler dispatch into the top-level query compiler
/// for `__RONIN_QUERY` sentinels without a circular module dependency (C6
/// depends on C4, not the other way around).
pub trait SubqueryCompiler {
    /// Compile a nested `{get: {...}}`-shaped query into a bare `SELECT`
    /// statement (no enclosing parens), with `__RONIN_FIELD_PARENT_*`
    /// markers inside it resolved against `parent_table`/`parent_model`.
    fn compile_inner_get(
        &mut self,
        inner_query: &Json,
        parent_table: &str,
        parent_model: &Model,
        binder: &mut Binder,
    ) -> CompileResult<String>;
}

/// Threads the ambient compilation context through recursion instead of
/// back-pointers (spec's Design Notes: avoid circular references).
pub struct ConditionContext<'a> {
    pub model: &'a Model,
    pub registry: &'a Registry,
    pub table_alias: &'a str,
    pub parent_table: Option<&'a str>,
    pub parent_model: Option<&'a Model>,
    pub mode: ConditionMode,
}

impl<'a> ConditionContext<'a> {
    pub fn with(model: &'a Model, registry: &'a Registry, table_alias: &'a str) -> Self {
        Self {
            model,
            registry,
            table_alias,
            parent_table: None,
            parent_model: None,
            mode: ConditionMode::With,
        }
    }

    pub fn to(model: &'a Model, registry: &'a Registry, table_alias: &'a str) -> Self {
        Self {
            mode: ConditionMode::To,
            ..Self::with(model, registry, table_alias)
        }
    }
}

/// Rewrite `nameIdentifier`/`slugIdentifier` to the model's configured
/// identifier fields (spec.md §4.4), defaulting to `id`.
fn resolve_identifier_key(model: &Model, key: &str) -> String {
    match key {
        "nameIdentifier" => model.identifiers.name.clone().unwrap_or_else(|| "id".to_string()),
        "slugIdentifier" => model.identifiers.slug.clone().unwrap_or_else(|| "id".to_string()),
        other => other.to_string(),
    }
}

fn join_and_maybe_paren(parts: Vec<String>, wrap_if_many: bool) -> String {
    if parts.len() > 1 && wrap_if_many {
        format!("({})", parts.join(" AND "))
    } else {
        parts.join(" AND ")
    }
}

fn join_to_list(parts: Vec<String>) -> String {
    parts.join(", ")
}

/// Entry point: compile a whole `with`/`to` value tree against `model`.
pub fn compile(
    ctx: &ConditionContext,
    value: &Json,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
) -> CompileResult<String> {
    compile_node(ctx, None, value, binder, subq, false)
}

fn compile_node(
    ctx: &ConditionContext,
    path: Option<&str>,
    value: &Json,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
    nested_field_context: bool,
) -> CompileResult<String> {
    // Case 1: condition object — requires a field path to apply operators to.
    if let (Some(p), Json::Object(map)) = (path, value) {
        if !map.is_empty() && map.keys().all(|k| is_operator(k)) {
            let mut parts = Vec::with_capacity(map.len());
            for (op, opval) in map {
                parts.push(compile_operator(ctx, p, op, opval, binder, subq)?);
            }
            return Ok(join_and_maybe_paren(parts, true));
        }
    }

    // Case 2: field context present.
    if let Some(p) = path {
        return compile_field_context(ctx, p, value, binder, subq);
    }

    match value {
        // Case 3: nested object, no field context (top level of `with`/`to`).
        Json::Object(map) => {
            if map.is_empty() {
                return Err(CompileError::invalid_with("", "empty object"));
            }
            let mut parts = Vec::with_capacity(map.len());
            for (k, v) in map {
                let resolved = resolve_identifier_key(ctx.model, k);
                parts.push(compile_node(ctx, Some(&resolved), v, binder, subq, false)?);
            }
            Ok(match ctx.mode {
                ConditionMode::With => join_and_maybe_paren(parts, nested_field_context),
                ConditionMode::To => join_to_list(parts),
            })
        }
        // Case 4: array, no field context.
        Json::Array(items) => compile_array(ctx, None, items, binder, subq),
        // Case 5: empty/unmatched.
        _ => Err(CompileError::invalid_with("", "unmatched value at top level")),
    }
}

fn compile_array(
    ctx: &ConditionContext,
    path: Option<&str>,
    items: &[Json],
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
) -> CompileResult<String> {
    if items.is_empty() {
        return Err(CompileError::invalid_with(path.unwrap_or("").to_string(), "empty array"));
    }
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(compile_node(ctx, path, item, binder, subq, true)?);
    }
    if parts.len() > 1 {
        Ok(format!("({})", parts.join(" OR ")))
    } else {
        Ok(parts.into_iter().next().unwrap())
    }
}

/// Case 2: a field path is in scope. Resolves the path against the
/// registry and picks the right terminal compilation strategy, falling
/// back to dotted-path accumulation (synthetic group fields like `ronin`,
/// or any JSON-typed field being filtered by nested sub-property).
fn compile_field_context(
    ctx: &ConditionContext,
    path: &str,
    value: &Json,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
) -> CompileResult<String> {
    if let Json::Object(map) = value {
        if map.is_empty() {
            return Err(CompileError::invalid_with(path.to_string(), "empty object"));
        }
    }
    if let Json::Array(items) = value {
        return compile_array(ctx, Some(path), items, binder, subq);
    }

    match ctx.registry.get_field(ctx.model, path, ctx.table_alias) {
        Ok(sel) => {
            let field = sel.field.clone();

            if ctx.mode == ConditionMode::To {
                if let Some(field) = &field {
                    if matches!(field.field_type, FieldType::Json) {
                        return compile_json_patch_write(&sel.sql, value, binder);
                    }
                }
            }

            if let Some(field) = &field {
                if matches!(field.field_type, FieldType::Json) {
                    if let Json::Object(map) = value {
                        if !map.keys().all(|k| is_operator(k)) {
                            let mut parts = Vec::with_capacity(map.len());
                            for (k, v) in map {
                                let child = format!("{path}.{k}");
                                parts.push(compile_node(ctx, Some(&child), v, binder, subq, true)?);
                            }
                            return Ok(match ctx.mode {
                                ConditionMode::With => join_and_maybe_paren(parts, true),
                                ConditionMode::To => join_to_list(parts),
                            });
                        }
                    }
                }

                if matches!(field.field_type, FieldType::Link) && !field.is_link_many() {
                    if let Json::Object(map) = value {
                        if map.len() == 1 && map.contains_key("id") {
                            return compile_operator(ctx, path, "being", &map["id"], binder, subq);
                        }
                        return compile_link_subquery(ctx, path, &sel.sql, field, map, binder, subq);
                    }
                }
            }

            compile_operator(ctx, path, "being", value, binder, subq)
        }
        Err(err) => {
            // Not a resolvable field: treat as a dotted grouping prefix
            // (e.g. the synthetic `ronin` marker) if the value is a plain
            // object of further keys.
            match value {
                Json::Object(map) => {
                    let mut parts = Vec::with_capacity(map.len());
                    for (k, v) in map {
                        let child = format!("{path}.{k}");
                        parts.push(compile_node(ctx, Some(&child), v, binder, subq, true)?);
                    }
                    Ok(match ctx.mode {
                        ConditionMode::With => join_and_maybe_paren(parts, true),
                        ConditionMode::To => join_to_list(parts),
                    })
                }
                _ => Err(err),
            }
        }
    }
}

/// Build `"<link_col>" = (SELECT "id" FROM <target> WHERE <nested>)` for a
/// link=one field whose value is a nested (non-`{id}`) object.
fn compile_link_subquery(
    ctx: &ConditionContext,
    path: &str,
    selector_sql: &str,
    field: &Field,
    nested: &serde_json::Map<String, Json>,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
) -> CompileResult<String> {
    let target_slug = field.target.as_deref().ok_or_else(|| {
        CompileError::invalid_with(path.to_string(), "link field is missing a target model")
    })?;
    let target_model = ctx.registry.find_model(target_slug)?;
    let target_table = ctx.registry.table_name(target_model);
    let target_ident = Ident::quoted(&target_table)?.to_sql();

    let inner_ctx = ConditionContext {
        model: target_model,
        registry: ctx.registry,
        table_alias: &target_table,
        parent_table: Some(ctx.table_alias),
        parent_model: Some(ctx.model),
        mode: ConditionMode::With,
    };
    let nested_value = Json::Object(nested.clone());
    let nested_sql = compile(&inner_ctx, &nested_value, binder, subq)?;
    let id_col = Ident::quoted("id")?.to_sql();
    Ok(format!(
        "{selector_sql} = (SELECT {id_col} FROM {target_ident} WHERE {nested_sql})"
    ))
}

/// `"<col>" = IIF("<col>" IS NULL, ?, json_patch("<col>", ?))` — the same
/// bound placeholder is referenced twice, which SQLite's numbered
/// parameters allow.
fn compile_json_patch_write(selector_sql: &str, value: &Json, binder: &mut Binder) -> CompileResult<String> {
    let serialized = Json::String(serde_json::to_string(value).unwrap_or_default());
    let placeholder = binder.bind(&serialized, true);
    Ok(format!(
        "{selector_sql} = IIF({selector_sql} IS NULL, {placeholder}, json_patch({selector_sql}, {placeholder}))"
    ))
}

/// Resolve the right-hand side of a comparison: a bound literal, a
/// translated field-ref/expression, or a compiled sub-query — returning
/// whether the original value was a JSON null (so callers can switch to
/// `IS [NOT] NULL`).
fn compile_rhs(
    ctx: &ConditionContext,
    value: &Json,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
) -> CompileResult<(String, bool)> {
    match symbol::classify(value) {
        Some(Symbol::Query(inner)) => {
            let sql = subq.compile_inner_get(inner, ctx.table_alias, ctx.model, binder)?;
            Ok((format!("({sql})"), false))
        }
        Some(Symbol::Expression(expr)) => {
            let (sql, _saw_parent) = symbol::translate_expression(expr, |scope, p| {
                resolve_field_ref(ctx, scope, p).unwrap_or_else(|_| p.to_string())
            });
            Ok((sql, false))
        }
        Some(Symbol::FieldRef { scope, path }) => {
            let sql = resolve_field_ref(ctx, scope, &path)?;
            Ok((sql, false))
        }
        Some(Symbol::PresetValue) => Err(CompileError::InvalidQueryShape(
            "unresolved __RONIN_VALUE placeholder reached the condition compiler".to_string(),
        )),
        None => {
            if value.is_null() {
                Ok(("NULL".to_string(), true))
            } else {
                Ok((binder.bind(value, false), false))
            }
        }
    }
}

fn resolve_field_ref(ctx: &ConditionContext, scope: FieldScope, path: &str) -> CompileResult<String> {
    match scope {
        FieldScope::Current => Ok(ctx.registry.get_field(ctx.model, path, ctx.table_alias)?.sql),
        FieldScope::Parent => {
            let (table, model) = (ctx.parent_table, ctx.parent_model);
            let table = table.ok_or_else(|| {
                CompileError::InvalidQueryShape("no parent table in scope for __RONIN_FIELD_PARENT_".to_string())
            })?;
            let model = model.ok_or_else(|| {
                CompileError::InvalidQueryShape("no parent model in scope for __RONIN_FIELD_PARENT_".to_string())
            })?;
            Ok(ctx.registry.get_field(model, path, table)?.sql)
        }
        FieldScope::Old => Ok(format!(r#"OLD."{path}""#)),
        FieldScope::New => Ok(format!(r#"NEW."{path}""#)),
    }
}

fn compile_operator(
    ctx: &ConditionContext,
    path: &str,
    op: &str,
    opval: &Json,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
) -> CompileResult<String> {
    let sel = ctx.registry.get_field(ctx.model, path, ctx.table_alias)?;
    let col = &sel.sql;

    match op {
        "being" | "notBeing" => {
            let (rhs, is_null) = compile_rhs(ctx, opval, binder, subq)?;
            if is_null {
                return Ok(format!("{col} IS {}NULL", if op == "notBeing" { "NOT " } else { "" }));
            }
            let sql_op = if op == "being" { "=" } else { "!=" };
            Ok(format!("{col} {sql_op} {rhs}"))
        }
        "greaterThan" | "greaterOrEqual" | "lessThan" | "lessOrEqual" => {
            let (rhs, _) = compile_rhs(ctx, opval, binder, subq)?;
            let sql_op = match op {
                "greaterThan" => ">",
                "greaterOrEqual" => ">=",
                "lessThan" => "<",
                _ => "<=",
            };
            Ok(format!("{col} {sql_op} {rhs}"))
        }
        "startingWith" | "endingWith" | "containing" | "notContaining" => {
            let negate = op == "notContaining";
            let like_kw = if negate { "NOT LIKE" } else { "LIKE" };
            let rhs = compile_like_rhs(ctx, op, opval, binder, subq)?;
            Ok(format!("{col} {like_kw} {rhs}"))
        }
        other => Err(CompileError::InvalidQueryShape(format!("unknown operator '{other}'"))),
    }
}

fn compile_like_rhs(
    ctx: &ConditionContext,
    op: &str,
    opval: &Json,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
) -> CompileResult<String> {
    let is_plain_scalar = matches!(opval, Json::String(_) | Json::Number(_)) && symbol::classify(opval).is_none();

    if is_plain_scalar {
        let raw = match opval {
            Json::String(s) => s.clone(),
            other => other.to_string(),
        };
        let pattern = match op {
            "startingWith" => format!("{raw}%"),
            "endingWith" => format!("%{raw}"),
            _ => format!("%{raw}%"),
        };
        return Ok(binder.bind(&Json::String(pattern), false));
    }

    let (rhs, _) = compile_rhs(ctx, opval, binder, subq)?;
    Ok(match op {
        "startingWith" => format!("{rhs} || '%'"),
        "endingWith" => format!("'%' || {rhs}"),
        _ => format!("'%' || {rhs} || '%'"),
    })
}
