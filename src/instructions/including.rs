//! `including` compilation: JOINs and ephemeral columns (spec.md §4.5).

use serde_json::Value as Json;

use crate::condition::{ConditionContext, ConditionMode, SubqueryCompiler};
use crate::error::{CompileError, CompileResult};
use crate::model::registry::Registry;
use crate::model::Model;
use crate::query::Query;
use crate::symbol::{self, Symbol};
use crate::value::Binder;

/// Where one `including` join's columns land in a formatted record, and
/// whether repeated rows for it fold into an array. `path` is empty for a
/// hoisted sub-query (the `including` value itself is a sentinel, not keyed
/// under a name) — its columns merge directly into the record root rather
/// than nesting under a key.
#[derive(Debug, Clone)]
pub struct Mount {
    pub path: String,
    pub many: bool,
}

#[derive(Debug, Default)]
pub struct IncludingPlan {
    /// `LEFT JOIN ...`/`CROSS JOIN ...` fragments, appended after `FROM`.
    pub joins: Vec<String>,
    /// `<expr> AS "<name>"` fragments, appended to the SELECT list.
    pub ephemeral_columns: Vec<String>,
    /// One entry per join this plan compiled, for the result formatter.
    pub mounts: Vec<Mount>,
}

/// Compile every entry of an `including` mapping against `outer_model`.
///
/// Runs in two passes over the map: ephemeral-producing entries
/// (expressions, field refs, literals) bind first, then join entries.
/// Ephemeral columns always land in the outer `SELECT` list, which is
/// textually ahead of the `JOIN` clauses a join entry emits — binding in
/// that order keeps `?N` placeholders in ascending text order regardless of
/// which order the two kinds of entry appear in the map (spec.md §8,
/// testable property 2).
pub fn compile(
    outer_model: &Model,
    registry: &Registry,
    outer_table_alias: &str,
    including: Option<&Json>,
    expand_columns: bool,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
) -> CompileResult<IncludingPlan> {
    let mut plan = IncludingPlan::default();
    let Some(value) = including else {
        return Ok(plan);
    };

    // A sub-query placed directly as the `including` value (not nested
    // under a name) is "hoisted": its columns merge into the parent record
    // itself, under the alias prefix `including_ronin_root` (spec.md §4.5).
    if let Some(Symbol::Query(inner_query)) = symbol::classify(value) {
        compile_join(
            outer_model,
            registry,
            outer_table_alias,
            "",
            "ronin_root",
            inner_query,
            expand_columns,
            binder,
            subq,
            &mut plan,
        )?;
        return Ok(plan);
    }

    let Json::Object(map) = value else {
        return Err(CompileError::invalid_including("", "`including` must be an object"));
    };

    for (name, entry) in map {
        compile_ephemeral_entry(outer_model, registry, outer_table_alias, name, entry, binder, &mut plan)?;
    }
    for (name, entry) in map {
        compile_join_entry(
            outer_model,
            registry,
            outer_table_alias,
            name,
            entry,
            expand_columns,
            binder,
            subq,
            &mut plan,
        )?;
    }

    Ok(plan)
}

/// First pass: expressions, field refs, preset-value errors, nested
/// literal objects, and bare literals. Sub-queries are left for the join
/// pass and silently skipped here.
fn compile_ephemeral_entry(
    outer_model: &Model,
    registry: &Registry,
    outer_table_alias: &str,
    name: &str,
    entry: &Json,
    binder: &mut Binder,
    plan: &mut IncludingPlan,
) -> CompileResult<()> {
    match symbol::classify(entry) {
        Some(Symbol::Query(_)) => Ok(()),
        Some(Symbol::Expression(expr)) => {
            let (sql, _) = symbol::translate_expression(expr, |scope, path| {
                resolve_marker(registry, outer_model, outer_table_alias, scope, path)
            });
            plan.ephemeral_columns.push(format!("({sql}) AS \"{name}\""));
            Ok(())
        }
        Some(Symbol::FieldRef { scope, path }) => {
            let sql = resolve_marker(registry, outer_model, outer_table_alias, scope, &path);
            plan.ephemeral_columns.push(format!("{sql} AS \"{name}\""));
            Ok(())
        }
        Some(Symbol::PresetValue) => Err(CompileError::invalid_including(
            name.to_string(),
            "unresolved preset-value placeholder",
        )),
        None => match entry {
            Json::Object(nested) => {
                for (child_key, child_value) in nested {
                    let flattened = format!("{name}.{child_key}");
                    compile_ephemeral_entry(outer_model, registry, outer_table_alias, &flattened, child_value, binder, plan)?;
                }
                Ok(())
            }
            Json::Array(_) => Err(CompileError::invalid_including(
                name.to_string(),
                "arrays are not valid `including` entries",
            )),
            literal => {
                let placeholder = binder.bind(literal, false);
                plan.ephemeral_columns.push(format!("{placeholder} AS \"{name}\""));
                Ok(())
            }
        },
    }
}

/// Second pass: sub-query entries only, recursing through nested objects to
/// find them. Anything the ephemeral pass already handled (or rejected) is
/// a no-op here.
fn compile_join_entry(
    outer_model: &Model,
    registry: &Registry,
    outer_table_alias: &str,
    name: &str,
    entry: &Json,
    expand_columns: bool,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
    plan: &mut IncludingPlan,
) -> CompileResult<()> {
    match symbol::classify(entry) {
        Some(Symbol::Query(inner_query)) => compile_join(
            outer_model,
            registry,
            outer_table_alias,
            name,
            name,
            inner_query,
            expand_columns,
            binder,
            subq,
            plan,
        ),
        Some(_) => Ok(()),
        None => match entry {
            Json::Object(nested) => {
                for (child_key, child_value) in nested {
                    let flattened = format!("{name}.{child_key}");
                    compile_join_entry(
                        outer_model,
                        registry,
                        outer_table_alias,
                        &flattened,
                        child_value,
                        expand_columns,
                        binder,
                        subq,
                        plan,
                    )?;
                }
                Ok(())
            }
            _ => Ok(()),
        },
    }
}

fn resolve_marker(
    registry: &Registry,
    outer_model: &Model,
    outer_table_alias: &str,
    scope: symbol::FieldScope,
    path: &str,
) -> String {
    use symbol::FieldScope::*;
    match scope {
        Current | Parent => registry
            .get_field(outer_model, path, outer_table_alias)
            .map(|s| s.sql)
            .unwrap_or_else(|_| path.to_string()),
        Old => format!(r#"OLD."{path}""#),
        New => format!(r#"NEW."{path}""#),
    }
}

/// Compile a sub-query entry into a join clause. When the inner query has
/// a `with` clause, it is compiled as the `ON` condition of a `LEFT JOIN`
/// against the raw target table (the common case: a parent-field
/// correlation). With no `with` clause at all, the inner query is
/// compiled in full and used as a `CROSS JOIN` subquery.
///
/// `mount_path` is where the join's columns live in the formatted record
/// (empty for the hoisted case); `alias_name` is always the join's SQL
/// alias suffix (`including_<alias_name>`), which for the hoisted case is
/// the fixed `ronin_root` rather than the (nonexistent) entry name.
#[allow(clippy::too_many_arguments)]
fn compile_join(
    outer_model: &Model,
    registry: &Registry,
    outer_table_alias: &str,
    mount_path: &str,
    alias_name: &str,
    inner_query_json: &Json,
    expand_columns: bool,
    binder: &mut Binder,
    subq: &mut dyn SubqueryCompiler,
    plan: &mut IncludingPlan,
) -> CompileResult<()> {
    let inner = Query::parse(inner_query_json)
        .map_err(|_| CompileError::invalid_including(alias_name.to_string(), "inner query must be a `get`"))?;
    let inner_model = registry.find_model(&inner.target)?;
    let inner_alias = format!("including_{alias_name}");
    let many = registry.is_plural_reference(inner_model, &inner.target);

    let with_value = inner.instructions.as_ref().and_then(|i| i.with.clone());

    let join_sql = match with_value {
        Some(with_value) => {
            let inner_ctx = ConditionContext {
                model: inner_model,
                registry,
                table_alias: &inner_alias,
                parent_table: Some(outer_table_alias),
                parent_model: Some(outer_model),
                mode: ConditionMode::With,
            };
            let on_sql = crate::condition::compile(&inner_ctx, &with_value, binder, subq)?;
            let target_table = registry.table_name(inner_model);
            format!(r#"LEFT JOIN "{target_table}" as "{inner_alias}" ON ({on_sql})"#)
        }
        None => {
            let inner_sql = subq.compile_inner_get(inner_query_json, outer_table_alias, outer_model, binder)?;
            format!(r#"CROSS JOIN ({inner_sql}) AS "{inner_alias}""#)
        }
    };

    plan.joins.push(join_sql);
    plan.mounts.push(Mount {
        path: mount_path.to_string(),
        many,
    });

    if expand_columns {
        for field in &inner_model.fields {
            let alias = if mount_path.is_empty() {
                field.slug.clone()
            } else {
                format!("{mount_path}.{}", field.slug)
            };
            plan.ephemeral_columns
                .push(format!(r#""{inner_alias}"."{}" AS "{alias}""#, field.slug));
        }
    }

    Ok(())
}

/// Whether any join inside `including` (named or hoisted) targets a
/// plural model — used by the query compiler to decide whether the parent
/// `SELECT` needs `sub_<table>` wrapping before the join multiplies rows
/// (spec.md §4.5/§4.6). Cheap: parses inner query shapes but never compiles
/// SQL or touches a binder.
pub fn has_many_join(registry: &Registry, including: Option<&Json>) -> CompileResult<bool> {
    let Some(value) = including else {
        return Ok(false);
    };

    if let Some(Symbol::Query(inner)) = symbol::classify(value) {
        return is_many_query(registry, inner);
    }

    let Json::Object(map) = value else {
        return Ok(false);
    };
    for entry in map.values() {
        if scan_entry_for_many(registry, entry)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn scan_entry_for_many(registry: &Registry, entry: &Json) -> CompileResult<bool> {
    match symbol::classify(entry) {
        Some(Symbol::Query(inner)) => is_many_query(registry, inner),
        Some(_) => Ok(false),
        None => match entry {
            Json::Object(nested) => {
                for child in nested.values() {
                    if scan_entry_for_many(registry, child)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Ok(false),
        },
    }
}

fn is_many_query(registry: &Registry, inner_query_json: &Json) -> CompileResult<bool> {
    let inner = Query::parse(inner_query_json)
        .map_err(|_| CompileError::invalid_including("", "inner query must be a `get`"))?;
    let inner_model = registry.find_model(&inner.target)?;
    Ok(registry.is_plural_reference(inner_model, &inner.target))
}
