//! Query Compiler (C6): the top-level `get`/`count`/`add`/`set`/`remove`/
//! `list` dispatch, and the engine that implements [`SubqueryCompiler`] so
//! `__RONIN_QUERY` sentinels and `including` cross-joins can recurse back
//! into the same SELECT-building logic without C4/C5 depending on C6
//! directly (spec's Design Notes: avoid circular references).
//!
//! Meta queries (`create`/`alter`/`drop`) are not handled here — they need
//! a mutable registry and live in [`crate::ddl`].

pub mod context;

use serde_json::Value as Json;

use crate::condition::{self, ConditionContext, SubqueryCompiler};
use crate::error::{CompileError, CompileResult};
use crate::ident::Ident;
use crate::instructions::{cursor, including, limited_to, ordered_by, selecting, to};
use crate::model::registry::Registry;
use crate::model::{Model, RONIN_SCHEMA_TABLE};
use crate::query::{CombinedInstructions, Query, QueryKind};
use crate::statement::Statement;
use crate::value::Binder;

/// Compilation-wide switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Render bound values as literal SQL text instead of `?N` placeholders.
    /// Used by the DDL compiler for trigger-body effects, which SQLite
    /// disallows parameter binding in.
    pub inline_params: bool,
    /// Force every column (including joined `including` columns) to carry
    /// an explicit `AS "<slug>"` alias, even when `selecting` wasn't given
    /// (spec.md §4.9/§6.1). Without it, an omitted `selecting` falls back
    /// to `SELECT *`.
    pub expand_columns: bool,
}

/// Pagination/ordering facts about a compiled query that the result
/// formatter (C8) needs but which don't belong on [`Statement`] itself,
/// since they describe row *shape*, not the SQL that produced it.
#[derive(Debug, Clone, Default)]
pub struct QueryMeta {
    pub model_slug: Option<String>,
    pub singular: bool,
    pub requested_limit: Option<i64>,
    /// Slugs (not SQL selectors) of any explicit `orderedBy` columns other
    /// than the implicit `ronin.createdAt` tiebreaker, in cursor order.
    pub ordered_columns: Vec<String>,
    pub timestamp_slug: String,
    /// Whether the query carried a `before` (backward-paging) cursor. Used
    /// to decide whether a lookahead row becomes `moreBefore` or
    /// `moreAfter` in the formatted result.
    pub paging_before: bool,
    /// Cardinality of every `including` join this query compiled, so the
    /// result formatter (C8) knows which dotted/bracketed paths to
    /// group-and-array-fold across rows that share the root `id`
    /// (spec.md §4.8).
    pub mounts: Vec<crate::instructions::Mount>,
}

/// Derive the [`QueryMeta`] for a non-meta, non-`list` query. Meta and
/// `list` queries have no row-shape to report. This does build (and
/// discard) the `including` join SQL, since mount cardinality can only be
/// known by resolving each joined sub-query's target model — but it never
/// touches a real [`Binder`]'s output beyond a scratch pass.
pub fn query_meta(registry: &Registry, query: &Query, options: CompileOptions) -> CompileResult<QueryMeta> {
    Engine::new(registry, options).query_meta(query)
}

/// Compile one non-meta query into its single [`Statement`].
pub fn compile_query(registry: &Registry, query: &Query, options: CompileOptions) -> CompileResult<Statement> {
    if query.kind.is_meta() {
        return Err(CompileError::InvalidQueryShape(
            "meta queries must be compiled via crate::ddl::compile_meta".to_string(),
        ));
    }
    let mut engine = Engine::new(registry, options);
    let statement = match query.kind {
        QueryKind::Get => engine.compile_get(query),
        QueryKind::Count => engine.compile_count(query),
        QueryKind::Add => engine.compile_add(query),
        QueryKind::Set => engine.compile_set(query),
        QueryKind::Remove => engine.compile_remove(query),
        QueryKind::List => engine.compile_list(query),
        QueryKind::Create | QueryKind::Alter | QueryKind::Drop => {
            unreachable!("meta queries are rejected above")
        }
    }?;
    crate::telemetry::trace_compiled_statement(query.kind.as_str(), &query.target, &statement.sql);
    Ok(statement)
}

/// Compiles queries against a read-only registry snapshot.
pub struct Engine<'r> {
    pub registry: &'r Registry,
    pub options: CompileOptions,
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r Registry, options: CompileOptions) -> Self {
        Self { registry, options }
    }

    fn binder(&self) -> Binder {
        Binder::new(self.options.inline_params)
    }

    /// Merge presets into `raw` and parse the result into the typed
    /// instruction bag. [`Query::parse`] already parses instructions for
    /// inspection purposes, but without preset expansion — that merge has
    /// to happen against the model, which only the compiler (not the
    /// query-envelope parser) has in scope.
    fn instructions_for(&self, model: &Model, raw: &Json) -> CompileResult<CombinedInstructions> {
        let merged = crate::instructions::using::apply(model, raw)?;
        CombinedInstructions::parse(&merged)
    }

    fn singular(&self, model: &Model, target: &str) -> bool {
        !self.registry.is_plural_reference(model, target)
    }

    pub fn query_meta(&mut self, query: &Query) -> CompileResult<QueryMeta> {
        if query.kind.is_meta() || query.kind == QueryKind::List {
            return Ok(QueryMeta::default());
        }
        let model = self.registry.find_model(&query.target)?.clone();
        let singular = self.singular(&model, &query.target);
        let instructions = self.instructions_for(&model, &query.raw)?;
        let ordered_columns = instructions
            .ordered_by
            .as_ref()
            .map(|o| {
                o.ascending
                    .iter()
                    .chain(o.descending.iter())
                    .filter(|s| s.as_str() != "ronin.createdAt")
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let requested_limit = limited_to::effective_limit(instructions.limited_to, singular);

        let table = self.registry.table_name(&model);
        let expand_columns = self.options.expand_columns;
        let mut scratch_binder = self.binder();
        let including_plan = including::compile(
            &model,
            self.registry,
            &table,
            instructions.including.as_ref(),
            expand_columns,
            &mut scratch_binder,
            &mut *self,
        )?;

        Ok(QueryMeta {
            model_slug: Some(model.slug.clone()),
            singular,
            requested_limit,
            ordered_columns,
            timestamp_slug: "ronin.createdAt".to_string(),
            paging_before: instructions.before.is_some(),
            mounts: including_plan.mounts,
        })
    }

    /// Build a bare `SELECT ...` (no trailing semicolon). Both the
    /// top-level `get` and every nested sub-query alias themselves by
    /// their own table name — there is never a second query against the
    /// same table nested inside another in this compiler's scenarios, so
    /// the simpler "alias == table name, no `AS`" convention from spec.md's
    /// root-level FROM clause holds everywhere `build_select` is called,
    /// except when `needs_wrap` below kicks in.
    ///
    /// When a `LIMIT`/`ORDER BY` parent is joined to a multi-record
    /// `including` side, the join would multiply rows before `LIMIT` could
    /// apply to the right ones. Spec.md §4.5/§4.6 calls for wrapping the
    /// parent in a `sub_<table>`-aliased sub-SELECT so `LIMIT`/`ORDER BY`
    /// bind against the parent alone, with the join applied outside it.
    fn build_select(
        &mut self,
        model: &Model,
        table_alias: &str,
        instructions: &CombinedInstructions,
        singular: bool,
        binder: &mut Binder,
    ) -> CompileResult<String> {
        let registry = self.registry;
        let table = registry.table_name(model);
        let expand_columns = self.options.expand_columns;

        let order_sql = ordered_by::compile(model, instructions.ordered_by.as_ref(), !singular)?;
        let limit = limited_to::effective_limit(instructions.limited_to, singular);
        let limit_sql = limited_to::sql_fragment(limit);

        let needs_wrap = (order_sql.is_some() || limit_sql.is_some())
            && including::has_many_join(registry, instructions.including.as_ref())?;
        let wrapped_alias = format!("sub_{table}");
        let outer_alias: &str = if needs_wrap { &wrapped_alias } else { table_alias };

        let (cols_sql, _expand) =
            selecting::compile(model, registry, outer_alias, instructions.selecting.as_deref(), expand_columns)?;
        let including_plan = including::compile(
            model,
            registry,
            outer_alias,
            instructions.including.as_ref(),
            expand_columns,
            binder,
            &mut *self,
        )?;

        // The parent's own filter always runs pre-join, against the bare
        // table alias — inside the wrapping sub-SELECT when wrapping,
        // directly in the WHERE clause otherwise.
        let with_sql = match &instructions.with {
            Some(with_value) => {
                let ctx = ConditionContext::with(model, registry, table_alias);
                Some(condition::compile(&ctx, with_value, binder, &mut *self)?)
            }
            None => None,
        };

        let explicit_order_slugs: Vec<String> = instructions
            .ordered_by
            .as_ref()
            .map(|o| o.ascending.iter().chain(o.descending.iter()).cloned().collect())
            .unwrap_or_default();
        let cursor_columns: Vec<String> = explicit_order_slugs
            .iter()
            .filter(|s| s.as_str() != "ronin.createdAt")
            .map(|s| Ok(Ident::quoted(s)?.to_sql()))
            .collect::<CompileResult<Vec<_>>>()?;

        let cursor_sql = match (&instructions.before, &instructions.after) {
            (Some(raw), None) => {
                let decoded = cursor::decode(raw)?;
                Some(cursor::compile_where(&cursor_columns, "ronin.createdAt", &decoded, true, binder)?)
            }
            (None, Some(raw)) => {
                let decoded = cursor::decode(raw)?;
                Some(cursor::compile_where(&cursor_columns, "ronin.createdAt", &decoded, false, binder)?)
            }
            _ => None,
        };

        let where_parts: Vec<String> = [with_sql, cursor_sql].into_iter().flatten().collect();
        let where_clause = (!where_parts.is_empty()).then(|| where_parts.join(" AND "));

        let ephemeral = (!including_plan.ephemeral_columns.is_empty())
            .then(|| including_plan.ephemeral_columns.join(", "));
        let select_list = match (&cols_sql, &ephemeral) {
            (Some(c), Some(e)) => format!("{c}, {e}"),
            (Some(c), None) => c.clone(),
            (None, Some(e)) => format!("*, {e}"),
            (None, None) => "*".to_string(),
        };

        let mut sql = format!("SELECT {select_list} FROM ");
        if needs_wrap {
            sql.push_str(&format!(r#"(SELECT * FROM "{table}""#));
            if let Some(w) = &where_clause {
                sql.push_str(" WHERE ");
                sql.push_str(w);
            }
            if let Some(o) = &order_sql {
                sql.push_str(" ORDER BY ");
                sql.push_str(o);
            }
            if let Some(l) = &limit_sql {
                sql.push(' ');
                sql.push_str(l);
            }
            sql.push_str(&format!(r#") AS "{outer_alias}""#));
        } else {
            sql.push_str(&format!(r#""{table}""#));
        }

        for join in &including_plan.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        if needs_wrap {
            // WHERE/LIMIT already applied inside the wrapped sub-SELECT; a
            // join gives SQLite no ordering guarantee, so ORDER BY is
            // re-stated here (it never binds a parameter, so this can't
            // disturb placeholder order).
            if let Some(o) = &order_sql {
                sql.push_str(" ORDER BY ");
                sql.push_str(o);
            }
        } else {
            if let Some(w) = &where_clause {
                sql.push_str(" WHERE ");
                sql.push_str(w);
            }
            if let Some(o) = &order_sql {
                sql.push_str(" ORDER BY ");
                sql.push_str(o);
            }
            if let Some(l) = &limit_sql {
                sql.push(' ');
                sql.push_str(l);
            }
        }

        Ok(sql)
    }

    fn compile_get(&mut self, query: &Query) -> CompileResult<Statement> {
        let model = self.registry.find_model(&query.target)?.clone();
        let singular = self.singular(&model, &query.target);
        let table = self.registry.table_name(&model);
        let instructions = self.instructions_for(&model, &query.raw)?;
        let mut binder = self.binder();
        let sql = self.build_select(&model, &table, &instructions, singular, &mut binder)?;
        Ok(Statement::new(sql, binder.into_params(), true))
    }

    fn compile_count(&mut self, query: &Query) -> CompileResult<Statement> {
        let model = self.registry.find_model(&query.target)?.clone();
        let table = self.registry.table_name(&model);
        let instructions = self.instructions_for(&model, &query.raw)?;
        let mut binder = self.binder();

        let expand_columns = self.options.expand_columns;
        let including_plan = including::compile(
            &model,
            self.registry,
            &table,
            instructions.including.as_ref(),
            expand_columns,
            &mut binder,
            &mut *self,
        )?;
        let with_sql = match &instructions.with {
            Some(with_value) => {
                let ctx = ConditionContext::with(&model, self.registry, &table);
                Some(condition::compile(&ctx, with_value, &mut binder, &mut *self)?)
            }
            None => None,
        };

        let mut sql = format!(r#"SELECT (COUNT(*)) AS "amount" FROM "{table}""#);
        for join in &including_plan.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if let Some(w) = &with_sql {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }

        Ok(Statement::new(sql, binder.into_params(), true))
    }

    fn compile_add(&mut self, query: &Query) -> CompileResult<Statement> {
        let model = self.registry.find_model(&query.target)?.clone();
        let table = self.registry.table_name(&model);
        let instructions = self.instructions_for(&model, &query.raw)?;
        let mut binder = self.binder();

        let plan = to::compile_insert(&model, instructions.to.as_ref(), &mut binder)?;
        let (returning_cols, _) = selecting::compile(
            &model,
            self.registry,
            &table,
            instructions.selecting.as_deref(),
            self.options.expand_columns,
        )?;
        let returning = returning_cols.unwrap_or_else(|| "*".to_string());

        let sql = format!(
            r#"INSERT INTO "{table}" ({}) VALUES ({}) RETURNING {returning}"#,
            plan.columns.join(", "),
            plan.placeholders.join(", "),
        );

        Ok(Statement::new(sql, binder.into_params(), true))
    }

    fn compile_set(&mut self, query: &Query) -> CompileResult<Statement> {
        let model = self.registry.find_model(&query.target)?.clone();
        let table = self.registry.table_name(&model);
        let instructions = self.instructions_for(&model, &query.raw)?;
        let to_value = instructions.to.clone().ok_or_else(|| CompileError::MissingInstruction {
            query_type: "set".to_string(),
            instruction: "to".to_string(),
        })?;
        let mut binder = self.binder();

        let set_sql = to::compile_set(&model, self.registry, &table, &to_value, &mut binder, &mut *self)?;
        let with_sql = match &instructions.with {
            Some(with_value) => {
                let ctx = ConditionContext::with(&model, self.registry, &table);
                Some(condition::compile(&ctx, with_value, &mut binder, &mut *self)?)
            }
            None => None,
        };
        let (returning_cols, _) = selecting::compile(
            &model,
            self.registry,
            &table,
            instructions.selecting.as_deref(),
            self.options.expand_columns,
        )?;
        let returning = returning_cols.unwrap_or_else(|| "*".to_string());

        let mut sql = format!(r#"UPDATE "{table}" SET {set_sql}"#);
        if let Some(w) = &with_sql {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }
        sql.push_str(&format!(" RETURNING {returning}"));

        Ok(Statement::new(sql, binder.into_params(), true))
    }

    fn compile_remove(&mut self, query: &Query) -> CompileResult<Statement> {
        let model = self.registry.find_model(&query.target)?.clone();
        let table = self.registry.table_name(&model);
        let instructions = self.instructions_for(&model, &query.raw)?;
        let mut binder = self.binder();

        let with_sql = match &instructions.with {
            Some(with_value) => {
                let ctx = ConditionContext::with(&model, self.registry, &table);
                Some(condition::compile(&ctx, with_value, &mut binder, &mut *self)?)
            }
            None => None,
        };
        let (returning_cols, _) = selecting::compile(
            &model,
            self.registry,
            &table,
            instructions.selecting.as_deref(),
            self.options.expand_columns,
        )?;
        let returning = returning_cols.unwrap_or_else(|| "*".to_string());

        let mut sql = format!(r#"DELETE FROM "{table}""#);
        if let Some(w) = &with_sql {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }
        sql.push_str(&format!(" RETURNING {returning}"));

        Ok(Statement::new(sql, binder.into_params(), true))
    }

    /// `list` queries are read-only lookups against the `ronin_schema`
    /// meta-table rather than a user model (spec.md §5).
    fn compile_list(&mut self, query: &Query) -> CompileResult<Statement> {
        let sql = match query.target.as_str() {
            "models" => format!(r#"SELECT * FROM "{RONIN_SCHEMA_TABLE}""#),
            column @ ("fields" | "indexes" | "triggers" | "presets") => format!(
                r#"SELECT json_each.value AS "{column}" FROM "{RONIN_SCHEMA_TABLE}", json_each("{RONIN_SCHEMA_TABLE}"."{column}")"#
            ),
            other => {
                return Err(CompileError::InvalidQueryShape(format!(
                    "unknown `list` target '{other}'"
                )))
            }
        };
        Ok(Statement::new(sql, Vec::new(), true))
    }
}

impl<'r> SubqueryCompiler for Engine<'r> {
    fn compile_inner_get(
        &mut self,
        inner_query: &Json,
        _parent_table: &str,
        _parent_model: &Model,
        binder: &mut Binder,
    ) -> CompileResult<String> {
        let inner = Query::parse(inner_query)?;
        if inner.kind != QueryKind::Get {
            return Err(CompileError::InvalidQueryShape(
                "nested `__RONIN_QUERY`/`including` sub-query must be a `get`".to_string(),
            ));
        }
        let model = self.registry.find_model(&inner.target)?.clone();
        let singular = self.singular(&model, &inner.target);
        let table = self.registry.table_name(&model);
        let instructions = self.instructions_for(&model, &inner.raw)?;
        self.build_select(&model, &table, &instructions, singular, binder)
    }
}
