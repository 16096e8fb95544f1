//! Transaction Facade (C9).
//!
//! The crate's single public entry point: compiles a whole batch of queries
//! against one schema, threading schema mutations from earlier `create`/
//! `alter`/`drop` queries in the batch into later ones (spec.md §5, §9).
//! Callers execute the returned [`Statement`]s themselves — this crate never
//! opens a SQLite connection — then hand the raw rows back to
//! [`Transaction::format_results`] to get spec-shaped JSON.

use serde_json::Value as Json;

use crate::compiler::{self, CompileOptions, QueryMeta};
use crate::ddl;
use crate::error::CompileResult;
use crate::format::{self, PageDirection, RawRow};
use crate::model::{Model, RONIN_SCHEMA_TABLE};
use crate::query::{Query, QueryKind};
use crate::statement::Statement;

/// Caller-tunable switches for a whole batch.
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// Render bound values inline instead of as `?N` placeholders. Useful
    /// when the caller wants to log or preview a statement rather than bind
    /// it through a driver.
    pub inline_params: bool,
    /// Force every column (including joined `including` columns) to carry
    /// an explicit `AS "<slug>"` alias instead of falling back to
    /// `SELECT *` when `selecting` wasn't given (spec.md §4.9/§6.1).
    pub expand_columns: bool,
}

/// Per-statement bookkeeping the formatter needs that doesn't belong on
/// [`Statement`] (which only describes SQL, not row shape).
#[derive(Debug, Clone)]
struct Plan {
    kind: QueryKind,
    /// The model slug for data queries, or the `list` target
    /// (`models`/`fields`/`indexes`/`triggers`/`presets`) for meta reads.
    target: String,
    meta: QueryMeta,
}

/// One compiled batch: the schema it was compiled against (after every
/// meta-query mutation in the batch has been applied) and the statements to
/// run, in order.
pub struct Transaction {
    registry: crate::model::registry::Registry,
    pub statements: Vec<Statement>,
    plans: Vec<Plan>,
    pub options: TransactionOptions,
}

impl Transaction {
    /// Compile `queries` against `models`, applying every meta-query
    /// mutation to the live schema as the batch is processed so a `create`
    /// earlier in the array is visible to a `get` later in the same array.
    pub fn new(models: Vec<Model>, queries: &[Json], options: TransactionOptions) -> CompileResult<Self> {
        let mut registry = crate::model::registry::Registry::new(models);
        let compile_options = CompileOptions {
            inline_params: options.inline_params,
            expand_columns: options.expand_columns,
        };

        let mut statements = Vec::new();
        let mut plans = Vec::new();

        for raw_query in queries {
            let query = Query::parse(raw_query)?;
            if query.kind.is_meta() {
                let ddl_statements = ddl::compile_meta(&mut registry, &query)?;
                let count = ddl_statements.len();
                statements.extend(ddl_statements);
                for _ in 0..count {
                    plans.push(Plan {
                        kind: query.kind,
                        target: query.target.clone(),
                        meta: QueryMeta::default(),
                    });
                }
            } else {
                let meta = compiler::query_meta(&registry, &query, compile_options)?;
                let statement = compiler::compile_query(&registry, &query, compile_options)?;
                statements.push(statement);
                plans.push(Plan {
                    kind: query.kind,
                    target: query.target.clone(),
                    meta,
                });
            }
        }

        Ok(Transaction {
            registry,
            statements,
            plans,
            options,
        })
    }

    /// The schema as of the end of the batch, reflecting every `create`/
    /// `alter`/`drop` applied along the way.
    pub fn models(&self) -> &[Model] {
        self.registry.models()
    }

    /// Shape the raw rows a caller got back from executing each statement
    /// (in the same order as [`Transaction::statements`]) into spec-shaped
    /// JSON. `row_sets[i]` must hold the rows `statements[i]` produced (an
    /// empty `Vec` for non-`returning` statements is fine and ignored).
    pub fn format_results(&self, row_sets: Vec<Vec<RawRow>>) -> Vec<Json> {
        row_sets
            .into_iter()
            .zip(self.plans.iter())
            .map(|(rows, plan)| self.format_one(plan, rows))
            .collect()
    }

    fn format_one(&self, plan: &Plan, rows: Vec<RawRow>) -> Json {
        match plan.kind {
            QueryKind::Create | QueryKind::Alter | QueryKind::Drop => Json::Null,
            QueryKind::List => match plan.target.as_str() {
                "models" => format::format_list_models(&rows),
                other => {
                    let values: Vec<Json> = rows.into_iter().filter_map(|mut r| r.remove(other)).collect();
                    Json::Object([(other.to_string(), Json::Array(values))].into_iter().collect())
                }
            },
            QueryKind::Count => format::format_count(&rows),
            QueryKind::Get => {
                let Some(model) = self.model_for(plan) else {
                    return Json::Null;
                };
                if plan.meta.singular {
                    format::format_single(model, &rows, &plan.meta.mounts)
                } else {
                    let direction = if plan.meta.paging_before {
                        PageDirection::Before
                    } else {
                        PageDirection::Initial
                    };
                    format::format_plural(
                        model,
                        rows,
                        plan.meta.requested_limit,
                        &plan.meta.ordered_columns,
                        &plan.meta.timestamp_slug,
                        direction,
                        &plan.meta.mounts,
                    )
                }
            }
            QueryKind::Add | QueryKind::Set | QueryKind::Remove => {
                let Some(model) = self.model_for(plan) else {
                    return Json::Null;
                };
                format::format_single(model, &rows, &plan.meta.mounts)
            }
        }
    }

    fn model_for(&self, plan: &Plan) -> Option<&Model> {
        self.registry.find_model(&plan.target).ok()
    }
}

/// `list.models` rows come back from the `ronin_schema` meta-table; this
/// constant documents that coupling for callers wiring up their own driver.
pub const SCHEMA_TABLE: &str = RONIN_SCHEMA_TABLE;
