//! # ronin-compiler
//!
//! Compiles a JSON query DSL — get/count/add/set/remove data queries,
//! create/alter/drop schema queries, and list meta-reads — against a schema
//! catalogue into parameterized SQLite statements, and reshapes the raw rows
//! a caller executes them to get back into nested records.
//!
//! This crate never opens a database connection. [`Transaction`] is the
//! entry point: give it a schema and a batch of raw queries, get back
//! [`Statement`]s to run yourself, then hand the resulting rows to
//! [`Transaction::format_results`].
//!
//! ## Pipeline
//!
//! - [`model`] — the schema catalogue: [`Model`], [`Registry`], field/index/
//!   trigger/preset types.
//! - [`symbol`] / [`condition`] — the `__RONIN_*` marker grammar and
//!   condition-tree compilation shared by every instruction.
//! - [`instructions`] — one module per query instruction (`with`, `to`,
//!   `including`, `selecting`, `orderedBy`, `limitedTo`, `before`/`after`,
//!   `using`).
//! - [`query`] — the typed query envelope instructions parse into.
//! - [`compiler`] — turns a parsed data query into a [`Statement`].
//! - [`ddl`] — turns a parsed meta query (`create`/`alter`/`drop`) into
//!   schema-mutating [`Statement`]s, mutating the [`Registry`] as it goes.
//! - [`format`] — turns raw rows back into spec-shaped JSON records.
//! - [`transaction`] — batches the above into one schema-consistent pass.

pub mod compiler;
pub mod condition;
pub mod ddl;
pub mod error;
pub mod format;
pub mod ident;
pub mod instructions;
pub mod model;
pub mod query;
pub mod statement;
pub mod symbol;
mod telemetry;
pub mod transaction;
pub mod value;

pub use compiler::{CompileOptions, QueryMeta};
pub use error::{CompileError, CompileResult};
pub use model::{Field, FieldType, Model, Registry};
pub use query::{Query, QueryKind};
pub use statement::Statement;
pub use transaction::{Transaction, TransactionOptions};
