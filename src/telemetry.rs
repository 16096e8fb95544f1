//! `tracing` wiring for the compile pipeline (opt-in via the `tracing`
//! feature, same convention as pgorm's `monitor` hooks). Disabled builds
//! compile this down to nothing rather than carrying a runtime branch.

#[cfg(feature = "tracing")]
pub(crate) fn trace_compiled_statement(kind: &str, target: &str, sql: &str) {
    tracing::debug!(target: "ronin_compiler.sql", kind, target, sql, "compiled statement");
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn trace_compiled_statement(_kind: &str, _target: &str, _sql: &str) {}
