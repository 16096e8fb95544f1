//! `before`/`after` pagination cursor codec and WHERE-clause injection
//! (spec.md §4.5, §4.8).
//!
//! A cursor is a comma-separated list of the ordered-column values for the
//! last-seen row, followed by its 13-digit millisecond creation timestamp.
//! Comparisons use SQLite row-value syntax (`(a, b) > (?, ?)`) so the
//! keyset predicate stays a single, easily-bound expression.

use serde_json::Value as Json;

use crate::error::CompileError;
use crate::ident::Ident;
use crate::value::Binder;

#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub values: Vec<String>,
    pub timestamp_ms: i64,
}

pub fn decode(raw: &str) -> Result<Cursor, CompileError> {
    if raw.is_empty() {
        return Err(CompileError::InvalidBeforeOrAfterInstruction(
            "cursor is empty".to_string(),
        ));
    }
    let parts: Vec<&str> = raw.split(',').collect();
    let (last, rest) = parts.split_last().expect("non-empty cursor has a last segment");

    if last.len() != 13 || !last.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CompileError::InvalidBeforeOrAfterInstruction(
            "cursor must end in a 13-digit millisecond timestamp".to_string(),
        ));
    }
    let timestamp_ms: i64 = last
        .parse()
        .map_err(|_| CompileError::InvalidBeforeOrAfterInstruction("cursor timestamp is not numeric".to_string()))?;

    Ok(Cursor {
        values: rest.iter().map(|s| s.to_string()).collect(),
        timestamp_ms,
    })
}

pub fn encode(values: &[String], timestamp_ms: i64) -> String {
    let mut parts = values.to_vec();
    parts.push(timestamp_ms.to_string());
    parts.join(",")
}

/// Build the keyset WHERE fragment comparing `ordered_columns` (already
/// quoted selectors, in the query's ordering sequence) plus the timestamp
/// column against the decoded cursor.
pub fn compile_where(
    ordered_columns: &[String],
    timestamp_column: &str,
    cursor: &Cursor,
    before: bool,
    binder: &mut Binder,
) -> Result<String, CompileError> {
    if cursor.values.len() != ordered_columns.len() {
        return Err(CompileError::InvalidBeforeOrAfterInstruction(format!(
            "cursor has {} value(s) but query orders by {} column(s)",
            cursor.values.len(),
            ordered_columns.len()
        )));
    }

    let op = if before { "<" } else { ">" };
    let timestamp_ident = Ident::quoted(timestamp_column)?.to_sql();

    let mut columns = ordered_columns.to_vec();
    columns.push(timestamp_ident);

    let mut placeholders = Vec::with_capacity(columns.len());
    for v in &cursor.values {
        placeholders.push(binder.bind(&Json::String(v.clone()), false));
    }
    placeholders.push(binder.bind(&Json::Number(cursor.timestamp_ms.into()), false));

    if columns.len() == 1 {
        Ok(format!("{} {} {}", columns[0], op, placeholders[0]))
    } else {
        Ok(format!(
            "({}) {} ({})",
            columns.join(", "),
            op,
            placeholders.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_single_value_cursor() {
        let cursor = decode("acc_abc,1700000000000").unwrap();
        assert_eq!(cursor.values, vec!["acc_abc".to_string()]);
        assert_eq!(cursor.timestamp_ms, 1700000000000);
    }

    #[test]
    fn decode_rejects_short_timestamp() {
        assert!(decode("acc_abc,123").is_err());
    }

    #[test]
    fn round_trip() {
        let encoded = encode(&["acc_abc".to_string()], 1700000000000);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.values, vec!["acc_abc".to_string()]);
        assert_eq!(decoded.timestamp_ms, 1700000000000);
    }

    #[test]
    fn compile_where_single_column() {
        let cursor = Cursor {
            values: vec![],
            timestamp_ms: 1700000000000,
        };
        let mut binder = Binder::new(false);
        let sql = compile_where(&[], "ronin.createdAt", &cursor, false, &mut binder).unwrap();
        assert_eq!(sql, r#""ronin.createdAt" > ?1"#);
    }

    #[test]
    fn compile_where_multi_column_row_value() {
        let cursor = Cursor {
            values: vec!["elaine".to_string()],
            timestamp_ms: 1700000000000,
        };
        let mut binder = Binder::new(false);
        let sql = compile_where(
            &[r#""handle""#.to_string()],
            "ronin.createdAt",
            &cursor,
            true,
            &mut binder,
        )
        .unwrap();
        assert_eq!(sql, r#"("handle", "ronin.createdAt") < (?1, ?2)"#);
    }
}
