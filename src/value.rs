//! Value Binder (C1).
//!
//! Normalizes a scalar/JSON value, appends it to a transaction's parameter
//! list, and returns the `?N` placeholder that refers to it. This is the
//! compiler's analogue of `pgorm::sql::Sql::push_bind` — but since query
//! input here is untyped JSON rather than `T: ToSql`, parameters are
//! normalized into [`Param`] up front instead of boxed as trait objects.

use serde_json::Value as Json;

/// A single bound SQL parameter, normalized from an input JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Param {
    /// Render this parameter as a SQL literal for inline mode (DDL trigger
    /// bodies, where parameters are disallowed).
    pub fn to_inline_sql(&self) -> String {
        match self {
            Param::Null => "NULL".to_string(),
            Param::Integer(i) => i.to_string(),
            Param::Real(f) => f.to_string(),
            Param::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Param::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                format!("x'{hex}'")
            }
        }
    }
}

impl From<&Json> for Param {
    fn from(value: &Json) -> Self {
        match value {
            Json::Null => Param::Null,
            Json::Bool(b) => Param::Integer(if *b { 1 } else { 0 }),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Param::Integer(i)
                } else {
                    Param::Real(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => Param::Text(s.clone()),
            Json::Array(_) | Json::Object(_) => {
                Param::Text(serde_json::to_string(value).unwrap_or_default())
            }
        }
    }
}

/// A growable, positionally-indexed list of bound parameters plus a flag
/// controlling whether values are bound (`?N`) or rendered inline.
///
/// Mirrors the role of `pgorm::sql::Sql`'s internal parameter vector, but
/// split out as its own type since both the condition compiler and the DDL
/// compiler need to share one parameter list across many fragments.
#[derive(Debug, Default)]
pub struct Binder {
    params: Vec<Param>,
    /// When true, `bind` does not append to `params` and instead returns the
    /// value's literal SQL text (used for trigger body DDL).
    pub inline: bool,
}

impl Binder {
    pub fn new(inline: bool) -> Self {
        Self {
            params: Vec::new(),
            inline,
        }
    }

    /// Number of parameters bound so far.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_params(self) -> Vec<Param> {
        self.params
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Bind a JSON value, returning either a `?N` placeholder or (in inline
    /// mode) the literal SQL text.
    ///
    /// `bind_null`: when false (the default call site for WHERE/condition
    /// positions), a JSON null is rendered as the bare `NULL` keyword rather
    /// than bound as a parameter, matching spec.md §4.1.
    pub fn bind(&mut self, value: &Json, bind_null: bool) -> String {
        if !bind_null && value.is_null() {
            return "NULL".to_string();
        }
        let param = Param::from(value);
        self.bind_param(param)
    }

    /// Bind an already-normalized parameter.
    pub fn bind_param(&mut self, param: Param) -> String {
        if self.inline {
            return param.to_inline_sql();
        }
        self.params.push(param);
        format!("?{}", self.params.len())
    }
}
