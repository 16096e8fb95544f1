//! Typed query/instruction shapes.
//!
//! Per the Design Notes, untyped JSON walking is replaced with tagged sum
//! types at the one seam where it matters most: the top-level query
//! envelope and its instruction bag. Individual instruction *values*
//! (`with`, `to`, conditions) stay as `serde_json::Value` trees, since
//! [`crate::condition`] and [`crate::symbol`] already give those a typed
//! recursive grammar — duplicating that as Rust enums would just be a
//! second parser for the same shapes.

use serde_json::Value as Json;

use crate::error::{CompileError, CompileResult};

/// The nine query verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Get,
    Count,
    Add,
    Set,
    Remove,
    Create,
    Alter,
    Drop,
    List,
}

impl QueryKind {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "get" => QueryKind::Get,
            "count" => QueryKind::Count,
            "add" => QueryKind::Add,
            "set" => QueryKind::Set,
            "remove" => QueryKind::Remove,
            "create" => QueryKind::Create,
            "alter" => QueryKind::Alter,
            "drop" => QueryKind::Drop,
            "list" => QueryKind::List,
            _ => return None,
        })
    }

    pub fn is_meta(self) -> bool {
        matches!(self, QueryKind::Create | QueryKind::Alter | QueryKind::Drop)
    }

    pub fn is_write(self) -> bool {
        matches!(self, QueryKind::Add | QueryKind::Set | QueryKind::Remove)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Get => "get",
            QueryKind::Count => "count",
            QueryKind::Add => "add",
            QueryKind::Set => "set",
            QueryKind::Remove => "remove",
            QueryKind::Create => "create",
            QueryKind::Alter => "alter",
            QueryKind::Drop => "drop",
            QueryKind::List => "list",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderedBy {
    pub ascending: Vec<String>,
    pub descending: Vec<String>,
}

/// The optional clauses that can appear alongside a model reference.
#[derive(Debug, Clone, Default)]
pub struct CombinedInstructions {
    pub with: Option<Json>,
    pub to: Option<Json>,
    pub including: Option<Json>,
    pub selecting: Option<Vec<String>>,
    pub ordered_by: Option<OrderedBy>,
    pub limited_to: Option<i64>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub using: Option<Vec<String>>,
}

impl CombinedInstructions {
    pub(crate) fn parse(value: &Json) -> CompileResult<Self> {
        let Json::Object(map) = value else {
            return Err(CompileError::InvalidQueryShape(
                "instructions must be an object".to_string(),
            ));
        };

        let mut out = CombinedInstructions::default();
        for (key, val) in map {
            match key.as_str() {
                "with" => out.with = Some(val.clone()),
                "to" => out.to = Some(val.clone()),
                "including" => out.including = Some(val.clone()),
                "selecting" => {
                    let Json::Array(items) = val else {
                        return Err(CompileError::InvalidForValue {
                            instruction: "selecting".to_string(),
                            reason: "must be an array of field slugs".to_string(),
                        });
                    };
                    let mut slugs = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Json::String(s) => slugs.push(s.clone()),
                            _ => {
                                return Err(CompileError::InvalidForValue {
                                    instruction: "selecting".to_string(),
                                    reason: "entries must be strings".to_string(),
                                })
                            }
                        }
                    }
                    out.selecting = Some(slugs);
                }
                "orderedBy" => {
                    let Json::Object(ord) = val else {
                        return Err(CompileError::InvalidForValue {
                            instruction: "orderedBy".to_string(),
                            reason: "must be an object with ascending/descending arrays".to_string(),
                        });
                    };
                    let read_list = |field: &str| -> CompileResult<Vec<String>> {
                        match ord.get(field) {
                            None => Ok(Vec::new()),
                            Some(Json::Array(items)) => items
                                .iter()
                                .map(|v| {
                                    v.as_str().map(str::to_string).ok_or_else(|| {
                                        CompileError::InvalidForValue {
                                            instruction: "orderedBy".to_string(),
                                            reason: format!("{field} entries must be strings"),
                                        }
                                    })
                                })
                                .collect(),
                            Some(_) => Err(CompileError::InvalidForValue {
                                instruction: "orderedBy".to_string(),
                                reason: format!("{field} must be an array"),
                            }),
                        }
                    };
                    out.ordered_by = Some(OrderedBy {
                        ascending: read_list("ascending")?,
                        descending: read_list("descending")?,
                    });
                }
                "limitedTo" => {
                    out.limited_to = Some(val.as_i64().ok_or_else(|| CompileError::InvalidForValue {
                        instruction: "limitedTo".to_string(),
                        reason: "must be an integer".to_string(),
                    })?);
                }
                "before" => {
                    out.before = Some(val.as_str().map(str::to_string).ok_or_else(|| {
                        CompileError::InvalidBeforeOrAfterInstruction("`before` must be a string cursor".to_string())
                    })?);
                }
                "after" => {
                    out.after = Some(val.as_str().map(str::to_string).ok_or_else(|| {
                        CompileError::InvalidBeforeOrAfterInstruction("`after` must be a string cursor".to_string())
                    })?);
                }
                "using" => {
                    let slugs = match val {
                        Json::Array(items) => items
                            .iter()
                            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| {
                                CompileError::InvalidForValue {
                                    instruction: "using".to_string(),
                                    reason: "entries must be strings".to_string(),
                                }
                            }))
                            .collect::<CompileResult<Vec<_>>>()?,
                        _ => {
                            return Err(CompileError::InvalidForValue {
                                instruction: "using".to_string(),
                                reason: "must be an array of preset slugs".to_string(),
                            })
                        }
                    };
                    out.using = Some(slugs);
                }
                other => {
                    return Err(CompileError::InvalidQueryShape(format!(
                        "unknown instruction key '{other}'"
                    )))
                }
            }
        }

        if out.before.is_some() && out.after.is_some() {
            return Err(CompileError::MutuallyExclusiveInstructions("before", "after"));
        }

        Ok(out)
    }
}

/// One parsed top-level query: `{ <verb>: { <model_slug_or_plural>: <instructions or meta body> } }`.
#[derive(Debug, Clone)]
pub struct Query {
    pub kind: QueryKind,
    /// The model slug/plural-slug, or (for `list`) the meta entity name
    /// (`models`, `fields`, `indexes`, `triggers`, `presets`).
    pub target: String,
    pub instructions: Option<CombinedInstructions>,
    /// Raw instructions body, kept for meta-query (C7) parsing, which has
    /// its own shape distinct from `CombinedInstructions`.
    pub raw: Json,
}

impl Query {
    pub fn parse(value: &Json) -> CompileResult<Self> {
        let Json::Object(map) = value else {
            return Err(CompileError::InvalidQueryShape("query must be an object".to_string()));
        };
        if map.len() != 1 {
            return Err(CompileError::InvalidQueryShape(
                "query must have exactly one top-level verb key".to_string(),
            ));
        }
        let (verb, body) = map.iter().next().unwrap();
        let kind = QueryKind::from_key(verb)
            .ok_or_else(|| CompileError::InvalidQueryShape(format!("unknown query verb '{verb}'")))?;

        let Json::Object(body_map) = body else {
            return Err(CompileError::InvalidQueryShape(format!(
                "body of '{verb}' must be an object with one model key"
            )));
        };
        if body_map.len() != 1 {
            return Err(CompileError::InvalidQueryShape(format!(
                "body of '{verb}' must have exactly one model key"
            )));
        }
        let (target, inner) = body_map.iter().next().unwrap();

        let instructions = if kind.is_meta() || kind == QueryKind::List {
            None
        } else {
            match inner {
                Json::Null => None,
                other => Some(CombinedInstructions::parse(other)?),
            }
        };

        Ok(Query {
            kind,
            target: target.clone(),
            instructions,
            raw: inner.clone(),
        })
    }
}
