//! `orderedBy` compilation (spec.md §4.5).

use crate::error::CompileResult;
use crate::ident::Ident;
use crate::model::{FieldType, Model};
use crate::query::OrderedBy;

fn order_entry(model: &Model, slug: &str, descending: bool) -> CompileResult<String> {
    let ident = Ident::quoted(slug)?.to_sql();
    let collate = match model.find_field(slug) {
        Some(field) if matches!(field.field_type, FieldType::String) => " COLLATE NOCASE",
        _ => "",
    };
    let dir = if descending { "DESC" } else { "ASC" };
    Ok(format!("{ident}{collate} {dir}"))
}

/// Build the `ORDER BY ...` clause (without the leading keyword check —
/// callers splice the returned text verbatim after `ORDER BY `), or `None`
/// when no ordering applies.
///
/// `plural` selects the spec's default: a plural `get` with no explicit
/// ordering defaults to `"ronin.createdAt" DESC`; a singular `get` has no
/// default order.
pub fn compile(model: &Model, ordered_by: Option<&OrderedBy>, plural: bool) -> CompileResult<Option<String>> {
    match ordered_by {
        Some(o) if !o.ascending.is_empty() || !o.descending.is_empty() => {
            let mut parts = Vec::with_capacity(o.ascending.len() + o.descending.len());
            for slug in &o.ascending {
                parts.push(order_entry(model, slug, false)?);
            }
            for slug in &o.descending {
                parts.push(order_entry(model, slug, true)?);
            }
            Ok(Some(parts.join(", ")))
        }
        _ => {
            if plural {
                Ok(Some(r#""ronin.createdAt" DESC"#.to_string()))
            } else {
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Identifiers};

    fn model() -> Model {
        let mut handle = Field::system("handle", FieldType::String);
        handle.required = true;
        Model {
            slug: "account".to_string(),
            plural_slug: "accounts".to_string(),
            name: None,
            plural_name: None,
            id_prefix: Some("acc".to_string()),
            table: Some("accounts".to_string()),
            identifiers: Identifiers::default(),
            fields: vec![handle],
            indexes: vec![],
            triggers: vec![],
            presets: vec![],
        }
    }

    #[test]
    fn default_plural_ordering() {
        let sql = compile(&model(), None, true).unwrap().unwrap();
        assert_eq!(sql, r#""ronin.createdAt" DESC"#);
    }

    #[test]
    fn no_default_for_singular() {
        assert!(compile(&model(), None, false).unwrap().is_none());
    }

    #[test]
    fn string_field_gets_nocase_collation() {
        let ordered = OrderedBy {
            ascending: vec!["handle".to_string()],
            descending: vec![],
        };
        let sql = compile(&model(), Some(&ordered), true).unwrap().unwrap();
        assert_eq!(sql, r#""handle" COLLATE NOCASE ASC"#);
    }

    #[test]
    fn ascending_then_descending_order() {
        let ordered = OrderedBy {
            ascending: vec!["handle".to_string()],
            descending: vec!["ronin.createdAt".to_string()],
        };
        let sql = compile(&model(), Some(&ordered), true).unwrap().unwrap();
        assert_eq!(sql, r#""handle" COLLATE NOCASE ASC, "ronin.createdAt" DESC"#);
    }
}
