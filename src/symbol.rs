//! Symbol Recognizer (C2).
//!
//! Detects the sentinel shapes embedded anywhere in a RONIN query's JSON
//! value tree (sub-query, raw expression, field reference, preset-value
//! placeholder) and translates raw-expression strings into SQL snippets.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as Json;

/// Sentinel marker literal for a nested sub-query.
pub const MARKER_QUERY: &str = "__RONIN_QUERY";
/// Sentinel marker literal for a raw SQL expression.
pub const MARKER_EXPRESSION: &str = "__RONIN_EXPRESSION";
/// Sentinel marker literal for a preset-value placeholder.
pub const MARKER_VALUE: &str = "__RONIN_VALUE";

const PREFIX_FIELD: &str = "__RONIN_FIELD_";
const PREFIX_PARENT: &str = "__RONIN_FIELD_PARENT_";
const PREFIX_OLD: &str = "__RONIN_FIELD_PARENT_OLD_";
const PREFIX_NEW: &str = "__RONIN_FIELD_PARENT_NEW_";

/// Which table a field reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// The model currently being compiled.
    Current,
    /// The enclosing (parent) query's model.
    Parent,
    /// The `OLD` row in a trigger body.
    Old,
    /// The `NEW` row in a trigger body.
    New,
}

/// A recognized sentinel value.
#[derive(Debug, Clone)]
pub enum Symbol<'a> {
    /// A nested sub-query: the inner query JSON value.
    Query(&'a Json),
    /// A raw SQL expression string that may itself contain field markers.
    Expression(&'a str),
    /// A reference to a field, scoped to current/parent/old/new.
    FieldRef { scope: FieldScope, path: String },
    /// The preset-value placeholder.
    PresetValue,
}

/// Classify a JSON value as one of the sentinel shapes, or `None` if it is
/// an ordinary value.
///
/// Ordering is stable: for object values, `__RONIN_QUERY` is checked before
/// `__RONIN_EXPRESSION`. Field refs are only ever recognized on strings.
pub fn classify(value: &Json) -> Option<Symbol<'_>> {
    match value {
        Json::Object(map) => {
            if let Some(inner) = map.get(MARKER_QUERY) {
                return Some(Symbol::Query(inner));
            }
            if let Some(Json::String(expr)) = map.get(MARKER_EXPRESSION) {
                return Some(Symbol::Expression(expr.as_str()));
            }
            None
        }
        Json::String(s) => classify_field_ref_str(s),
        _ => None,
    }
}

fn classify_field_ref_str(s: &str) -> Option<Symbol<'static>> {
    if s == MARKER_VALUE {
        return Some(Symbol::PresetValue);
    }
    if let Some(path) = s.strip_prefix(PREFIX_OLD) {
        return Some(Symbol::FieldRef {
            scope: FieldScope::Old,
            path: path.to_string(),
        });
    }
    if let Some(path) = s.strip_prefix(PREFIX_NEW) {
        return Some(Symbol::FieldRef {
            scope: FieldScope::New,
            path: path.to_string(),
        });
    }
    if let Some(path) = s.strip_prefix(PREFIX_PARENT) {
        return Some(Symbol::FieldRef {
            scope: FieldScope::Parent,
            path: path.to_string(),
        });
    }
    if let Some(path) = s.strip_prefix(PREFIX_FIELD) {
        return Some(Symbol::FieldRef {
            scope: FieldScope::Current,
            path: path.to_string(),
        });
    }
    None
}

/// Is this string a bare field-ref marker (used by the condition compiler to
/// decide whether a `with`/`to` leaf value is a column-to-column reference
/// rather than a bound literal)?
pub fn is_field_ref(s: &str) -> bool {
    s.starts_with(PREFIX_FIELD)
}

fn field_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"__RONIN_FIELD_(?:PARENT_(?:OLD_|NEW_)?)?[A-Za-z0-9_.\[\]]+")
            .expect("invalid built-in field-marker regex")
    })
}

/// Translate every field marker embedded in a raw expression string into a
/// quoted SQL column selector.
///
/// `resolve` is called once per marker occurrence with the parsed scope and
/// dotted path, and must return the selector to splice in (e.g.
/// `"accounts"."id"` or `NEW."email"`). Returns the rewritten SQL plus
/// whether any `Parent`/`Old`/`New` reference was seen — the caller (C6)
/// uses this to decide whether the outer SELECT needs sub-SELECT wrapping.
pub fn translate_expression<F>(expr: &str, mut resolve: F) -> (String, bool)
where
    F: FnMut(FieldScope, &str) -> String,
{
    let re = field_marker_regex();
    let mut saw_parent_ref = false;
    let mut out = String::with_capacity(expr.len());
    let mut last_end = 0;

    for m in re.find_iter(expr) {
        out.push_str(&expr[last_end..m.start()]);
        let marker = m.as_str();
        let Some(Symbol::FieldRef { scope, path }) = classify_field_ref_str(marker) else {
            out.push_str(marker);
            last_end = m.end();
            continue;
        };
        if !matches!(scope, FieldScope::Current) {
            saw_parent_ref = true;
        }
        out.push_str(&resolve(scope, &path));
        last_end = m.end();
    }
    out.push_str(&expr[last_end..]);

    (out, saw_parent_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_query_before_expression_when_both_present() {
        let v = json!({"__RONIN_QUERY": {"get": {"account": null}}, "__RONIN_EXPRESSION": "x"});
        assert!(matches!(classify(&v), Some(Symbol::Query(_))));
    }

    #[test]
    fn classify_expression() {
        let v = json!({"__RONIN_EXPRESSION": "__RONIN_FIELD_id"});
        assert!(matches!(classify(&v), Some(Symbol::Expression(_))));
    }

    #[test]
    fn classify_field_ref_current() {
        let v = json!("__RONIN_FIELD_handle");
        match classify(&v) {
            Some(Symbol::FieldRef { scope, path }) => {
                assert_eq!(scope, FieldScope::Current);
                assert_eq!(path, "handle");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn classify_field_ref_parent() {
        let v = json!("__RONIN_FIELD_PARENT_account");
        match classify(&v) {
            Some(Symbol::FieldRef { scope, path }) => {
                assert_eq!(scope, FieldScope::Parent);
                assert_eq!(path, "account");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn classify_field_ref_old_new() {
        match classify(&json!("__RONIN_FIELD_PARENT_OLD_email")) {
            Some(Symbol::FieldRef { scope, path }) => {
                assert_eq!(scope, FieldScope::Old);
                assert_eq!(path, "email");
            }
            other => panic!("unexpected: {other:?}"),
        }
        match classify(&json!("__RONIN_FIELD_PARENT_NEW_email")) {
            Some(Symbol::FieldRef { scope, path }) => {
                assert_eq!(scope, FieldScope::New);
                assert_eq!(path, "email");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn classify_preset_value() {
        assert!(matches!(
            classify(&json!("__RONIN_VALUE")),
            Some(Symbol::PresetValue)
        ));
    }

    #[test]
    fn classify_plain_values_are_none() {
        assert!(classify(&json!("elaine")).is_none());
        assert!(classify(&json!(42)).is_none());
        assert!(classify(&json!({"handle": "elaine"})).is_none());
    }

    #[test]
    fn translate_expression_rewrites_current_and_parent() {
        let (sql, saw_parent) = translate_expression(
            "__RONIN_FIELD_PARENT_account = __RONIN_FIELD_id",
            |scope, path| match scope {
                FieldScope::Parent => format!(r#""members"."{path}""#),
                FieldScope::Current => format!(r#""accounts"."{path}""#),
                FieldScope::Old => format!(r#"OLD."{path}""#),
                FieldScope::New => format!(r#"NEW."{path}""#),
            },
        );
        assert_eq!(sql, r#""members"."account" = "accounts"."id""#);
        assert!(saw_parent);
    }

    #[test]
    fn translate_expression_no_parent_ref() {
        let (sql, saw_parent) =
            translate_expression("__RONIN_FIELD_id = 1", |_, path| format!(r#""t"."{path}""#));
        assert_eq!(sql, r#""t"."id" = 1"#);
        assert!(!saw_parent);
    }

    #[test]
    fn translate_expression_leaves_non_marker_text_untouched() {
        let (sql, saw_parent) = translate_expression("1 = 1", |_, path| path.to_string());
        assert_eq!(sql, "1 = 1");
        assert!(!saw_parent);
    }
}
