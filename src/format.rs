//! Result Formatter (C8).
//!
//! Turns the flat rows a caller gets back from executing a `Statement`
//! into the nested record shapes spec.md §6 describes, the mirror image of
//! what `crate::compiler` flattened via dotted `AS "<slug>"` aliases.
//!
//! Per the Design Notes this module never returns a `CompileError` —
//! malformed or missing data degrades to a default (`null`, `false`, the
//! raw string) rather than failing a read that already happened.

use serde_json::{Map, Value as Json};

use crate::instructions::cursor;
use crate::instructions::Mount;
use crate::model::{Field, FieldType, Model};

/// One raw row: column alias (matching [`crate::instructions::selecting`]'s
/// `AS "<slug>"` naming, dots and all) to its driver-returned value.
pub type RawRow = Map<String, Json>;

/// Which pagination instruction produced the page being formatted, which
/// decides whether a lookahead row becomes `moreBefore` or `moreAfter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    /// No `before`/`after` cursor was given — the first page.
    Initial,
    Before,
    After,
}

fn coerce_field_value(field: &Field, raw: Json) -> Json {
    match field.field_type {
        FieldType::Boolean => match raw {
            Json::Null if field.slug == "ronin.locked" => Json::Bool(false),
            Json::Null => Json::Null,
            Json::Number(n) => Json::Bool(n.as_i64().map(|v| v != 0).unwrap_or(false)),
            Json::Bool(b) => Json::Bool(b),
            other => other,
        },
        FieldType::Json => match raw {
            Json::String(s) => serde_json::from_str(&s).unwrap_or(Json::String(s)),
            other => other,
        },
        _ => raw,
    }
}

/// One step of a column alias's path back into a nested record. A column
/// alias splits on `.` into dotted segments, and each dotted segment can
/// itself carry one or more `[N]` array-index suffixes (spec.md §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse a column alias like `"members.tags[0]"` into
/// `[Key(members), Key(tags), Index(0)]`.
fn parse_path(column: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for piece in column.split('.') {
        parse_path_piece(piece, &mut segments);
    }
    segments
}

fn parse_path_piece(piece: &str, out: &mut Vec<PathSegment>) {
    match piece.find('[') {
        None => out.push(PathSegment::Key(piece.to_string())),
        Some(bracket_at) => {
            out.push(PathSegment::Key(piece[..bracket_at].to_string()));
            let mut rest = &piece[bracket_at..];
            while let Some(end) = rest.find(']') {
                if let Ok(index) = rest[1..end].parse::<usize>() {
                    out.push(PathSegment::Index(index));
                }
                rest = &rest[end + 1..];
            }
        }
    }
}

fn ensure_object(target: &mut Json) -> &mut Map<String, Json> {
    if !target.is_object() {
        *target = Json::Object(Map::new());
    }
    target.as_object_mut().expect("just coerced to object")
}

fn ensure_array(target: &mut Json) -> &mut Vec<Json> {
    if !target.is_array() {
        *target = Json::Array(Vec::new());
    }
    target.as_array_mut().expect("just coerced to array")
}

/// Mount `value` at `path` inside `target`, creating intervening objects
/// (for `Key` segments) and arrays (for `Index` segments, zero-padded with
/// `null` up to the index) as needed.
fn insert_nested(target: &mut Json, path: &[PathSegment], value: Json) {
    match path.split_first() {
        None => *target = value,
        Some((PathSegment::Key(key), rest)) => {
            let obj = ensure_object(target);
            let entry = obj.entry(key.clone()).or_insert(Json::Null);
            insert_nested(entry, rest, value);
        }
        Some((PathSegment::Index(index), rest)) => {
            let arr = ensure_array(target);
            while arr.len() <= *index {
                arr.push(Json::Null);
            }
            insert_nested(&mut arr[*index], rest, value);
        }
    }
}

fn path_starts_with(path: &[PathSegment], prefix: &[String]) -> bool {
    path.len() >= prefix.len()
        && path
            .iter()
            .zip(prefix.iter())
            .all(|(seg, key)| matches!(seg, PathSegment::Key(k) if k == key))
}

/// Reconstruct one nested record from a flat raw row, skipping any column
/// whose alias falls under one of `exclude_prefixes` — those belong to a
/// many-cardinality `including` mount and are assembled separately by
/// [`nest_rows`] instead, folded across every row sharing the same root
/// `id`. Columns addressing a modeled field (by exact slug, including
/// slugs with literal dots like `ronin.createdAt`) get that field's type
/// coercion; unrecognized columns (ephemeral `including` computations, or
/// a joined side's own columns) pass through unchanged.
fn nest_row_excluding(model: &Model, row: &RawRow, exclude_prefixes: &[Vec<String>]) -> Json {
    let mut out = Json::Object(Map::new());
    for (column, value) in row {
        let path = parse_path(column);
        if exclude_prefixes.iter().any(|prefix| path_starts_with(&path, prefix)) {
            continue;
        }
        let coerced = match model.find_field(column) {
            Some(field) => coerce_field_value(field, value.clone()),
            None => value.clone(),
        };
        insert_nested(&mut out, &path, coerced);
    }
    out
}

/// Reconstruct one nested record from a flat raw row with no many-mount
/// folding — every column nests under its own alias. Singular `including`
/// joins and ephemeral columns are always shaped correctly by this alone;
/// it is only a plural joined side, whose rows repeat the root `id`, that
/// needs the grouping [`nest_rows`] does instead.
pub fn nest_row(model: &Model, row: &RawRow) -> Json {
    nest_row_excluding(model, row, &[])
}

fn mount_prefix(mount: &Mount) -> Vec<String> {
    if mount.path.is_empty() {
        Vec::new()
    } else {
        mount.path.split('.').map(|s| s.to_string()).collect()
    }
}

/// Pull one row's slice of a many-mount's columns into its own nested
/// value. Returns `None` when the row carries no column under `prefix`, or
/// every such column is `NULL` (an unmatched `LEFT JOIN` side) — the caller
/// folds that into an empty array rather than a row of nulls (spec.md
/// §4.8).
fn mount_child(row: &RawRow, prefix: &[String]) -> Option<Json> {
    let mut child = Json::Null;
    let mut matched = false;
    let mut any_non_null = false;
    for (column, value) in row {
        let path = parse_path(column);
        if !path_starts_with(&path, prefix) {
            continue;
        }
        matched = true;
        if !value.is_null() {
            any_non_null = true;
        }
        insert_nested(&mut child, &path[prefix.len()..], value.clone());
    }
    (matched && any_non_null).then_some(child)
}

fn array_at<'a>(root: &'a mut Json, prefix: &[String]) -> Option<&'a mut Vec<Json>> {
    let mut current = root;
    for key in prefix {
        current = current.as_object_mut()?.get_mut(key)?;
    }
    current.as_array_mut()
}

/// Reconstruct nested records from a driver's flat rows, the mirror image
/// of what `crate::compiler` flattened. A many-cardinality `including` join
/// (spec.md §4.5/§4.8) repeats the root record's `id` once per joined row —
/// this groups consecutive same-`id` rows into a single record, merging
/// each one's many-mount slice into that record's array instead of
/// producing one record per physical row. Returns each group's record
/// alongside the raw row it started from, for pagination's lookahead-row
/// cursor.
pub fn nest_rows<'a>(model: &Model, rows: &'a [RawRow], mounts: &[Mount]) -> Vec<(Json, &'a RawRow)> {
    let many_mounts: Vec<(&Mount, Vec<String>)> = mounts
        .iter()
        .filter(|m| m.many && !m.path.is_empty())
        .map(|m| (m, mount_prefix(m)))
        .collect();
    let exclude_prefixes: Vec<Vec<String>> = many_mounts.iter().map(|(_, p)| p.clone()).collect();

    let mut groups: Vec<(Json, &'a RawRow)> = Vec::new();
    let mut current_id: Option<&Json> = None;

    for raw_row in rows {
        let row_id = raw_row.get("id");
        let same_group = matches!((current_id, row_id), (Some(a), Some(b)) if a == b);

        if same_group {
            let (record, _) = groups.last_mut().expect("same_group implies a prior group");
            for (_, prefix) in &many_mounts {
                if let Some(child) = mount_child(raw_row, prefix) {
                    if let Some(arr) = array_at(record, prefix) {
                        arr.push(child);
                    }
                }
            }
        } else {
            let mut record = nest_row_excluding(model, raw_row, &exclude_prefixes);
            for (_, prefix) in &many_mounts {
                let seed = match mount_child(raw_row, prefix) {
                    Some(child) => vec![child],
                    None => vec![],
                };
                let path: Vec<PathSegment> = prefix.iter().cloned().map(PathSegment::Key).collect();
                insert_nested(&mut record, &path, Json::Array(seed));
            }
            groups.push((record, raw_row));
            current_id = row_id;
        }
    }

    groups
}

fn model_fields_json(model: &Model) -> Json {
    serde_json::to_value(&model.fields).unwrap_or(Json::Array(Vec::new()))
}

/// Shape a singular `get`'s rows into `{record, modelFields}`. `record` is
/// `null` when no row matched. A singular parent joined to a many-mount
/// side can still arrive as multiple physical rows sharing one `id` — only
/// the first group is taken, already folded by [`nest_rows`].
pub fn format_single(model: &Model, rows: &[RawRow], mounts: &[Mount]) -> Json {
    let record = nest_rows(model, rows, mounts)
        .into_iter()
        .next()
        .map(|(record, _)| record)
        .unwrap_or(Json::Null);
    let mut out = Map::new();
    out.insert("record".to_string(), record);
    out.insert("modelFields".to_string(), model_fields_json(model));
    Json::Object(out)
}

fn json_to_cursor_value(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_timestamp_ms(raw: &Json) -> Option<i64> {
    let text = raw.as_str()?;
    chrono::DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.timestamp_millis())
}

fn build_cursor(row: &RawRow, ordered_columns: &[String], timestamp_slug: &str) -> Option<String> {
    let mut values = Vec::with_capacity(ordered_columns.len());
    for col in ordered_columns {
        values.push(json_to_cursor_value(row.get(col)?));
    }
    let timestamp_ms = parse_timestamp_ms(row.get(timestamp_slug)?)?;
    Some(cursor::encode(&values, timestamp_ms))
}

/// Shape a plural `get`'s rows into `{records, modelFields, moreBefore?,
/// moreAfter?}`. `rows` may include the lookahead row C6 requested beyond
/// `requested_limit` (spec.md §4.5) — that row is trimmed off and used only
/// to derive the page-continuation cursor, never returned as a record.
/// Rows are grouped by root `id` ([`nest_rows`]) before the lookahead trim,
/// so a many-mount join that repeats a root's `id` across several physical
/// rows still counts as one record against `requested_limit`.
pub fn format_plural(
    model: &Model,
    rows: Vec<RawRow>,
    requested_limit: Option<i64>,
    ordered_columns: &[String],
    timestamp_slug: &str,
    direction: PageDirection,
    mounts: &[Mount],
) -> Json {
    let mut groups = nest_rows(model, &rows, mounts);

    let mut has_more = false;
    if let Some(limit) = requested_limit {
        if groups.len() as i64 > limit {
            has_more = true;
            groups.truncate(limit.max(0) as usize);
        }
    }

    let continuation = has_more
        .then(|| groups.last())
        .flatten()
        .and_then(|(_, raw_row)| build_cursor(raw_row, ordered_columns, timestamp_slug));

    let records: Vec<Json> = groups.into_iter().map(|(record, _)| record).collect();

    let mut out = Map::new();
    out.insert("records".to_string(), Json::Array(records));
    out.insert("modelFields".to_string(), model_fields_json(model));
    if let Some(cursor) = continuation {
        match direction {
            PageDirection::Before => {
                out.insert("moreBefore".to_string(), Json::String(cursor));
            }
            PageDirection::Initial | PageDirection::After => {
                out.insert("moreAfter".to_string(), Json::String(cursor));
            }
        }
    }
    Json::Object(out)
}

/// Shape a `count`'s single row into `{amount}`.
pub fn format_count(rows: &[RawRow]) -> Json {
    let amount = rows
        .first()
        .and_then(|row| row.get("amount"))
        .cloned()
        .unwrap_or_else(|| Json::Number(0.into()));
    let mut out = Map::new();
    out.insert("amount".to_string(), amount);
    Json::Object(out)
}

/// Shape `list.models`'s rows into `{models: {<slug>: <model>, ...}}`. Each
/// row is a `ronin_schema` record with a `data` column holding the
/// serialized [`Model`].
pub fn format_list_models(rows: &[RawRow]) -> Json {
    let mut models = Map::new();
    for row in rows {
        let Some(Json::String(slug)) = row.get("slug") else { continue };
        let data = row
            .get("data")
            .map(|v| match v {
                Json::String(s) => serde_json::from_str(s).unwrap_or(Json::Null),
                other => other.clone(),
            })
            .unwrap_or(Json::Null);
        models.insert(slug.clone(), data);
    }
    let mut out = Map::new();
    out.insert("models".to_string(), Json::Object(models));
    Json::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Identifiers, LinkKind};
    use serde_json::json;

    fn account_model() -> Model {
        let mut handle = Field::system("handle", FieldType::String);
        handle.required = true;
        let mut locked = Field::system("ronin.locked", FieldType::Boolean);
        locked.default_value = Some(json!(false));
        let mut created_at = Field::system("ronin.createdAt", FieldType::Date);
        created_at.required = true;
        let mut meta = Field::system("meta", FieldType::Json);
        meta.kind = LinkKind::One;

        Model {
            slug: "account".to_string(),
            plural_slug: "accounts".to_string(),
            name: None,
            plural_name: None,
            id_prefix: Some("acc".to_string()),
            table: Some("accounts".to_string()),
            identifiers: Identifiers::default(),
            fields: vec![
                Field::system("id", FieldType::String),
                locked,
                created_at,
                handle,
                meta,
            ],
            indexes: vec![],
            triggers: vec![],
            presets: vec![],
        }
    }

    fn row(pairs: &[(&str, Json)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn nest_row_groups_dotted_system_fields_under_ronin() {
        let model = account_model();
        let raw = row(&[
            ("id", json!("acc_abc")),
            ("handle", json!("elaine")),
            ("ronin.createdAt", json!("2024-01-01T00:00:00.000Z")),
            ("ronin.locked", Json::Null),
        ]);
        let nested = nest_row(&model, &raw);
        assert_eq!(nested["handle"], json!("elaine"));
        assert_eq!(nested["ronin"]["createdAt"], json!("2024-01-01T00:00:00.000Z"));
        assert_eq!(nested["ronin"]["locked"], json!(false));
    }

    #[test]
    fn nest_row_parses_json_typed_column() {
        let model = account_model();
        let raw = row(&[("meta", json!(r#"{"theme":"dark"}"#))]);
        let nested = nest_row(&model, &raw);
        assert_eq!(nested["meta"]["theme"], json!("dark"));
    }

    #[test]
    fn nest_row_coerces_integer_boolean() {
        let model = account_model();
        let raw = row(&[("ronin.locked", json!(1))]);
        let nested = nest_row(&model, &raw);
        assert_eq!(nested["ronin"]["locked"], json!(true));
    }

    #[test]
    fn nest_row_passes_through_ephemeral_columns_unchanged() {
        let model = account_model();
        let raw = row(&[("label", json!("vip"))]);
        let nested = nest_row(&model, &raw);
        assert_eq!(nested["label"], json!("vip"));
    }

    #[test]
    fn format_single_with_no_rows_is_null_record() {
        let model = account_model();
        let out = format_single(&model, &[], &[]);
        assert_eq!(out["record"], Json::Null);
        assert!(out["modelFields"].is_array());
    }

    #[test]
    fn format_plural_trims_lookahead_row_and_sets_more_after() {
        let model = account_model();
        let rows: Vec<RawRow> = (0..3)
            .map(|i| {
                row(&[
                    ("id", json!(format!("acc_{i}"))),
                    ("ronin.createdAt", json!(format!("2024-01-0{}T00:00:00.000Z", i + 1))),
                ])
            })
            .collect();
        let out = format_plural(&model, rows, Some(2), &[], "ronin.createdAt", PageDirection::Initial, &[]);
        assert_eq!(out["records"].as_array().unwrap().len(), 2);
        assert!(out.get("moreAfter").is_some());
        assert!(out.get("moreBefore").is_none());
    }

    #[test]
    fn format_plural_without_lookahead_has_no_continuation() {
        let model = account_model();
        let rows: Vec<RawRow> = vec![row(&[
            ("id", json!("acc_0")),
            ("ronin.createdAt", json!("2024-01-01T00:00:00.000Z")),
        ])];
        let out = format_plural(&model, rows, Some(5), &[], "ronin.createdAt", PageDirection::Initial, &[]);
        assert_eq!(out["records"].as_array().unwrap().len(), 1);
        assert!(out.get("moreAfter").is_none());
    }

    fn account_with_members_mount() -> Mount {
        Mount {
            path: "members".to_string(),
            many: true,
        }
    }

    #[test]
    fn nest_rows_folds_repeated_root_id_into_one_record_with_array() {
        let model = account_model();
        let mounts = vec![account_with_members_mount()];
        let rows: Vec<RawRow> = (0..3)
            .map(|i| {
                row(&[
                    ("id", json!("acc_shared")),
                    ("handle", json!("elaine")),
                    ("members.id", json!(format!("mem_{i}"))),
                ])
            })
            .collect();
        let groups = nest_rows(&model, &rows, &mounts);
        assert_eq!(groups.len(), 1);
        let members = groups[0].0["members"].as_array().unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0]["id"], json!("mem_0"));
        assert_eq!(members[2]["id"], json!("mem_2"));
    }

    #[test]
    fn nest_rows_all_null_joined_side_yields_empty_array() {
        let model = account_model();
        let mounts = vec![account_with_members_mount()];
        let rows: Vec<RawRow> = vec![row(&[
            ("id", json!("acc_lonely")),
            ("members.id", Json::Null),
        ])];
        let groups = nest_rows(&model, &rows, &mounts);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0["members"], json!([]));
    }

    #[test]
    fn nest_rows_distinct_ids_stay_separate_records() {
        let model = account_model();
        let mounts = vec![account_with_members_mount()];
        let rows: Vec<RawRow> = vec![
            row(&[("id", json!("acc_a")), ("members.id", json!("mem_0"))]),
            row(&[("id", json!("acc_b")), ("members.id", json!("mem_1"))]),
        ];
        let groups = nest_rows(&model, &rows, &mounts);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0["members"].as_array().unwrap().len(), 1);
        assert_eq!(groups[1].0["members"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn format_plural_counts_grouped_records_not_raw_rows_for_lookahead() {
        let model = account_model();
        let mounts = vec![account_with_members_mount()];
        // Two roots, the first joined to two members — three raw rows but
        // only two records, so a limit of 2 must not report `moreAfter`.
        let rows: Vec<RawRow> = vec![
            row(&[
                ("id", json!("acc_a")),
                ("ronin.createdAt", json!("2024-01-01T00:00:00.000Z")),
                ("members.id", json!("mem_0")),
            ]),
            row(&[
                ("id", json!("acc_a")),
                ("ronin.createdAt", json!("2024-01-01T00:00:00.000Z")),
                ("members.id", json!("mem_1")),
            ]),
            row(&[
                ("id", json!("acc_b")),
                ("ronin.createdAt", json!("2024-01-02T00:00:00.000Z")),
                ("members.id", Json::Null),
            ]),
        ];
        let out = format_plural(&model, rows, Some(2), &[], "ronin.createdAt", PageDirection::Initial, &mounts);
        assert_eq!(out["records"].as_array().unwrap().len(), 2);
        assert!(out.get("moreAfter").is_none());
        assert_eq!(out["records"][0]["members"].as_array().unwrap().len(), 2);
        assert_eq!(out["records"][1]["members"], json!([]));
    }

    #[test]
    fn parse_path_handles_array_bracket_segment() {
        let nested = {
            let mut out = Json::Object(Map::new());
            insert_nested(&mut out, &parse_path("tags[0]"), json!("vip"));
            insert_nested(&mut out, &parse_path("tags[1]"), json!("early-adopter"));
            out
        };
        assert_eq!(nested["tags"], json!(["vip", "early-adopter"]));
    }

    #[test]
    fn format_count_reads_amount_column() {
        let rows = vec![row(&[("amount", json!(7))])];
        let out = format_count(&rows);
        assert_eq!(out["amount"], json!(7));
    }

    #[test]
    fn format_list_models_parses_serialized_data_column() {
        let model = account_model();
        let serialized = serde_json::to_string(&model).unwrap();
        let rows = vec![row(&[("slug", json!("account")), ("data", json!(serialized))])];
        let out = format_list_models(&rows);
        assert_eq!(out["models"]["account"]["slug"], json!("account"));
    }
}
