//! `selecting` compilation (spec.md §4.5).

use crate::error::CompileResult;
use crate::model::registry::{physical_system_field_slugs, Registry};
use crate::model::Model;

/// `(column list for SELECT, expand_columns)`. `None` column list means
/// `SELECT *`: only possible when the caller neither named `selecting`
/// columns nor asked for `expandColumns` (spec.md §4.9/§6.1) — otherwise
/// every field gets its own `AS "<slug>"` alias so joined columns never
/// collide with it.
pub fn compile(
    model: &Model,
    registry: &Registry,
    table_alias: &str,
    selecting: Option<&[String]>,
    expand_columns: bool,
) -> CompileResult<(Option<String>, bool)> {
    let mut slugs: Vec<String> = match selecting {
        Some(requested) => requested.to_vec(),
        None if expand_columns => model.fields.iter().map(|f| f.slug.clone()).collect(),
        None => return Ok((None, false)),
    };

    let user_named_a_system_field = slugs.iter().any(|s| physical_system_field_slugs().any(|sys| sys == s));
    if !user_named_a_system_field {
        for sys in physical_system_field_slugs() {
            if !slugs.iter().any(|s| s == sys) {
                slugs.push(sys.to_string());
            }
        }
    }

    let mut parts = Vec::with_capacity(slugs.len());
    for slug in &slugs {
        let selector = registry.get_field(model, slug, table_alias)?;
        parts.push(format!("{} AS \"{}\"", selector.sql, slug));
    }

    Ok((Some(parts.join(", ")), true))
}
