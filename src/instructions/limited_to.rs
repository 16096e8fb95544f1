//! `limitedTo` compilation (spec.md §4.5).
//!
//! One extra row is requested beyond what the caller asked for so the
//! result formatter (C8) can tell whether more pages exist without a
//! separate `COUNT(*)`.

/// The effective `LIMIT` value for a query, or `None` when no limit applies.
///
/// A singular `get` always forces `LIMIT 1` regardless of `limitedTo`. A
/// plural query with an explicit `limitedTo` of `n` requests `n + 1` rows.
pub fn effective_limit(requested: Option<i64>, singular: bool) -> Option<i64> {
    if singular {
        Some(1)
    } else {
        requested.map(|n| n + 1)
    }
}

pub fn sql_fragment(limit: Option<i64>) -> Option<String> {
    limit.map(|n| format!("LIMIT {n}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singular_forces_limit_one() {
        assert_eq!(effective_limit(Some(50), true), Some(1));
        assert_eq!(effective_limit(None, true), Some(1));
    }

    #[test]
    fn plural_adds_lookahead_row() {
        assert_eq!(effective_limit(Some(10), false), Some(11));
    }

    #[test]
    fn plural_without_limited_to_has_no_limit() {
        assert_eq!(effective_limit(None, false), None);
    }

    #[test]
    fn fragment_rendering() {
        assert_eq!(sql_fragment(Some(11)).as_deref(), Some("LIMIT 11"));
        assert_eq!(sql_fragment(None), None);
    }
}
