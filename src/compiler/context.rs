//! Recursion context for the query compiler (spec.md §9: "avoid circular
//! references... by threading a small context struct through recursion").

/// Ambient state threaded through nested query compilation (trigger
/// effects, `including` sub-queries) instead of back-pointers to the
/// enclosing query.
#[derive(Debug, Clone)]
pub struct CompileContext {
    pub current_table: String,
    pub parent_table: Option<String>,
    pub root_alias: String,
    pub depth: usize,
}

impl CompileContext {
    pub fn root(table: &str) -> Self {
        Self {
            current_table: table.to_string(),
            parent_table: None,
            root_alias: table.to_string(),
            depth: 0,
        }
    }

    pub fn nested(&self, table: &str) -> Self {
        Self {
            current_table: table.to_string(),
            parent_table: Some(self.current_table.clone()),
            root_alias: self.root_alias.clone(),
            depth: self.depth + 1,
        }
    }
}
