//! Safe SQL identifier handling.
//!
//! This module provides [`Ident`], a validated SQL identifier (table/column
//! name), and [`IntoIdent`] for ergonomic conversion at call sites.
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL and escape `"` as `""`
//!
//! Field slugs in this compiler's DSL may themselves contain a literal dot
//! (system fields like `ronin.createdAt`, nested JSON group fields). Such a
//! slug is a *single* quoted segment, not a dotted path — use
//! [`Ident::quoted`] for those, and [`Ident::parse`] only for genuine
//! `schema.table` / `table.column` paths.

use crate::error::{CompileError, CompileResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// Unquoted identifier: must match `[A-Za-z_][A-Za-z0-9_$]*`.
    Unquoted(String),
    /// Quoted identifier: allows any characters except NUL.
    Quoted(String),
}

/// A SQL identifier (table or column name), possibly dotted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    /// Build an identifier from a single already-known-safe segment, always
    /// rendered quoted. This is the right constructor for field slugs that
    /// may contain a literal `.` (e.g. `ronin.createdAt`).
    pub fn quoted(name: &str) -> CompileResult<Self> {
        if name.is_empty() {
            return Err(CompileError::InvalidQueryShape(
                "empty identifier".to_string(),
            ));
        }
        if name.contains('\0') {
            return Err(CompileError::InvalidQueryShape(
                "identifier cannot contain NUL character".to_string(),
            ));
        }
        Ok(Self {
            parts: vec![IdentPart::Quoted(name.to_string())],
        })
    }

    /// Parse a dotted identifier path, e.g. `accounts.id`.
    pub fn parse(s: &str) -> CompileResult<Self> {
        if s.is_empty() {
            return Err(CompileError::InvalidQueryShape(
                "identifier cannot be empty".to_string(),
            ));
        }
        if s.contains('\0') {
            return Err(CompileError::InvalidQueryShape(
                "identifier cannot contain NUL character".to_string(),
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(CompileError::InvalidQueryShape(
                                "trailing '.' in identifier".to_string(),
                            ));
                        }
                    }
                    Some(c) => {
                        return Err(CompileError::InvalidQueryShape(format!(
                            "expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                name.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => {
                            return Err(CompileError::InvalidQueryShape(
                                "unclosed quoted identifier".to_string(),
                            ));
                        }
                    }
                }
                if name.is_empty() {
                    return Err(CompileError::InvalidQueryShape(
                        "empty quoted identifier".to_string(),
                    ));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                if name.is_empty() {
                    if c == '_' || c.is_ascii_alphabetic() {
                        name.push(c);
                        chars.next();
                    } else {
                        return Err(CompileError::InvalidQueryShape(format!(
                            "invalid identifier start character: '{c}'"
                        )));
                    }
                } else if c == '_' || c == '$' || c.is_ascii_alphanumeric() {
                    name.push(c);
                    chars.next();
                } else {
                    return Err(CompileError::InvalidQueryShape(format!(
                        "invalid character in identifier: '{c}'"
                    )));
                }
            }
            if name.is_empty() {
                return Err(CompileError::InvalidQueryShape(
                    "empty identifier segment".to_string(),
                ));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        if parts.is_empty() {
            return Err(CompileError::InvalidQueryShape(
                "empty identifier".to_string(),
            ));
        }

        Ok(Self { parts })
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => {
                    out.push('"');
                    for ch in s.chars() {
                        if ch == '"' {
                            out.push('"');
                            out.push('"');
                        } else {
                            out.push(ch);
                        }
                    }
                    out.push('"');
                }
            }
        }
    }

    /// Always-quote a single segment, joined by `.` with another already
    /// quoted identifier. Used to build `"table"."column"` selectors.
    pub fn qualify(table: &str, column: &str) -> CompileResult<Self> {
        let mut ident = Ident::quoted(table)?;
        let col = Ident::quoted(column)?;
        ident.parts.extend(col.parts);
        Ok(ident)
    }
}

/// Convert an input into an [`Ident`].
pub trait IntoIdent {
    fn into_ident(self) -> CompileResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> CompileResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> CompileResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> CompileResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> CompileResult<Ident> {
        Ident::parse(&self)
    }
}
