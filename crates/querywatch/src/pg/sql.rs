//! Parameter-safe SQL assembly and identifier handling.
//!
//! [`Sql`] stores SQL pieces and parameters separately and generates `$1, $2, ...`
//! placeholders in the final string. [`Ident`] validates table and column names:
//!
//! - Unquoted parts must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL and escape `"` as `""`
//!
//! Identifiers are always rendered quoted, using the name Postgres resolves them to, so
//! reserved words such as `user` or `order` work as table and column names.

use crate::error::{QueryError, QueryResult};
use std::fmt::Write;
use tokio_postgres::types::ToSql;

#[derive(Debug)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A SQL statement under construction.
#[derive(Default)]
pub struct Sql {
    parts: Vec<SqlPart>,
    params: Vec<Box<dyn ToSql + Sync + Send>>,
}

impl Sql {
    /// Create a new builder with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Raw(initial_sql.into())],
            params: Vec::new(),
        }
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append an identifier.
    pub fn push_ident(&mut self, ident: &Ident) -> &mut Self {
        let mut rendered = String::new();
        ident.write_sql(&mut rendered);
        self.push(&rendered)
    }

    /// Append a parameter placeholder and bind its value.
    pub fn push_bind<T>(&mut self, value: T) -> &mut Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.parts.push(SqlPart::Param);
        self.params.push(Box::new(value));
        self
    }

    /// Render the SQL string with numbered placeholders.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        let mut idx: usize = 0;

        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    let _ = write!(&mut out, "${}", idx);
                }
            }
        }
        out
    }

    /// Borrow the bound parameters in placeholder order.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }

    /// Number of bound parameters.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

impl std::fmt::Debug for Sql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sql")
            .field("sql", &self.to_sql())
            .field("param_count", &self.params.len())
            .finish()
    }
}

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// Unquoted identifier: must match `[A-Za-z_][A-Za-z0-9_$]*`.
    Unquoted(String),
    /// Quoted identifier: allows any characters except NUL.
    Quoted(String),
}

impl IdentPart {
    /// The name Postgres resolves this part to (unquoted names fold to lowercase).
    pub fn resolved_name(&self) -> String {
        match self {
            IdentPart::Unquoted(s) => s.to_ascii_lowercase(),
            IdentPart::Quoted(s) => s.clone(),
        }
    }
}

/// A SQL identifier (column, table, or schema-qualified table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table`
    /// - Quoted: `"CamelCase"."UserTable"`
    /// - Mixed: `public."UserTable"`
    pub fn parse(s: &str) -> QueryResult<Self> {
        if s.is_empty() {
            return Err(QueryError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(QueryError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            // Consume '.' between parts (but require there is a next part).
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(QueryError::validation("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(QueryError::validation(format!(
                            "Expected '.' between identifier parts, got '{c}'"
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
                            // Escaped quote: ""
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                name.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(QueryError::validation("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(QueryError::validation("Empty quoted identifier"));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let valid = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !valid {
                    return Err(QueryError::validation(format!(
                        "Invalid character in identifier '{s}': '{c}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(QueryError::validation("Empty identifier segment"));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        if parts.is_empty() {
            return Err(QueryError::validation("Empty identifier"));
        }

        Ok(Self { parts })
    }

    /// Parse a single-part identifier (a column name).
    pub fn column(s: &str) -> QueryResult<Self> {
        let ident = Self::parse(s.trim())?;
        if ident.parts.len() != 1 {
            return Err(QueryError::validation(format!(
                "Column name '{s}' must not be qualified"
            )));
        }
        Ok(ident)
    }

    /// The resolved name of the last part (the column or bare table name).
    pub fn name(&self) -> String {
        self.parts
            .last()
            .map(IdentPart::resolved_name)
            .unwrap_or_default()
    }

    /// Render the identifier as SQL, every part quoted.
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
            write_quoted(out, &part.resolved_name());
        }
    }
}

/// Write `s` as a quoted identifier.
pub(crate) fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}
