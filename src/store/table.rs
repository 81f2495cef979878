//! Schema-qualified Postgres table names.

use anyhow::Result;

/// Table reference rendered once at startup for DDL and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    qualified: String,
    index_prefix: String,
}

impl TableName {
    /// Validates both parts and renders the quoted reference.
    pub fn new(schema: &str, table: &str) -> Result<Self> {
        anyhow::ensure!(!schema.trim().is_empty(), "schema name is required");
        anyhow::ensure!(!table.trim().is_empty(), "table name is required");
        Ok(Self {
            qualified: format!("{}.{}", quote(schema), quote(table)),
            index_prefix: format!("{}_{}", ident_fragment(schema), ident_fragment(table)),
        })
    }

    /// `"schema"."table"`, safe to splice into SQL.
    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    /// Secondary index name for `column`.
    pub fn index_name(&self, column: &str) -> String {
        format!("{}_{}_idx", self.index_prefix, ident_fragment(column))
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn ident_fragment(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}
