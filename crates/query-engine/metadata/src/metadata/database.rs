//! Metadata information regarding the database and its tables.

use enum_iterator::Sequence;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The portable type vocabulary columns are normalized to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Sequence, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum PortableType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Timestamp,
}

impl PortableType {
    /// Normalize a declared database type (either the `information_schema` spelling or the
    /// internal `udt_name`) to the portable vocabulary. Anything unrecognised is text.
    pub fn from_declared_type(declared: &str) -> PortableType {
        let declared = declared.trim().to_lowercase();
        let base = declared.split('(').next().unwrap_or_default().trim();
        match base {
            "smallint" | "integer" | "bigint" | "int" | "int2" | "int4" | "int8" | "smallserial"
            | "serial" | "bigserial" | "serial2" | "serial4" | "serial8" | "oid" => {
                PortableType::Integer
            }
            "numeric" | "decimal" | "real" | "double precision" | "float4" | "float8" | "money" => {
                PortableType::Decimal
            }
            "boolean" | "bool" => PortableType::Boolean,
            "date" | "timestamp" | "timestamptz" | "time" | "timetz" => PortableType::Timestamp,
            other if other.starts_with("timestamp") || other.starts_with("time ") => {
                PortableType::Timestamp
            }
            _ => PortableType::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortableType::Text => "text",
            PortableType::Integer => "integer",
            PortableType::Decimal => "decimal",
            PortableType::Boolean => "boolean",
            PortableType::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for PortableType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Can this column contain null values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Nullable {
    #[default]
    Nullable,
    NonNullable,
}

/// The column a foreign key column points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// Information about a database column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnInfo {
    pub name: String,
    pub r#type: PortableType,
    #[serde(default)]
    pub nullable: Nullable,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, r#type: PortableType) -> Self {
        ColumnInfo {
            name: name.into(),
            r#type,
            nullable: Nullable::Nullable,
            is_primary_key: false,
            foreign_key: None,
        }
    }
}

/// Information about a database table (or any other kind of relation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableInfo {
    pub schema_name: String,
    pub table_name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// Find a column by name. Matching is case-insensitive and ignores surrounding quotes.
    pub fn find_column(&self, name: &str) -> Option<&ColumnInfo> {
        let key = identifier_key(name);
        self.columns
            .iter()
            .find(|column| identifier_key(&column.name) == key)
    }
}

/// The schema description used both for prompting and for validation.
///
/// Tables are kept in the order the introspection query returned them, which is sorted by
/// schema and table name, so two reads of an unchanged database compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDescription {
    pub tables: Vec<TableInfo>,
}

impl SchemaDescription {
    pub fn new(tables: Vec<TableInfo>) -> Self {
        SchemaDescription { tables }
    }

    pub fn empty() -> Self {
        SchemaDescription { tables: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Find a table by name. Accepts either a bare table name or `schema.table`; matching is
    /// case-insensitive and ignores quoting.
    pub fn find_table(&self, name: &str) -> Option<&TableInfo> {
        let parts: Vec<String> = split_qualified_name(name)
            .iter()
            .map(|part| identifier_key(part))
            .collect();
        match parts.as_slice() {
            [table] => self
                .tables
                .iter()
                .find(|t| identifier_key(&t.table_name) == *table),
            [.., schema, table] => self.tables.iter().find(|t| {
                identifier_key(&t.schema_name) == *schema && identifier_key(&t.table_name) == *table
            }),
            [] => None,
        }
    }
}

/// Normalize an identifier for comparison: strip one layer of double quotes (undoing `""`
/// escapes) and fold to lowercase.
pub fn identifier_key(identifier: &str) -> String {
    let trimmed = identifier.trim();
    let unquoted = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    };
    unquoted.to_lowercase()
}

/// Split a possibly qualified name such as `public."My Table"` on the dots that are not inside
/// double quotes.
pub fn split_qualified_name(name: &str) -> Vec<String> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut in_quotes = false;
    for c in name.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '.' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
