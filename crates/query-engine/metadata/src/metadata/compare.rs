//! Compare two schema descriptions.

use std::collections::BTreeSet;

use super::database::{identifier_key, SchemaDescription};

/// The difference between two schema reads, expressed as qualified table and
/// `table.column` names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaMismatch {
    pub added_tables: Vec<String>,
    pub removed_tables: Vec<String>,
    pub added_columns: Vec<String>,
    pub removed_columns: Vec<String>,
}

impl SchemaMismatch {
    /// Compute what changed between `before` and `after`. Type changes are not reported:
    /// the validator only cares about which names exist.
    pub fn between(before: &SchemaDescription, after: &SchemaDescription) -> SchemaMismatch {
        let before_tables = table_names(before);
        let after_tables = table_names(after);
        let before_columns = column_names(before);
        let after_columns = column_names(after);

        SchemaMismatch {
            added_tables: after_tables.difference(&before_tables).cloned().collect(),
            removed_tables: before_tables.difference(&after_tables).cloned().collect(),
            added_columns: after_columns.difference(&before_columns).cloned().collect(),
            removed_columns: before_columns.difference(&after_columns).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added_tables.is_empty()
            && self.removed_tables.is_empty()
            && self.added_columns.is_empty()
            && self.removed_columns.is_empty()
    }
}

impl std::fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "tables +{:?} -{:?}, columns +{:?} -{:?}",
            self.added_tables, self.removed_tables, self.added_columns, self.removed_columns
        )
    }
}

fn table_names(schema: &SchemaDescription) -> BTreeSet<String> {
    schema
        .tables
        .iter()
        .map(|table| {
            format!(
                "{}.{}",
                identifier_key(&table.schema_name),
                identifier_key(&table.table_name)
            )
        })
        .collect()
}

fn column_names(schema: &SchemaDescription) -> BTreeSet<String> {
    schema
        .tables
        .iter()
        .flat_map(|table| {
            table.columns.iter().map(move |column| {
                format!(
                    "{}.{}.{}",
                    identifier_key(&table.schema_name),
                    identifier_key(&table.table_name),
                    identifier_key(&column.name)
                )
            })
        })
        .collect()
}
