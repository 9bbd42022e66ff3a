//! Decide whether a candidate statement may be executed.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use query_engine_metadata::metadata::{identifier_key, SchemaDescription, TableInfo};
use sqlparser::ast::{Ident, ObjectName, Statement, Visit};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::{Parser, ParserError};

use super::error::ValidationError;
use super::identifiers::{ident_key, ColumnReference, References, UsingColumn};
use super::separators::{check_separators, strip_trailing_separator};
use super::statement::{StatementKind, ValidatedStatement};

/// Unquoted names PostgreSQL treats as values rather than column references.
const PSEUDO_COLUMNS: &[&str] = &[
    "default",
    "current_date",
    "current_time",
    "current_timestamp",
    "localtime",
    "localtimestamp",
    "current_user",
    "session_user",
    "user",
    "current_role",
    "current_schema",
    "current_catalog",
];

/// Statement keywords that can start a statement of an allowed kind.
const ALLOWED_LEADING_KEYWORDS: &[&str] = &["SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "VALUES", "TABLE"];

/// Validate a candidate SQL statement against a schema description.
///
/// The checks run in order: a single statement with no separators outside literals, an
/// allowed statement kind, and every table and column name present in the schema. Names are
/// compared case-insensitively. The only rewrite applied is trimming whitespace and a single
/// trailing `;`.
pub fn validate(
    candidate: &str,
    schema: &SchemaDescription,
) -> Result<ValidatedStatement, ValidationError> {
    let sql = strip_trailing_separator(candidate);
    if sql.is_empty() {
        return Err(ValidationError::Empty);
    }
    check_separators(sql)?;

    let statements =
        Parser::parse_sql(&PostgreSqlDialect {}, sql).map_err(|err| parse_failure(sql, &err))?;
    let statement = match statements.as_slice() {
        [statement] => statement,
        [] => return Err(ValidationError::Empty),
        many => return Err(ValidationError::MultipleStatements(many.len())),
    };

    let kind = classify(statement, sql)?;

    let mut references = References::default();
    if let ControlFlow::Break(err) = statement.visit(&mut references) {
        return Err(err);
    }
    if kind == StatementKind::Select && references.data_modifying() > 0 {
        return Err(ValidationError::NestedDataModification);
    }

    Scope::resolve(schema, &references)?.check_columns(&references)?;

    Ok(ValidatedStatement::new(
        sql.to_string(),
        kind,
        references.returning,
    ))
}

fn classify(statement: &Statement, sql: &str) -> Result<StatementKind, ValidationError> {
    match statement {
        Statement::Query(_) => Ok(StatementKind::Select),
        Statement::Insert { .. } => Ok(StatementKind::Insert),
        Statement::Update { .. } => Ok(StatementKind::Update),
        Statement::Delete { .. } => Ok(StatementKind::Delete),
        _ => Err(ValidationError::DisallowedStatement(leading_keywords(
            sql, 2,
        ))),
    }
}

/// A parse failure on text that does not even start like an allowed statement is reported
/// as a disallowed statement rather than as a syntax error.
fn parse_failure(sql: &str, err: &ParserError) -> ValidationError {
    let keyword = leading_keywords(sql, 1);
    if keyword.starts_with('(') || ALLOWED_LEADING_KEYWORDS.contains(&keyword.as_str()) {
        ValidationError::Malformed(err.to_string())
    } else {
        ValidationError::DisallowedStatement(leading_keywords(sql, 2))
    }
}

fn leading_keywords(sql: &str, count: usize) -> String {
    sql.split_whitespace()
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// The schema tables a statement can see, and the qualifiers that name something else.
struct Scope<'a> {
    schema: &'a SchemaDescription,
    tables: Vec<(&'a TableInfo, Option<String>)>,
    /// CTE and subquery names: their columns come from tables already in scope.
    opaque_qualifiers: BTreeSet<String>,
    write_target: Option<&'a TableInfo>,
}

impl<'a> Scope<'a> {
    fn resolve(
        schema: &'a SchemaDescription,
        references: &References,
    ) -> Result<Scope<'a>, ValidationError> {
        let mut tables = vec![];
        let mut opaque_qualifiers = references.derived_aliases.clone();
        opaque_qualifiers.extend(references.cte_names.iter().cloned());

        for relation in &references.relations {
            if let [name] = relation.name.0.as_slice() {
                if references.cte_names.contains(&ident_key(name)) {
                    if let Some(alias) = &relation.alias {
                        opaque_qualifiers.insert(ident_key(alias));
                    }
                    continue;
                }
            }
            let table = find_relation(schema, &relation.name)
                .ok_or_else(|| ValidationError::UnknownTable(relation.name.to_string()))?;
            tables.push((table, relation.alias.as_ref().map(ident_key)));
        }

        let write_target = match &references.write_target {
            Some(name) => Some(
                find_relation(schema, name)
                    .ok_or_else(|| ValidationError::UnknownTable(name.to_string()))?,
            ),
            None => None,
        };

        Ok(Scope {
            schema,
            tables,
            opaque_qualifiers,
            write_target,
        })
    }

    fn check_columns(&self, references: &References) -> Result<(), ValidationError> {
        if let Some(target) = self.write_target {
            for column in &references.target_columns {
                check_table_column(target, column)?;
            }
        }

        for using in &references.using_columns {
            self.check_using(using, references)?;
        }

        for column in &references.columns {
            match column.qualifier.as_slice() {
                [] => self.check_unqualified(column, references)?,
                [qualifier] => self.check_qualified(qualifier, column, references)?,
                [.., schema_name, table_name] => {
                    let table = self
                        .tables
                        .iter()
                        .map(|(table, _)| *table)
                        .find(|table| {
                            identifier_key(&table.schema_name) == ident_key(schema_name)
                                && identifier_key(&table.table_name) == ident_key(table_name)
                        })
                        .ok_or_else(|| {
                            ValidationError::UnknownQualifier(format!(
                                "{}.{}",
                                schema_name.value, table_name.value
                            ))
                        })?;
                    check_table_column(table, &column.name)?;
                }
            }
        }
        Ok(())
    }

    fn check_unqualified(
        &self,
        column: &ColumnReference,
        references: &References,
    ) -> Result<(), ValidationError> {
        let key = ident_key(&column.name);
        if column.name.quote_style.is_none() && PSEUDO_COLUMNS.contains(&key.as_str()) {
            return Ok(());
        }
        if self.is_visible(column, &key, references) {
            Ok(())
        } else {
            Err(ValidationError::UnknownColumn(column.name.value.clone()))
        }
    }

    fn check_qualified(
        &self,
        qualifier: &Ident,
        column: &ColumnReference,
        references: &References,
    ) -> Result<(), ValidationError> {
        let key = ident_key(qualifier);

        if let Some((table, _)) = self
            .tables
            .iter()
            .find(|(_, alias)| alias.as_deref() == Some(key.as_str()))
        {
            return check_table_column(table, &column.name);
        }
        if self.opaque_qualifiers.contains(&key) {
            return if self.is_visible(column, &ident_key(&column.name), references) {
                Ok(())
            } else {
                Err(ValidationError::UnknownColumn(column.name.value.clone()))
            };
        }
        if let Some((table, _)) = self
            .tables
            .iter()
            .find(|(table, alias)| alias.is_none() && identifier_key(&table.table_name) == key)
        {
            return check_table_column(table, &column.name);
        }
        if key == "excluded" {
            if let Some(target) = self.write_target {
                return check_table_column(target, &column.name);
            }
        }
        Err(ValidationError::UnknownQualifier(qualifier.value.clone()))
    }

    fn is_visible(&self, column: &ColumnReference, key: &str, references: &References) -> bool {
        self.has_table_column(key) || references.sees_output_name(column, key)
    }

    fn has_table_column(&self, key: &str) -> bool {
        self.tables
            .iter()
            .any(|(table, _)| table.find_column(key).is_some())
    }

    /// Both sides of `JOIN ... USING (column)` must have the column.
    fn check_using(
        &self,
        using: &UsingColumn,
        references: &References,
    ) -> Result<(), ValidationError> {
        let key = ident_key(&using.column);
        let sides: [&[Option<ObjectName>]; 2] =
            [&using.left, std::slice::from_ref(&using.right)];
        for side in sides {
            let mut opaque = false;
            let mut tables = vec![];
            for relation in side {
                match relation
                    .as_ref()
                    .and_then(|name| self.schema_table(name, references))
                {
                    Some(table) => tables.push(table),
                    None => opaque = true,
                }
            }
            if tables.iter().any(|table| table.find_column(&key).is_some()) {
                continue;
            }
            if opaque && (references.names_derived_column(&key) || self.has_table_column(&key)) {
                continue;
            }
            return Err(match tables.as_slice() {
                [table] if !opaque => ValidationError::UnknownTableColumn {
                    column: using.column.value.clone(),
                    table: table.table_name.clone(),
                },
                _ => ValidationError::UnknownColumn(using.column.value.clone()),
            });
        }
        Ok(())
    }

    /// The schema table a FROM item names, or `None` for a CTE.
    fn schema_table(&self, name: &ObjectName, references: &References) -> Option<&'a TableInfo> {
        if let [single] = name.0.as_slice() {
            if references.cte_names.contains(&ident_key(single)) {
                return None;
            }
        }
        find_relation(self.schema, name)
    }
}

fn find_relation<'a>(schema: &'a SchemaDescription, name: &ObjectName) -> Option<&'a TableInfo> {
    let parts: Vec<String> = name.0.iter().map(ident_key).collect();
    match parts.as_slice() {
        [table] => schema
            .tables
            .iter()
            .find(|t| identifier_key(&t.table_name) == *table),
        [.., schema_name, table] => schema.tables.iter().find(|t| {
            identifier_key(&t.schema_name) == *schema_name
                && identifier_key(&t.table_name) == *table
        }),
        [] => None,
    }
}

fn check_table_column(table: &TableInfo, column: &Ident) -> Result<(), ValidationError> {
    let key = ident_key(column);
    if table
        .columns
        .iter()
        .any(|c| identifier_key(&c.name) == key)
    {
        Ok(())
    } else {
        Err(ValidationError::UnknownTableColumn {
            column: column.value.clone(),
            table: table.table_name.clone(),
        })
    }
}
