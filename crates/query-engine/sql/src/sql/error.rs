//! Errors for SQL validation.

use thiserror::Error;

/// A reason a candidate statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the generated SQL statement is empty")]
    Empty,
    #[error("expected exactly one SQL statement, found {0}")]
    MultipleStatements(usize),
    #[error("statement separator ';' found outside of a string literal")]
    StatementSeparator,
    #[error("unterminated string literal, quoted identifier or comment")]
    UnterminatedLiteral,
    #[error("malformed SQL: {0}")]
    Malformed(String),
    #[error("statement type '{0}' is not allowed; only SELECT, INSERT, UPDATE and DELETE are executed")]
    DisallowedStatement(String),
    #[error("function '{0}' is not allowed in FROM; only set-returning functions such as generate_series and unnest are")]
    DisallowedFunction(String),
    #[error("SELECT INTO creates a table and is not allowed")]
    SelectInto,
    #[error("data-modifying statements cannot be nested inside another statement")]
    NestedDataModification,
    #[error("table '{0}' does not exist in the schema")]
    UnknownTable(String),
    #[error("column '{0}' does not exist in the schema")]
    UnknownColumn(String),
    #[error("column '{column}' does not exist in table '{table}'")]
    UnknownTableColumn { column: String, table: String },
    #[error("'{0}' does not name a table or alias used in the statement")]
    UnknownQualifier(String),
}

impl ValidationError {
    /// A stable machine-readable code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Empty => "empty_statement",
            ValidationError::MultipleStatements(_) => "multiple_statements",
            ValidationError::StatementSeparator => "statement_separator",
            ValidationError::UnterminatedLiteral => "unterminated_literal",
            ValidationError::Malformed(_) => "malformed_sql",
            ValidationError::DisallowedStatement(_) => "disallowed_statement",
            ValidationError::DisallowedFunction(_) => "disallowed_function",
            ValidationError::SelectInto => "select_into",
            ValidationError::NestedDataModification => "nested_data_modification",
            ValidationError::UnknownTable(_) => "unknown_table",
            ValidationError::UnknownColumn(_) | ValidationError::UnknownTableColumn { .. } => {
                "unknown_column"
            }
            ValidationError::UnknownQualifier(_) => "unknown_qualifier",
        }
    }

    /// Whether the rejection is about a name missing from the schema, which a fresher schema
    /// read might resolve.
    pub fn is_unknown_identifier(&self) -> bool {
        matches!(
            self,
            ValidationError::UnknownTable(_)
                | ValidationError::UnknownColumn(_)
                | ValidationError::UnknownTableColumn { .. }
        )
    }
}
