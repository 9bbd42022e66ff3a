//! Statements that passed validation.

/// The only kinds of statement the pipeline will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SQL text approved for execution.
///
/// Values of this type can only be obtained from [`crate::sql::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedStatement {
    sql_text: String,
    kind: StatementKind,
    returning: bool,
}

impl ValidatedStatement {
    pub(crate) fn new(sql_text: String, kind: StatementKind, returning: bool) -> Self {
        ValidatedStatement {
            sql_text,
            kind,
            returning,
        }
    }

    /// The normalized statement text.
    pub fn sql_text(&self) -> &str {
        &self.sql_text
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn is_read_only(&self) -> bool {
        self.kind == StatementKind::Select
    }

    /// Whether executing the statement produces a result set: always for reads, and for writes
    /// only when they carry a `RETURNING` clause.
    pub fn returns_rows(&self) -> bool {
        self.is_read_only() || self.returning
    }
}
