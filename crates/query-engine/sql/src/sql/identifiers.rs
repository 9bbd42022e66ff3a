//! Collect the names a statement refers to.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_expressions, ConflictTarget, Expr, GroupByExpr, Ident, JoinConstraint, JoinOperator,
    ObjectName, OnConflictAction, OnInsert, Query, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins, Visitor,
};

use super::error::ValidationError;

/// Set-returning functions that may appear in FROM. They read nothing but their arguments.
const ALLOWED_TABLE_FUNCTIONS: &[&str] = &[
    "generate_series",
    "unnest",
    "json_each",
    "json_each_text",
    "jsonb_each",
    "jsonb_each_text",
    "json_array_elements",
    "json_array_elements_text",
    "jsonb_array_elements",
    "jsonb_array_elements_text",
    "regexp_split_to_table",
    "string_to_table",
];

/// Case-folded form of an identifier used for all comparisons.
pub fn ident_key(ident: &Ident) -> String {
    ident.value.to_lowercase()
}

/// A relation named in a FROM clause, a JOIN, or as the target of an INSERT.
#[derive(Debug, Clone)]
pub struct RelationReference {
    pub name: ObjectName,
    pub alias: Option<Ident>,
}

/// A column named inside an expression, split into its qualifier and the column itself.
#[derive(Debug, Clone)]
pub struct ColumnReference {
    pub qualifier: Vec<Ident>,
    pub name: Ident,
    /// The query whose expressions contain the reference; `None` outside any query, e.g. in
    /// the SET list of an UPDATE.
    pub query: Option<usize>,
    /// Whether the reference sits in ORDER BY, GROUP BY or HAVING, where the query's own
    /// select-list aliases are visible.
    pub sees_outputs: bool,
}

/// A column named by `JOIN ... USING (...)`. It has to exist on both sides of the join.
///
/// Each side lists the plain tables it is made of; `None` stands for a subquery, a function
/// or a nested join.
#[derive(Debug, Clone)]
pub struct UsingColumn {
    pub left: Vec<Option<ObjectName>>,
    pub right: Option<ObjectName>,
    pub column: Ident,
}

/// Every name found while walking a statement.
#[derive(Debug, Default)]
pub struct References {
    pub relations: Vec<RelationReference>,
    /// Names introduced by `WITH`.
    pub cte_names: BTreeSet<String>,
    /// Aliases of subqueries and table functions in FROM.
    pub derived_aliases: BTreeSet<String>,
    /// Column lists given to CTEs and aliased relations.
    pub relation_columns: BTreeSet<String>,
    pub columns: Vec<ColumnReference>,
    pub using_columns: Vec<UsingColumn>,
    /// Table written by the (single) INSERT or UPDATE.
    pub write_target: Option<ObjectName>,
    /// Columns listed by the INSERT, named by its ON CONFLICT clause, or assigned by an UPDATE.
    pub target_columns: Vec<Ident>,
    pub returning: bool,
    /// Select-list aliases, with the queries that define them.
    output_names: BTreeMap<String, BTreeSet<usize>>,
    /// The enclosing query of every query seen so far, indexed by query.
    parents: Vec<Option<usize>>,
    open_queries: Vec<usize>,
    /// Expressions of ORDER BY, GROUP BY and HAVING clauses.
    output_scope: BTreeSet<*const Expr>,
    data_modifying: usize,
}

impl References {
    /// How many INSERT/UPDATE/DELETE statements were encountered, including the top-level one.
    pub fn data_modifying(&self) -> usize {
        self.data_modifying
    }

    /// Whether `key` names a select-list alias the reference can see: one defined by a query
    /// nested inside the reference's query, or the query's own alias when the reference is in
    /// ORDER BY, GROUP BY or HAVING. An alias is never visible inside its own definition.
    pub fn sees_output_name(&self, column: &ColumnReference, key: &str) -> bool {
        self.relation_columns.contains(key)
            || self.output_names.get(key).is_some_and(|queries| {
                queries.iter().any(|&query| {
                    (column.sees_outputs && column.query == Some(query))
                        || self.is_nested_in(query, column.query)
                })
            })
    }

    /// Whether `key` is an output column of some subquery or CTE in the statement.
    pub fn names_derived_column(&self, key: &str) -> bool {
        self.relation_columns.contains(key) || self.output_names.contains_key(key)
    }

    fn is_nested_in(&self, query: usize, outer: Option<usize>) -> bool {
        let mut parent = self.parents[query];
        while let Some(enclosing) = parent {
            if Some(enclosing) == outer {
                return true;
            }
            parent = self.parents[enclosing];
        }
        outer.is_none()
    }

    fn current_query(&self) -> Option<usize> {
        self.open_queries.last().copied()
    }

    fn collect_aliases(&mut self, query: usize, items: &[SelectItem]) {
        for item in items {
            if let SelectItem::ExprWithAlias { alias, .. } = item {
                self.output_names
                    .entry(ident_key(alias))
                    .or_default()
                    .insert(query);
            }
        }
    }

    fn mark_output_scope(&mut self, expr: &Expr) {
        let scope = &mut self.output_scope;
        let walked = visit_expressions(expr, |inner| {
            scope.insert(inner as *const Expr);
            ControlFlow::<Infallible>::Continue(())
        });
        match walked {
            ControlFlow::Continue(()) => {}
            ControlFlow::Break(never) => match never {},
        }
    }

    fn collect_set_expr(&mut self, query: usize, body: &SetExpr) -> ControlFlow<ValidationError> {
        match body {
            SetExpr::Select(select) => {
                if select.into.is_some() {
                    return ControlFlow::Break(ValidationError::SelectInto);
                }
                self.collect_aliases(query, &select.projection);
                if let GroupByExpr::Expressions(expressions) = &select.group_by {
                    for expr in expressions {
                        self.mark_output_scope(expr);
                    }
                }
                if let Some(having) = &select.having {
                    self.mark_output_scope(having);
                }
                for from in &select.from {
                    self.collect_using(from);
                }
                ControlFlow::Continue(())
            }
            SetExpr::SetOperation { left, right, .. } => {
                self.collect_set_expr(query, left)?;
                self.collect_set_expr(query, right)
            }
            _ => ControlFlow::Continue(()),
        }
    }

    fn collect_using(&mut self, from: &TableWithJoins) {
        let mut left = vec![plain_table(&from.relation)];
        for join in &from.joins {
            let constraint = match &join.join_operator {
                JoinOperator::Inner(constraint)
                | JoinOperator::LeftOuter(constraint)
                | JoinOperator::RightOuter(constraint)
                | JoinOperator::FullOuter(constraint) => Some(constraint),
                _ => None,
            };
            let right = plain_table(&join.relation);
            if let Some(JoinConstraint::Using(columns)) = constraint {
                for column in columns {
                    self.using_columns.push(UsingColumn {
                        left: left.clone(),
                        right: right.clone(),
                        column: column.clone(),
                    });
                }
            }
            left.push(right);
        }
    }

    fn collect_on_conflict(&mut self, on: Option<&OnInsert>) {
        let Some(OnInsert::OnConflict(on_conflict)) = on else {
            return;
        };
        if let Some(ConflictTarget::Columns(columns)) = &on_conflict.conflict_target {
            self.target_columns.extend(columns.iter().cloned());
        }
        if let OnConflictAction::DoUpdate(update) = &on_conflict.action {
            self.target_columns
                .extend(update.assignments.iter().filter_map(|a| a.id.last().cloned()));
        }
    }
}

fn plain_table(table_factor: &TableFactor) -> Option<ObjectName> {
    match table_factor {
        TableFactor::Table {
            name, args: None, ..
        } => Some(name.clone()),
        _ => None,
    }
}

fn check_table_function(name: &ObjectName) -> ControlFlow<ValidationError> {
    let allowed = match name.0.as_slice() {
        [function] => ALLOWED_TABLE_FUNCTIONS.contains(&ident_key(function).as_str()),
        [schema, function] => {
            ident_key(schema) == "pg_catalog"
                && ALLOWED_TABLE_FUNCTIONS.contains(&ident_key(function).as_str())
        }
        _ => false,
    };
    if allowed {
        ControlFlow::Continue(())
    } else {
        ControlFlow::Break(ValidationError::DisallowedFunction(name.to_string()))
    }
}

impl Visitor for References {
    type Break = ValidationError;

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<Self::Break> {
        let returning = match statement {
            Statement::Insert {
                table_name,
                columns,
                on,
                returning,
                ..
            } => {
                self.relations.push(RelationReference {
                    name: table_name.clone(),
                    alias: None,
                });
                self.write_target = Some(table_name.clone());
                self.target_columns.extend(columns.iter().cloned());
                self.collect_on_conflict(on.as_ref());
                returning
            }
            Statement::Update {
                table,
                assignments,
                returning,
                ..
            } => {
                if let TableFactor::Table { name, .. } = &table.relation {
                    self.write_target = Some(name.clone());
                }
                self.target_columns
                    .extend(assignments.iter().filter_map(|a| a.id.last().cloned()));
                returning
            }
            Statement::Delete { returning, .. } => returning,
            _ => return ControlFlow::Continue(()),
        };

        self.data_modifying += 1;
        if self.data_modifying > 1 {
            return ControlFlow::Break(ValidationError::NestedDataModification);
        }
        self.returning |= returning.is_some();
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        let id = self.parents.len();
        self.parents.push(self.current_query());
        self.open_queries.push(id);

        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.cte_names.insert(ident_key(&cte.alias.name));
                self.relation_columns
                    .extend(cte.alias.columns.iter().map(ident_key));
            }
        }
        for order_by in &query.order_by {
            self.mark_output_scope(&order_by.expr);
        }
        self.collect_set_expr(id, &query.body)
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.open_queries.pop();
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        let alias = match table_factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                if args.is_some() {
                    check_table_function(name)?;
                    if let Some(alias) = alias {
                        self.derived_aliases.insert(ident_key(&alias.name));
                    }
                } else {
                    self.relations.push(RelationReference {
                        name: name.clone(),
                        alias: alias.as_ref().map(|alias| alias.name.clone()),
                    });
                }
                alias
            }
            TableFactor::Function { name, alias, .. } => {
                check_table_function(name)?;
                if let Some(alias) = alias {
                    self.derived_aliases.insert(ident_key(&alias.name));
                }
                alias
            }
            TableFactor::Derived { alias, .. } | TableFactor::UNNEST { alias, .. } => {
                if let Some(alias) = alias {
                    self.derived_aliases.insert(ident_key(&alias.name));
                }
                alias
            }
            _ => return ControlFlow::Continue(()),
        };
        if let Some(alias) = alias {
            self.relation_columns
                .extend(alias.columns.iter().map(ident_key));
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        let (qualifier, name) = match expr {
            Expr::Identifier(ident) => (vec![], ident),
            Expr::CompoundIdentifier(parts) => match parts.split_last() {
                Some((name, qualifier)) => (qualifier.to_vec(), name),
                None => return ControlFlow::Continue(()),
            },
            _ => return ControlFlow::Continue(()),
        };
        self.columns.push(ColumnReference {
            qualifier,
            name: name.clone(),
            query: self.current_query(),
            sees_outputs: self.output_scope.contains(&(expr as *const Expr)),
        });
        ControlFlow::Continue(())
    }
}
