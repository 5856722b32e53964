//! Closed classification of the `sqlparser` AST.
//!
//! The parser's AST is open-ended and grows with every release. The rewriter
//! never matches on it directly; it matches on the small enums below, which
//! name exactly the shapes it knows how to scope. Every other shape is mapped
//! to an explicit pass-through variant here, and only here.

use sqlparser::ast::{
    Assignment, Delete, Expr, FromTable, Ident, JoinConstraint, JoinOperator, ObjectName, Query, Select,
    SetExpr, Statement, TableFactor, TableWithJoins,
};

/// A top-level statement, as far as tenant scoping is concerned.
pub(crate) enum ParsedStatement<'a> {
    /// `SELECT ...`, including `WITH` and set operations.
    Select(&'a mut Query),
    /// `UPDATE t [JOIN ...] SET ... [FROM ...] [WHERE ...]`
    Update {
        table: &'a mut TableWithJoins,
        assignments: &'a mut Vec<Assignment>,
        from: Option<&'a mut TableWithJoins>,
        selection: &'a mut Option<Expr>,
    },
    /// `DELETE FROM t [USING ...] [WHERE ...]`
    Delete {
        from: &'a mut Vec<TableWithJoins>,
        using: Option<&'a mut Vec<TableWithJoins>>,
        selection: &'a mut Option<Expr>,
    },
    /// `INSERT ...`, passed through unmodified.
    Insert,
    /// Anything else (DDL, SET, SHOW, ...), passed through unmodified.
    Other(String),
}

impl<'a> ParsedStatement<'a> {
    pub(crate) fn classify(statement: &'a mut Statement) -> Self {
        let label = statement_label(statement);
        match statement {
            Statement::Query(query) => ParsedStatement::Select(query),
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                ..
            } => ParsedStatement::Update {
                table,
                assignments,
                from: from.as_mut(),
                selection,
            },
            Statement::Delete(delete) => classify_delete(delete),
            Statement::Insert(_) => ParsedStatement::Insert,
            _ => ParsedStatement::Other(label),
        }
    }
}

fn classify_delete(delete: &mut Delete) -> ParsedStatement<'_> {
    let Delete {
        from,
        using,
        selection,
        ..
    } = delete;
    let from = match from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    ParsedStatement::Delete {
        from,
        using: using.as_mut(),
        selection,
    }
}

fn statement_label(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

/// The body of a query.
pub(crate) enum SelectBody<'a> {
    /// A single `SELECT ... FROM ... WHERE ...`.
    Plain(&'a mut Select),
    /// `UNION`, `INTERSECT` or `EXCEPT`.
    SetOperation {
        left: &'a mut SetExpr,
        right: &'a mut SetExpr,
    },
    /// A parenthesized query, possibly with its own `WITH`.
    Parenthesized(&'a mut Query),
    /// `VALUES`, `TABLE t` and other bodies without a WHERE clause to extend.
    Unscoped(&'static str),
}

impl<'a> SelectBody<'a> {
    pub(crate) fn classify(body: &'a mut SetExpr) -> Self {
        match body {
            SetExpr::Select(select) => SelectBody::Plain(select),
            SetExpr::Query(query) => SelectBody::Parenthesized(query),
            SetExpr::SetOperation { left, right, .. } => SelectBody::SetOperation { left, right },
            SetExpr::Values(_) => SelectBody::Unscoped("VALUES"),
            SetExpr::Table(_) => SelectBody::Unscoped("TABLE"),
            _ => SelectBody::Unscoped("embedded DML"),
        }
    }
}

/// An item of a FROM list or the right-hand side of a JOIN.
pub(crate) enum FromItem<'a> {
    /// A named table, with its alias when one is given.
    BaseTable {
        name: &'a ObjectName,
        alias: Option<&'a Ident>,
    },
    /// `(SELECT ...) AS x`
    Subquery(&'a mut Query),
    /// `(a JOIN b ON ...)`
    NestedJoin(&'a mut TableWithJoins),
    /// Table functions, `UNNEST`, `PIVOT` and the like.
    Opaque(&'static str),
}

impl<'a> FromItem<'a> {
    pub(crate) fn classify(factor: &'a mut TableFactor) -> Self {
        match factor {
            TableFactor::Table { name, alias, .. } => FromItem::BaseTable {
                name,
                alias: alias.as_ref().map(|a| &a.name),
            },
            TableFactor::Derived { subquery, .. } => FromItem::Subquery(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => FromItem::NestedJoin(table_with_joins),
            TableFactor::TableFunction { .. } | TableFactor::Function { .. } => {
                FromItem::Opaque("table function")
            }
            TableFactor::UNNEST { .. } => FromItem::Opaque("UNNEST"),
            _ => FromItem::Opaque("unsupported table factor"),
        }
    }
}

/// Returns the condition slot of a join operator.
///
/// `None` means the join carries no condition that can be extended: `CROSS
/// JOIN`, `APPLY`, or an operator this classifier does not know.
pub(crate) fn join_constraint_mut(op: &mut JoinOperator) -> Option<&mut JoinConstraint> {
    match op {
        JoinOperator::Inner(constraint)
        | JoinOperator::LeftOuter(constraint)
        | JoinOperator::RightOuter(constraint)
        | JoinOperator::FullOuter(constraint)
        | JoinOperator::LeftSemi(constraint)
        | JoinOperator::RightSemi(constraint)
        | JoinOperator::LeftAnti(constraint)
        | JoinOperator::RightAnti(constraint) => Some(constraint),
        JoinOperator::AsOf { constraint, .. } => Some(constraint),
        _ => None,
    }
}

/// Returns the `ON` expression of a join, if it has one.
pub(crate) fn on_condition_mut(op: &mut JoinOperator) -> Option<&mut Expr> {
    match join_constraint_mut(op)? {
        JoinConstraint::On(expr) => Some(expr),
        _ => None,
    }
}
