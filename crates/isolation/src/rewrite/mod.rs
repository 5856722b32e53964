//! Tenant-scoping query rewriter.
//!
//! [`QueryRewriter`] intercepts a statement before it reaches the database,
//! parses it with the policy's dialect and injects
//! `<qualifier>.<tenant_column> = <tenant>` predicates so the statement can only
//! observe or mutate the caller's rows.
//!
//! | Statement | Where predicates go |
//! |-----------|---------------------|
//! | `SELECT`  | FROM tables: `WHERE`. Joined tables: the join's `ON`, or `WHERE` when the join has no `ON`. Derived tables, set-operation branches, CTEs and subqueries are scoped recursively. |
//! | `UPDATE`  | Target table, joined tables and `FROM` tables: `WHERE`. |
//! | `DELETE`  | Every FROM/USING table: `WHERE`. |
//! | `INSERT`  | Unchanged. |
//! | other     | Unchanged. |
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera_isolation::policy::IsolationPolicy;
//! use tessera_isolation::rewrite::QueryRewriter;
//! use tessera_isolation::tenant::{TenantContext, TenantId};
//!
//! let rewriter = QueryRewriter::new(Arc::new(IsolationPolicy::enabled()));
//! let ctx = TenantContext::with_tenant(TenantId::new(42).unwrap());
//!
//! let sql = rewriter
//!     .rewrite(&ctx, "SELECT * FROM orders AS o WHERE o.status = 'x'")
//!     .unwrap();
//! assert_eq!(sql, "SELECT * FROM orders AS o WHERE o.status = 'x' AND o.tenant_id = 42");
//! ```

mod predicate;
mod statement;

use std::convert::Infallible;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use sqlparser::ast::{
    Expr, Ident, Join, ObjectName, Query, Select, SetExpr, Statement, TableFactor,
    TableWithJoins, VisitMut, VisitorMut,
};
use sqlparser::parser::Parser;

use crate::error::RewriteError;
use crate::policy::{IsolationPolicy, NormalizedTableName, ParseFailureMode};
use crate::tenant::{TenantContext, TenantId};

use predicate::{and_in_place, extend_condition, tenant_predicate};
use statement::{FromItem, ParsedStatement, SelectBody, on_condition_mut};

/// A hook that transforms every statement before execution.
///
/// Database wrappers such as
/// [`ScopedConnection`](crate::backends::sqlite::ScopedConnection) call this on
/// each statement they prepare.
pub trait StatementInterceptor: Send + Sync {
    /// Returns the statement to execute in place of `sql`.
    fn intercept(&self, ctx: &TenantContext, sql: &str) -> Result<String, RewriteError>;
}

/// Why a statement was returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnchangedReason {
    /// No tenant in the context.
    NoTenant,
    /// Isolation is disabled by policy.
    Disabled,
    /// The statement could not be parsed (fail-open).
    Unparseable,
    /// Parsed, but no table needed a predicate (INSERT, DDL, excluded tables).
    NothingToScope,
}

impl fmt::Display for UnchangedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnchangedReason::NoTenant => write!(f, "no_tenant"),
            UnchangedReason::Disabled => write!(f, "disabled"),
            UnchangedReason::Unparseable => write!(f, "unparseable"),
            UnchangedReason::NothingToScope => write!(f, "nothing_to_scope"),
        }
    }
}

/// Whether the rewriter changed a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteStatus {
    /// At least one tenant predicate was injected.
    Scoped,
    /// The input text is returned as-is.
    Unchanged(UnchangedReason),
}

/// The result of [`QueryRewriter::analyze`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// The SQL to execute.
    pub sql: String,
    /// Number of tenant predicates injected.
    pub predicates_added: usize,
    /// Whether and why the statement changed.
    pub status: RewriteStatus,
}

impl RewriteOutcome {
    fn unchanged(sql: &str, reason: UnchangedReason) -> Self {
        Self {
            sql: sql.to_string(),
            predicates_added: 0,
            status: RewriteStatus::Unchanged(reason),
        }
    }

    /// Returns `true` if at least one predicate was injected.
    pub fn is_scoped(&self) -> bool {
        self.status == RewriteStatus::Scoped
    }
}

/// Rewrites statements so they only touch the active tenant's rows.
///
/// The rewriter is stateless apart from the shared policy, so one instance can
/// serve every request concurrently.
#[derive(Debug, Clone)]
pub struct QueryRewriter {
    policy: Arc<IsolationPolicy>,
}

impl QueryRewriter {
    /// Creates a rewriter bound to `policy`.
    pub fn new(policy: Arc<IsolationPolicy>) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    pub fn policy(&self) -> &Arc<IsolationPolicy> {
        &self.policy
    }

    /// Rewrites `sql` for the tenant held by `ctx`.
    ///
    /// Always `Ok` unless the policy is in fail-closed mode and `sql` does not
    /// parse.
    pub fn rewrite(&self, ctx: &TenantContext, sql: &str) -> Result<String, RewriteError> {
        self.rewrite_for(ctx.get(), sql)
    }

    /// Rewrites `sql` for the tenant of the enclosing
    /// [`TenantContext::scope`], if any.
    pub fn rewrite_current(&self, sql: &str) -> Result<String, RewriteError> {
        self.rewrite_for(TenantContext::current_tenant(), sql)
    }

    /// Rewrites `sql` for an explicit tenant.
    pub fn rewrite_for(&self, tenant: Option<TenantId>, sql: &str) -> Result<String, RewriteError> {
        self.analyze(tenant, sql).map(|outcome| outcome.sql)
    }

    /// Rewrites `sql` and reports what was done.
    pub fn analyze(
        &self,
        tenant: Option<TenantId>,
        sql: &str,
    ) -> Result<RewriteOutcome, RewriteError> {
        let Some(tenant) = tenant else {
            tracing::trace!("no tenant in context, statement passed through");
            return Ok(RewriteOutcome::unchanged(sql, UnchangedReason::NoTenant));
        };
        if !self.policy.is_enabled() {
            return Ok(RewriteOutcome::unchanged(sql, UnchangedReason::Disabled));
        }

        let dialect = self.policy.dialect().parser_dialect();
        let mut statements = match Parser::parse_sql(dialect.as_ref(), sql) {
            Ok(statements) => statements,
            Err(err) => return self.handle_parse_failure(tenant, sql, err.to_string()),
        };

        let mut scoper = Scoper::new(&self.policy, tenant);
        for statement in &mut statements {
            scoper.scope_statement(statement);
        }

        if scoper.added == 0 {
            return Ok(RewriteOutcome::unchanged(sql, UnchangedReason::NothingToScope));
        }

        let rewritten = statements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");

        tracing::debug!(
            tenant_id = %tenant,
            predicates = scoper.added,
            sql = %rewritten,
            "statement tenant-scoped"
        );

        Ok(RewriteOutcome {
            sql: rewritten,
            predicates_added: scoper.added,
            status: RewriteStatus::Scoped,
        })
    }

    fn handle_parse_failure(
        &self,
        tenant: TenantId,
        sql: &str,
        message: String,
    ) -> Result<RewriteOutcome, RewriteError> {
        match self.policy.on_parse_failure() {
            ParseFailureMode::FailOpen => {
                tracing::warn!(
                    tenant_id = %tenant,
                    error = %message,
                    sql = %sql,
                    "statement could not be parsed, executing without tenant scoping"
                );
                Ok(RewriteOutcome::unchanged(sql, UnchangedReason::Unparseable))
            }
            ParseFailureMode::FailClosed => {
                tracing::warn!(
                    tenant_id = %tenant,
                    error = %message,
                    sql = %sql,
                    "statement could not be parsed, refusing to execute"
                );
                Err(RewriteError::Unparseable { message })
            }
        }
    }
}

impl StatementInterceptor for QueryRewriter {
    fn intercept(&self, ctx: &TenantContext, sql: &str) -> Result<String, RewriteError> {
        self.rewrite(ctx, sql)
    }
}

/// Where predicates for joined tables are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// In the join's `ON` when it has one.
    JoinCondition,
    /// Always in the statement's `WHERE`.
    Where,
}

/// One pass over one statement.
struct Scoper<'p> {
    policy: &'p IsolationPolicy,
    tenant: TenantId,
    /// CTE names visible at the current point; these are not tables.
    ctes: Vec<NormalizedTableName>,
    added: usize,
}

impl<'p> Scoper<'p> {
    fn new(policy: &'p IsolationPolicy, tenant: TenantId) -> Self {
        Self {
            policy,
            tenant,
            ctes: Vec::new(),
            added: 0,
        }
    }

    fn scope_statement(&mut self, statement: &mut Statement) {
        match ParsedStatement::classify(statement) {
            ParsedStatement::Select(query) => self.scope_query(query),
            ParsedStatement::Update {
                table,
                assignments,
                from,
                selection,
            } => {
                self.scope_nested_queries(assignments);
                self.scope_nested_queries(selection);
                let mut pending = Vec::new();
                self.scope_nested_queries(table);
                self.scope_from(table, Placement::Where, &mut pending);
                if let Some(from) = from {
                    self.scope_nested_queries(from);
                    self.scope_from(from, Placement::Where, &mut pending);
                }
                extend_condition(selection, pending);
            }
            ParsedStatement::Delete {
                from,
                using,
                selection,
            } => {
                self.scope_nested_queries(selection);
                let mut pending = Vec::new();
                for table in from.iter_mut() {
                    self.scope_nested_queries(table);
                    self.scope_from(table, Placement::Where, &mut pending);
                }
                for table in using.into_iter().flatten() {
                    self.scope_nested_queries(table);
                    self.scope_from(table, Placement::Where, &mut pending);
                }
                extend_condition(selection, pending);
            }
            ParsedStatement::Insert => {
                tracing::trace!("INSERT passed through without tenant scoping");
            }
            ParsedStatement::Other(kind) => {
                tracing::trace!(kind = %kind, "statement passed through without tenant scoping");
            }
        }
    }

    fn scope_query(&mut self, query: &mut Query) {
        let visible = self.ctes.len();
        if let Some(with) = query.with.as_mut() {
            for cte in &mut with.cte_tables {
                self.scope_query(&mut cte.query);
                self.ctes
                    .push(NormalizedTableName::new(&cte.alias.name.value));
            }
        }
        self.scope_body(&mut query.body);
        self.scope_nested_queries(&mut query.order_by);
        self.scope_nested_queries(&mut query.limit);
        self.ctes.truncate(visible);
    }

    fn scope_body(&mut self, body: &mut SetExpr) {
        match SelectBody::classify(body) {
            SelectBody::Plain(select) => self.scope_select(select),
            SelectBody::SetOperation { left, right } => {
                self.scope_body(left);
                self.scope_body(right);
            }
            SelectBody::Parenthesized(query) => self.scope_query(query),
            SelectBody::Unscoped(kind) => {
                tracing::trace!(kind, "query body left unscoped");
            }
        }
    }

    fn scope_select(&mut self, select: &mut Select) {
        // Projection, WHERE, ON, GROUP BY, HAVING and friends.
        self.scope_nested_queries(select);

        let mut pending = Vec::new();
        for table in &mut select.from {
            self.scope_from(table, Placement::JoinCondition, &mut pending);
        }
        extend_condition(&mut select.selection, pending);
    }

    fn scope_from(
        &mut self,
        table: &mut TableWithJoins,
        placement: Placement,
        pending: &mut Vec<Expr>,
    ) {
        self.scope_from_item(FromItem::classify(&mut table.relation), placement, pending);

        for join in &mut table.joins {
            let Join {
                relation,
                join_operator,
                ..
            } = join;

            match FromItem::classify(relation) {
                FromItem::BaseTable { name, alias } => {
                    let Some(predicate) = self.predicate_for(name, alias) else {
                        continue;
                    };
                    match (placement, on_condition_mut(join_operator)) {
                        (Placement::JoinCondition, Some(on)) => and_in_place(on, predicate),
                        _ => pending.push(predicate),
                    }
                }
                other => self.scope_from_item(other, placement, pending),
            }
        }
    }

    fn scope_from_item(&mut self, item: FromItem<'_>, placement: Placement, pending: &mut Vec<Expr>) {
        match item {
            FromItem::BaseTable { name, alias } => {
                if let Some(predicate) = self.predicate_for(name, alias) {
                    pending.push(predicate);
                }
            }
            FromItem::Subquery(query) => self.scope_query(query),
            FromItem::NestedJoin(inner) => self.scope_from(inner, placement, pending),
            FromItem::Opaque(kind) => {
                tracing::debug!(kind, "table factor left unscoped");
            }
        }
    }

    fn predicate_for(&mut self, name: &ObjectName, alias: Option<&Ident>) -> Option<Expr> {
        let raw = name.to_string();
        if self.policy.is_excluded_table(&raw) {
            tracing::trace!(table = %raw, "excluded table left unscoped");
            return None;
        }
        if name.0.len() == 1 && self.ctes.contains(&NormalizedTableName::new(&raw)) {
            return None;
        }
        self.added += 1;
        Some(tenant_predicate(
            name,
            alias,
            self.policy.tenant_column(),
            self.tenant,
        ))
    }

    /// Scopes every query nested in the expressions of `node`.
    ///
    /// Derived tables are skipped; [`Scoper::scope_from`] owns those.
    fn scope_nested_queries<N: VisitMut>(&mut self, node: &mut N) {
        let mut visitor = NestedQueries {
            scoper: self,
            depth: 0,
        };
        let ControlFlow::Continue(()) = node.visit(&mut visitor);
    }
}

/// Finds the outermost queries inside expressions (scalar subqueries,
/// `EXISTS`, `IN (SELECT ...)`, function arguments, `CASE` arms) and hands
/// each to the scoper, which recurses on its own.
struct NestedQueries<'s, 'p> {
    scoper: &'s mut Scoper<'p>,
    /// Queries and derived tables entered below the visited node.
    depth: usize,
}

impl VisitorMut for NestedQueries<'_, '_> {
    type Break = Infallible;

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            self.scoper.scope_query(query);
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &mut Query) -> ControlFlow<Self::Break> {
        self.depth -= 1;
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &mut TableFactor) -> ControlFlow<Self::Break> {
        if matches!(factor, TableFactor::Derived { .. }) {
            self.depth += 1;
        }
        ControlFlow::Continue(())
    }

    fn post_visit_table_factor(&mut self, factor: &mut TableFactor) -> ControlFlow<Self::Break> {
        if matches!(factor, TableFactor::Derived { .. }) {
            self.depth -= 1;
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::IsolationConfig;

    fn tenant(id: i64) -> TenantId {
        TenantId::new(id).unwrap()
    }

    fn rewriter() -> QueryRewriter {
        QueryRewriter::new(Arc::new(IsolationPolicy::enabled()))
    }

    #[test]
    fn test_no_tenant_passes_through() {
        let outcome = rewriter().analyze(None, "SELECT * FROM orders").unwrap();
        assert_eq!(outcome.sql, "SELECT * FROM orders");
        assert_eq!(
            outcome.status,
            RewriteStatus::Unchanged(UnchangedReason::NoTenant)
        );
    }

    #[test]
    fn test_disabled_passes_through() {
        let policy = IsolationPolicy::from_config(IsolationConfig::default()).unwrap();
        let outcome = QueryRewriter::new(Arc::new(policy))
            .analyze(Some(tenant(1)), "SELECT * FROM orders")
            .unwrap();
        assert_eq!(outcome.sql, "SELECT * FROM orders");
        assert_eq!(
            outcome.status,
            RewriteStatus::Unchanged(UnchangedReason::Disabled)
        );
    }

    #[test]
    fn test_counts_predicates() {
        let outcome = rewriter()
            .analyze(
                Some(tenant(3)),
                "SELECT * FROM orders AS o JOIN items AS i ON o.id = i.order_id",
            )
            .unwrap();
        assert!(outcome.is_scoped());
        assert_eq!(outcome.predicates_added, 2);
    }

    #[test]
    fn test_unparseable_fail_open() {
        let outcome = rewriter()
            .analyze(Some(tenant(3)), "SELEC nonsense FROM")
            .unwrap();
        assert_eq!(outcome.sql, "SELEC nonsense FROM");
        assert_eq!(
            outcome.status,
            RewriteStatus::Unchanged(UnchangedReason::Unparseable)
        );
    }

    #[test]
    fn test_unparseable_fail_closed() {
        let policy =
            IsolationPolicy::enabled().with_parse_failure_mode(ParseFailureMode::FailClosed);
        let result = QueryRewriter::new(Arc::new(policy)).rewrite_for(Some(tenant(3)), "SELEC x");
        assert!(matches!(result, Err(RewriteError::Unparseable { .. })));
    }

    #[test]
    fn test_nothing_to_scope_keeps_original_text() {
        let sql = "insert into orders (id) values (1)";
        let outcome = rewriter().analyze(Some(tenant(3)), sql).unwrap();
        assert_eq!(outcome.sql, sql);
        assert_eq!(
            outcome.status,
            RewriteStatus::Unchanged(UnchangedReason::NothingToScope)
        );
    }

    #[test]
    fn test_cte_name_is_not_scoped() {
        let sql = rewriter()
            .rewrite_for(
                Some(tenant(4)),
                "WITH recent AS (SELECT id FROM orders) SELECT id FROM recent",
            )
            .unwrap();
        assert_eq!(
            sql,
            "WITH recent AS (SELECT id FROM orders WHERE orders.tenant_id = 4) SELECT id FROM recent"
        );
    }

    #[test]
    fn test_interceptor_uses_context() {
        let ctx = TenantContext::with_tenant(tenant(8));
        let interceptor: &dyn StatementInterceptor = &rewriter();
        assert_eq!(
            interceptor.intercept(&ctx, "DELETE FROM orders").unwrap(),
            "DELETE FROM orders WHERE orders.tenant_id = 8"
        );
    }

    #[test]
    fn test_rewrite_current_reads_task_local() {
        let rewriter = rewriter();
        let ctx = TenantContext::with_tenant(tenant(12));
        let sql = ctx.sync_scope(|| rewriter.rewrite_current("SELECT * FROM orders").unwrap());
        assert_eq!(sql, "SELECT * FROM orders WHERE orders.tenant_id = 12");
        assert_eq!(
            rewriter.rewrite_current("SELECT * FROM orders").unwrap(),
            "SELECT * FROM orders"
        );
    }

    #[test]
    fn test_unchanged_reason_display() {
        assert_eq!(UnchangedReason::NothingToScope.to_string(), "nothing_to_scope");
    }
}
