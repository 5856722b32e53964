//! Tenant predicate construction.

use std::ops::ControlFlow;

use sqlparser::ast::{BinaryOperator, Expr, Ident, ObjectName, Value, visit_expressions};

use crate::tenant::TenantId;

/// Builds `<qualifier>.<column> = <tenant>`.
///
/// The qualifier is the alias when one is given, otherwise the table name as
/// written (schema included).
pub(crate) fn tenant_predicate(
    name: &ObjectName,
    alias: Option<&Ident>,
    column: &str,
    tenant: TenantId,
) -> Expr {
    let mut path = match alias {
        Some(alias) => vec![alias.clone()],
        None => name.0.clone(),
    };
    path.push(Ident::new(column));

    Expr::BinaryOp {
        left: Box::new(Expr::CompoundIdentifier(path)),
        op: BinaryOperator::Eq,
        right: Box::new(Expr::Value(Value::Number(tenant.to_sql_literal(), false))),
    }
}

/// AND-combines `predicate` into an optional existing condition.
///
/// The existing condition is parenthesized when it contains an operator that
/// binds no tighter than `AND` in some dialect (`OR`, `XOR`, and `||`, which
/// MySQL reads as `OR`), since the AST printer does not add grouping on its
/// own.
pub(crate) fn and_combine(existing: Option<Expr>, predicate: Expr) -> Expr {
    match existing {
        None => predicate,
        Some(condition) => Expr::BinaryOp {
            left: Box::new(group_if_needed(condition)),
            op: BinaryOperator::And,
            right: Box::new(predicate),
        },
    }
}

/// Folds every predicate into `slot`.
pub(crate) fn extend_condition(slot: &mut Option<Expr>, predicates: Vec<Expr>) {
    for predicate in predicates {
        *slot = Some(and_combine(slot.take(), predicate));
    }
}

/// AND-combines `predicate` into an existing condition in place.
pub(crate) fn and_in_place(condition: &mut Expr, predicate: Expr) {
    let existing = std::mem::replace(condition, Expr::Value(Value::Null));
    *condition = and_combine(Some(existing), predicate);
}

fn group_if_needed(condition: Expr) -> Expr {
    if matches!(condition, Expr::Nested(_)) {
        return condition;
    }
    let loose = visit_expressions(&condition, |expr| match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Or | BinaryOperator::Xor | BinaryOperator::StringConcat,
            ..
        } => ControlFlow::Break(()),
        _ => ControlFlow::Continue(()),
    });
    if loose.is_break() {
        Expr::Nested(Box::new(condition))
    } else {
        condition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    fn tenant(id: i64) -> TenantId {
        TenantId::new(id).unwrap()
    }

    fn expr(sql: &str) -> Expr {
        Parser::new(&GenericDialect {})
            .try_with_sql(sql)
            .unwrap()
            .parse_expr()
            .unwrap()
    }

    fn name(parts: &[&str]) -> ObjectName {
        ObjectName(parts.iter().map(|p| Ident::new(*p)).collect())
    }

    #[test]
    fn test_predicate_uses_alias() {
        let alias = Ident::new("o");
        let pred = tenant_predicate(&name(&["orders"]), Some(&alias), "tenant_id", tenant(42));
        assert_eq!(pred.to_string(), "o.tenant_id = 42");
    }

    #[test]
    fn test_predicate_uses_qualified_name() {
        let pred = tenant_predicate(&name(&["shop", "orders"]), None, "tenant_id", tenant(7));
        assert_eq!(pred.to_string(), "shop.orders.tenant_id = 7");
    }

    #[test]
    fn test_predicate_keeps_alias_quoting() {
        let alias = Ident::with_quote('`', "Order");
        let pred = tenant_predicate(&name(&["orders"]), Some(&alias), "org_id", tenant(3));
        assert_eq!(pred.to_string(), "`Order`.org_id = 3");
    }

    #[test]
    fn test_and_combine_without_existing() {
        let pred = expr("t.tenant_id = 1");
        assert_eq!(and_combine(None, pred).to_string(), "t.tenant_id = 1");
    }

    #[test]
    fn test_and_combine_keeps_condition_verbatim() {
        let combined = and_combine(Some(expr("t.status = 'open'")), expr("t.tenant_id = 1"));
        assert_eq!(combined.to_string(), "t.status = 'open' AND t.tenant_id = 1");
    }

    #[test]
    fn test_and_combine_groups_or() {
        let combined = and_combine(Some(expr("a = 1 OR b = 2")), expr("t.tenant_id = 1"));
        assert_eq!(combined.to_string(), "(a = 1 OR b = 2) AND t.tenant_id = 1");
    }

    #[test]
    fn test_and_combine_groups_pipe_or() {
        let combined = and_combine(Some(expr("a = 1 || b = 2")), expr("t.tenant_id = 1"));
        assert_eq!(combined.to_string(), "(a = 1 || b = 2) AND t.tenant_id = 1");
    }

    #[test]
    fn test_and_combine_groups_trailing_or() {
        let combined = and_combine(Some(expr("x = 1 AND y = 2 OR z = 3")), expr("t.tenant_id = 1"));
        assert_eq!(combined.to_string(), "(x = 1 AND y = 2 OR z = 3) AND t.tenant_id = 1");
    }

    #[test]
    fn test_and_combine_keeps_existing_parentheses() {
        let combined = and_combine(Some(expr("(a = 1 OR b = 2)")), expr("t.tenant_id = 1"));
        assert_eq!(combined.to_string(), "(a = 1 OR b = 2) AND t.tenant_id = 1");
    }

    #[test]
    fn test_and_in_place() {
        let mut on = expr("o.id = i.order_id");
        and_in_place(&mut on, expr("i.tenant_id = 9"));
        assert_eq!(on.to_string(), "o.id = i.order_id AND i.tenant_id = 9");
    }

    #[test]
    fn test_extend_condition_folds_in_order() {
        let mut slot = Some(expr("x > 0"));
        extend_condition(&mut slot, vec![expr("a.tenant_id = 5"), expr("b.tenant_id = 5")]);
        assert_eq!(
            slot.unwrap().to_string(),
            "x > 0 AND a.tenant_id = 5 AND b.tenant_id = 5"
        );
    }
}
