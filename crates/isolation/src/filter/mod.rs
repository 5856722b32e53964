//! Row-filter expression validation.
//!
//! Administrators author boolean row filters (for example
//! `department = 'Sales' AND region = 'East'`) that are later spliced into
//! generated queries. [`FilterExpressionValidator`] screens them at write time
//! so a filter can never carry a second statement, a comment, or a call to a
//! function that leaks server information.
//!
//! Checks run in order and the first failure wins:
//!
//! 1. Blank input is accepted.
//! 2. Injection signatures (`--`, `;`, `/*`, `*/`, `xp_`, `sp_`, hex literals).
//! 3. Deny-listed keywords as whole words.
//! 4. The text must parse as exactly one SQL expression.
//! 5. Deny-listed function names anywhere in the parsed tree.

mod denylist;

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::ops::ControlFlow;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{Expr, visit_expressions};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use thiserror::Error;

use crate::dialect::SqlDialect;

pub use denylist::{DANGEROUS_PATTERN, FORBIDDEN_FUNCTIONS, FORBIDDEN_KEYWORDS};

/// Why a filter expression was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterRejection {
    /// An injection signature was found in the raw text.
    #[error("Expression contains potentially dangerous patterns")]
    DangerousPattern,

    /// A deny-listed keyword appears as a whole word.
    #[error("Expression contains forbidden keyword: {keyword}")]
    ForbiddenKeyword { keyword: String },

    /// The text is not a single SQL expression.
    #[error("Invalid SQL expression syntax: {message}")]
    InvalidSyntax { message: String },

    /// A deny-listed function is called.
    #[error("Expression contains forbidden function: {function}")]
    ForbiddenFunction { function: String },
}

/// The outcome of validating a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the expression is safe to store.
    pub valid: bool,

    /// Why the expression was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationResult {
    /// An accepted expression.
    pub fn success() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    /// A rejected expression.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

impl From<Result<(), FilterRejection>> for ValidationResult {
    fn from(result: Result<(), FilterRejection>) -> Self {
        match result {
            Ok(()) => ValidationResult::success(),
            Err(rejection) => ValidationResult::failure(rejection.to_string()),
        }
    }
}

/// Screens administrator-supplied row-filter expressions.
///
/// # Example
///
/// ```
/// use tessera_isolation::filter::FilterExpressionValidator;
///
/// let validator = FilterExpressionValidator::new().unwrap();
///
/// assert!(validator.validate("department = 'Sales' AND region = 'East'").valid);
///
/// let result = validator.validate("1=1; DROP TABLE users");
/// assert!(!result.valid);
/// assert_eq!(
///     result.message.as_deref(),
///     Some("Expression contains potentially dangerous patterns")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct FilterExpressionValidator {
    dangerous: Regex,
    keywords: Regex,
    dialect: SqlDialect,
}

impl FilterExpressionValidator {
    /// Creates a validator parsing with the default dialect.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            dangerous: Regex::new(DANGEROUS_PATTERN)?,
            keywords: Regex::new(&denylist::keyword_pattern())?,
            dialect: SqlDialect::default(),
        })
    }

    /// Returns a copy parsing with `dialect`.
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Validates `expression`, returning a serializable result.
    pub fn validate(&self, expression: &str) -> ValidationResult {
        self.check(expression).into()
    }

    /// Validates `expression`, returning the typed rejection reason.
    pub fn check(&self, expression: &str) -> Result<(), FilterRejection> {
        let text = expression.trim();
        if text.is_empty() {
            return Ok(());
        }

        if self.dangerous.is_match(text) {
            return Err(FilterRejection::DangerousPattern);
        }

        if let Some(found) = self.keywords.find(text) {
            return Err(FilterRejection::ForbiddenKeyword {
                keyword: found.as_str().to_ascii_uppercase(),
            });
        }

        let parsed = self.parse_condition(text).map_err(|message| {
            tracing::warn!(expression = %text, error = %message, "failed to parse row filter expression");
            FilterRejection::InvalidSyntax { message }
        })?;

        if let Some(function) = called_functions(&parsed)
            .into_iter()
            .find(|name| denylist::is_forbidden_function(name))
        {
            return Err(FilterRejection::ForbiddenFunction { function });
        }

        Ok(())
    }

    fn parse_condition(&self, text: &str) -> Result<Expr, String> {
        let dialect = self.dialect.parser_dialect();
        let mut parser = Parser::new(dialect.as_ref())
            .try_with_sql(text)
            .map_err(|e| e.to_string())?;

        if let Token::Word(word) = parser.peek_token().token {
            if denylist::STATEMENT_KEYWORDS.contains(&word.keyword) {
                return Err(format!(
                    "expected a condition, found statement keyword {}",
                    word.value.to_ascii_uppercase()
                ));
            }
        }

        let expr = parser.parse_expr().map_err(|e| e.to_string())?;

        let next = parser.peek_token();
        if next.token != Token::EOF {
            return Err(format!("unexpected trailing input: {}", next.token));
        }
        Ok(expr)
    }
}

/// Collects every called function's name (last path segment).
///
/// Unquoted niladic functions such as `CURRENT_USER` parse as plain
/// identifiers in some dialects and are collected as well.
fn called_functions(expr: &Expr) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let ControlFlow::Continue(()) = visit_expressions(expr, |e| {
        match e {
            Expr::Function(function) => {
                if let Some(ident) = function.name.0.last() {
                    names.insert(ident.value.clone());
                }
            }
            Expr::Identifier(ident)
                if ident.quote_style.is_none() && denylist::is_niladic_function(&ident.value) =>
            {
                names.insert(ident.value.clone());
            }
            _ => {}
        }
        ControlFlow::<Infallible>::Continue(())
    });
    names
}
