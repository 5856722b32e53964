//! Deny-lists for row-filter expressions.

use sqlparser::keywords::Keyword;

/// Injection signatures, matched case-insensitively anywhere in the text.
pub const DANGEROUS_PATTERN: &str = r"(?i)(--|;|/\*|\*/|xp_|sp_|0x[0-9a-f]+)";

/// Keywords rejected when they appear as a whole word.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "UPDATE", "INSERT", "ALTER", "CREATE", "EXEC", "EXECUTE",
    "GRANT", "REVOKE", "SHUTDOWN", "BACKUP", "UNION", "INTO", "OUTFILE", "DUMPFILE", "LOAD_FILE",
];

/// Function names rejected anywhere in the expression tree.
pub const FORBIDDEN_FUNCTIONS: &[&str] = &[
    "SLEEP",
    "BENCHMARK",
    "LOAD_FILE",
    "INTO_OUTFILE",
    "INTO_DUMPFILE",
    "USER",
    "DATABASE",
    "VERSION",
    "SYSTEM_USER",
    "SESSION_USER",
    "CURRENT_USER",
];

/// Functions that MySQL also calls without parentheses. Unquoted, they are
/// reserved words and never name a column.
pub(crate) const NILADIC_FUNCTIONS: &[&str] = &["CURRENT_USER", "SESSION_USER", "SYSTEM_USER"];

/// Keywords that start a statement rather than a condition.
pub(crate) const STATEMENT_KEYWORDS: &[Keyword] = &[
    Keyword::SELECT,
    Keyword::WITH,
    Keyword::VALUES,
    Keyword::TABLE,
    Keyword::SHOW,
    Keyword::SET,
    Keyword::CALL,
    Keyword::MERGE,
    Keyword::REPLACE,
    Keyword::USE,
    Keyword::DESCRIBE,
    Keyword::EXPLAIN,
    Keyword::COPY,
    Keyword::PREPARE,
    Keyword::DEALLOCATE,
    Keyword::DECLARE,
    Keyword::KILL,
];

/// Builds the whole-word keyword pattern.
pub(crate) fn keyword_pattern() -> String {
    format!(r"(?i)\b({})\b", FORBIDDEN_KEYWORDS.join("|"))
}

pub(crate) fn is_forbidden_function(name: &str) -> bool {
    FORBIDDEN_FUNCTIONS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(name))
}

pub(crate) fn is_niladic_function(name: &str) -> bool {
    NILADIC_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(name))
}
