//! Syntactic safety for SQL identifiers.
//!
//! Every schema/table/column/role name that ends up concatenated into
//! dynamic SQL must pass one of these predicates first; values always go
//! through parameter binding instead.

use once_cell::sync::Lazy;
use regex::Regex;
use service_core::error::AppError;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,62}$").expect("static regex"));

static STRICT_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,62}$").expect("static regex"));

/// Accepts identifiers arriving through the API (`-` allowed).
pub fn is_valid_identifier(identifier: &str) -> bool {
    IDENTIFIER_RE.is_match(identifier)
}

/// Stricter form for identifiers embedded into materializer DDL: no `-`,
/// PostgreSQL's 63-char limit.
pub fn is_strict_identifier(identifier: &str) -> bool {
    STRICT_IDENTIFIER_RE.is_match(identifier)
}

/// Validate and pass through, for use at call sites building SQL.
pub fn require_identifier<'a>(identifier: &'a str, what: &str) -> Result<&'a str, AppError> {
    if is_valid_identifier(identifier) {
        Ok(identifier)
    } else {
        Err(AppError::IdentifierInvalid(format!("{}: {}", what, identifier)))
    }
}

/// Strict variant used by the permission materializer and role manager.
pub fn require_strict_identifier<'a>(identifier: &'a str, what: &str) -> Result<&'a str, AppError> {
    if is_strict_identifier(identifier) {
        Ok(identifier)
    } else {
        Err(AppError::IdentifierInvalid(format!("{}: {}", what, identifier)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_identifiers() {
        for ident in ["public", "users", "my_table", "Table1", "a", "order-items"] {
            assert!(is_valid_identifier(ident), "{} should be valid", ident);
        }
    }

    #[test]
    fn rejects_injection_shapes() {
        for ident in [
            "",
            "1table",
            "_leading",
            "users; DROP TABLE users",
            "users--",
            "schema.table",
            "na\u{0}me",
            "tab le",
            "\"quoted\"",
        ] {
            assert!(!is_valid_identifier(ident), "{:?} should be invalid", ident);
        }
    }

    #[test]
    fn rejects_overlong_identifiers() {
        let max = format!("a{}", "b".repeat(62));
        assert!(is_valid_identifier(&max));
        let too_long = format!("a{}", "b".repeat(63));
        assert!(!is_valid_identifier(&too_long));
    }

    #[test]
    fn strict_form_rejects_dashes() {
        assert!(is_valid_identifier("order-items"));
        assert!(!is_strict_identifier("order-items"));
        assert!(is_strict_identifier("order_items"));
    }

    #[test]
    fn require_reports_what_failed() {
        let err = require_identifier("bad name", "schema").unwrap_err();
        assert!(err.to_string().contains("schema"));
    }
}
