//! Raw-SQL text analysis: the block list, operation classification, and
//! schema extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use service_core::error::AppError;

/// Statements that never run through the data plane, regardless of grants.
static BLOCKED_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\bDROP\s+DATABASE\b", "DROP DATABASE"),
        (r"(?i)\bCREATE\s+DATABASE\b", "CREATE DATABASE"),
        (r"(?i)\bALTER\s+DATABASE\b", "ALTER DATABASE"),
        (r"(?i)\bGRANT\b", "GRANT"),
        (r"(?i)\bREVOKE\b", "REVOKE"),
        (r"(?i)\bCREATE\s+USER\b", "CREATE USER"),
        (r"(?i)\bDROP\s+USER\b", "DROP USER"),
        (r"(?i)\bALTER\s+USER\b", "ALTER USER"),
        (r"(?i)\bCREATE\s+ROLE\b", "CREATE ROLE"),
        (r"(?i)\bDROP\s+ROLE\b", "DROP ROLE"),
        (r"(?i)\bALTER\s+ROLE\b", "ALTER ROLE"),
    ]
    .into_iter()
    .map(|(pattern, name)| (Regex::new(pattern).expect("static regex"), name))
    .collect()
});

static SCHEMA_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([a-zA-Z_][a-zA-Z0-9_]*)\.",
        r"(?i)(?:FROM|JOIN|INTO|UPDATE|DELETE\s+FROM|INSERT\s+INTO|DROP\s+TABLE|ALTER\s+TABLE)\s+([a-zA-Z_][a-zA-Z0-9_]*)\.",
        r"(?i)(?:TABLE)\s+([a-zA-Z_][a-zA-Z0-9_]*)\.",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("static regex"))
    .collect()
});

/// Reject queries matching the block list before anything reaches a target.
pub fn check_blocked(query: &str) -> Result<(), AppError> {
    for (pattern, name) in BLOCKED_PATTERNS.iter() {
        if pattern.is_match(query) {
            return Err(AppError::BlockedSql((*name).to_string()));
        }
    }
    Ok(())
}

/// Classify a statement by its first keyword.
pub fn classify_operation(query: &str) -> &'static str {
    let trimmed = query.trim_start().to_uppercase();

    for (prefix, op) in [
        ("SELECT", "select"),
        ("INSERT", "insert"),
        ("UPDATE", "update"),
        ("DELETE", "delete"),
        ("CREATE", "create"),
        ("ALTER", "alter"),
        ("DROP", "drop"),
        ("TRUNCATE", "truncate"),
    ] {
        if trimmed.starts_with(prefix) {
            return op;
        }
    }
    "unknown"
}

/// Pull the first schema-qualified name out of the query; unqualified
/// statements default to `public`.
pub fn extract_schema(query: &str) -> String {
    for pattern in SCHEMA_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(query) {
            if let Some(schema) = captures.get(1) {
                return schema.as_str().to_string();
            }
        }
    }
    "public".to_string()
}

/// Whether the statement will produce rows worth fetching.
pub fn returns_rows(query: &str, operation: &str) -> bool {
    operation == "select" || query.to_uppercase().contains("RETURNING")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_list_catches_role_and_database_statements() {
        for query in [
            "DROP DATABASE prod",
            "drop   database prod",
            "CREATE DATABASE x",
            "ALTER DATABASE x SET y",
            "GRANT SELECT ON t TO u",
            "revoke all on t from u",
            "CREATE USER foo",
            "DROP USER foo",
            "ALTER USER foo PASSWORD 'x'",
            "CREATE ROLE r",
            "DROP ROLE r",
            "ALTER ROLE r",
            "SELECT 1; DROP USER foo",
        ] {
            assert!(check_blocked(query).is_err(), "{} should be blocked", query);
        }
    }

    #[test]
    fn block_list_allows_ordinary_dml() {
        for query in [
            "SELECT * FROM users",
            "INSERT INTO t VALUES (1)",
            "UPDATE t SET granted = true",  // column named like keyword prefix is fine
            "DELETE FROM t WHERE id = 1",
            "DROP TABLE old_stuff",
        ] {
            assert!(check_blocked(query).is_ok(), "{} should pass", query);
        }
    }

    #[test]
    fn classification_uses_first_keyword() {
        assert_eq!(classify_operation("SELECT 1"), "select");
        assert_eq!(classify_operation("  select 1"), "select");
        assert_eq!(classify_operation("INSERT INTO t VALUES (1)"), "insert");
        assert_eq!(classify_operation("UPDATE t SET x = 1"), "update");
        assert_eq!(classify_operation("DELETE FROM t"), "delete");
        assert_eq!(classify_operation("CREATE TABLE t (id int)"), "create");
        assert_eq!(classify_operation("ALTER TABLE t ADD c int"), "alter");
        assert_eq!(classify_operation("DROP TABLE t"), "drop");
        assert_eq!(classify_operation("TRUNCATE t"), "truncate");
        assert_eq!(classify_operation("WITH x AS (SELECT 1) SELECT * FROM x"), "unknown");
    }

    #[test]
    fn schema_extraction_patterns() {
        assert_eq!(extract_schema("SELECT * FROM sales.orders"), "sales");
        assert_eq!(extract_schema("INSERT INTO audit.log VALUES (1)"), "audit");
        assert_eq!(
            extract_schema("CREATE TABLE IF NOT EXISTS stage.tmp (id int)"),
            "stage"
        );
        assert_eq!(extract_schema("UPDATE hr.people SET x = 1"), "hr");
        assert_eq!(extract_schema("DELETE FROM ops.jobs WHERE id = 1"), "ops");
        assert_eq!(extract_schema("DROP TABLE sales.orders"), "sales");
        assert_eq!(extract_schema("ALTER TABLE sales.orders ADD c int"), "sales");
        assert_eq!(extract_schema("TRUNCATE TABLE sales.orders"), "sales");
        assert_eq!(extract_schema("SELECT 1"), "public");
        assert_eq!(extract_schema("SELECT * FROM orders"), "public");
    }

    #[test]
    fn returning_counts_as_row_producing() {
        assert!(returns_rows("SELECT 1", "select"));
        assert!(returns_rows("INSERT INTO t VALUES (1) RETURNING id", "insert"));
        assert!(!returns_rows("INSERT INTO t VALUES (1)", "insert"));
    }
}
