//! `SQLite` schema definitions for the contact store.
//!
//! The persisted layout is a single `contacts` table plus a `metadata`
//! key/value table carrying the schema version. Column names are part of the
//! on-disk contract and deliberately keep their original casing.

/// SQL statement to create the contacts table.
pub const CREATE_CONTACTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    firstName TEXT NOT NULL,
    lastName TEXT NOT NULL,
    address TEXT NOT NULL,
    isFavorite INTEGER NOT NULL DEFAULT 0
)
";

/// SQL statement to create an index on `firstName`, the list sort key.
pub const CREATE_FIRST_NAME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_contacts_first_name ON contacts(firstName ASC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_CONTACTS_TABLE,
    CREATE_FIRST_NAME_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_create_contacts_table_contains_required_columns() {
        assert!(CREATE_CONTACTS_TABLE.contains("id INTEGER PRIMARY KEY"));
        assert!(CREATE_CONTACTS_TABLE.contains("firstName TEXT NOT NULL"));
        assert!(CREATE_CONTACTS_TABLE.contains("lastName TEXT NOT NULL"));
        assert!(CREATE_CONTACTS_TABLE.contains("address TEXT NOT NULL"));
        assert!(CREATE_CONTACTS_TABLE.contains("isFavorite INTEGER NOT NULL DEFAULT 0"));
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }
}
