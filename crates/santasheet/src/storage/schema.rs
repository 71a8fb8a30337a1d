//! `SQLite` schema definitions for the sheet store.

/// SQL statement to create the sheets table.
///
/// `seq` preserves insertion order and backs page tokens; `id` is the
/// public identifier. `fields` holds the sheet content as a JSON document.
pub const CREATE_SHEETS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sheets (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    fields TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_SHEETS_TABLE, CREATE_METADATA_TABLE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sheets_table_contains_required_columns() {
        assert!(CREATE_SHEETS_TABLE.contains("seq INTEGER PRIMARY KEY"));
        assert!(CREATE_SHEETS_TABLE.contains("id TEXT NOT NULL UNIQUE"));
        assert!(CREATE_SHEETS_TABLE.contains("fields TEXT NOT NULL"));
        assert!(CREATE_SHEETS_TABLE.contains("updated_at TEXT NOT NULL"));
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }
}
