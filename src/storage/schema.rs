//! Database schema definitions

/// SQL to create the artifacts table
pub const CREATE_ARTIFACTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    kind TEXT NOT NULL,
    size INTEGER NOT NULL,
    range_start INTEGER,
    range_end INTEGER,
    data BLOB,
    digest TEXT,
    source TEXT
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_artifacts_path ON artifacts(path)",
    "CREATE INDEX IF NOT EXISTS idx_artifacts_source ON artifacts(source)",
    "CREATE INDEX IF NOT EXISTS idx_artifacts_digest ON artifacts(digest)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_ARTIFACTS_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
