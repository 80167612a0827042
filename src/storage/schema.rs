//! Database schema definitions
//!
//! All SQL schema definitions for the Bowerbird database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested catalog entries
CREATE TABLE IF NOT EXISTS entries (
    owner TEXT NOT NULL,
    repository TEXT NOT NULL,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    stars INTEGER,
    watchers INTEGER,
    forks INTEGER,
    discovered_at TEXT NOT NULL,
    PRIMARY KEY (owner, repository)
);

CREATE INDEX IF NOT EXISTS idx_entries_category ON entries(category);

-- Release history per entry
CREATE TABLE IF NOT EXISTS versions (
    owner TEXT NOT NULL,
    repository TEXT NOT NULL,
    published_at TEXT NOT NULL,
    tag TEXT,
    PRIMARY KEY (owner, repository, published_at, tag),
    FOREIGN KEY (owner, repository) REFERENCES entries (owner, repository)
);

-- Open/closed issue tallies per entry
CREATE TABLE IF NOT EXISTS issues (
    owner TEXT NOT NULL,
    repository TEXT NOT NULL,
    open INTEGER NOT NULL,
    closed INTEGER NOT NULL,
    PRIMARY KEY (owner, repository),
    FOREIGN KEY (owner, repository) REFERENCES entries (owner, repository)
);

-- Contributor logins per entry
CREATE TABLE IF NOT EXISTS contributors (
    owner TEXT NOT NULL,
    repository TEXT NOT NULL,
    contributor TEXT NOT NULL,
    PRIMARY KEY (owner, repository, contributor),
    FOREIGN KEY (owner, repository) REFERENCES entries (owner, repository)
);

-- Dependents summary per entry
CREATE TABLE IF NOT EXISTS dependents (
    owner TEXT NOT NULL,
    repository TEXT NOT NULL,
    number INTEGER NOT NULL,
    package_url TEXT NOT NULL,
    PRIMARY KEY (owner, repository),
    FOREIGN KEY (owner, repository) REFERENCES entries (owner, repository)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
