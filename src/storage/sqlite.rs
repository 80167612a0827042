//! SQLite storage implementation
//!
//! This module provides the SQLite-based implementation of the CatalogStore
//! trait.

use crate::enrich::{EnrichedEntry, IssueTally, VersionRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::{CatalogStore, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Creates a new SqliteCatalog instance at the given path
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl CatalogStore for SqliteCatalog {
    fn lookup_category(&self, owner: &str, repository: &str) -> StorageResult<Option<String>> {
        let category = self
            .conn
            .query_row(
                "SELECT category FROM entries WHERE owner = ?1 AND repository = ?2",
                params![owner, repository],
                |row| row.get(0),
            )
            .optional()?;

        Ok(category)
    }

    fn promote_category(
        &mut self,
        owner: &str,
        repository: &str,
        category: &str,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE entries SET category = ?1 WHERE owner = ?2 AND repository = ?3",
            params![category, owner, repository],
        )?;
        Ok(())
    }

    fn insert_entry(&mut self, entry: &EnrichedEntry) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO entries
             (owner, repository, name, category, verified, stars, watchers, forks, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.owner,
                entry.repository,
                entry.name,
                entry.category,
                entry.verified,
                entry.stars,
                entry.watchers,
                entry.forks,
                now
            ],
        )?;

        if inserted == 0 {
            // Another pass got here first; the open transaction wrote nothing
            return Ok(false);
        }

        if let Some(versions) = &entry.versions {
            for version in versions {
                tx.execute(
                    "INSERT OR IGNORE INTO versions (owner, repository, published_at, tag)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![entry.owner, entry.repository, version.published_at, version.tag],
                )?;
            }
        }

        if let Some(issues) = &entry.issues {
            tx.execute(
                "INSERT OR IGNORE INTO issues (owner, repository, open, closed)
                 VALUES (?1, ?2, ?3, ?4)",
                params![entry.owner, entry.repository, issues.open, issues.closed],
            )?;
        }

        if let Some(contributors) = &entry.contributors {
            for contributor in contributors {
                tx.execute(
                    "INSERT OR IGNORE INTO contributors (owner, repository, contributor)
                     VALUES (?1, ?2, ?3)",
                    params![entry.owner, entry.repository, contributor],
                )?;
            }
        }

        if let Some(dependents) = &entry.dependents {
            tx.execute(
                "INSERT OR IGNORE INTO dependents (owner, repository, number, package_url)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.owner,
                    entry.repository,
                    dependents.count,
                    dependents.sample_url
                ],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    fn pairs_in_category(&self, category: &str) -> StorageResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT owner, repository FROM entries WHERE category = ?1")?;

        let pairs = stmt
            .query_map(params![category], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pairs)
    }

    fn count_entries(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn category_counts(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) FROM entries GROUP BY category ORDER BY category",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn versions_for(&self, owner: &str, repository: &str) -> StorageResult<Vec<VersionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT published_at, tag FROM versions
             WHERE owner = ?1 AND repository = ?2 ORDER BY published_at",
        )?;

        let versions = stmt
            .query_map(params![owner, repository], |row| {
                Ok(VersionRecord {
                    published_at: row.get(0)?,
                    tag: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    fn contributors_for(&self, owner: &str, repository: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT contributor FROM contributors
             WHERE owner = ?1 AND repository = ?2 ORDER BY contributor",
        )?;

        let contributors = stmt
            .query_map(params![owner, repository], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(contributors)
    }

    fn issues_for(&self, owner: &str, repository: &str) -> StorageResult<Option<IssueTally>> {
        let tally = self
            .conn
            .query_row(
                "SELECT open, closed FROM issues WHERE owner = ?1 AND repository = ?2",
                params![owner, repository],
                |row| {
                    Ok(IssueTally {
                        open: row.get(0)?,
                        closed: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::DependentsRecord;

    fn sample_entry(owner: &str, repository: &str, category: &str) -> EnrichedEntry {
        EnrichedEntry {
            owner: owner.to_string(),
            repository: repository.to_string(),
            name: repository.to_string(),
            category: category.to_string(),
            verified: true,
            stars: Some(42),
            watchers: Some(7),
            forks: Some(3),
            versions: Some(vec![
                VersionRecord {
                    published_at: "2022-03-10 12:30:00".to_string(),
                    tag: Some("v1".to_string()),
                },
                VersionRecord {
                    published_at: "2022-04-01 00:00:00".to_string(),
                    tag: None,
                },
            ]),
            issues: Some(IssueTally { open: 1, closed: 2 }),
            contributors: Some(vec!["amy".to_string(), "zoe".to_string()]),
            dependents: Some(DependentsRecord {
                count: 5,
                sample_url: "https://market.example.com/octo/repo/network/dependents".to_string(),
            }),
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut store = SqliteCatalog::new_in_memory().unwrap();
        let entry = sample_entry("octo", "linter", "security");

        assert!(store.insert_entry(&entry).unwrap());
        assert_eq!(
            store.lookup_category("octo", "linter").unwrap(),
            Some("security".to_string())
        );
        assert_eq!(store.lookup_category("octo", "other").unwrap(), None);
    }

    #[test]
    fn test_insert_twice_keeps_one_row() {
        let mut store = SqliteCatalog::new_in_memory().unwrap();
        let entry = sample_entry("octo", "linter", "security");

        assert!(store.insert_entry(&entry).unwrap());
        assert!(!store.insert_entry(&entry).unwrap());
        assert_eq!(store.count_entries().unwrap(), 1);
    }

    #[test]
    fn test_second_insert_does_not_touch_children() {
        let mut store = SqliteCatalog::new_in_memory().unwrap();
        let entry = sample_entry("octo", "linter", "security");
        store.insert_entry(&entry).unwrap();

        let mut changed = sample_entry("octo", "linter", "deployment");
        changed.contributors = Some(vec!["intruder".to_string()]);
        assert!(!store.insert_entry(&changed).unwrap());

        assert_eq!(
            store.lookup_category("octo", "linter").unwrap(),
            Some("security".to_string())
        );
        assert_eq!(
            store.contributors_for("octo", "linter").unwrap(),
            vec!["amy", "zoe"]
        );
    }

    #[test]
    fn test_children_written_with_entry() {
        let mut store = SqliteCatalog::new_in_memory().unwrap();
        store
            .insert_entry(&sample_entry("octo", "linter", "security"))
            .unwrap();

        let versions = store.versions_for("octo", "linter").unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].tag.as_deref(), Some("v1"));
        assert_eq!(versions[1].tag, None);

        assert_eq!(
            store.issues_for("octo", "linter").unwrap(),
            Some(IssueTally { open: 1, closed: 2 })
        );
        assert_eq!(
            store.contributors_for("octo", "linter").unwrap(),
            vec!["amy", "zoe"]
        );
    }

    #[test]
    fn test_disabled_fields_store_nothing() {
        let mut store = SqliteCatalog::new_in_memory().unwrap();
        let mut entry = sample_entry("octo", "bare", "security");
        entry.stars = None;
        entry.versions = None;
        entry.issues = None;
        entry.contributors = None;
        entry.dependents = None;

        assert!(store.insert_entry(&entry).unwrap());
        assert!(store.versions_for("octo", "bare").unwrap().is_empty());
        assert_eq!(store.issues_for("octo", "bare").unwrap(), None);
    }

    #[test]
    fn test_promote_category() {
        let mut store = SqliteCatalog::new_in_memory().unwrap();
        store
            .insert_entry(&sample_entry("octo", "linter", "recently-added"))
            .unwrap();

        store
            .promote_category("octo", "linter", "security")
            .unwrap();
        assert_eq!(
            store.lookup_category("octo", "linter").unwrap(),
            Some("security".to_string())
        );
    }

    #[test]
    fn test_pairs_in_category() {
        let mut store = SqliteCatalog::new_in_memory().unwrap();
        store
            .insert_entry(&sample_entry("octo", "a", "security"))
            .unwrap();
        store
            .insert_entry(&sample_entry("octo", "b", "security"))
            .unwrap();
        store
            .insert_entry(&sample_entry("octo", "c", "deployment"))
            .unwrap();

        let mut pairs = store.pairs_in_category("security").unwrap();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("octo".to_string(), "a".to_string()),
                ("octo".to_string(), "b".to_string())
            ]
        );
    }

    #[test]
    fn test_category_counts() {
        let mut store = SqliteCatalog::new_in_memory().unwrap();
        store
            .insert_entry(&sample_entry("octo", "a", "security"))
            .unwrap();
        store
            .insert_entry(&sample_entry("octo", "b", "security"))
            .unwrap();
        store
            .insert_entry(&sample_entry("octo", "c", "deployment"))
            .unwrap();

        assert_eq!(
            store.category_counts().unwrap(),
            vec![
                ("deployment".to_string(), 1),
                ("security".to_string(), 2)
            ]
        );
    }
}
