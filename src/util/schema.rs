use const_format::concatcp;
use regex::Regex;
use rusqlite::Connection as Database;

use crate::errors::DatabaseError;

/// The schema version of a volume stored in a SQLite database.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq)]
pub struct SchemaVersion(u32);

/// The availability of a volume in a SQLite database.
#[derive(Debug, PartialEq)]
pub enum Availability {
    /// There is a volume available.
    Available(SchemaVersion),
    /// There is no volume available.
    Missing,
    /// During querying, there was an SQLite error.
    Error(DatabaseError),
}

impl SchemaVersion {
    /// The prefix of the table marking a volume and its schema version.
    pub const META_TABLE_PREFIX: &'static str = "Volfd_Meta_";

    /// Create a schema version directly.
    pub const fn new(version: u32) -> Self {
        SchemaVersion(version)
    }

    /// Queries a database for the most recent schema version available.
    pub fn detect(database: &Database) -> Availability {
        match SchemaVersion::meta_tables(database) {
            Ok(tables) => {
                let extractor = VersionExtractor::default();
                match tables.iter().filter_map(|name| extractor.extract(name)).max() {
                    Some(version) => Availability::Available(SchemaVersion(version)),
                    None => Availability::Missing,
                }
            }
            Err(error) => Availability::Error(error.into()),
        }
    }

    /// Returns the schema version of the volume.
    pub fn version(&self) -> u32 {
        self.0
    }

    fn meta_tables(database: &Database) -> rusqlite::Result<Vec<String>> {
        let mut statement = database
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name LIKE ?")?;
        let tables = statement
            .query_map(&[concatcp!(SchemaVersion::META_TABLE_PREFIX, "%")], |row| {
                row.get::<_, String>(0)
            })?;
        tables.collect()
    }
}

/// Extracts the version from the name of a meta table.
#[derive(Debug, Clone)]
struct VersionExtractor(Option<Regex>);

impl Default for VersionExtractor {
    fn default() -> Self {
        let pattern = Regex::new(concatcp!(
            "^",
            SchemaVersion::META_TABLE_PREFIX,
            "([0-9]+)$"
        ));
        if let Err(error) = &pattern {
            log::error!("Volume schema pattern does not compile: {}", error);
        }
        VersionExtractor(pattern.ok())
    }
}

impl VersionExtractor {
    fn extract<T: AsRef<str>>(&self, table: T) -> Option<u32> {
        self.0
            .as_ref()?
            .captures(table.as_ref())
            .and_then(|captures| captures.get(1))
            .and_then(|version| version.as_str().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{Availability, Database, SchemaVersion, VersionExtractor};

    fn table_name(version: u32) -> String {
        format!("{}{}", SchemaVersion::META_TABLE_PREFIX, version)
    }

    #[test_case("Volfd_Meta_0", Some(0); "first version")]
    #[test_case("Volfd_Meta_42", Some(42); "later version")]
    #[test_case("Volfd_Meta_", None; "missing version")]
    #[test_case("Volfd_Meta_4x", None; "trailing garbage")]
    #[test_case("Other_Meta_1", None; "foreign table")]
    fn test_extractor(table: &str, expected: Option<u32>) {
        assert_eq!(VersionExtractor::default().extract(table), expected);
    }

    #[test]
    fn test_missing_volume() {
        let database = Database::open_in_memory().expect("Valid SQLite database");
        assert_eq!(SchemaVersion::detect(&database), Availability::Missing);
    }

    #[test]
    fn test_most_recent_version() {
        let database = Database::open_in_memory().expect("Valid SQLite database");
        for version in &[0, 42, 7] {
            database
                .execute(
                    &format!("CREATE TABLE {} (example TEXT)", table_name(*version)),
                    [],
                )
                .expect("Create table failed");
        }
        assert_eq!(
            SchemaVersion::detect(&database),
            Availability::Available(SchemaVersion::new(42))
        );
    }
}
