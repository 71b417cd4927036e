//! SQLite-backed persistence for the index
//!
//! A single database file holds everything a cold reader needs: access
//! points, line offsets, per-index key tables, and metadata about the
//! compressed file the index was built from. The file is tagged with the
//! application id `0x5A494458` ("ZIDX").
//!
//! Schema:
//! ```text
//! AccessPoints(uncompressedOffset PK, uncompressedEndOffset,
//!              compressedOffset, bitOffset, window BLOB)
//! LineOffsets(line PK, offset, length)
//! Indexes(name PK, creationString, isNumeric)
//! Metadata(key PK, value)
//! index_<name>(key, line, offset)       -- one table per registered index
//! ```
//!
//! Builds run with sync disabled and in-memory journaling: the whole build
//! is one transaction and a failed build is rebuilt from scratch anyway.

use crate::error::{IndexError, IndexResult};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, ToSql};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A persisted checkpoint: everything needed to resume decoding at
/// `compressed_offset` and recover bytes from `uncompressed_offset`
/// through `uncompressed_end_offset`.
#[derive(Debug, Clone)]
pub struct AccessPoint {
    pub uncompressed_offset: u64,
    pub uncompressed_end_offset: u64,
    pub compressed_offset: u64,
    /// How many top bits of the byte at `compressed_offset - 1` belong to
    /// the stream after the boundary (0 means byte-aligned).
    pub bit_offset: u8,
    /// zlib-compressed 32 KiB window snapshot.
    pub window: Vec<u8>,
}

/// A line joined with its covering access point, as returned by
/// [`Store::find_access_point`].
#[derive(Debug, Clone)]
pub struct LineLocation {
    pub line: u64,
    pub offset: u64,
    pub length: u64,
    pub compressed_offset: u64,
    pub uncompressed_offset: u64,
    pub bit_offset: u8,
    pub window: Vec<u8>,
}

/// A registered index as recorded in the `Indexes` table.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    pub creation: String,
    pub numeric: bool,
}

/// Binds arbitrary key bytes with TEXT affinity, byte-for-byte.
///
/// Keys come from file contents and need not be valid UTF-8; routing them
/// through `String` would mangle them.
struct TextKey<'a>(&'a [u8]);

impl ToSql for TextKey<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.0)))
    }
}

/// Single-file relational store for one index
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Create a fresh index file, replacing any existing one, and set up
    /// the schema.
    pub fn create(path: &Path) -> IndexResult<Self> {
        match fs::remove_file(path) {
            Ok(()) => tracing::warn!("rebuilding existing index {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA synchronous = OFF;
            PRAGMA journal_mode = MEMORY;
            PRAGMA application_id = 0x5A494458;
            ",
        )?;

        conn.execute_batch(
            "
            CREATE TABLE AccessPoints(
                uncompressedOffset INTEGER PRIMARY KEY,
                uncompressedEndOffset INTEGER,
                compressedOffset INTEGER,
                bitOffset INTEGER,
                window BLOB
            );
            CREATE TABLE LineOffsets(
                line INTEGER PRIMARY KEY,
                offset INTEGER,
                length INTEGER
            );
            CREATE TABLE Indexes(
                name TEXT PRIMARY KEY,
                creationString TEXT,
                isNumeric INTEGER
            );
            CREATE TABLE Metadata(
                key TEXT PRIMARY KEY,
                value TEXT
            );
            ",
        )?;

        Ok(Self { conn })
    }

    /// Open an existing index file read-only.
    pub fn open_read_only(path: &Path) -> IndexResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Begin the build transaction. Everything written between here and
    /// [`Store::commit`] lands atomically.
    pub fn begin(&self) -> IndexResult<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    pub fn commit(&self) -> IndexResult<()> {
        self.conn.execute_batch("END TRANSACTION")?;
        Ok(())
    }

    pub fn add_metadata(&self, key: &str, value: &str) -> IndexResult<()> {
        tracing::debug!("metadata {} = {}", key, value);
        self.conn
            .prepare_cached("INSERT INTO Metadata VALUES(:key, :value)")?
            .execute(params![key, value])?;
        Ok(())
    }

    pub fn add_access_point(&self, point: &AccessPoint) -> IndexResult<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO AccessPoints VALUES(
                    :uncompressedOffset, :uncompressedEndOffset,
                    :compressedOffset, :bitOffset, :window)",
            )?
            .execute(params![
                point.uncompressed_offset as i64,
                point.uncompressed_end_offset as i64,
                point.compressed_offset as i64,
                point.bit_offset as i64,
                point.window,
            ])?;
        Ok(())
    }

    pub fn add_line(&self, line: u64, offset: u64, length: u64) -> IndexResult<()> {
        self.conn
            .prepare_cached("INSERT INTO LineOffsets VALUES(:line, :offset, :length)")?
            .execute(params![line as i64, offset as i64, length as i64])?;
        Ok(())
    }

    /// Create the table backing a named index and record it in `Indexes`.
    pub fn register_index(
        &self,
        name: &str,
        creation: &str,
        numeric: bool,
        unique: bool,
    ) -> IndexResult<()> {
        validate_index_name(name)?;
        let key_type = match (numeric, unique) {
            (true, true) => "INTEGER PRIMARY KEY",
            (true, false) => "INTEGER",
            (false, true) => "TEXT PRIMARY KEY",
            (false, false) => "TEXT",
        };
        self.conn.execute_batch(&format!(
            "CREATE TABLE index_{}(key {}, line INTEGER, offset INTEGER)",
            name, key_type
        ))?;
        self.conn
            .prepare_cached("INSERT INTO Indexes VALUES(:name, :creationString, :isNumeric)")?
            .execute(params![name, creation, numeric as i64])?;
        Ok(())
    }

    pub fn add_text_key(&self, name: &str, key: &[u8], line: u64, offset: u64) -> IndexResult<()> {
        self.conn
            .prepare_cached(&format!(
                "INSERT INTO index_{} VALUES(:key, :line, :offset)",
                name
            ))?
            .execute(params![TextKey(key), line as i64, offset as i64])
            .map_err(|e| map_key_error(name, &String::from_utf8_lossy(key), e))?;
        Ok(())
    }

    pub fn add_numeric_key(&self, name: &str, key: i64, line: u64, offset: u64) -> IndexResult<()> {
        self.conn
            .prepare_cached(&format!(
                "INSERT INTO index_{} VALUES(:key, :line, :offset)",
                name
            ))?
            .execute(params![key, line as i64, offset as i64])
            .map_err(|e| map_key_error(name, &key.to_string(), e))?;
        Ok(())
    }

    /// Join a line number with the access point covering its offset.
    pub fn find_access_point(&self, line: u64) -> IndexResult<Option<LineLocation>> {
        let location = self
            .conn
            .prepare_cached(
                "SELECT line, offset, compressedOffset, uncompressedOffset,
                        length, bitOffset, window
                 FROM LineOffsets, AccessPoints
                 WHERE offset >= uncompressedOffset
                   AND offset <= uncompressedEndOffset
                   AND line = :line
                 LIMIT 1",
            )?
            .query_row(params![line as i64], |row| {
                Ok(LineLocation {
                    line: row.get::<_, i64>(0)? as u64,
                    offset: row.get::<_, i64>(1)? as u64,
                    compressed_offset: row.get::<_, i64>(2)? as u64,
                    uncompressed_offset: row.get::<_, i64>(3)? as u64,
                    length: row.get::<_, i64>(4)? as u64,
                    bit_offset: row.get::<_, i64>(5)? as u8,
                    window: row.get(6)?,
                })
            })
            .optional()?;
        Ok(location)
    }

    /// All line numbers whose key equals `key` in the named index.
    ///
    /// The key is bound as text; SQLite's column affinity converts it for
    /// numeric indexes.
    pub fn query_index(&self, name: &str, key: &[u8]) -> IndexResult<Vec<u64>> {
        validate_index_name(name)?;
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT line FROM index_{} WHERE key = :query", name))?;
        let rows = stmt.query_map(params![TextKey(key)], |row| row.get::<_, i64>(0))?;
        let mut lines = Vec::new();
        for row in rows {
            lines.push(row? as u64);
        }
        Ok(lines)
    }

    pub fn index_size(&self, name: &str) -> IndexResult<u64> {
        validate_index_name(name)?;
        let count: i64 = self
            .conn
            .prepare_cached(&format!("SELECT COUNT(*) FROM index_{}", name))?
            .query_row([], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn indexes(&self) -> IndexResult<Vec<IndexInfo>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name, creationString, isNumeric FROM Indexes")?;
        let rows = stmt.query_map([], |row| {
            Ok(IndexInfo {
                name: row.get(0)?,
                creation: row.get(1)?,
                numeric: row.get::<_, i64>(2)? != 0,
            })
        })?;
        let mut infos = Vec::new();
        for row in rows {
            infos.push(row?);
        }
        Ok(infos)
    }

    pub fn metadata(&self) -> IndexResult<HashMap<String, String>> {
        let mut stmt = self.conn.prepare_cached("SELECT key, value FROM Metadata")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut metadata = HashMap::new();
        for row in rows {
            let (key, value): (String, String) = row?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }

    /// Count of rows in LineOffsets, i.e. the number of indexed lines.
    pub fn line_count(&self) -> IndexResult<u64> {
        let count: i64 = self
            .conn
            .prepare_cached("SELECT COUNT(*) FROM LineOffsets")?
            .query_row([], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// All access points ordered by uncompressed offset.
    pub fn access_points(&self) -> IndexResult<Vec<AccessPoint>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT uncompressedOffset, uncompressedEndOffset, compressedOffset,
                    bitOffset, window
             FROM AccessPoints ORDER BY uncompressedOffset",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AccessPoint {
                uncompressed_offset: row.get::<_, i64>(0)? as u64,
                uncompressed_end_offset: row.get::<_, i64>(1)? as u64,
                compressed_offset: row.get::<_, i64>(2)? as u64,
                bit_offset: row.get::<_, i64>(3)? as u8,
                window: row.get(4)?,
            })
        })?;
        let mut points = Vec::new();
        for row in rows {
            points.push(row?);
        }
        Ok(points)
    }
}

fn validate_index_name(name: &str) -> IndexResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(IndexError::InvalidIndexName(name.to_string()))
    }
}

fn map_key_error(name: &str, key: &str, e: rusqlite::Error) -> IndexError {
    match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            IndexError::DuplicateKey {
                name: name.to_string(),
                key: key.to_string(),
            }
        }
        other => other.into(),
    }
}
