//! # relog-store
//!
//! The persistent resolution database: a keyed map from an address or class
//! prefix to a resolved name, the origin of that answer, and when it was
//! recorded.
//!
//! The on-disk format is the dump format itself, one entry per line:
//!
//! ```text
//! key name origin timestamp
//! ```
//!
//! Inserts are write-through appends; on load, a later line for the same key
//! wins. That makes a crashed run leave a loadable store, and makes
//! concurrent runs against one store degrade to last-writer-wins rather than
//! corruption. Expiry compacts the file through a temp-file rename.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::warn;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store errors. Only open/compact failures are fatal to callers; append
/// failures during a run are counted and logged instead.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database file could not be opened or created.
    #[error("cannot open resolution database {path}: {source}")]
    Open {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Reading the database file failed.
    #[error("cannot read resolution database {path}: {source}")]
    Read {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Rewriting the database during expiry failed.
    #[error("cannot compact resolution database {path}: {source}")]
    Compact {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// A merge input line did not have the `key name` shape.
    #[error("malformed merge input at line {line}: {text:?}")]
    MalformedMerge {
        /// 1-based line number.
        line: usize,
        /// The offending text.
        text: String,
    },
}

/// Where a stored answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Answered by a nameserver (`N`).
    Nameserver,
    /// Synthesized by class recursion (`R`).
    Recursed,
    /// Merged in from external data (`M`).
    Merged,
}

impl Origin {
    /// The single-letter form used on disk.
    pub fn letter(self) -> char {
        match self {
            Self::Nameserver => 'N',
            Self::Recursed => 'R',
            Self::Merged => 'M',
        }
    }

    /// Decodes the single-letter form.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'N' => Some(Self::Nameserver),
            'R' => Some(Self::Recursed),
            'M' => Some(Self::Merged),
            _ => None,
        }
    }
}

/// One stored resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The resolved name.
    pub name: String,
    /// Where the answer came from.
    pub origin: Origin,
    /// Whole seconds since the UNIX epoch at insert time.
    pub timestamp: u64,
}

/// The resolution database.
///
/// Keys are either full dotted-quad addresses or class prefixes (`a.b.c`,
/// `a.b`, `a`).
pub struct Store {
    path: PathBuf,
    file: File,
    map: HashMap<String, Record>,
    write_errors: u64,
}

impl Store {
    /// Opens (creating if needed) the database at `path` and loads it.
    ///
    /// Malformed lines are skipped with a warning; a database written by a
    /// newer or older version should never block a run.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut map = HashMap::new();
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                for (lineno, line) in contents.lines().enumerate() {
                    match parse_line(line) {
                        Some((key, record)) => {
                            map.insert(key.to_string(), record);
                        }
                        None if line.trim().is_empty() => {}
                        None => {
                            warn!(path = %path.display(), line = lineno + 1, "skipping malformed database line");
                        }
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(StoreError::Read { path, source }),
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file,
            map,
            write_errors: 0,
        })
    }

    /// Looks up a key.
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.map.get(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns how many append writes have failed so far.
    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    /// Inserts an entry stamped with the current time and appends it to the
    /// backing file. Write failures are counted, not propagated.
    pub fn insert(&mut self, key: &str, name: &str, origin: Origin) {
        let record = Record {
            name: name.to_string(),
            origin,
            timestamp: unix_now(),
        };

        let line = format!(
            "{} {} {} {}\n",
            key, record.name, record.origin.letter(), record.timestamp
        );
        if let Err(e) = self.file.write_all(line.as_bytes()) {
            self.write_errors += 1;
            warn!(error = %e, key, "database append failed");
        }

        self.map.insert(key.to_string(), record);
    }

    /// Writes every entry to `out` in dump format, sorted by key.
    pub fn dump(&self, out: &mut impl Write) -> io::Result<()> {
        let mut keys: Vec<&String> = self.map.keys().collect();
        keys.sort();

        for key in keys {
            let record = &self.map[key];
            writeln!(
                out,
                "{} {} {} {}",
                key, record.name, record.origin.letter(), record.timestamp
            )?;
        }
        Ok(())
    }

    /// Merges `key name` pairs from `input`, storing them with origin `M`
    /// and the current time. Returns the number of merged entries.
    ///
    /// Extra whitespace-separated fields after the name (such as the origin
    /// and timestamp of a dump) are ignored, so a dump can be piped back in.
    pub fn merge_from(&mut self, input: &mut impl BufRead) -> Result<usize> {
        let mut merged = 0;

        for (lineno, line) in input.lines().enumerate() {
            let line = line.map_err(|source| StoreError::Read {
                path: self.path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (key, name) = match (fields.next(), fields.next()) {
                (Some(key), Some(name)) => (key.to_string(), name.to_string()),
                _ => {
                    return Err(StoreError::MalformedMerge {
                        line: lineno + 1,
                        text: line,
                    })
                }
            };

            self.insert(&key, &name, Origin::Merged);
            merged += 1;
        }

        Ok(merged)
    }

    /// Deletes entries older than `max_age` and compacts the backing file.
    /// Returns the number of deleted entries.
    pub fn expire(&mut self, max_age: Duration) -> Result<usize> {
        let cutoff = unix_now().saturating_sub(max_age.as_secs());
        let before = self.map.len();
        self.map.retain(|_, record| record.timestamp >= cutoff);
        let removed = before - self.map.len();

        self.compact()?;
        Ok(removed)
    }

    /// Rewrites the backing file from the in-memory map via a temp-file
    /// rename, then reopens the append handle.
    fn compact(&mut self) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        let io_err = |source| StoreError::Compact {
            path: self.path.clone(),
            source,
        };

        let mut tmp = File::create(&tmp_path).map_err(io_err)?;
        self.dump(&mut tmp).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        drop(tmp);

        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;

        self.file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| StoreError::Open {
                path: self.path.clone(),
                source,
            })?;

        Ok(())
    }
}

fn parse_line(line: &str) -> Option<(&str, Record)> {
    let mut fields = line.split_whitespace();
    let key = fields.next()?;
    let name = fields.next()?;
    let origin = {
        let field = fields.next()?;
        let mut chars = field.chars();
        let letter = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Origin::from_letter(letter)?
    };
    let timestamp = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }

    Some((
        key,
        Record {
            name: name.to_string(),
            origin,
            timestamp,
        },
    ))
}

/// Whole seconds since the UNIX epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("resolve.db")
    }

    #[test]
    fn open_missing_creates_empty() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(store_path(&dir)).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn insert_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        {
            let mut store = Store::open(&path).unwrap();
            store.insert("1.2.3.4", "host.example.", Origin::Nameserver);
            store.insert("1.2.3", "net.example", Origin::Recursed);
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.len(), 2);

        let host = store.get("1.2.3.4").unwrap();
        assert_eq!(host.name, "host.example.");
        assert_eq!(host.origin, Origin::Nameserver);
        assert!(host.timestamp > 0);

        assert_eq!(store.get("1.2.3").unwrap().origin, Origin::Recursed);
        assert!(store.get("4.3.2.1").is_none());
    }

    #[test]
    fn later_append_wins_on_reload() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        {
            let mut store = Store::open(&path).unwrap();
            store.insert("1.2.3.4", "old.example.", Origin::Nameserver);
            store.insert("1.2.3.4", "new.example.", Origin::Nameserver);
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1.2.3.4").unwrap().name, "new.example.");
    }

    #[test]
    fn malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        std::fs::write(
            &path,
            "1.2.3.4 host.example. N 100\nnot a valid line at all\n\n5.6.7.8 other.example. X 100\n",
        )
        .unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get("1.2.3.4").is_some());
    }

    #[test]
    fn dump_is_sorted_and_parseable() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(store_path(&dir)).unwrap();
        store.insert("9.9.9.9", "nine.example.", Origin::Nameserver);
        store.insert("1.2.3.4", "host.example.", Origin::Recursed);

        let mut out = Vec::new();
        store.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1.2.3.4 host.example. R "));
        assert!(lines[1].starts_with("9.9.9.9 nine.example. N "));

        for line in lines {
            assert!(parse_line(line).is_some());
        }
    }

    #[test]
    fn dump_then_merge_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(dir.path().join("a.db")).unwrap();
        store.insert("1.2.3.4", "host.example.", Origin::Nameserver);
        store.insert("1.2.3", "net.example", Origin::Recursed);

        let mut dump = Vec::new();
        store.dump(&mut dump).unwrap();

        let mut fresh = Store::open(dir.path().join("b.db")).unwrap();
        let merged = fresh.merge_from(&mut Cursor::new(dump)).unwrap();

        assert_eq!(merged, 2);
        assert_eq!(fresh.len(), 2);
        let record = fresh.get("1.2.3.4").unwrap();
        assert_eq!(record.name, "host.example.");
        assert_eq!(record.origin, Origin::Merged);
    }

    #[test]
    fn merge_rejects_single_field() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(store_path(&dir)).unwrap();

        let err = store
            .merge_from(&mut Cursor::new("justakey\n"))
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedMerge { line: 1, .. }));
    }

    #[test]
    fn expire_drops_old_entries_and_compacts() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        let old = unix_now() - 7200;
        std::fs::write(
            &path,
            format!(
                "1.2.3.4 old.example. N {}\n5.6.7.8 new.example. N {}\n",
                old,
                unix_now()
            ),
        )
        .unwrap();

        let mut store = Store::open(&path).unwrap();
        let removed = store.expire(Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("1.2.3.4").is_none());
        assert!(store.get("5.6.7.8").is_some());

        // The compacted file reloads to the same single entry.
        let reloaded = Store::open(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get("5.6.7.8").is_some());
    }
}
