//! A persisted CDX index.
//!
//! Entries live in an embedded key-value database, in three keyspaces:
//!
//!  * `entries`: `fnm NUL off` (the offset as a big-endian `u64`) to the entry as a protobuf
//!    message
//!  * `by_id`: record ID to the key of the entry in `entries`
//!  * `by_uri`: `ssu NUL sts NUL entry-key`, with an empty value
//!
//! so entries can be looked up by location or record ID, and iterated in URI order.
use std::path::{Path, PathBuf};

use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use parking_lot::Mutex;
use prost::Message;
use thiserror::Error;

use crate::entry::CdxEntry;
use crate::filter::FilterSet;
use crate::surt;

const ENTRIES: &str = "entries";
const BY_ID: &str = "by_id";
const BY_URI: &str = "by_uri";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage engine error: {0}")]
    Engine(String),
    #[error("stored entry could not be decoded: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("malformed key {0:?} in index")]
    Corrupt(Vec<u8>),
}

type EntryIter<'a> = Box<dyn Iterator<Item = Result<CdxEntry, StoreError>> + 'a>;

fn engine<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Engine(e.to_string())
}

/// A persisted, queryable collection of [`CdxEntry`].
///
/// Each entry is identified by its location (`fnm` and `off`); storing another entry for the
/// same location replaces it. Stores may be shared between threads. Writes are serialized,
/// while reads proceed without waiting for them.
pub struct CdxStore {
    dir: PathBuf,
    // Never read, but keeps the keyspaces' database open
    #[allow(dead_code)]
    db: Database,
    entries: Keyspace,
    by_id: Keyspace,
    by_uri: Keyspace,
    write_lock: Mutex<()>,
}

impl CdxStore {
    /// Open the store in `dir`, creating it if it doesn't exist.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_owned();
        std::fs::create_dir_all(&dir)?;
        let db = Database::builder(&dir).open().map_err(engine)?;

        let entries = db
            .keyspace(ENTRIES, || KeyspaceCreateOptions::default())
            .map_err(engine)?;
        let by_id = db
            .keyspace(BY_ID, || KeyspaceCreateOptions::default())
            .map_err(engine)?;
        let by_uri = db
            .keyspace(BY_URI, || KeyspaceCreateOptions::default())
            .map_err(engine)?;
        debug!("Opened index store in {:?}", dir);

        Ok(CdxStore {
            dir,
            db,
            entries,
            by_id,
            by_uri,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Store an entry, replacing any existing entry for the same location.
    pub fn put(&self, entry: &CdxEntry) -> Result<(), StoreError> {
        let key = locator_key(&entry.fnm, entry.off);
        let value = entry.encode_to_vec();

        let _guard = self.write_lock.lock();
        if let Some(old) = self.entries.get(&key).map_err(engine)? {
            let old: &[u8] = old.as_ref();
            let old = CdxEntry::decode(old)?;
            trace!("Replacing index entry for {}", old.locator);
            self.by_uri
                .remove(uri_key(&old.ssu, &old.sts, &key))
                .map_err(engine)?;
            // The ID may since have been claimed by an entry elsewhere
            if !old.rid.is_empty() {
                let claimed = self.by_id.get(old.rid.as_bytes()).map_err(engine)?;
                let claimed_here = claimed.map_or(false, |k| {
                    let k: &[u8] = k.as_ref();
                    k == key.as_slice()
                });
                if claimed_here {
                    self.by_id.remove(old.rid.as_bytes()).map_err(engine)?;
                }
            }
        }

        self.entries
            .insert(key.as_slice(), value)
            .map_err(engine)?;
        if !entry.rid.is_empty() {
            self.by_id
                .insert(entry.rid.as_bytes(), key.as_slice())
                .map_err(engine)?;
        }
        self.by_uri
            .insert(uri_key(&entry.ssu, &entry.sts, &key), &b""[..])
            .map_err(engine)?;
        Ok(())
    }

    /// Get the entry for the record at `offset` in the file named `file_name`.
    pub fn get_by_locator(
        &self,
        file_name: &str,
        offset: u64,
    ) -> Result<Option<CdxEntry>, StoreError> {
        self.get_by_key(&locator_key(file_name, offset))
    }

    /// Get the entry for the record with the given `WARC-Record-ID`.
    pub fn get_by_id(&self, record_id: &str) -> Result<Option<CdxEntry>, StoreError> {
        match self.by_id.get(record_id.as_bytes()).map_err(engine)? {
            Some(key) => self.get_by_key(key.as_ref()),
            None => Ok(None),
        }
    }

    fn get_by_key(&self, key: &[u8]) -> Result<Option<CdxEntry>, StoreError> {
        match self.entries.get(key).map_err(engine)? {
            Some(value) => {
                let value: &[u8] = value.as_ref();
                Ok(Some(CdxEntry::decode(value)?))
            }
            None => Ok(None),
        }
    }

    /// Iterate over every entry in URI order.
    pub fn iter(&self) -> impl Iterator<Item = Result<CdxEntry, StoreError>> + '_ {
        self.by_uri
            .iter()
            .map(move |kv| self.resolve_uri_key(kv.key().map_err(engine)?.as_ref()))
    }

    /// Iterate over entries whose SURT begins with `ssu_prefix`, in URI order.
    pub fn scan_uri_prefix<'a>(
        &'a self,
        ssu_prefix: &str,
    ) -> impl Iterator<Item = Result<CdxEntry, StoreError>> + 'a {
        self.by_uri
            .prefix(ssu_prefix.as_bytes().to_vec())
            .map(move |kv| self.resolve_uri_key(kv.key().map_err(engine)?.as_ref()))
    }

    fn resolve_uri_key(&self, uri_key: &[u8]) -> Result<CdxEntry, StoreError> {
        let key = uri_key
            .splitn(3, |&b| b == 0)
            .nth(2)
            .ok_or_else(|| StoreError::Corrupt(uri_key.to_vec()))?;
        self.get_by_key(key)?
            .ok_or_else(|| StoreError::Corrupt(uri_key.to_vec()))
    }

    /// Get every entry accepted by `filters`, in URI order.
    ///
    /// If `uri_prefix` is given, only entries whose target URI begins with it (after both are
    /// canonicalized) are considered.
    pub fn query(
        &self,
        filters: &FilterSet,
        uri_prefix: Option<&str>,
    ) -> Result<Vec<CdxEntry>, StoreError> {
        let entries: EntryIter<'_> = match uri_prefix {
            Some(prefix) => {
                let ssu = surt::canonicalize(prefix);
                debug!("Querying entries with SURT prefix {:?}", ssu);
                Box::new(self.scan_uri_prefix(&ssu))
            }
            None => Box::new(self.iter()),
        };

        let mut out = vec![];
        for entry in entries {
            let entry = entry?;
            if filters.eval(&entry) {
                out.push(entry);
            }
        }
        Ok(out)
    }
}

fn locator_key(file_name: &str, offset: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(file_name.len() + 9);
    key.extend_from_slice(file_name.as_bytes());
    key.push(0);
    key.extend_from_slice(&offset.to_be_bytes());
    key
}

fn uri_key(ssu: &str, sts: &str, locator_key: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(ssu.len() + sts.len() + locator_key.len() + 2);
    key.extend_from_slice(ssu.as_bytes());
    key.push(0);
    key.extend_from_slice(sts.as_bytes());
    key.push(0);
    key.extend_from_slice(locator_key);
    key
}
