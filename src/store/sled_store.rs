//! `sled`-backed implementation of [`KvStore`]/[`KvCursor`].

use sled::Db;

use super::{KvCursor, KvStore};
use crate::error::WhipError;

pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<std::path::Path>, create_if_missing: bool) -> Result<Self, WhipError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), create_if_missing, "opening backing store");
        if !create_if_missing && !path.exists() {
            return Err(WhipError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "database directory does not exist"),
            ));
        }
        let db = sled::open(path)?;
        Ok(SledStore { db })
    }
}

impl KvStore for SledStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), WhipError> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, WhipError> {
        Ok(self.db.get(key)?.map(|ivec| ivec.to_vec()))
    }

    fn cursor(&self) -> Box<dyn KvCursor> {
        Box::new(SledCursor { db: self.db.clone(), iter: None })
    }

    fn compact_range(&self, start: Option<&[u8]>, stop: Option<&[u8]>) -> Result<(), WhipError> {
        // sled has no explicit range-compaction hook; it compacts in the
        // background on its own schedule, so this is a documented no-op
        // (spec §6 "may be a no-op").
        tracing::debug!(?start, ?stop, "compact_range is a no-op on sled");
        Ok(())
    }
}

struct SledCursor {
    db: Db,
    iter: Option<sled::Iter>,
}

impl KvCursor for SledCursor {
    fn seek(&mut self, key: &[u8]) {
        self.iter = Some(self.db.range(key.to_vec()..));
    }

    fn next(&mut self) -> Option<Result<(Vec<u8>, Vec<u8>), WhipError>> {
        let iter = self.iter.as_mut()?;
        match iter.next() {
            Some(Ok((k, v))) => Some(Ok((k.to_vec(), v.to_vec()))),
            Some(Err(e)) => Some(Err(e.into())),
            None => None,
        }
    }
}
