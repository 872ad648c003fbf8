//! §6 Backing KV store contract: an ordered byte-string key/value store with
//! point writes, point reads, a seekable forward cursor, and an optional
//! compaction hint. The core depends only on [`KvStore`]/[`KvCursor`]; the
//! concrete engine (spec calls it "the backing KV store", a collaborator) is
//! `sled` here — see [`sled_store::SledStore`].

pub mod sled_store;

use crate::error::WhipError;

pub trait KvCursor: Send {
    /// Position at the least key >= `key`.
    fn seek(&mut self, key: &[u8]);
    fn next(&mut self) -> Option<Result<(Vec<u8>, Vec<u8>), WhipError>>;
}

pub trait KvStore: Send + Sync {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), WhipError>;
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, WhipError>;

    /// A fresh forward cursor over the whole keyspace. Construction can be
    /// costly for some backing engines, hence callers are expected to
    /// create one per `Database` handle and reuse it (spec §4.6, §9).
    fn cursor(&self) -> Box<dyn KvCursor>;

    /// Hint the store to compact the given key range (inclusive start,
    /// exclusive stop); `None` on either side means "to the edge of the
    /// keyspace". May be a no-op (spec §6).
    fn compact_range(&self, start: Option<&[u8]>, stop: Option<&[u8]>) -> Result<(), WhipError>;
}
