//! §4.6 Lookup. Seeks the cached forward iterator by packed address,
//! validates the containing range, and dispatches by mode, decoding only as
//! much of the record as the mode requires.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::debug;

use crate::address::Address;
use crate::diffcodec::patch_in_place;
use crate::error::WhipError;
use crate::history::expand_history;
use crate::infoset::{datetime_of, decode_infoset, encode_history, encode_infoset};
use crate::record::RecordView;
use crate::store::{KvCursor, KvStore};

/// Default capacity of the `(address, mode) → result` cache (spec §9 "LRU
/// cache").
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMode {
    Latest,
    At(String),
    All,
}

impl LookupMode {
    /// `datetime` absent or empty means "latest"; `all` means full history;
    /// anything else is passed through as the timestamp (spec §6).
    pub fn from_query(datetime: Option<&str>) -> Self {
        match datetime {
            None | Some("") => LookupMode::Latest,
            Some("all") => LookupMode::All,
            Some(t) => LookupMode::At(t.to_string()),
        }
    }
}

/// `absent → live → invalidated` (spec §4.6). `invalidated` is modeled by
/// immediately collapsing back to `Absent` rather than keeping a distinct
/// variant, since nothing observes the gap between the two.
enum CursorState {
    Absent,
    Live(Box<dyn KvCursor>),
}

pub struct LookupEngine {
    store: Arc<dyn KvStore>,
    cursor: CursorState,
    cache: LruCache<u64, Option<Vec<u8>>>,
}

impl LookupEngine {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_cache_capacity(store, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(store: Arc<dyn KvStore>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        LookupEngine { store, cursor: CursorState::Absent, cache: LruCache::new(capacity) }
    }

    /// Drop the cached KV iterator and clear the result cache. Called after
    /// every successful load (spec §4.5, §4.6).
    pub fn invalidate(&mut self) {
        self.cursor = CursorState::Absent;
        self.cache.clear();
        debug!("lookup iterator and cache invalidated");
    }

    /// `lookup(ip_string, mode)`. A miss (gap, seek-past-end, or empty
    /// history-walk result) is `Ok(None)`, never an error (spec §4.6, §7).
    pub fn lookup(&mut self, ip: &str, mode: LookupMode) -> Result<Option<Vec<u8>>, WhipError> {
        let address = Address::parse(ip)?;
        let key = cache_key(address, &mode);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }
        let result = self.lookup_uncached(address, &mode)?;
        self.cache.put(key, result.clone());
        Ok(result)
    }

    fn lookup_uncached(&mut self, address: Address, mode: &LookupMode) -> Result<Option<Vec<u8>>, WhipError> {
        if matches!(self.cursor, CursorState::Absent) {
            self.cursor = CursorState::Live(self.store.cursor());
        }
        let CursorState::Live(cursor) = &mut self.cursor else {
            unreachable!("just ensured Live")
        };
        cursor.seek(&address.pack());
        let Some(item) = cursor.next() else {
            return Ok(None);
        };
        let (_key, value) = item?;
        let view = RecordView::parse(&value)?;
        let begin = u128::from_be_bytes(view.begin);
        if address.0 < begin {
            return Ok(None); // gap between the record below and this one
        }

        match mode {
            LookupMode::Latest => Ok(Some(view.latest_blob.to_vec())),
            LookupMode::At(t) => lookup_at(&view, t),
            LookupMode::All => Ok(Some(encode_history(&expand_history(&view)?)?)),
        }
    }
}

fn lookup_at(view: &RecordView, t: &str) -> Result<Option<Vec<u8>>, WhipError> {
    if view.latest_datetime <= t {
        return Ok(Some(view.latest_blob.to_vec()));
    }
    let mut current = decode_infoset(view.latest_blob)?;
    for d in view.diffs() {
        let d = d?;
        patch_in_place(&mut current, &d);
        if datetime_of(&current)? <= t {
            return Ok(Some(encode_infoset(&current)?));
        }
    }
    Ok(None)
}

fn cache_key(address: Address, mode: &LookupMode) -> u64 {
    let mut buf = Vec::with_capacity(24);
    buf.extend_from_slice(&address.pack());
    match mode {
        LookupMode::Latest => buf.push(0),
        LookupMode::All => buf.push(1),
        LookupMode::At(t) => {
            buf.push(2);
            buf.extend_from_slice(t.as_bytes());
        }
    }
    xxhash_rust::xxh3::xxh3_64(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::build_record;
    use crate::infoset::{AttrValue, DATETIME_KEY};
    use crate::store::sled_store::SledStore;

    fn infoset(dt: &str, x: i64) -> crate::infoset::Infoset {
        [
            (DATETIME_KEY.to_string(), AttrValue::Str(dt.to_string())),
            ("x".to_string(), AttrValue::Int(x)),
        ]
        .into_iter()
        .collect()
    }

    fn seeded_store() -> (tempfile::TempDir, Arc<dyn KvStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path(), true).unwrap();
        let begin = Address::parse("1.0.0.0").unwrap().pack();
        let end = Address::parse("1.255.255.255").unwrap().pack();
        let record = build_record(
            begin,
            vec![infoset("2010-01-01T00:00:00", 1), infoset("2013-01-01T00:00:00", 4)],
        )
        .unwrap();
        store.put(&end, &record.encode()).unwrap();
        (dir, Arc::new(store))
    }

    #[test]
    fn latest_mode_returns_the_newest_infoset() {
        let (_dir, store) = seeded_store();
        let mut engine = LookupEngine::new(store);
        let got = engine.lookup("1.2.3.4", LookupMode::Latest).unwrap().unwrap();
        let decoded = decode_infoset(&got).unwrap();
        assert_eq!(decoded.get("x"), Some(&AttrValue::Int(4)));
    }

    #[test]
    fn address_outside_any_range_is_a_miss() {
        let (_dir, store) = seeded_store();
        let mut engine = LookupEngine::new(store);
        assert_eq!(engine.lookup("7.0.0.0", LookupMode::Latest).unwrap(), None);
    }

    #[test]
    fn timestamp_mode_walks_the_diff_chain() {
        let (_dir, store) = seeded_store();
        let mut engine = LookupEngine::new(store);
        let got = engine.lookup("1.2.3.4", LookupMode::At("2010-06-01T00:00:00".into())).unwrap().unwrap();
        let decoded = decode_infoset(&got).unwrap();
        assert_eq!(decoded.get("x"), Some(&AttrValue::Int(1)));

        let future = engine.lookup("1.2.3.4", LookupMode::At("2038-01-01T00:00:00".into())).unwrap().unwrap();
        assert_eq!(decode_infoset(&future).unwrap().get("x"), Some(&AttrValue::Int(4)));

        assert_eq!(engine.lookup("1.2.3.4", LookupMode::At("2009-01-01T00:00:00".into())).unwrap(), None);
    }

    #[test]
    fn all_mode_returns_full_descending_history() {
        let (_dir, store) = seeded_store();
        let mut engine = LookupEngine::new(store);
        let got = engine.lookup("1.2.3.4", LookupMode::All).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&got).unwrap();
        let history = value["history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["x"], 4);
        assert_eq!(history[1]["x"], 1);
    }

    #[test]
    fn cache_is_served_without_reseeking_and_cleared_on_invalidate() {
        let (_dir, store) = seeded_store();
        let mut engine = LookupEngine::new(store);
        let first = engine.lookup("1.2.3.4", LookupMode::Latest).unwrap();
        let second = engine.lookup("1.2.3.4", LookupMode::Latest).unwrap();
        assert_eq!(first, second);
        engine.invalidate();
        assert!(engine.cache.is_empty());
    }
}
