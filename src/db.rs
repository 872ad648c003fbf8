//! Database facade tying the backing store, loader, and lookup engine
//! together (spec §5, analogous to `whip/db.py`'s `Database` class). Owns
//! the KV handle exclusively; the cached lookup iterator and LRU cache live
//! behind a mutex so a `Database` can be shared via `Arc` across threads
//! (spec §5 "single thread at a time per handle").

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::WhipError;
use crate::loader::{LoadStats, Loader};
use crate::lookup::{LookupEngine, LookupMode};
use crate::merge::RangeStream;
use crate::infoset::Infoset;
use crate::reader::SnapshotReader;
use crate::store::sled_store::SledStore;
use crate::store::KvStore;

pub struct Database {
    store: Arc<dyn KvStore>,
    progress_interval: Duration,
    lookup: Mutex<LookupEngine>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>, create_if_missing: bool) -> Result<Self, WhipError> {
        let store: Arc<dyn KvStore> = Arc::new(SledStore::open(path, create_if_missing)?);
        let lookup = LookupEngine::new(Arc::clone(&store));
        Ok(Database { store, progress_interval: crate::loader::DEFAULT_PROGRESS_INTERVAL, lookup: Mutex::new(lookup) })
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Load readers into the store (spec §4.5) and invalidate the cached
    /// lookup iterator/cache on completion.
    pub fn load(&self, readers: Vec<Box<dyn SnapshotReader>>) -> Result<LoadStats, WhipError> {
        let streams: Vec<RangeStream<Infoset>> = readers.into_iter().map(|r| r.into_range_stream()).collect();
        let loader = Loader::new(self.store.as_ref()).with_progress_interval(self.progress_interval);
        let stats = loader.load(streams)?;
        self.lookup.lock().expect("lookup mutex poisoned").invalidate();
        Ok(stats)
    }

    /// Load already-materialized range streams directly, bypassing the
    /// reader contract. Used by tests and by `perftest`/`shell` tooling.
    pub fn load_streams(&self, streams: Vec<RangeStream<Infoset>>) -> Result<LoadStats, WhipError> {
        let loader = Loader::new(self.store.as_ref()).with_progress_interval(self.progress_interval);
        let stats = loader.load(streams)?;
        self.lookup.lock().expect("lookup mutex poisoned").invalidate();
        Ok(stats)
    }

    pub fn lookup(&self, ip: &str, mode: LookupMode) -> Result<Option<Vec<u8>>, WhipError> {
        self.lookup.lock().expect("lookup mutex poisoned").lookup(ip, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infoset::{AttrValue, DATETIME_KEY};

    fn infoset(dt: &str, x: i64) -> Infoset {
        [
            (DATETIME_KEY.to_string(), AttrValue::Str(dt.to_string())),
            ("x".to_string(), AttrValue::Int(x)),
        ]
        .into_iter()
        .collect()
    }

    fn snapshot(ranges: Vec<(u128, u128, Infoset)>) -> RangeStream<Infoset> {
        Box::new(ranges.into_iter().map(Ok))
    }

    /// Reproduces the spec §8 end-to-end scenario across three snapshots,
    /// loaded in one batch.
    #[test]
    fn three_snapshot_scenario_answers_latest_timestamp_and_all_modes() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path(), true).unwrap();

        let a = |ip: &str| crate::address::Address::parse(ip).unwrap().0;

        let s1 = snapshot(vec![
            (a("1.0.0.0"), a("1.255.255.255"), infoset("2010-01-01T00:00:00", 1)),
            (a("3.0.0.0"), a("3.255.255.255"), infoset("2010-01-01T00:00:00", 2)),
            (a("8.0.0.0"), a("9.255.255.255"), infoset("2010-01-01T00:00:00", 3)),
        ]);
        let s2 = snapshot(vec![
            (a("1.0.0.0"), a("1.2.3.4"), infoset("2011-01-01T00:00:00", 7)),
            (a("1.2.3.5"), a("1.3.4.5"), infoset("2011-01-01T00:00:00", 8)),
        ]);
        let s3 = snapshot(vec![
            (a("1.0.0.0"), a("1.255.255.255"), infoset("2013-01-01T00:00:00", 4)),
            (a("3.0.0.0"), a("3.255.255.255"), infoset("2013-01-01T00:00:00", 5)),
            (a("8.0.0.0"), a("9.255.255.255"), infoset("2013-01-01T00:00:00", 6)),
        ]);

        db.load_streams(vec![s1, s2, s3]).unwrap();

        let x_of = |bytes: Vec<u8>| -> i64 {
            let v = crate::infoset::decode_infoset(&bytes).unwrap();
            match v.get("x") {
                Some(AttrValue::Int(n)) => *n,
                other => panic!("unexpected x value: {other:?}"),
            }
        };

        assert_eq!(db.lookup("1.0.0.0", LookupMode::Latest).unwrap().map(x_of), Some(4));
        assert_eq!(db.lookup("1.255.255.255", LookupMode::Latest).unwrap().map(x_of), Some(4));
        assert_eq!(db.lookup("7.0.0.0", LookupMode::Latest).unwrap(), None);
        assert_eq!(db.lookup("8.1.2.3", LookupMode::Latest).unwrap().map(x_of), Some(6));
        assert_eq!(db.lookup("12.0.0.0", LookupMode::Latest).unwrap(), None);

        assert_eq!(
            db.lookup("1.2.3.3", LookupMode::At("2010-06-01T00:00:00".into())).unwrap().map(x_of),
            Some(1)
        );
        assert_eq!(
            db.lookup("1.2.3.4", LookupMode::At("2011-06-01T00:00:00".into())).unwrap().map(x_of),
            Some(7)
        );
        assert_eq!(
            db.lookup("1.2.3.5", LookupMode::At("2011-06-01T00:00:00".into())).unwrap().map(x_of),
            Some(8)
        );
        assert_eq!(
            db.lookup("1.100.100.100", LookupMode::At("2011-06-01T00:00:00".into())).unwrap().map(x_of),
            Some(1)
        );
        assert_eq!(
            db.lookup("8.1.2.3", LookupMode::At("2011-06-01T00:00:00".into())).unwrap().map(x_of),
            Some(3)
        );

        assert_eq!(db.lookup("1.2.3.4", LookupMode::At("2009-01-01T00:00:00".into())).unwrap(), None);
        assert_eq!(
            db.lookup("1.2.3.4", LookupMode::At("2038-01-01T00:00:00".into())).unwrap().map(x_of),
            Some(4)
        );

        let history = db.lookup("1.2.3.4", LookupMode::All).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&history).unwrap();
        let xs: Vec<i64> = value["history"].as_array().unwrap().iter().map(|v| v["x"].as_i64().unwrap()).collect();
        assert_eq!(xs, vec![4, 7, 1]);
    }

    #[test]
    fn loading_snapshots_sequentially_matches_loading_them_together() {
        let dir_together = tempfile::tempdir().unwrap();
        let together = Database::open(dir_together.path(), true).unwrap();
        together
            .load_streams(vec![
                snapshot(vec![(0, 99, infoset("2010-01-01T00:00:00", 1))]),
                snapshot(vec![(0, 99, infoset("2013-01-01T00:00:00", 4))]),
            ])
            .unwrap();

        let dir_seq = tempfile::tempdir().unwrap();
        let sequential = Database::open(dir_seq.path(), true).unwrap();
        sequential.load_streams(vec![snapshot(vec![(0, 99, infoset("2010-01-01T00:00:00", 1))])]).unwrap();
        sequential.load_streams(vec![snapshot(vec![(0, 99, infoset("2013-01-01T00:00:00", 4))])]).unwrap();

        let addr = crate::address::Address::from_packed(&0u128.to_be_bytes()).to_canonical_string();
        let a = together.lookup(&addr, LookupMode::Latest).unwrap();
        let b = sequential.lookup(&addr, LookupMode::Latest).unwrap();
        assert_eq!(a, b);
    }
}
