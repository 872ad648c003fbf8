//! §4.5 Loader. Drives the range merger over every new snapshot stream plus
//! the existing-records stream read back from the backing KV, folding each
//! emitted sub-range into a fresh (or verbatim-reused) record.

use std::time::{Duration, Instant};

use tracing::info;

use crate::error::WhipError;
use crate::history::{build_record, expand_history};
use crate::infoset::Infoset;
use crate::merge::{Merger, RangeStream};
use crate::record::{Record, RecordView};
use crate::store::{KvCursor, KvStore};

/// Default progress-callback interval (spec §4.5: "default 10 s").
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// How often to check the wall clock, to avoid a syscall per merged
/// sub-range on large loads.
const CHECK_EVERY: u64 = 100;

/// One contributor to a merged sub-range: either a fresh infoset from a
/// snapshot reader, or the at-most-one existing record covering the area
/// (spec §4.5 step 1).
enum Contribution {
    New(Infoset),
    Existing(Vec<u8>),
}

/// Wraps a full forward scan of the backing KV as a lazy range stream of
/// existing records, the merger's "existing-records stream" input (spec
/// §4.5). Each value is given a minimal envelope decode, just enough to
/// recover `begin` for range-merge bookkeeping; the blob itself travels
/// through unparsed.
struct ExistingRecordsStream {
    cursor: Box<dyn crate::store::KvCursor>,
    done: bool,
}

impl ExistingRecordsStream {
    fn new(store: &dyn KvStore) -> Self {
        let mut cursor = store.cursor();
        cursor.seek(&[]);
        ExistingRecordsStream { cursor, done: false }
    }
}

impl Iterator for ExistingRecordsStream {
    type Item = Result<(u128, u128, Contribution), WhipError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next()? {
            Ok((key, value)) => {
                if key.len() != 16 {
                    self.done = true;
                    return Some(Err(WhipError::MalformedRecord(
                        "existing record key is not a 16-byte packed address".into(),
                    )));
                }
                let end = u128::from_be_bytes(key.try_into().unwrap());
                match RecordView::parse(&value) {
                    Ok(view) => {
                        let begin = u128::from_be_bytes(view.begin);
                        Some(Ok((begin, end, Contribution::Existing(value))))
                    }
                    Err(e) => {
                        self.done = true;
                        Some(Err(e))
                    }
                }
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Ticks a progress callback roughly once every [`CHECK_EVERY`] iterations,
/// firing at most once per configured wall-clock interval (spec §4.5).
struct ProgressTicker {
    interval: Duration,
    last_fired: Option<Instant>,
    count: u64,
}

impl ProgressTicker {
    fn new(interval: Duration) -> Self {
        ProgressTicker { interval, last_fired: None, count: 0 }
    }

    fn tick(&mut self, report: impl FnOnce(u64)) {
        self.count += 1;
        if self.count % CHECK_EVERY != 0 {
            return;
        }
        let now = Instant::now();
        let due = self.last_fired.map(|t| now.duration_since(t) >= self.interval).unwrap_or(true);
        if due {
            report(self.count);
            self.last_fired = Some(now);
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub sub_ranges_written: u64,
}

/// Drives one load against a backing store handle.
pub struct Loader<'a> {
    store: &'a dyn KvStore,
    progress_interval: Duration,
}

impl<'a> Loader<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        Loader { store, progress_interval: DEFAULT_PROGRESS_INTERVAL }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Merge `new_streams` (one per snapshot reader) with the existing-records
    /// stream and write every resulting sub-range (spec §4.5).
    pub fn load(&self, new_streams: Vec<RangeStream<Infoset>>) -> Result<LoadStats, WhipError> {
        let mut inputs: Vec<RangeStream<Contribution>> = new_streams
            .into_iter()
            .map(|s| -> RangeStream<Contribution> {
                Box::new(s.map(|r| r.map(|(b, e, infoset)| (b, e, Contribution::New(infoset)))))
            })
            .collect();
        inputs.push(Box::new(ExistingRecordsStream::new(self.store)));

        let merger = Merger::new(inputs);
        let mut ticker = ProgressTicker::new(self.progress_interval);
        let mut stats = LoadStats::default();

        for item in merger {
            let (begin, end, contributions) = item?;
            self.write_sub_range(begin, end, contributions)?;
            stats.sub_ranges_written += 1;
            ticker.tick(|n| info!(sub_ranges_so_far = n, "load progress"));
        }

        self.store.compact_range(None, None)?;
        info!(sub_ranges_written = stats.sub_ranges_written, "load complete");
        Ok(stats)
    }

    fn write_sub_range(
        &self,
        begin: u128,
        end: u128,
        contributions: Vec<Contribution>,
    ) -> Result<(), WhipError> {
        let mut new_infosets = Vec::new();
        let mut existing_blob = None;
        for c in contributions {
            match c {
                Contribution::New(infoset) => new_infosets.push(infoset),
                Contribution::Existing(blob) => existing_blob = Some(blob),
            }
        }

        let begin_packed = begin.to_be_bytes();
        let end_packed = end.to_be_bytes();

        let record = if new_infosets.is_empty() {
            // Fast path (spec §4.4): no new data for this sub-range, reuse
            // the existing record's blobs verbatim under the new key bounds.
            let blob = existing_blob
                .ok_or_else(|| WhipError::MalformedRecord("sub-range with no new infosets but no existing record".into()))?;
            let view = RecordView::parse(&blob)?;
            let mut reused = view.to_owned_record();
            reused.begin = begin_packed;
            reused
        } else {
            let mut infosets = new_infosets;
            if let Some(blob) = existing_blob {
                let view = RecordView::parse(&blob)?;
                infosets.extend(expand_history(&view)?);
            }
            build_record(begin_packed, infosets)?
        };

        self.store.put(&end_packed, &record.encode())?;
        Ok(())
    }
}
