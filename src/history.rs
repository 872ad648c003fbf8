//! §4.4 History builder. Given a set of infosets covering one sub-range,
//! produces a [`Record`]; given a stored [`RecordView`], replays its diff
//! chain back into the infosets it was built from (used when folding a new
//! snapshot batch into an existing range, spec §4.4 "preserving old history
//! under re-ingest").

use crate::diffcodec::{diff_incremental, patch_in_place};
use crate::infoset::{datetime_of, decode_infoset, encode_infoset, Infoset, DATETIME_KEY};
use crate::record::{Record, RecordView};
use crate::{codec, error::WhipError};

/// Build a record from the infosets active over one sub-range.
///
/// 1. sort by `datetime` ascending
/// 2. deduplicate consecutive infosets ignoring `datetime`, keeping the
///    oldest of each run ("first seen at" semantics)
/// 3. reverse so the most recent infoset is first
/// 4. the incremental diff chain over the reversed list *is* the reverse
///    diff chain: `diff(latest, next-older)`, `diff(next-older,
///    next-next-older)`, ...
pub fn build_record(begin: [u8; 16], infosets: Vec<Infoset>) -> Result<Record, WhipError> {
    if infosets.is_empty() {
        return Err(WhipError::MalformedRecord("cannot build a record from zero infosets".into()));
    }

    let mut sorted = infosets;
    sorted.sort_by(|a, b| {
        let da = a.get(DATETIME_KEY).and_then(|v| v.as_str()).unwrap_or_default();
        let db = b.get(DATETIME_KEY).and_then(|v| v.as_str()).unwrap_or_default();
        da.cmp(db)
    });
    for infoset in &sorted {
        datetime_of(infoset)?;
    }

    let mut deduped: Vec<Infoset> = Vec::with_capacity(sorted.len());
    let mut last_payload: Option<Infoset> = None;
    for infoset in sorted {
        let payload = without_datetime(&infoset);
        if last_payload.as_ref() != Some(&payload) {
            last_payload = Some(payload);
            deduped.push(infoset);
        }
    }

    deduped.reverse();
    let (latest, reverse_diffs) = diff_incremental(&deduped);
    let latest_datetime = datetime_of(&latest)?.to_string();
    let latest_blob = encode_infoset(&latest)?;
    let history_blob = codec::encode_diffs(&reverse_diffs);

    Ok(Record { begin, latest_blob, latest_datetime, history_blob })
}

fn without_datetime(infoset: &Infoset) -> Infoset {
    let mut m = infoset.clone();
    m.remove(DATETIME_KEY);
    m
}

/// Reconstruct every infoset a stored record covers, by decoding the latest
/// infoset and replaying the reverse-diff chain. Order is latest-first.
pub fn expand_history(view: &RecordView) -> Result<Vec<Infoset>, WhipError> {
    let latest = decode_infoset(view.latest_blob)?;
    let mut out = vec![latest.clone()];
    let mut current = latest;
    for d in view.diffs() {
        let d = d?;
        patch_in_place(&mut current, &d);
        out.push(current.clone());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infoset::AttrValue;

    fn infoset(dt: &str, x: i64) -> Infoset {
        [
            (DATETIME_KEY.to_string(), AttrValue::Str(dt.to_string())),
            ("x".to_string(), AttrValue::Int(x)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn build_record_then_expand_history_recovers_all_versions() {
        let infosets = vec![infoset("2010-01-01T00:00:00", 1), infoset("2013-01-01T00:00:00", 4)];
        let record = build_record([0u8; 16], infosets.clone()).unwrap();
        let encoded = record.encode();
        let view = RecordView::parse(&encoded).unwrap();
        assert_eq!(view.latest_datetime, "2013-01-01T00:00:00");

        let mut expanded = expand_history(&view).unwrap();
        expanded.sort_by(|a, b| datetime_of(a).unwrap().cmp(datetime_of(b).unwrap()));
        assert_eq!(expanded, infosets);
    }

    #[test]
    fn consecutive_equal_payloads_are_deduplicated_keeping_the_oldest() {
        let infosets = vec![
            infoset("2010-01-01T00:00:00", 1),
            infoset("2011-01-01T00:00:00", 1),
            infoset("2013-01-01T00:00:00", 4),
        ];
        let record = build_record([0u8; 16], infosets).unwrap();
        let view = RecordView::parse(&record.encode()).unwrap();
        let expanded = expand_history(&view).unwrap();
        // latest (x=4) and the oldest surviving x=1 version (dt 2010, not 2011)
        assert_eq!(expanded.len(), 2);
        assert_eq!(datetime_of(&expanded[1]).unwrap(), "2010-01-01T00:00:00");
    }

    #[test]
    fn empty_infoset_list_is_rejected() {
        assert!(build_record([0u8; 16], vec![]).is_err());
    }
}
