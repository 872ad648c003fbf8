//! §4.4 Record codec: the self-delimiting envelope stored under each range's
//! `end` key. Four fields in order: packed begin address (fixed 16 bytes),
//! latest-infoset blob (length-prefixed), latest timestamp (length-prefixed
//! ASCII), reverse-diffs blob (length-prefixed, itself a nested binary list
//! of diffs). The outer decoder is zero-copy — it borrows into the
//! KV-returned value slice (spec §9) — so the hottest query ("latest for
//! this IP") never touches the diff chain or the attribute codec.

use crate::codec::{read_len_prefixed, write_len_prefixed, DiffChainIter};
use crate::error::WhipError;

/// An owned record, built fresh by the history builder or reused verbatim
/// when re-keying an unchanged existing record (spec §4.4 "preserving old
/// history under re-ingest").
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub begin: [u8; 16],
    pub latest_blob: Vec<u8>,
    pub latest_datetime: String,
    pub history_blob: Vec<u8>,
}

impl Record {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.latest_blob.len() + self.history_blob.len() + 32);
        buf.extend_from_slice(&self.begin);
        write_len_prefixed(&mut buf, &self.latest_blob);
        write_len_prefixed(&mut buf, self.latest_datetime.as_bytes());
        write_len_prefixed(&mut buf, &self.history_blob);
        buf
    }
}

/// A borrowed, zero-copy view over a record's encoded bytes.
pub struct RecordView<'a> {
    pub begin: [u8; 16],
    pub latest_blob: &'a [u8],
    pub latest_datetime: &'a str,
    diffs_blob: &'a [u8],
}

impl<'a> RecordView<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, WhipError> {
        if bytes.len() < 16 {
            return Err(WhipError::MalformedRecord("record shorter than begin address".into()));
        }
        let (begin_bytes, rest) = bytes.split_at(16);
        let begin: [u8; 16] = begin_bytes.try_into().unwrap();

        let (latest_blob, rest) = read_len_prefixed(rest)?;
        let (dt_bytes, rest) = read_len_prefixed(rest)?;
        let latest_datetime = std::str::from_utf8(dt_bytes)
            .map_err(|e| WhipError::MalformedRecord(format!("invalid utf-8 in latest_datetime: {e}")))?;
        let (diffs_blob, _rest) = read_len_prefixed(rest)?;

        Ok(RecordView { begin, latest_blob, latest_datetime, diffs_blob })
    }

    pub fn diffs(&self) -> DiffChainIter<'a> {
        DiffChainIter::new(self.diffs_blob)
    }

    pub fn to_owned_record(&self) -> Record {
        Record {
            begin: self.begin,
            latest_blob: self.latest_blob.to_vec(),
            latest_datetime: self.latest_datetime.to_string(),
            history_blob: self.diffs_blob.to_vec(),
        }
    }
}
