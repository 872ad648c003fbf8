//! Binary framing primitives shared by the record envelope (`record.rs`) and
//! the nested reverse-diff chain it carries. Everything here is a flat,
//! self-delimiting byte format — no external crate needed for framing, only
//! `u32` big-endian length prefixes and a small tagged encoding for
//! [`AttrValue`] (spec §9 "attribute codec polymorphism").

use crate::diffcodec::Diff;
use crate::error::WhipError;
use crate::infoset::{AttrValue, Infoset};

pub fn write_len_prefixed(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

/// Split a length-prefixed chunk off the front of `buf`, returning
/// `(chunk, rest)`.
pub fn read_len_prefixed(buf: &[u8]) -> Result<(&[u8], &[u8]), WhipError> {
    if buf.len() < 4 {
        return Err(WhipError::MalformedRecord("truncated length prefix".into()));
    }
    let (len_bytes, rest) = buf.split_at(4);
    let len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
    if rest.len() < len {
        return Err(WhipError::MalformedRecord("truncated length-prefixed field".into()));
    }
    Ok(rest.split_at(len))
}

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;

fn write_attr_value(buf: &mut Vec<u8>, v: &AttrValue) {
    match v {
        AttrValue::Null => buf.push(TAG_NULL),
        AttrValue::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(*b as u8);
        }
        AttrValue::Int(n) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&n.to_be_bytes());
        }
        AttrValue::Float(f) => {
            buf.push(TAG_FLOAT);
            buf.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        AttrValue::Str(s) => {
            buf.push(TAG_STR);
            write_len_prefixed(buf, s.as_bytes());
        }
    }
}

fn read_attr_value(buf: &[u8]) -> Result<(AttrValue, &[u8]), WhipError> {
    let (&tag, rest) = buf
        .split_first()
        .ok_or_else(|| WhipError::MalformedRecord("truncated attribute value tag".into()))?;
    match tag {
        TAG_NULL => Ok((AttrValue::Null, rest)),
        TAG_BOOL => {
            let (&b, rest) = rest
                .split_first()
                .ok_or_else(|| WhipError::MalformedRecord("truncated bool value".into()))?;
            Ok((AttrValue::Bool(b != 0), rest))
        }
        TAG_INT => {
            if rest.len() < 8 {
                return Err(WhipError::MalformedRecord("truncated int value".into()));
            }
            let (n_bytes, rest) = rest.split_at(8);
            Ok((AttrValue::Int(i64::from_be_bytes(n_bytes.try_into().unwrap())), rest))
        }
        TAG_FLOAT => {
            if rest.len() < 8 {
                return Err(WhipError::MalformedRecord("truncated float value".into()));
            }
            let (f_bytes, rest) = rest.split_at(8);
            let bits = u64::from_be_bytes(f_bytes.try_into().unwrap());
            Ok((AttrValue::Float(f64::from_bits(bits)), rest))
        }
        TAG_STR => {
            let (s_bytes, rest) = read_len_prefixed(rest)?;
            let s = std::str::from_utf8(s_bytes)
                .map_err(|e| WhipError::MalformedRecord(format!("invalid utf-8 in string value: {e}")))?;
            Ok((AttrValue::Str(s.to_string()), rest))
        }
        other => Err(WhipError::MalformedRecord(format!("unknown attribute value tag {other}"))),
    }
}

/// Encode the reverse-diff chain: `count` then, per diff, `modifications`
/// (count + key/value pairs) followed by `deletions` (count + keys).
pub fn encode_diffs(diffs: &[Diff]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(diffs.len() as u32).to_be_bytes());
    for d in diffs {
        encode_diff_into(&mut buf, d);
    }
    buf
}

fn encode_diff_into(buf: &mut Vec<u8>, d: &Diff) {
    buf.extend_from_slice(&(d.modifications.len() as u32).to_be_bytes());
    for (k, v) in &d.modifications {
        write_len_prefixed(buf, k.as_bytes());
        write_attr_value(buf, v);
    }
    buf.extend_from_slice(&(d.deletions.len() as u32).to_be_bytes());
    for k in &d.deletions {
        write_len_prefixed(buf, k.as_bytes());
    }
}

pub fn decode_diffs(buf: &[u8]) -> Result<Vec<Diff>, WhipError> {
    DiffChainIter::new(buf).collect()
}

/// Lazily parses one [`Diff`] at a time from a borrowed byte slice, so a
/// historical lookup that only needs the first few versions doesn't have to
/// decode the whole chain (spec §9 "record envelope").
pub struct DiffChainIter<'a> {
    remaining_count: u32,
    rest: &'a [u8],
}

impl<'a> DiffChainIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        if buf.len() < 4 {
            return DiffChainIter { remaining_count: 0, rest: &[] };
        }
        let (count_bytes, rest) = buf.split_at(4);
        let count = u32::from_be_bytes(count_bytes.try_into().unwrap());
        DiffChainIter { remaining_count: count, rest }
    }

    fn read_one(&mut self) -> Result<Diff, WhipError> {
        let mut buf = self.rest;
        if buf.len() < 4 {
            return Err(WhipError::MalformedRecord("truncated diff modifications count".into()));
        }
        let (count_bytes, r) = buf.split_at(4);
        let mod_count = u32::from_be_bytes(count_bytes.try_into().unwrap());
        buf = r;
        let mut modifications = Infoset::new();
        for _ in 0..mod_count {
            let (key_bytes, r) = read_len_prefixed(buf)?;
            let key = std::str::from_utf8(key_bytes)
                .map_err(|e| WhipError::MalformedRecord(format!("invalid utf-8 in diff key: {e}")))?
                .to_string();
            let (value, r) = read_attr_value(r)?;
            modifications.insert(key, value);
            buf = r;
        }
        if buf.len() < 4 {
            return Err(WhipError::MalformedRecord("truncated diff deletions count".into()));
        }
        let (count_bytes, r) = buf.split_at(4);
        let del_count = u32::from_be_bytes(count_bytes.try_into().unwrap());
        buf = r;
        let mut deletions = Vec::with_capacity(del_count as usize);
        for _ in 0..del_count {
            let (key_bytes, r) = read_len_prefixed(buf)?;
            let key = std::str::from_utf8(key_bytes)
                .map_err(|e| WhipError::MalformedRecord(format!("invalid utf-8 in diff key: {e}")))?
                .to_string();
            deletions.push(key);
            buf = r;
        }
        self.rest = buf;
        Ok(Diff { modifications, deletions })
    }
}

impl<'a> Iterator for DiffChainIter<'a> {
    type Item = Result<Diff, WhipError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining_count == 0 {
            return None;
        }
        self.remaining_count -= 1;
        Some(self.read_one())
    }
}
