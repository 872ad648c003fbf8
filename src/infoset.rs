//! Infoset data model and the attribute codec (spec §3, §4 "Attribute codec
//! polymorphism" design note). An infoset is a flat attribute map; values are
//! a small tagged sum rather than a dynamically-typed JSON value, per the
//! design notes in spec §9.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::WhipError;

/// The distinguished key every infoset must carry (spec §3).
pub const DATETIME_KEY: &str = "datetime";

/// Magic sentinel preserved at the reader boundary for old Quova-derived
/// time-zone data (spec §9, open question (a)). The core never interprets
/// this value; it is only ever passed through.
pub const TZ_MAGIC_UNKNOWN: &str = "999";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

/// A flat attribute map. Shallow only — no nested structure is diffed
/// (spec §3).
pub type Infoset = BTreeMap<String, AttrValue>;

/// Fetch the `datetime` attribute of an infoset, required by every valid
/// infoset (spec §3).
pub fn datetime_of(infoset: &Infoset) -> Result<&str, WhipError> {
    infoset
        .get(DATETIME_KEY)
        .and_then(AttrValue::as_str)
        .ok_or_else(|| WhipError::MalformedRecord("infoset missing datetime".into()))
}

/// Encode an infoset via the attribute codec. Encoded output is a UTF-8 byte
/// string (spec §6), deterministic enough that re-encoding a decoded latest
/// infoset is safe to hand back to a client unchanged.
pub fn encode_infoset(infoset: &Infoset) -> Result<Vec<u8>, WhipError> {
    Ok(serde_json::to_vec(infoset)?)
}

pub fn decode_infoset(bytes: &[u8]) -> Result<Infoset, WhipError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encode an arbitrary JSON-shaped wrapper (e.g. `{"history": [...]}`) via
/// the same codec, for the `all` lookup mode (spec §4.6).
pub fn encode_value(value: &serde_json::Value) -> Result<Vec<u8>, WhipError> {
    Ok(serde_json::to_vec(value)?)
}

#[derive(Serialize)]
struct HistoryEnvelope<'a> {
    history: &'a [Infoset],
}

/// Encode a chronologically-descending list of infosets as `{"history": [...]}`
/// for the `all` lookup mode (spec §4.6).
pub fn encode_history(history: &[Infoset]) -> Result<Vec<u8>, WhipError> {
    Ok(serde_json::to_vec(&HistoryEnvelope { history })?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Infoset {
        let mut m = Infoset::new();
        m.insert(DATETIME_KEY.to_string(), AttrValue::from("2013-01-01T00:00:00"));
        m.insert("x".to_string(), AttrValue::Int(4));
        m.insert("city".to_string(), AttrValue::Null);
        m
    }

    #[test]
    fn infoset_round_trips_through_the_attribute_codec() {
        let infoset = sample();
        let encoded = encode_infoset(&infoset).unwrap();
        let decoded = decode_infoset(&encoded).unwrap();
        assert_eq!(infoset, decoded);
    }

    #[test]
    fn datetime_of_rejects_missing_key() {
        let mut m = Infoset::new();
        m.insert("x".to_string(), AttrValue::Int(1));
        assert!(datetime_of(&m).is_err());
    }
}
