//! §6 Reader contract (external collaborator). Each loader input is a
//! finite, sorted, non-overlapping stream of `(begin, end, infoset)` triples
//! where `infoset["datetime"]` is set to a chronologically-sortable ASCII
//! timestamp. The core only ever consumes the resulting [`RangeStream`]; it
//! has no opinion on where the bytes came from.

pub mod ndjson;
pub mod quova;

use crate::infoset::Infoset;
use crate::merge::RangeStream;

/// A concrete snapshot source that can be turned into a lazy range stream
/// for the loader.
pub trait SnapshotReader {
    fn into_range_stream(self: Box<Self>) -> RangeStream<Infoset>;
}
