//! Quova vendor CSV importer shape (supplemented feature). The core's
//! Non-goals explicitly exclude "source-specific CSV parsing and file-name
//! regexes for vendor data", so this module documents the field layout and
//! reference-dataset join from `whip/importers/quova.py` as a reader
//! registration point, without implementing the CSV/regex parsing itself.

use std::path::Path;

use crate::error::WhipError;
use crate::infoset::Infoset;
use crate::merge::RangeStream;

use super::SnapshotReader;

/// Column order of the pipe-delimited Quova `.dat` files.
pub const QUOVA_FIELDS: &[&str] = &[
    "start_ip_int",
    "end_ip_int",
    "cidr",
    "continent",
    "country",
    "country_iso2",
    "country_cf",
    "region",
    "state",
    "state_cf",
    "city",
    "city_cf",
    "postal_code",
    "phone_number_prefix",
    "timezone",
    "latitude",
    "longitude",
    "dma",
    "msa",
    "pmsa",
    "connectiontype",
    "linespeed",
    "ip_routingtype",
    "aol",
    "asn",
    "sld_id",
    "tld_id",
    "reg_org_id",
    "carrier_id",
];

/// Reference-set header names (`whip/importers/quova.py`'s `REF_HEADERS`):
/// `sld`/`tld`/`org`/`carrier` ids are resolved against a side file before
/// being joined onto each range record.
pub const QUOVA_REFERENCE_HEADERS: &[&str] = &["carrier", "org", "sld", "tld"];

pub struct QuovaReader;

impl QuovaReader {
    /// Registration point for a directory containing a Quova data file and
    /// its reference set. Always fails: CSV parsing and file-name regexes
    /// for vendor data are an explicit core Non-goal.
    pub fn open(_dir: impl AsRef<Path>) -> Result<Self, WhipError> {
        Err(WhipError::MalformedInputStream(
            "Quova CSV import is out of scope for the core; only the reader contract is registered".into(),
        ))
    }
}

impl SnapshotReader for QuovaReader {
    fn into_range_stream(self: Box<Self>) -> RangeStream<Infoset> {
        Box::new(std::iter::empty())
    }
}
