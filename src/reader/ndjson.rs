//! Newline-delimited-JSON snapshot reader (supplemented feature, grounded in
//! `whip/reader.py`'s `iter_json`). Each line is one JSON object carrying
//! `begin`/`end` address strings plus the infoset fields; `.gz`-suffixed
//! paths are transparently decompressed (grounded in `whip/cli.py`'s
//! `gzip_wrap`).

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::address::Address;
use crate::error::WhipError;
use crate::infoset::Infoset;
use crate::merge::RangeStream;

use super::SnapshotReader;

pub struct NdjsonReader {
    lines: Box<dyn Iterator<Item = std::io::Result<String>>>,
}

impl NdjsonReader {
    /// Opens `path`, transparently decompressing if it ends in `.gz`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WhipError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| WhipError::io(path, e))?;
        let is_gzip = path.extension().map(|e| e == "gz").unwrap_or(false);
        Ok(Self::from_reader_named(file, is_gzip, path.to_path_buf()))
    }

    pub fn from_reader(inner: impl Read + 'static) -> Self {
        Self::from_reader_named(inner, false, PathBuf::from("<stream>"))
    }

    fn from_reader_named(inner: impl Read + 'static, is_gzip: bool, _source: PathBuf) -> Self {
        let reader: Box<dyn Read> = if is_gzip { Box::new(GzDecoder::new(inner)) } else { Box::new(inner) };
        NdjsonReader { lines: Box::new(BufReader::new(reader).lines()) }
    }
}

impl SnapshotReader for NdjsonReader {
    fn into_range_stream(self: Box<Self>) -> RangeStream<Infoset> {
        Box::new(self.lines.filter_map(|line| match line {
            Ok(s) if s.trim().is_empty() => None,
            other => Some(parse_line(other)),
        }))
    }
}

fn parse_line(line: std::io::Result<String>) -> Result<(u128, u128, Infoset), WhipError> {
    let line = line.map_err(|e| WhipError::io(Path::new("<ndjson>"), e))?;
    let mut doc: Infoset = serde_json::from_str(&line)?;
    let begin = doc
        .remove("begin")
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| WhipError::MalformedInputStream("ndjson record missing begin".into()))?;
    let end = doc
        .remove("end")
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| WhipError::MalformedInputStream("ndjson record missing end".into()))?;
    let begin = Address::parse(&begin)?.0;
    let end = Address::parse(&end)?.0;
    Ok((begin, end, doc))
}
