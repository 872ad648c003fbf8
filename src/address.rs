//! §4.1 Address codec.
//!
//! Converts among human string, 128-bit integer, and packed 16-byte
//! big-endian form. IPv4 lives at `::ffff:0.0.0.0/96` so that a single fixed
//! width key space sorts IPv4 and IPv6 correctly together (spec §1, §3).

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::WhipError;

/// The 96-bit prefix `::ffff:0:0/96` that IPv4-mapped addresses live under.
const V4_MAPPED_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u128);

impl Address {
    pub fn from_v4(v4: Ipv4Addr) -> Self {
        let mut buf = [0u8; 16];
        buf[..12].copy_from_slice(&V4_MAPPED_PREFIX);
        buf[12..].copy_from_slice(&v4.octets());
        Address(u128::from_be_bytes(buf))
    }

    pub fn from_v6(v6: Ipv6Addr) -> Self {
        Address(u128::from_be_bytes(v6.octets()))
    }

    /// Parse a dotted-quad or colon-separated address string.
    pub fn parse(s: &str) -> Result<Self, WhipError> {
        if let Ok(v4) = s.parse::<Ipv4Addr>() {
            return Ok(Self::from_v4(v4));
        }
        if let Ok(v6) = s.parse::<Ipv6Addr>() {
            return Ok(Self::from_v6(v6));
        }
        Err(WhipError::MalformedAddress { input: s.to_string() })
    }

    pub fn pack(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_packed(bytes: &[u8; 16]) -> Self {
        Address(u128::from_be_bytes(*bytes))
    }

    /// True if this address lives in the IPv4-mapped `::ffff:0:0/96` range.
    pub fn is_v4_mapped(&self) -> bool {
        self.pack()[..12] == V4_MAPPED_PREFIX
    }

    /// Render as dotted-quad if IPv4-mapped, colon notation otherwise —
    /// this is the canonical string form a packed address round-trips to.
    pub fn to_canonical_string(&self) -> String {
        let bytes = self.pack();
        if self.is_v4_mapped() {
            Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15]).to_string()
        } else {
            Ipv6Addr::from(bytes).to_string()
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}
