//! NetFlow datagram decoders.
//!
//! Versions 1, 5, and 7 are fixed-layout: a version-specific header followed
//! by `count` fixed-size records. Each decoder runs three structural checks
//! before producing anything (header fits, flow count within the version
//! maximum, datagram length exactly `header + count * record`) and then
//! parses the byte slice with `nom`. A datagram either decodes completely,
//! in packet order, or is rejected whole.

pub mod v1;
pub mod v5;
pub mod v7;

use crate::flow::FlowRecord;
use std::error::Error;
use std::fmt;
use std::net::IpAddr;

/// Version/count prefix shared by every NetFlow version.
pub const COMMON_HEADER_SIZE: usize = 4;

/// Why a datagram was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Shorter than the common version/count header.
    ShortDatagram { length: usize },
    /// A version this collector does not decode (v9/IPFIX among them).
    UnsupportedVersion { version: u16 },
    /// Shorter than the version-specific header.
    ShortHeader {
        version: u16,
        length: usize,
        header_size: usize,
    },
    /// Flow count of zero, or above the version maximum.
    BadFlowCount { version: u16, count: u16, max: u16 },
    /// Datagram length disagrees with the header-declared flow count.
    LengthMismatch {
        version: u16,
        expected: usize,
        actual: usize,
    },
    /// Parse failure after the geometry checks passed.
    Parse { version: u16, kind: String },
}

impl DecodeError {
    /// Unsupported versions are logged at INFO and do not count against the
    /// peer's `ninvalid`; every other rejection does.
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, DecodeError::UnsupportedVersion { .. })
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::ShortDatagram { length } => {
                write!(f, "datagram of {} bytes is too short for a NetFlow header", length)
            }
            DecodeError::UnsupportedVersion { version } => {
                write!(f, "unsupported NetFlow version {}", version)
            }
            DecodeError::ShortHeader {
                version,
                length,
                header_size,
            } => write!(
                f,
                "v{} datagram of {} bytes is shorter than its {}-byte header",
                version, length, header_size
            ),
            DecodeError::BadFlowCount { version, count, max } => {
                write!(f, "v{} flow count {} outside 1..={}", version, count, max)
            }
            DecodeError::LengthMismatch {
                version,
                expected,
                actual,
            } => write!(
                f,
                "v{} datagram is {} bytes, header promises {}",
                version, actual, expected
            ),
            DecodeError::Parse { version, kind } => {
                write!(f, "v{} parse failure: {}", version, kind)
            }
        }
    }
}

impl Error for DecodeError {}

/// Decodes one datagram into canonical flow records.
///
/// Pure over `(data, agent_addr, recv_secs)`; peer bookkeeping is the
/// caller's job.
pub fn decode_datagram(
    data: &[u8],
    agent_addr: IpAddr,
    recv_secs: u32,
) -> Result<Vec<FlowRecord>, DecodeError> {
    if data.len() < COMMON_HEADER_SIZE {
        return Err(DecodeError::ShortDatagram { length: data.len() });
    }
    let version = u16::from_be_bytes([data[0], data[1]]);
    match version {
        1 => v1::decode(data, agent_addr, recv_secs),
        5 => v5::decode(data, agent_addr, recv_secs),
        7 => v7::decode(data, agent_addr, recv_secs),
        _ => Err(DecodeError::UnsupportedVersion { version }),
    }
}

/// The three structural checks every fixed-layout version runs before
/// parsing. `length` is the whole datagram.
pub(crate) fn check_geometry(
    version: u16,
    length: usize,
    header_size: usize,
    record_size: usize,
    max_flows: u16,
    count: u16,
) -> Result<(), DecodeError> {
    if length < header_size {
        return Err(DecodeError::ShortHeader {
            version,
            length,
            header_size,
        });
    }
    if count == 0 || count > max_flows {
        return Err(DecodeError::BadFlowCount {
            version,
            count,
            max: max_flows,
        });
    }
    let expected = header_size + count as usize * record_size;
    if length != expected {
        return Err(DecodeError::LengthMismatch {
            version,
            expected,
            actual: length,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn agent() -> IpAddr {
        "192.0.2.10".parse().unwrap()
    }

    #[test]
    fn short_datagram_is_rejected() {
        let err = decode_datagram(&[0, 5, 0], agent(), 0).unwrap_err();
        assert_eq!(err, DecodeError::ShortDatagram { length: 3 });
        assert!(!err.is_unsupported_version());
    }

    #[test]
    fn unknown_version_is_flagged_as_unsupported() {
        // A plausible v9 header; only the version field matters here.
        let mut data = vec![0u8; 24];
        data[1] = 9;
        data[3] = 1;
        let err = decode_datagram(&data, agent(), 0).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedVersion { version: 9 });
        assert!(err.is_unsupported_version());
    }

    #[test]
    fn geometry_rejects_zero_and_excess_counts() {
        assert!(matches!(
            check_geometry(5, 24, 24, 48, 30, 0),
            Err(DecodeError::BadFlowCount { count: 0, .. })
        ));
        assert!(matches!(
            check_geometry(5, 24 + 31 * 48, 24, 48, 30, 31),
            Err(DecodeError::BadFlowCount { count: 31, .. })
        ));
        assert!(check_geometry(5, 24 + 30 * 48, 24, 48, 30, 30).is_ok());
    }

    #[test]
    fn geometry_rejects_off_by_one_lengths() {
        assert!(matches!(
            check_geometry(5, 24 + 48 - 1, 24, 48, 30, 1),
            Err(DecodeError::LengthMismatch { .. })
        ));
        assert!(matches!(
            check_geometry(5, 24 + 48 + 1, 24, 48, 30, 1),
            Err(DecodeError::LengthMismatch { .. })
        ));
    }
}
