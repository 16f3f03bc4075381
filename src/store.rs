//! The binary flow log.
//!
//! A log is an 8-byte file header followed by length-framed records. Each
//! record starts with the 32-bit field mask of the sub-records it carries
//! and the 32-bit total record length, then exactly the masked sub-records
//! in a fixed order. Everything multi-byte is network byte order; the
//! 64-bit counters are high word first. The layout is a stable contract:
//! a reader from last year must still understand a log written today.
//!
//! The codec is symmetric. [`encode_record`] and [`decode_record`] are
//! inverses over any record whose mask is internally consistent, which is
//! what keeps the format honest in tests and gives log-consuming tools a
//! way in.

use crate::flow::{FieldMask, FlowRecord};

use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

pub const LOG_MAGIC: u32 = 0x464C_4F57;
pub const LOG_VERSION: u32 = 1;
pub const FILE_HEADER_SIZE: usize = 8;
pub const RECORD_HEADER_SIZE: usize = 8;

/// Upper bound on a record: header plus every sub-record at its widest,
/// counting both family variants of each address slot.
pub const MAX_RECORD_SIZE: usize = RECORD_HEADER_SIZE + 156;

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    /// The file starts with something other than a flow log.
    BadMagic { found: u32 },
    BadVersion { found: u32 },
    /// Non-empty file too short to hold the file header.
    TruncatedHeader { length: u64 },
    /// Source and destination address families disagree.
    MixedAddressFamily,
    /// A mask bit names an address family the record's address is not.
    AddressFamilyMismatch,
    /// Record mask carries bits this codec does not define.
    UnknownFields { bits: u32 },
    /// Record length field disagrees with its mask.
    BadRecordLength { expected: usize, found: usize },
    /// Byte stream ended inside a record.
    TruncatedRecord,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {}", e),
            StoreError::BadMagic { found } => {
                write!(f, "bad log magic {:#010x}, expected {:#010x}", found, LOG_MAGIC)
            }
            StoreError::BadVersion { found } => {
                write!(f, "log format version {} unsupported, expected {}", found, LOG_VERSION)
            }
            StoreError::TruncatedHeader { length } => {
                write!(f, "existing log of {} bytes is shorter than its header", length)
            }
            StoreError::MixedAddressFamily => {
                write!(f, "source and destination address families disagree")
            }
            StoreError::AddressFamilyMismatch => {
                write!(f, "field mask and address family disagree")
            }
            StoreError::UnknownFields { bits } => {
                write!(f, "record carries unknown field bits {:#010x}", bits)
            }
            StoreError::BadRecordLength { expected, found } => {
                write!(f, "record length {} disagrees with mask, expected {}", found, expected)
            }
            StoreError::TruncatedRecord => write!(f, "log ends inside a record"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Body bytes a record with `fields` occupies, record header excluded.
fn body_len(fields: FieldMask) -> usize {
    let mut len = 0;
    let f = |bit: FieldMask, size: usize| if fields.contains(bit) { size } else { 0 };
    len += f(FieldMask::TAG, 4);
    len += f(FieldMask::RECV_TIME, 4);
    len += f(FieldMask::PROTO_FLAGS_TOS, 4);
    len += f(FieldMask::AGENT_ADDR4, 4);
    len += f(FieldMask::AGENT_ADDR6, 16);
    len += f(FieldMask::SRC_ADDR4, 4);
    len += f(FieldMask::SRC_ADDR6, 16);
    len += f(FieldMask::DST_ADDR4, 4);
    len += f(FieldMask::DST_ADDR6, 16);
    len += f(FieldMask::GATEWAY_ADDR4, 4);
    len += f(FieldMask::GATEWAY_ADDR6, 16);
    len += f(FieldMask::SRC_DST_PORT, 4);
    len += f(FieldMask::PACKETS, 8);
    len += f(FieldMask::OCTETS, 8);
    len += f(FieldMask::IF_INDICES, 4);
    len += f(FieldMask::AGENT_INFO, 16);
    len += f(FieldMask::FLOW_TIMES, 8);
    len += f(FieldMask::AS_INFO, 8);
    len += f(FieldMask::FLOW_ENGINE_INFO, 8);
    len
}

fn push_addr4(body: &mut Vec<u8>, addr: &IpAddr) -> Result<(), StoreError> {
    match addr {
        IpAddr::V4(a) => {
            body.extend_from_slice(&a.octets());
            Ok(())
        }
        IpAddr::V6(_) => Err(StoreError::AddressFamilyMismatch),
    }
}

fn push_addr6(body: &mut Vec<u8>, addr: &IpAddr) -> Result<(), StoreError> {
    match addr {
        IpAddr::V6(a) => {
            body.extend_from_slice(&a.octets());
            Ok(())
        }
        IpAddr::V4(_) => Err(StoreError::AddressFamilyMismatch),
    }
}

/// Serializes `flow` with the persisted mask `flow.fields ∩ store_mask`.
///
/// The output is the exact byte sequence appended to the log: record header
/// first, then the masked sub-records in canonical order.
pub fn encode_record(flow: &FlowRecord, store_mask: FieldMask) -> Result<Vec<u8>, StoreError> {
    let fields = flow.fields & store_mask;
    let mut body = Vec::with_capacity(body_len(fields));

    if fields.contains(FieldMask::TAG) {
        body.extend_from_slice(&flow.tag.to_be_bytes());
    }
    if fields.contains(FieldMask::RECV_TIME) {
        body.extend_from_slice(&flow.recv_secs.to_be_bytes());
    }
    if fields.contains(FieldMask::PROTO_FLAGS_TOS) {
        body.extend_from_slice(&[flow.proto, flow.tcp_flags, flow.tos, 0]);
    }
    if fields.contains(FieldMask::AGENT_ADDR4) {
        push_addr4(&mut body, &flow.agent_addr)?;
    }
    if fields.contains(FieldMask::AGENT_ADDR6) {
        push_addr6(&mut body, &flow.agent_addr)?;
    }
    if fields.contains(FieldMask::SRC_ADDR4) {
        push_addr4(&mut body, &flow.src_addr)?;
    }
    if fields.contains(FieldMask::SRC_ADDR6) {
        push_addr6(&mut body, &flow.src_addr)?;
    }
    if fields.contains(FieldMask::DST_ADDR4) {
        push_addr4(&mut body, &flow.dst_addr)?;
    }
    if fields.contains(FieldMask::DST_ADDR6) {
        push_addr6(&mut body, &flow.dst_addr)?;
    }
    if fields.contains(FieldMask::GATEWAY_ADDR4) {
        push_addr4(&mut body, &flow.gateway_addr)?;
    }
    if fields.contains(FieldMask::GATEWAY_ADDR6) {
        push_addr6(&mut body, &flow.gateway_addr)?;
    }
    if fields.contains(FieldMask::SRC_DST_PORT) {
        body.extend_from_slice(&flow.src_port.to_be_bytes());
        body.extend_from_slice(&flow.dst_port.to_be_bytes());
    }
    if fields.contains(FieldMask::PACKETS) {
        body.extend_from_slice(&flow.packets.to_be_bytes());
    }
    if fields.contains(FieldMask::OCTETS) {
        body.extend_from_slice(&flow.octets.to_be_bytes());
    }
    if fields.contains(FieldMask::IF_INDICES) {
        body.extend_from_slice(&flow.if_index_in.to_be_bytes());
        body.extend_from_slice(&flow.if_index_out.to_be_bytes());
    }
    if fields.contains(FieldMask::AGENT_INFO) {
        body.extend_from_slice(&flow.sys_uptime_ms.to_be_bytes());
        body.extend_from_slice(&flow.agent_secs.to_be_bytes());
        body.extend_from_slice(&flow.agent_nsecs.to_be_bytes());
        body.extend_from_slice(&flow.netflow_version.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
    }
    if fields.contains(FieldMask::FLOW_TIMES) {
        body.extend_from_slice(&flow.flow_start.to_be_bytes());
        body.extend_from_slice(&flow.flow_finish.to_be_bytes());
    }
    if fields.contains(FieldMask::AS_INFO) {
        body.extend_from_slice(&flow.src_as.to_be_bytes());
        body.extend_from_slice(&flow.dst_as.to_be_bytes());
        body.push(flow.src_mask_len);
        body.push(flow.dst_mask_len);
        body.extend_from_slice(&0u16.to_be_bytes());
    }
    if fields.contains(FieldMask::FLOW_ENGINE_INFO) {
        body.push(flow.engine_type);
        body.push(flow.engine_id);
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&flow.flow_sequence.to_be_bytes());
    }

    let total = RECORD_HEADER_SIZE + body.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&fields.bits().to_be_bytes());
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

struct Take<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Take<'a> {
    fn bytes(&mut self, n: usize) -> Result<&'a [u8], StoreError> {
        let end = self.pos.checked_add(n).ok_or(StoreError::TruncatedRecord)?;
        if end > self.buf.len() {
            return Err(StoreError::TruncatedRecord);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, StoreError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, StoreError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, StoreError> {
        let b = self.bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    fn addr4(&mut self) -> Result<IpAddr, StoreError> {
        let b = self.bytes(4)?;
        Ok(IpAddr::V4(Ipv4Addr::new(b[0], b[1], b[2], b[3])))
    }

    fn addr6(&mut self) -> Result<IpAddr, StoreError> {
        let b = self.bytes(16)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(b);
        Ok(IpAddr::V6(Ipv6Addr::from(raw)))
    }
}

/// Parses one record from the front of `buf`. Returns the record and the
/// bytes it consumed.
pub fn decode_record(buf: &[u8]) -> Result<(FlowRecord, usize), StoreError> {
    if buf.len() < RECORD_HEADER_SIZE {
        return Err(StoreError::TruncatedRecord);
    }
    let bits = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let total = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
    let fields = FieldMask::from_bits(bits).ok_or(StoreError::UnknownFields { bits })?;

    let expected = RECORD_HEADER_SIZE + body_len(fields);
    if total != expected {
        return Err(StoreError::BadRecordLength {
            expected,
            found: total,
        });
    }
    if buf.len() < total {
        return Err(StoreError::TruncatedRecord);
    }

    let mut take = Take {
        buf: &buf[RECORD_HEADER_SIZE..total],
        pos: 0,
    };
    let mut flow = FlowRecord {
        fields,
        ..FlowRecord::default()
    };

    if fields.contains(FieldMask::TAG) {
        flow.tag = take.u32()?;
    }
    if fields.contains(FieldMask::RECV_TIME) {
        flow.recv_secs = take.u32()?;
    }
    if fields.contains(FieldMask::PROTO_FLAGS_TOS) {
        let b = take.bytes(4)?;
        flow.proto = b[0];
        flow.tcp_flags = b[1];
        flow.tos = b[2];
    }
    if fields.contains(FieldMask::AGENT_ADDR4) {
        flow.agent_addr = take.addr4()?;
    }
    if fields.contains(FieldMask::AGENT_ADDR6) {
        flow.agent_addr = take.addr6()?;
    }
    if fields.contains(FieldMask::SRC_ADDR4) {
        flow.src_addr = take.addr4()?;
    }
    if fields.contains(FieldMask::SRC_ADDR6) {
        flow.src_addr = take.addr6()?;
    }
    if fields.contains(FieldMask::DST_ADDR4) {
        flow.dst_addr = take.addr4()?;
    }
    if fields.contains(FieldMask::DST_ADDR6) {
        flow.dst_addr = take.addr6()?;
    }
    if fields.contains(FieldMask::GATEWAY_ADDR4) {
        flow.gateway_addr = take.addr4()?;
    }
    if fields.contains(FieldMask::GATEWAY_ADDR6) {
        flow.gateway_addr = take.addr6()?;
    }
    if fields.contains(FieldMask::SRC_DST_PORT) {
        flow.src_port = take.u16()?;
        flow.dst_port = take.u16()?;
    }
    if fields.contains(FieldMask::PACKETS) {
        flow.packets = take.u64()?;
    }
    if fields.contains(FieldMask::OCTETS) {
        flow.octets = take.u64()?;
    }
    if fields.contains(FieldMask::IF_INDICES) {
        flow.if_index_in = take.u16()?;
        flow.if_index_out = take.u16()?;
    }
    if fields.contains(FieldMask::AGENT_INFO) {
        flow.sys_uptime_ms = take.u32()?;
        flow.agent_secs = take.u32()?;
        flow.agent_nsecs = take.u32()?;
        flow.netflow_version = take.u16()?;
        take.u16()?; // pad
    }
    if fields.contains(FieldMask::FLOW_TIMES) {
        flow.flow_start = take.u32()?;
        flow.flow_finish = take.u32()?;
    }
    if fields.contains(FieldMask::AS_INFO) {
        flow.src_as = take.u16()?;
        flow.dst_as = take.u16()?;
        let b = take.bytes(2)?;
        flow.src_mask_len = b[0];
        flow.dst_mask_len = b[1];
        take.u16()?; // pad
    }
    if fields.contains(FieldMask::FLOW_ENGINE_INFO) {
        let b = take.bytes(2)?;
        flow.engine_type = b[0];
        flow.engine_id = b[1];
        take.u16()?; // pad
        flow.flow_sequence = take.u32()?;
    }

    Ok((flow, total))
}

/// Reads one record from a stream. `Ok(None)` on clean end-of-stream.
pub fn read_record<R: Read>(reader: &mut R) -> Result<Option<FlowRecord>, StoreError> {
    let mut header = [0u8; RECORD_HEADER_SIZE];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..])?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(StoreError::TruncatedRecord)
            };
        }
        filled += n;
    }

    let total = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if !(RECORD_HEADER_SIZE..=MAX_RECORD_SIZE).contains(&total) {
        return Err(StoreError::BadRecordLength {
            expected: RECORD_HEADER_SIZE,
            found: total,
        });
    }

    let mut buf = vec![0u8; total];
    buf[..RECORD_HEADER_SIZE].copy_from_slice(&header);
    reader
        .read_exact(&mut buf[RECORD_HEADER_SIZE..])
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => StoreError::TruncatedRecord,
            _ => StoreError::Io(e),
        })?;

    let (flow, _) = decode_record(&buf)?;
    Ok(Some(flow))
}

/// The open flow log: owns the file handle from attach to reopen/exit.
#[derive(Debug)]
pub struct FlowLog {
    file: File,
}

impl FlowLog {
    /// Runs the startup protocol on a freshly opened handle: write the file
    /// header when the file is empty, verify it otherwise, and leave the
    /// position at the end ready to append.
    pub fn attach(mut file: File) -> Result<Self, StoreError> {
        let end = file.seek(SeekFrom::End(0))?;
        if end == 0 {
            file.write_all(&LOG_MAGIC.to_be_bytes())?;
            file.write_all(&LOG_VERSION.to_be_bytes())?;
        } else {
            if end < FILE_HEADER_SIZE as u64 {
                return Err(StoreError::TruncatedHeader { length: end });
            }
            file.seek(SeekFrom::Start(0))?;
            let mut header = [0u8; FILE_HEADER_SIZE];
            file.read_exact(&mut header)?;
            let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            if magic != LOG_MAGIC {
                return Err(StoreError::BadMagic { found: magic });
            }
            let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
            if version != LOG_VERSION {
                return Err(StoreError::BadVersion { found: version });
            }
            file.seek(SeekFrom::End(0))?;
        }
        Ok(FlowLog { file })
    }

    /// Appends one flow with the configured store mask. Returns the mask
    /// actually persisted.
    pub fn append(
        &mut self,
        flow: &FlowRecord,
        store_mask: FieldMask,
    ) -> Result<FieldMask, StoreError> {
        if !flow.family_consistent() {
            return Err(StoreError::MixedAddressFamily);
        }
        let record = encode_record(flow, store_mask)?;
        self.file.write_all(&record)?;
        Ok(flow.fields & store_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn full_flow() -> FlowRecord {
        FlowRecord {
            fields: FieldMask::all() - FieldMask::AGENT_ADDR6
                - FieldMask::SRC_ADDR6
                - FieldMask::DST_ADDR6
                - FieldMask::GATEWAY_ADDR6,
            tag: 9,
            recv_secs: 1_700_000_000,
            proto: 6,
            tcp_flags: 0x18,
            tos: 0x20,
            agent_addr: "192.0.2.1".parse().unwrap(),
            src_addr: "10.0.0.1".parse().unwrap(),
            dst_addr: "10.0.0.2".parse().unwrap(),
            gateway_addr: "10.0.0.254".parse().unwrap(),
            src_port: 4000,
            dst_port: 443,
            packets: 17,
            octets: 4096,
            if_index_in: 1,
            if_index_out: 2,
            sys_uptime_ms: 1000,
            agent_secs: 1_699_999_999,
            agent_nsecs: 500,
            netflow_version: 5,
            flow_start: 100,
            flow_finish: 900,
            src_as: 64500,
            dst_as: 64501,
            src_mask_len: 24,
            dst_mask_len: 25,
            engine_type: 1,
            engine_id: 2,
            flow_sequence: 12345,
        }
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let flow = full_flow();
        let encoded = encode_record(&flow, FieldMask::all()).unwrap();
        let (decoded, consumed) = decode_record(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, flow);

        let reencoded = encode_record(&decoded, FieldMask::all()).unwrap();
        assert_eq!(reencoded, encoded);
    }

    #[test]
    fn store_mask_narrows_the_persisted_record() {
        let flow = full_flow();
        let store_mask = FieldMask::SRC_DST_PORT | FieldMask::OCTETS;
        let encoded = encode_record(&flow, store_mask).unwrap();
        assert_eq!(encoded.len(), RECORD_HEADER_SIZE + 4 + 8);

        let (decoded, _) = decode_record(&encoded).unwrap();
        assert_eq!(decoded.fields, store_mask);
        assert!(decoded.fields.bits() & !(flow.fields & store_mask).bits() == 0);
        assert_eq!(decoded.src_port, 4000);
        assert_eq!(decoded.octets, 4096);
        assert_eq!(decoded.packets, 0); // not persisted
    }

    #[test]
    fn counters_are_high_word_first() {
        let flow = FlowRecord {
            fields: FieldMask::OCTETS,
            octets: 0x0102_0304_0506_0708,
            ..FlowRecord::default()
        };
        let encoded = encode_record(&flow, FieldMask::all()).unwrap();
        assert_eq!(
            &encoded[RECORD_HEADER_SIZE..],
            &[1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn v6_addresses_round_trip() {
        let flow = FlowRecord {
            fields: FieldMask::SRC_ADDR6 | FieldMask::DST_ADDR6 | FieldMask::AGENT_ADDR4,
            agent_addr: "192.0.2.1".parse().unwrap(),
            src_addr: "2001:db8::1".parse().unwrap(),
            dst_addr: "2001:db8::2".parse().unwrap(),
            ..FlowRecord::default()
        };
        let encoded = encode_record(&flow, FieldMask::all()).unwrap();
        let (decoded, _) = decode_record(&encoded).unwrap();
        assert_eq!(decoded, flow);
    }

    #[test]
    fn family_mismatch_is_refused() {
        let flow = FlowRecord {
            fields: FieldMask::SRC_ADDR6,
            src_addr: "10.0.0.1".parse().unwrap(),
            ..FlowRecord::default()
        };
        assert!(matches!(
            encode_record(&flow, FieldMask::all()),
            Err(StoreError::AddressFamilyMismatch)
        ));
    }

    #[test]
    fn unknown_mask_bits_are_rejected_on_read() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(1u32 << 30).to_be_bytes());
        buf.extend_from_slice(&8u32.to_be_bytes());
        assert!(matches!(
            decode_record(&buf),
            Err(StoreError::UnknownFields { .. })
        ));
    }

    #[test]
    fn length_field_must_agree_with_mask() {
        let flow = full_flow();
        let mut encoded = encode_record(&flow, FieldMask::all()).unwrap();
        let bogus = (encoded.len() as u32 + 4).to_be_bytes();
        encoded[4..8].copy_from_slice(&bogus);
        assert!(matches!(
            decode_record(&encoded),
            Err(StoreError::BadRecordLength { .. })
        ));
    }

    #[test]
    fn stream_reader_walks_records_to_eof() {
        let flow = full_flow();
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode_record(&flow, FieldMask::all()).unwrap());
        stream.extend_from_slice(
            &encode_record(&flow, FieldMask::SRC_DST_PORT | FieldMask::TAG).unwrap(),
        );

        let mut cursor = Cursor::new(stream);
        let first = read_record(&mut cursor).unwrap().unwrap();
        assert_eq!(first, flow);
        let second = read_record(&mut cursor).unwrap().unwrap();
        assert_eq!(second.fields, FieldMask::SRC_DST_PORT | FieldMask::TAG);
        assert!(read_record(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn attach_writes_header_once_and_verifies_after() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.bin");
        let open = || {
            std::fs::OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(&path)
                .unwrap()
        };

        let mut log = FlowLog::attach(open()).unwrap();
        log.append(&full_flow(), FieldMask::all()).unwrap();
        let len_after_first = std::fs::metadata(&path).unwrap().len();
        assert!(len_after_first > FILE_HEADER_SIZE as u64);

        // Attaching again verifies, appends nothing.
        drop(log);
        let _log = FlowLog::attach(open()).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len_after_first);
    }

    #[test]
    fn attach_refuses_a_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-log");
        std::fs::write(&path, b"#!/bin/sh\necho hello\n").unwrap();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .append(true)
            .open(&path)
            .unwrap();
        assert!(matches!(
            FlowLog::attach(file),
            Err(StoreError::BadMagic { .. })
        ));
    }

    #[test]
    fn attach_refuses_a_stub_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stub");
        std::fs::write(&path, &LOG_MAGIC.to_be_bytes()[..3]).unwrap();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .append(true)
            .open(&path)
            .unwrap();
        assert!(matches!(
            FlowLog::attach(file),
            Err(StoreError::TruncatedHeader { .. })
        ));
    }

    #[test]
    fn mixed_family_flows_never_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.bin");
        let file = std::fs::OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .unwrap();
        let mut log = FlowLog::attach(file).unwrap();

        let mut flow = full_flow();
        flow.dst_addr = "2001:db8::2".parse().unwrap();
        assert!(matches!(
            log.append(&flow, FieldMask::all()),
            Err(StoreError::MixedAddressFamily)
        ));
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            FILE_HEADER_SIZE as u64
        );
    }
}
