//! NetFlow v7, the Catalyst switch variant of v5.
//!
//! A 24-byte header followed by 52-byte records. The header drops the
//! engine identification in favor of a reserved word, and each record gains
//! a validity-flags byte and the address of the bypassed router. Flows
//! decoded from v7 therefore carry a flow-engine block holding only the
//! sequence number.

use crate::decode::{DecodeError, check_geometry};
use crate::flow::{FieldMask, FlowRecord};

use nom::number::complete::be_u32;
use nom_derive::{Nom, Parse};

use std::net::{IpAddr, Ipv4Addr};

pub const HEADER_SIZE: usize = 24;
pub const RECORD_SIZE: usize = 52;
/// Largest flow count an exporter will put in one v7 datagram.
pub const MAX_FLOWS: u16 = 28;

const FIELDS: FieldMask = FieldMask::RECV_TIME
    .union(FieldMask::PROTO_FLAGS_TOS)
    .union(FieldMask::SRC_ADDR4)
    .union(FieldMask::DST_ADDR4)
    .union(FieldMask::GATEWAY_ADDR4)
    .union(FieldMask::SRC_DST_PORT)
    .union(FieldMask::PACKETS)
    .union(FieldMask::OCTETS)
    .union(FieldMask::IF_INDICES)
    .union(FieldMask::AGENT_INFO)
    .union(FieldMask::FLOW_TIMES)
    .union(FieldMask::AS_INFO)
    .union(FieldMask::FLOW_ENGINE_INFO);

#[derive(Debug, PartialEq, Eq, Clone, Copy, Nom)]
pub struct Header {
    pub version: u16,
    /// Flows in this datagram (1-28).
    pub count: u16,
    /// Exporter uptime, milliseconds.
    pub sys_uptime: u32,
    /// Exporter wall clock, epoch seconds.
    pub unix_secs: u32,
    /// Residual nanoseconds.
    pub unix_nsecs: u32,
    /// Running count of flows seen by the exporter.
    pub flow_sequence: u32,
    pub reserved: u32,
}

#[derive(Debug, PartialEq, Eq, Clone, Nom)]
pub struct Record {
    /// Zero when the flow mask is destination-only.
    #[nom(Map = "Ipv4Addr::from", Parse = "be_u32")]
    pub src_addr: Ipv4Addr,
    #[nom(Map = "Ipv4Addr::from", Parse = "be_u32")]
    pub dst_addr: Ipv4Addr,
    /// Next-hop router; the switch always reports zero.
    #[nom(Map = "Ipv4Addr::from", Parse = "be_u32")]
    pub next_hop: Ipv4Addr,
    /// SNMP input interface index.
    pub input: u16,
    /// SNMP output interface index.
    pub output: u16,
    pub d_pkts: u32,
    pub d_octets: u32,
    /// Uptime at the first packet of the flow, milliseconds.
    pub first: u32,
    /// Uptime at the last packet of the flow, milliseconds.
    pub last: u32,
    pub src_port: u16,
    pub dst_port: u16,
    /// Marks which record fields the switch considers invalid.
    pub flags_valid: u8,
    pub tcp_flags: u8,
    pub proto: u8,
    pub tos: u8,
    pub src_as: u16,
    pub dst_as: u16,
    pub src_mask: u8,
    pub dst_mask: u8,
    /// More validity flags.
    pub flags_invalid: u16,
    /// Router bypassed by the switch.
    #[nom(Map = "Ipv4Addr::from", Parse = "be_u32")]
    pub router_src: Ipv4Addr,
}

#[derive(Debug, Nom)]
pub struct Packet {
    pub header: Header,
    #[nom(Count = "header.count")]
    pub records: Vec<Record>,
}

pub fn decode(
    data: &[u8],
    agent_addr: IpAddr,
    recv_secs: u32,
) -> Result<Vec<FlowRecord>, DecodeError> {
    let count = if data.len() >= HEADER_SIZE {
        u16::from_be_bytes([data[2], data[3]])
    } else {
        0
    };
    check_geometry(7, data.len(), HEADER_SIZE, RECORD_SIZE, MAX_FLOWS, count)?;
    let (_, packet) = Packet::parse(data).map_err(|e| DecodeError::Parse {
        version: 7,
        kind: format!("{e:?}"),
    })?;
    Ok(packet
        .records
        .iter()
        .map(|rec| canonical(&packet.header, rec, agent_addr, recv_secs))
        .collect())
}

fn canonical(header: &Header, rec: &Record, agent_addr: IpAddr, recv_secs: u32) -> FlowRecord {
    let agent_bit = match agent_addr {
        IpAddr::V4(_) => FieldMask::AGENT_ADDR4,
        IpAddr::V6(_) => FieldMask::AGENT_ADDR6,
    };
    FlowRecord {
        fields: FIELDS | agent_bit,
        recv_secs,
        proto: rec.proto,
        tcp_flags: rec.tcp_flags,
        tos: rec.tos,
        agent_addr,
        src_addr: IpAddr::V4(rec.src_addr),
        dst_addr: IpAddr::V4(rec.dst_addr),
        gateway_addr: IpAddr::V4(rec.next_hop),
        src_port: rec.src_port,
        dst_port: rec.dst_port,
        packets: rec.d_pkts.into(),
        octets: rec.d_octets.into(),
        if_index_in: rec.input,
        if_index_out: rec.output,
        sys_uptime_ms: header.sys_uptime,
        agent_secs: header.unix_secs,
        agent_nsecs: header.unix_nsecs,
        netflow_version: 7,
        flow_start: rec.first,
        flow_finish: rec.last,
        src_as: rec.src_as,
        dst_as: rec.dst_as,
        src_mask_len: rec.src_mask,
        dst_mask_len: rec.dst_mask,
        // The v7 header has no engine identification; only the sequence
        // survives into the flow-engine block.
        engine_type: 0,
        engine_id: 0,
        flow_sequence: header.flow_sequence,
        ..FlowRecord::default()
    }
}
