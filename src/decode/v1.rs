//! NetFlow v1, the original fixed-layout export format.
//!
//! A 16-byte header followed by 48-byte records. v1 predates AS reporting
//! and flow-engine identification, so records decoded from it carry neither
//! block.

use crate::decode::{DecodeError, check_geometry};
use crate::flow::{FieldMask, FlowRecord};

use nom::number::complete::be_u32;
use nom_derive::{Nom, Parse};

use std::net::{IpAddr, Ipv4Addr};

pub const HEADER_SIZE: usize = 16;
pub const RECORD_SIZE: usize = 48;
/// Largest flow count an exporter will put in one v1 datagram.
pub const MAX_FLOWS: u16 = 24;

/// Sub-records a v1 flow populates, agent address excluded (its family
/// depends on the exporter).
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
    .union(FieldMask::FLOW_TIMES);

#[derive(Debug, PartialEq, Eq, Clone, Copy, Nom)]
pub struct Header {
    pub version: u16,
    /// Flows in this datagram (1-24).
    pub count: u16,
    /// Exporter uptime, milliseconds.
    pub sys_uptime: u32,
    /// Exporter wall clock, epoch seconds.
    pub unix_secs: u32,
    /// Residual nanoseconds.
    pub unix_nsecs: u32,
}

#[derive(Debug, PartialEq, Eq, Clone, Nom)]
pub struct Record {
    #[nom(Map = "Ipv4Addr::from", Parse = "be_u32")]
    pub src_addr: Ipv4Addr,
    #[nom(Map = "Ipv4Addr::from", Parse = "be_u32")]
    pub dst_addr: Ipv4Addr,
    /// Next-hop router.
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
    pub pad1: u16,
    pub proto: u8,
    pub tos: u8,
    pub tcp_flags: u8,
    pub pad2: u8,
    pub pad3: u16,
    pub reserved: u32,
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
    check_geometry(1, data.len(), HEADER_SIZE, RECORD_SIZE, MAX_FLOWS, count)?;
    let (_, packet) = Packet::parse(data).map_err(|e| DecodeError::Parse {
        version: 1,
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
        netflow_version: 1,
        flow_start: rec.first,
        flow_finish: rec.last,
        ..FlowRecord::default()
    }
}
