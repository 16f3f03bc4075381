//! NetFlow v5, the workhorse fixed-layout export format.
//!
//! A 24-byte header followed by 48-byte records. v5 adds AS reporting,
//! prefix mask lengths, and flow-engine identification over v1.
//!
//! Reference:
//! - <https://www.cisco.com/en/US/technologies/tk648/tk362/technologies_white_paper09186a00800a3db9.html>

use crate::decode::{DecodeError, check_geometry};
use crate::flow::{FieldMask, FlowRecord};

use nom::number::complete::be_u32;
use nom_derive::{Nom, Parse};

use std::net::{IpAddr, Ipv4Addr};

pub const HEADER_SIZE: usize = 24;
pub const RECORD_SIZE: usize = 48;
/// Largest flow count an exporter will put in one v5 datagram.
pub const MAX_FLOWS: u16 = 30;

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
    /// Flows in this datagram (1-30).
    pub count: u16,
    /// Exporter uptime, milliseconds.
    pub sys_uptime: u32,
    /// Exporter wall clock, epoch seconds.
    pub unix_secs: u32,
    /// Residual nanoseconds.
    pub unix_nsecs: u32,
    /// Running count of flows seen by the exporter.
    pub flow_sequence: u32,
    /// Flow-switching engine type.
    pub engine_type: u8,
    /// Flow-switching engine slot.
    pub engine_id: u8,
    /// Sampling mode (2 bits) and interval (14 bits).
    pub sampling_interval: u16,
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
    pub pad1: u8,
    /// Cumulative OR of TCP flags.
    pub tcp_flags: u8,
    pub proto: u8,
    pub tos: u8,
    /// Source AS, origin or peer depending on exporter configuration.
    pub src_as: u16,
    pub dst_as: u16,
    /// Source prefix mask length, bits.
    pub src_mask: u8,
    pub dst_mask: u8,
    pub pad2: u16,
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
    check_geometry(5, data.len(), HEADER_SIZE, RECORD_SIZE, MAX_FLOWS, count)?;
    let (_, packet) = Packet::parse(data).map_err(|e| DecodeError::Parse {
        version: 5,
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
        netflow_version: 5,
        flow_start: rec.first,
        flow_finish: rec.last,
        src_as: rec.src_as,
        dst_as: rec.dst_as,
        src_mask_len: rec.src_mask,
        dst_mask_len: rec.dst_mask,
        engine_type: header.engine_type,
        engine_id: header.engine_id,
        flow_sequence: header.flow_sequence,
        ..FlowRecord::default()
    }
}
