//! The canonical flow record shared by the decoders, the filter, and the
//! flow-log codec.
//!
//! Every NetFlow version decodes into one [`FlowRecord`]. The record carries
//! a [`FieldMask`] naming which sub-records the decoder actually populated;
//! the store intersects that mask with the operator's store mask when a
//! record is written, so a field is persisted only when it was both produced
//! and wanted.

use crate::addr::same_family;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

bitflags::bitflags! {
    /// Field mask naming the optional sub-records of a flow record.
    ///
    /// The bit assignment is part of the on-disk format and must not change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldMask: u32 {
        const TAG              = 1 << 0;
        const RECV_TIME        = 1 << 1;
        const PROTO_FLAGS_TOS  = 1 << 2;
        const AGENT_ADDR4      = 1 << 3;
        const AGENT_ADDR6      = 1 << 4;
        const SRC_ADDR4        = 1 << 5;
        const SRC_ADDR6        = 1 << 6;
        const DST_ADDR4        = 1 << 7;
        const DST_ADDR6        = 1 << 8;
        const GATEWAY_ADDR4    = 1 << 9;
        const GATEWAY_ADDR6    = 1 << 10;
        const SRC_DST_PORT     = 1 << 11;
        const PACKETS          = 1 << 12;
        const OCTETS           = 1 << 13;
        const IF_INDICES       = 1 << 14;
        const AGENT_INFO       = 1 << 15;
        const FLOW_TIMES       = 1 << 16;
        const AS_INFO          = 1 << 17;
        const FLOW_ENGINE_INFO = 1 << 18;

        // Either-family composites, used by the store-mask configuration.
        const AGENT_ADDR   = Self::AGENT_ADDR4.bits() | Self::AGENT_ADDR6.bits();
        const SRC_ADDR     = Self::SRC_ADDR4.bits() | Self::SRC_ADDR6.bits();
        const DST_ADDR     = Self::DST_ADDR4.bits() | Self::DST_ADDR6.bits();
        const GATEWAY_ADDR = Self::GATEWAY_ADDR4.bits() | Self::GATEWAY_ADDR6.bits();
    }
}

impl FieldMask {
    /// Resolves a store-mask field name from the configuration.
    ///
    /// Address-valued names select both family variants; `"all"` selects
    /// every defined bit.
    pub fn from_config_name(name: &str) -> Option<FieldMask> {
        let mask = match name {
            "tag" => FieldMask::TAG,
            "recv_time" => FieldMask::RECV_TIME,
            "proto_flags_tos" => FieldMask::PROTO_FLAGS_TOS,
            "agent_addr" => FieldMask::AGENT_ADDR,
            "src_addr" => FieldMask::SRC_ADDR,
            "dst_addr" => FieldMask::DST_ADDR,
            "gateway_addr" => FieldMask::GATEWAY_ADDR,
            "ports" => FieldMask::SRC_DST_PORT,
            "packets" => FieldMask::PACKETS,
            "octets" => FieldMask::OCTETS,
            "if_indices" => FieldMask::IF_INDICES,
            "agent_info" => FieldMask::AGENT_INFO,
            "flow_times" => FieldMask::FLOW_TIMES,
            "as_info" => FieldMask::AS_INFO,
            "flow_engine_info" => FieldMask::FLOW_ENGINE_INFO,
            "all" => FieldMask::all(),
            _ => return None,
        };
        Some(mask)
    }
}

/// One decoded flow, in host byte order throughout.
///
/// Only the fields named by `fields` are meaningful; the rest keep their
/// zero defaults. Conversion to network byte order happens in the store
/// codec, never here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRecord {
    pub fields: FieldMask,
    /// Tag assigned by the filter; meaningful only with [`FieldMask::TAG`].
    pub tag: u32,
    /// Wall-clock receive time, epoch seconds.
    pub recv_secs: u32,
    pub proto: u8,
    pub tcp_flags: u8,
    pub tos: u8,
    /// Exporter address the datagram arrived from.
    pub agent_addr: IpAddr,
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    /// Next-hop router address.
    pub gateway_addr: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub packets: u64,
    pub octets: u64,
    pub if_index_in: u16,
    pub if_index_out: u16,
    /// Exporter uptime at export, milliseconds.
    pub sys_uptime_ms: u32,
    /// Exporter wall clock at export.
    pub agent_secs: u32,
    pub agent_nsecs: u32,
    /// NetFlow version the record was decoded from.
    pub netflow_version: u16,
    /// Uptime at the first packet of the flow, milliseconds.
    pub flow_start: u32,
    /// Uptime at the last packet of the flow, milliseconds.
    pub flow_finish: u32,
    pub src_as: u16,
    pub dst_as: u16,
    pub src_mask_len: u8,
    pub dst_mask_len: u8,
    pub engine_type: u8,
    pub engine_id: u8,
    pub flow_sequence: u32,
}

impl Default for FlowRecord {
    fn default() -> Self {
        let unspecified = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        FlowRecord {
            fields: FieldMask::empty(),
            tag: 0,
            recv_secs: 0,
            proto: 0,
            tcp_flags: 0,
            tos: 0,
            agent_addr: unspecified,
            src_addr: unspecified,
            dst_addr: unspecified,
            gateway_addr: unspecified,
            src_port: 0,
            dst_port: 0,
            packets: 0,
            octets: 0,
            if_index_in: 0,
            if_index_out: 0,
            sys_uptime_ms: 0,
            agent_secs: 0,
            agent_nsecs: 0,
            netflow_version: 0,
            flow_start: 0,
            flow_finish: 0,
            src_as: 0,
            dst_as: 0,
            src_mask_len: 0,
            dst_mask_len: 0,
            engine_type: 0,
            engine_id: 0,
            flow_sequence: 0,
        }
    }
}

impl FlowRecord {
    /// True when source and destination share an address family.
    ///
    /// Mixed-family records never reach the log.
    pub fn family_consistent(&self) -> bool {
        same_family(&self.src_addr, &self.dst_addr)
    }

    /// Marks the record as tagged by the filter.
    pub fn set_tag(&mut self, tag: u32) {
        self.tag = tag;
        self.fields |= FieldMask::TAG;
    }
}

impl fmt::Display for FlowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} agent [{}] [{}]:{} -> [{}]:{} proto {} packets {} octets {} tag {}",
            self.netflow_version,
            self.agent_addr,
            self.src_addr,
            self.src_port,
            self.dst_addr,
            self.dst_port,
            self.proto,
            self.packets,
            self.octets,
            self.tag,
        )
    }
}
