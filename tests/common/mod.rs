//! Hand-built NetFlow datagrams shared by the integration tests.

#![allow(dead_code)]

/// v1 header (16 bytes) declaring `count` flows.
pub fn v1_header(count: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&count.to_be_bytes());
    data.extend_from_slice(&1000u32.to_be_bytes()); // sys_uptime
    data.extend_from_slice(&1_700_000_000u32.to_be_bytes()); // unix_secs
    data.extend_from_slice(&0u32.to_be_bytes()); // unix_nsecs
    data
}

/// v1 record (48 bytes); `seed` varies the source port.
pub fn v1_record(seed: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[10, 0, 0, 1]); // src
    data.extend_from_slice(&[10, 0, 0, 2]); // dst
    data.extend_from_slice(&[10, 0, 0, 254]); // next hop
    data.extend_from_slice(&1u16.to_be_bytes()); // input
    data.extend_from_slice(&2u16.to_be_bytes()); // output
    data.extend_from_slice(&5u32.to_be_bytes()); // packets
    data.extend_from_slice(&640u32.to_be_bytes()); // octets
    data.extend_from_slice(&100u32.to_be_bytes()); // first
    data.extend_from_slice(&200u32.to_be_bytes()); // last
    data.extend_from_slice(&seed.to_be_bytes()); // src port
    data.extend_from_slice(&80u16.to_be_bytes()); // dst port
    data.extend_from_slice(&0u16.to_be_bytes()); // pad1
    data.push(6); // proto
    data.push(0); // tos
    data.push(0x02); // tcp flags
    data.push(0); // pad2
    data.extend_from_slice(&0u16.to_be_bytes()); // pad3
    data.extend_from_slice(&0u32.to_be_bytes()); // reserved
    data
}

pub fn v1_packet(count: u16) -> Vec<u8> {
    let mut data = v1_header(count);
    for i in 0..count {
        data.extend_from_slice(&v1_record(1000 + i));
    }
    data
}

/// v5 header (24 bytes) declaring `count` flows.
pub fn v5_header(count: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&5u16.to_be_bytes());
    data.extend_from_slice(&count.to_be_bytes());
    data.extend_from_slice(&5000u32.to_be_bytes()); // sys_uptime
    data.extend_from_slice(&1_700_000_000u32.to_be_bytes()); // unix_secs
    data.extend_from_slice(&0u32.to_be_bytes()); // unix_nsecs
    data.extend_from_slice(&77u32.to_be_bytes()); // flow_sequence
    data.push(0); // engine_type
    data.push(0); // engine_id
    data.extend_from_slice(&0u16.to_be_bytes()); // sampling_interval
    data
}

/// v5 record (48 bytes); `seed` varies the source port.
pub fn v5_record(seed: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[172, 16, 0, 1]); // src
    data.extend_from_slice(&[172, 16, 0, 2]); // dst
    data.extend_from_slice(&[172, 16, 0, 254]); // next hop
    data.extend_from_slice(&3u16.to_be_bytes()); // input
    data.extend_from_slice(&4u16.to_be_bytes()); // output
    data.extend_from_slice(&9u32.to_be_bytes()); // packets
    data.extend_from_slice(&1500u32.to_be_bytes()); // octets
    data.extend_from_slice(&10u32.to_be_bytes()); // first
    data.extend_from_slice(&90u32.to_be_bytes()); // last
    data.extend_from_slice(&seed.to_be_bytes()); // src port
    data.extend_from_slice(&443u16.to_be_bytes()); // dst port
    data.push(0); // pad1
    data.push(0x18); // tcp flags
    data.push(6); // proto
    data.push(0); // tos
    data.extend_from_slice(&64500u16.to_be_bytes()); // src_as
    data.extend_from_slice(&64501u16.to_be_bytes()); // dst_as
    data.push(24); // src_mask
    data.push(24); // dst_mask
    data.extend_from_slice(&0u16.to_be_bytes()); // pad2
    data
}

pub fn v5_packet(count: u16) -> Vec<u8> {
    let mut data = v5_header(count);
    for i in 0..count {
        data.extend_from_slice(&v5_record(2000 + i));
    }
    data
}

/// v7 header (24 bytes) declaring `count` flows.
pub fn v7_header(count: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&7u16.to_be_bytes());
    data.extend_from_slice(&count.to_be_bytes());
    data.extend_from_slice(&9000u32.to_be_bytes()); // sys_uptime
    data.extend_from_slice(&1_700_000_000u32.to_be_bytes()); // unix_secs
    data.extend_from_slice(&0u32.to_be_bytes()); // unix_nsecs
    data.extend_from_slice(&31337u32.to_be_bytes()); // flow_sequence
    data.extend_from_slice(&0u32.to_be_bytes()); // reserved
    data
}

/// v7 record (52 bytes); `seed` varies the source port.
pub fn v7_record(seed: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[192, 168, 0, 1]); // src
    data.extend_from_slice(&[192, 168, 0, 2]); // dst
    data.extend_from_slice(&[0, 0, 0, 0]); // next hop
    data.extend_from_slice(&1u16.to_be_bytes()); // input
    data.extend_from_slice(&2u16.to_be_bytes()); // output
    data.extend_from_slice(&2u32.to_be_bytes()); // packets
    data.extend_from_slice(&128u32.to_be_bytes()); // octets
    data.extend_from_slice(&5u32.to_be_bytes()); // first
    data.extend_from_slice(&6u32.to_be_bytes()); // last
    data.extend_from_slice(&seed.to_be_bytes()); // src port
    data.extend_from_slice(&53u16.to_be_bytes()); // dst port
    data.push(0); // flags_valid
    data.push(0); // tcp flags
    data.push(17); // proto
    data.push(0); // tos
    data.extend_from_slice(&0u16.to_be_bytes()); // src_as
    data.extend_from_slice(&0u16.to_be_bytes()); // dst_as
    data.push(0); // src_mask
    data.push(0); // dst_mask
    data.extend_from_slice(&0u16.to_be_bytes()); // flags_invalid
    data.extend_from_slice(&[192, 168, 0, 254]); // router_src
    data
}

pub fn v7_packet(count: u16) -> Vec<u8> {
    let mut data = v7_header(count);
    for i in 0..count {
        data.extend_from_slice(&v7_record(3000 + i));
    }
    data
}
