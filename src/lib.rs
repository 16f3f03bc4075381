#![doc = include_str!("../README.md")]

pub mod addr;
pub mod collector;
pub mod config;
pub mod decode;
pub mod filter;
pub mod flow;
pub mod monitor;
pub mod peers;
pub mod store;

pub use collector::{Collector, ControlFlags};
pub use config::Config;
pub use decode::{DecodeError, decode_datagram};
pub use filter::{FilterRule, Verdict, evaluate};
pub use flow::{FieldMask, FlowRecord};
pub use monitor::{DirectMonitor, Monitor};
pub use peers::{Peer, PeerTable};
pub use store::{FlowLog, StoreError};
