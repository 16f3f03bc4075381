//! Per-exporter bookkeeping.
//!
//! Every address that ever sends us a datagram gets a [`Peer`] entry. The
//! registry is bounded: when a new exporter would exceed `max_peers`, the
//! least recently active peer is evicted and counted in `num_forced`. A
//! single [`LruCache`] is both the lookup index and the recency order, so
//! there is exactly one owner of each peer.

use lru::LruCache;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// One NetFlow exporter, keyed by the source address of its datagrams.
#[derive(Debug, Clone)]
pub struct Peer {
    pub from: IpAddr,
    /// Valid packets received.
    pub npackets: u64,
    /// Flows extracted from valid packets.
    pub nflows: u64,
    /// Malformed packets rejected.
    pub ninvalid: u64,
    pub firstseen: SystemTime,
    /// Wall clock of the most recent valid packet; `None` until one arrives.
    pub lastvalid: Option<SystemTime>,
    /// NetFlow version of the most recent valid packet.
    pub last_version: u16,
}

impl Peer {
    fn new(from: IpAddr) -> Self {
        Peer {
            from,
            npackets: 0,
            nflows: 0,
            ninvalid: 0,
            firstseen: SystemTime::now(),
            lastvalid: None,
            last_version: 0,
        }
    }
}

/// Bounded registry of exporters with LRU eviction under overflow.
#[derive(Debug)]
pub struct PeerTable {
    peers: LruCache<IpAddr, Peer>,
    num_forced: u64,
}

impl PeerTable {
    pub fn new(max_peers: usize) -> Self {
        let cap = NonZeroUsize::new(max_peers.max(1)).expect("nonzero peer bound");
        PeerTable {
            peers: LruCache::new(cap),
            num_forced: 0,
        }
    }

    pub fn num_peers(&self) -> usize {
        self.peers.len()
    }

    pub fn max_peers(&self) -> usize {
        self.peers.cap().get()
    }

    /// Evictions forced by the peer bound so far. Monotonic.
    pub fn num_forced(&self) -> u64 {
        self.num_forced
    }

    /// Looks up a peer without disturbing the recency order.
    pub fn find(&mut self, addr: &IpAddr) -> Option<&mut Peer> {
        self.peers.peek_mut(addr)
    }

    /// Read-only lookup; does not disturb the recency order either.
    pub fn get(&self, addr: &IpAddr) -> Option<&Peer> {
        self.peers.peek(addr)
    }

    /// Inserts a fresh peer for `addr`, evicting the least recently active
    /// peer first if the table is full. `addr` must not already be present.
    pub fn insert(&mut self, addr: IpAddr) -> &mut Peer {
        debug_assert!(self.peers.peek(&addr).is_none());
        self.evict_down_to(self.max_peers().saturating_sub(1));
        self.peers.put(addr, Peer::new(addr));
        self.peers.peek_mut(&addr).expect("peer just inserted")
    }

    /// Records a valid packet: promotes the peer to the recency head and
    /// updates its counters.
    pub fn touch(&mut self, addr: &IpAddr, nflows: u64, version: u16) {
        if let Some(peer) = self.peers.get_mut(addr) {
            peer.npackets += 1;
            peer.nflows += nflows;
            peer.lastvalid = Some(SystemTime::now());
            peer.last_version = version;
        }
    }

    /// Records a malformed packet. Does not change the recency order.
    pub fn note_invalid(&mut self, addr: &IpAddr) {
        if let Some(peer) = self.peers.peek_mut(addr) {
            peer.ninvalid += 1;
        }
    }

    /// Changes the peer bound, evicting LRU-first if the table shrinks.
    pub fn set_max(&mut self, max_peers: usize) {
        let cap = NonZeroUsize::new(max_peers.max(1)).expect("nonzero peer bound");
        self.evict_down_to(cap.get());
        self.peers.resize(cap);
    }

    fn evict_down_to(&mut self, len: usize) {
        while self.peers.len() > len {
            if let Some((evicted, peer)) = self.peers.pop_lru() {
                self.num_forced += 1;
                warn!(
                    peer = %evicted,
                    npackets = peer.npackets,
                    nflows = peer.nflows,
                    "peer limit reached, evicting least recently active peer"
                );
            }
        }
    }

    /// All peers in key order (family first, then address bytes).
    pub fn sorted(&self) -> Vec<(&IpAddr, &Peer)> {
        let mut entries: Vec<(&IpAddr, &Peer)> = self.peers.iter().collect();
        entries.sort_by_key(|(addr, _)| *addr);
        entries
    }

    /// Emits one summary line per peer in key order plus an aggregate line.
    pub fn dump(&self) {
        for (addr, peer) in self.sorted() {
            info!(
                peer = %addr,
                npackets = peer.npackets,
                nflows = peer.nflows,
                ninvalid = peer.ninvalid,
                last_version = peer.last_version,
                firstseen = epoch_secs(peer.firstseen),
                lastvalid = peer.lastvalid.map(epoch_secs),
                "peer"
            );
        }
        info!(
            num_peers = self.num_peers(),
            max_peers = self.max_peers(),
            num_forced = self.num_forced,
            "peer registry"
        );
    }
}

fn epoch_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
