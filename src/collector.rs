//! The receive loop and its control plane.
//!
//! One cooperative task owns everything: the listen sockets, the peer
//! registry, and the open flow log. Each wake-up handles at most one
//! datagram, after first observing the control flags, so a signal is acted
//! on within one loop iteration even under sustained traffic. Signal
//! handlers themselves only set a flag and ring the notifier; all real work
//! happens here.

use crate::config::Config;
use crate::decode::decode_datagram;
use crate::filter::{self, Verdict, evaluate};
use crate::flow::{FieldMask, FlowRecord};
use crate::monitor::Monitor;
use crate::peers::PeerTable;
use crate::store::{FlowLog, StoreError};

use anyhow::{Context, Result, bail};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::task::Poll;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::ReadBuf;
use tokio::net::UdpSocket;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Largest UDP payload we will ever be handed.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// The four control-plane requests, set from signal context and consumed by
/// the loop.
///
/// Writers only store into one atomic and ring `wakeup`; they never touch
/// compound state. The loop reads-and-clears at the top of each iteration.
#[derive(Debug, Default)]
pub struct ControlFlags {
    /// Signal number requesting exit, 0 when unset. Last writer wins.
    exit_signal: AtomicI32,
    reopen: AtomicBool,
    reconf: AtomicBool,
    info: AtomicBool,
    wakeup: Notify,
}

impl ControlFlags {
    pub fn new() -> Self {
        ControlFlags::default()
    }

    pub fn request_exit(&self, signal: i32) {
        self.exit_signal.store(signal, Ordering::Relaxed);
        self.wakeup.notify_one();
    }

    pub fn request_reopen(&self) {
        self.reopen.store(true, Ordering::Relaxed);
        self.wakeup.notify_one();
    }

    pub fn request_reconf(&self) {
        self.reconf.store(true, Ordering::Relaxed);
        self.wakeup.notify_one();
    }

    pub fn request_info(&self) {
        self.info.store(true, Ordering::Relaxed);
        self.wakeup.notify_one();
    }

    fn take_exit(&self) -> Option<i32> {
        match self.exit_signal.swap(0, Ordering::Relaxed) {
            0 => None,
            signal => Some(signal),
        }
    }

    fn take_reopen(&self) -> bool {
        self.reopen.swap(false, Ordering::Relaxed)
    }

    fn take_reconf(&self) -> bool {
        self.reconf.swap(false, Ordering::Relaxed)
    }

    fn take_info(&self) -> bool {
        self.info.swap(false, Ordering::Relaxed)
    }

    async fn wait(&self) {
        self.wakeup.notified().await;
    }
}

#[derive(Clone, Copy)]
enum Request {
    Exit,
    Reopen,
    Reconf,
    Info,
}

/// Spawns one task per handled signal. INT and TERM request exit, HUP
/// reconfiguration, USR1 a log reopen, USR2 a state dump.
pub fn install_signal_handlers(flags: &Arc<ControlFlags>) -> std::io::Result<()> {
    let handled = [
        (SignalKind::interrupt(), Request::Exit),
        (SignalKind::terminate(), Request::Exit),
        (SignalKind::hangup(), Request::Reconf),
        (SignalKind::user_defined1(), Request::Reopen),
        (SignalKind::user_defined2(), Request::Info),
    ];
    for (kind, request) in handled {
        let mut stream = signal(kind)?;
        let flags = Arc::clone(flags);
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                match request {
                    Request::Exit => flags.request_exit(kind.as_raw_value()),
                    Request::Reopen => flags.request_reopen(),
                    Request::Reconf => flags.request_reconf(),
                    Request::Info => flags.request_info(),
                }
            }
        });
    }
    Ok(())
}

enum Event {
    Wakeup,
    HelperClosed,
    Datagram { len: usize, from: SocketAddr },
}

/// The collector: sockets, peers, filter, and log, driven by one loop.
pub struct Collector<M> {
    monitor: M,
    config: Config,
    store_mask: FieldMask,
    sockets: Vec<UdpSocket>,
    peers: PeerTable,
    log: Option<FlowLog>,
    flags: Arc<ControlFlags>,
    verbose: bool,
}

impl<M: Monitor> Collector<M> {
    pub fn new(config: Config, monitor: M, verbose: bool) -> Result<Self> {
        let store_mask = config.store_mask()?;
        Ok(Collector {
            monitor,
            peers: PeerTable::new(config.max_peers),
            store_mask,
            config,
            sockets: Vec::new(),
            log: None,
            flags: Arc::new(ControlFlags::new()),
            verbose,
        })
    }

    pub fn control_flags(&self) -> Arc<ControlFlags> {
        Arc::clone(&self.flags)
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Runs until an exit request or helper closure. Anything the daemon
    /// cannot absorb locally (bind failure, log header mismatch, write
    /// failure, reconfiguration failure) returns an error here and exits
    /// the process.
    pub async fn run(mut self) -> Result<()> {
        install_signal_handlers(&self.flags).context("installing signal handlers")?;
        if self.sockets.is_empty() {
            self.bind_listeners().await?;
        }
        self.open_log()?;
        info!("collector running");

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let event = tokio::select! {
                biased;
                _ = self.flags.wait() => Event::Wakeup,
                _ = self.monitor.closed() => Event::HelperClosed,
                result = recv_next(&self.sockets, &mut buf) => {
                    let (len, from) = result.context("waiting for datagrams")?;
                    Event::Datagram { len, from }
                }
            };

            // Flags first, so a signal never waits behind traffic.
            if let Some(signal) = self.flags.take_exit() {
                info!(signal, "exit requested");
                break;
            }
            if self.flags.take_reconf() {
                self.reconfigure().await?;
            }
            if self.flags.take_reopen() {
                self.reopen_log()?;
            }
            if self.flags.take_info() {
                self.dump_state();
            }

            match event {
                Event::HelperClosed => {
                    info!("control channel closed, exiting");
                    break;
                }
                Event::Datagram { len, from } => {
                    self.process_datagram(&buf[..len], from.ip())?;
                }
                Event::Wakeup => {}
            }
        }
        Ok(())
    }

    /// Binds the configured listener set, replacing whatever was bound.
    pub async fn bind_listeners(&mut self) -> Result<()> {
        self.sockets.clear();
        for listen in &self.config.listen {
            let socket = UdpSocket::bind(listen.socket_addr())
                .await
                .with_context(|| format!("binding {}", listen.socket_addr()))?;
            info!(listener = %listen.socket_addr(), "listening");
            self.sockets.push(socket);
        }
        Ok(())
    }

    /// Local addresses of the bound listeners, in vector order.
    pub fn local_addrs(&self) -> std::io::Result<Vec<SocketAddr>> {
        self.sockets.iter().map(|socket| socket.local_addr()).collect()
    }

    /// Obtains a log handle through the helper boundary and runs the
    /// header-write-or-verify protocol on it. No-op while a log is open.
    pub fn open_log(&mut self) -> Result<()> {
        if self.log.is_some() {
            return Ok(());
        }
        let file = self.monitor.open_log()?;
        let log = FlowLog::attach(file).context("attaching flow log")?;
        info!(logfile = %self.config.logfile.display(), "flow log open");
        self.log = Some(log);
        Ok(())
    }

    /// Closes and reattaches the log; the next append goes to the fresh
    /// handle.
    pub fn reopen_log(&mut self) -> Result<()> {
        self.log = None;
        self.open_log()
    }

    async fn reconfigure(&mut self) -> Result<()> {
        info!("reconfigure requested");
        let config = self.monitor.reconfigure().context("reconfiguring")?;
        self.store_mask = config.store_mask()?;
        self.peers.set_max(config.max_peers);
        self.config = config;
        self.reopen_log()?;
        self.bind_listeners().await?;
        Ok(())
    }

    /// Runs one datagram through decode, filter, and store.
    pub fn process_datagram(&mut self, data: &[u8], from: IpAddr) -> Result<()> {
        if self.peers.find(&from).is_none() {
            self.peers.insert(from);
            debug!(peer = %from, "new peer");
        }

        let recv_secs = epoch_secs_now();
        match decode_datagram(data, from, recv_secs) {
            Ok(flows) => {
                let version = u16::from_be_bytes([data[0], data[1]]);
                self.peers.touch(&from, flows.len() as u64, version);
                for mut flow in flows {
                    match evaluate(&flow, &self.config.filters) {
                        Verdict::Discard => continue,
                        Verdict::Accept { tag } => {
                            if let Some(tag) = tag {
                                flow.set_tag(tag);
                            }
                            self.append_flow(&flow)?;
                        }
                    }
                }
            }
            Err(err) if err.is_unsupported_version() => {
                info!(peer = %from, %err, "ignoring datagram");
            }
            Err(err) => {
                self.peers.note_invalid(&from);
                warn!(peer = %from, %err, "rejecting datagram");
            }
        }
        Ok(())
    }

    /// Appends one filtered flow to the log. Mixed-family flows are dropped
    /// with a warning; real write failures are fatal.
    pub fn append_flow(&mut self, flow: &FlowRecord) -> Result<()> {
        let Some(log) = self.log.as_mut() else {
            bail!("flow log is not open");
        };
        match log.append(flow, self.store_mask) {
            Ok(_) => {
                if self.verbose {
                    debug!(%flow, "stored");
                }
                Ok(())
            }
            Err(StoreError::MixedAddressFamily) => {
                warn!(%flow, "dropping mixed address family flow");
                Ok(())
            }
            // TODO: reopen the log and retry once before giving up; needs a
            // consecutive-failure counter on the writer so a dead disk still
            // exits.
            Err(err) => Err(err).context("writing flow log"),
        }
    }

    /// Dumps the filter rules and the peer registry to the log sink.
    pub fn dump_state(&self) {
        filter::dump(&self.config.filters);
        self.peers.dump();
    }
}

/// Waits for one datagram across all sockets, polled in vector order.
///
/// With no listeners configured this pends forever, leaving the loop to the
/// control plane.
async fn recv_next(sockets: &[UdpSocket], buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
    if sockets.is_empty() {
        return std::future::pending().await;
    }
    std::future::poll_fn(|cx| {
        for socket in sockets {
            let mut read_buf = ReadBuf::new(buf);
            match socket.poll_recv_from(cx, &mut read_buf) {
                Poll::Ready(Ok(from)) => {
                    return Poll::Ready(Ok((read_buf.filled().len(), from)));
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => {}
            }
        }
        Poll::Pending
    })
    .await
}

fn epoch_secs_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}
