//! Registration and lifecycle glue: acquire the mailbox channel, expose the
//! write-only control node, and pump node writes into the client.
//!
//! The control node is a bound Unix datagram socket, mode 0220. Each
//! datagram is one message, and the writer's send succeeds regardless of
//! what happens downstream - the same observe-it-in-the-log contract the
//! send paths have.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info};

use crate::client::{AopQmpClient, TX_QUEUE_DEPTH};
use crate::transport::{MailboxConfig, MailboxRegion, DEFAULT_RING_DEPTH};

/// Channel index of the AOP outbound queue within the mailbox region.
const AOP_CHANNEL: usize = 0;

/// Receive buffer for the node. Larger than the message ceiling so
/// oversized writes arrive intact and get dropped by the client instead of
/// being silently truncated into something valid.
const NODE_RECV_MAX: usize = 256;

/// How often the worker wakes to check for shutdown.
const NODE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Service configuration, builder-style. Defaults: blocking sends with a
/// 1000 ms transmit timeout, channel 0, a node named `aop_send_message`.
pub struct ServiceConfig {
    region_name: String,
    node_path: PathBuf,
    queue_depth: usize,
    ring_depth: usize,
    mailbox: MailboxConfig,
    create_region: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            region_name: "aop_qmp".to_string(),
            node_path: PathBuf::from("/run/aop_send_message"),
            queue_depth: TX_QUEUE_DEPTH,
            ring_depth: DEFAULT_RING_DEPTH,
            mailbox: MailboxConfig::default(),
            create_region: false,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the shared mailbox region under /dev/shm.
    pub fn with_region_name(mut self, name: &str) -> Self {
        self.region_name = name.to_string();
        self
    }

    /// Filesystem path of the control node.
    pub fn with_node_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.node_path = path.as_ref().to_path_buf();
        self
    }

    /// Client-side slot ring depth.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Transport ring depth (power of two); only used when creating the
    /// region.
    pub fn with_ring_depth(mut self, depth: usize) -> Self {
        self.ring_depth = depth;
        self
    }

    /// Transmit timeout for blocking sends.
    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.mailbox.tx_timeout = timeout;
        self
    }

    /// Create the mailbox region instead of attaching to one the firmware
    /// side already set up.
    pub fn with_create_region(mut self, create: bool) -> Self {
        self.create_region = create;
        self
    }

    pub fn probe(self) -> io::Result<AopQmpService> {
        probe(self)
    }
}

/// A running AOP QMP service: the client plus the node worker.
///
/// `Drop` stops the worker and removes the node so daemons and tests exit
/// cleanly.
#[derive(Debug)]
pub struct AopQmpService {
    client: Arc<AopQmpClient>,
    node_path: PathBuf,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

/// Bring the service up: acquire channel 0, create the control node, start
/// the forwarding worker.
///
/// Failure to reach the mailbox region or its channel aborts the probe;
/// failure to create the node releases the channel (via drop) and aborts.
pub fn probe(conf: ServiceConfig) -> io::Result<AopQmpService> {
    let region = if conf.create_region {
        MailboxRegion::create(&conf.region_name, conf.ring_depth)?
    } else {
        MailboxRegion::attach(&conf.region_name)?
    };

    let chan = region.request_channel(AOP_CHANNEL, conf.mailbox)?;
    let client = Arc::new(AopQmpClient::with_depth(Arc::new(chan), conf.queue_depth));

    // On bind failure the channel handle drops here, releasing it.
    let node = bind_node(&conf.node_path)?;

    let stop = Arc::new(AtomicBool::new(false));
    let worker = {
        let client = client.clone();
        let stop = stop.clone();
        thread::Builder::new()
            .name("aop-qmp-node".to_string())
            .spawn(move || node_worker(node, client, stop))?
    };

    info!(
        "aop qmp client up: node {}, region {}",
        conf.node_path.display(),
        conf.region_name
    );

    Ok(AopQmpService {
        client,
        node_path: conf.node_path,
        stop,
        worker: Some(worker),
    })
}

/// Create the write-only control node.
fn bind_node(path: &Path) -> io::Result<UnixDatagram> {
    // Clear a stale node from a previous run.
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let node = UnixDatagram::bind(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("failed to create control node at {}: {}", path.display(), e),
        )
    })?;

    // Write-only for owner and group; the node is a command sink.
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "node path contains NUL"))?;
    if unsafe { libc::chmod(c_path.as_ptr(), 0o220) } != 0 {
        return Err(io::Error::last_os_error());
    }

    node.set_read_timeout(Some(NODE_POLL_INTERVAL))?;
    Ok(node)
}

/// Pump datagrams from the node into the client until told to stop.
fn node_worker(node: UnixDatagram, client: Arc<AopQmpClient>, stop: Arc<AtomicBool>) {
    let mut buf = [0u8; NODE_RECV_MAX];

    while !stop.load(Ordering::Relaxed) {
        match node.recv(&mut buf) {
            Ok(len) => {
                // One datagram is one message. The client enforces the
                // size limits and owns all failure logging.
                client.send_msg(&buf[..len]);
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => {
                // A failed read costs only that message; keep serving.
                error!("control node receive failed: {}", e);
            }
        }
    }
}

impl AopQmpService {
    /// The client handle, for in-process callers (DDR frequency requests).
    pub fn client(&self) -> &Arc<AopQmpClient> {
        &self.client
    }

    /// Path of the control node.
    pub fn node_path(&self) -> &Path {
        &self.node_path
    }
}

impl Drop for AopQmpService {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        let _ = std::fs::remove_file(&self.node_path);
    }
}
