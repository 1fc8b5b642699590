use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ring::MailboxRing;
use super::shmem::ShmRegion;

/// Firmware-side view of a mailbox channel: drains packets that clients
/// submitted. Stands in for the remote controller in tests and in the
/// firmware simulator binary.
pub struct MailboxReceiver {
    _shm: Arc<ShmRegion>,
    ring: MailboxRing,
}

impl MailboxReceiver {
    pub(crate) fn new(shm: Arc<ShmRegion>, ring: MailboxRing) -> Self {
        Self { _shm: shm, ring }
    }

    /// Take one packet if one is pending.
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.ring.dequeue()
    }

    /// Take one packet, waiting on the doorbell up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(msg) = self.ring.dequeue() {
                return Ok(msg);
            }

            let seen = self.ring.doorbell_epoch();

            // Re-check after reading the epoch so a doorbell rung between
            // the miss and the wait is not lost.
            if let Some(msg) = self.ring.dequeue() {
                return Ok(msg);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "no mailbox packet within timeout",
                ));
            }
            self.ring.wait_for_doorbell(seen, deadline - now);
        }
    }
}
