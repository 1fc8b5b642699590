use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use super::layout::MAX_MSG_SIZE;
use super::ring::MailboxRing;
use super::shmem::ShmRegion;
use super::{Mailbox, MailboxConfig};

/// Exclusive sender handle for one mailbox channel.
///
/// Submission is synchronous: with `tx_block` set (the default), a full
/// ring blocks the caller until the firmware frees a slot or the configured
/// timeout elapses. There is no retry beyond that.
#[derive(Debug)]
pub struct MailboxChannel {
    _shm: Arc<ShmRegion>,
    ring: MailboxRing,
    conf: MailboxConfig,
}

impl MailboxChannel {
    pub(crate) fn new(shm: Arc<ShmRegion>, ring: MailboxRing, conf: MailboxConfig) -> Self {
        Self {
            _shm: shm,
            ring,
            conf,
        }
    }

    pub fn config(&self) -> &MailboxConfig {
        &self.conf
    }
}

impl Mailbox for MailboxChannel {
    fn submit(&self, msg: &[u8]) -> io::Result<()> {
        if msg.is_empty() || msg.len() > MAX_MSG_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("packet size {} outside 1..={}", msg.len(), MAX_MSG_SIZE),
            ));
        }

        if self.ring.enqueue(msg).is_some() {
            self.ring.ring_doorbell();
            return Ok(());
        }

        if !self.conf.tx_block {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "mailbox ring full",
            ));
        }

        let deadline = Instant::now() + self.conf.tx_timeout;
        loop {
            let seen = self.ring.space_epoch();

            // Re-check after reading the epoch so a wakeup between the
            // failed enqueue and the wait is not lost.
            if self.ring.enqueue(msg).is_some() {
                self.ring.ring_doorbell();
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("mailbox send timed out after {:?}", self.conf.tx_timeout),
                ));
            }
            self.ring.wait_for_space(seen, deadline - now);
        }
    }
}

impl Drop for MailboxChannel {
    fn drop(&mut self) {
        // Release the channel for the next sender.
        unsafe {
            (*self.ring.entry).in_use.store(0, Ordering::Release);
        }
    }
}
