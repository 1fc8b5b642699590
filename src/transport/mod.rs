// The mailbox transport: a shared-memory message ring the AOP firmware
// side drains. The client code above this module only sees the `Mailbox`
// trait and treats submission failures as log-only events.

pub mod channel;
pub mod futex;
pub mod layout;
pub mod receiver;
pub mod region;
pub mod ring;
pub mod shmem;

pub use channel::MailboxChannel;
pub use layout::MAX_MSG_SIZE;
pub use receiver::MailboxReceiver;
pub use region::{MailboxRegion, DEFAULT_RING_DEPTH};

use std::io;
use std::time::Duration;

/// Outbound mailbox link, as seen by the client.
///
/// One operation: hand the controller a 4-byte-aligned packet. The call is
/// synchronous and may block up to the channel's configured timeout while
/// the remote drains the ring. No retries happen at this layer.
pub trait Mailbox: Send + Sync {
    fn submit(&self, msg: &[u8]) -> io::Result<()>;
}

/// Send-side channel configuration, mirroring a mailbox client descriptor:
/// blocking sends with a fixed transmit timeout.
#[derive(Debug, Clone, Copy)]
pub struct MailboxConfig {
    /// Block when the ring is full instead of failing immediately.
    pub tx_block: bool,

    /// How long a blocking send waits for the remote before giving up.
    pub tx_timeout: Duration,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            tx_block: true,
            tx_timeout: Duration::from_millis(1000),
        }
    }
}
