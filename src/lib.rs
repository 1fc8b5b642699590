//! Userspace client for an AOP QMP mailbox link.
//!
//! The firmware controller exposes a fixed-depth queue of 96-byte packets;
//! this crate forwards short ASCII command strings to it, either from a
//! write-only control node or from in-process callers pinning the DDR
//! clock. Send paths never surface errors to the writer - failures go to
//! the log, matching the engineering-control role of the channel.

pub mod client;
pub mod ddr;
pub mod service;
pub mod transport;

pub use client::{AopQmpClient, TX_QUEUE_DEPTH};
pub use ddr::{ddr_index_for, DdrConfig, DDR_CONFIGS, DDR_CONFIG_SIZE};
pub use service::{probe, AopQmpService, ServiceConfig};
pub use transport::{
    Mailbox, MailboxConfig, MailboxReceiver, MailboxRegion, DEFAULT_RING_DEPTH, MAX_MSG_SIZE,
};
