use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// Magic number identifying a mapped region as an AOP QMP mailbox. "AOPQMBX1".
pub const REGION_MAGIC: u64 = 0x414F_5051_4D42_5831;

/// Layout version, bumped on any incompatible change to these structs.
pub const REGION_VERSION: u32 = 1;

/// Number of channel descriptors carried in the region header. The AOP
/// firmware exposes a single outbound queue, but the descriptor table is
/// sized for the controller's full complement of links.
pub const MAX_CHANNELS: usize = 4;

/// Largest message payload in bytes, imposed by the remote firmware.
pub const MAX_MSG_SIZE: usize = 96;

/// One packet slot in a channel's ring band.
///
/// This struct is the actual data layout in shared memory and is
/// `#[repr(C)]` so both endpoints agree on it.
#[repr(C, align(64))]
pub struct PktSlot {
    /// Sequence word driving the slot handoff:
    /// - a sender claims tail `t` and waits for `sequence == t`,
    /// - after writing it stores `t + 1` to publish,
    /// - the receiver waits for `head + 1`, and on consume stores
    ///   `head + depth` to recycle the slot.
    pub sequence: AtomicU64,

    /// Transmit length in bytes. Always a multiple of 4; the controller
    /// rejects unaligned sizes.
    pub size: u32,

    /// Message bytes plus one sentinel byte, zero-filled past `size`.
    pub data: [u8; MAX_MSG_SIZE + 1],
}

/// Descriptor for one mailbox channel, held in the region header.
///
/// The atomic cursors and futex words for a channel live here, in the
/// control area, keeping them off the data bands.
#[repr(C, align(128))]
pub struct ChannelEntry {
    /// Channel index within the region.
    pub channel_id: u32,

    /// 1 while a sender holds this channel, 0 otherwise. Channels are
    /// exclusive; see `MailboxRegion::request_channel`.
    pub in_use: AtomicU32,

    /// Ring depth in slots. Power of two.
    pub depth: u64,

    /// Byte offset from the start of the region to this channel's band.
    pub band_offset: u64,

    /// Doorbell futex word. Senders bump and wake after publishing;
    /// the firmware side waits on it when the ring is empty.
    pub doorbell: AtomicU32,

    /// Space futex word. The firmware side bumps and wakes after
    /// consuming a slot; blocked senders wait on it when the ring is full.
    pub space: AtomicU32,

    /// Sender cursor, atomically incremented to claim a slot.
    /// Padded to keep it off neighboring descriptors' cache lines.
    pub tail: CachePadded<AtomicU64>,

    /// Receiver cursor, atomically incremented to claim a message.
    pub head: CachePadded<AtomicU64>,
}

/// Header at the very start of the shared region: identification plus the
/// channel descriptor table. Bands for each channel follow it.
#[repr(C, align(128))]
pub struct RegionHeader {
    pub magic: u64,
    pub version: u32,
    pub max_channels: u32,
    pub channel_count: u32,
    pub reserved: u32,
    pub channels: [ChannelEntry; MAX_CHANNELS],
}
