//! The AOP QMP client proper: a fixed ring of pre-allocated message slots
//! and the two send paths (free-form messages and DDR frequency requests),
//! serialized by one lock.

use std::sync::Arc;

use log::{error, warn};
use parking_lot::Mutex;

use crate::ddr::{ddr_index_for, DDR_CONFIGS};
use crate::transport::{Mailbox, MAX_MSG_SIZE};

/// Slots in the transmit ring, matching the mailbox framework's TX queue
/// length. Each slot is reused round-robin, so its contents are only valid
/// until the ring wraps back to it.
pub const TX_QUEUE_DEPTH: usize = 20;

/// One pre-allocated message slot: 96 payload bytes plus a sentinel, and
/// the 4-byte-rounded transmit size.
struct MsgSlot {
    buf: [u8; MAX_MSG_SIZE + 1],
    size: usize,
}

impl MsgSlot {
    const fn new() -> Self {
        Self {
            buf: [0; MAX_MSG_SIZE + 1],
            size: 0,
        }
    }
}

/// Round a payload length up to the controller's 4-byte alignment.
#[inline]
pub(crate) fn round_up4(len: usize) -> usize {
    (len + 3) & !3
}

/// Everything the lock guards: the slot ring, its cursor, the dedicated
/// DDR slot, and the channel handle itself. Holding all of it behind one
/// mutex keeps submissions strictly one at a time.
struct ClientState {
    chan: Arc<dyn Mailbox>,
    slots: Vec<MsgSlot>,
    cursor: usize,
    ddr_slot: MsgSlot,
}

/// Client for the AOP QMP link.
///
/// Both send paths are fire-and-forget from the caller's point of view:
/// `send_msg` always reports the full payload length as consumed and
/// `lock_ddr_freq` returns nothing. Transport trouble shows up only in the
/// log, matching the engineering-control nature of this channel.
pub struct AopQmpClient {
    state: Mutex<ClientState>,
}

impl std::fmt::Debug for AopQmpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AopQmpClient").finish_non_exhaustive()
    }
}

impl AopQmpClient {
    /// Build a client over an acquired channel with the default ring depth.
    pub fn new(chan: Arc<dyn Mailbox>) -> Self {
        Self::with_depth(chan, TX_QUEUE_DEPTH)
    }

    /// Build a client with an explicit ring depth (minimum 1).
    pub fn with_depth(chan: Arc<dyn Mailbox>, depth: usize) -> Self {
        let depth = depth.max(1);
        let mut slots = Vec::with_capacity(depth);
        slots.resize_with(depth, MsgSlot::new);

        Self {
            state: Mutex::new(ClientState {
                chan,
                slots,
                cursor: 0,
                ddr_slot: MsgSlot::new(),
            }),
        }
    }

    /// Forward one message to the firmware.
    ///
    /// Accepts 1..=96 bytes; anything outside that range is dropped without
    /// transmission. The payload is copied into the next ring slot, padded
    /// with zeros to a 4-byte boundary and submitted. The return value is
    /// always `payload.len()` - callers cannot observe per-message failure
    /// here, only in the log.
    pub fn send_msg(&self, payload: &[u8]) -> usize {
        let len = payload.len();
        if len == 0 || len > MAX_MSG_SIZE {
            return len;
        }

        let mut state = self.state.lock();

        if state.cursor >= state.slots.len() {
            state.cursor = 0;
        }
        let idx = state.cursor;
        let size = round_up4(len);

        {
            let slot = &mut state.slots[idx];
            slot.buf.fill(0);
            slot.buf[..len].copy_from_slice(payload);
            slot.size = size;
        }

        let slot = &state.slots[idx];
        if let Err(e) = state.chan.submit(&slot.buf[..slot.size]) {
            error!("failed to send qmp request: {}", e);
        }
        // The cursor moves on after every submission attempt; a transport
        // failure does not make the slot reusable early.
        state.cursor = idx + 1;

        len
    }

    /// Pin the DDR clock to a known operating point.
    ///
    /// `config` must be one of the enumerated frequency codes; anything
    /// else logs a warning and sends nothing. Uses a dedicated slot rather
    /// than the message ring, but the same lock, so it never interleaves
    /// with `send_msg`.
    pub fn lock_ddr_freq(&self, config: i32) {
        let target = match ddr_index_for(config) {
            Some(target) => target,
            None => {
                warn!("config not match: {}", config);
                return;
            }
        };

        let mut state = self.state.lock();

        let entry = &DDR_CONFIGS[target];
        let size = round_up4(entry.len);

        state.ddr_slot.buf.fill(0);
        state.ddr_slot.buf[..entry.len].copy_from_slice(entry.msg.as_bytes());
        state.ddr_slot.buf[entry.len] = b'\0';
        state.ddr_slot.size = size;

        let slot = &state.ddr_slot;
        if let Err(e) = state.chan.submit(&slot.buf[..slot.size]) {
            error!("failed to send qmp request: {}", e);
        }
    }

    /// Configured ring depth.
    pub fn queue_depth(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Current ring cursor; the next message lands at `cursor % depth`.
    /// Exposed for diagnostics and tests.
    pub fn tx_cursor(&self) -> usize {
        self.state.lock().cursor
    }
}
