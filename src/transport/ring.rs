use std::mem::size_of;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::time::Duration;

use super::futex;
use super::layout::{ChannelEntry, PktSlot, MAX_MSG_SIZE};

/// A view over one channel's packet ring in shared memory.
///
/// This struct is NOT stored in shared memory; it holds pointers into the
/// mapped region. Cursor and sequence words follow the claim/publish
/// protocol documented on `PktSlot::sequence`, so several senders (or
/// several receivers) can share one ring safely.
#[derive(Debug)]
pub struct MailboxRing {
    /// Pointer to the channel descriptor in the region header.
    pub(crate) entry: *const ChannelEntry,

    /// Pointer to the start of this channel's band (array of `PktSlot`).
    pub(crate) band: *mut u8,

    /// Ring depth in slots.
    pub(crate) depth: usize,

    /// `depth - 1`; depth is a power of two.
    pub(crate) mask: usize,
}

unsafe impl Send for MailboxRing {}
unsafe impl Sync for MailboxRing {}

impl MailboxRing {
    /// Create a ring view over an existing region.
    ///
    /// # Safety
    /// Caller must ensure `entry` and `band` point into a live mapping laid
    /// out by `MailboxRegion::create`.
    pub unsafe fn new(entry: *const ChannelEntry, band: *mut u8) -> Self {
        let depth = (*entry).depth as usize;
        Self {
            entry,
            band,
            depth,
            mask: depth - 1,
        }
    }

    /// Size in bytes of one slot stride in the band.
    #[inline]
    pub fn slot_stride() -> usize {
        size_of::<PktSlot>()
    }

    /// Initialize per-slot sequence numbers to k for k in 0..depth.
    /// Called once by the region creator.
    ///
    /// # Safety
    /// Caller guarantees the band memory is allocated and writable.
    pub unsafe fn init_slots(&self) {
        for k in 0..self.depth {
            let slot = self.slot_mut(k);
            (*slot).sequence.store(k as u64, Relaxed);
        }
    }

    #[inline]
    unsafe fn slot_mut(&self, index: usize) -> *mut PktSlot {
        self.band.add(index * Self::slot_stride()) as *mut PktSlot
    }

    /// Enqueue one packet. `msg.len()` is the transmit size and must not
    /// exceed the slot's data capacity. Returns the slot index on success,
    /// or None if the ring is full.
    pub fn enqueue(&self, msg: &[u8]) -> Option<usize> {
        let tail_atomic = unsafe { &(*self.entry).tail };

        loop {
            let tail = tail_atomic.load(Relaxed);
            let idx = (tail as usize) & self.mask;
            let slot = unsafe { self.slot_mut(idx) };
            let seq = unsafe { &(*slot).sequence }.load(Acquire);
            let dif = seq as i64 - tail as i64;

            if dif == 0 {
                if tail_atomic
                    .compare_exchange_weak(tail, tail + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    // We own this slot now
                    unsafe {
                        ptr::write_bytes((*slot).data.as_mut_ptr(), 0, MAX_MSG_SIZE + 1);
                        let len = msg.len().min(MAX_MSG_SIZE + 1);
                        ptr::copy_nonoverlapping(msg.as_ptr(), (*slot).data.as_mut_ptr(), len);
                        (*slot).size = len as u32;

                        // Publish
                        (*slot).sequence.store(tail + 1, Release);
                    }
                    return Some(idx);
                }
                continue;
            } else if dif < 0 {
                // full
                return None;
            } else {
                // another sender is mid-publish; retry
                std::hint::spin_loop();
                continue;
            }
        }
    }

    /// Dequeue one packet, returning exactly `size` bytes.
    /// Returns None if the ring is empty.
    pub fn dequeue(&self) -> Option<Vec<u8>> {
        let head_atomic = unsafe { &(*self.entry).head };

        loop {
            let head = head_atomic.load(Relaxed);
            let idx = (head as usize) & self.mask;
            let slot = unsafe { self.slot_mut(idx) };
            let seq = unsafe { &(*slot).sequence }.load(Acquire);
            let dif = seq as i64 - (head as i64 + 1);

            if dif == 0 {
                if head_atomic
                    .compare_exchange_weak(head, head + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    let msg = unsafe {
                        let size = (*slot).size as usize;
                        let mut msg = vec![0u8; size];
                        ptr::copy_nonoverlapping((*slot).data.as_ptr(), msg.as_mut_ptr(), size);
                        msg
                    };

                    // Recycle the slot for future senders
                    unsafe {
                        (*slot).sequence.store(head + self.depth as u64, Release);
                    }
                    self.signal_space();
                    return Some(msg);
                }
                continue;
            } else if dif < 0 {
                // empty
                return None;
            } else {
                // sender not finished; retry
                std::hint::spin_loop();
                continue;
            }
        }
    }

    /// Notify the firmware side that a message was published.
    pub fn ring_doorbell(&self) {
        unsafe {
            let doorbell = &(*self.entry).doorbell;
            doorbell.fetch_add(1, Release);
            futex::futex_wake(doorbell);
        }
    }

    /// Current doorbell epoch; pass to `wait_for_doorbell`.
    pub fn doorbell_epoch(&self) -> u32 {
        unsafe { (*self.entry).doorbell.load(Acquire) }
    }

    /// Block until the doorbell moves past `seen` or `timeout` elapses.
    pub fn wait_for_doorbell(&self, seen: u32, timeout: Duration) {
        unsafe { futex::futex_wait(&(*self.entry).doorbell, seen, Some(timeout)) }
    }

    /// Notify blocked senders that a slot was freed.
    pub fn signal_space(&self) {
        unsafe {
            let space = &(*self.entry).space;
            space.fetch_add(1, Release);
            futex::futex_wake(space);
        }
    }

    /// Current space epoch; pass to `wait_for_space`.
    pub fn space_epoch(&self) -> u32 {
        unsafe { (*self.entry).space.load(Acquire) }
    }

    /// Block until a slot is freed past `seen` or `timeout` elapses.
    pub fn wait_for_space(&self, seen: u32, timeout: Duration) {
        unsafe { futex::futex_wait(&(*self.entry).space, seen, Some(timeout)) }
    }
}
