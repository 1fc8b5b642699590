use std::io;
use std::mem::size_of;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::channel::MailboxChannel;
use super::layout::{ChannelEntry, RegionHeader, MAX_CHANNELS, REGION_MAGIC, REGION_VERSION};
use super::receiver::MailboxReceiver;
use super::ring::MailboxRing;
use super::shmem::ShmRegion;
use super::MailboxConfig;

/// Default ring depth per channel, in slots. Power of two.
pub const DEFAULT_RING_DEPTH: usize = 32;

/// An attached AOP QMP mailbox region: the header plus one packet ring per
/// channel. The controller-owning process creates it; clients attach.
#[derive(Debug)]
pub struct MailboxRegion {
    shm: Arc<ShmRegion>,
    header: *mut RegionHeader,
}

unsafe impl Send for MailboxRegion {}
unsafe impl Sync for MailboxRegion {}

impl MailboxRegion {
    /// Create and initialize a named region with `depth` slots per channel.
    pub fn create(name: &str, depth: usize) -> io::Result<Self> {
        if depth == 0 || !depth.is_power_of_two() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("ring depth must be a power of two, got {}", depth),
            ));
        }

        let header_size = size_of::<RegionHeader>();
        let band_size = depth * MailboxRing::slot_stride();
        let total = header_size + MAX_CHANNELS * band_size;

        let shm = Arc::new(ShmRegion::create(name, total)?);
        let header = shm.as_ptr() as *mut RegionHeader;

        // ftruncate gives zeroed pages, so cursors, futex words and in_use
        // flags start at 0; only the plain fields need filling in.
        unsafe {
            for i in 0..MAX_CHANNELS {
                let entry = &mut (*header).channels[i];
                entry.channel_id = i as u32;
                entry.depth = depth as u64;
                entry.band_offset = (header_size + i * band_size) as u64;

                let ring = MailboxRing::new(entry, shm.as_ptr().add(entry.band_offset as usize));
                ring.init_slots();
            }

            (*header).version = REGION_VERSION;
            (*header).max_channels = MAX_CHANNELS as u32;
            (*header).channel_count = MAX_CHANNELS as u32;
            (*header).reserved = 0;
            // Written last: attachers treat the magic as the "initialized" flag.
            (*header).magic = REGION_MAGIC;
        }

        Ok(Self { shm, header })
    }

    /// Attach to an existing named region and validate its header.
    pub fn attach(name: &str) -> io::Result<Self> {
        let shm = Arc::new(ShmRegion::attach(name, size_of::<RegionHeader>())?);
        let header = shm.as_ptr() as *mut RegionHeader;

        unsafe {
            if (*header).magic != REGION_MAGIC {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "bad magic number - mailbox region not initialized",
                ));
            }
            if (*header).version != REGION_VERSION {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "mailbox region version mismatch: expected {}, got {}",
                        REGION_VERSION,
                        (*header).version
                    ),
                ));
            }
        }

        Ok(Self { shm, header })
    }

    fn entry(&self, index: usize) -> io::Result<*const ChannelEntry> {
        let count = unsafe { (*self.header).channel_count } as usize;
        if index >= count {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mailbox channel at index {} (region has {})", index, count),
            ));
        }
        Ok(unsafe { &(*self.header).channels[index] as *const ChannelEntry })
    }

    /// Acquire exclusive send access to the channel at `index`.
    ///
    /// Mirrors the mailbox framework's channel request: at most one sender
    /// may hold a channel; it is released when the handle drops.
    pub fn request_channel(&self, index: usize, conf: MailboxConfig) -> io::Result<MailboxChannel> {
        let entry = self.entry(index)?;

        let in_use = unsafe { &(*entry).in_use };
        if in_use
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("mailbox channel {} is already held by a sender", index),
            ));
        }

        let ring = unsafe {
            let band = self.shm.as_ptr().add((*entry).band_offset as usize);
            MailboxRing::new(entry, band)
        };

        Ok(MailboxChannel::new(self.shm.clone(), ring, conf))
    }

    /// Open the firmware-side view of the channel at `index`.
    /// Not exclusive; the remote may drain from several threads.
    pub fn open_receiver(&self, index: usize) -> io::Result<MailboxReceiver> {
        let entry = self.entry(index)?;

        let ring = unsafe {
            let band = self.shm.as_ptr().add((*entry).band_offset as usize);
            MailboxRing::new(entry, band)
        };

        Ok(MailboxReceiver::new(self.shm.clone(), ring))
    }

    /// Remove the backing file for a named region.
    pub fn unlink(name: &str) -> io::Result<()> {
        ShmRegion::unlink(name)
    }
}
