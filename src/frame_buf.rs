//! Pool of equally sized frame buffers shared by the capture DMA and the USB transmitter.

use crate::cache::{CacheMaintenance, CACHE_LINE};
use heapless::{consts, Vec};

/// Number of frame buffers the camera rotates through.
pub const NUM_FRAME_BUFFER: u8 = 4;

/// Upper bound on the number of buffers in a pool.
pub const MAX_BUFFERS: usize = 8;

/// Which stage currently owns a buffer. Ownership moves by index, one owner at a time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Owner {
    /// Nobody is using the buffer.
    Free,
    /// The capture DMA is (or is about to be) writing into the buffer.
    Capture,
    /// The buffer holds a published frame for the USB transmitter.
    Transmit,
}

/// Frame buffer pool errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolError {
    /// Index is not in `[0, count)`.
    IndexOutOfRange(u8),
    /// The transmitter still owns the buffer.
    Busy(u8),
    /// The capture DMA already owns the buffer.
    AlreadyCapturing(u8),
    /// Only a buffer owned by the capture DMA can be published.
    NotCapturing(u8),
    /// Region base or buffer size is not a multiple of the cache line.
    Misaligned,
    /// Region cannot hold `count` buffers of the requested size.
    RegionTooSmall,
    /// Buffer count is zero or larger than `MAX_BUFFERS`.
    BadCount,
}

/// `BufferPool` slices one contiguous DMA-visible region into `count` buffers of `slot_size`
/// bytes. Buffer `i` starts at `base + i * slot_size`. Buffers are never resized.
pub struct BufferPool<'a> {
    /// Backing memory. Never reallocated after `new`.
    region: &'a mut [u8],

    /// Size of a single buffer in bytes.
    slot_size: usize,

    /// Current owner of each buffer, indexed by buffer index.
    owners: Vec<Owner, consts::U8>,
}

impl<'a> BufferPool<'a> {
    /// Creates a pool of `count` buffers of `slot_size` bytes over `region`. All buffers start
    /// out free.
    pub fn new(region: &'a mut [u8], count: u8, slot_size: usize) -> Result<Self, PoolError> {
        if count == 0 || count as usize > MAX_BUFFERS {
            return Err(PoolError::BadCount);
        }
        if slot_size == 0
            || slot_size % CACHE_LINE != 0
            || region.as_ptr() as usize % CACHE_LINE != 0
        {
            return Err(PoolError::Misaligned);
        }
        match slot_size.checked_mul(count as usize) {
            Some(needed) if needed <= region.len() => {}
            _ => return Err(PoolError::RegionTooSmall),
        }

        let mut owners = Vec::new();
        for _ in 0..count {
            owners.push(Owner::Free).map_err(|_| PoolError::BadCount)?;
        }

        Ok(BufferPool {
            region,
            slot_size,
            owners,
        })
    }

    /// Number of buffers.
    pub fn count(&self) -> u8 {
        self.owners.len() as u8
    }

    /// Size of each buffer in bytes.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Address of buffer 0, handed to the capture DMA and the USB transmitter.
    pub fn base_address(&self) -> usize {
        self.region.as_ptr() as usize
    }

    /// Address of buffer `index`.
    pub fn slot_address(&self, index: u8) -> Option<usize> {
        self.check(index)
            .ok()
            .map(|_| self.base_address() + index as usize * self.slot_size)
    }

    /// Current owner of buffer `index`.
    pub fn owner(&self, index: u8) -> Option<Owner> {
        self.owners.get(index as usize).copied()
    }

    /// Read-only view of buffer `index`.
    pub fn slot(&self, index: u8) -> Option<&[u8]> {
        let start = self.check(index).ok()?;
        self.region.get(start..start + self.slot_size)
    }

    /// Hand buffer `index` to the capture writer and return the writer's view of it.
    pub fn acquire_for_capture(&mut self, index: u8) -> Result<&mut [u8], PoolError> {
        let start = self.check(index)?;
        match self.owners[index as usize] {
            Owner::Free => self.owners[index as usize] = Owner::Capture,
            Owner::Capture => return Err(PoolError::AlreadyCapturing(index)),
            Owner::Transmit => return Err(PoolError::Busy(index)),
        }
        Ok(&mut self.region[start..start + self.slot_size])
    }

    /// The capture writer finished buffer `index`: make its contents visible to the CPU and
    /// transfer it to the transmitter.
    pub fn publish<C: CacheMaintenance>(
        &mut self,
        index: u8,
        cache: &mut C,
    ) -> Result<(), PoolError> {
        let start = self.check(index)?;
        if self.owners[index as usize] != Owner::Capture {
            return Err(PoolError::NotCapturing(index));
        }

        // The DMA wrote behind the cache, drop whatever lines the CPU still holds
        cache.invalidate(self.base_address() + start, self.slot_size);
        self.owners[index as usize] = Owner::Transmit;
        Ok(())
    }

    /// Return buffer `index` to the free pool. Returns the owner it was taken from.
    pub fn release(&mut self, index: u8) -> Result<Owner, PoolError> {
        self.check(index)?;
        let previous = self.owners[index as usize];
        self.owners[index as usize] = Owner::Free;
        Ok(previous)
    }

    /// Zero every buffer and push the zeros out to memory, so nothing stale is streamed after
    /// a restart. All buffers become free. Capture must be stopped.
    pub fn reset_all<C: CacheMaintenance>(&mut self, cache: &mut C) {
        let used = self.slot_size * self.owners.len();
        for byte in self.region[..used].iter_mut() {
            *byte = 0;
        }
        cache.clean(self.base_address(), used);

        for owner in self.owners.iter_mut() {
            *owner = Owner::Free;
        }
    }

    /// Validate `index`, returning its byte offset in the region.
    fn check(&self, index: u8) -> Result<usize, PoolError> {
        if (index as usize) < self.owners.len() {
            Ok(index as usize * self.slot_size)
        } else {
            Err(PoolError::IndexOutOfRange(index))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, align(32))]
    struct Region([u8; 256]);

    #[derive(Default)]
    struct NoCache;

    impl CacheMaintenance for NoCache {
        fn clean(&mut self, _addr: usize, _len: usize) {}
        fn invalidate(&mut self, _addr: usize, _len: usize) {}
    }

    #[test]
    fn rejects_bad_geometry() {
        let mut region = Region([0; 256]);
        assert_eq!(
            BufferPool::new(&mut region.0, 0, 64).err(),
            Some(PoolError::BadCount)
        );
        assert_eq!(
            BufferPool::new(&mut region.0, 9, 32).err(),
            Some(PoolError::BadCount)
        );
        assert_eq!(
            BufferPool::new(&mut region.0, 4, 48).err(),
            Some(PoolError::Misaligned)
        );
        assert_eq!(
            BufferPool::new(&mut region.0[1..], 2, 64).err(),
            Some(PoolError::Misaligned)
        );
        assert_eq!(
            BufferPool::new(&mut region.0, 4, 96).err(),
            Some(PoolError::RegionTooSmall)
        );
    }

    #[test]
    fn slots_are_contiguous() {
        let mut region = Region([0; 256]);
        let pool = BufferPool::new(&mut region.0, 4, 64).unwrap();
        let base = pool.base_address();
        assert_eq!(pool.slot_address(0), Some(base));
        assert_eq!(pool.slot_address(3), Some(base + 192));
        assert_eq!(pool.slot_address(4), None);
        assert_eq!(pool.slot(2).map(|s| s.len()), Some(64));
    }

    #[test]
    fn ownership_moves_one_stage_at_a_time() {
        let mut region = Region([0; 256]);
        let mut pool = BufferPool::new(&mut region.0, 4, 64).unwrap();
        let mut cache = NoCache::default();

        assert_eq!(pool.publish(1, &mut cache), Err(PoolError::NotCapturing(1)));
        pool.acquire_for_capture(1).unwrap();
        assert_eq!(
            pool.acquire_for_capture(1).err(),
            Some(PoolError::AlreadyCapturing(1))
        );
        pool.publish(1, &mut cache).unwrap();
        assert_eq!(pool.owner(1), Some(Owner::Transmit));
        assert_eq!(pool.acquire_for_capture(1).err(), Some(PoolError::Busy(1)));
        assert_eq!(pool.release(1), Ok(Owner::Transmit));
        assert!(pool.acquire_for_capture(1).is_ok());
        assert_eq!(
            pool.acquire_for_capture(7).err(),
            Some(PoolError::IndexOutOfRange(7))
        );
    }
}
