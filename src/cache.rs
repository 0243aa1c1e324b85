//! Data cache maintenance for memory shared between the CPU and DMA masters.
//!
//! The Cortex-M7 L1 data cache is not coherent with DMA. Anything the CPU writes must be
//! cleaned out to memory before a DMA master reads it, and anything a DMA master writes must
//! be invalidated before the CPU reads it, otherwise the reader sees stale lines.

/// Size of a Cortex-M7 data cache line in bytes. DMA regions are aligned to this.
pub const CACHE_LINE: usize = 32;

/// Cache maintenance by address range.
pub trait CacheMaintenance {
    /// Write back dirty lines covering `[addr, addr + len)` to memory.
    fn clean(&mut self, addr: usize, len: usize);

    /// Discard lines covering `[addr, addr + len)` so the next read comes from memory.
    fn invalidate(&mut self, addr: usize, len: usize);
}

/// Cortex-M7 data cache, driven through the system control block.
#[cfg(feature = "firmware")]
pub struct CortexMCache {
    scb: cortex_m::peripheral::SCB,
}

#[cfg(feature = "firmware")]
impl CortexMCache {
    /// Take ownership of the SCB, enabling the instruction and data caches.
    pub fn new(mut scb: cortex_m::peripheral::SCB, cpuid: &mut cortex_m::peripheral::CPUID) -> Self {
        scb.enable_icache();
        scb.enable_dcache(cpuid);
        CortexMCache { scb }
    }
}

#[cfg(feature = "firmware")]
impl CacheMaintenance for CortexMCache {
    fn clean(&mut self, addr: usize, len: usize) {
        self.scb.clean_dcache_by_address(addr, len);
    }

    fn invalidate(&mut self, addr: usize, len: usize) {
        // Regions are cache line aligned and sized, so no unrelated data shares a line
        #[allow(unused_unsafe)]
        unsafe {
            self.scb.invalidate_dcache_by_address(addr, len);
        }
    }
}
