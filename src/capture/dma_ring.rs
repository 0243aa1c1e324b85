//! Address rotation for a double-buffered (ping-pong) DMA stream writing into a ring of frame
//! buffers.
//!
//! The stream alternates between two memory targets. When the transfer into one target
//! completes, the stream switches to the other and the finished target is reloaded with the
//! address two transfers ahead. A frame that is larger than one DMA transfer can carry is
//! split into equal chunks, so the ring walks `frames * chunks_per_frame` transfers.

/// Largest number of data items a single DMA transfer can move.
pub const MAX_TRANSFER_ITEMS: u32 = 0xFFFF;

/// Bytes per DMA data item (32-bit peripheral and memory transfers).
pub const ITEM_SIZE: usize = 4;

/// One of the two memory address registers of a double-buffered stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Target {
    Memory0,
    Memory1,
}

impl Target {
    fn other(self) -> Self {
        match self {
            Target::Memory0 => Target::Memory1,
            Target::Memory1 => Target::Memory0,
        }
    }
}

/// What to do after a transfer-complete event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Step {
    /// Memory target that just finished and must be reloaded.
    pub reload: Target,
    /// Address to load into `reload`.
    pub address: usize,
    /// Index of the frame buffer that is now completely filled, if any.
    pub completed_frame: Option<u8>,
}

/// Ring geometry errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RingError {
    /// Frame size is zero or not a whole number of DMA items.
    FrameSize,
    /// Frame is larger than the buffer stride.
    FrameTooLarge,
    /// No frame buffers.
    NoFrames,
}

/// `DmaRing` walks a DMA stream over `frames` buffers laid out every `stride` bytes from `base`.
#[derive(Clone, Debug)]
pub struct DmaRing {
    /// Address of frame buffer 0. Does not change after `new`.
    base: usize,

    /// Distance between two frame buffers in bytes. Does not change after `new`.
    stride: usize,

    /// Bytes moved by one DMA transfer. Does not change after `new`.
    chunk_size: usize,

    /// Transfers needed for one frame. Does not change after `new`.
    chunks_per_frame: u32,

    /// Number of frame buffers. Does not change after `new`.
    frames: u32,

    /// Ring position of the transfer that completes next.
    done: u32,

    /// Memory target of the transfer that completes next.
    active: Target,
}

impl DmaRing {
    /// Creates a new ring, planning the transfers for a `frame_size` byte frame.
    pub fn new(
        base: usize,
        stride: usize,
        frame_size: usize,
        frames: u8,
    ) -> Result<Self, RingError> {
        if frames == 0 {
            return Err(RingError::NoFrames);
        }
        if frame_size > stride {
            return Err(RingError::FrameTooLarge);
        }
        let chunks_per_frame = plan_chunks(frame_size).ok_or(RingError::FrameSize)?;

        Ok(DmaRing {
            base,
            stride,
            chunk_size: frame_size / chunks_per_frame as usize,
            chunks_per_frame,
            frames: frames as u32,
            done: 0,
            active: Target::Memory0,
        })
    }

    /// Number of DMA items in each transfer, the value for the stream's item counter.
    pub fn items_per_transfer(&self) -> u16 {
        (self.chunk_size / ITEM_SIZE) as u16
    }

    /// Number of transfers that make up one frame.
    pub fn chunks_per_frame(&self) -> u32 {
        self.chunks_per_frame
    }

    /// Addresses for memory targets 0 and 1 before the stream is enabled.
    pub fn initial_addresses(&self) -> (usize, usize) {
        (self.address(0), self.address(1))
    }

    /// Rewind to the first transfer of frame 0.
    pub fn rewind(&mut self) {
        self.done = 0;
        self.active = Target::Memory0;
    }

    /// A transfer completed: return the reload for the finished target and the frame that
    /// completed with it, if any.
    pub fn advance(&mut self) -> Step {
        let finished = self.done;
        let reload = self.active;

        let total = self.total();
        self.done = (finished + 1) % total;
        self.active = reload.other();

        let completed_frame = if (finished + 1) % self.chunks_per_frame == 0 {
            Some((finished / self.chunks_per_frame) as u8)
        } else {
            None
        };

        Step {
            reload,
            address: self.address((finished + 2) % total),
            completed_frame,
        }
    }

    /// Convert a ring position to an address.
    fn address(&self, position: u32) -> usize {
        let position = position % self.total();
        let frame = (position / self.chunks_per_frame) as usize;
        let chunk = (position % self.chunks_per_frame) as usize;
        self.base + frame * self.stride + chunk * self.chunk_size
    }

    fn total(&self) -> u32 {
        self.frames * self.chunks_per_frame
    }
}

/// Smallest number of equal transfers that carries a `frame_size` byte frame, or `None` if the
/// frame cannot be split that way.
pub fn plan_chunks(frame_size: usize) -> Option<u32> {
    if frame_size == 0 || frame_size % ITEM_SIZE != 0 {
        return None;
    }
    let items = (frame_size / ITEM_SIZE) as u32;
    (1..=items).find(|chunks| items % chunks == 0 && items / chunks <= MAX_TRANSFER_ITEMS)
}
