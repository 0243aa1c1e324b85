//! Capture pipeline controller: drives the sensor-to-memory DMA through the frame buffer pool
//! and reports filled buffers to the control loop.

pub mod dma_ring;

#[cfg(feature = "firmware")]
pub mod dcmi;

use crate::cache::CacheMaintenance;
use crate::format::{Layout, PixelFormat, RlpMode, StreamConfig};
use crate::frame_buf::{BufferPool, PoolError};
use heapless::{
    consts,
    spsc::{Consumer, Producer, Queue},
};

/// Buffer-ready channel from the capture completion interrupt to the control loop. Carries
/// buffer indices, holds one entry per frame buffer.
pub type ReadyQueue = Queue<u8, consts::U4>;

/// Interrupt side of the buffer-ready channel.
pub type ReadyProducer<'a> = Producer<'a, u8, consts::U4>;

/// Control loop side of the buffer-ready channel.
pub type ReadyConsumer<'a> = Consumer<'a, u8, consts::U4>;

/// Optional pixel pipeline stages of the capture controller. The camera streams raw sensor
/// YUV, so all of them are off.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PipelineStages {
    pub gamma: bool,
    pub color_correction: bool,
    pub histogram: bool,
}

/// Everything the capture hardware needs to write frames into the pool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaptureConfig {
    /// Sensor output bit width.
    pub input_bits: u8,
    pub input_format: PixelFormat,
    pub buffer_count: u8,
    pub layout: Layout,
    pub rlp_mode: RlpMode,
    pub pipeline: PipelineStages,
    /// Address of buffer 0.
    pub dma_base: usize,
    /// Distance between consecutive buffers in bytes.
    pub buffer_stride: usize,
    /// Bytes written per frame.
    pub buffer_size: usize,
}

/// Capture errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaptureError {
    /// A frame does not fit in a pool buffer.
    FrameTooLarge { frame: usize, slot: usize },
    /// The hardware cannot produce the requested memory layout.
    UnsupportedLayout,
    /// The hardware cannot run the requested data path mode.
    UnsupportedRlpMode,
    /// The hardware has no such pipeline stage.
    UnsupportedPipeline,
    /// The frame cannot be carried by the DMA.
    TransferGeometry,
    /// Start was requested before a successful `configure`.
    NotConfigured,
    Pool(PoolError),
}

impl From<PoolError> for CaptureError {
    fn from(e: PoolError) -> Self {
        CaptureError::Pool(e)
    }
}

/// Driver for the capture hardware (capture controller plus its DMA).
pub trait CaptureHardware {
    /// Program the controller and DMA. Capture stays stopped.
    fn configure(&mut self, config: &CaptureConfig) -> Result<(), CaptureError>;

    /// Start continuous capture into buffer 0, then 1, and so on around the ring.
    fn start(&mut self);

    /// Halt capture and the DMA.
    fn stop(&mut self);

    /// Mask the completion interrupt so no further completions are delivered.
    fn disable_interrupt(&mut self);

    /// Called from the completion interrupt. Acknowledges it and returns the index of the
    /// buffer that was filled, if the interrupt completed a frame.
    fn completed_buffer(&mut self) -> Option<u8>;
}

/// Counters kept by the interrupt side of the controller.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CaptureStats {
    /// Frames published to the transmitter.
    pub frames: u32,
    /// Capture wrapped onto a buffer the transmitter still held.
    pub overruns: u32,
    /// Ready indices lost because the channel was full.
    pub dropped: u32,
    /// Completions for an index that was not being captured.
    pub spurious: u32,
}

/// Capture pipeline controller.
pub struct CaptureController<H> {
    hw: H,
    config: Option<CaptureConfig>,
    active: bool,
    /// Buffer the DMA is currently writing.
    writing: Option<u8>,
    stats: CaptureStats,
}

impl<H: CaptureHardware> CaptureController<H> {
    pub fn new(hw: H) -> Self {
        CaptureController {
            hw,
            config: None,
            active: false,
            writing: None,
            stats: CaptureStats::default(),
        }
    }

    /// Build the hardware configuration for `stream` over `pool` and program it.
    pub fn configure(
        &mut self,
        stream: &StreamConfig,
        pool: &BufferPool,
    ) -> Result<(), CaptureError> {
        let frame = stream.frame_size();
        if frame > pool.slot_size() {
            return Err(CaptureError::FrameTooLarge {
                frame,
                slot: pool.slot_size(),
            });
        }

        let config = CaptureConfig {
            input_bits: stream.input_bits,
            input_format: stream.format,
            buffer_count: pool.count(),
            layout: stream.layout,
            rlp_mode: RlpMode::Dat8,
            pipeline: PipelineStages::default(),
            dma_base: pool.base_address(),
            buffer_stride: pool.slot_size(),
            buffer_size: frame,
        };
        self.hw.configure(&config)?;
        self.config = Some(config);
        Ok(())
    }

    /// Start continuous capture. Buffer 0 is handed to the capture writer.
    pub fn start(&mut self, pool: &mut BufferPool) -> Result<(), CaptureError> {
        if self.config.is_none() {
            return Err(CaptureError::NotConfigured);
        }
        pool.acquire_for_capture(0)?;
        self.writing = Some(0);
        self.active = true;
        self.hw.start();
        Ok(())
    }

    /// Stop capture and silence the completion interrupt. Nothing is reported after this
    /// returns.
    pub fn stop(&mut self, pool: &mut BufferPool) {
        self.hw.stop();
        self.hw.disable_interrupt();
        self.active = false;
        if let Some(index) = self.writing.take() {
            pool.release(index).ok();
        }
    }

    /// Completion interrupt body. A filled buffer is published (cache maintenance done)
    /// before its index is sent to the control loop.
    pub fn on_interrupt<C: CacheMaintenance>(
        &mut self,
        pool: &mut BufferPool,
        cache: &mut C,
        ready: &mut ReadyProducer,
    ) {
        let index = match self.hw.completed_buffer() {
            Some(index) => index,
            None => return,
        };
        if !self.active {
            return;
        }

        if pool.publish(index, cache).is_err() {
            self.stats.spurious = self.stats.spurious.wrapping_add(1);
            return;
        }
        self.stats.frames = self.stats.frames.wrapping_add(1);

        // The DMA has already moved on to the next buffer
        let next = (index + 1) % pool.count();
        match pool.acquire_for_capture(next) {
            Ok(_) => {}
            Err(PoolError::Busy(_)) => {
                // Transmitter fell behind, its frame gets overwritten
                self.stats.overruns = self.stats.overruns.wrapping_add(1);
                log!("Capture overrun on buffer {}", next);
                pool.release(next).ok();
                pool.acquire_for_capture(next).ok();
            }
            Err(_) => {}
        }
        self.writing = Some(next);

        if ready.enqueue(index).is_err() {
            self.stats.dropped = self.stats.dropped.wrapping_add(1);
            log!("Ready queue full, dropped buffer {}", index);
            pool.release(index).ok();
        }
    }

    /// `true` between `start` and `stop`.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Configuration last accepted by the hardware.
    pub fn config(&self) -> Option<&CaptureConfig> {
        self.config.as_ref()
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Buffer the capture writer currently owns.
    pub fn writing(&self) -> Option<u8> {
        self.writing
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }
}
