//! Test doubles for the hardware and USB seams.

#![allow(dead_code)]

use usb_webcam_rs::{
    cache::CacheMaintenance,
    capture::{CaptureConfig, CaptureError, CaptureHardware},
    format::{PixelFormat, Resolution},
    frame_buf::{BufferPool, NUM_FRAME_BUFFER},
    sensor::{ImageSensor, SensorOutput, SensorProfile},
    stream::{Fault, StreamingContext},
    uvc::{LinkState, TransferStatus, UsbVideoFunction},
};

/// Bytes per pool buffer: a "VGA" frame of the mock sensor fills one exactly.
pub const SLOT_SIZE: usize = 128;

#[repr(C, align(32))]
pub struct Region(pub [u8; SLOT_SIZE * NUM_FRAME_BUFFER as usize]);

/// A cache-aligned region that lives for the rest of the test.
pub fn region() -> &'static mut [u8] {
    let region = Box::leak(Box::new(Region([0xAA; SLOT_SIZE * NUM_FRAME_BUFFER as usize])));
    &mut region.0
}

pub fn pool() -> BufferPool<'static> {
    BufferPool::new(region(), NUM_FRAME_BUFFER, SLOT_SIZE).unwrap()
}

pub type Ctx = StreamingContext<'static, MockCaptureHw, RecordingCache>;

pub fn boot(sensor: &mut MockSensor) -> Result<Ctx, Fault> {
    StreamingContext::boot(sensor, pool(), RecordingCache::default(), MockCaptureHw::default())
}

/// Sensor with tiny frames: 8x4 for QVGA, 16x4 for VGA.
pub struct MockSensor {
    pub present: bool,
    pub fail_on: Option<Resolution>,
    pub setups: Vec<Resolution>,
}

impl Default for MockSensor {
    fn default() -> Self {
        MockSensor {
            present: true,
            fail_on: None,
            setups: Vec::new(),
        }
    }
}

impl ImageSensor for MockSensor {
    type Error = &'static str;

    fn detect(&mut self) -> Option<SensorProfile> {
        if !self.present {
            return None;
        }
        Some(SensorProfile {
            name: "MOCK",
            manufacturer_id: 0x7FA2,
            product_id: 0x9657,
            output_bits: 8,
            resolutions: &[Resolution::Qvga, Resolution::Vga],
            format: PixelFormat::Yuv422,
        })
    }

    fn setup(
        &mut self,
        _profile: &SensorProfile,
        resolution: Resolution,
        _format: PixelFormat,
    ) -> Result<(), Self::Error> {
        self.setups.push(resolution);
        if self.fail_on == Some(resolution) {
            return Err("register write failed");
        }
        Ok(())
    }

    fn output(
        &self,
        _profile: &SensorProfile,
        resolution: Resolution,
        _format: PixelFormat,
    ) -> Option<SensorOutput> {
        let width = match resolution {
            Resolution::Qvga => 8,
            Resolution::Vga => 16,
        };
        Some(SensorOutput {
            bit_width: 8,
            width,
            height: 4,
        })
    }
}

/// Capture hardware that completes buffers in ring order whenever asked.
#[derive(Default)]
pub struct MockCaptureHw {
    pub configs: Vec<CaptureConfig>,
    pub reject: Option<CaptureError>,
    pub starts: u32,
    pub stops: u32,
    pub interrupt_disables: u32,
    running: bool,
    next: u8,
}

impl CaptureHardware for MockCaptureHw {
    fn configure(&mut self, config: &CaptureConfig) -> Result<(), CaptureError> {
        if let Some(e) = self.reject {
            return Err(e);
        }
        self.configs.push(*config);
        Ok(())
    }

    fn start(&mut self) {
        self.starts += 1;
        self.running = true;
        self.next = 0;
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.running = false;
    }

    fn disable_interrupt(&mut self) {
        self.interrupt_disables += 1;
    }

    fn completed_buffer(&mut self) -> Option<u8> {
        if !self.running {
            return None;
        }
        let count = self.configs.last()?.buffer_count;
        let done = self.next;
        self.next = (self.next + 1) % count;
        Some(done)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheOp {
    Clean(usize, usize),
    Invalidate(usize, usize),
}

#[derive(Default)]
pub struct RecordingCache {
    pub ops: Vec<CacheOp>,
}

impl CacheMaintenance for RecordingCache {
    fn clean(&mut self, addr: usize, len: usize) {
        self.ops.push(CacheOp::Clean(addr, len));
    }

    fn invalidate(&mut self, addr: usize, len: usize) {
        self.ops.push(CacheOp::Invalidate(addr, len));
    }
}

/// USB video function as the host drives it.
pub struct MockUsb {
    pub link: LinkState,
    pub video_on: bool,
    pub format: u8,
    pub frames: Vec<u8>,
    pub kicks: Vec<(bool, TransferStatus, usize, usize)>,
}

impl MockUsb {
    /// Enumerated, streaming interface idle.
    pub fn configured() -> Self {
        MockUsb {
            link: LinkState::Configured,
            video_on: false,
            format: 1,
            frames: Vec::new(),
            kicks: Vec::new(),
        }
    }

    pub fn stream(&mut self, format: u8) {
        self.format = format;
        self.video_on = true;
    }
}

impl UsbVideoFunction for MockUsb {
    fn link_state(&self) -> LinkState {
        self.link
    }

    fn is_video_on(&self) -> bool {
        self.video_on
    }

    fn frame_format(&self) -> u8 {
        self.format
    }

    fn update_frame_idx(&mut self, index: u8) {
        self.frames.push(index);
    }

    fn payload_sent(
        &mut self,
        payload: Option<&[u8]>,
        status: TransferStatus,
        offset: usize,
        length: usize,
    ) {
        self.kicks.push((payload.is_none(), status, offset, length));
    }
}
