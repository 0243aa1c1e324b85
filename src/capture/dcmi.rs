//! Capture backend for the STM32F7 DCMI peripheral with DMA2 moving image data into the frame
//! buffer pool. Assumes that GPIO and the sensor clock are set up before using this module.

use super::dma_ring::{DmaRing, RingError, Target};
use super::{CaptureConfig, CaptureError, CaptureHardware};
use crate::format::{Layout, PixelFormat, RlpMode};
use cortex_m::peripheral::NVIC;
use stm32f7xx_hal::pac::{interrupt, DCMI, DMA2, RCC};

// DMA2-Stream 1-Channel 1 is used to interface with DCMI
const DMA_STREAM: usize = 1;
const DMA_CHANNEL: u8 = 1;

// DCMI data register address
const DCMI_DR_ADDR: u32 = 0x5005_0000 + 0x28;

// Stream 1 flags in the DMA2 low interrupt status register
const STREAM1_FLAGS: u32 = 0xF40;
const STREAM1_TCIF: u32 = 1 << 11;

/// DCMI + DMA2 capture hardware.
pub struct DcmiCapture {
    /// Ownership of the capture peripherals, registers are accessed through their pointers.
    _dcmi: DCMI,
    _dma2: DMA2,

    /// Address rotation for the configured frame geometry.
    ring: Option<DmaRing>,
}

impl DcmiCapture {
    pub fn new(dcmi: DCMI, dma2: DMA2) -> Self {
        DcmiCapture {
            _dcmi: dcmi,
            _dma2: dma2,
            ring: None,
        }
    }
}

impl CaptureHardware for DcmiCapture {
    fn configure(&mut self, config: &CaptureConfig) -> Result<(), CaptureError> {
        // The DCMI only forwards raw 8-bit data, there is no pixel pipeline to set up
        if config.layout != Layout::Packed8 || config.input_format != PixelFormat::Yuv422 {
            return Err(CaptureError::UnsupportedLayout);
        }
        if config.rlp_mode != RlpMode::Dat8 || config.input_bits != 8 {
            return Err(CaptureError::UnsupportedRlpMode);
        }
        let stages = config.pipeline;
        if stages.gamma || stages.color_correction || stages.histogram {
            return Err(CaptureError::UnsupportedPipeline);
        }

        let ring = DmaRing::new(
            config.dma_base,
            config.buffer_stride,
            config.buffer_size,
            config.buffer_count,
        )
        .map_err(|e| match e {
            RingError::FrameTooLarge => CaptureError::FrameTooLarge {
                frame: config.buffer_size,
                slot: config.buffer_stride,
            },
            _ => CaptureError::TransferGeometry,
        })?;

        dcmi_setup();
        dma2_setup(&ring);
        log!(
            "DCMI configured: {} bytes per frame, {} transfer(s) of {} words",
            config.buffer_size,
            ring.chunks_per_frame(),
            ring.items_per_transfer()
        );

        self.ring = Some(ring);
        Ok(())
    }

    fn start(&mut self) {
        if let Some(ring) = self.ring.as_mut() {
            ring.rewind();
            dma2_setup(ring);
            start_capture();
        }
    }

    fn stop(&mut self) {
        stop_capture();
    }

    fn disable_interrupt(&mut self) {
        let dma2_regs = unsafe { &(*DMA2::ptr()) };

        NVIC::mask::<interrupt>(interrupt::DMA2_STREAM1);
        dma2_regs.st[DMA_STREAM]
            .cr
            .modify(|_, w| w.tcie().clear_bit().teie().clear_bit().dmeie().clear_bit());

        // Drop anything raised while stopping
        unsafe {
            dma2_regs.lifcr.write(|w| w.bits(STREAM1_FLAGS));
        }
        NVIC::unpend::<interrupt>(interrupt::DMA2_STREAM1);
    }

    fn completed_buffer(&mut self) -> Option<u8> {
        let dma2_regs = unsafe { &(*DMA2::ptr()) };

        // Read and clear the stream 1 interrupt flags
        let int_status = dma2_regs.lisr.read().bits() & STREAM1_FLAGS;
        unsafe {
            dma2_regs.lifcr.write(|w| w.bits(int_status));
        }

        if int_status & STREAM1_TCIF == 0 {
            return None;
        }

        let step = self.ring.as_mut()?.advance();
        match step.reload {
            Target::Memory0 => dma2_update_addr0(step.address as u32),
            Target::Memory1 => dma2_update_addr1(step.address as u32),
        }
        step.completed_frame
    }
}

/// Setup the DCMI peripheral to interface with the sensor.
fn dcmi_setup() {
    let dcmi_regs = unsafe { &(*DCMI::ptr()) };
    let rcc_regs = unsafe { &(*RCC::ptr()) };

    // Enable peripheral clock
    rcc_regs.ahb2enr.modify(|_, w| w.dcmien().set_bit());

    // VSYNC active high, continuous capture, 8-bit data, no crop and no JPEG
    dcmi_regs
        .cr
        .write(|w| w.vspol().set_bit().hspol().clear_bit().cm().clear_bit());

    // Frame completion is tracked through DMA2, DCMI interrupts stay off
    dcmi_regs.ier.write(|w| unsafe { w.bits(0) });
}

/// Setup DMA2 to transfer image data from DCMI into the first two ring positions.
fn dma2_setup(ring: &DmaRing) {
    let dma2_regs = unsafe { &(*DMA2::ptr()) };
    let rcc_regs = unsafe { &(*RCC::ptr()) };

    // Enable peripheral clock
    rcc_regs.ahb1enr.modify(|_, w| w.dma2en().set_bit());

    unsafe {
        // Clear any stale interrupts
        dma2_regs.lifcr.write(|w| w.bits(STREAM1_FLAGS));

        // Configure DMA
        dma2_regs.st[DMA_STREAM].cr.write(|w| {
            w
                // DME interrupt
                .dmeie()
                .set_bit()
                // TE interrupt
                .teie()
                .set_bit()
                // TC interrupt
                .tcie()
                .set_bit()
                // Flow controller (0 = DMA, 1 = peripheral)
                .pfctrl()
                .clear_bit()
                // Direction
                .dir()
                .peripheral_to_memory()
                // Circular mode
                .circ()
                .set_bit()
                // Peripheral address increment
                .pinc()
                .clear_bit()
                // Memory address increment
                .minc()
                .set_bit()
                // Peripheral transfer size
                .psize()
                .bits32()
                // Memory transfer size
                .msize()
                .bits32()
                // Priority level
                .pl()
                .high()
                // Double buffer mode, starting on memory 0
                .dbm()
                .set_bit()
                .ct()
                .clear_bit()
                // Peripheral burst
                .pburst()
                .single()
                // Memory burst
                .mburst()
                .single()
                // Channel
                .chsel()
                .bits(DMA_CHANNEL)
        });
    }

    // Configure addresses and size
    let (addr0, addr1) = ring.initial_addresses();
    dma2_regs.st[DMA_STREAM]
        .ndtr
        .write(|w| w.ndt().bits(ring.items_per_transfer()));
    dma2_regs.st[DMA_STREAM]
        .par
        .write(|w| w.pa().bits(DCMI_DR_ADDR));
    dma2_update_addr0(addr0 as u32);
    dma2_update_addr1(addr1 as u32);
}

/// Update DMA2 memory target 0. Only valid while the stream is writing target 1.
fn dma2_update_addr0(address: u32) {
    let dma2_regs = unsafe { &(*DMA2::ptr()) };
    dma2_regs.st[DMA_STREAM]
        .m0ar
        .write(|w| w.m0a().bits(address));
}

/// Update DMA2 memory target 1. Only valid while the stream is writing target 0.
fn dma2_update_addr1(address: u32) {
    let dma2_regs = unsafe { &(*DMA2::ptr()) };
    dma2_regs.st[DMA_STREAM]
        .m1ar
        .write(|w| w.m1a().bits(address));
}

/// Start DCMI capture.
fn start_capture() {
    let dma2_regs = unsafe { &(*DMA2::ptr()) };
    let dcmi_regs = unsafe { &(*DCMI::ptr()) };

    // Enable the completion interrupt
    unsafe {
        NVIC::unmask::<interrupt>(interrupt::DMA2_STREAM1);
    }

    // Enable DMA2
    dma2_regs.st[DMA_STREAM].cr.modify(|_, w| w.en().set_bit());

    // Enable the DCMI peripheral and start capture
    dcmi_regs
        .cr
        .modify(|_, w| w.enable().set_bit().capture().set_bit());
}

/// Stop DCMI capture.
fn stop_capture() {
    let dma2_regs = unsafe { &(*DMA2::ptr()) };
    let dcmi_regs = unsafe { &(*DCMI::ptr()) };

    // Disable the DCMI peripheral and stop capture
    dcmi_regs
        .cr
        .modify(|_, w| w.enable().clear_bit().capture().clear_bit());

    // Disable DMA2 and wait for the stream to drain
    dma2_regs.st[DMA_STREAM]
        .cr
        .modify(|_, w| w.en().clear_bit());
    while dma2_regs.st[DMA_STREAM].cr.read().en().bit_is_set() {}
}
