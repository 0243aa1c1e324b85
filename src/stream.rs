//! Streaming state machine.
//!
//! `transition` decides what to do from the current state and a snapshot of the USB link; it
//! has no side effects. `StreamingContext` owns everything the camera streams with and carries
//! out the decision.

use crate::cache::CacheMaintenance;
use crate::capture::{CaptureController, CaptureError, CaptureHardware, ReadyConsumer, ReadyProducer};
use crate::format::{Layout, PixelFormat, Resolution, StreamConfig};
use crate::frame_buf::{BufferPool, Owner};
use crate::sensor::{ImageSensor, SensorProfile};
use crate::uvc::{LinkState, TransferStatus, UsbVideoFunction};
use heapless::{consts, Vec};

/// Resolution the sensor is programmed for at boot.
#[cfg(feature = "boot-vga")]
pub const BOOT_RESOLUTION: Resolution = Resolution::Vga;

/// Resolution the sensor is programmed for at boot.
#[cfg(not(feature = "boot-vga"))]
pub const BOOT_RESOLUTION: Resolution = Resolution::Qvga;

/// Resolution streamed when the host asks for a format code the camera does not know.
pub const FALLBACK_RESOLUTION: Resolution = Resolution::Qvga;

/// Unrecoverable conditions. The camera stops in place and reports which one occurred.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fault {
    /// No sensor answered on the bus.
    SensorDetection,
    /// The sensor rejected the register setup for a resolution.
    SensorSetup(Resolution),
    /// The sensor cannot report an output geometry for a resolution.
    SensorOutput(Resolution),
    /// The capture hardware rejected its configuration.
    Capture(CaptureError),
}

/// Streaming state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamState {
    /// No video negotiated, capture stopped.
    Idle,
    /// Capture running, frames flowing to the host.
    Previewing(StreamConfig),
    /// A fault stopped the camera. Nothing leaves this state.
    Halted(Fault),
}

/// What the control loop sees of the USB side in one iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LinkSnapshot {
    pub link: LinkState,
    pub video_on: bool,
    pub frame_format: u8,
}

impl LinkSnapshot {
    /// Sample the USB video function.
    pub fn read<U: UsbVideoFunction>(usb: &U) -> Self {
        LinkSnapshot {
            link: usb.link_state(),
            video_on: usb.is_video_on(),
            frame_format: usb.frame_format(),
        }
    }
}

/// Resolution picked from the host's format code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormatSelection {
    pub resolution: Resolution,
    /// The code was unknown and `FALLBACK_RESOLUTION` was substituted.
    pub fallback: bool,
}

impl FormatSelection {
    pub fn from_format_code(code: u8) -> Self {
        match Resolution::from_format_code(code) {
            Some(resolution) => FormatSelection {
                resolution,
                fallback: false,
            },
            None => FormatSelection {
                resolution: FALLBACK_RESOLUTION,
                fallback: true,
            },
        }
    }
}

/// Outcome of one evaluation of the state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
    Stay,
    Start(FormatSelection),
    Stop,
}

/// Next move for `state` given `link`. Nothing happens until the host has configured the
/// device.
pub fn transition(state: &StreamState, link: &LinkSnapshot) -> Transition {
    if link.link < LinkState::Configured {
        return Transition::Stay;
    }

    match state {
        StreamState::Idle if link.video_on => {
            Transition::Start(FormatSelection::from_format_code(link.frame_format))
        }
        StreamState::Previewing(_) if !link.video_on => Transition::Stop,
        _ => Transition::Stay,
    }
}

/// Everything the camera streams with, owned by the control loop and shared with the capture
/// completion interrupt.
pub struct StreamingContext<'a, H, C> {
    pub pool: BufferPool<'a>,
    pub cache: C,
    pub capture: CaptureController<H>,
    pub profile: SensorProfile,
    state: StreamState,
    /// Frame buffer last handed to the transmitter.
    on_air: Option<u8>,
}

impl<'a, H, C> StreamingContext<'a, H, C>
where
    H: CaptureHardware,
    C: CacheMaintenance,
{
    /// Detect the sensor and program it for `BOOT_RESOLUTION`. The context starts out `Idle`.
    pub fn boot<S: ImageSensor>(
        sensor: &mut S,
        pool: BufferPool<'a>,
        cache: C,
        hardware: H,
    ) -> Result<Self, Fault> {
        let profile = sensor.detect().ok_or(Fault::SensorDetection)?;
        log!(
            "Sensor {} detected ({:04X}:{:04X})",
            profile.name,
            profile.manufacturer_id,
            profile.product_id
        );

        sensor
            .setup(&profile, BOOT_RESOLUTION, PixelFormat::Yuv422)
            .map_err(|e| {
                log!("Sensor setup failed: {:?}", e);
                Fault::SensorSetup(BOOT_RESOLUTION)
            })?;

        Ok(StreamingContext {
            pool,
            cache,
            capture: CaptureController::new(hardware),
            profile,
            state: StreamState::Idle,
            on_air: None,
        })
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Frame buffer the transmitter was last pointed at.
    pub fn on_air(&self) -> Option<u8> {
        self.on_air
    }

    /// Carry out `step`.
    pub fn apply<S, U>(
        &mut self,
        step: Transition,
        sensor: &mut S,
        usb: &mut U,
        ready: &mut ReadyConsumer,
    ) where
        S: ImageSensor,
        U: UsbVideoFunction,
    {
        match step {
            Transition::Stay => {}
            Transition::Start(selection) => {
                self.state = match self.start_preview(selection, sensor, usb, ready) {
                    Ok(config) => StreamState::Previewing(config),
                    Err(fault) => {
                        log!("Streaming halted: {:?}", fault);
                        StreamState::Halted(fault)
                    }
                };
            }
            Transition::Stop => {
                self.stop_preview(ready);
                self.state = StreamState::Idle;
            }
        }
    }

    /// Capture completion interrupt entry point.
    pub fn on_capture_complete(&mut self, ready: &mut ReadyProducer) {
        self.capture
            .on_interrupt(&mut self.pool, &mut self.cache, ready);

        // An overrun took the transmitter's buffer back, it no longer owns a frame
        if self.on_air.is_some() && self.capture.writing() == self.on_air {
            self.on_air = None;
        }
    }

    /// Drain the buffer-ready channel and hand the newest published frame to the transmitter.
    ///
    /// Entries whose buffer an overrun took back are skipped. Older published frames and the
    /// frame the transmitter was sending go back to the pool. Returns the forwarded index, if
    /// any.
    pub fn forward_latest<U: UsbVideoFunction>(
        &mut self,
        ready: &mut ReadyConsumer,
        usb: &mut U,
    ) -> Option<u8> {
        let mut pending: Vec<u8, consts::U4> = Vec::new();
        while let Some(index) = ready.dequeue() {
            if pending.push(index).is_err() {
                break;
            }
        }

        let latest = pending
            .iter()
            .rev()
            .copied()
            .find(|&index| self.pool.owner(index) == Some(Owner::Transmit));
        let latest = match latest {
            Some(index) => index,
            None => return None,
        };

        for &index in pending.iter() {
            if index != latest && self.pool.owner(index) == Some(Owner::Transmit) {
                self.pool.release(index).ok();
            }
        }
        if let Some(previous) = self.on_air.replace(latest) {
            if previous != latest && self.pool.owner(previous) == Some(Owner::Transmit) {
                self.pool.release(previous).ok();
            }
        }
        usb.update_frame_idx(latest);
        Some(latest)
    }

    fn start_preview<S, U>(
        &mut self,
        selection: FormatSelection,
        sensor: &mut S,
        usb: &mut U,
        ready: &mut ReadyConsumer,
    ) -> Result<StreamConfig, Fault>
    where
        S: ImageSensor,
        U: UsbVideoFunction,
    {
        let resolution = selection.resolution;
        if selection.fallback {
            log!("Only VGA and QVGA formats are supported, using QVGA");
        }

        // Nothing from a previous session may reach the host
        self.pool.reset_all(&mut self.cache);
        while ready.dequeue().is_some() {}
        self.on_air = None;

        sensor
            .setup(&self.profile, resolution, PixelFormat::Yuv422)
            .map_err(|e| {
                log!("Sensor setup failed: {:?}", e);
                Fault::SensorSetup(resolution)
            })?;
        let output = sensor
            .output(&self.profile, resolution, PixelFormat::Yuv422)
            .ok_or(Fault::SensorOutput(resolution))?;
        log!(
            "Bit width = {}, Image Width = {}, Image Height = {}",
            output.bit_width,
            output.width,
            output.height
        );

        let config = StreamConfig {
            resolution,
            format: PixelFormat::Yuv422,
            input_bits: output.bit_width,
            width: output.width,
            height: output.height,
            buffer_count: self.pool.count(),
            layout: Layout::Packed8,
        };
        self.capture
            .configure(&config, &self.pool)
            .map_err(Fault::Capture)?;
        self.capture
            .start(&mut self.pool)
            .map_err(Fault::Capture)?;

        // The USB side waits for a completion before sending its first payload
        usb.payload_sent(None, TransferStatus::Success, 0, 0);
        log!("Video started");
        Ok(config)
    }

    fn stop_preview(&mut self, ready: &mut ReadyConsumer) {
        self.capture.stop(&mut self.pool);
        while let Some(index) = ready.dequeue() {
            self.pool.release(index).ok();
        }
        if let Some(index) = self.on_air.take() {
            self.pool.release(index).ok();
        }
        log!("Video stopped");
    }
}
