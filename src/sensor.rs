//! Interface to the image sensor driver.

use crate::format::{PixelFormat, Resolution};

/// Capabilities of the attached sensor. Created once by detection, read-only afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SensorProfile {
    pub name: &'static str,
    pub manufacturer_id: u16,
    pub product_id: u16,
    /// Width of the parallel data bus in bits.
    pub output_bits: u8,
    pub resolutions: &'static [Resolution],
    pub format: PixelFormat,
}

impl SensorProfile {
    /// `true` if the sensor can output `resolution` in `format`.
    pub fn supports(&self, resolution: Resolution, format: PixelFormat) -> bool {
        format == self.format && self.resolutions.contains(&resolution)
    }
}

/// What the sensor puts on the bus for a given mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SensorOutput {
    pub bit_width: u8,
    pub width: u16,
    pub height: u16,
}

/// Image sensor driver. The driver owns its control bus.
pub trait ImageSensor {
    type Error: core::fmt::Debug;

    /// Probe the bus for the sensor, returning its profile if one answers with the expected
    /// identity.
    fn detect(&mut self) -> Option<SensorProfile>;

    /// Program the sensor for `resolution` in `format`.
    fn setup(
        &mut self,
        profile: &SensorProfile,
        resolution: Resolution,
        format: PixelFormat,
    ) -> Result<(), Self::Error>;

    /// Output geometry for a mode, or `None` if the sensor cannot produce it.
    fn output(
        &self,
        profile: &SensorProfile,
        resolution: Resolution,
        format: PixelFormat,
    ) -> Option<SensorOutput> {
        if !profile.supports(resolution, format) {
            return None;
        }
        let (width, height) = resolution.dimensions();
        Some(SensorOutput {
            bit_width: profile.output_bits,
            width,
            height,
        })
    }
}
