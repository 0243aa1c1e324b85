//! OV9655 device driver.

pub mod sccb;

use crate::format::{PixelFormat, Resolution};
use crate::sensor::{ImageSensor, SensorProfile};
use embedded_hal::blocking::{delay::DelayMs, i2c};
use sccb::{RegMap, Register, Sccb, SccbError, OV9655_ADDRESS};

/// Time to let the registers settle after a soft reset, in milliseconds.
pub const RESET_SETTLE_MS: u16 = 1000;

/// Modes the OV9655 is set up for.
const RESOLUTIONS: &[Resolution] = &[Resolution::Qvga, Resolution::Vga];

/// OV9655 errors.
#[derive(Debug, Eq, PartialEq)]
pub enum Ov9655Error<E> {
    Sccb(SccbError<E>),
    /// Resolution has no register table.
    UnsupportedResolution,
    /// Only YUV 4:2:2 output is configured.
    UnsupportedFormat,
}

impl<E> From<SccbError<E>> for Ov9655Error<E> {
    fn from(e: SccbError<E>) -> Self {
        Ov9655Error::Sccb(e)
    }
}

/// OV9655 on an I2C (SCCB) bus.
pub struct Ov9655<I2C, D> {
    i2c: I2C,
    sccb: Sccb<I2C>,
    delay: D,
}

impl<I2C, D, E> Ov9655<I2C, D>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
    D: DelayMs<u16>,
{
    pub fn new(i2c: I2C, delay: D) -> Self {
        Ov9655 {
            i2c,
            sccb: Sccb::new(OV9655_ADDRESS),
            delay,
        }
    }

    /// Give back the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Soft reset the sensor and check its identity.
    fn probe(&mut self) -> Result<(u16, u16), SccbError<E>> {
        self.sccb.reset(&mut self.i2c)?;
        self.delay.delay_ms(RESET_SETTLE_MS);
        self.sccb.check_id(&mut self.i2c)
    }
}

impl<I2C, D, E> ImageSensor for Ov9655<I2C, D>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
    D: DelayMs<u16>,
    E: core::fmt::Debug,
{
    type Error = Ov9655Error<E>;

    fn detect(&mut self) -> Option<SensorProfile> {
        match self.probe() {
            Ok((manufacturer_id, product_id)) => Some(SensorProfile {
                name: "OV9655",
                manufacturer_id,
                product_id,
                output_bits: 8,
                resolutions: RESOLUTIONS,
                format: PixelFormat::Yuv422,
            }),
            Err(e) => {
                log!("OV9655 not detected: {:?}", e);
                None
            }
        }
    }

    fn setup(
        &mut self,
        profile: &SensorProfile,
        resolution: Resolution,
        format: PixelFormat,
    ) -> Result<(), Self::Error> {
        if format != PixelFormat::Yuv422 {
            return Err(Ov9655Error::UnsupportedFormat);
        }
        if !profile.supports(resolution, format) {
            return Err(Ov9655Error::UnsupportedResolution);
        }

        let mut reg_vals = RegMap::new();
        yuv_config(&mut reg_vals);
        match resolution {
            Resolution::Vga => vga_config(&mut reg_vals),
            Resolution::Qvga => qvga_config(&mut reg_vals),
        }

        self.sccb.apply_config(&mut self.i2c, &reg_vals, false)?;
        Ok(())
    }
}

/// Insert into a register map, the maps below are sized to hold every entry.
fn set(reg_vals: &mut RegMap, reg: u8, val: u8) {
    reg_vals.insert(reg, val).ok();
}

/// Register values shared by every mode: VGA frame timing with YUV 4:2:2 output.
fn yuv_config(reg_vals: &mut RegMap) {
    // 15 fps VGA with YUV output data format
    set(reg_vals, Register::COM_CNTRL_07, 0x60);

    // Input clock divided by 2
    set(reg_vals, Register::CLK_RC, 0x01);

    // HREF, VSYNC and PCLK left at their default polarity, DCMI samples VSYNC active high
    set(reg_vals, Register::COM_CNTRL_10, 0x00);

    // Full output range (0x00 --> 0xFF), YUV
    set(reg_vals, Register::COM_CNTRL_15, 0xc0);

    // YUYV byte order, which is what YUY2 on the USB side expects
    set(reg_vals, Register::TSLB, 0xcc);
    set(reg_vals, Register::COM_CNTRL_13, 0x99);

    // Enable auto white balance, gain control and exposure control
    set(reg_vals, Register::COM_CNTRL_08, 0xc7);
    set(reg_vals, Register::COM_CNTRL_09, 0x3a);

    // Exposure step and optical black settings
    set(reg_vals, Register::COM_CNTRL_05, 0x61);
    set(reg_vals, Register::COM_CNTRL_06, 0x40);
    set(reg_vals, Register::COM_CNTRL_11, 0x04);

    // No mirror and no vertical flip
    set(reg_vals, Register::MIRROR_VFLIP, 0x00);

    // VGA output window
    set(reg_vals, Register::HSTART, 0x16);
    set(reg_vals, Register::HSTOP, 0x02);
    set(reg_vals, Register::HREF, 0xff);
    set(reg_vals, Register::VSTART, 0x01);
    set(reg_vals, Register::VSTOP, 0x3d);
    set(reg_vals, Register::VREF, 0x12);
}

/// Full 640x480 output, no scaling.
fn vga_config(reg_vals: &mut RegMap) {
    set(reg_vals, Register::COM_CNTRL_16, 0x00);
    set(reg_vals, Register::PIX_OUT_INDX, 0x00);
    set(reg_vals, Register::PIX_CLK_DIVD, 0x00);
    set(reg_vals, Register::PIX_HOR_SCAL, 0x10);
    set(reg_vals, Register::PIX_VER_SCAL, 0x10);
}

/// Scale the VGA frame down by half both vertically and horizontally (640x480 --> 320x240).
fn qvga_config(reg_vals: &mut RegMap) {
    // Scale down ON
    set(reg_vals, Register::COM_CNTRL_16, 0x01);

    // Reduce resolution by half both vertically and horizontally
    set(reg_vals, Register::PIX_OUT_INDX, 0x11);

    // Pixel clock output divided to match the lower data rate
    set(reg_vals, Register::PIX_CLK_DIVD, 0x01);

    // Horizontal and vertical scaling
    set(reg_vals, Register::PIX_HOR_SCAL, 0x10);
    set(reg_vals, Register::PIX_VER_SCAL, 0x10);
}
