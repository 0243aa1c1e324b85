//! Serial Camera Control Bus access to the OV9655 over any embedded-hal blocking I2C bus.

use core::marker::PhantomData;
use embedded_hal::blocking::i2c;
use heapless::{consts, LinearMap};

/// Statically allocated linear map of register addresses (`u8`) to values (`u8`), applied in
/// insertion order.
pub type RegMap = LinearMap<u8, u8, consts::U64>;

/// Device address is 0x60, however the I2C driver will left-shift the provided address by 1.
pub const OV9655_ADDRESS: u8 = 0x30;

/// Expected manufacturer ID.
pub const OV9655_MANF_ID: u16 = 0x7FA2;

/// Expected product ID.
pub const OV9655_PROD_ID: u16 = 0x9657;

/// SCCB errors.
#[derive(Debug, Eq, PartialEq)]
pub enum SccbError<E> {
    /// I2C write error.
    I2cWrite(E),
    /// I2C read error.
    I2cRead(E),
    /// Manufacturer ID mismatch, carries the value read.
    ManfId(u16),
    /// Product ID mismatch, carries the value read.
    ProdId(u16),
    /// Register write-readback mismatch.
    RegMismatch((u8, u8)),
}

/// SCCB driver.
pub struct Sccb<I2C> {
    /// Marker to ensure the same I2C type is used in all calls.
    i2c: PhantomData<I2C>,
    /// Device I2C address.
    address: u8,
}

impl<I2C, E> Sccb<I2C>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
{
    /// Creates a new SCCB driver for the device at `address`.
    pub fn new(address: u8) -> Self {
        Sccb {
            i2c: PhantomData,
            address,
        }
    }

    /// Read a register, must be two seperate transactions since SCCB has no repeated start.
    pub fn read_register(&self, i2c: &mut I2C, reg: u8) -> Result<u8, SccbError<E>> {
        i2c.write(self.address, &[reg]).map_err(SccbError::I2cWrite)?;

        let mut buf = [0x00];
        i2c.read(self.address, &mut buf).map_err(SccbError::I2cRead)?;
        Ok(buf[0])
    }

    /// Write a register.
    pub fn write_register(&self, i2c: &mut I2C, reg: u8, val: u8) -> Result<(), SccbError<E>> {
        i2c.write(self.address, &[reg, val]).map_err(SccbError::I2cWrite)
    }

    /// Reset all registers to their default values.
    pub fn reset(&self, i2c: &mut I2C) -> Result<(), SccbError<E>> {
        // Setting the upper bit of COM7 resets all the registers
        let reg = self.read_register(i2c, Register::COM_CNTRL_07)?;
        self.write_register(i2c, Register::COM_CNTRL_07, reg | 0x80)
    }

    /// Read the manufacturer and product IDs and check them against the OV9655.
    pub fn check_id(&self, i2c: &mut I2C) -> Result<(u16, u16), SccbError<E>> {
        let manf_id = self.read_u16(i2c, Register::MANF_ID_MSB, Register::MANF_ID_LSB)?;
        if manf_id != OV9655_MANF_ID {
            return Err(SccbError::ManfId(manf_id));
        }

        let prod_id = self.read_u16(i2c, Register::PROD_ID_MSB, Register::PROD_ID_LSB)?;
        if prod_id != OV9655_PROD_ID {
            return Err(SccbError::ProdId(prod_id));
        }

        Ok((manf_id, prod_id))
    }

    /// Apply a register configuration specified by the linear map.
    pub fn apply_config(
        &self,
        i2c: &mut I2C,
        map: &RegMap,
        do_readback: bool,
    ) -> Result<(), SccbError<E>> {
        for (reg, val) in map.iter() {
            self.write_register(i2c, *reg, *val)?;

            if do_readback {
                let readback = self.read_register(i2c, *reg)?;
                if readback != *val {
                    return Err(SccbError::RegMismatch((*reg, readback)));
                }
            }
        }

        Ok(())
    }

    fn read_u16(&self, i2c: &mut I2C, msb: u8, lsb: u8) -> Result<u16, SccbError<E>> {
        let hi: u16 = self.read_register(i2c, msb)?.into();
        let lo: u16 = self.read_register(i2c, lsb)?.into();
        Ok((hi << 8) | lo)
    }
}

/// Device register addresses.
pub struct Register;

impl Register {
    // Product ID registers
    pub const PROD_ID_MSB: u8 = 0x0A;
    pub const PROD_ID_LSB: u8 = 0x0B;

    // Common control registers
    pub const COM_CNTRL_05: u8 = 0x0E;
    pub const COM_CNTRL_06: u8 = 0x0F;
    pub const CLK_RC: u8 = 0x11;
    pub const COM_CNTRL_07: u8 = 0x12;
    pub const COM_CNTRL_08: u8 = 0x13;
    pub const COM_CNTRL_09: u8 = 0x14;
    pub const COM_CNTRL_10: u8 = 0x15;
    pub const COM_CNTRL_11: u8 = 0x3B;
    pub const COM_CNTRL_13: u8 = 0x3D;
    pub const COM_CNTRL_15: u8 = 0x40;
    pub const COM_CNTRL_16: u8 = 0x41;

    // Manufacturer ID registers
    pub const MANF_ID_MSB: u8 = 0x1C;
    pub const MANF_ID_LSB: u8 = 0x1D;

    // Window and output format
    pub const VREF: u8 = 0x03;
    pub const HSTART: u8 = 0x17;
    pub const HSTOP: u8 = 0x18;
    pub const VSTART: u8 = 0x19;
    pub const VSTOP: u8 = 0x1A;
    pub const MIRROR_VFLIP: u8 = 0x1E;
    pub const HREF: u8 = 0x32;
    pub const TSLB: u8 = 0x3A;

    // Scaling
    pub const PIX_OUT_INDX: u8 = 0x72;
    pub const PIX_CLK_DIVD: u8 = 0x73;
    pub const PIX_HOR_SCAL: u8 = 0x74;
    pub const PIX_VER_SCAL: u8 = 0x75;
}
