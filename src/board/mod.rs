//! Support for off-chip, board specific devices.
//! * Note: The OV9655 driver is not part of this module and has a seperate module.

pub mod sdram;
pub mod stm32f746_disco;

use stm32f7xx_hal::{
    gpio::{gpiob, Alternate, AF4},
    i2c::BlockingI2c,
    pac::I2C1,
};

/// I2C1 on PB8/PB9, the SCCB bus of the camera connector.
pub type SccbBus = BlockingI2c<
    I2C1,
    (
        gpiob::PB8<Alternate<AF4>>,
        gpiob::PB9<Alternate<AF4>>,
    ),
>;

/// Bus clock of the SCCB in kHz. The OV9655 is specified up to 400 kHz, standard mode is plenty
/// for register setup.
pub const SCCB_FREQ_KHZ: u32 = 100;

/// Cycles to wait on an unresponsive I2C bus before giving up.
pub const SCCB_TIMEOUT: u32 = 10_000;
