//! Board specific functions for the STM32F746G Discovery Board.

use stm32f7xx_hal::{
    gpio::{self, Alternate, Speed, AF4},
    pac,
    prelude::*,
    time::MegaHertz,
};

/// Helper macro for DCMI pins: alternate function 13, pulled up, as fast as the port allows.
macro_rules! dcmi_pins {
    ($($pin:expr),*) => {
        (
            $(
                $pin.into_alternate_af13()
                    .internal_pull_up(true)
                    .set_open_drain()
                    .set_speed(Speed::VeryHigh)
            ),*
        )
    };
}

/// Configure the pins of the camera connector (P1) and return the SCCB pins for the I2C
/// driver. Peripherals are stolen, so this should only be done during init!
///
/// Pin configuration:
///
///     I2C1 SCL:   PB8  --> OV9655 SIOC
///     I2C1 SDA:   PB9 <--> OV9655 SIOD
///     (HW OSC 24M)     --> OV9655 XCLK
///     DCMI PCLK:  PA6  <-- OV9655 PCLK
///     DCMI HSYNC: PA4  <-- OV9655 HREF
///     DCMI VSYNC: PG9  <-- OV9655 VSYNC
///     DCMI D0:    PH9  <-- OV9655 D2
///     DCMI D1:    PH10 <-- OV9655 D3
///     DCMI D2:    PH11 <-- OV9655 D4
///     DCMI D3:    PH12 <-- OV9655 D5
///     DCMI D4:    PH14 <-- OV9655 D6
///     DCMI D5:    PD3  <-- OV9655 D7
///     DCMI D6:    PE5  <-- OV9655 D8
///     DCMI D7:    PE6  <-- OV9655 D9
pub fn configure_camera_pins() -> (
    gpio::gpiob::PB8<Alternate<AF4>>,
    gpio::gpiob::PB9<Alternate<AF4>>,
) {
    let pac_periph = unsafe { pac::Peripherals::steal() };
    let gpioa = pac_periph.GPIOA.split();
    let gpiob = pac_periph.GPIOB.split();
    let gpiod = pac_periph.GPIOD.split();
    let gpioe = pac_periph.GPIOE.split();
    let gpiog = pac_periph.GPIOG.split();
    let gpioh = pac_periph.GPIOH.split();

    let scl = gpiob
        .pb8
        .into_alternate_af4()
        .internal_pull_up(true)
        .set_open_drain();
    let sda = gpiob
        .pb9
        .into_alternate_af4()
        .internal_pull_up(true)
        .set_open_drain();

    // Sync and pixel clock
    let _dcmi_sync = dcmi_pins! {
        gpioa.pa6, // PCLK
        gpioa.pa4, // HSYNC
        gpiog.pg9  // VSYNC
    };

    // 8-bit data bus
    let _dcmi_data = dcmi_pins! {
        gpioh.ph9,  // D0
        gpioh.ph10, // D1
        gpioh.ph11, // D2
        gpioh.ph12, // D3
        gpioh.ph14, // D4
        gpiod.pd3,  // D5
        gpioe.pe5,  // D6
        gpioe.pe6   // D7
    };

    (scl, sda)
}

/// The 25 MHz external oscillator on the board (X2) is the source for HSE.
pub fn get_hse_freq() -> MegaHertz {
    25.mhz()
}

/// Core clock the firmware runs at.
pub fn get_sysclk_freq() -> MegaHertz {
    216.mhz()
}
