//! USB webcam firmware for the STM32F746G Discovery board with an OV9655 camera module.

#![no_main]
#![no_std]

use core::panic::PanicInfo;
use cortex_m::asm;
use heapless::spsc::Queue;
use rtic::Mutex;
use rtt_target::{rprintln, rtt_init, set_print_channel};
use stm32f7xx_hal::{
    delay::Delay,
    i2c::{BlockingI2c, Mode},
    prelude::*,
    rcc::{HSEClock, HSEClockMode},
};
use usb_webcam_rs::{
    board::{self, sdram, stm32f746_disco, SccbBus},
    cache::CortexMCache,
    capture::{dcmi::DcmiCapture, ReadyConsumer, ReadyProducer, ReadyQueue},
    control,
    format::MAX_FRAME_SIZE,
    frame_buf::{BufferPool, NUM_FRAME_BUFFER},
    ov9655::Ov9655,
    stream::{StreamState, StreamingContext},
    uvc::UvcLink,
};

type Context = StreamingContext<'static, DcmiCapture, CortexMCache>;
type Sensor = Ov9655<SccbBus, Delay>;

/// Link to the USB video function. The USB stack updates it from its own interrupt.
pub static UVC: UvcLink = UvcLink::new();

#[rtic::app(device = stm32f7xx_hal::pac, peripherals = true)]
const APP: () = {
    struct Resources {
        ctx: Context,
        sensor: Sensor,
        ready_tx: ReadyProducer<'static>,
        ready_rx: ReadyConsumer<'static>,
    }

    #[init]
    fn init(cx: init::Context) -> init::LateResources {
        static mut READY: ReadyQueue = Queue(heapless::i::Queue::new());

        // Setup RTT for logging
        let channels = rtt_init! {
            up: {
                0: {
                    size: 4096
                    mode: NoBlockSkip
                    name: "Terminal"
                }
            }
        };
        set_print_channel(channels.up.0);

        let mut core = cx.core;
        let device = cx.device;

        // Clocks
        let mut rcc = device.RCC.constrain();
        let hse_cfg = HSEClock::new(stm32f746_disco::get_hse_freq(), HSEClockMode::Oscillator);
        let clocks = rcc
            .cfgr
            .hse(hse_cfg)
            .sysclk(stm32f746_disco::get_sysclk_freq())
            .freeze();
        let mut delay = Delay::new(core.SYST, clocks);

        // Frame buffers in SDRAM, caches on
        let region = sdram::init(&clocks, &mut delay);
        let pool = match BufferPool::new(region, NUM_FRAME_BUFFER, MAX_FRAME_SIZE) {
            Ok(pool) => pool,
            Err(e) => park(format_args!("Frame buffer pool: {:?}", e)),
        };
        UVC.bind_buffers(pool.base_address(), pool.slot_size(), pool.count());
        let cache = CortexMCache::new(core.SCB, &mut core.CPUID);

        // Sensor on I2C1
        let i2c_pins = stm32f746_disco::configure_camera_pins();
        let i2c = BlockingI2c::i2c1(
            device.I2C1,
            i2c_pins,
            Mode::standard(board::SCCB_FREQ_KHZ.khz()),
            clocks,
            &mut rcc.apb1,
            board::SCCB_TIMEOUT,
        );
        let mut sensor = Ov9655::new(i2c, delay);

        let capture = DcmiCapture::new(device.DCMI, device.DMA2);
        let ctx = match StreamingContext::boot(&mut sensor, pool, cache, capture) {
            Ok(ctx) => ctx,
            Err(fault) => park(format_args!("Boot failed: {:?}", fault)),
        };
        rprintln!("Camera ready");

        let (ready_tx, ready_rx) = READY.split();
        init::LateResources {
            ctx,
            sensor,
            ready_tx,
            ready_rx,
        }
    }

    #[idle(resources = [ctx, sensor, ready_rx])]
    fn idle(mut cx: idle::Context) -> ! {
        let mut usb = &UVC;
        let sensor = cx.resources.sensor;
        let ready = cx.resources.ready_rx;

        loop {
            let state = cx
                .resources
                .ctx
                .lock(|ctx| *control::poll(ctx, &mut *sensor, &mut usb, &mut *ready));

            if let StreamState::Halted(fault) = state {
                park(format_args!("Camera halted: {:?}", fault));
            }
        }
    }

    #[task(binds = DMA2_STREAM1, priority = 2, resources = [ctx, ready_tx])]
    fn capture_complete(cx: capture_complete::Context) {
        cx.resources.ctx.on_capture_complete(cx.resources.ready_tx);
    }
};

/// Report an unrecoverable condition once and sleep forever.
fn park(reason: core::fmt::Arguments) -> ! {
    rprintln!("{}", reason);
    loop {
        asm::wfi();
    }
}

#[inline(never)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    rprintln!("Panicked!");
    rprintln!("{:?}", info);
    loop {}
}
