//! Main control loop body.

use crate::cache::CacheMaintenance;
use crate::capture::{CaptureHardware, ReadyConsumer};
use crate::sensor::ImageSensor;
use crate::stream::{transition, LinkSnapshot, StreamState, StreamingContext};
use crate::uvc::UsbVideoFunction;

/// One iteration of the control loop. Never blocks.
///
/// Samples the USB link, moves the state machine, then hands the newest buffer the capture
/// interrupt reported since the last call to the transmitter. Outside of `Previewing` the
/// reported buffers are discarded.
pub fn poll<'c, 'a, H, C, S, U>(
    ctx: &'c mut StreamingContext<'a, H, C>,
    sensor: &mut S,
    usb: &mut U,
    ready: &mut ReadyConsumer,
) -> &'c StreamState
where
    H: CaptureHardware,
    C: CacheMaintenance,
    S: ImageSensor,
    U: UsbVideoFunction,
{
    let link = LinkSnapshot::read(usb);
    let step = transition(ctx.state(), &link);
    ctx.apply(step, sensor, usb, ready);

    if matches!(ctx.state(), StreamState::Previewing(_)) {
        ctx.forward_latest(ready, usb);
    } else {
        while ready.dequeue().is_some() {}
    }

    ctx.state()
}
