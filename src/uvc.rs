//! Interface to the USB video function driver.
//!
//! The USB stack (enumeration, descriptors, the isochronous endpoint) lives below this crate.
//! It reports link and streaming state from its interrupt and sends payloads from the frame
//! buffer the control loop points it at.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// USB device state, ordered so that `state >= LinkState::Configured` means the host has
/// finished enumeration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum LinkState {
    Suspended,
    Attached,
    Powered,
    Default,
    Address,
    Configured,
}

impl LinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LinkState::Attached,
            2 => LinkState::Powered,
            3 => LinkState::Default,
            4 => LinkState::Address,
            5 => LinkState::Configured,
            _ => LinkState::Suspended,
        }
    }
}

/// Completion status of a payload transfer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferStatus {
    Success,
    Aborted,
}

/// Operations the orchestration layer needs from the USB video function.
pub trait UsbVideoFunction {
    /// Current USB device state.
    fn link_state(&self) -> LinkState;

    /// `true` while the host has the streaming interface's video alternate setting selected.
    fn is_video_on(&self) -> bool;

    /// Format code committed by the host: 1 for QVGA, 2 for VGA. Other values are possible.
    fn frame_format(&self) -> u8;

    /// Point the transmitter at frame buffer `index` for its next payload.
    fn update_frame_idx(&mut self, index: u8);

    /// Payload transfer completion. Called with no payload to start the first transfer.
    fn payload_sent(
        &mut self,
        payload: Option<&[u8]>,
        status: TransferStatus,
        offset: usize,
        length: usize,
    );
}

/// Marker for "no frame index".
const NO_FRAME: u8 = 0xFF;

/// State shared between the USB interrupt and the control loop. Every field is a single atomic
/// so either side can update it without a critical section.
pub struct UvcLink {
    link_state: AtomicU8,
    video_on: AtomicBool,
    frame_format: AtomicU8,
    frame_idx: AtomicU8,
    payload_kick: AtomicBool,
    buffers_base: AtomicUsize,
    buffers_stride: AtomicUsize,
    buffers_count: AtomicU8,
}

impl UvcLink {
    pub const fn new() -> Self {
        UvcLink {
            link_state: AtomicU8::new(0),
            video_on: AtomicBool::new(false),
            frame_format: AtomicU8::new(0),
            frame_idx: AtomicU8::new(NO_FRAME),
            payload_kick: AtomicBool::new(false),
            buffers_base: AtomicUsize::new(0),
            buffers_stride: AtomicUsize::new(0),
            buffers_count: AtomicU8::new(0),
        }
    }

    /// USB stack: device state changed.
    pub fn set_link_state(&self, state: LinkState) {
        self.link_state.store(state as u8, Ordering::Release);
    }

    /// USB stack: streaming interface alternate setting changed.
    pub fn set_video_on(&self, on: bool) {
        self.video_on.store(on, Ordering::Release);
    }

    /// USB stack: host committed a format in the video probe/commit control.
    pub fn commit_frame_format(&self, code: u8) {
        self.frame_format.store(code, Ordering::Release);
    }

    /// Tell the transmitter where the frame buffers are.
    pub fn bind_buffers(&self, base: usize, stride: usize, count: u8) {
        self.buffers_base.store(base, Ordering::Relaxed);
        self.buffers_stride.store(stride, Ordering::Relaxed);
        self.buffers_count.store(count, Ordering::Release);
    }

    /// USB stack: take the most recent frame index, if a new one was posted.
    pub fn take_frame_idx(&self) -> Option<u8> {
        match self.frame_idx.swap(NO_FRAME, Ordering::AcqRel) {
            NO_FRAME => None,
            index => Some(index),
        }
    }

    /// USB stack: `true` once after the control loop asked for the first transfer.
    pub fn take_payload_kick(&self) -> bool {
        self.payload_kick.swap(false, Ordering::AcqRel)
    }

    /// Address of frame buffer `index`, for the transmitter to send from.
    pub fn frame_address(&self, index: u8) -> Option<usize> {
        if index >= self.buffers_count.load(Ordering::Acquire) {
            return None;
        }
        let base = self.buffers_base.load(Ordering::Relaxed);
        let stride = self.buffers_stride.load(Ordering::Relaxed);
        Some(base + index as usize * stride)
    }
}

impl Default for UvcLink {
    fn default() -> Self {
        UvcLink::new()
    }
}

impl UsbVideoFunction for &UvcLink {
    fn link_state(&self) -> LinkState {
        LinkState::from_u8(self.link_state.load(Ordering::Acquire))
    }

    fn is_video_on(&self) -> bool {
        self.video_on.load(Ordering::Acquire)
    }

    fn frame_format(&self) -> u8 {
        self.frame_format.load(Ordering::Acquire)
    }

    fn update_frame_idx(&mut self, index: u8) {
        // Latest index wins, the transmitter skips anything it did not pick up in time
        self.frame_idx.store(index, Ordering::Release);
    }

    fn payload_sent(
        &mut self,
        payload: Option<&[u8]>,
        status: TransferStatus,
        _offset: usize,
        _length: usize,
    ) {
        if payload.is_none() && status == TransferStatus::Success {
            self.payload_kick.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_state_ordering() {
        assert!(LinkState::Address < LinkState::Configured);
        assert!(LinkState::Suspended < LinkState::Attached);

        let link = UvcLink::new();
        let usb = &link;
        assert_eq!(usb.link_state(), LinkState::Suspended);
        link.set_link_state(LinkState::Configured);
        assert_eq!(usb.link_state(), LinkState::Configured);
    }

    #[test]
    fn frame_index_handoff() {
        let link = UvcLink::new();
        let mut usb = &link;
        assert_eq!(link.take_frame_idx(), None);

        usb.update_frame_idx(1);
        usb.update_frame_idx(2);
        assert_eq!(link.take_frame_idx(), Some(2));
        assert_eq!(link.take_frame_idx(), None);
    }

    #[test]
    fn payload_kick_is_consumed_once() {
        let link = UvcLink::new();
        let mut usb = &link;
        usb.payload_sent(None, TransferStatus::Success, 0, 0);
        assert!(link.take_payload_kick());
        assert!(!link.take_payload_kick());
    }

    #[test]
    fn frame_addresses() {
        let link = UvcLink::new();
        assert_eq!(link.frame_address(0), None);
        link.bind_buffers(0xC000_0000, 0x1000, 4);
        assert_eq!(link.frame_address(3), Some(0xC000_3000));
        assert_eq!(link.frame_address(4), None);
    }
}
