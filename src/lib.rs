//! A USB video class webcam: capture-to-stream orchestration between an image sensor capture
//! pipeline and a USB video function.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod util;

pub mod cache;
pub mod capture;
pub mod control;
pub mod format;
pub mod frame_buf;
pub mod ov9655;
pub mod sensor;
pub mod stream;
pub mod uvc;

/// Support for the STM32F746G Discovery board.
#[cfg(feature = "firmware")]
pub mod board;
