//! Stream formats supported by the camera.

/// Format code the host selects for QVGA in the video probe/commit control.
pub const FORMAT_CODE_QVGA: u8 = 1;

/// Format code the host selects for VGA in the video probe/commit control.
pub const FORMAT_CODE_VGA: u8 = 2;

/// Largest frame any supported format produces, in bytes. Pool slots are sized for this.
pub const MAX_FRAME_SIZE: usize = Resolution::Vga.frame_size(PixelFormat::Yuv422);

/// Image resolutions the camera can stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// 320x240, a quarter of the sensor's full frame.
    Qvga,
    /// 640x480, the sensor's full frame.
    Vga,
}

impl Resolution {
    /// Map a host format code to a resolution. Unknown codes return `None`.
    pub fn from_format_code(code: u8) -> Option<Self> {
        match code {
            FORMAT_CODE_QVGA => Some(Resolution::Qvga),
            FORMAT_CODE_VGA => Some(Resolution::Vga),
            _ => None,
        }
    }

    /// Format code advertised to the host for this resolution.
    pub fn format_code(self) -> u8 {
        match self {
            Resolution::Qvga => FORMAT_CODE_QVGA,
            Resolution::Vga => FORMAT_CODE_VGA,
        }
    }

    /// Nominal (width, height) in pixels.
    pub const fn dimensions(self) -> (u16, u16) {
        match self {
            Resolution::Qvga => (320, 240),
            Resolution::Vga => (640, 480),
        }
    }

    /// Number of bytes in one frame at this resolution.
    pub const fn frame_size(self, format: PixelFormat) -> usize {
        let (width, height) = self.dimensions();
        frame_size(width, height, format)
    }
}

/// Pixel formats. Only packed YUV 4:2:2 (YUY2 on the USB side) is streamed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Yuv422,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Yuv422 => 2,
        }
    }
}

/// How pixel data is laid out in memory by the capture DMA.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Layout {
    /// Bytes stored in the order they arrive from the sensor.
    Packed8,
    /// Two bytes packed per 16-bit memory word.
    Packed16,
}

/// Capture data path mode (rounding, limiting and packing stage).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RlpMode {
    /// 8-bit data passed through untouched.
    Dat8,
    /// 10-bit data.
    Dat10,
}

/// Number of bytes in a `width` x `height` frame.
pub const fn frame_size(width: u16, height: u16, format: PixelFormat) -> usize {
    (width as usize) * (height as usize) * format.bytes_per_pixel()
}

/// Active stream parameters, built on every host-initiated start. Never changed while capture
/// is running.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamConfig {
    pub resolution: Resolution,
    pub format: PixelFormat,
    /// Sensor output bit width.
    pub input_bits: u8,
    /// Output width reported by the sensor.
    pub width: u16,
    /// Output height reported by the sensor.
    pub height: u16,
    pub buffer_count: u8,
    pub layout: Layout,
}

impl StreamConfig {
    /// Bytes in one frame of this stream.
    pub fn frame_size(&self) -> usize {
        frame_size(self.width, self.height, self.format)
    }
}
