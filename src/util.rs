//! Miscellaneous helpers.

/// Print over RTT on the hardware, type-check and discard the message on the host.
#[cfg(feature = "firmware")]
macro_rules! log {
    ($($arg:tt)*) => {
        rtt_target::rprintln!($($arg)*)
    };
}

#[cfg(not(feature = "firmware"))]
macro_rules! log {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}
