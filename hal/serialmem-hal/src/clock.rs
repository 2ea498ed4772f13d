//! Millisecond clock
//!
//! The drivers only need a free-running millisecond counter. It wraps at
//! 2^32, so elapsed time is always computed with [`elapsed_ms`].

/// Monotonic millisecond counter
pub trait Clock {
    /// Current time in milliseconds
    fn now_ms(&mut self) -> u32;
}

impl<F: FnMut() -> u32> Clock for F {
    fn now_ms(&mut self) -> u32 {
        self()
    }
}

/// Milliseconds elapsed between `start` and `now`, across counter wrap
#[inline]
pub fn elapsed_ms(start: u32, now: u32) -> u32 {
    now.wrapping_sub(start)
}

/// Clock backed by the embassy time driver
#[cfg(feature = "embassy-time")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy-time")]
impl Clock for EmbassyClock {
    fn now_ms(&mut self) -> u32 {
        // Truncation is the wrap the drivers expect
        embassy_time::Instant::now().as_millis() as u32
    }
}
