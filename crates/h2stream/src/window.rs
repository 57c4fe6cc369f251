use crate::error::{StreamError, StreamErrorKind};

/// Largest legal flow-control window: 2^31 - 1 octets (RFC 7540 §6.9.1).
pub const MAX_WINDOW_SIZE: i32 = i32::MAX;

/// Default initial window size for new streams and for the connection
/// (RFC 7540 §6.9.2).
pub const DEFAULT_WINDOW_SIZE: u32 = 65_535;

/// Signed flow-control credit counter.
///
/// One `Window` exists per direction per stream, plus one per direction for
/// the connection as a whole. Credit is strictly additive/subtractive:
/// `consume` charges octets, `expand` refills from WINDOW_UPDATE, and a
/// SETTINGS change to the initial size shifts `available` by the delta via
/// `update_capacity`. There is no implicit replenishment.
///
/// `consume` is permitted to take `available` negative; the window is then
/// *exhausted* and the owner must refuse to charge further frames until a
/// WINDOW_UPDATE refills it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// The last-set initial size.
    capacity:  i32,
    /// Current credit. May legally be negative.
    available: i32,
}

impl Window {
    /// Create a window with `initial` octets of credit.
    pub fn new(initial: i32) -> Self {
        Self {
            capacity:  initial,
            available: initial,
        }
    }

    /// Current credit.
    pub fn available(&self) -> i32 {
        self.available
    }

    /// The last-set initial size.
    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    /// Charge `n` octets. The result may go negative (the window is then
    /// exhausted); only a charge that would fall below the `i32` minimum is
    /// rejected, with the window unchanged.
    pub fn consume(&mut self, n: u32) -> Result<(), StreamError> {
        let next = self.available as i64 - n as i64;
        if next < i32::MIN as i64 {
            return Err(StreamError::new(StreamErrorKind::WindowUnderflow));
        }
        self.available = next as i32;
        Ok(())
    }

    /// Refill `n` octets. Fails if the result would exceed 2^31 - 1, with
    /// the window unchanged.
    pub fn expand(&mut self, n: u32) -> Result<(), StreamError> {
        let next = self.available as i64 + n as i64;
        if next > MAX_WINDOW_SIZE as i64 {
            return Err(StreamError::new(StreamErrorKind::WindowOverflow));
        }
        self.available = next as i32;
        Ok(())
    }

    /// True once `consume` has taken the credit negative. Further charges
    /// must be refused until a WINDOW_UPDATE refills the window.
    pub fn is_exhausted(&self) -> bool {
        self.available < 0
    }

    /// True iff some credit has been consumed and not yet refilled.
    pub fn is_limited(&self) -> bool {
        self.available < self.capacity
    }

    /// Apply a SETTINGS change to the initial window size: `available`
    /// shifts by the delta (RFC 7540 §6.9.2). Fails if the shifted credit
    /// would exceed 2^31 - 1, with the window unchanged.
    pub fn update_capacity(&mut self, new_initial: i32) -> Result<(), StreamError> {
        let delta = new_initial as i64 - self.capacity as i64;
        let next = self.available as i64 + delta;
        if next > MAX_WINDOW_SIZE as i64 {
            return Err(StreamError::new(StreamErrorKind::WindowOverflow));
        }
        self.available = next as i32;
        self.capacity = new_initial;
        Ok(())
    }
}
