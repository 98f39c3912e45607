//! Click position storage shared by the overlay and the click loop

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A point in host screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickPosition {
    pub x: i32,
    pub y: i32,
}

impl ClickPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Componentwise offset
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.wrapping_add(dx), self.y.wrapping_add(dy))
    }

    fn pack(self) -> u64 {
        ((self.x as u32 as u64) << 32) | self.y as u32 as u64
    }

    fn unpack(bits: u64) -> Self {
        Self::new((bits >> 32) as u32 as i32, bits as u32 as i32)
    }
}

impl fmt::Display for ClickPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Latest click coordinate.
///
/// Both axes live in one atomic word so a reader never observes an `x` from
/// one write paired with a `y` from another. Writes are last-write-wins and
/// are not checked against screen bounds.
#[derive(Debug)]
pub struct PositionStore {
    bits: AtomicU64,
}

impl PositionStore {
    pub fn new(initial: ClickPosition) -> Self {
        Self {
            bits: AtomicU64::new(initial.pack()),
        }
    }

    pub fn set(&self, x: i32, y: i32) {
        self.bits
            .store(ClickPosition::new(x, y).pack(), Ordering::SeqCst);
    }

    pub fn set_position(&self, position: ClickPosition) {
        self.bits.store(position.pack(), Ordering::SeqCst);
    }

    pub fn get(&self) -> ClickPosition {
        ClickPosition::unpack(self.bits.load(Ordering::SeqCst))
    }
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new(ClickPosition::default())
    }
}
