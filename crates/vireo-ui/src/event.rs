//! Event categories and capture arbitration.

use bitflags::bitflags;

bitflags! {
    /// Categories an event belongs to; an event may be in several.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventCategory: u8 {
        /// Window and application lifecycle.
        const APPLICATION  = 0b0000_0001;
        /// Any user input.
        const INPUT        = 0b0000_0010;
        /// Keyboard and text input.
        const KEYBOARD     = 0b0000_0100;
        /// Pointer motion and scrolling.
        const MOUSE        = 0b0000_1000;
        /// Pointer buttons.
        const MOUSE_BUTTON = 0b0001_0000;
    }
}

/// An event travelling down the host's layer stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerEvent {
    /// Categories of the event.
    pub category: EventCategory,
    /// Set once a layer has consumed the event.
    pub handled: bool,
}

impl LayerEvent {
    /// An unhandled event in `category`.
    #[must_use]
    pub const fn new(category: EventCategory) -> Self {
        Self {
            category,
            handled: false,
        }
    }

    /// Returns `true` if the event is in any of `category`.
    #[inline]
    #[must_use]
    pub const fn is_in(&self, category: EventCategory) -> bool {
        self.category.intersects(category)
    }
}
