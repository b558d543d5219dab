//! Window collaborator.

use std::sync::Arc;

/// What the layer polls from the host window at the start of every frame.
pub trait WindowSource {
    /// Drawable size in physical pixels.
    fn drawable_size(&self) -> (u32, u32);

    /// Whether the window is iconified.
    fn is_minimized(&self) -> bool;
}

impl<W: WindowSource + ?Sized> WindowSource for Arc<W> {
    fn drawable_size(&self) -> (u32, u32) {
        (**self).drawable_size()
    }

    fn is_minimized(&self) -> bool {
        (**self).is_minimized()
    }
}
