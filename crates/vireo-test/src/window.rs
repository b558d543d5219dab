//! Resizable window double.

use std::cell::Cell;
use std::rc::Rc;
use vireo_ui::WindowSource;

/// A window whose size and minimized flag are shared between clones.
///
/// Hand one clone to the layer and keep another to drive it.
#[derive(Debug, Clone)]
pub struct MockWindow {
    size: Rc<Cell<(u32, u32)>>,
    minimized: Rc<Cell<bool>>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Rc::new(Cell::new((width, height))),
            minimized: Rc::new(Cell::new(false)),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.minimized.set(minimized);
    }
}

impl WindowSource for MockWindow {
    fn drawable_size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn is_minimized(&self) -> bool {
        self.minimized.get()
    }
}
