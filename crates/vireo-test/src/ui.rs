//! Immediate-mode UI double.

use vireo_gpu::{vk, GpuError};
use vireo_ui::{DrawPayload, ImmediateUi};

/// Payload carrying only its display size and the frame it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockPayload {
    pub display_size: [f32; 2],
    pub frame: usize,
}

impl DrawPayload for MockPayload {
    fn display_size(&self) -> [f32; 2] {
        self.display_size
    }
}

/// Counts frames and records what the layer asked of it.
#[derive(Debug, Default)]
pub struct MockUi {
    /// Display size passed to every `new_frame`.
    pub frames_started: Vec<[f32; 2]>,
    /// Frame numbers of payloads recorded into a command buffer.
    pub recorded: Vec<usize>,
    /// Image counts reported after rebuilds.
    pub rebuilds: Vec<usize>,
    /// Forces the payload's display size.
    pub display_override: Option<[f32; 2]>,
    /// Error returned by the next `record`.
    pub fail_record: Option<GpuError>,
    pub capture_mouse: bool,
    pub capture_keyboard: bool,
    rendered: usize,
    open_frame: bool,
}

impl MockUi {
    /// Number of payloads produced.
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    /// Whether `new_frame` was called without a matching `render`.
    pub fn frame_open(&self) -> bool {
        self.open_frame
    }
}

impl ImmediateUi for MockUi {
    type Payload = MockPayload;

    fn new_frame(&mut self, display_size: [f32; 2]) {
        assert!(!self.open_frame, "new_frame called twice without render");
        self.open_frame = true;
        self.frames_started.push(display_size);
    }

    fn render(&mut self) -> MockPayload {
        assert!(self.open_frame, "render called without new_frame");
        self.open_frame = false;
        self.rendered += 1;
        MockPayload {
            display_size: self
                .display_override
                .or_else(|| self.frames_started.last().copied())
                .unwrap_or([0.0, 0.0]),
            frame: self.rendered,
        }
    }

    fn record(
        &mut self,
        payload: &MockPayload,
        _command_buffer: vk::CommandBuffer,
    ) -> vireo_gpu::Result<()> {
        if let Some(e) = self.fail_record.take() {
            return Err(e);
        }
        self.recorded.push(payload.frame);
        Ok(())
    }

    fn wants_capture_mouse(&self) -> bool {
        self.capture_mouse
    }

    fn wants_capture_keyboard(&self) -> bool {
        self.capture_keyboard
    }

    fn on_rebuild(&mut self, image_count: usize) {
        self.rebuilds.push(image_count);
    }
}
