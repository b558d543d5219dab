//! Frame command recording and submission.

use crate::error::{GpuError, Result};
use crate::target::FrameTarget;
use ash::vk;

/// What a render step left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The step completed.
    Done,
    /// The surface went out of date; the frame is dropped and the swapchain must be rebuilt.
    NeedsRebuild,
}

/// Records a frame's UI commands into its slot and submits them.
#[derive(Debug, Default)]
pub struct FrameRenderer {
    frames_submitted: u64,
}

impl FrameRenderer {
    /// Create a renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `slot`'s command buffer.
    ///
    /// Opens the render pass over the slot's framebuffer with the target's clear
    /// value, lets `draw` append the UI commands, then closes the pass and the
    /// buffer. The slot must already have been through `wait_and_reset`.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn record<T, F>(&mut self, target: &mut T, slot: u32, draw: F) -> Result<RenderOutcome>
    where
        T: FrameTarget + ?Sized,
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        let clear = target.clear_value();
        let command_buffer = match target.begin_commands(slot, clear) {
            Ok(command_buffer) => command_buffer,
            Err(e) => return surface_outcome("begin_commands", e),
        };

        if let Err(e) = draw(command_buffer) {
            return surface_outcome("draw", e);
        }

        match target.end_commands(slot) {
            Ok(()) => Ok(RenderOutcome::Done),
            Err(e) => surface_outcome("end_commands", e),
        }
    }

    /// Submit `slot`'s recorded commands against the semaphores at `semaphore_index`.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn submit<T>(&mut self, target: &mut T, slot: u32, semaphore_index: usize) -> Result<RenderOutcome>
    where
        T: FrameTarget + ?Sized,
    {
        match target.submit(slot, semaphore_index) {
            Ok(()) => {
                self.frames_submitted += 1;
                Ok(RenderOutcome::Done)
            }
            Err(e) => surface_outcome("submit", e),
        }
    }

    /// Number of frames successfully submitted so far.
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }
}

/// Surface invalidation becomes a rebuild request; everything else is logged and passed up.
fn surface_outcome(stage: &'static str, error: GpuError) -> Result<RenderOutcome> {
    if error.is_surface_invalidated() {
        tracing::warn!("{stage}: surface out of date, frame dropped");
        return Ok(RenderOutcome::NeedsRebuild);
    }
    match error.result_code() {
        Some(code) => tracing::error!(stage, code, "{stage} failed: {error}"),
        None => tracing::error!(stage, "{stage} failed: {error}"),
    }
    Err(error)
}
