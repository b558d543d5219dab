//! Scripted [`FrameTarget`] for unit tests.

use crate::error::{GpuError, Result, SurfaceStatus};
use crate::target::{Acquire, FrameTarget};
use ash::vk;
use std::collections::VecDeque;

/// Records every call and replays queued results; unscripted calls succeed.
pub(crate) struct ScriptedTarget {
    pub slots: usize,
    pub extent: vk::Extent2D,
    pub calls: Vec<String>,
    pub begin_results: VecDeque<Result<()>>,
    pub submit_results: VecDeque<Result<()>>,
    pub present_results: VecDeque<Result<SurfaceStatus>>,
}

impl ScriptedTarget {
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            calls: Vec::new(),
            begin_results: VecDeque::new(),
            submit_results: VecDeque::new(),
            present_results: VecDeque::new(),
        }
    }

    pub fn vk_error(result: vk::Result) -> GpuError {
        GpuError::Vulkan(result)
    }
}

impl FrameTarget for ScriptedTarget {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn slot_count(&self) -> usize {
        self.slots
    }

    fn clear_value(&self) -> vk::ClearValue {
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.1, 0.1, 0.1, 1.0],
            },
        }
    }

    fn rebuild(&mut self, width: u32, height: u32) -> Result<()> {
        self.calls.push(format!("rebuild {width}x{height}"));
        self.extent = vk::Extent2D { width, height };
        Ok(())
    }

    fn acquire(&mut self, semaphore_index: usize) -> Result<Acquire> {
        self.calls.push(format!("acquire {semaphore_index}"));
        Ok(Acquire::Image {
            slot: 0,
            status: SurfaceStatus::Optimal,
        })
    }

    fn wait_and_reset(&mut self, slot: u32) -> Result<()> {
        self.calls.push(format!("wait {slot}"));
        Ok(())
    }

    fn begin_commands(&mut self, slot: u32, _clear: vk::ClearValue) -> Result<vk::CommandBuffer> {
        self.calls.push(format!("begin {slot}"));
        self.begin_results
            .pop_front()
            .unwrap_or(Ok(()))
            .map(|()| vk::CommandBuffer::null())
    }

    fn end_commands(&mut self, slot: u32) -> Result<()> {
        self.calls.push(format!("end {slot}"));
        Ok(())
    }

    fn submit(&mut self, slot: u32, semaphore_index: usize) -> Result<()> {
        self.calls.push(format!("submit {slot} {semaphore_index}"));
        self.submit_results.pop_front().unwrap_or(Ok(()))
    }

    fn present(&mut self, slot: u32, semaphore_index: usize) -> Result<SurfaceStatus> {
        self.calls.push(format!("present {slot} {semaphore_index}"));
        self.present_results
            .pop_front()
            .unwrap_or(Ok(SurfaceStatus::Optimal))
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.calls.push("wait_idle".to_string());
        Ok(())
    }
}
