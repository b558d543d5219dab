//! Frame target double.
//!
//! [`MockTarget`] follows the same protocol a Vulkan swapchain and its frame
//! slots impose: fences move through signaled, reset and pending; command
//! buffers through reset, recording, recorded and submitted; each semaphore is
//! signaled exactly once before it is waited on. Every step taken out of order
//! is written to [`MockTarget::violations`] instead of panicking, so a test can
//! run a whole scenario and then assert the list is empty.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use vireo_gpu::{vk, Acquire, FrameTarget, GpuError, SurfaceStatus};

/// State of a frame slot's fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    /// The slot's last submission has completed.
    Signaled,
    /// Reset and not yet submitted; waiting on it would never return.
    Unsignaled,
    /// Submitted work has not been waited on yet.
    Pending,
}

/// A call the frame loop made on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Rebuild { width: u32, height: u32 },
    Acquire { semaphore: usize },
    WaitAndReset { slot: u32 },
    Begin { slot: u32 },
    End { slot: u32 },
    Submit { slot: u32, semaphore: usize },
    Present { slot: u32, semaphore: usize },
    WaitIdle,
    /// The target was dropped with `pending` fences still unsignaled.
    Dropped { pending: usize },
}

/// Scripted result of the next acquire, submit or present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Optimal,
    Suboptimal,
    OutOfDate,
    Fail(vk::Result),
}

/// Call history shared between a target and the test that built it.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    /// Copy of every call so far.
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    /// Calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().iter().filter(|call| pred(call)).count()
    }

    /// Forget the history.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Reset,
    Recording,
    Recorded,
    Submitted,
}

/// Scripted [`FrameTarget`] modelling fences, slots and semaphores.
#[derive(Debug)]
pub struct MockTarget {
    extent: vk::Extent2D,
    image_count: usize,
    next_image_count: Option<usize>,
    next_image: u32,
    fences: Vec<FenceState>,
    stages: Vec<Stage>,
    submitted_at: Vec<u64>,
    image_acquired: Vec<bool>,
    render_complete: Vec<bool>,
    frame: u64,
    max_wait_age: u64,
    blocking_waits: usize,
    acquire_script: VecDeque<Scripted>,
    submit_script: VecDeque<Scripted>,
    present_script: VecDeque<Scripted>,
    violations: Vec<String>,
    log: CallLog,
}

impl MockTarget {
    /// A target with `image_count` slots and an 800x600 extent.
    pub fn new(image_count: usize) -> Self {
        let mut target = Self {
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            image_count,
            next_image_count: None,
            next_image: 0,
            fences: Vec::new(),
            stages: Vec::new(),
            submitted_at: Vec::new(),
            image_acquired: Vec::new(),
            render_complete: Vec::new(),
            frame: 0,
            max_wait_age: 0,
            blocking_waits: 0,
            acquire_script: VecDeque::new(),
            submit_script: VecDeque::new(),
            present_script: VecDeque::new(),
            violations: Vec::new(),
            log: CallLog::default(),
        };
        target.reset_slots();
        target
    }

    #[must_use]
    pub fn with_extent(mut self, width: u32, height: u32) -> Self {
        self.extent = vk::Extent2D { width, height };
        self
    }

    /// Image count the next rebuild produces.
    #[must_use]
    pub fn with_next_image_count(mut self, count: usize) -> Self {
        self.next_image_count = Some(count);
        self
    }

    pub fn script_acquire(&mut self, step: Scripted) {
        self.acquire_script.push_back(step);
    }

    pub fn script_submit(&mut self, step: Scripted) {
        self.submit_script.push_back(step);
    }

    pub fn script_present(&mut self, step: Scripted) {
        self.present_script.push_back(step);
    }

    /// Handle to the call history, valid after the target is dropped.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Protocol violations observed so far.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn fence(&self, slot: usize) -> FenceState {
        self.fences[slot]
    }

    /// Longest observed gap, in frames, between a slot's submission and the wait on its fence.
    pub fn max_wait_age(&self) -> u64 {
        self.max_wait_age
    }

    /// Waits that found the fence still pending.
    pub fn blocking_waits(&self) -> usize {
        self.blocking_waits
    }

    fn reset_slots(&mut self) {
        let n = self.image_count;
        self.fences = vec![FenceState::Signaled; n];
        self.stages = vec![Stage::Idle; n];
        self.submitted_at = vec![0; n];
        self.image_acquired = vec![false; n];
        self.render_complete = vec![false; n];
        self.next_image = 0;
    }

    fn complete_all(&mut self) {
        for fence in &mut self.fences {
            if *fence == FenceState::Pending {
                *fence = FenceState::Signaled;
            }
        }
    }

    fn violation(&mut self, message: String) {
        tracing::warn!("{message}");
        self.violations.push(message);
    }

    fn slot_index(&mut self, operation: &str, slot: u32) -> Option<usize> {
        let index = slot as usize;
        if index < self.image_count {
            Some(index)
        } else {
            self.violation(format!("{operation}: slot {slot} out of range"));
            None
        }
    }

    fn expect_stage(&mut self, operation: &str, slot: usize, expected: Stage) -> bool {
        let stage = self.stages[slot];
        if stage == expected {
            true
        } else {
            self.violation(format!(
                "{operation}: slot {slot} is {stage:?}, expected {expected:?}"
            ));
            false
        }
    }
}

fn scripted_error(step: Scripted) -> Option<GpuError> {
    match step {
        Scripted::Optimal | Scripted::Suboptimal => None,
        Scripted::OutOfDate => Some(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR)),
        Scripted::Fail(code) => Some(GpuError::Vulkan(code)),
    }
}

impl FrameTarget for MockTarget {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn slot_count(&self) -> usize {
        self.image_count
    }

    fn clear_value(&self) -> vk::ClearValue {
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.1, 0.1, 0.1, 1.0],
            },
        }
    }

    fn rebuild(&mut self, width: u32, height: u32) -> vireo_gpu::Result<()> {
        self.log.push(Call::Rebuild { width, height });
        if width == 0 || height == 0 {
            self.violation(format!("rebuild to zero extent {width}x{height}"));
        }
        self.complete_all();
        if let Some(count) = self.next_image_count.take() {
            self.image_count = count;
        }
        self.extent = vk::Extent2D { width, height };
        self.reset_slots();
        Ok(())
    }

    fn acquire(&mut self, semaphore_index: usize) -> vireo_gpu::Result<Acquire> {
        self.log.push(Call::Acquire {
            semaphore: semaphore_index,
        });
        if semaphore_index >= self.image_count {
            self.violation(format!("acquire: semaphore {semaphore_index} out of range"));
            return Err(GpuError::Other("semaphore out of range".into()));
        }

        let step = self.acquire_script.pop_front().unwrap_or(Scripted::Optimal);
        let status = match step {
            Scripted::Optimal => SurfaceStatus::Optimal,
            Scripted::Suboptimal => SurfaceStatus::Suboptimal,
            Scripted::OutOfDate => return Ok(Acquire::OutOfDate),
            Scripted::Fail(code) => return Err(GpuError::Vulkan(code)),
        };

        if self.image_acquired[semaphore_index] {
            self.violation(format!(
                "acquire: image-acquired semaphore {semaphore_index} is still signaled"
            ));
        }
        self.image_acquired[semaphore_index] = true;

        self.frame += 1;
        let slot = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        Ok(Acquire::Image { slot, status })
    }

    fn wait_and_reset(&mut self, slot: u32) -> vireo_gpu::Result<()> {
        self.log.push(Call::WaitAndReset { slot });
        let Some(index) = self.slot_index("wait_and_reset", slot) else {
            return Ok(());
        };

        match self.fences[index] {
            FenceState::Signaled => {}
            FenceState::Pending => {
                let age = self.frame - self.submitted_at[index];
                self.max_wait_age = self.max_wait_age.max(age);
                self.blocking_waits += 1;
            }
            FenceState::Unsignaled => {
                self.violation(format!("wait_and_reset: slot {slot} fence never submitted"));
            }
        }
        if self.stages[index] != Stage::Idle {
            self.violation(format!(
                "wait_and_reset: slot {slot} reset while {:?}",
                self.stages[index]
            ));
        }
        self.fences[index] = FenceState::Unsignaled;
        self.stages[index] = Stage::Reset;
        Ok(())
    }

    fn begin_commands(
        &mut self,
        slot: u32,
        _clear: vk::ClearValue,
    ) -> vireo_gpu::Result<vk::CommandBuffer> {
        self.log.push(Call::Begin { slot });
        if let Some(index) = self.slot_index("begin_commands", slot) {
            if self.expect_stage("begin_commands", index, Stage::Reset) {
                self.stages[index] = Stage::Recording;
            }
        }
        Ok(vk::CommandBuffer::null())
    }

    fn end_commands(&mut self, slot: u32) -> vireo_gpu::Result<()> {
        self.log.push(Call::End { slot });
        if let Some(index) = self.slot_index("end_commands", slot) {
            if self.expect_stage("end_commands", index, Stage::Recording) {
                self.stages[index] = Stage::Recorded;
            }
        }
        Ok(())
    }

    fn submit(&mut self, slot: u32, semaphore_index: usize) -> vireo_gpu::Result<()> {
        self.log.push(Call::Submit {
            slot,
            semaphore: semaphore_index,
        });
        let step = self.submit_script.pop_front().unwrap_or(Scripted::Optimal);
        if let Some(e) = scripted_error(step) {
            return Err(e);
        }

        let Some(index) = self.slot_index("submit", slot) else {
            return Ok(());
        };
        if self.expect_stage("submit", index, Stage::Recorded) {
            self.stages[index] = Stage::Submitted;
        }
        if !self.image_acquired[semaphore_index] {
            self.violation(format!(
                "submit: waits on unsignaled image-acquired semaphore {semaphore_index}"
            ));
        }
        self.image_acquired[semaphore_index] = false;
        self.render_complete[semaphore_index] = true;
        self.fences[index] = FenceState::Pending;
        self.submitted_at[index] = self.frame;
        Ok(())
    }

    fn present(&mut self, slot: u32, semaphore_index: usize) -> vireo_gpu::Result<SurfaceStatus> {
        self.log.push(Call::Present {
            slot,
            semaphore: semaphore_index,
        });
        let step = self.present_script.pop_front().unwrap_or(Scripted::Optimal);
        if let Scripted::Fail(code) = step {
            return Err(GpuError::Vulkan(code));
        }

        if let Some(index) = self.slot_index("present", slot) {
            if self.expect_stage("present", index, Stage::Submitted) {
                self.stages[index] = Stage::Idle;
            }
        }
        if !self.render_complete[semaphore_index] {
            self.violation(format!(
                "present: waits on unsignaled render-complete semaphore {semaphore_index}"
            ));
        }
        self.render_complete[semaphore_index] = false;

        Ok(match step {
            Scripted::Suboptimal => SurfaceStatus::Suboptimal,
            Scripted::OutOfDate => SurfaceStatus::OutOfDate,
            _ => SurfaceStatus::Optimal,
        })
    }

    fn wait_idle(&mut self) -> vireo_gpu::Result<()> {
        self.log.push(Call::WaitIdle);
        self.complete_all();
        Ok(())
    }
}

impl Drop for MockTarget {
    fn drop(&mut self) {
        let pending = self
            .fences
            .iter()
            .filter(|&&fence| fence == FenceState::Pending)
            .count();
        self.log.push(Call::Dropped { pending });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_follows_protocol() {
        let mut target = MockTarget::new(2);
        let Acquire::Image { slot, .. } = target.acquire(0).unwrap() else {
            panic!("expected an image");
        };
        target.wait_and_reset(slot).unwrap();
        target.begin_commands(slot, target.clear_value()).unwrap();
        target.end_commands(slot).unwrap();
        target.submit(slot, 0).unwrap();
        assert_eq!(target.fence(slot as usize), FenceState::Pending);
        assert_eq!(target.present(slot, 0).unwrap(), SurfaceStatus::Optimal);
        assert!(target.violations().is_empty(), "{:?}", target.violations());
    }

    #[test]
    fn recording_without_reset_is_flagged() {
        let mut target = MockTarget::new(2);
        target.begin_commands(0, target.clear_value()).unwrap();
        assert_eq!(target.violations().len(), 1);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut target = MockTarget::new(3);
        target.rebuild(1024, 768).unwrap();
        let first = (target.extent(), target.slot_count());
        target.rebuild(1024, 768).unwrap();
        assert_eq!((target.extent(), target.slot_count()), first);
        assert!((0..3).all(|slot| target.fence(slot) == FenceState::Signaled));
    }

    #[test]
    fn log_survives_drop() {
        let target = MockTarget::new(2);
        let log = target.log();
        drop(target);
        assert_eq!(log.calls(), [Call::Dropped { pending: 0 }]);
    }
}
