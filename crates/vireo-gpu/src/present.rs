//! Presentation and swapchain invalidation tracking.

use crate::error::{Result, SurfaceStatus};
use crate::target::FrameTarget;

/// What happened to a frame at present time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The image was queued for presentation.
    Presented(SurfaceStatus),
    /// A rebuild was already pending, so nothing was presented.
    Skipped,
}

/// Owns the semaphore ring cursor and the pending-rebuild flag.
///
/// The cursor advances exactly once per frame whether the frame was presented,
/// skipped, abandoned at acquire, or failed. Rebuilds are never performed here;
/// they are flagged and left to the start of the next frame.
#[derive(Debug)]
pub struct PresentScheduler {
    semaphore_index: usize,
    semaphore_count: usize,
    rebuild_pending: bool,
}

impl PresentScheduler {
    /// Scheduler for a ring of `semaphore_count` semaphore pairs.
    pub fn new(semaphore_count: usize) -> Self {
        Self {
            semaphore_index: 0,
            semaphore_count: semaphore_count.max(1),
            rebuild_pending: false,
        }
    }

    /// Present `slot`, or skip it if a rebuild is pending.
    ///
    /// Out-of-date and suboptimal results flag a rebuild. Any other error is
    /// returned after the cursor has advanced.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn present<T>(&mut self, target: &mut T, slot: u32) -> Result<PresentOutcome>
    where
        T: FrameTarget + ?Sized,
    {
        if self.rebuild_pending {
            tracing::trace!(slot, "Rebuild pending, present skipped");
            self.advance();
            return Ok(PresentOutcome::Skipped);
        }

        let result = target.present(slot, self.semaphore_index);
        self.advance();

        let status = result?;
        if status.needs_rebuild() {
            tracing::debug!(?status, "Present reported stale swapchain");
            self.rebuild_pending = true;
        }
        Ok(PresentOutcome::Presented(status))
    }

    /// Give up on the current frame after acquire reported the surface out of date.
    pub fn abandon(&mut self) {
        tracing::debug!("Frame abandoned at acquire, rebuild scheduled");
        self.rebuild_pending = true;
        self.advance();
    }

    /// Flag the swapchain for rebuild at the next frame start.
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    /// Whether a rebuild has been flagged.
    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Semaphore ring position for the next frame.
    pub fn semaphore_index(&self) -> usize {
        self.semaphore_index
    }

    /// Number of semaphore pairs in the ring.
    pub fn semaphore_count(&self) -> usize {
        self.semaphore_count
    }

    /// Adopt the ring size of a freshly rebuilt swapchain and clear the flag.
    pub fn on_rebuilt(&mut self, semaphore_count: usize) {
        self.semaphore_count = semaphore_count.max(1);
        self.semaphore_index %= self.semaphore_count;
        self.rebuild_pending = false;
    }

    fn advance(&mut self) {
        self.semaphore_index = (self.semaphore_index + 1) % self.semaphore_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTarget;
    use ash::vk;

    #[test]
    fn index_cycles_over_the_ring() {
        let mut target = ScriptedTarget::new(3);
        let mut scheduler = PresentScheduler::new(3);

        let seen: Vec<usize> = (0..7)
            .map(|_| {
                let index = scheduler.semaphore_index();
                scheduler.present(&mut target, 0).unwrap();
                index
            })
            .collect();
        assert_eq!(seen, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn suboptimal_presents_then_flags() {
        let mut target = ScriptedTarget::new(2);
        target.present_results.push_back(Ok(SurfaceStatus::Suboptimal));
        let mut scheduler = PresentScheduler::new(2);

        let outcome = scheduler.present(&mut target, 1).unwrap();
        assert_eq!(outcome, PresentOutcome::Presented(SurfaceStatus::Suboptimal));
        assert!(scheduler.rebuild_pending());
        assert_eq!(scheduler.semaphore_index(), 1);
        assert_eq!(target.calls, ["present 1 0"]);
    }

    #[test]
    fn pending_rebuild_skips_but_advances() {
        let mut target = ScriptedTarget::new(2);
        let mut scheduler = PresentScheduler::new(2);
        scheduler.request_rebuild();

        assert_eq!(scheduler.present(&mut target, 0).unwrap(), PresentOutcome::Skipped);
        assert!(target.calls.is_empty());
        assert_eq!(scheduler.semaphore_index(), 1);
    }

    #[test]
    fn fatal_error_still_advances() {
        let mut target = ScriptedTarget::new(2);
        target
            .present_results
            .push_back(Err(ScriptedTarget::vk_error(vk::Result::ERROR_DEVICE_LOST)));
        let mut scheduler = PresentScheduler::new(2);

        assert!(scheduler.present(&mut target, 0).is_err());
        assert_eq!(scheduler.semaphore_index(), 1);
        assert!(!scheduler.rebuild_pending());
    }

    #[test]
    fn rebuild_shrinks_ring_and_clears_flag() {
        let mut scheduler = PresentScheduler::new(4);
        scheduler.abandon();
        scheduler.abandon();
        scheduler.abandon();
        assert_eq!(scheduler.semaphore_index(), 3);

        scheduler.on_rebuilt(2);
        assert_eq!(scheduler.semaphore_index(), 1);
        assert_eq!(scheduler.semaphore_count(), 2);
        assert!(!scheduler.rebuild_pending());
    }
}
