//! The UI layer state machine.

use crate::config::{FatalPolicy, LayerConfig};
use crate::error::{LayerError, Result};
use crate::event::{EventCategory, LayerEvent};
use crate::ui::{DrawPayload, ImmediateUi};
use crate::window::WindowSource;
use vireo_gpu::{
    Acquire, FrameRenderer, FrameTarget, GpuError, PresentOutcome, PresentScheduler, RenderOutcome,
};

/// Where the layer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// No GPU resources exist.
    Detached,
    /// Ready for `begin_frame`.
    Attached,
    /// A UI frame is open; `end_frame` must follow.
    FrameActive,
    /// `begin_frame` found nothing to draw; `end_frame` must still follow.
    Idle,
}

/// Result of [`UiLayer::begin_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStart {
    /// The UI frame is open; produce UI, then call `end_frame`.
    Active,
    /// The window has no drawable area; skip UI production this tick.
    Idle,
}

/// Result of [`UiLayer::end_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameReport {
    /// The matching `begin_frame` was idle.
    Idle,
    /// The payload covered no area, so no GPU work was issued.
    Offscreen,
    /// Acquire found the surface out of date; nothing was recorded.
    Abandoned,
    /// Recording or submission hit an out-of-date surface; nothing was presented.
    Dropped,
    /// The frame was submitted and handed to the presentation step.
    Presented(PresentOutcome),
}

struct Session<T, U> {
    // Declared before `target`: the UI backend's GPU objects belong to its device.
    ui: U,
    renderer: FrameRenderer,
    scheduler: PresentScheduler,
    target: T,
}

/// Hosts an immediate-mode UI on a presentable GPU target.
///
/// Frames are bracketed by [`UiLayer::begin_frame`] and [`UiLayer::end_frame`].
/// Calls out of order are rejected with [`LayerError::InvalidTransition`] and
/// leave the state untouched.
///
/// Dropping an attached layer releases the GPU target the same way
/// [`UiLayer::detach`] does, before the window goes away.
pub struct UiLayer<T, U, W>
where
    T: FrameTarget,
    U: ImmediateUi,
    W: WindowSource,
{
    // The target's surface was created from `window` and must be gone first.
    session: Option<Session<T, U>>,
    window: W,
    config: LayerConfig,
    block_events: bool,
    state: LayerState,
    rebuild_count: u64,
}

impl<T, U, W> UiLayer<T, U, W>
where
    T: FrameTarget,
    U: ImmediateUi,
    W: WindowSource,
{
    /// Create a detached layer polling `window`.
    pub fn new(window: W, config: LayerConfig) -> Self {
        Self {
            session: None,
            window,
            block_events: config.block_events(),
            config,
            state: LayerState::Detached,
            rebuild_count: 0,
        }
    }

    /// Bring up the GPU target and the UI backend on top of it.
    ///
    /// On failure everything created so far is dropped and the layer stays
    /// detached.
    pub fn attach<C, B>(&mut self, connect: C, build_ui: B) -> Result<()>
    where
        C: FnOnce(&W) -> vireo_gpu::Result<T>,
        B: FnOnce(&T) -> vireo_gpu::Result<U>,
    {
        self.expect("attach", LayerState::Detached)?;

        let target = connect(&self.window).map_err(|e| attach_failed("GPU target", e))?;
        let ui = build_ui(&target).map_err(|e| attach_failed("UI backend", e))?;

        let extent = target.extent();
        let slots = target.slot_count();
        self.session = Some(Session {
            ui,
            renderer: FrameRenderer::new(),
            scheduler: PresentScheduler::new(slots),
            target,
        });
        self.state = LayerState::Attached;

        tracing::info!(
            "UI layer attached: {}x{}, {} frame slots",
            extent.width,
            extent.height,
            slots
        );
        Ok(())
    }

    /// Start a frame.
    ///
    /// Returns [`FrameStart::Idle`] without touching the GPU while the window is
    /// minimized or has a zero dimension. Otherwise rebuilds the swapchain if it
    /// is flagged or no longer matches the drawable size, then opens the UI frame.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn begin_frame(&mut self) -> Result<FrameStart> {
        self.expect("begin_frame", LayerState::Attached)?;
        let policy = self.config.fatal_policy();
        let (width, height) = self.window.drawable_size();
        let minimized = width == 0 || height == 0 || self.window.is_minimized();

        let state = self.state;
        let Some(session) = self.session.as_mut() else {
            return Err(LayerError::InvalidTransition {
                operation: "begin_frame",
                state,
            });
        };

        if minimized {
            session.scheduler.request_rebuild();
            self.state = LayerState::Idle;
            tracing::trace!(width, height, "Window minimized, frame skipped");
            if let Some(backoff) = self.config.idle_backoff() {
                std::thread::sleep(backoff);
            }
            return Ok(FrameStart::Idle);
        }

        let extent = session.target.extent();
        if session.scheduler.rebuild_pending() || extent.width != width || extent.height != height {
            tracing::debug!(
                pending = session.scheduler.rebuild_pending(),
                from = ?(extent.width, extent.height),
                to = ?(width, height),
                "Rebuilding swapchain"
            );
            if let Err(e) = session.target.rebuild(width, height) {
                return Err(fatal(policy, "rebuild", e));
            }
            let slots = session.target.slot_count();
            session.scheduler.on_rebuilt(slots);
            session.ui.on_rebuild(slots);
            self.rebuild_count += 1;
        }

        session.ui.new_frame([width as f32, height as f32]);
        self.state = LayerState::FrameActive;
        Ok(FrameStart::Active)
    }

    /// Finish the frame: render the UI, then acquire, record, submit and present.
    ///
    /// Out-of-date surfaces are absorbed into the report and a rebuild at the
    /// next `begin_frame`. Other GPU failures go through the [`FatalPolicy`].
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn end_frame(&mut self) -> Result<FrameReport> {
        match self.state {
            LayerState::Idle => {
                self.state = LayerState::Attached;
                return Ok(FrameReport::Idle);
            }
            LayerState::FrameActive => {}
            state => {
                return Err(LayerError::InvalidTransition {
                    operation: "end_frame",
                    state,
                })
            }
        }

        let policy = self.config.fatal_policy();
        self.state = LayerState::Attached;
        let session = self.session_mut("end_frame")?;

        let payload = session.ui.render();
        let [width, height] = payload.display_size();
        if width <= 0.0 || height <= 0.0 {
            tracing::trace!("Payload has no visible area, GPU work skipped");
            return Ok(FrameReport::Offscreen);
        }

        session
            .render_and_present(&payload)
            .map_err(|(stage, e)| fatal(policy, stage, e))
    }

    /// Wait for the GPU and release every GPU resource.
    pub fn detach(&mut self) -> Result<()> {
        self.expect("detach", LayerState::Attached)?;

        self.release();
        self.state = LayerState::Detached;
        tracing::info!("UI layer detached");
        Ok(())
    }

    /// Mark `event` handled if the UI wants its category and blocking is on.
    pub fn on_event(&self, event: &mut LayerEvent) {
        if !self.block_events {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };

        event.handled |=
            event.is_in(EventCategory::MOUSE) && session.ui.wants_capture_mouse();
        event.handled |=
            event.is_in(EventCategory::KEYBOARD) && session.ui.wants_capture_keyboard();
    }

    /// Toggle whether captured events are marked handled.
    pub fn set_block_events(&mut self, block: bool) {
        self.block_events = block;
    }

    /// Whether captured events are marked handled.
    pub fn block_events(&self) -> bool {
        self.block_events
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LayerState {
        self.state
    }

    /// Number of swapchain rebuilds since creation.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// The window being polled.
    pub fn window(&self) -> &W {
        &self.window
    }

    /// The GPU target, while attached.
    pub fn target(&self) -> Option<&T> {
        self.session.as_ref().map(|s| &s.target)
    }

    /// The UI library, while attached.
    pub fn ui(&self) -> Option<&U> {
        self.session.as_ref().map(|s| &s.ui)
    }

    /// The UI library, while attached.
    pub fn ui_mut(&mut self) -> Option<&mut U> {
        self.session.as_mut().map(|s| &mut s.ui)
    }

    /// Presentation cursor and rebuild flag, while attached.
    pub fn scheduler(&self) -> Option<&PresentScheduler> {
        self.session.as_ref().map(|s| &s.scheduler)
    }

    /// Frames submitted since attach.
    pub fn frames_submitted(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |s| s.renderer.frames_submitted())
    }

    fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.target.wait_idle() {
                tracing::error!("wait_idle failed while releasing the GPU target: {e}");
            }
        }
    }

    fn expect(&self, operation: &'static str, state: LayerState) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(LayerError::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }

    fn session_mut(&mut self, operation: &'static str) -> Result<&mut Session<T, U>> {
        let state = self.state;
        self.session
            .as_mut()
            .ok_or(LayerError::InvalidTransition { operation, state })
    }
}

impl<T, U, W> Drop for UiLayer<T, U, W>
where
    T: FrameTarget,
    U: ImmediateUi,
    W: WindowSource,
{
    fn drop(&mut self) {
        if self.session.is_some() {
            tracing::debug!(state = ?self.state, "UI layer dropped while attached");
            self.release();
        }
    }
}

type StageResult<T> = std::result::Result<T, (&'static str, GpuError)>;

impl<T: FrameTarget, U: ImmediateUi> Session<T, U> {
    fn render_and_present(&mut self, payload: &U::Payload) -> StageResult<FrameReport> {
        let semaphore_index = self.scheduler.semaphore_index();

        let slot = match self.target.acquire(semaphore_index) {
            Ok(Acquire::Image { slot, status }) => {
                if status.needs_rebuild() {
                    self.scheduler.request_rebuild();
                }
                slot
            }
            Ok(Acquire::OutOfDate) => {
                self.scheduler.abandon();
                return Ok(FrameReport::Abandoned);
            }
            Err(e) => {
                self.scheduler.abandon();
                return Err(("acquire", e));
            }
        };

        match self.draw(slot, semaphore_index, payload) {
            Ok(RenderOutcome::Done) => {}
            Ok(RenderOutcome::NeedsRebuild) => {
                self.scheduler.abandon();
                return Ok(FrameReport::Dropped);
            }
            Err(e) => {
                self.scheduler.abandon();
                return Err(e);
            }
        }

        self.scheduler
            .present(&mut self.target, slot)
            .map(FrameReport::Presented)
            .map_err(|e| ("present", e))
    }

    fn draw(
        &mut self,
        slot: u32,
        semaphore_index: usize,
        payload: &U::Payload,
    ) -> StageResult<RenderOutcome> {
        let Self {
            ui,
            renderer,
            target,
            ..
        } = self;

        target
            .wait_and_reset(slot)
            .map_err(|e| ("wait_and_reset", e))?;

        let recorded = renderer
            .record(target, slot, |command_buffer| ui.record(payload, command_buffer))
            .map_err(|e| ("record", e))?;
        if recorded == RenderOutcome::NeedsRebuild {
            return Ok(recorded);
        }

        renderer
            .submit(target, slot, semaphore_index)
            .map_err(|e| ("submit", e))
    }
}

fn attach_failed(what: &str, error: GpuError) -> LayerError {
    tracing::error!("Failed to create {what}: {error}");
    LayerError::Gpu(error)
}

/// Report an unrecoverable GPU failure according to `policy`.
fn fatal(policy: FatalPolicy, stage: &'static str, error: GpuError) -> LayerError {
    match error.result_code() {
        Some(code) => tracing::error!(stage, code, "{stage} failed: {error}"),
        None => tracing::error!(stage, "{stage} failed: {error}"),
    }
    match policy {
        FatalPolicy::Abort => std::process::abort(),
        FatalPolicy::Propagate => LayerError::Frame {
            stage,
            source: error,
        },
    }
}
