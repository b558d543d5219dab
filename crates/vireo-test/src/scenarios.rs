//! Frame-loop scenarios run against the doubles.

use crate::{Call, CallLog, MockTarget, MockUi, MockWindow, Scripted};
use std::cell::Cell;
use std::rc::Rc;
use vireo_gpu::{vk, FrameTarget, GpuError, PresentOutcome, SurfaceStatus};
use vireo_ui::{
    EventCategory, FatalPolicy, FrameReport, FrameStart, LayerConfig, LayerError, LayerEvent,
    LayerState, UiLayer, WindowSource,
};

type TestLayer = UiLayer<MockTarget, MockUi, MockWindow>;

const PRESENTED: FrameReport =
    FrameReport::Presented(PresentOutcome::Presented(SurfaceStatus::Optimal));

fn config() -> LayerConfig {
    LayerConfig::builder()
        .fatal_policy(FatalPolicy::Propagate)
        .idle_backoff(None)
        .build()
}

fn attach(target: MockTarget, window: &MockWindow) -> TestLayer {
    let mut layer = UiLayer::new(window.clone(), config());
    layer
        .attach(|_| Ok(target), |_| Ok(MockUi::default()))
        .unwrap();
    layer
}

fn frame(layer: &mut TestLayer) -> FrameReport {
    assert_eq!(layer.begin_frame().unwrap(), FrameStart::Active);
    layer.end_frame().unwrap()
}

fn mock(layer: &TestLayer) -> &MockTarget {
    layer.target().unwrap()
}

fn ui(layer: &TestLayer) -> &MockUi {
    layer.ui().unwrap()
}

fn assert_clean(layer: &TestLayer) {
    let violations = mock(layer).violations();
    assert!(violations.is_empty(), "protocol violations: {violations:?}");
}

fn acquired_semaphores(log: &CallLog) -> Vec<usize> {
    log.calls()
        .iter()
        .filter_map(|call| match call {
            Call::Acquire { semaphore } => Some(*semaphore),
            _ => None,
        })
        .collect()
}

fn rebuilds(log: &CallLog) -> usize {
    log.count(|call| matches!(call, Call::Rebuild { .. }))
}

#[test]
fn semaphore_index_cycles_through_ring() {
    let window = MockWindow::new(800, 600);
    let target = MockTarget::new(3);
    let log = target.log();
    let mut layer = attach(target, &window);

    for _ in 0..7 {
        assert_eq!(frame(&mut layer), PRESENTED);
    }

    assert_eq!(acquired_semaphores(&log), [0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(layer.scheduler().unwrap().semaphore_index(), 1);
    assert_eq!(layer.frames_submitted(), 7);
    assert_eq!(rebuilds(&log), 0);
    assert_clean(&layer);
}

#[test]
fn semaphore_index_advances_across_abandoned_frames() {
    let window = MockWindow::new(800, 600);
    let mut target = MockTarget::new(3);
    target.script_acquire(Scripted::Optimal);
    target.script_acquire(Scripted::OutOfDate);
    let log = target.log();
    let mut layer = attach(target, &window);

    assert_eq!(frame(&mut layer), PRESENTED);
    assert_eq!(frame(&mut layer), FrameReport::Abandoned);
    assert_eq!(frame(&mut layer), PRESENTED);
    assert_eq!(frame(&mut layer), PRESENTED);

    assert_eq!(acquired_semaphores(&log), [0, 1, 2, 0]);
    assert_eq!(rebuilds(&log), 1);
    assert_clean(&layer);
}

#[test]
fn resize_rebuilds_swapchain_to_drawable_size() {
    let window = MockWindow::new(800, 600);
    let target = MockTarget::new(3).with_next_image_count(4);
    let log = target.log();
    let mut layer = attach(target, &window);

    frame(&mut layer);
    log.clear();
    window.resize(1024, 768);
    assert_eq!(frame(&mut layer), PRESENTED);

    let calls = log.calls();
    assert_eq!(
        calls[0],
        Call::Rebuild {
            width: 1024,
            height: 768
        }
    );
    assert_eq!(calls[1], Call::Acquire { semaphore: 1 });

    let extent = mock(&layer).extent();
    assert_eq!((extent.width, extent.height), (1024, 768));
    assert_eq!(ui(&layer).frames_started.last(), Some(&[1024.0, 768.0]));
    assert_eq!(ui(&layer).rebuilds, [4]);
    assert_eq!(layer.scheduler().unwrap().semaphore_count(), 4);

    frame(&mut layer);
    assert_eq!(layer.rebuild_count(), 1);
    assert_clean(&layer);
}

#[test]
fn repeated_frames_at_same_size_do_not_rebuild() {
    let window = MockWindow::new(800, 600);
    let target = MockTarget::new(2).with_extent(640, 480);
    let log = target.log();
    let mut layer = attach(target, &window);

    for _ in 0..4 {
        frame(&mut layer);
    }

    assert_eq!(rebuilds(&log), 1);
    assert_eq!(layer.target().map(MockTarget::slot_count), Some(2));
    assert_clean(&layer);
}

#[test]
fn minimized_window_skips_gpu_and_rebuilds_once() {
    let window = MockWindow::new(800, 600);
    let target = MockTarget::new(3);
    let log = target.log();
    let mut layer = attach(target, &window);

    frame(&mut layer);
    log.clear();

    window.resize(0, 0);
    for _ in 0..3 {
        assert_eq!(layer.begin_frame().unwrap(), FrameStart::Idle);
        assert_eq!(layer.state(), LayerState::Idle);
        assert_eq!(layer.end_frame().unwrap(), FrameReport::Idle);
        assert_eq!(layer.state(), LayerState::Attached);
    }
    assert!(log.calls().is_empty());
    assert_eq!(ui(&layer).frames_started.len(), 1);

    window.resize(800, 600);
    assert_eq!(frame(&mut layer), PRESENTED);
    assert_eq!(frame(&mut layer), PRESENTED);

    assert_eq!(
        log.calls()[0],
        Call::Rebuild {
            width: 800,
            height: 600
        }
    );
    assert_eq!(rebuilds(&log), 1);
    assert_clean(&layer);
}

#[test]
fn iconified_window_with_size_is_idle() {
    let window = MockWindow::new(800, 600);
    let target = MockTarget::new(2);
    let log = target.log();
    let mut layer = attach(target, &window);

    window.set_minimized(true);
    assert_eq!(layer.begin_frame().unwrap(), FrameStart::Idle);
    assert_eq!(layer.end_frame().unwrap(), FrameReport::Idle);
    assert!(log.calls().is_empty());

    window.set_minimized(false);
    assert_eq!(frame(&mut layer), PRESENTED);
    assert_eq!(rebuilds(&log), 1);
}

#[test]
fn out_of_date_at_acquire_abandons_frame() {
    let window = MockWindow::new(800, 600);
    let mut target = MockTarget::new(3);
    target.script_acquire(Scripted::OutOfDate);
    let log = target.log();
    let mut layer = attach(target, &window);

    assert_eq!(frame(&mut layer), FrameReport::Abandoned);
    assert_eq!(log.calls(), [Call::Acquire { semaphore: 0 }]);
    assert!(layer.scheduler().unwrap().rebuild_pending());
    assert_eq!(layer.scheduler().unwrap().semaphore_index(), 1);
    assert!(ui(&layer).recorded.is_empty());

    log.clear();
    assert_eq!(frame(&mut layer), PRESENTED);
    let calls = log.calls();
    assert_eq!(
        calls[0],
        Call::Rebuild {
            width: 800,
            height: 600
        }
    );
    assert_eq!(calls[1], Call::Acquire { semaphore: 1 });
    assert!(!layer.scheduler().unwrap().rebuild_pending());
    assert_clean(&layer);
}

#[test]
fn suboptimal_present_renders_then_rebuilds() {
    let window = MockWindow::new(800, 600);
    let mut target = MockTarget::new(3);
    target.script_present(Scripted::Suboptimal);
    let log = target.log();
    let mut layer = attach(target, &window);

    assert_eq!(
        frame(&mut layer),
        FrameReport::Presented(PresentOutcome::Presented(SurfaceStatus::Suboptimal))
    );
    assert_eq!(log.count(|c| *c == Call::Submit { slot: 0, semaphore: 0 }), 1);
    assert_eq!(log.count(|c| *c == Call::Present { slot: 0, semaphore: 0 }), 1);
    assert_eq!(ui(&layer).recorded, [1]);
    assert!(layer.scheduler().unwrap().rebuild_pending());
    assert_eq!(layer.scheduler().unwrap().semaphore_index(), 1);

    log.clear();
    frame(&mut layer);
    assert!(matches!(log.calls()[0], Call::Rebuild { .. }));
    assert_clean(&layer);
}

#[test]
fn suboptimal_acquire_renders_but_skips_present() {
    let window = MockWindow::new(800, 600);
    let mut target = MockTarget::new(2);
    target.script_acquire(Scripted::Suboptimal);
    let log = target.log();
    let mut layer = attach(target, &window);

    assert_eq!(
        frame(&mut layer),
        FrameReport::Presented(PresentOutcome::Skipped)
    );
    assert_eq!(log.count(|c| matches!(c, Call::Submit { .. })), 1);
    assert_eq!(log.count(|c| matches!(c, Call::Present { .. })), 0);
    assert_eq!(layer.scheduler().unwrap().semaphore_index(), 1);

    assert_eq!(frame(&mut layer), PRESENTED);
    assert_eq!(rebuilds(&log), 1);
    assert_clean(&layer);
}

#[test]
fn fences_gate_slot_reuse() {
    let window = MockWindow::new(800, 600);
    let target = MockTarget::new(3);
    let mut layer = attach(target, &window);

    for _ in 0..6 {
        frame(&mut layer);
    }

    // The second trip around the ring waits on every fence from the first.
    assert_eq!(mock(&layer).blocking_waits(), 3);
    assert!(mock(&layer).max_wait_age() <= 3);
    assert_clean(&layer);
}

#[test]
fn out_of_order_calls_are_rejected() {
    let window = MockWindow::new(800, 600);
    let mut layer: TestLayer = UiLayer::new(window, config());

    assert!(matches!(
        layer.begin_frame(),
        Err(LayerError::InvalidTransition {
            operation: "begin_frame",
            state: LayerState::Detached
        })
    ));
    assert!(matches!(
        layer.end_frame(),
        Err(LayerError::InvalidTransition {
            state: LayerState::Detached,
            ..
        })
    ));
    assert!(layer.detach().is_err());

    layer
        .attach(|_| Ok(MockTarget::new(2)), |_| Ok(MockUi::default()))
        .unwrap();
    assert!(matches!(
        layer.end_frame(),
        Err(LayerError::InvalidTransition {
            operation: "end_frame",
            state: LayerState::Attached
        })
    ));

    assert_eq!(layer.begin_frame().unwrap(), FrameStart::Active);
    assert!(matches!(
        layer.begin_frame(),
        Err(LayerError::InvalidTransition {
            operation: "begin_frame",
            state: LayerState::FrameActive
        })
    ));
    assert!(layer.detach().is_err());
    assert!(layer
        .attach(|_| Ok(MockTarget::new(2)), |_| Ok(MockUi::default()))
        .is_err());
    assert_eq!(layer.state(), LayerState::FrameActive);

    assert_eq!(layer.end_frame().unwrap(), PRESENTED);
    assert!(!ui(&layer).frame_open());
    assert_eq!(layer.state(), LayerState::Attached);
}

#[test]
fn captured_input_is_blocked() {
    let window = MockWindow::new(800, 600);
    let mut layer = attach(MockTarget::new(2), &window);
    layer.ui_mut().unwrap().capture_mouse = true;

    let mut click =
        LayerEvent::new(EventCategory::INPUT | EventCategory::MOUSE | EventCategory::MOUSE_BUTTON);
    layer.on_event(&mut click);
    assert!(click.handled);

    let mut key = LayerEvent::new(EventCategory::INPUT | EventCategory::KEYBOARD);
    layer.on_event(&mut key);
    assert!(!key.handled);

    let mut resize = LayerEvent::new(EventCategory::APPLICATION);
    layer.on_event(&mut resize);
    assert!(!resize.handled);

    layer.ui_mut().unwrap().capture_keyboard = true;
    let mut key = LayerEvent::new(EventCategory::INPUT | EventCategory::KEYBOARD);
    layer.on_event(&mut key);
    assert!(key.handled);

    layer.set_block_events(false);
    let mut click = LayerEvent::new(EventCategory::INPUT | EventCategory::MOUSE);
    layer.on_event(&mut click);
    assert!(!click.handled);

    let mut consumed = LayerEvent {
        category: EventCategory::KEYBOARD,
        handled: true,
    };
    layer.on_event(&mut consumed);
    assert!(consumed.handled);
}

#[test]
fn blocking_can_be_disabled_by_config() {
    let window = MockWindow::new(800, 600);
    let layer: TestLayer = UiLayer::new(window, LayerConfig::builder().block_events(false).build());
    assert!(!layer.block_events());
}

#[test]
fn zero_size_payload_skips_gpu_work() {
    let window = MockWindow::new(800, 600);
    let target = MockTarget::new(2);
    let log = target.log();
    let mut layer = attach(target, &window);
    layer.ui_mut().unwrap().display_override = Some([0.0, 600.0]);

    assert_eq!(frame(&mut layer), FrameReport::Offscreen);
    assert!(log.calls().is_empty());
    assert_eq!(ui(&layer).rendered(), 1);
    assert!(ui(&layer).recorded.is_empty());
    assert_eq!(layer.scheduler().unwrap().semaphore_index(), 0);
}

#[test]
fn detach_waits_idle_then_releases_target() {
    let window = MockWindow::new(800, 600);
    let target = MockTarget::new(3);
    let log = target.log();
    let mut layer = attach(target, &window);

    frame(&mut layer);
    frame(&mut layer);
    log.clear();

    layer.detach().unwrap();
    assert_eq!(layer.state(), LayerState::Detached);
    assert!(layer.target().is_none());
    assert_eq!(log.calls(), [Call::WaitIdle, Call::Dropped { pending: 0 }]);
}

/// Window that notes, when it is dropped, whether the target was already gone.
struct TrackedWindow {
    inner: MockWindow,
    log: CallLog,
    target_gone_first: Rc<Cell<Option<bool>>>,
}

impl WindowSource for TrackedWindow {
    fn drawable_size(&self) -> (u32, u32) {
        self.inner.drawable_size()
    }

    fn is_minimized(&self) -> bool {
        self.inner.is_minimized()
    }
}

impl Drop for TrackedWindow {
    fn drop(&mut self) {
        let target_dropped = self.log.count(|call| matches!(call, Call::Dropped { .. })) > 0;
        self.target_gone_first.set(Some(target_dropped));
    }
}

#[test]
fn dropping_attached_layer_releases_target_before_window() {
    let target = MockTarget::new(3);
    let log = target.log();
    let target_gone_first = Rc::new(Cell::new(None));
    let window = TrackedWindow {
        inner: MockWindow::new(800, 600),
        log: log.clone(),
        target_gone_first: Rc::clone(&target_gone_first),
    };

    let mut layer = UiLayer::new(window, config());
    layer
        .attach(|_| Ok(target), |_| Ok(MockUi::default()))
        .unwrap();
    assert_eq!(layer.begin_frame().unwrap(), FrameStart::Active);
    assert_eq!(layer.end_frame().unwrap(), PRESENTED);
    log.clear();

    drop(layer);
    assert_eq!(target_gone_first.get(), Some(true));
    assert_eq!(log.calls(), [Call::WaitIdle, Call::Dropped { pending: 0 }]);
}

#[test]
fn fatal_present_error_is_propagated() {
    let window = MockWindow::new(800, 600);
    let mut target = MockTarget::new(3);
    target.script_present(Scripted::Fail(vk::Result::ERROR_DEVICE_LOST));
    let mut layer = attach(target, &window);

    assert_eq!(layer.begin_frame().unwrap(), FrameStart::Active);
    match layer.end_frame() {
        Err(LayerError::Frame { stage, source }) => {
            assert_eq!(stage, "present");
            assert_eq!(source.result_code(), Some(vk::Result::ERROR_DEVICE_LOST.as_raw()));
        }
        other => panic!("expected a present failure, got {other:?}"),
    }
    assert_eq!(layer.state(), LayerState::Attached);
    assert_eq!(layer.scheduler().unwrap().semaphore_index(), 1);
}

#[test]
fn fatal_submit_error_schedules_rebuild() {
    let window = MockWindow::new(800, 600);
    let mut target = MockTarget::new(3);
    target.script_submit(Scripted::Fail(vk::Result::ERROR_DEVICE_LOST));
    let log = target.log();
    let mut layer = attach(target, &window);

    assert_eq!(layer.begin_frame().unwrap(), FrameStart::Active);
    assert!(matches!(
        layer.end_frame(),
        Err(LayerError::Frame {
            stage: "submit",
            ..
        })
    ));
    assert_eq!(log.count(|c| matches!(c, Call::Present { .. })), 0);
    assert!(layer.scheduler().unwrap().rebuild_pending());

    assert_eq!(frame(&mut layer), PRESENTED);
    assert_eq!(rebuilds(&log), 1);
    assert_clean(&layer);
}

#[test]
fn out_of_date_while_rendering_drops_frame() {
    let window = MockWindow::new(800, 600);
    let mut target = MockTarget::new(2);
    target.script_submit(Scripted::OutOfDate);
    let log = target.log();
    let mut layer = attach(target, &window);

    assert_eq!(frame(&mut layer), FrameReport::Dropped);
    assert_eq!(log.count(|c| matches!(c, Call::Present { .. })), 0);
    assert!(layer.scheduler().unwrap().rebuild_pending());

    layer.ui_mut().unwrap().fail_record =
        Some(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR));
    assert_eq!(frame(&mut layer), FrameReport::Dropped);

    assert_eq!(frame(&mut layer), PRESENTED);
    assert_eq!(rebuilds(&log), 2);
    assert_eq!(layer.frames_submitted(), 1);
    assert_clean(&layer);
}

#[test]
fn failed_attach_leaves_layer_detached() {
    let window = MockWindow::new(800, 600);
    let mut layer: TestLayer = UiLayer::new(window, config());

    let err = layer
        .attach(|_| Err(GpuError::NoSuitableDevice), |_| Ok(MockUi::default()))
        .unwrap_err();
    assert!(matches!(err, LayerError::Gpu(GpuError::NoSuitableDevice)));
    assert_eq!(layer.state(), LayerState::Detached);

    let target = MockTarget::new(2);
    let log = target.log();
    let err = layer
        .attach(
            |_| Ok(target),
            |_| Err(GpuError::Other("font atlas upload failed".into())),
        )
        .unwrap_err();
    assert!(matches!(err, LayerError::Gpu(GpuError::Other(_))));
    assert_eq!(layer.state(), LayerState::Detached);
    assert_eq!(log.calls(), [Call::Dropped { pending: 0 }]);
}
