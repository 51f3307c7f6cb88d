//! Multi-threaded engine tests: lifecycle idempotence, invalidate-driven
//! painting, batch atomicity under a producer/render race, and the
//! surface-creation failure path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use overlay_engine::{
    DetectionUpdate, OverlayConfig, OverlayEngine, Rect, Rgb, StubSurfaceProvider,
};

fn test_config() -> OverlayConfig {
    let mut cfg = OverlayConfig::default();
    // Tight pump so tests never wait long for a timer-driven paint.
    cfg.frame_interval = Duration::from_millis(5);
    cfg
}

fn update(id: i32, rect: Rect, color: Rgb) -> DetectionUpdate {
    DetectionUpdate {
        id,
        rect,
        color,
        label: format!("box-{id}"),
    }
}

/// Poll until `predicate` holds or the deadline passes.
fn wait_for(deadline: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    predicate()
}

#[test]
fn start_is_idempotent_and_stop_joins_the_thread() {
    let provider = StubSurfaceProvider::new();
    let mut engine = OverlayEngine::new(test_config(), Arc::new(provider.clone()));

    assert!(engine.start().is_ok());
    assert!(engine.is_running());
    // Second start succeeds without spawning a second thread.
    assert!(engine.start().is_ok());
    assert!(engine.is_running());

    engine.stop();
    assert!(!engine.is_running());
    // Stop when stopped is a no-op.
    engine.stop();
    assert!(!engine.is_running());

    // Once stopped, no further frames appear.
    let frames_after_stop = provider.presented_frame_count();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(provider.presented_frame_count(), frames_after_stop);
}

#[test]
fn restart_creates_a_fresh_surface_and_keeps_painting() {
    let provider = StubSurfaceProvider::new();
    let mut engine = OverlayEngine::new(test_config(), Arc::new(provider.clone()));

    engine.start().expect("first start");
    engine.upsert_batch(&[update(1, Rect::new(10, 10, 50, 50), Rgb::new(0, 255, 0))]);
    assert!(wait_for(Duration::from_secs(2), || {
        provider
            .presented_frames()
            .iter()
            .any(|frame| !frame.stroked_rects().is_empty())
    }));
    engine.stop();

    let frames_before = provider.presented_frame_count();
    engine.start().expect("restart");
    assert!(wait_for(Duration::from_secs(2), || {
        provider.presented_frame_count() > frames_before
    }));
    engine.stop();
}

#[test]
fn upsert_triggers_a_frame_containing_the_box() {
    let provider = StubSurfaceProvider::new();
    let mut engine = OverlayEngine::new(test_config(), Arc::new(provider.clone()));
    engine.start().expect("start");

    engine.upsert_batch(&[update(7, Rect::new(100, 100, 40, 40), Rgb::new(255, 0, 0))]);

    let expected = Rect::new(100, 100, 40, 40);
    assert!(wait_for(Duration::from_secs(2), || {
        provider.presented_frames().iter().any(|frame| {
            frame
                .stroked_rects()
                .iter()
                .any(|(rect, _)| *rect == expected)
        })
    }));

    engine.stop();
}

#[test]
fn render_passes_only_see_fully_applied_batches() {
    let provider = StubSurfaceProvider::new();
    let mut engine = OverlayEngine::new(test_config(), Arc::new(provider.clone()));
    engine.start().expect("start");

    // Each generation updates the same three IDs with one shared color.
    // If a paint could interleave with a half-applied batch, some frame
    // would mix colors from two generations.
    let rects = [
        Rect::new(0, 0, 50, 50),
        Rect::new(200, 0, 50, 50),
        Rect::new(400, 0, 50, 50),
    ];
    for generation in 0..200u16 {
        let color = Rgb::new((generation % 256) as u8, 0, 0);
        let batch: Vec<DetectionUpdate> = rects
            .iter()
            .enumerate()
            .map(|(i, rect)| update(i as i32 + 1, *rect, color))
            .collect();
        engine.upsert_batch(&batch);
    }

    engine.stop();

    let frames = provider.presented_frames();
    assert!(!frames.is_empty());
    for frame in &frames {
        let colors: Vec<Rgb> = frame
            .stroked_rects()
            .iter()
            .map(|(_, color)| *color)
            .collect();
        if let Some(first) = colors.first() {
            assert!(
                colors.iter().all(|color| color == first),
                "frame mixed colors from different batches: {colors:?}"
            );
        }
    }
}

#[test]
fn stop_is_safe_after_surface_creation_failure() {
    let provider = StubSurfaceProvider::failing();
    let mut engine = OverlayEngine::new(test_config(), Arc::new(provider.clone()));

    // The spawn itself succeeds; the render thread logs the surface
    // failure and exits early.
    assert!(engine.start().is_ok());
    engine.upsert_batch(&[update(1, Rect::new(0, 0, 10, 10), Rgb::new(0, 255, 0))]);

    engine.stop();
    assert!(!engine.is_running());
    assert_eq!(provider.presented_frame_count(), 0);

    // The store still took the batch even though nothing was painted.
    assert_eq!(engine.record_count(), 1);
}

#[test]
fn concurrent_producer_and_mutators_never_break_invariants() {
    let provider = StubSurfaceProvider::new();
    let mut engine = OverlayEngine::new(test_config(), Arc::new(provider.clone()));
    engine.start().expect("start");

    for round in 0..50 {
        let batch: Vec<DetectionUpdate> = (0..10)
            .map(|i| update(i, Rect::new(i * 100, 0, 40, 40), Rgb::new(0, 255, 0)))
            .collect();
        engine.upsert_batch(&batch);

        // Interleave capacity churn with updates.
        engine.set_capacity(if round % 2 == 0 { 5 } else { 20 });
        assert!(engine.record_count() <= 20);

        engine.set_target_region(0, 0, 1280, 720);
    }

    engine.stop();
    assert!(engine.record_count() <= 20);
}
