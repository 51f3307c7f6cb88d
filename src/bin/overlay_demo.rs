//! overlay_demo - end-to-end synthetic run of the overlay engine
//!
//! Feeds drifting labeled boxes into a running engine over the stub
//! surface at a paced frame rate, then prints what the render loop
//! painted. Useful for eyeballing the merge/expiry behavior without a
//! window system.

use anyhow::{anyhow, Result};
use clap::Parser;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use overlay_engine::{
    DetectionUpdate, OverlayConfig, OverlayEngine, Rect, Rgb, StubSurfaceProvider, TargetRegion,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Duration of the synthetic run in seconds.
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Producer batches per second.
    #[arg(long, default_value_t = 5)]
    fps: u32,
    /// Number of synthetic boxes per batch.
    #[arg(long, default_value_t = 3)]
    boxes: usize,
    /// Maximum stored detections.
    #[arg(long, default_value_t = 100)]
    capacity: i32,
    /// Overlay region width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,
    /// Overlay region height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    if args.boxes == 0 {
        return Err(anyhow!("boxes must be >= 1"));
    }

    let mut config = OverlayConfig::load()?;
    config.region = TargetRegion::new(0, 0, args.width as i32, args.height as i32);

    let provider = StubSurfaceProvider::new();
    let mut engine = OverlayEngine::new(config, Arc::new(provider.clone()));
    engine.set_capacity(args.capacity);
    engine.start()?;

    let stop_requested = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop_requested);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))?;

    log::info!(
        "demo running: {} boxes at {} fps for {}s over {}x{}",
        args.boxes,
        args.fps,
        args.seconds,
        args.width,
        args.height
    );

    let mut rng = rand::thread_rng();
    let interval = Duration::from_secs(1) / args.fps;
    let deadline = Instant::now() + Duration::from_secs(args.seconds);

    let mut tick = 0u64;
    while Instant::now() < deadline && !stop_requested.load(Ordering::SeqCst) {
        let started = Instant::now();

        let batch: Vec<DetectionUpdate> = (0..args.boxes)
            .map(|i| synthetic_box(i as i32 + 1, tick, &args, &mut rng))
            .collect();
        engine.upsert_batch(&batch);
        tick += 1;

        let elapsed = started.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }

    engine.stop();

    let frames = provider.presented_frames();
    let drawn: usize = frames.iter().map(|frame| frame.stroked_rects().len()).sum();
    log::info!(
        "demo finished: {} batches sent, {} frames presented, {} boxes drawn, {} records live",
        tick,
        frames.len(),
        drawn,
        engine.record_count()
    );
    Ok(())
}

/// One drifting box: each ID orbits its home position with a little
/// jitter, so exact-ID updates dominate and the store stays small.
fn synthetic_box(id: i32, tick: u64, args: &Args, rng: &mut impl Rng) -> DetectionUpdate {
    let lane = (args.width / (args.boxes as u32 + 1)) as i32;
    let home_x = lane * id;
    let home_y = (args.height / 2) as i32;
    let phase = tick as f64 / 10.0;
    let drift_x = (phase.sin() * 60.0) as i32 + rng.gen_range(-4..=4);
    let drift_y = (phase.cos() * 40.0) as i32 + rng.gen_range(-4..=4);

    let x1 = home_x + drift_x;
    let y1 = home_y + drift_y;
    let rect = Rect::sanitize(x1, y1, x1 + 120, y1 + 160, args.width, args.height);

    DetectionUpdate {
        id,
        rect,
        color: Rgb::new(0, 255, 0),
        label: format!("target-{id}"),
    }
}
