use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::WindowId;

use cadence_engine::display::platform::WinitRefreshRate;
use cadence_engine::display::{DisplayTimingConfig, DisplayTimingProvider, RefreshRateSource};
use cadence_engine::logging::{LoggingConfig, init_logging};
use cadence_engine::release::{ReleaseTimeSmoother, SmootherConfig};
use cadence_engine::time::{MonotonicClock, NANOS_PER_SECOND};
use cadence_engine::vsync::{SamplerConfig, SyntheticVsync, VsyncClockSource};

const DEFAULT_CONTENT_FPS: f64 = 24_000.0 / 1001.0;
const FRAMES: i64 = 240;
const SEEK_AT_FRAME: i64 = 120;
const SEEK_DISTANCE_US: i64 = 10_000_000;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let content_fps = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<f64>()
            .with_context(|| format!("invalid content frame rate {arg:?}"))?,
        None => DEFAULT_CONTENT_FPS,
    };
    if !content_fps.is_finite() || content_fps <= 0.0 {
        return Err(anyhow!("content frame rate must be positive, got {content_fps}"));
    }

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut studio = Studio::new(content_fps);

    event_loop
        .run_app(&mut studio)
        .context("winit event loop terminated with error")?;

    studio.outcome
}

/// Headless winit application: reads the primary monitor, plays one
/// simulated session through the pacer, then exits.
struct Studio {
    content_fps: f64,
    refresh_rate: Arc<WinitRefreshRate>,
    outcome: Result<()>,
}

impl Studio {
    fn new(content_fps: f64) -> Self {
        Self {
            content_fps,
            refresh_rate: Arc::new(WinitRefreshRate::new()),
            outcome: Ok(()),
        }
    }

    fn run_session(&self) -> Result<()> {
        let display = Arc::new(DisplayTimingProvider::new(
            self.refresh_rate.clone(),
            DisplayTimingConfig::default(),
        ));

        let mut smoother = match self.refresh_rate.refresh_rate_hz() {
            Ok(hz) => {
                let signal = SyntheticVsync::from_refresh_rate(hz)
                    .with_context(|| format!("display reported unusable refresh rate {hz}"))?;
                let vsync = VsyncClockSource::spawn(signal, SamplerConfig::default())
                    .context("failed to start vsync sampler")?;
                log::info!("primary monitor at {hz:.3} Hz; aligning releases to vsync");

                let mut smoother =
                    ReleaseTimeSmoother::with_display(SmootherConfig::default(), vsync.clone(), display);
                smoother.on_enabled();
                // Make sure the first vsync sample is in place before releasing frames.
                vsync.flush();
                smoother
            }
            Err(e) => {
                log::warn!("{e}; smoothing without vsync alignment");
                let mut smoother = ReleaseTimeSmoother::new(SmootherConfig::default());
                smoother.on_enabled();
                smoother
            }
        };

        smoother.on_format_changed(Some(self.content_fps as f32));
        smoother.on_playback_speed(1.0);
        smoother.on_started();
        log::info!(
            "playing {FRAMES} frames at {:.3} fps (estimated playback rate {:?})",
            self.content_fps,
            smoother.playback_frame_rate()
        );

        let report = play(&mut smoother, self.content_fps);
        log::info!(
            "raw release intervals {}..{} ns, adjusted {}..{} ns, {} resyncs",
            report.raw.min,
            report.raw.max,
            report.adjusted.min,
            report.adjusted.max,
            smoother.resync_count()
        );

        smoother.on_disabled();
        Ok(())
    }
}

impl ApplicationHandler for Studio {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.refresh_rate.observe_primary(event_loop);

        if let Err(e) = self.run_session() {
            log::error!("session failed: {e:#}");
            self.outcome = Err(e);
        }

        event_loop.exit();
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, _event: WindowEvent) {}
}

#[derive(Debug, Copy, Clone)]
struct IntervalRange {
    min: i64,
    max: i64,
}

impl IntervalRange {
    fn new() -> Self {
        Self { min: i64::MAX, max: i64::MIN }
    }

    fn push(&mut self, interval: i64) {
        self.min = self.min.min(interval);
        self.max = self.max.max(interval);
    }
}

struct PlaybackReport {
    raw: IntervalRange,
    adjusted: IntervalRange,
}

/// Feeds frames with millisecond-granular timestamps, as most containers
/// carry them, and seeks once halfway through.
fn play(smoother: &mut ReleaseTimeSmoother, content_fps: f64) -> PlaybackReport {
    let clock = MonotonicClock::process();
    let playback_start_ns = clock.now_ns() + NANOS_PER_SECOND / 10;
    let mut seek_offset_us = 0;

    let mut report = PlaybackReport {
        raw: IntervalRange::new(),
        adjusted: IntervalRange::new(),
    };
    let mut previous: Option<(i64, i64)> = None;

    for k in 0..FRAMES {
        if k == SEEK_AT_FRAME {
            seek_offset_us = SEEK_DISTANCE_US;
            smoother.on_position_reset();
            previous = None;
        }

        let exact_us = (k as f64 * 1_000_000.0 / content_fps) as i64;
        let presentation_us = (exact_us + 500) / 1_000 * 1_000 + seek_offset_us;
        let release_ns = playback_start_ns + (presentation_us - seek_offset_us) * 1_000;

        smoother.record_frame(presentation_us);
        let adjusted_ns = smoother.adjust_release_time(release_ns);

        if let Some((prev_raw, prev_adjusted)) = previous {
            // Skip the settling period after each anchor.
            if smoother.frame_count() > SmootherConfig::default().min_frames_for_adjustment {
                report.raw.push(release_ns - prev_raw);
                report.adjusted.push(adjusted_ns - prev_adjusted);
            }
        }
        previous = Some((release_ns, adjusted_ns));

        if k % 24 == 0 {
            log::debug!(
                "frame {k}: pts {presentation_us} us, release {release_ns} ns -> {adjusted_ns} ns"
            );
        }
    }

    report
}
