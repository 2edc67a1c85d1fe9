use std::sync::Arc;
use std::time::Duration;

use crate::display::DisplayTimingProvider;
use crate::time::NANOS_PER_MICRO;
use crate::vsync::VsyncSampler;

use super::register::TwoSlot;
use super::snap::closest_vsync;

/// Smoother tunables.
#[derive(Debug, Clone)]
pub struct SmootherConfig {
    /// Frames that must be observed after an anchor before release times are
    /// projected from the average frame duration. Values below 1 are raised to 1.
    pub min_frames_for_adjustment: i64,

    /// Largest tolerated divergence between elapsed content time and elapsed
    /// release time before the smoother re-anchors.
    pub max_allowed_drift: Duration,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            min_frames_for_adjustment: 6,
            max_allowed_drift: Duration::from_millis(20),
        }
    }
}

/// Paired content/wall-clock snapshot taken at (re)synchronization.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SyncAnchor {
    pub frame_presentation_time_ns: i64,
    pub unadjusted_release_time_ns: i64,
}

/// Adjusted presentation time of one frame, indexed within its sync epoch.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct AdjustedFrame {
    pub index: i64,
    pub presentation_time_ns: i64,
}

/// Shared display collaborators of a session.
struct DisplaySync {
    sampler: Arc<dyn VsyncSampler>,
    display: Arc<DisplayTimingProvider>,
    registered: bool,
}

/// Per-session frame release smoother.
///
/// Release times are smoothed by projecting each frame from the average
/// frame duration observed since the last anchor, then snapped to the
/// closest vsync edge minus the display's release offset. Large drift
/// between the content clock and the release clock silently re-anchors.
///
/// All methods run on the session's playback thread.
pub struct ReleaseTimeSmoother {
    min_frames_for_adjustment: i64,
    max_allowed_drift_ns: i64,
    display: Option<DisplaySync>,

    format_frame_rate: Option<f32>,
    playback_speed: f32,
    next_frame_presentation_time_us: i64,

    anchor: Option<SyncAnchor>,
    frame_count: i64,
    last_adjusted: TwoSlot<AdjustedFrame>,
    resync_count: u64,
}

impl ReleaseTimeSmoother {
    /// Creates a smoother that does not align releases with vsync.
    pub fn new(config: SmootherConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a smoother that also snaps releases to the display's vsync.
    ///
    /// Nothing is registered until `on_enabled`.
    pub fn with_display(
        config: SmootherConfig,
        sampler: Arc<dyn VsyncSampler>,
        display: Arc<DisplayTimingProvider>,
    ) -> Self {
        Self::build(
            config,
            Some(DisplaySync {
                sampler,
                display,
                registered: false,
            }),
        )
    }

    fn build(config: SmootherConfig, display: Option<DisplaySync>) -> Self {
        Self {
            min_frames_for_adjustment: config.min_frames_for_adjustment.max(1),
            max_allowed_drift_ns: i64::try_from(config.max_allowed_drift.as_nanos())
                .unwrap_or(i64::MAX),
            display,
            format_frame_rate: None,
            playback_speed: 1.0,
            next_frame_presentation_time_us: 0,
            anchor: None,
            frame_count: 0,
            last_adjusted: TwoSlot::default(),
            resync_count: 0,
        }
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Session enabled: drops sync and starts observing the display.
    pub fn on_enabled(&mut self) {
        self.anchor = None;
        if let Some(sync) = self.display.as_mut() {
            if sync.registered {
                sync.display.refresh();
            } else {
                sync.sampler.add_observer();
                sync.display.register();
                sync.registered = true;
                log::debug!("release smoother enabled with vsync alignment");
            }
        }
    }

    /// Session disabled: stops observing the display.
    pub fn on_disabled(&mut self) {
        if let Some(sync) = self.display.as_mut() {
            if sync.registered {
                sync.display.unregister();
                sync.sampler.remove_observer();
                sync.registered = false;
                log::debug!("release smoother disabled");
            }
        }
    }

    pub fn on_started(&mut self) {
        self.anchor = None;
    }

    pub fn on_position_reset(&mut self) {
        self.anchor = None;
    }

    /// Playback speed, where 1.0 is normal rate.
    pub fn on_playback_speed(&mut self, speed: f32) {
        self.playback_speed = speed;
    }

    /// Output format frame rate, `None` if the format does not declare one.
    pub fn on_format_changed(&mut self, frame_rate: Option<f32>) {
        self.format_frame_rate = frame_rate;
    }

    /// Estimated playback frame rate, or `None` if the format rate is unknown.
    pub fn playback_frame_rate(&self) -> Option<f32> {
        self.format_frame_rate
            .map(|rate| rate * self.playback_speed)
    }

    // ── per frame ─────────────────────────────────────────────────────────

    /// Records the next candidate frame.
    ///
    /// Call once per frame, before it is skipped, dropped or rendered, and
    /// before any `adjust_release_time` call for it.
    pub fn record_frame(&mut self, frame_presentation_time_us: i64) {
        self.last_adjusted.advance();
        self.next_frame_presentation_time_us = frame_presentation_time_us;
        self.frame_count += 1;
    }

    /// Returns the adjusted release time of the most recently recorded frame.
    ///
    /// `unadjusted_release_time_ns` and the result share one monotonic
    /// nanosecond timebase. Safe to call any number of times per frame;
    /// calling closer to the actual release gives a better estimate.
    pub fn adjust_release_time(&mut self, unadjusted_release_time_ns: i64) -> i64 {
        let frame_presentation_time_ns = self
            .next_frame_presentation_time_us
            .saturating_mul(NANOS_PER_MICRO);

        // No-op until there is enough history to project.
        let mut adjusted_frame_time_ns = frame_presentation_time_ns;
        let mut adjusted_release_time_ns = unadjusted_release_time_ns;

        if let Some(anchor) = self.anchor {
            if self.frame_count >= self.min_frames_for_adjustment {
                let last = self.last_adjusted.committed();
                let average_frame_duration_ns =
                    (frame_presentation_time_ns - anchor.frame_presentation_time_ns) / self.frame_count;
                let candidate_ns = last.presentation_time_ns
                    + average_frame_duration_ns * (self.frame_count - last.index);

                if self.is_drift_too_large(anchor, candidate_ns, unadjusted_release_time_ns) {
                    self.anchor = None;
                } else {
                    adjusted_frame_time_ns = candidate_ns;
                    adjusted_release_time_ns = anchor.unadjusted_release_time_ns
                        + candidate_ns
                        - anchor.frame_presentation_time_ns;
                }
            } else if self.is_drift_too_large(
                anchor,
                frame_presentation_time_ns,
                unadjusted_release_time_ns,
            ) {
                self.anchor = None;
            }
        }

        if self.anchor.is_none() {
            self.resync(frame_presentation_time_ns, unadjusted_release_time_ns);
        }

        self.last_adjusted.stage(AdjustedFrame {
            index: self.frame_count,
            presentation_time_ns: adjusted_frame_time_ns,
        });

        self.snap_to_vsync(adjusted_release_time_ns)
    }

    fn resync(&mut self, frame_presentation_time_ns: i64, unadjusted_release_time_ns: i64) {
        self.anchor = Some(SyncAnchor {
            frame_presentation_time_ns,
            unadjusted_release_time_ns,
        });
        self.frame_count = 0;
        self.last_adjusted = TwoSlot::new(AdjustedFrame {
            index: 0,
            presentation_time_ns: frame_presentation_time_ns,
        });
        self.resync_count += 1;
        log::trace!(
            "release smoother anchored at frame {frame_presentation_time_ns} ns / release {unadjusted_release_time_ns} ns"
        );
    }

    fn is_drift_too_large(&self, anchor: SyncAnchor, frame_time_ns: i64, release_time_ns: i64) -> bool {
        let elapsed_frame_time_ns = frame_time_ns - anchor.frame_presentation_time_ns;
        let elapsed_release_time_ns = release_time_ns - anchor.unadjusted_release_time_ns;
        (elapsed_release_time_ns - elapsed_frame_time_ns).abs() > self.max_allowed_drift_ns
    }

    fn snap_to_vsync(&self, release_time_ns: i64) -> i64 {
        let Some(sync) = self.display.as_ref() else {
            return release_time_ns;
        };
        let Some(timing) = sync.display.timing() else {
            return release_time_ns;
        };
        let Some(sampled_vsync_ns) = sync.sampler.current_sample() else {
            return release_time_ns;
        };

        // Release ahead of the targeted vsync, after the previous one.
        closest_vsync(release_time_ns, sampled_vsync_ns, timing.duration_ns) - timing.offset_ns
    }

    // ── diagnostics ───────────────────────────────────────────────────────

    pub fn is_synced(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn sync_anchor(&self) -> Option<SyncAnchor> {
        self.anchor
    }

    /// Frames recorded since the last anchor.
    pub fn frame_count(&self) -> i64 {
        self.frame_count
    }

    /// Number of times the smoother has (re)anchored.
    pub fn resync_count(&self) -> u64 {
        self.resync_count
    }

    /// Whether this session was built with display collaborators.
    pub fn is_display_synced(&self) -> bool {
        self.display.is_some()
    }
}

impl Drop for ReleaseTimeSmoother {
    fn drop(&mut self) {
        self.on_disabled();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

    use crate::display::{DisplayTimingConfig, FixedRefreshRate};

    const NO_SAMPLE: i64 = i64::MIN;

    /// Deterministic stand-in for the threaded vsync sampler.
    struct FakeSampler {
        sample: AtomicI64,
        observers: AtomicI32,
    }

    impl FakeSampler {
        fn new(sample: Option<i64>) -> Arc<Self> {
            Arc::new(Self {
                sample: AtomicI64::new(sample.unwrap_or(NO_SAMPLE)),
                observers: AtomicI32::new(0),
            })
        }

        fn observers(&self) -> i32 {
            self.observers.load(Ordering::SeqCst)
        }
    }

    impl VsyncSampler for FakeSampler {
        fn current_sample(&self) -> Option<i64> {
            match self.sample.load(Ordering::SeqCst) {
                NO_SAMPLE => None,
                ns => Some(ns),
            }
        }

        fn add_observer(&self) {
            self.observers.fetch_add(1, Ordering::SeqCst);
        }

        fn remove_observer(&self) {
            self.observers.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn display(hz: f64) -> Arc<DisplayTimingProvider> {
        Arc::new(DisplayTimingProvider::new(
            Arc::new(FixedRefreshRate(hz)),
            DisplayTimingConfig::default(),
        ))
    }

    fn smoother() -> ReleaseTimeSmoother {
        ReleaseTimeSmoother::new(SmootherConfig::default())
    }

    /// Records a frame and adjusts it once.
    fn frame(s: &mut ReleaseTimeSmoother, presentation_us: i64, release_ns: i64) -> i64 {
        s.record_frame(presentation_us);
        s.adjust_release_time(release_ns)
    }

    // ── smoothing ─────────────────────────────────────────────────────────

    #[test]
    fn first_adjustment_anchors_without_change() {
        let mut s = smoother();
        assert!(!s.is_synced());
        assert_eq!(frame(&mut s, 40_000, 7_000_000), 7_000_000);
        assert!(s.is_synced());
        assert_eq!(s.frame_count(), 0);
        assert_eq!(
            s.sync_anchor(),
            Some(SyncAnchor {
                frame_presentation_time_ns: 40_000_000,
                unadjusted_release_time_ns: 7_000_000,
            })
        );
    }

    #[test]
    fn steady_cadence_is_noop() {
        let mut s = smoother();
        for k in 0..30 {
            let release = 1_000_000_000 + k * 40_000_000;
            assert_eq!(frame(&mut s, k * 40_000, release), release, "frame {k}");
        }
        assert_eq!(s.frame_count(), 29);
        assert_eq!(s.resync_count(), 1);
    }

    #[test]
    fn constant_offset_is_preserved() {
        let mut s = smoother();
        let offset = 5_000_123_456;
        for k in 0..30 {
            let presentation_us = 2_000_000 + k * 33_000;
            let release = presentation_us * 1_000 + offset;
            let adjusted = frame(&mut s, presentation_us, release);
            assert_eq!(adjusted - presentation_us * 1_000, offset, "frame {k}");
        }
    }

    #[test]
    fn coarse_timestamps_are_smoothed() {
        // 23.976 fps content with millisecond-granular timestamps.
        let mut s = smoother();
        let mut outputs = Vec::new();
        for k in 0..60_i64 {
            let exact_ns = k * 1_000_000_000 * 1001 / 24_000;
            let coarse_us = (exact_ns + 500_000) / 1_000_000 * 1_000;
            outputs.push(frame(&mut s, coarse_us, 5_000_000_000 + exact_ns));
        }
        assert_eq!(s.resync_count(), 1);

        // Raw timestamps step by 41 or 42 ms; adjusted releases stay within 0.1 ms of 41.708 ms.
        for pair in outputs[7..].windows(2) {
            let interval = pair[1] - pair[0];
            assert!((41_608_333..=41_808_333).contains(&interval), "interval {interval}");
        }
    }

    #[test]
    fn repeated_adjustment_is_stable() {
        let mut s = smoother();
        for k in 0..10 {
            s.record_frame(k * 20_000);
            let release = 300_000_000 + k * 20_000_000 + 1_500_000;
            let first = s.adjust_release_time(release);
            let second = s.adjust_release_time(release);
            let third = s.adjust_release_time(release);
            assert_eq!(first, second);
            assert_eq!(second, third);
        }
        assert_eq!(s.resync_count(), 1);
    }

    #[test]
    fn skipped_adjustments_extend_projection() {
        let mut s = smoother();
        for k in 0..8 {
            frame(&mut s, k * 40_000, k * 40_000_000);
        }
        // Frames 8 and 9 are dropped without adjustment.
        s.record_frame(8 * 40_000);
        s.record_frame(9 * 40_000);
        assert_eq!(frame(&mut s, 10 * 40_000, 10 * 40_000_000), 10 * 40_000_000);
        assert_eq!(s.resync_count(), 1);
    }

    // ── resynchronization ─────────────────────────────────────────────────

    #[test]
    fn seek_forces_single_resync() {
        let mut s = smoother();
        for k in 0..10 {
            frame(&mut s, k * 40_000, 1_000_000_000 + k * 40_000_000);
        }
        assert_eq!(s.frame_count(), 9);
        assert_eq!(s.resync_count(), 1);

        // Content clock jumps a second ahead of the release clock.
        let release = 1_000_000_000 + 10 * 40_000_000;
        assert_eq!(frame(&mut s, 10 * 40_000 + 1_000_000, release), release);
        assert_eq!(s.frame_count(), 0);
        assert_eq!(s.resync_count(), 2);

        for k in 11..20 {
            let release = 1_000_000_000 + k * 40_000_000;
            assert_eq!(frame(&mut s, k * 40_000 + 1_000_000, release), release);
        }
        assert_eq!(s.resync_count(), 2);
        assert_eq!(s.frame_count(), 9);
    }

    #[test]
    fn drift_checked_before_threshold() {
        let mut s = smoother();
        for k in 0..3 {
            frame(&mut s, k * 40_000, k * 40_000_000);
        }
        assert_eq!(s.frame_count(), 2);
        frame(&mut s, 3 * 40_000 + 25_000, 3 * 40_000_000);
        assert_eq!(s.frame_count(), 0);
        assert_eq!(s.resync_count(), 2);
    }

    #[test]
    fn drift_within_tolerance_keeps_sync() {
        let mut s = smoother();
        for k in 0..4 {
            frame(&mut s, k * 40_000, k * 40_000_000);
        }
        frame(&mut s, 4 * 40_000 + 19_000, 4 * 40_000_000);
        assert_eq!(s.resync_count(), 1);
        assert_eq!(s.frame_count(), 4);
    }

    #[test]
    fn start_and_position_reset_drop_sync() {
        let mut s = smoother();
        frame(&mut s, 0, 0);
        s.on_started();
        assert!(!s.is_synced());
        frame(&mut s, 40_000, 40_000_000);
        assert_eq!(s.resync_count(), 2);

        s.on_position_reset();
        assert!(!s.is_synced());
        frame(&mut s, 80_000, 80_000_000);
        assert_eq!(s.resync_count(), 3);
    }

    #[test]
    fn speed_and_format_changes_keep_sync() {
        let mut s = smoother();
        frame(&mut s, 0, 0);
        s.on_playback_speed(2.0);
        s.on_format_changed(Some(30.0));
        assert!(s.is_synced());
    }

    // ── frame rate ────────────────────────────────────────────────────────

    #[test]
    fn playback_frame_rate_unknown_without_format() {
        let mut s = smoother();
        s.on_playback_speed(1.5);
        assert_eq!(s.playback_frame_rate(), None);
    }

    #[test]
    fn playback_frame_rate_scales_with_speed() {
        let mut s = smoother();
        s.on_format_changed(Some(24.0));
        assert_eq!(s.playback_frame_rate(), Some(24.0));
        s.on_playback_speed(1.5);
        assert_eq!(s.playback_frame_rate(), Some(36.0));
        s.on_format_changed(None);
        assert_eq!(s.playback_frame_rate(), None);
    }

    // ── vsync alignment ───────────────────────────────────────────────────

    #[test]
    fn snaps_to_closest_vsync_minus_offset() {
        let sampler = FakeSampler::new(Some(0));
        let mut s = ReleaseTimeSmoother::with_display(
            SmootherConfig::default(),
            sampler.clone(),
            display(60.0),
        );
        s.on_enabled();
        // Closest edge to 20 ms at 60 Hz is 16_666_666; offset is 13_333_332.
        assert_eq!(frame(&mut s, 0, 20_000_000), 3_333_334);
        // 26 ms is closer to the 33_333_332 edge.
        assert_eq!(frame(&mut s, 6_000, 26_000_000), 20_000_000);
    }

    #[test]
    fn no_sample_means_no_snapping() {
        let mut s = ReleaseTimeSmoother::with_display(
            SmootherConfig::default(),
            FakeSampler::new(None),
            display(60.0),
        );
        s.on_enabled();
        assert_eq!(frame(&mut s, 0, 20_000_000), 20_000_000);
    }

    #[test]
    fn unknown_display_timing_means_no_snapping() {
        let mut s = ReleaseTimeSmoother::with_display(
            SmootherConfig::default(),
            FakeSampler::new(Some(0)),
            display(0.0),
        );
        s.on_enabled();
        assert_eq!(frame(&mut s, 0, 20_000_000), 20_000_000);
    }

    #[test]
    fn smoothing_only_without_display() {
        let mut s = smoother();
        s.on_enabled();
        assert!(!s.is_display_synced());
        assert_eq!(frame(&mut s, 0, 20_000_000), 20_000_000);
    }

    // ── registration ──────────────────────────────────────────────────────

    #[test]
    fn enable_disable_balanced() {
        let sampler = FakeSampler::new(Some(0));
        let timing = display(60.0);
        let mut s = ReleaseTimeSmoother::with_display(
            SmootherConfig::default(),
            sampler.clone(),
            timing.clone(),
        );
        assert_eq!(sampler.observers(), 0);

        s.on_enabled();
        s.on_enabled();
        assert_eq!(sampler.observers(), 1);
        assert_eq!(timing.registrations(), 1);

        s.on_disabled();
        s.on_disabled();
        assert_eq!(sampler.observers(), 0);
        assert_eq!(timing.registrations(), 0);
    }

    #[test]
    fn drop_unregisters() {
        let sampler = FakeSampler::new(Some(0));
        let timing = display(60.0);
        let mut s = ReleaseTimeSmoother::with_display(
            SmootherConfig::default(),
            sampler.clone(),
            timing.clone(),
        );
        s.on_enabled();
        drop(s);
        assert_eq!(sampler.observers(), 0);
        assert_eq!(timing.registrations(), 0);
    }

    #[test]
    fn sessions_share_one_sampler() {
        let sampler = FakeSampler::new(Some(0));
        let timing = display(60.0);
        let mut a = ReleaseTimeSmoother::with_display(SmootherConfig::default(), sampler.clone(), timing.clone());
        let mut b = ReleaseTimeSmoother::with_display(SmootherConfig::default(), sampler.clone(), timing.clone());
        a.on_enabled();
        b.on_enabled();
        assert_eq!(sampler.observers(), 2);
        a.on_disabled();
        assert_eq!(sampler.observers(), 1);
        assert_eq!(timing.registrations(), 1);
    }

    #[test]
    fn config_clamps_minimum_frames() {
        let config = SmootherConfig {
            min_frames_for_adjustment: 0,
            ..SmootherConfig::default()
        };
        let mut s = ReleaseTimeSmoother::new(config);
        // Right after an anchor the frame count is zero; no projection must divide by it.
        assert_eq!(frame(&mut s, 0, 0), 0);
        assert_eq!(s.adjust_release_time(0), 0);
        assert_eq!(frame(&mut s, 10_000, 10_000_000), 10_000_000);
    }
}
