/// Returns the vsync edge closest to `release_time_ns`.
///
/// Edges lie at `sampled_vsync_ns + k * vsync_duration_ns`. The edge count
/// uses truncating division, so for release times before the sample the
/// bracketing pair is chosen around the truncated edge. Ties go to the later
/// edge. `vsync_duration_ns` must be positive.
pub fn closest_vsync(release_time_ns: i64, sampled_vsync_ns: i64, vsync_duration_ns: i64) -> i64 {
    debug_assert!(vsync_duration_ns > 0);
    let vsync_count = (release_time_ns - sampled_vsync_ns) / vsync_duration_ns;
    let snapped_ns = sampled_vsync_ns + vsync_duration_ns * vsync_count;

    let (before_ns, after_ns) = if release_time_ns <= snapped_ns {
        (snapped_ns - vsync_duration_ns, snapped_ns)
    } else {
        (snapped_ns, snapped_ns + vsync_duration_ns)
    };

    if after_ns - release_time_ns <= release_time_ns - before_ns {
        after_ns
    } else {
        before_ns
    }
}
