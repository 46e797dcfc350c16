// THEORY:
// The offset-box series is consumed by tooling that aligns it against an
// independently sampled pressure log. That alignment and any fitting stay outside
// this crate; what lives here are the small conversions every consumer repeats:
// frame index to seconds, height to compression against a baseline, and cropping
// the head of a run.

use crate::core_modules::measurement::Measurement;

/// Seconds since the first frame. `None` for a non-positive or non-finite rate.
pub fn frame_time_s(frame_index: u64, fps: f64) -> Option<f64> {
    (fps.is_finite() && fps > 0.0).then(|| frame_index as f64 / fps)
}

/// How much shorter `height` is than `baseline`, in percent. Positive when
/// compressed.
pub fn compression_percent(baseline: f64, height: f64) -> Option<f64> {
    (baseline != 0.0).then(|| (baseline - height) / baseline * 100.0)
}

/// Signed change of `value` relative to `reference`, in percent. Positive when
/// elongated.
pub fn relative_change_percent(reference: f64, value: f64) -> Option<f64> {
    (reference != 0.0).then(|| (value - reference) / reference * 100.0)
}

/// Median of `values`, averaging the middle pair for even counts. Baseline heights
/// are usually taken as the median over a quiet stretch of the run.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    })
}

/// The records at or after `start_s`. Records must be in frame order.
pub fn trim_before(records: &[Measurement], fps: f64, start_s: f64) -> &[Measurement] {
    let first = records.partition_point(|m| frame_time_s(m.frame_index, fps).is_some_and(|t| t < start_s));
    &records[first..]
}
