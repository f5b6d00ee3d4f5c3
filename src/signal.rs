//! Stateless numeric helpers shared by the eCode interpreters.
//!
//! `base_current` — holding-current estimator (histogram peak, not a plain
//!   mean, so transient deflections and spikes do not drag the estimate).
//! `smooth`       — zero-phase sliding-median filter applied before any
//!   threshold-based edge detection.
//! `nanmean`      — mean over the defined entries of a feature vector.
use ndarray::Array1;

/// Number of amplitude bins used by [`base_current`].
const N_BINS: usize = 100;

/// Estimate the holding (baseline) current of a raw current trace.
///
/// Builds a coarse amplitude histogram, takes the most populated bin and
/// returns the median of the samples falling in it. For a trace that sits
/// at a constant holding level outside the stimulus window this recovers
/// that level exactly, regardless of how large the stimulus deflection is.
pub fn base_current(current: &Array1<f64>) -> f64 {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in current.iter() {
        if v < lo { lo = v; }
        if v > hi { hi = v; }
    }
    if !lo.is_finite() || !hi.is_finite() || hi - lo < f64::EPSILON {
        // Flat (or empty) trace: every sample is the baseline.
        return current.first().copied().unwrap_or(0.0);
    }

    let width = (hi - lo) / N_BINS as f64;
    let mut counts = [0usize; N_BINS];
    for &v in current.iter() {
        let bin = (((v - lo) / width) as usize).min(N_BINS - 1);
        counts[bin] += 1;
    }
    let peak = counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, c)| *c)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let bin_lo = lo + peak as f64 * width;
    let bin_hi = bin_lo + width;
    let mut in_bin: Vec<f64> = current
        .iter()
        .copied()
        .filter(|&v| v >= bin_lo && (v < bin_hi || (peak == N_BINS - 1 && v <= hi)))
        .collect();
    in_bin.sort_by(|a, b| a.total_cmp(b));
    median_of_sorted(&in_bin).unwrap_or((bin_lo + bin_hi) / 2.0)
}

/// Zero-phase sliding-median smoothing.
///
/// Each output sample is the median of a `width`-sample window centred on
/// the input sample (window truncated at the edges, so the output has the
/// same length as the input and no phase shift). `width` is forced odd.
pub fn smooth(current: &Array1<f64>, width: usize) -> Array1<f64> {
    let n = current.len();
    let width = width.max(1) | 1;
    if n == 0 || width == 1 {
        return current.clone();
    }
    let half = width / 2;

    let mut out = Array1::zeros(n);
    let mut window: Vec<f64> = Vec::with_capacity(width);
    for i in 0..n {
        let start = i.saturating_sub(half);
        let stop = (i + half + 1).min(n);
        window.clear();
        window.extend(current.iter().skip(start).take(stop - start));
        window.sort_by(|a, b| a.total_cmp(b));
        // Truncated edge windows can have even length.
        out[i] = median_of_sorted(&window).unwrap_or(current[i]);
    }
    out
}

/// Mean over the finite entries of `values`; `None` when no entry is finite.
///
/// This is the NaN-safe average used for feature values: an undefined
/// feature stays undefined instead of becoming a numeric placeholder.
pub fn nanmean(values: &[f64]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn median_of_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}
