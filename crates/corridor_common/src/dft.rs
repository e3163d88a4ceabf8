//! DFT baseline builder: linear detrending, harmonic selection by
//! amplitude-time contribution, and restoration over arbitrary horizons.
//!
//! Restoration phases use the dimensionless position inside the historical
//! window, so projected curves stay continuous when the horizon extends
//! past the window boundary.

use std::f64::consts::{FRAC_2_PI, PI};

use crate::config::CorridorParams;
use crate::types::{BoundaryCurve, CorridorSpec, Harmonic, Sample, TrendLine};

/// Harmonics below this amplitude are never worth restoring.
pub const AMPLITUDE_FLOOR: f64 = 1e-12;

/// Regression denominators below this are treated as degenerate.
const TREND_DENOM_EPS: f64 = 1e-10;

/// OLS result with the sample means retained for common-trend rebasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendFit {
    pub line: TrendLine,
    pub mean_t: f64,
    pub mean_y: f64,
}

/// Ordinary least squares over `(t, v)`.
///
/// Time is rebased to the first sample internally (epoch-second squares
/// exceed f64 integer precision); the returned line is in absolute
/// coordinates, so restoration output is unaffected.
pub fn fit_trend(samples: &[Sample]) -> TrendFit {
    let n = samples.len();
    if n == 0 {
        return TrendFit::default();
    }
    let t0 = samples[0].t;
    let nf = n as f64;

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;
    for s in samples {
        let x = (s.t - t0) as f64;
        sum_x += x;
        sum_y += s.v;
        sum_xx += x * x;
        sum_xy += x * s.v;
    }
    let mean_x = sum_x / nf;
    let mean_y = sum_y / nf;
    let mean_t = mean_x + t0 as f64;

    let denom = sum_xx - nf * mean_x * mean_x;
    let line = if denom.abs() < TREND_DENOM_EPS {
        TrendLine {
            slope: 0.0,
            intercept: mean_y,
        }
    } else {
        let slope = (sum_xy - nf * mean_x * mean_y) / denom;
        TrendLine {
            slope,
            intercept: mean_y - slope * mean_t,
        }
    };

    TrendFit {
        line,
        mean_t,
        mean_y,
    }
}

/// Replace both slopes with their mean, rebasing each intercept so the
/// boundary means are preserved.
pub fn apply_common_trend(upper: &mut TrendFit, lower: &mut TrendFit) {
    let slope = (upper.line.slope + lower.line.slope) / 2.0;
    upper.line.slope = slope;
    upper.line.intercept = upper.mean_y - slope * upper.mean_t;
    lower.line.slope = slope;
    lower.line.intercept = lower.mean_y - slope * lower.mean_t;
}

/// Residuals after removing the fitted line.
pub fn detrend(samples: &[Sample], line: &TrendLine) -> Vec<f64> {
    samples.iter().map(|s| s.v - line.value_at(s.t)).collect()
}

/// Full real DFT over bins `k = 0 ..= N/2`.
pub fn transform(xs: &[f64]) -> Vec<Harmonic> {
    let n = xs.len();
    if n == 0 {
        return Vec::new();
    }
    let nf = n as f64;
    let mut harmonics = Vec::with_capacity(n / 2 + 1);

    for k in 0..=n / 2 {
        let mut re = 0.0;
        let mut im = 0.0;
        for (i, x) in xs.iter().enumerate() {
            let angle = 2.0 * PI * k as f64 * i as f64 / nf;
            re += x * angle.cos();
            im -= x * angle.sin();
        }
        let norm = if k == 0 { nf } else { nf / 2.0 };
        let amplitude = (re * re + im * im).sqrt() / norm;
        let phase = if re == 0.0 && im == 0.0 {
            0.0
        } else {
            im.atan2(re)
        };
        harmonics.push(Harmonic {
            k,
            amplitude,
            phase,
        });
    }
    harmonics
}

/// Amplitude-time contribution of one harmonic over a horizon of
/// `total_secs`, approximated by a midpoint Riemann sum on `grid_n` points.
pub fn contribution(h: &Harmonic, total_secs: f64, grid_n: usize) -> f64 {
    if h.k == 0 {
        return h.amplitude * total_secs;
    }
    if grid_n == 0 || total_secs <= 0.0 {
        return 0.0;
    }
    let nf = grid_n as f64;
    let dt = total_secs / nf;
    let mut sum = 0.0;
    for i in 0..grid_n {
        let theta = (i as f64 + 0.5) / nf;
        sum += (h.amplitude * (2.0 * PI * h.k as f64 * theta + h.phase).cos()).abs();
    }
    sum * dt
}

/// Contribution-based selection: the DC term plus the `max_harmonics - 1`
/// highest-contribution harmonics above the amplitude-time threshold.
/// Harmonics with negligible amplitude are filtered at the end.
pub fn select(
    harmonics: &[Harmonic],
    total_secs: f64,
    grid_n: usize,
    params: &CorridorParams,
) -> Vec<Harmonic> {
    let threshold = params.min_amplitude * total_secs * FRAC_2_PI;

    let dc = harmonics.iter().find(|h| h.k == 0).copied();
    let mut scored: Vec<(f64, Harmonic)> = harmonics
        .iter()
        .filter(|h| h.k > 0)
        .map(|h| (contribution(h, total_secs, grid_n), *h))
        .filter(|(score, _)| *score >= threshold)
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(params.max_harmonics.saturating_sub(1));

    let mut selected: Vec<Harmonic> = dc.into_iter().collect();
    selected.extend(scored.into_iter().map(|(_, h)| h));
    selected.sort_by_key(|h| h.k);
    selected.retain(|h| h.amplitude >= AMPLITUDE_FLOOR);
    selected
}

/// Restore a curve on `[start, end]` with step `step`.
///
/// `theta = (t - data_start) / total_duration`; each harmonic contributes
/// `amp * cos(2*pi*k*theta + phase)`, the DC term its signed mean. The
/// trend, when given, is added in absolute time.
pub fn restore(
    coeffs: &[Harmonic],
    trend: Option<&TrendLine>,
    data_start: i64,
    total_duration: i64,
    start: i64,
    end: i64,
    step: i64,
) -> Vec<Sample> {
    if end < start {
        return Vec::new();
    }
    let step = step.max(1);
    let total = total_duration as f64;

    let mut out = Vec::with_capacity(((end - start) / step + 1) as usize);
    let mut t = start;
    while t <= end {
        let theta = if total > 0.0 {
            (t - data_start) as f64 / total
        } else {
            0.0
        };
        let mut v = 0.0;
        for h in coeffs {
            v += h.amplitude * (2.0 * PI * h.k as f64 * theta + h.phase).cos();
        }
        if let Some(line) = trend {
            v += line.value_at(t);
        }
        out.push(Sample::new(t, v));
        t += step;
    }
    out
}

/// Detrend, transform and select both boundary series into a restorable
/// corridor spec.
pub fn build_corridor_spec(
    upper: &[Sample],
    lower: &[Sample],
    params: &CorridorParams,
) -> CorridorSpec {
    let mut upper_fit = fit_trend(upper);
    let mut lower_fit = fit_trend(lower);
    if params.use_common_trend {
        apply_common_trend(&mut upper_fit, &mut lower_fit);
    }

    let total_secs = |series: &[Sample]| -> f64 {
        match (series.first(), series.last()) {
            (Some(first), Some(last)) => (last.t - first.t).max(0) as f64,
            _ => 0.0,
        }
    };

    let build = |series: &[Sample], fit: &TrendFit| -> BoundaryCurve {
        let residuals = detrend(series, &fit.line);
        let harmonics = transform(&residuals);
        let coeffs = select(&harmonics, total_secs(series), series.len(), params);
        BoundaryCurve {
            coeffs,
            trend: fit.line,
        }
    };

    CorridorSpec {
        upper: build(upper, &upper_fit),
        lower: build(lower, &lower_fit),
    }
}
