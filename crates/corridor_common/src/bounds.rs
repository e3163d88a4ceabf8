//! Raw corridor envelopes from historical samples.
//!
//! A window of `window_size` samples slides over the interpolated series
//! (centered, half on each side, clipped at the edges). Each position takes
//! the window extremes plus a margin proportional to the window average.

use crate::config::CorridorParams;
use crate::error::{CorridorError, Result};
use crate::types::Sample;

/// Parallel upper/lower envelope series on the same grid as the input.
#[derive(Debug, Clone, Default)]
pub struct CorridorBounds {
    pub upper: Vec<Sample>,
    pub lower: Vec<Sample>,
}

/// Build the raw envelopes. Fails when `window_size` or `margin_percent`
/// is non-positive; empty input yields empty envelopes.
pub fn build(series: &[Sample], params: &CorridorParams) -> Result<CorridorBounds> {
    if params.window_size == 0 {
        return Err(CorridorError::Config(
            "corrdor_params.window_size must be positive".to_string(),
        ));
    }
    if params.margin_percent <= 0.0 {
        return Err(CorridorError::Config(
            "corrdor_params.margin_percent must be positive".to_string(),
        ));
    }

    let n = series.len();
    let mut bounds = CorridorBounds {
        upper: Vec::with_capacity(n),
        lower: Vec::with_capacity(n),
    };
    if n == 0 {
        return Ok(bounds);
    }

    let half = params.window_size / 2;
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(n - 1);
        let window = &series[lo..=hi];

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for s in window {
            min = min.min(s.v);
            max = max.max(s.v);
            sum += s.v;
        }
        let avg = sum / window.len() as f64;
        let margin = avg * params.margin_percent / 100.0;

        bounds.upper.push(Sample::new(series[i].t, max + margin));
        bounds.lower.push(Sample::new(series[i].t, min - margin));
    }

    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(window_size: usize, margin_percent: f64) -> CorridorParams {
        CorridorParams {
            window_size,
            margin_percent,
            ..Default::default()
        }
    }

    fn constant_series(n: usize, v: f64) -> Vec<Sample> {
        (0..n).map(|i| Sample::new(i as i64 * 60, v)).collect()
    }

    #[test]
    fn test_constant_series_envelope() {
        let series = constant_series(20, 10.0);
        let bounds = build(&series, &params(4, 10.0)).unwrap();
        assert_eq!(bounds.upper.len(), series.len());
        // max + 10% of avg = 11, min - 10% of avg = 9
        assert!((bounds.upper[10].v - 11.0).abs() < 1e-12);
        assert!((bounds.lower[10].v - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_envelope_contains_series() {
        let series: Vec<Sample> = (0..100)
            .map(|i| Sample::new(i * 60, (i as f64 * 0.3).sin() * 5.0 + 20.0))
            .collect();
        let bounds = build(&series, &params(8, 5.0)).unwrap();
        for i in 0..series.len() {
            assert!(bounds.upper[i].v >= series[i].v);
            assert!(bounds.lower[i].v <= series[i].v);
        }
    }

    #[test]
    fn test_margin_monotone() {
        let series: Vec<Sample> = (0..50)
            .map(|i| Sample::new(i * 60, 15.0 + (i % 7) as f64))
            .collect();
        let narrow = build(&series, &params(6, 2.0)).unwrap();
        let wide = build(&series, &params(6, 20.0)).unwrap();
        for i in 0..series.len() {
            assert!(wide.upper[i].v >= narrow.upper[i].v);
            assert!(wide.lower[i].v <= narrow.lower[i].v);
        }
    }

    #[test]
    fn test_rejects_bad_params() {
        let series = constant_series(5, 1.0);
        assert!(build(&series, &params(0, 5.0)).is_err());
        assert!(build(&series, &params(4, 0.0)).is_err());
        assert!(build(&series, &params(4, -1.0)).is_err());
    }

    #[test]
    fn test_empty_input() {
        let bounds = build(&[], &params(4, 5.0)).unwrap();
        assert!(bounds.upper.is_empty());
        assert!(bounds.lower.is_empty());
    }
}
