//! Minimum corridor-width enforcement.
//!
//! Indices whose local width already satisfies the minimum act as break
//! points; everything below the minimum is overwritten by piecewise-linear
//! interpolation between the neighbouring break points, keeping both curves
//! continuous in time.

use tracing::warn;

use crate::types::Sample;

/// One healthy-width anchor.
#[derive(Debug, Clone, Copy)]
struct BreakPoint {
    t: i64,
    upper: f64,
    lower: f64,
}

/// Minimum width derived from the boundary DC terms: a factor of their
/// spread, falling back to a factor of their magnitude when the spread
/// is degenerate.
pub fn min_width(dc_upper: f64, dc_lower: f64, factor: f64) -> f64 {
    let spread = factor * (dc_upper - dc_lower).abs();
    if spread > 0.0 {
        spread
    } else {
        factor * dc_upper.abs().max(dc_lower.abs()).max(1.0)
    }
}

/// Enforce the minimum width on two parallel restored curves.
///
/// With no healthy index at all the corridor collapses to a constant band
/// of the full minimum width centered between the DC terms.
pub fn ensure_width(
    upper: &mut [Sample],
    lower: &mut [Sample],
    dc_upper: f64,
    dc_lower: f64,
    factor: f64,
) {
    debug_assert_eq!(upper.len(), lower.len());
    let n = upper.len().min(lower.len());
    if n == 0 {
        return;
    }

    let min_width = min_width(dc_upper, dc_lower, factor);

    let mut breaks: Vec<BreakPoint> = (0..n)
        .filter(|&i| upper[i].v - lower[i].v >= min_width)
        .map(|i| BreakPoint {
            t: upper[i].t,
            upper: upper[i].v,
            lower: lower[i].v,
        })
        .collect();

    if breaks.is_empty() {
        let center = (dc_upper + dc_lower) / 2.0;
        warn!(
            min_width,
            "corridor collapsed everywhere; flattening to constant band"
        );
        for i in 0..n {
            upper[i].v = center + min_width / 2.0;
            lower[i].v = center - min_width / 2.0;
        }
        return;
    }

    breaks.sort_by_key(|b| b.t);
    let first_t = upper[0].t;
    let last_t = upper[n - 1].t;
    if breaks[0].t > first_t {
        let mut edge = breaks[0];
        edge.t = first_t;
        breaks.insert(0, edge);
    }
    if breaks[breaks.len() - 1].t < last_t {
        let mut edge = breaks[breaks.len() - 1];
        edge.t = last_t;
        breaks.push(edge);
    }

    for i in 0..n {
        if upper[i].v - lower[i].v >= min_width {
            continue;
        }
        let t = upper[i].t;
        // first break strictly after t; its predecessor brackets t
        let hi = breaks.partition_point(|b| b.t <= t).min(breaks.len() - 1);
        let lo = hi.saturating_sub(1);
        let (a, b) = (breaks[lo], breaks[hi]);
        let frac = if b.t == a.t {
            0.0
        } else {
            (t - a.t) as f64 / (b.t - a.t) as f64
        };
        upper[i].v = a.upper + frac * (b.upper - a.upper);
        lower[i].v = a.lower + frac * (b.lower - a.lower);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(i as i64 * 60, v))
            .collect()
    }

    #[test]
    fn test_min_width_from_spread() {
        assert_eq!(min_width(10.0, 4.0, 0.5), 3.0);
    }

    #[test]
    fn test_min_width_fallback() {
        // equal DC terms: spread is zero, fall back to magnitude
        assert_eq!(min_width(8.0, 8.0, 0.5), 4.0);
        // both zero: unit fallback
        assert_eq!(min_width(0.0, 0.0, 0.25), 0.25);
    }

    #[test]
    fn test_healthy_corridor_untouched() {
        let mut upper = curve(&[10.0, 11.0, 10.5]);
        let mut lower = curve(&[0.0, 1.0, 0.5]);
        let before_upper = upper.clone();
        ensure_width(&mut upper, &mut lower, 10.0, 0.0, 0.5);
        assert_eq!(upper, before_upper);
    }

    #[test]
    fn test_pinched_segment_repaired() {
        // middle index pinches below min width 5.0
        let mut upper = curve(&[10.0, 3.0, 10.0]);
        let mut lower = curve(&[0.0, 2.0, 0.0]);
        ensure_width(&mut upper, &mut lower, 10.0, 0.0, 0.5);
        for i in 0..upper.len() {
            assert!(upper[i].v - lower[i].v >= 5.0 - 1e-9);
        }
        // repaired point lies on the line between its neighbours
        assert!((upper[1].v - 10.0).abs() < 1e-9);
        assert!((lower[1].v - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_pinched_edges_repaired() {
        let mut upper = curve(&[1.0, 10.0, 1.0]);
        let mut lower = curve(&[0.0, 0.0, 0.0]);
        ensure_width(&mut upper, &mut lower, 10.0, 0.0, 0.5);
        for i in 0..upper.len() {
            assert!(upper[i].v - lower[i].v >= 5.0 - 1e-9);
        }
        // edge anchors are copies of the single healthy break point
        assert!((upper[0].v - 10.0).abs() < 1e-9);
        assert!((upper[2].v - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_collapse_to_constant_band() {
        // both DC amplitudes zero: band of width factor * 1 centered at 0
        let mut upper = curve(&[0.0, 0.0, 0.0, 0.0]);
        let mut lower = curve(&[0.0, 0.0, 0.0, 0.0]);
        ensure_width(&mut upper, &mut lower, 0.0, 0.0, 0.5);
        for i in 0..upper.len() {
            assert!((upper[i].v - 0.25).abs() < 1e-12);
            assert!((lower[i].v + 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_curves() {
        let mut upper: Vec<Sample> = Vec::new();
        let mut lower: Vec<Sample> = Vec::new();
        ensure_width(&mut upper, &mut lower, 1.0, 0.0, 0.5);
        assert!(upper.is_empty());
    }
}
