//! Trailing-window helpers over plain `f64` slices.
//!
//! All windows shrink at the start of the series: output `i` covers
//! `values[i+1-min(i+1, n)..=i]`. Non-finite values are skipped inside a
//! window; a window with no finite values yields NaN.

/// Highest value over the trailing `period` entries.
pub fn hhv(values: &[f64], period: usize) -> Vec<f64> {
    fold_window(values, period, |window| {
        window
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    })
}

/// Lowest value over the trailing `period` entries.
pub fn llv(values: &[f64], period: usize) -> Vec<f64> {
    fold_window(values, period, |window| {
        window
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
    })
}

/// Simple mean over the trailing `period` entries.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    fold_window(values, period, |window| {
        let (sum, count) = window
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        (count > 0).then(|| sum / count as f64)
    })
}

fn fold_window<F>(values: &[f64], period: usize, reduce: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }

    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(period);
            reduce(&values[start..=i]).unwrap_or(f64::NAN)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hhv_shrinks_at_start() {
        let out = hhv(&[3.0, 1.0, 4.0, 1.0, 5.0, 2.0], 3);
        assert_eq!(out, vec![3.0, 3.0, 4.0, 4.0, 5.0, 5.0]);
    }

    #[test]
    fn llv_shrinks_at_start() {
        let out = llv(&[3.0, 1.0, 4.0, 1.0, 5.0, 2.0], 3);
        assert_eq!(out, vec![3.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn sma_shrinking_window() {
        let out = sma(&[2.0, 4.0, 6.0, 8.0], 3);
        assert!((out[0] - 2.0).abs() < f64::EPSILON);
        assert!((out[1] - 3.0).abs() < f64::EPSILON);
        assert!((out[2] - 4.0).abs() < f64::EPSILON);
        assert!((out[3] - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_skips_nan() {
        let out = sma(&[2.0, f64::NAN, 4.0], 3);
        assert!(out[1] == 2.0);
        assert!((out[2] - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn all_nan_window_is_nan() {
        let out = hhv(&[f64::NAN, f64::NAN], 2);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn zero_period_is_all_nan() {
        assert!(sma(&[1.0, 2.0], 0).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn empty_input() {
        assert!(llv(&[], 5).is_empty());
    }
}
