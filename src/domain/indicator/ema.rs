//! Exponential Moving Average.
//!
//! k = 2/(span+1), seeded with the first finite value, then
//! EMA[i] = x[i]*k + EMA[i-1]*(1-k). Non-finite inputs leave the average
//! unchanged; positions before the first finite value are NaN.

pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let k = smoothing_factor(span);
    let mut ema: Option<f64> = None;

    values
        .iter()
        .map(|&x| {
            if x.is_finite() {
                ema = Some(match ema {
                    None => x,
                    Some(prev) => x * k + prev * (1.0 - k),
                });
            }
            ema.unwrap_or(f64::NAN)
        })
        .collect()
}

pub fn smoothing_factor(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}
