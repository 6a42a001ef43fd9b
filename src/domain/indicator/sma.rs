//! Simple Moving Average.
//!
//! SMA(n)[i] = (P[i-n+1] + ... + P[i]) / n
//! Warmup: first (n-1) values are `None`.
//!
//! Each window is summed independently: equal windows give bit-identical
//! averages.

pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window_sum: f64 = values[i + 1 - period..=i].iter().sum();
            Some(window_sum / period as f64)
        })
        .collect()
}

/// SMA over a series with gaps: a window containing any `None` is undefined.
pub fn calculate_sma_with_gaps(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window_sum: Option<f64> = values[i + 1 - period..=i].iter().copied().sum();
            window_sum.map(|sum| sum / period as f64)
        })
        .collect()
}
