//! Small numeric helpers shared by the agents and the backtest.

/// Simple return between two prices. Zero when `from` is not positive.
pub fn simple_return(from: f64, to: f64) -> f64 {
    if from <= 0.0 {
        return 0.0;
    }
    (to - from) / from
}

/// Close-to-close returns of a price series.
pub fn period_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| simple_return(w[0], w[1]))
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1). Zero for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Logistic squash into (0, 1).
pub fn logistic(x: f64, steepness: f64) -> f64 {
    1.0 / (1.0 + (-x * steepness).exp())
}

/// Fraction of `population` strictly below `value`. A population of one ranks at 0.5.
pub fn percentile_rank(value: f64, population: &[f64]) -> f64 {
    if population.len() <= 1 {
        return 0.5;
    }
    let below = population.iter().filter(|&&p| p < value).count();
    below as f64 / population.len() as f64
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Relative closeness check used for reconciliation.
pub fn approx_eq(a: f64, b: f64, rel_tol: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= rel_tol * scale
}
