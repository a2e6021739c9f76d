//! Statistical utility functions shared across modules
//!
//! Ranking with ties, quantiles, and the polygamma helpers needed by the
//! empirical Bayes variance moderation.

use std::cmp::Ordering;

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Sample variance (n - 1 denominator)
pub fn sample_variance(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(x);
    x.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

pub fn median(x: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = x.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_type7(&sorted, 0.5)
}

/// R's default quantile (type 7) on already sorted data
pub fn quantile_type7(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Ranks starting at 1, ties receive the average of their positions
pub fn rank_average(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && x[order[j + 1]] == x[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Sizes of tie groups in `x` (only groups larger than one)
pub fn tie_sizes(x: &[f64]) -> Vec<usize> {
    let mut sorted: Vec<f64> = x.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut ties = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1] == sorted[i] {
            j += 1;
        }
        if j > i {
            ties.push(j - i + 1);
        }
        i = j + 1;
    }
    ties
}

pub fn digamma(x: f64) -> f64 {
    statrs::function::gamma::digamma(x)
}

/// Trigamma function via recurrence and asymptotic expansion
pub fn trigamma(x: f64) -> f64 {
    if !x.is_finite() {
        return if x == f64::INFINITY { 0.0 } else { f64::NAN };
    }
    if x <= 0.0 && x == x.floor() {
        return f64::INFINITY;
    }
    let mut x = x;
    let mut acc = 0.0;
    while x < 10.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let x2 = 1.0 / (x * x);
    // 1/x + 1/(2x^2) + 1/(6x^3) - 1/(30x^5) + 1/(42x^7) - 1/(30x^9)
    acc + 1.0 / x
        + x2 / 2.0
        + (1.0 / x) * x2 * (1.0 / 6.0 + x2 * (-1.0 / 30.0 + x2 * (1.0 / 42.0 + x2 * (-1.0 / 30.0))))
}

/// Solve trigamma(y) = x for y > 0 by Newton iteration
pub fn trigamma_inverse(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x > 1e7 {
        return 1.0 / x.sqrt();
    }
    if x < 1e-6 {
        return 1.0 / x;
    }
    let mut y = 0.5 + 1.0 / x;
    for _ in 0..50 {
        let tri = trigamma(y);
        let dif = -tri * (1.0 - tri / x) / tetragamma_neg(y);
        y += dif;
        if -dif / y < 1e-8 {
            break;
        }
    }
    y
}

/// Negative tetragamma, -psi''(x), used as the Newton derivative
fn tetragamma_neg(x: f64) -> f64 {
    let mut x = x;
    let mut acc = 0.0;
    while x < 10.0 {
        acc += 2.0 / (x * x * x);
        x += 1.0;
    }
    let x2 = 1.0 / (x * x);
    // 1/x^2 + 1/x^3 + 1/(2x^4) - 1/(6x^6) + 1/(6x^8)
    acc + x2 + x2 / x + x2 * x2 * (0.5 + x2 * (-1.0 / 6.0 + x2 / 6.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rank_average_ties() {
        let ranks = rank_average(&[3.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![3.5, 1.0, 3.5, 2.0]);
        assert_eq!(tie_sizes(&[3.0, 1.0, 3.0, 2.0]), vec![2]);
    }

    #[test]
    fn test_quantile_type7() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile_type7(&x, 0.75), 3.25);
        assert_relative_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn test_trigamma_known_values() {
        // trigamma(1) = pi^2 / 6
        assert_relative_eq!(trigamma(1.0), std::f64::consts::PI.powi(2) / 6.0, epsilon = 1e-10);
        // trigamma(0.5) = pi^2 / 2
        assert_relative_eq!(trigamma(0.5), std::f64::consts::PI.powi(2) / 2.0, epsilon = 1e-10);
        // trigamma(2) = pi^2 / 6 - 1
        assert_relative_eq!(trigamma(2.0), std::f64::consts::PI.powi(2) / 6.0 - 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_trigamma_inverse_round_trip() {
        for y in [0.3, 1.0, 2.5, 10.0, 80.0] {
            assert_relative_eq!(trigamma_inverse(trigamma(y)), y, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_sample_variance() {
        assert_relative_eq!(sample_variance(&[1.0, 2.0, 3.0, 4.0]), 5.0 / 3.0);
        assert!(sample_variance(&[1.0]).is_nan());
    }
}
