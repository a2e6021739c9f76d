//! Two-sided p-values from test statistics

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// `2 * pnorm(-|z|)`
pub fn two_sided_normal(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => 2.0 * normal.cdf(-z.abs()),
        Err(_) => f64::NAN,
    }
}

/// `2 * pt(-|t|, df)`
pub fn two_sided_t(t: f64, df: f64) -> f64 {
    if t.is_nan() || !(df > 0.0) {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * dist.cdf(-t.abs()),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pvalue_symmetric() {
        assert_relative_eq!(two_sided_normal(2.0), two_sided_normal(-2.0), epsilon = 1e-15);
        assert_relative_eq!(two_sided_normal(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(two_sided_normal(1.959964), 0.05, epsilon = 1e-6);
    }

    #[test]
    fn test_t_approaches_normal() {
        let p_normal = two_sided_normal(2.0);
        assert!((p_normal - two_sided_t(2.0, 1000.0)).abs() < 0.001);
        assert!(two_sided_t(2.0, 3.0) > p_normal);
        assert!(two_sided_t(2.0, 0.0).is_nan());
    }

    #[test]
    fn test_infinite_statistic() {
        assert_eq!(two_sided_normal(f64::INFINITY), 0.0);
        assert_eq!(two_sided_t(f64::NEG_INFINITY, 5.0), 0.0);
    }
}
