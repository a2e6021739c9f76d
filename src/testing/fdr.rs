//! Multiple testing correction
//!
//! Benjamini-Hochberg for the bulk DE and GSEA tables, Bonferroni for the
//! single-cell marker tables. NaN p-values stay NaN and are not counted.

use std::cmp::Ordering;

/// Benjamini-Hochberg adjusted p-values, as `p.adjust(method = "BH")`
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return vec![];
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| {
        let (pa, pb) = (pvalues[a], pvalues[b]);
        match (pa.is_nan(), pb.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => pa.total_cmp(&pb),
        }
    });

    let m = pvalues.iter().filter(|p| !p.is_nan()).count();
    if m == 0 {
        return vec![f64::NAN; n];
    }

    let mut padj = vec![f64::NAN; n];
    let mut cummin = f64::INFINITY;
    let mut rank = m;
    for &i in indices.iter().rev() {
        let p = pvalues[i];
        if p.is_nan() {
            continue;
        }
        let adj = (p * m as f64 / rank as f64).min(1.0);
        cummin = cummin.min(adj);
        padj[i] = cummin;
        rank -= 1;
    }
    padj
}

/// Bonferroni adjustment against an explicit number of tests
///
/// Marker tables test a filtered subset of genes but correct for every gene
/// in the dataset, so `n_tests` may exceed `pvalues.len()`.
pub fn bonferroni(pvalues: &[f64], n_tests: usize) -> Vec<f64> {
    let m = n_tests.max(pvalues.iter().filter(|p| !p.is_nan()).count()) as f64;
    pvalues
        .iter()
        .map(|&p| if p.is_nan() { f64::NAN } else { (p * m).min(1.0) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bh_matches_p_adjust() {
        // p.adjust(c(0.01, 0.04, 0.03, 0.02), "BH") = 0.04 0.04 0.04 0.04
        let padj = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.02]);
        for adj in padj {
            assert_relative_eq!(adj, 0.04, epsilon = 1e-12);
        }
        // p.adjust(c(0.001, 0.01, 0.05, 0.5), "BH") = 0.004 0.020 0.0667 0.5
        let padj = benjamini_hochberg(&[0.001, 0.01, 0.05, 0.5]);
        assert_relative_eq!(padj[0], 0.004, epsilon = 1e-12);
        assert_relative_eq!(padj[1], 0.02, epsilon = 1e-12);
        assert_relative_eq!(padj[2], 0.05 * 4.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(padj[3], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_bh_with_nan() {
        let padj = benjamini_hochberg(&[0.01, f64::NAN, 0.03, 0.02]);
        assert!(padj[0].is_finite());
        assert!(padj[1].is_nan());
        assert_relative_eq!(padj[2], 0.03, epsilon = 1e-12);
    }

    #[test]
    fn test_bonferroni_uses_total_genes() {
        let padj = bonferroni(&[0.001, 0.2, f64::NAN], 100);
        assert_relative_eq!(padj[0], 0.1, epsilon = 1e-12);
        assert_eq!(padj[1], 1.0);
        assert!(padj[2].is_nan());
    }
}
