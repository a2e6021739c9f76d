//! Bulk DE on a synthetic two-group count matrix

use ahr_rnaseq::data::{Cohort, CohortParams, CountMatrix, GeneAnnotation, QcMetrics, SampleRecord, SampleTable};
use ahr_rnaseq::de::{DeCall, Thresholds};
use ahr_rnaseq::linear_model::{differential_expression, ContrastSpec, EbayesParams};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const N_GENES: usize = 500;
const N_SAMPLES: usize = 10;

fn samples() -> SampleTable {
    SampleTable::new(
        (0..N_SAMPLES)
            .map(|j| SampleRecord {
                study: "SIM".into(),
                patient: format!("P{}", j),
                sample: format!("S{}", j),
                library: format!("L{}", j),
                tissue: "airway".into(),
                smoking_type: if j < 5 { "control" } else { "cigarette" }.into(),
                smoking_status: if j < 5 { "never" } else { "current" }.into(),
                qc: QcMetrics::default(),
            })
            .collect(),
    )
    .unwrap()
}

/// Gene 0 is 4-fold higher in the cigarette group with +-2% noise;
/// every other gene has +-10% noise around its own mean
fn counts() -> CountMatrix {
    let mut rng = StdRng::seed_from_u64(2024);
    let values = Array2::from_shape_fn((N_GENES, N_SAMPLES), |(g, j)| {
        let base = 200.0 + ((g * 37) % 800) as f64;
        if g == 0 {
            let fold = if j < 5 { 1.0 } else { 4.0 };
            (base * fold * rng.random_range(0.98..1.02)).round()
        } else {
            (base * rng.random_range(0.9..1.1)).round()
        }
    });
    CountMatrix::new(
        values,
        (0..N_GENES).map(|g| format!("ENSG{:05}", g)).collect(),
        (0..N_SAMPLES).map(|j| format!("L{}", j)).collect(),
    )
    .unwrap()
}

fn cohort() -> Cohort {
    Cohort::build("SIM_airway", &samples(), &counts(), &GeneAnnotation::new(), &CohortParams::default()).unwrap()
}

#[test]
fn test_upregulated_gene_is_detected() {
    let cohort = cohort();
    assert_eq!(cohort.n_genes(), N_GENES);

    let outcome = differential_expression(
        cohort.log_cpm(),
        cohort.symbols(),
        &cohort.samples().smoking_types(),
        &[ContrastSpec::new("cig_vs_ctrl", "cigarette", "control")],
        &EbayesParams::default(),
        &Thresholds::default(),
        cohort.name(),
    )
    .unwrap();

    assert!(outcome.skipped.is_empty());
    let (name, table) = &outcome.tables[0];
    assert_eq!(name, "cig_vs_ctrl");
    assert_eq!(table.len(), N_GENES);

    let hit = table.iter().find(|r| r.gene == "ENSG00000").unwrap();
    assert!(hit.padj < 0.05, "padj {}", hit.padj);
    assert!((hit.log2_fold_change - 2.0).abs() < 0.15, "log2fc {}", hit.log2_fold_change);
    assert_eq!(hit.call, DeCall::Up);
    assert_eq!(hit.cohort, "SIM_airway");

    // Null genes stay well below the fold-change cutoff
    assert!(table
        .iter()
        .filter(|r| r.gene != "ENSG00000")
        .all(|r| r.call == DeCall::No));
}

#[test]
fn test_missing_level_skips_contrast() {
    let cohort = cohort();
    let outcome = differential_expression(
        cohort.log_cpm(),
        cohort.symbols(),
        &cohort.samples().smoking_types(),
        &ContrastSpec::smoking_defaults(),
        &EbayesParams::default(),
        &Thresholds::default(),
        cohort.name(),
    )
    .unwrap();

    // No ecigarette samples: only cig_vs_ctrl can be evaluated
    assert_eq!(outcome.tables.len(), 1);
    assert_eq!(outcome.skipped.len(), 2);
    assert!(outcome.skipped.iter().any(|(c, _)| c == "ecig_vs_ctrl"));
}
