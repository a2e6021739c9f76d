//! Cross-module properties of the bulk pipeline stages

use ahr_rnaseq::data::{
    build_cohorts, CohortParams, CountMatrix, GeneAnnotation, QcMetrics, SampleRecord, SampleTable,
};
use ahr_rnaseq::de::{call_for, DeCall, GeneSet, Thresholds};
use ahr_rnaseq::enrichment::{gsea, GseaParams, RankedList};
use ahr_rnaseq::orthology::{translate, translate_set, OrthologTable};
use approx::assert_relative_eq;
use ndarray::Array2;

fn record(study: &str, tissue: &str, library: &str, smoking_type: &str) -> SampleRecord {
    SampleRecord {
        study: study.into(),
        patient: format!("p_{}", library),
        sample: format!("s_{}", library),
        library: library.into(),
        tissue: tissue.into(),
        smoking_type: smoking_type.into(),
        smoking_status: "current".into(),
        qc: QcMetrics::default(),
    }
}

/// 40 genes over 8 libraries, columns stored in reverse library order
fn matrix() -> CountMatrix {
    let libs: Vec<String> = (0..8).rev().map(|j| format!("L{}", j)).collect();
    let values = Array2::from_shape_fn((40, 8), |(g, j)| ((g * 7 + j * 13) % (g + 5) * g) as f64);
    CountMatrix::new(values, (0..40).map(|g| format!("E{}", g)).collect(), libs).unwrap()
}

fn two_cohorts() -> SampleTable {
    SampleTable::new(
        (0..8)
            .map(|j| {
                let tissue = if j % 2 == 0 { "airway" } else { "blood" };
                let smoking = if j < 4 { "control" } else { "cigarette" };
                record("S1", tissue, &format!("L{}", j), smoking)
            })
            .collect(),
    )
    .unwrap()
}

#[test]
fn test_cohort_columns_match_sample_table() {
    let cohorts = build_cohorts(&two_cohorts(), &matrix(), &GeneAnnotation::new(), &CohortParams {
        gene_min_samples: 1,
        gene_min_counts: 1.0,
        ..CohortParams::default()
    })
    .unwrap();

    assert_eq!(cohorts.len(), 2);
    for cohort in &cohorts {
        assert_eq!(cohort.counts().sample_ids(), cohort.samples().libraries().as_slice());
        assert_eq!(cohort.log_cpm().ncols(), cohort.n_samples());
    }
    assert_eq!(cohorts[0].name(), "S1_airway");
    assert_eq!(cohorts[0].samples().libraries(), vec!["L0", "L2", "L4", "L6"]);
}

#[test]
fn test_gene_filter_is_monotonic() {
    let m = matrix();
    for min_samples in 1..=8 {
        for step in 0..20 {
            let min_count = step as f64 * 5.0;
            let kept = m.expressed_genes(min_count, min_samples, 0.0);
            let stricter_count = m.expressed_genes(min_count + 5.0, min_samples, 0.0);
            let stricter_samples = m.expressed_genes(min_count, min_samples + 1, 0.0);
            assert!(stricter_count.iter().all(|g| kept.contains(g)));
            assert!(stricter_samples.iter().all(|g| kept.contains(g)));
        }
    }
}

#[test]
fn test_cpm_columns_sum_to_scaled_million() {
    let cohorts = build_cohorts(&two_cohorts(), &matrix(), &GeneAnnotation::new(), &CohortParams {
        gene_min_samples: 1,
        gene_min_counts: 1.0,
        ..CohortParams::default()
    })
    .unwrap();
    for cohort in &cohorts {
        let cpm = cohort.cpm().unwrap();
        for (j, nf) in cohort.norm_factors().iter().enumerate() {
            assert_relative_eq!(cpm.column(j).sum() * nf, 1e6, max_relative = 1e-9);
        }
    }
}

#[test]
fn test_duplicate_symbol_keeps_highest_mean_row() {
    let libs: Vec<String> = (0..4).map(|j| format!("L{}", j)).collect();
    let values = Array2::from_shape_fn((4, 4), |(g, _)| match g {
        0 => 100.0,
        1 => 400.0,
        2 => 250.0,
        _ => 1000.0,
    });
    let counts = CountMatrix::new(
        values,
        vec!["E_low".into(), "E_high".into(), "E_mid".into(), "E_other".into()],
        libs.clone(),
    )
    .unwrap();
    let mut ann = GeneAnnotation::new();
    for id in ["E_low", "E_high", "E_mid"] {
        ann.insert(id, "AHRR", "5");
    }
    ann.insert("E_other", "GAPDH", "12");

    let samples = SampleTable::new(libs.iter().map(|l| record("S", "airway", l, "control")).collect()).unwrap();
    let cohorts = build_cohorts(&samples, &counts, &ann, &CohortParams::default()).unwrap();
    let cohort = &cohorts[0];

    let ahrr: Vec<_> = cohort.genes().iter().filter(|g| g.gene_name == "AHRR").collect();
    assert_eq!(ahrr.len(), 1);
    assert_eq!(ahrr[0].gene_id, "E_high");
    assert_eq!(cohort.symbols(), &["AHRR".to_string(), "GAPDH".to_string()]);
}

#[test]
fn test_labels_follow_thresholds() {
    let t = Thresholds::new(0.05, 1.0);
    for lfc in [-8.0, -2.0, -0.5, 0.0, 0.5, 2.0, 8.0] {
        assert_eq!(call_for(0.3, lfc, &t), DeCall::No);
    }
    assert_eq!(call_for(0.01, 2.0, &t), DeCall::Up);
    assert_eq!(call_for(0.01, -2.0, &t), DeCall::Down);
    assert_eq!(DeCall::Down.to_string(), "dn");
}

#[test]
fn test_gsea_never_reports_small_sets() {
    let ranked = RankedList::new((0..300).map(|i| (format!("G{}", i), 150.0 - i as f64)).collect()).unwrap();
    let gene = |i: usize| format!("G{}", i);
    let sets = vec![
        GeneSet::new("nine_present", (0..9).map(gene).chain(["ABSENT1".into(), "ABSENT2".into()]).collect()),
        GeneSet::new("ten_present", (100..110).map(gene).collect()),
        GeneSet::new("thirty", (0..30).map(gene).collect()),
    ];
    let params = GseaParams {
        n_perm: 100,
        ..GseaParams::default()
    };
    let records = gsea(&ranked, &sets, &params, "cig_vs_ctrl", "S1_airway").unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.pathway.as_str()).collect();
    assert!(!names.contains(&"nine_present"));
    assert!(names.contains(&"ten_present"));
    assert!(names.contains(&"thirty"));
}

#[test]
fn test_ortholog_translation_drops_unmapped() {
    let mut orthologs = OrthologTable::new();
    orthologs.insert("Cyp1a1", "CYP1A1");
    orthologs.insert("Ahrr", "AHRR");
    let set = GeneSet::new("mouse_up", vec!["Cyp1a1".into(), "Gm4951".into(), "Ahrr".into()]);

    let translated = translate_set(&orthologs, &set);
    assert_eq!(translated.genes(), &["CYP1A1", "AHRR"]);
    assert_eq!(translate(&orthologs, set.genes()).unmapped, vec!["Gm4951"]);
}
