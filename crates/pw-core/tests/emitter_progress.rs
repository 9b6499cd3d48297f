//! End-to-end behavior of the progress emitter.

use proptest::prelude::*;
use pw_core::{CategorySpec, CategoryTable, EtaEstimator, ProgressEmitter, ProgressRecord};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn two_category_table() -> CategoryTable {
    CategoryTable::new(
        vec![CategorySpec::new("a", 10.0), CategorySpec::new("b", 90.0)],
        [("fetch", "a"), ("crunch", "b"), ("x", "b")],
        "b",
    )
    .unwrap()
}

fn open(dir: &Path, table: CategoryTable) -> ProgressEmitter {
    ProgressEmitter::open(dir.join("progress.log"), table, EtaEstimator::default()).unwrap()
}

fn logged(dir: &Path) -> Vec<ProgressRecord> {
    fs::read_to_string(dir.join("progress.log"))
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn weighted_overall_from_two_categories() {
    let tmp = TempDir::new().unwrap();
    let mut em = open(tmp.path(), two_category_table());

    em.stage_start("fetch", Some(4));
    em.stage_end("fetch");
    em.stage_start("crunch", Some(10));
    let record = em.stage_update("crunch", 5, None);

    assert_eq!(em.category_progress("a"), Some(100.0));
    assert_eq!(em.category_progress("b"), Some(50.0));
    assert_eq!(record.overall_progress_percent, 55.0);
}

#[test]
fn category_never_regresses_when_stage_reports_less() {
    let tmp = TempDir::new().unwrap();
    let mut em = open(tmp.path(), two_category_table());

    let first = em.stage_update("x", 5, Some(10));
    let second = em.stage_update("x", 3, Some(10));

    assert_eq!(first.stage_progress_percent, 50.0);
    assert_eq!(second.stage_progress_percent, 30.0);
    assert_eq!(em.category_progress("b"), Some(50.0));
    assert_eq!(em.stage_progress("x"), Some(30.0));
    assert_eq!(second.overall_progress_percent, first.overall_progress_percent);
    assert_eq!(second.overall_progress_percent, 45.0);
}

#[test]
fn end_completes_stage_from_any_state() {
    let tmp = TempDir::new().unwrap();
    let mut em = open(tmp.path(), CategoryTable::default());

    let cases: Vec<Box<dyn Fn(&mut ProgressEmitter)>> = vec![
        Box::new(|_: &mut ProgressEmitter| {}),
        Box::new(|em: &mut ProgressEmitter| {
            em.stage_start("s", None);
        }),
        Box::new(|em: &mut ProgressEmitter| {
            em.stage_start("s", Some(10));
            em.stage_update("s", 3, None);
        }),
        Box::new(|em: &mut ProgressEmitter| {
            em.stage_update("s", 25, Some(10));
        }),
        Box::new(|em: &mut ProgressEmitter| {
            em.stage_start("s", None);
            em.stage_update("s", -7, None);
        }),
    ];

    for (i, setup) in cases.iter().enumerate() {
        let stage = "s";
        setup(&mut em);
        let record = em.stage_end(stage);
        assert_eq!(record.stage_progress_percent, 100.0, "case {i}");
        assert_eq!(record.items_done, record.items_total, "case {i}");
        assert!(record.items_total >= 1, "case {i}");
    }
}

#[test]
fn every_call_appends_one_roundtrippable_record() {
    let tmp = TempDir::new().unwrap();
    let mut em = open(tmp.path(), CategoryTable::default());

    let mut emitted = Vec::new();
    emitted.push(em.stage_start("search", Some(3)));
    for done in 1..=3 {
        emitted.push(em.stage_update("search", done, None));
    }
    emitted.push(em.stage_end("search"));
    emitted.push(em.stage_start("ocr", None));
    emitted.push(em.stage_update("ocr", 9, None));

    let records = logged(tmp.path());
    assert_eq!(records, emitted);
    for pair in records.windows(2) {
        assert!(pair[1].timestamp >= pair[0].timestamp);
        assert!(pair[1].overall_progress_percent >= pair[0].overall_progress_percent);
    }

    let raw = fs::read_to_string(tmp.path().join("progress.log")).unwrap();
    let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
    assert!(first["eta_seconds"].is_null());
}

#[test]
fn percentages_rounded_for_persistence() {
    let tmp = TempDir::new().unwrap();
    let mut em = open(tmp.path(), two_category_table());

    let record = em.stage_update("crunch", 1, Some(7));
    // 100/7 and 0.9 * 100/7
    assert_eq!(record.stage_progress_percent, 14.2857);
    assert_eq!(record.overall_progress_percent, 12.8571);
    let confidence = record.eta_confidence_percent;
    assert_eq!(confidence, (confidence * 100.0).round() / 100.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn non_decreasing_done_gives_non_decreasing_progress(
        total in 1i64..500,
        steps in prop::collection::vec(0i64..50, 1..40),
    ) {
        let tmp = TempDir::new().unwrap();
        let mut em = open(tmp.path(), CategoryTable::default());
        em.stage_start("extract", Some(total));

        let mut done = 0i64;
        let mut last_stage = 0.0;
        let mut last_overall = 0.0;
        for step in steps {
            done += step;
            let record = em.stage_update("extract", done, Some(total));
            prop_assert!(record.stage_progress_percent >= last_stage);
            prop_assert!(record.overall_progress_percent >= last_overall);
            prop_assert!((0.0..=100.0).contains(&record.stage_progress_percent));
            prop_assert!((0.0..=100.0).contains(&record.overall_progress_percent));
            last_stage = record.stage_progress_percent;
            last_overall = record.overall_progress_percent;
        }
    }

    #[test]
    fn overall_never_decreases_under_arbitrary_calls(
        calls in prop::collection::vec((0usize..4, 0usize..5, -20i64..200, prop::option::of(-5i64..150)), 1..60),
    ) {
        let stages = ["search", "download", "ocr", "report", "unmapped"];
        let tmp = TempDir::new().unwrap();
        let mut em = open(tmp.path(), CategoryTable::default());

        let mut last = 0.0;
        for (op, stage_idx, done, total) in calls {
            let stage = stages[stage_idx];
            let record = match op {
                0 => em.stage_start(stage, total),
                1 | 2 => em.stage_update(stage, done, total),
                _ => em.stage_end(stage),
            };
            prop_assert!(record.overall_progress_percent >= last);
            prop_assert!(record.overall_progress_percent <= 100.0);
            prop_assert!(record.eta_confidence_percent >= 20.0);
            prop_assert!(record.eta_confidence_percent <= 95.0);
            last = record.overall_progress_percent;
        }
    }
}
