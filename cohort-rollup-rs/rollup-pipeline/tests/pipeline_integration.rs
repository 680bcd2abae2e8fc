use std::sync::Arc;
use std::thread;

use rollup_core::{EconomicTier, RollupError, Segment, TierTable};
use rollup_pipeline::config::RollupConfig;
use rollup_pipeline::error::LoadError;
use rollup_pipeline::run::RollupRun;
use rollup_pipeline::segment_loader::load_segments_file;
use rollup_pipeline::summary::{LevelCount, TreeSummary};

// ---------------------------------------------------------------------------
// Test data fixtures
// ---------------------------------------------------------------------------

const FIXTURE_JSON: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures/sample_segments.json");
const FIXTURE_CSV: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures/sample_segments.csv");

fn fixture_segments() -> Vec<Segment> {
    load_segments_file(FIXTURE_JSON)
        .expect("fixture JSON should load")
        .segments
}

fn default_run() -> RollupRun<TierTable> {
    RollupRun::new(RollupConfig::default(), TierTable::default())
}

// ---------------------------------------------------------------------------
// Loader tests
// ---------------------------------------------------------------------------

#[test]
fn json_and_csv_fixtures_agree() {
    let from_json = load_segments_file(FIXTURE_JSON).unwrap();
    let from_csv = load_segments_file(FIXTURE_CSV).unwrap();

    assert_eq!(from_json.min_cohort_size, Some(50));
    assert_eq!(from_csv.min_cohort_size, None);
    assert_eq!(from_json.segments, from_csv.segments);
}

#[test]
fn missing_file_reports_path() {
    match load_segments_file("does/not/exist.json") {
        Err(LoadError::Io { path, .. }) => assert_eq!(path, "does/not/exist.json"),
        other => panic!("expected Io error, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Run tests
// ---------------------------------------------------------------------------

#[test]
fn run_builds_expected_tree() {
    let outcome = default_run().execute(&fixture_segments()).unwrap();
    let tree = &outcome.tree;

    let notes = tree
        .product("com.acme.notes", "APP_STORE", "$5-$10")
        .expect("notes app store bucket");
    assert_eq!(notes.total_users, 190);
    assert!(notes.passes_threshold);
    assert_eq!(notes.provenance.rolled_up_segment_count, 3);
    assert_eq!(notes.provenance.total_segment_count, 5);
    assert_eq!(notes.provenance.final_user_count_sum, 220);
    assert_eq!(notes.provenance.properties_dropped, vec!["region", "country"]);
    assert_eq!(
        notes.provenance.reasons,
        vec!["Rolled up from region to country", "Rolled up to economic tier"]
    );
    assert_eq!(notes.provenance.last_rollup_target.as_deref(), Some("tier4"));

    let tier1 = notes.tier(EconomicTier::Tier1).unwrap();
    assert_eq!(tier1.total_users, 160);
    assert!(tier1.passes_threshold);
    assert!(tier1.country("US").unwrap().passes_threshold);
    assert!(!tier1.country("CA").unwrap().passes_threshold);

    let tier4 = notes.tier(EconomicTier::Tier4).unwrap();
    assert_eq!(tier4.total_users, 30);
    assert!(!tier4.passes_threshold);
    let india = tier4.country("IN").unwrap();
    assert!(!india.regions[0].passes);
    assert_eq!(india.regions[0].users, 30);
    assert_eq!(india.regions[0].original_user_count, 12);

    let play = tree.product("com.acme.notes", "PLAY_STORE", "$0-$5").unwrap();
    assert!(play.passes_threshold);
    let unknown = play.tier(EconomicTier::Tier4).unwrap().country("Unknown").unwrap();
    assert_eq!(unknown.total_users, 9);
    assert!(unknown.regions.is_empty());

    let sketch = tree.product("com.acme.sketch", "APP_STORE", "$20-$50").unwrap();
    assert!(!sketch.passes_threshold);
    let germany = sketch.tier(EconomicTier::Tier1).unwrap().country("DE").unwrap();
    assert!(!germany.passes_threshold);
    assert!(germany.regions[0].passes);
}

#[test]
fn summary_counts_each_level() {
    let outcome = default_run().execute(&fixture_segments()).unwrap();
    assert_eq!(
        outcome.summary,
        TreeSummary {
            segments: 8,
            total_users: 361,
            rolled_up_segments: 4,
            products: LevelCount { nodes: 3, passing: 2 },
            tiers: LevelCount { nodes: 5, passing: 2 },
            countries: LevelCount { nodes: 7, passing: 2 },
            regions: LevelCount { nodes: 5, passing: 4 },
        }
    );
    assert_eq!(outcome.summary.regions.failing(), 1);
}

#[test]
fn raising_the_cohort_size_flips_verdicts() {
    let run = RollupRun::new(
        RollupConfig::default().with_min_cohort_size(200),
        TierTable::default(),
    );
    let outcome = run.execute(&fixture_segments()).unwrap();
    assert_eq!(outcome.summary.products.passing, 0);
    // regions are judged upstream and ignore the cohort size
    assert_eq!(outcome.summary.regions.passing, 4);
}

#[test]
fn parallel_run_matches_sequential() {
    let segments = fixture_segments();
    let sequential = default_run().execute(&segments).unwrap();
    let parallel = RollupRun::new(RollupConfig::default().with_parallel(true), TierTable::default())
        .execute(&segments)
        .unwrap();
    assert_eq!(sequential.tree, parallel.tree);
    assert_eq!(sequential.summary, parallel.summary);
}

#[test]
fn negative_count_fails_the_whole_run() {
    let mut segments = fixture_segments();
    segments[5].user_count = -140;
    match default_run().execute(&segments) {
        Err(RollupError::NegativeUserCount { index, value }) => {
            assert_eq!(index, 5);
            assert_eq!(value, -140);
        }
        other => panic!("expected NegativeUserCount, got {:?}", other.map(|o| o.summary)),
    }
}

#[test]
fn shared_run_is_safe_across_threads() {
    let run = Arc::new(default_run());
    let segments = fixture_segments();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let run = Arc::clone(&run);
            let mut own = segments.clone();
            own.truncate(segments.len() - i);
            thread::spawn(move || run.execute(&own).map(|o| o.summary.segments))
        })
        .collect();

    let mut counts: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked").unwrap())
        .collect();
    counts.sort();
    assert_eq!(counts, vec![5, 6, 7, 8]);
}

#[test]
fn evaluated_tree_serializes_for_consumers() {
    let outcome = default_run().execute(&fixture_segments()).unwrap();
    let json = serde_json::to_value(&outcome.tree).unwrap();
    let us = &json["products"]["com.acme.notes|APP_STORE|$5-$10"]["tiers"]["tier1"]["countries"]["US"];
    assert_eq!(us["total_users"], 115);
    assert_eq!(us["regions"].as_array().unwrap().len(), 2);
    assert_eq!(json["min_cohort_size"], 50);
}
