use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use rollup_core::{EvaluatedTree, RollupProvenance, TierTable};
use rollup_pipeline::config::{
    parse_min_cohort_size, RollupConfig, MIN_COHORT_SIZE_ENV, PARALLEL_ENV,
};
use rollup_pipeline::run::{RollupOutcome, RollupRun};
use rollup_pipeline::segment_loader::load_segments_file;
use rollup_pipeline::summary::{LevelCount, TreeSummary};

/// Aggregate a segment file into the product → tier → country → region rollup tree.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Segment file (.json or .csv)
    input: PathBuf,

    /// Minimum cohort size (overrides ROLLUP_MIN_COHORT_SIZE and the file's own value)
    #[arg(long)]
    min_cohort: Option<String>,

    /// JSON tier table: {"tier1": ["US", ...], ...}. Defaults to the built-in table.
    #[arg(long)]
    tiers: Option<PathBuf>,

    /// Build level-1 subtrees in parallel
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Output the evaluated tree as JSON instead of formatted text
    #[arg(long, default_value_t = false)]
    json: bool,
}

// ---------------------------------------------------------------------------
// JSON output contract
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RollupJson<'a> {
    generated_at: String,
    input: String,
    elapsed_ms: u128,
    summary: &'a TreeSummary,
    tree: &'a EvaluatedTree,
}

fn build_json<'a>(outcome: &'a RollupOutcome, input: &str) -> RollupJson<'a> {
    RollupJson {
        generated_at: Utc::now().to_rfc3339(),
        input: input.to_string(),
        elapsed_ms: outcome.elapsed_ms,
        summary: &outcome.summary,
        tree: &outcome.tree,
    }
}

// ---------------------------------------------------------------------------
// Human-readable output
// ---------------------------------------------------------------------------

/// Format a count with comma thousands separators.
fn format_count(count: u64) -> String {
    let s = count.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

fn verdict(passes: bool) -> &'static str {
    if passes {
        "pass"
    } else {
        "ROLLUP"
    }
}

fn level_line(label: &str, count: &LevelCount) -> String {
    format!(
        "  {:10} {:>5} nodes  {:>5} pass  {:>5} below threshold",
        label,
        count.nodes,
        count.passing,
        count.failing()
    )
}

fn provenance_note(provenance: &RollupProvenance) -> String {
    if !provenance.has_rollups {
        return String::new();
    }
    let dropped = if provenance.properties_dropped.is_empty() {
        String::new()
    } else {
        format!("  dropped: {}", provenance.properties_dropped.join(", "))
    };
    format!(
        "  ({}/{} segments rolled up{})",
        provenance.rolled_up_segment_count, provenance.total_segment_count, dropped
    )
}

fn print_human(outcome: &RollupOutcome, load_ms: u128) {
    let tree = &outcome.tree;
    let summary = &outcome.summary;

    println!();
    println!("  COHORT ROLLUP (min cohort size {})", tree.min_cohort_size);
    println!("  {:\u{2500}<64}", "");
    println!(
        "  {} segments  \u{00b7}  {} users  \u{00b7}  {} rolled up",
        summary.segments,
        format_count(summary.total_users),
        summary.rolled_up_segments
    );
    println!("{}", level_line("products", &summary.products));
    println!("{}", level_line("tiers", &summary.tiers));
    println!("{}", level_line("countries", &summary.countries));
    println!("{}", level_line("regions", &summary.regions));
    println!();

    if tree.is_empty() {
        println!("  No segments to aggregate.");
    } else {
        println!("  {:\u{2500}<64}", "");
        for (key, product) in &tree.products {
            println!(
                "  {:48} {:>8}  {}{}",
                key.to_string(),
                format_count(product.total_users),
                verdict(product.passes_threshold),
                provenance_note(&product.provenance)
            );
            for (tier, tier_node) in &product.tiers {
                println!(
                    "    {:46} {:>8}  {}",
                    tier.to_string(),
                    format_count(tier_node.total_users),
                    verdict(tier_node.passes_threshold)
                );
                for (code, country) in &tier_node.countries {
                    println!(
                        "      {:44} {:>8}  {}  {} regions",
                        code,
                        format_count(country.total_users),
                        verdict(country.passes_threshold),
                        country.regions.len()
                    );
                }
            }
            println!();
        }
        println!("  {:\u{2500}<64}", "");
    }

    println!(
        "  Loaded in {}ms \u{00b7} Aggregated in {}ms \u{00b7} Total {}ms",
        load_ms,
        outcome.elapsed_ms,
        load_ms + outcome.elapsed_ms
    );
    println!();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Flag, then environment, then the segment file, then the default.
/// The environment cohort size is only parsed when no flag is given.
fn resolve_config<F>(args: &Args, file_min_cohort: Option<i64>, lookup: F) -> Result<RollupConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base = RollupConfig::from_lookup(|key| {
        if key == PARALLEL_ENV {
            lookup(key)
        } else {
            None
        }
    })
    .context("reading environment configuration")?;

    let min_cohort_size = match &args.min_cohort {
        Some(raw) => parse_min_cohort_size(raw).context("parsing --min-cohort")?,
        None => match lookup(MIN_COHORT_SIZE_ENV) {
            Some(raw) => parse_min_cohort_size(&raw)
                .with_context(|| format!("parsing {}", MIN_COHORT_SIZE_ENV))?,
            None => file_min_cohort.unwrap_or(base.min_cohort_size),
        },
    };

    Ok(base
        .with_min_cohort_size(min_cohort_size)
        .with_parallel(args.parallel || base.parallel))
}

fn load_tier_table(path: Option<&PathBuf>) -> Result<TierTable> {
    match path {
        None => Ok(TierTable::default()),
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading tier table '{}'", path.display()))?;
            TierTable::from_json(&raw)
                .with_context(|| format!("parsing tier table '{}'", path.display()))
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let load_start = std::time::Instant::now();
    let loaded = load_segments_file(&args.input)
        .with_context(|| format!("loading segments from '{}'", args.input.display()))?;
    let load_ms = load_start.elapsed().as_millis();

    let config = resolve_config(&args, loaded.min_cohort_size, |key| std::env::var(key).ok())?;
    let tiers = load_tier_table(args.tiers.as_ref())?;
    info!(
        segments = loaded.segments.len(),
        min_cohort_size = config.min_cohort_size,
        parallel = config.parallel,
        "aggregating segments"
    );

    let outcome = RollupRun::new(config, tiers)
        .execute(&loaded.segments)
        .context("aggregating segments")?;

    if args.json {
        let input = args.input.display().to_string();
        let body = serde_json::to_string_pretty(&build_json(&outcome, &input))
            .context("serializing rollup tree")?;
        println!("{}", body);
    } else {
        print_human(&outcome, load_ms);
    }

    Ok(())
}
