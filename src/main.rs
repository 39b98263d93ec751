use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use track_match::batch::{resolve_batch, BatchOutcome};
use track_match::cache::Cached;
use track_match::catalog::SqliteCatalog;
use track_match::config::MatcherConfig;
use track_match::existence::ExistenceResolver;
use track_match::models::{QualityTier, ReferenceTrack};
use track_match::progress::{create_progress_bar, format_duration, is_log_only, set_log_only};
use track_match::resolver::TrackResolver;
use track_match::retry::Retrying;

#[derive(Parser)]
#[command(name = "track-match")]
#[command(about = "Resolve playlist tracks against a download catalog, skipping those already in the library")]
struct Args {
    /// JSON array of reference tracks
    references: PathBuf,

    /// Download-source catalog database (built with build-catalog)
    #[arg(long)]
    catalog: PathBuf,

    /// Destination library database; tracks found here are not looked up
    #[arg(long)]
    library: Option<PathBuf>,

    /// Quality ceiling (1 = LOW, 2 = LOSSLESS, 3 = HI_RES_LOSSLESS, 4 = DOLBY_ATMOS)
    #[arg(long)]
    quality: Option<u8>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parallel track workers (overrides config)
    #[arg(long)]
    workers: Option<usize>,

    /// Write per-track results as JSON
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide progress bars, print periodic progress lines instead
    #[arg(long)]
    log_only: bool,
}

/// One line of the results file.
#[derive(Serialize)]
struct ResultRecord<'a> {
    reference_id: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier: Option<QualityTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    library_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> ResultRecord<'a> {
    fn new(reference: &'a ReferenceTrack, outcome: &'a BatchOutcome) -> Self {
        let mut record = ResultRecord {
            reference_id: &reference.id,
            status: outcome.status(),
            candidate_id: None,
            score: None,
            tier: None,
            library_id: None,
            error: None,
        };
        match outcome {
            BatchOutcome::Present { library_id } => record.library_id = Some(library_id),
            BatchOutcome::Matched(result) => {
                record.candidate_id = Some(&result.candidate.id);
                record.score = Some(result.score);
                record.tier = Some(result.tier);
            }
            BatchOutcome::NoMatch => {}
            BatchOutcome::Failed { error } => record.error = Some(error),
        }
        record
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<MatcherConfig> {
    let mut config = match &args.config {
        Some(path) => MatcherConfig::load(path)?,
        None => MatcherConfig::default(),
    };
    if let Some(quality) = args.quality {
        config.quality_ceiling = quality;
    }
    if let Some(workers) = args.workers {
        config.batch_workers = workers;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_references(path: &Path) -> Result<Vec<ReferenceTrack>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read references {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse references {:?}", path))
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    init_tracing();

    let start = Instant::now();
    let config = load_config(&args)?;
    let ceiling = config.ceiling()?;
    let references = load_references(&args.references)?;
    tracing::info!(tracks = references.len(), ceiling = %ceiling, "Loaded references");

    let catalog = SqliteCatalog::open(&args.catalog)
        .with_context(|| format!("Failed to open catalog {:?}", args.catalog))?;
    let resolver = TrackResolver::layered(catalog, config.backoff(), config.cache_capacity, config.collect_options());

    let library = match &args.library {
        Some(path) => {
            let db = SqliteCatalog::open(path).with_context(|| format!("Failed to open library {:?}", path))?;
            let layered = Cached::new(Retrying::new(db, config.backoff()), config.cache_capacity);
            Some(ExistenceResolver::new(layered).with_max_query_chars(config.max_query_chars))
        }
        None => None,
    };

    let pb = create_progress_bar(references.len() as u64, "Resolving tracks");
    let (outcomes, stats) = resolve_batch(
        &resolver,
        library.as_ref(),
        &references,
        ceiling,
        config.batch_workers,
        &pb,
    )?;
    pb.finish_with_message(format!("Resolved {} tracks", references.len()));

    for (reference, outcome) in references.iter().zip(&outcomes) {
        match outcome {
            BatchOutcome::NoMatch => {
                eprintln!("no match for track {} - {}", reference.title, reference.primary_artist());
            }
            BatchOutcome::Failed { error } => {
                eprintln!("no match for track {} - {} ({})", reference.title, reference.primary_artist(), error);
            }
            _ => {}
        }
    }

    if let Some(path) = &args.output {
        let records: Vec<ResultRecord> = references
            .iter()
            .zip(&outcomes)
            .map(|(reference, outcome)| ResultRecord::new(reference, outcome))
            .collect();
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write results {:?}", path))?;
    }

    if is_log_only() {
        stats.log_phase("resolve");
    }
    if let Some(path) = &args.stats {
        stats.write_to_file(path)?;
    }

    println!("\n{:=<60}", "");
    println!("Resolution complete!");
    println!("  Tracks: {}", stats.total);
    println!("  Already in library: {}", stats.already_present);
    println!("  Matched: {} ({:.1}%)", stats.matched, stats.match_rate());
    println!("  Short-circuited: {}", stats.short_circuits);
    println!("  No match: {}", stats.no_match);
    println!("  Failed: {}", stats.failed);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
