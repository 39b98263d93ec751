//! Build a searchable SQLite catalog from a JSON snapshot.
//!
//! The same file format serves as the download-source catalog and as the
//! destination library for `track-match --library`.
//!
//! Usage: build-catalog <snapshot.json> <catalog.sqlite3> [--log-only]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use track_match::catalog::{CatalogSnapshot, SqliteCatalog};
use track_match::progress::{create_spinner, format_duration, set_log_only};
use track_match::safety::validate_output_path;

#[derive(Parser)]
#[command(name = "build-catalog")]
#[command(about = "Import a catalog snapshot into an FTS-indexed SQLite database")]
struct Args {
    /// JSON snapshot with `albums` and `tracks` arrays
    snapshot: PathBuf,

    /// Output database; the file name must contain "catalog"
    output: PathBuf,

    /// Hide spinners
    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    let start = Instant::now();

    validate_output_path(&args.output, "catalog", &[args.snapshot.as_path()])?;

    println!("Reading snapshot: {:?}", args.snapshot);
    let snapshot = CatalogSnapshot::load(&args.snapshot)?;
    println!(
        "Found {} albums and {} tracks",
        snapshot.albums.len(),
        snapshot.tracks.len()
    );

    if args.output.exists() {
        std::fs::remove_file(&args.output).context("Failed to remove existing output file")?;
    }

    println!("Creating catalog: {:?}", args.output);
    let catalog = SqliteCatalog::open(&args.output).context("Failed to create catalog database")?;
    let imported = catalog
        .import_snapshot(&snapshot)
        .context("Failed to import snapshot")?;

    let spinner = create_spinner("Building FTS index...");
    catalog.rebuild_index().context("Failed to build FTS index")?;
    spinner.finish_with_message("FTS index built");

    let spinner = create_spinner("Optimizing database...");
    catalog.optimize().context("Failed to optimize database")?;
    spinner.finish_with_message("Database optimized");

    let tracks = catalog.track_count()?;
    let albums = catalog.album_count()?;
    drop(catalog);
    let file_size = std::fs::metadata(&args.output)?.len();

    println!("\n{:=<60}", "");
    println!("Catalog complete!");
    println!("  Imported rows: {}", imported);
    println!("  Tracks: {}", tracks);
    println!("  Albums: {}", albums);
    println!("  Size: {:.1} MB", file_size as f64 / 1_048_576.0);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
