//! Guard against overwriting the wrong file.
//!
//! `build-catalog` deletes a stale output before writing. These checks make
//! sure that output really is a catalog database and not one of its inputs.

use anyhow::{bail, Result};
use std::path::Path;

/// File names that are never valid catalog outputs, whatever else they contain.
const PROTECTED_NAMES: [&str; 3] = ["references.json", "snapshot.json", "matches.sqlite3"];

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output filename must contain `required_pattern` (e.g. "catalog")
/// - Output cannot be any of `source_paths`
/// - Output cannot be a JSON file (inputs are JSON, catalogs are SQLite)
/// - Output cannot carry a protected input name
pub fn validate_output_path(output: &Path, required_pattern: &str, source_paths: &[&Path]) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    for source in source_paths {
        if output == *source {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    if output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
    {
        bail!(
            "Safety check failed: output '{}' looks like a JSON input, not a catalog database",
            output.display()
        );
    }

    for name in PROTECTED_NAMES {
        if output_name.ends_with(name) {
            bail!(
                "Safety check failed: output '{}' matches protected file name '{}'",
                output.display(),
                name
            );
        }
    }

    Ok(())
}
