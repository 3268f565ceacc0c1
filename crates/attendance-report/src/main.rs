mod bootstrap;

use anyhow::{Context, Result};
use attendance_core::roster::{Roster, RosterResolver};
use attendance_core::settings::Settings;
use attendance_data::analysis::{run_report, ReportOptions};
use clap::Parser;

fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(settings.effective_log_level(), settings.log_file.as_ref())?;

    tracing::info!("attendance-report v{} starting", env!("CARGO_PKG_VERSION"));

    // Configuration is rejected before any file is touched.
    settings.validate()?;

    let roster = Roster::load_dir(&settings.roster)?;
    tracing::info!(
        "Loaded {} roster members from {}",
        roster.len(),
        settings.roster.display()
    );
    let resolver = RosterResolver::new(roster);

    let label_map = match &settings.label_map {
        Some(path) => bootstrap::load_label_map(path)?,
        None => Default::default(),
    };

    let options = ReportOptions {
        ratio_threshold: settings.ratio_threshold,
        thresholds: settings.thresholds()?,
        label_map,
    };

    let report = run_report(&settings.exports_dir, &resolver, resolver.roster(), &options)?;

    tracing::info!(
        "{} clusters from {} files ({} skipped, {} unresolved names)",
        report.metadata.clusters_created,
        report.metadata.files_discovered,
        report.metadata.files_skipped,
        report.metadata.unresolved_name_count
    );

    let json = serde_json::to_string_pretty(&report)?;
    match &settings.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing report to {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
