use clap::Parser;
use std::path::PathBuf;

use crate::error::{AttendanceError, Result};
use crate::models::BucketThresholds;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Group recurring meetings from attendance exports and summarise attendance
#[derive(Parser, Debug, Clone)]
#[command(
    name = "attendance-report",
    about = "Group recurring meetings from attendance exports and summarise attendance",
    version
)]
pub struct Settings {
    /// Directory of attendance export CSV files
    pub exports_dir: PathBuf,

    /// Directory of homeroom roster CSV files
    #[arg(long)]
    pub roster: PathBuf,

    /// Cluster-match ratio threshold; must lie in the open interval (0, 1)
    #[arg(long, default_value = "0.75")]
    pub ratio_threshold: f64,

    /// Minimum minutes of attendance for a red classification
    #[arg(long, default_value = "0")]
    pub red: u32,

    /// Minimum minutes of attendance for a yellow classification
    #[arg(long, default_value = "15")]
    pub yellow: u32,

    /// Minimum minutes of attendance for a green classification
    #[arg(long, default_value = "30")]
    pub green: u32,

    /// JSON file mapping export file names to cluster labels
    #[arg(long)]
    pub label_map: Option<PathBuf>,

    /// Write the report JSON here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Validate every configuration input.
    ///
    /// Runs before any file is touched; an error here aborts the whole run.
    pub fn validate(&self) -> Result<()> {
        if !(self.ratio_threshold > 0.0 && self.ratio_threshold < 1.0) {
            return Err(AttendanceError::Config(format!(
                "ratio threshold must lie in (0, 1), got {}",
                self.ratio_threshold
            )));
        }
        self.thresholds()?;
        Ok(())
    }

    /// The validated bucket thresholds.
    pub fn thresholds(&self) -> Result<BucketThresholds> {
        BucketThresholds::new(self.red, self.yellow, self.green).map_err(AttendanceError::Config)
    }

    /// The effective logging level; `--debug` overrides `--log-level`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.log_level
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
