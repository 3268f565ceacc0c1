use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised.
///
/// Diagnostics go to stderr (or `log_file` when given) so that the report
/// JSON on stdout stays machine-readable.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let upper = log_level.to_uppercase();
    let normalised = match upper.as_str() {
        "DEBUG" | "CRITICAL" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" => "error",
        other => other,
    };

    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        None => {
            let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }

    Ok(())
}

// ── Label map loading ──────────────────────────────────────────────────────────

/// Read a sparse label map: a JSON object of export file name → label.
pub fn load_label_map(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading label map {}", path.display()))?;
    let map: BTreeMap<String, String> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing label map {}", path.display()))?;
    Ok(map)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    // ── test_load_label_map ───────────────────────────────────────────────────

    #[test]
    fn test_load_label_map() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("labels.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"6th Grade Health 9-24.csv": "Health; Mrs. Smith's Homeroom"}}"#
        )
        .unwrap();

        let map = load_label_map(&path).expect("load label map");
        assert_eq!(
            map.get("6th Grade Health 9-24.csv").map(String::as_str),
            Some("Health; Mrs. Smith's Homeroom")
        );
    }

    #[test]
    fn test_load_label_map_missing_file() {
        let tmp = TempDir::new().expect("tempdir");
        let result = load_label_map(&tmp.path().join("absent.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_label_map_invalid_json() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("labels.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_label_map(&path).unwrap_err();
        assert!(err.to_string().contains("parsing label map"));
    }
}
