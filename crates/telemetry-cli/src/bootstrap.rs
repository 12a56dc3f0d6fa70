use std::path::{Path, PathBuf};
use std::sync::Mutex;

use telemetry_core::settings::STATE_DIR_NAME;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

fn state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR_NAME)
}

/// Ensure `~/.journey-telemetry/` with its `scripts/` and `exports/`
/// subdirectories exists. Returns the state directory.
pub fn ensure_directories() -> anyhow::Result<PathBuf> {
    let dir = state_dir();
    ensure_directories_in(&dir)?;
    Ok(dir)
}

pub fn ensure_directories_in(state_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(state_dir.join("scripts"))?;
    std::fs::create_dir_all(state_dir.join("exports"))?;
    Ok(())
}

/// Where scripts are read from when `--input` is not given.
pub fn default_script_dir() -> PathBuf {
    state_dir().join("scripts")
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map the CLI's level names onto an `EnvFilter` directive.
fn filter_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Install the global `tracing` subscriber.
///
/// With `log_file` set, output is appended to that file (without ANSI
/// colours) instead of going to stderr.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, stderr_layer) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => (
            None,
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directories_in() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join(STATE_DIR_NAME);

        ensure_directories_in(&dir).expect("ensure_directories_in should succeed");
        // Second call is a no-op.
        ensure_directories_in(&dir).expect("idempotent");

        assert!(dir.join("scripts").is_dir(), "scripts subdir must exist");
        assert!(dir.join("exports").is_dir(), "exports subdir must exist");
    }

    #[test]
    fn test_default_script_dir_is_under_state_dir() {
        let dir = default_script_dir();
        assert!(dir.ends_with(Path::new(STATE_DIR_NAME).join("scripts")));
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("warning"), "warn");
        assert_eq!(filter_directive("CRITICAL"), "error");
        assert_eq!(filter_directive("nonsense"), "info");
    }
}
