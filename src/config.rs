use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MAX_SLOW_THRESHOLD_MS: u64 = 60_000;

/// Environment variable that overrides the configured test filter.
pub const FILTER_ENV_VAR: &str = "SUITERUN_FILTER";

/// All configurable settings with their defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    /// Regular expression matched against `Suite.method`. Empty matches all.
    pub filter: String,
    /// Tests taking at least this long get their duration printed.
    pub slow_threshold_ms: u64,
    /// Extra directory to search when locating a suite's declaring source.
    pub source_root: Option<PathBuf>,
    /// Where to write the JSON run summary, if anywhere.
    pub report_json_path: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            filter: String::new(),
            slow_threshold_ms: 25,
            source_root: None,
            report_json_path: None,
        }
    }
}

/// Raw JSON representation; every field optional for partial overrides.
#[derive(Debug, Deserialize, Default)]
struct SettingsFile {
    #[serde(rename = "test.filter")]
    filter: Option<String>,
    #[serde(rename = "report.slowThresholdMs")]
    slow_threshold_ms: Option<u64>,
    #[serde(rename = "report.jsonPath")]
    report_json_path: Option<PathBuf>,
    #[serde(rename = "source.root")]
    source_root: Option<PathBuf>,
}

/// Resolve settings: defaults → user global → project-local → environment.
pub fn resolve(project_root: Option<&Path>) -> RunSettings {
    let global_path = dirs::home_dir()
        .map(|h| h.join(".suiterun/settings.json"));
    let project_path = project_root
        .map(|r| r.join(".suiterun/settings.json"));
    let mut settings = resolve_with_paths(
        global_path.as_deref(),
        project_path.as_deref(),
    );
    apply_env(&mut settings, std::env::var(FILTER_ENV_VAR).ok());
    settings
}

/// Testable resolver that accepts explicit file paths (no home dir dependency).
fn resolve_with_paths(
    global_path: Option<&Path>,
    project_path: Option<&Path>,
) -> RunSettings {
    let mut settings = RunSettings::default();

    if let Some(path) = global_path {
        apply_file(&mut settings, path);
    }
    if let Some(path) = project_path {
        apply_file(&mut settings, path);
    }

    settings
}

fn apply_env(settings: &mut RunSettings, filter: Option<String>) {
    if let Some(filter) = filter {
        tracing::debug!("Test filter taken from {}: {:?}", FILTER_ENV_VAR, filter);
        settings.filter = filter;
    }
}

fn apply_file(settings: &mut RunSettings, path: &Path) {
    let Ok(content) = std::fs::read_to_string(path) else { return };
    let Ok(file) = serde_json::from_str::<SettingsFile>(&content) else {
        tracing::warn!("Invalid settings file, ignoring: {}", path.display());
        return;
    };
    if let Some(v) = file.filter {
        settings.filter = v;
    }
    if let Some(v) = file.slow_threshold_ms {
        if v <= MAX_SLOW_THRESHOLD_MS {
            settings.slow_threshold_ms = v;
        } else {
            tracing::warn!(
                "report.slowThresholdMs ({}) out of range (0..{}), using default",
                v, MAX_SLOW_THRESHOLD_MS
            );
        }
    }
    if let Some(v) = file.report_json_path {
        settings.report_json_path = Some(v);
    }
    if let Some(v) = file.source_root {
        settings.source_root = Some(v);
    }
}
