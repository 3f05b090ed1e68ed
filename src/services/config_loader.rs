use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::services::locale::Locale;

#[derive(Debug, Clone, Deserialize)]
pub struct PresentationConfig {
    /// Rows kept above the current team when the window scrolls
    #[serde(default = "default_current_line")]
    pub current_line: usize,
    #[serde(default = "default_total_lines")]
    pub total_lines: usize,
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: usize,
    #[serde(default = "default_problem_flash_times")]
    pub problem_flash_times: u32,
    #[serde(default = "default_flash_seconds")]
    pub problem_flash_seconds: f32,
    #[serde(default = "default_flash_seconds")]
    pub team_flash_seconds: f32,
    #[serde(
        default = "default_row_fly_animation_seconds",
        alias = "row_move_animation_seconds"
    )]
    pub row_fly_animation_seconds: f32,
    #[serde(default = "default_team_scroll_seconds")]
    pub team_scroll_seconds: f32,
    #[serde(default = "default_fast_team_scroll_seconds")]
    pub fast_team_scroll_seconds: f32,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            current_line: default_current_line(),
            total_lines: default_total_lines(),
            rows_per_page: default_rows_per_page(),
            problem_flash_times: default_problem_flash_times(),
            problem_flash_seconds: default_flash_seconds(),
            team_flash_seconds: default_flash_seconds(),
            row_fly_animation_seconds: default_row_fly_animation_seconds(),
            team_scroll_seconds: default_team_scroll_seconds(),
            fast_team_scroll_seconds: default_fast_team_scroll_seconds(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
}

impl TimeUnit {
    pub fn from_duration(self, duration: Duration) -> i64 {
        match self {
            TimeUnit::Milliseconds => duration.num_milliseconds(),
            TimeUnit::Seconds => duration.num_seconds(),
            TimeUnit::Minutes => duration.num_minutes(),
        }
    }

    pub fn to_duration(self, value: i64) -> Duration {
        match self {
            TimeUnit::Milliseconds => Duration::milliseconds(value),
            TimeUnit::Seconds => Duration::seconds(value),
            TimeUnit::Minutes => Duration::minutes(value),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinalizerConfig {
    /// Used when the snapshot does not carry its own freeze time.
    #[serde(
        default = "default_freeze_time",
        deserialize_with = "from_duration_str"
    )]
    pub freeze_time: Duration,
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub presentation: PresentationConfig,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            freeze_time: default_freeze_time(),
            time_unit: TimeUnit::default(),
            locale: Locale::default(),
            presentation: PresentationConfig::default(),
        }
    }
}

fn default_freeze_time() -> Duration {
    Duration::hours(3)
}

fn default_current_line() -> usize {
    3
}

fn default_total_lines() -> usize {
    100
}

fn default_rows_per_page() -> usize {
    12
}

fn default_problem_flash_times() -> u32 {
    2
}

fn default_flash_seconds() -> f32 {
    0.3
}

fn default_row_fly_animation_seconds() -> f32 {
    0.3
}

fn default_team_scroll_seconds() -> f32 {
    1.0
}

fn default_fast_team_scroll_seconds() -> f32 {
    0.3
}

/// Parses `[-]HH:MM:SS[.fff]` into a duration.
pub fn parse_duration_str(raw: &str) -> Option<Duration> {
    let negative = raw.starts_with('-');
    let trimmed = raw.trim_start_matches('-');
    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: i64 = parts[0].parse().ok()?;
    let minutes: i64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let total_millis = (hours * 3600 + minutes * 60) * 1000 + (seconds * 1000.0) as i64;
    let duration = Duration::milliseconds(total_millis);
    Some(if negative { -duration } else { duration })
}

pub(crate) fn from_duration_str<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration_str(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid duration format: {raw}")))
}

pub(crate) fn from_opt_duration_str<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt {
        Some(raw) => parse_duration_str(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration format: {raw}"))),
        None => Ok(None),
    }
}

/// Loads `config.toml` from the folder holding the snapshot, falling back to
/// defaults when the file is absent.
pub fn load_finalizer_config(snapshot_path: &Path) -> Result<FinalizerConfig> {
    let folder = snapshot_path.parent().unwrap_or_else(|| Path::new("."));
    let config_path = folder.join("config.toml");
    if !config_path.exists() {
        info!(
            "config.toml not found next to snapshot, using defaults: {}",
            config_path.display()
        );
        return Ok(FinalizerConfig::default());
    }

    let raw = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config.toml at {}", config_path.display()))?;

    let config = toml::from_str::<FinalizerConfig>(&raw)
        .with_context(|| format!("Failed to parse config.toml at {}", config_path.display()))?;
    info!(
        "Loaded config.toml: freeze_time={}s, time_unit={:?}, locale={:?}",
        config.freeze_time.num_seconds(),
        config.time_unit,
        config.locale
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse_like_contest_clocks() {
        assert_eq!(parse_duration_str("03:00:00"), Some(Duration::hours(3)));
        assert_eq!(
            parse_duration_str("-00:01:30.500"),
            Some(-Duration::milliseconds(90_500))
        );
        assert_eq!(parse_duration_str("3h"), None);
        assert_eq!(parse_duration_str("01:xx:00"), None);
    }

    #[test]
    fn time_units_convert_freeze_durations() {
        let freeze = Duration::hours(3);

        assert_eq!(TimeUnit::Milliseconds.from_duration(freeze), 10_800_000);
        assert_eq!(TimeUnit::Seconds.from_duration(freeze), 10_800);
        assert_eq!(TimeUnit::Minutes.from_duration(freeze), 180);
        assert_eq!(TimeUnit::Minutes.to_duration(170), Duration::minutes(170));
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = load_finalizer_config(&dir.path().join("standings.json")).expect("defaults");

        assert_eq!(config.freeze_time, Duration::hours(3));
        assert_eq!(config.time_unit, TimeUnit::Milliseconds);
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.presentation.current_line, 3);
        assert_eq!(config.presentation.problem_flash_times, 2);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
freeze_time = "04:00:00"
time_unit = "minutes"
locale = "ru"

[presentation]
current_line = 5
row_move_animation_seconds = 0.5
"#,
        )
        .expect("write config");

        let config = load_finalizer_config(&dir.path().join("standings.json")).expect("config");

        assert_eq!(config.freeze_time, Duration::hours(4));
        assert_eq!(config.time_unit, TimeUnit::Minutes);
        assert_eq!(config.locale, Locale::Ru);
        assert_eq!(config.presentation.current_line, 5);
        assert_eq!(config.presentation.row_fly_animation_seconds, 0.5);
        assert_eq!(config.presentation.total_lines, 100);
    }

    #[test]
    fn malformed_config_is_reported_with_its_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("config.toml"), "freeze_time = \"soon\"").expect("write");

        let err = load_finalizer_config(&dir.path().join("standings.json")).unwrap_err();

        assert!(format!("{err:#}").contains("config.toml"));
    }
}
