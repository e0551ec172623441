//! Configuration management for Rotacast

use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConfigError, Result};
use crate::format::Formatter;
use crate::scheduling::Schedule;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub content: ContentConfig,
    pub ledger: LedgerConfig,
    pub format: FormatConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub mastodon: Option<MastodonConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub dir: String,
    /// File extension of content items, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    pub max_length: usize,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub add_timestamp: bool,
    #[serde(default)]
    pub timezone: Timezone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Fixed interval ("60m") or random range ("random:20m-40m")
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Run a cycle immediately on startup instead of waiting one interval
    #[serde(default)]
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            run_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    pub instance: String,
    /// File holding the OAuth access token. `ROTACAST_MASTODON_TOKEN` wins if set.
    pub token_file: Option<String>,
}

fn default_extension() -> String {
    "md".to_string()
}

fn default_interval() -> String {
    "60m".to_string()
}

/// Timezone used for the optional post timestamp
///
/// Accepts `local`, `utc`, a fixed offset such as `+08:00`, or an IANA name
/// such as `Europe/Berlin`. Named zones follow daylight saving changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timezone {
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
    Named(Tz),
}

impl Timezone {
    /// Current wall-clock time in this timezone
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.at(Utc::now())
    }

    /// Wall-clock reading of the instant `utc` in this timezone
    pub fn at(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Timezone::Local => utc.with_timezone(&Local).fixed_offset(),
            Timezone::Utc => utc.fixed_offset(),
            Timezone::Fixed(offset) => utc.with_timezone(offset),
            Timezone::Named(tz) => utc.with_timezone(tz).fixed_offset(),
        }
    }
}

impl FromStr for Timezone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "local" => return Ok(Timezone::Local),
            "utc" | "z" => return Ok(Timezone::Utc),
            _ => {}
        }

        if let Ok(offset) = trimmed.parse::<FixedOffset>() {
            return Ok(Timezone::Fixed(offset));
        }

        trimmed.parse::<Tz>().map(Timezone::Named).map_err(|_| {
            format!(
                "Invalid timezone: '{}'. Valid options: local, utc, an offset like +08:00 \
                 or an IANA name like Europe/Berlin",
                s
            )
        })
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timezone::Local => write!(f, "local"),
            Timezone::Utc => write!(f, "utc"),
            Timezone::Fixed(offset) => write!(f, "{}", offset),
            Timezone::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

impl TryFrom<String> for Timezone {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timezone> for String {
    fn from(value: Timezone) -> Self {
        value.to_string()
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path(None)?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Check every value the daemon needs before it starts posting
    ///
    /// An impossible length budget is caught here so that it surfaces as a
    /// startup failure rather than as a failed cycle every interval.
    pub fn validate(&self) -> Result<()> {
        if self.content.dir.trim().is_empty() {
            return Err(ConfigError::MissingField("content.dir".to_string()).into());
        }
        if self.ledger.path.trim().is_empty() {
            return Err(ConfigError::MissingField("ledger.path".to_string()).into());
        }
        if self.content.extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid {
                field: "content.extension".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        Formatter::new(self.format.clone())?;

        Schedule::parse(&self.schedule.interval).map_err(|e| ConfigError::Invalid {
            field: "schedule.interval".to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Content directory with `~` and environment variables expanded
    pub fn content_dir(&self) -> Result<PathBuf> {
        expand_path("content.dir", &self.content.dir)
    }

    /// Ledger file path with `~` and environment variables expanded
    pub fn ledger_path(&self) -> Result<PathBuf> {
        expand_path("ledger.path", &self.ledger.path)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            content: ContentConfig {
                dir: "~/.local/share/rotacast/content".to_string(),
                extension: default_extension(),
            },
            ledger: LedgerConfig {
                path: "~/.local/share/rotacast/history.json".to_string(),
            },
            format: FormatConfig {
                max_length: 280,
                tags: Vec::new(),
                add_timestamp: false,
                timezone: Timezone::Local,
            },
            schedule: ScheduleConfig::default(),
            mastodon: None,
        }
    }
}

fn expand_path(field: &str, raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).map_err(|e| ConfigError::Invalid {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Resolve the configuration file path
///
/// Order: explicit path, `ROTACAST_CONFIG`, then the XDG config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(
            shellexpand::tilde(&path.to_string_lossy()).to_string(),
        ));
    }

    if let Ok(path) = std::env::var("ROTACAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("rotacast").join("config.toml"))
}
