//! Configuration loading and management
//!
//! Defaults, then an optional JSON file, then environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::capslock::CapsState;

/// Overrides the config file location
const CONFIG_PATH_ENV: &str = "CAPSLOCK_HUD_CONFIG";
/// Sets both hold durations, in milliseconds
const HOLD_ENV: &str = "CAPSLOCK_HUD_HOLD_MS";

/// Overlay animation and hold timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HudTiming {
    pub fade_in: Duration,
    pub fade_out: Duration,
    /// Time fully visible after a change to On
    pub hold_on: Duration,
    /// Time fully visible after a change to Off
    pub hold_off: Duration,
}

impl HudTiming {
    pub fn hold_for(&self, state: CapsState) -> Duration {
        match state {
            CapsState::On => self.hold_on,
            CapsState::Off => self.hold_off,
        }
    }
}

impl Default for HudTiming {
    fn default() -> Self {
        Self {
            fade_in: Duration::from_millis(50),
            fade_out: Duration::from_millis(200),
            hold_on: Duration::from_millis(800),
            hold_off: Duration::from_millis(800),
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub timing: HudTiming,

    /// How often to re-check Accessibility permission while it is missing
    pub permission_poll_interval: Duration,

    /// File the values were read from, if one existed
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timing: HudTiming::default(),
            permission_poll_interval: Duration::from_secs(2),
            source: None,
        }
    }
}

/// On-disk form; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    fade_in_ms: Option<u64>,
    fade_out_ms: Option<u64>,
    hold_on_ms: Option<u64>,
    hold_off_ms: Option<u64>,
    permission_poll_ms: Option<u64>,
}

impl FileConfig {
    /// Missing file means defaults; unreadable or malformed is an error
    fn read(path: &Path) -> Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        let file = serde_json::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(Some(file))
    }
}

impl Config {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = Self::default_path();

        let file = match &path {
            Some(path) => FileConfig::read(path)?,
            None => None,
        };
        let source = file.as_ref().and(path);
        let hold = std::env::var(HOLD_ENV).ok();

        let mut config = Self::from_parts(file.unwrap_or_default(), hold.as_deref())?;
        config.source = source;
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        let home = std::env::var("HOME").ok()?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("capslock-hud")
                .join("config.json"),
        )
    }

    fn from_parts(file: FileConfig, hold_ms: Option<&str>) -> Result<Self> {
        let mut config = Self::default();
        let timing = &mut config.timing;

        let ms = Duration::from_millis;
        if let Some(v) = file.fade_in_ms {
            timing.fade_in = ms(v);
        }
        if let Some(v) = file.fade_out_ms {
            timing.fade_out = ms(v);
        }
        if let Some(v) = file.hold_on_ms {
            timing.hold_on = ms(v);
        }
        if let Some(v) = file.hold_off_ms {
            timing.hold_off = ms(v);
        }
        if let Some(v) = file.permission_poll_ms {
            config.permission_poll_interval = ms(v);
        }

        if let Some(raw) = hold_ms {
            let v: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be milliseconds, got {:?}", HOLD_ENV, raw))?;
            config.timing.hold_on = ms(v);
            config.timing.hold_off = ms(v);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.timing.hold_on.is_zero() || self.timing.hold_off.is_zero() {
            bail!("hold durations must be greater than zero");
        }
        if self.permission_poll_interval.is_zero() {
            bail!("permission poll interval must be greater than zero");
        }
        Ok(())
    }
}
