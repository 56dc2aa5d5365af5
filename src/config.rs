use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "atimer.toml";

// -----------------------------------------------------------------------------
// Settings (root)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_schedule_path")]
    pub schedule_path: PathBuf,
    #[serde(default = "default_wifi_path")]
    pub wifi_path: PathBuf,
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schedule_path: default_schedule_path(),
            wifi_path: default_wifi_path(),
            serial: SerialSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Config(format!("{}: {e}", path.display()))),
        };
        toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

fn default_schedule_path() -> PathBuf {
    PathBuf::from("countdown_data.csv")
}

fn default_wifi_path() -> PathBuf {
    PathBuf::from("wifi_config.csv")
}

// -----------------------------------------------------------------------------
// SerialSettings
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SerialSettings {
    /// Port to use when none is given on the command line
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Bound on a single write, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SerialSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_timeout_ms() -> u64 {
    1000
}

// -----------------------------------------------------------------------------
// SyncSettings
// -----------------------------------------------------------------------------

/// Pacing of the bulk task upload
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SyncSettings {
    /// Wait after `sendcsv` for the device to enter receive mode
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Wait after each task line
    #[serde(default = "default_line_delay_ms")]
    pub line_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            line_delay_ms: default_line_delay_ms(),
        }
    }
}

fn default_settle_delay_ms() -> u64 {
    200
}

fn default_line_delay_ms() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_firmware() {
        let settings = Settings::default();
        assert_eq!(settings.serial.baud_rate, 115_200);
        assert_eq!(settings.serial.timeout(), Duration::from_secs(1));
        assert_eq!(settings.sync.settle_delay_ms, 200);
        assert_eq!(settings.sync.line_delay_ms, 50);
        assert_eq!(settings.schedule_path, PathBuf::from("countdown_data.csv"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            schedule_path = "/var/lib/atimer/schedule.csv"

            [serial]
            port = "/dev/ttyUSB0"
            "#,
        )
        .unwrap();

        assert_eq!(settings.serial.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(settings.serial.baud_rate, 115_200);
        assert_eq!(settings.sync, SyncSettings::default());
        assert_eq!(settings.wifi_path, PathBuf::from("wifi_config.csv"));
    }

    #[test]
    fn missing_file_yields_defaults_and_bad_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atimer.toml");
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        fs::write(&path, "[sync]\nline_delay_ms = \"fast\"\n").unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::Config(_))));

        let written = toml::to_string_pretty(&Settings::default()).unwrap();
        fs::write(&path, written).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());
    }
}
