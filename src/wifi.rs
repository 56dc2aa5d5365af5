//! WiFi credentials remembered between sessions.
//!
//! The file holds two plaintext lines, SSID then password. It is written only
//! after the credentials were handed to the device.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, instrument};

use crate::device::{ClockDevice, Transport};
use crate::{Error, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

// Keeps the password out of logs
impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"***")
            .finish()
    }
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Self {
        Self {
            ssid: ssid.trim().to_string(),
            password: password.trim().to_string(),
        }
    }
}

fn persistence_error(path: &Path, source: std::io::Error) -> Error {
    Error::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads remembered credentials
///
/// Returns `Ok(None)` when the file is absent or has fewer than two lines.
pub fn load_wifi(path: &Path) -> Result<Option<WifiCredentials>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(persistence_error(path, e)),
    };

    let mut lines = text.lines();
    match (lines.next(), lines.next()) {
        (Some(ssid), Some(password)) => Ok(Some(WifiCredentials::new(ssid, password))),
        _ => {
            debug!("Ignoring incomplete WiFi file {}", path.display());
            Ok(None)
        }
    }
}

pub fn save_wifi(path: &Path, credentials: &WifiCredentials) -> Result<()> {
    let text = format!("{}\n{}", credentials.ssid, credentials.password);
    fs::write(path, text).map_err(|e| persistence_error(path, e))
}

/// Sends the credentials to the device, then remembers them on disk
#[instrument(skip(device))]
pub async fn send_wifi_and_remember<T: Transport>(
    device: &mut ClockDevice<T>,
    credentials: &WifiCredentials,
    path: &Path,
) -> Result<()> {
    device
        .set_wifi(&credentials.ssid, &credentials.password)
        .await?;
    save_wifi(path, credentials)
}
