use std::time::Duration;

use async_trait::async_trait;
use tokio::time;
use tracing::{debug, error, info, instrument, trace};

use crate::config::SyncSettings;
use crate::protocol::Command;
use crate::schedule::{DateRange, ScheduleStore};
use crate::{Error, Result};

/// Byte sink the device commands are written to
///
/// Implemented by [`crate::SerialLink`]; tests substitute an in-memory sink.
#[async_trait]
pub trait Transport: Send {
    /// Writes the whole buffer or fails
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Releases the underlying handle; calling it again is a no-op
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sends commands to an annual timer clock over an open transport
pub struct ClockDevice<T: Transport> {
    /// The open connection
    transport: T,
    /// Wait after `sendcsv` before the first task line
    settle_delay: Duration,
    /// Wait after each task line
    line_delay: Duration,
}

impl<T: Transport> ClockDevice<T> {
    /// Wraps an already-open transport
    pub fn new(transport: T, pacing: SyncSettings) -> Self {
        Self {
            transport,
            settle_delay: Duration::from_millis(pacing.settle_delay_ms),
            line_delay: Duration::from_millis(pacing.line_delay_ms),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gives the transport back to the caller
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Closes the underlying transport
    #[instrument(skip(self))]
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    /// Asks the device to join a WiFi network
    ///
    /// # Arguments
    ///
    /// * `ssid` - Network name, must not be empty
    /// * `password` - Network password, may be empty for open networks
    #[instrument(skip(self, password))]
    pub async fn set_wifi(&mut self, ssid: &str, password: &str) -> Result<()> {
        let ssid = ssid.trim();
        let password = password.trim();
        if ssid.is_empty() {
            return Err(Error::InvalidFormat("SSID must not be empty".into()));
        }
        if ssid.contains(['\n', '\r']) || password.contains(['\n', '\r']) {
            return Err(Error::InvalidFormat(
                "WiFi credentials must be a single line".into(),
            ));
        }

        debug!("Sending WiFi credentials for '{}'", ssid);
        self.send_command(&Command::SetWifi {
            ssid: ssid.to_string(),
            password: password.to_string(),
        })
        .await?;

        info!("WiFi credentials sent");
        Ok(())
    }

    /// Toggles the device between live-clock and countdown mode
    #[instrument(skip(self))]
    pub async fn switch_mode(&mut self) -> Result<()> {
        self.send_command(&Command::SwitchMode).await?;
        info!("Mode switch requested");
        Ok(())
    }

    /// Uploads the tasks of a range in ascending start-time order
    ///
    /// Returns the number of task lines sent. A transport failure stops the
    /// upload where it is; lines already written are not retracted.
    #[instrument(skip(self, range), fields(dates = %range, tasks = range.tasks().len()))]
    pub async fn sync_range(&mut self, range: &DateRange) -> Result<usize> {
        let tasks = range.tasks_by_start();
        if tasks.is_empty() {
            return Err(Error::NothingToSync);
        }

        debug!("Entering device receive mode");
        self.send_command(&Command::BeginUpload).await?;
        time::sleep(self.settle_delay).await;

        for (_, task) in &tasks {
            trace!("Sending task {} +{} min", task.start, task.duration);
            self.send_command(&Command::TaskLine(**task)).await?;
            time::sleep(self.line_delay).await;
        }

        self.send_command(&Command::EndUpload).await?;
        info!("Synchronized {} tasks of {}", tasks.len(), range);
        Ok(tasks.len())
    }

    /// Uploads the store's selected range
    pub async fn sync_selected(&mut self, store: &ScheduleStore) -> Result<usize> {
        let range = store.selected_range().ok_or(Error::NoSelection)?;
        self.sync_range(range).await
    }

    /// Writes one command line; failures are reported, never retried
    #[instrument(skip(self, command), fields(cmd = %command_name(command)))]
    async fn send_command(&mut self, command: &Command) -> Result<()> {
        match self.transport.write(&command.to_bytes()).await {
            Ok(()) => {
                trace!("Command sent successfully");
                Ok(())
            }
            Err(e) => {
                error!("Command failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Command name for spans, without any credentials
fn command_name(command: &Command) -> &'static str {
    match command {
        Command::SetWifi { .. } => "setwifi",
        Command::SwitchMode => "switchmode",
        Command::BeginUpload => "sendcsv",
        Command::TaskLine(_) => "task",
        Command::EndUpload => "EOF",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    /// Records written lines; optionally fails on the n-th write (0-based)
    #[derive(Default)]
    struct RecordingTransport {
        lines: Vec<String>,
        attempts: usize,
        fail_at: Option<usize>,
        closed: u32,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn write(&mut self, bytes: &[u8]) -> Result<()> {
            let attempt = self.attempts;
            self.attempts += 1;
            if self.fail_at == Some(attempt) {
                return Err(Error::Transport("device unplugged".into()));
            }
            self.lines.push(String::from_utf8_lossy(bytes).into_owned());
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.closed += 1;
            Ok(())
        }
    }

    fn device(fail_at: Option<usize>) -> ClockDevice<RecordingTransport> {
        let transport = RecordingTransport {
            fail_at,
            ..Default::default()
        };
        ClockDevice::new(transport, SyncSettings::default())
    }

    fn store() -> ScheduleStore {
        let mut store = ScheduleStore::new();
        let range = store.add_range("01-01", "12-31").unwrap();
        store.add_task(range, "18:00", 30).unwrap();
        store.add_task(range, "07:15", 45).unwrap();
        store.add_task(range, "12:00", 5).unwrap();
        store
    }

    #[tokio::test(start_paused = true)]
    async fn sync_sends_tasks_in_start_order_with_pacing() {
        let mut device = device(None);
        let started = Instant::now();

        let sent = device.sync_selected(&store()).await.unwrap();

        assert_eq!(sent, 3);
        assert_eq!(
            device.transport().lines,
            ["sendcsv\n", "07:15 45\n", "12:00 5\n", "18:00 30\n", "EOF\n"]
        );
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(350), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_aborts_the_rest_of_the_batch() {
        let mut device = device(Some(2));

        let err = device.sync_selected(&store()).await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(device.transport().lines, ["sendcsv\n", "07:15 45\n"]);
    }

    #[tokio::test]
    async fn sync_requires_a_selected_non_empty_range() {
        let mut device = device(None);

        let err = device.sync_selected(&ScheduleStore::new()).await.unwrap_err();
        assert!(matches!(err, Error::NoSelection));

        let mut empty = ScheduleStore::new();
        empty.add_range("01-01", "01-31").unwrap();
        let err = device.sync_selected(&empty).await.unwrap_err();
        assert!(matches!(err, Error::NothingToSync));

        assert!(device.transport().lines.is_empty());
    }

    #[tokio::test]
    async fn wifi_and_mode_commands() {
        let mut device = device(None);

        device.set_wifi(" home ", "secret").await.unwrap();
        device.switch_mode().await.unwrap();
        assert!(matches!(
            device.set_wifi("  ", "secret").await,
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(
            device.set_wifi("home", "a\nswitchmode").await,
            Err(Error::InvalidFormat(_))
        ));

        assert_eq!(
            device.transport().lines,
            ["setwifi:home,secret\n", "switchmode\n"]
        );
    }

    #[tokio::test]
    async fn failed_command_leaves_device_usable() {
        let mut device = device(Some(0));
        assert!(device.switch_mode().await.is_err());

        device.switch_mode().await.unwrap();
        assert_eq!(device.transport().lines, ["switchmode\n"]);

        device.close().await.unwrap();
        assert_eq!(device.into_inner().closed, 1);
    }
}
