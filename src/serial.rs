/*!
 # Serial transport

 The single open connection to the clock. Opening fails fast when the port
 cannot be acquired; closing deasserts RTS/DTR and may be repeated.

 The ESP32 boards wire RTS and DTR to EN and GPIO0. DTR is never asserted on
 open, and RTS is always released before DTR so the lines never pass through
 the reset state (DTR low, RTS high).
*/

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::time;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, instrument, warn};

use crate::config::SerialSettings;
use crate::device::Transport;
use crate::{Error, Result};

fn transport_error(e: impl std::fmt::Display) -> Error {
    Error::Transport(e.to_string())
}

/// Modem control lines that drive the board's reset circuit
trait ControlLines {
    fn write_request_to_send(&mut self, level: bool) -> tokio_serial::Result<()>;
    fn write_data_terminal_ready(&mut self, level: bool) -> tokio_serial::Result<()>;
}

impl ControlLines for SerialStream {
    fn write_request_to_send(&mut self, level: bool) -> tokio_serial::Result<()> {
        SerialPort::write_request_to_send(self, level)
    }

    fn write_data_terminal_ready(&mut self, level: bool) -> tokio_serial::Result<()> {
        SerialPort::write_data_terminal_ready(self, level)
    }
}

/// Deasserts RTS, then DTR
fn release_control_lines(lines: &mut impl ControlLines) -> tokio_serial::Result<()> {
    lines.write_request_to_send(false)?;
    lines.write_data_terminal_ready(false)
}

/// Names of the serial ports present on this machine
pub fn available_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(transport_error)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// An open serial connection to the clock
pub struct SerialLink {
    port_name: String,
    stream: Option<SerialStream>,
    write_timeout: Duration,
}

impl SerialLink {
    /// Opens `port_name` with the configured baud rate and timeout
    ///
    /// DTR stays deasserted while opening and RTS is released right after,
    /// so the board is neither reset nor held in reset. Must be called from
    /// within a Tokio runtime.
    #[instrument(skip(settings), fields(baud = settings.baud_rate))]
    pub fn open(port_name: &str, settings: &SerialSettings) -> Result<Self> {
        debug!("Opening serial port");
        let mut stream = tokio_serial::new(port_name, settings.baud_rate)
            .timeout(settings.timeout())
            .dtr_on_open(false)
            .open_native_async()
            .map_err(transport_error)?;

        release_control_lines(&mut stream).map_err(transport_error)?;

        info!("Connected to {}", port_name);
        Ok(Self {
            port_name: port_name.to_string(),
            stream: Some(stream),
            write_timeout: settings.timeout(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[async_trait]
impl Transport for SerialLink {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let timeout = self.write_timeout;

        let written = time::timeout(timeout, async {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await;

        match written {
            Ok(result) => result.map_err(transport_error),
            Err(_) => Err(Error::WriteTimeout(timeout.as_millis() as u64)),
        }
    }

    #[instrument(skip(self))]
    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            debug!("Serial link already closed");
            return Ok(());
        };

        let deasserted = release_control_lines(&mut stream);
        drop(stream);

        match deasserted {
            Ok(()) => {
                info!("Disconnected from {}", self.port_name);
                Ok(())
            }
            Err(e) => {
                warn!("Port closed but control lines could not be reset: {}", e);
                Err(transport_error(e))
            }
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = release_control_lines(&mut stream);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Line levels as (RTS, DTR), starting from both asserted
    struct Lines {
        history: Vec<(bool, bool)>,
        fail_rts: bool,
    }

    impl Lines {
        fn asserted() -> Self {
            Lines {
                history: vec![(true, true)],
                fail_rts: false,
            }
        }

        fn current(&self) -> (bool, bool) {
            self.history[self.history.len() - 1]
        }
    }

    impl ControlLines for Lines {
        fn write_request_to_send(&mut self, level: bool) -> tokio_serial::Result<()> {
            if self.fail_rts {
                return Err(tokio_serial::Error::new(
                    tokio_serial::ErrorKind::NoDevice,
                    "unplugged",
                ));
            }
            let (_, dtr) = self.current();
            self.history.push((level, dtr));
            Ok(())
        }

        fn write_data_terminal_ready(&mut self, level: bool) -> tokio_serial::Result<()> {
            let (rts, _) = self.current();
            self.history.push((rts, level));
            Ok(())
        }
    }

    #[test]
    fn releasing_lines_never_passes_through_reset() {
        let mut lines = Lines::asserted();
        release_control_lines(&mut lines).unwrap();

        assert_eq!(lines.history, [(true, true), (false, true), (false, false)]);
        // Reset is RTS high with DTR low
        assert!(!lines.history.contains(&(true, false)));
    }

    #[test]
    fn failed_rts_release_leaves_dtr_alone() {
        let mut lines = Lines {
            fail_rts: true,
            ..Lines::asserted()
        };
        assert!(release_control_lines(&mut lines).is_err());
        assert_eq!(lines.history, [(true, true)]);
    }

    #[tokio::test]
    async fn opening_a_missing_port_fails_fast() {
        let result = SerialLink::open("/dev/does-not-exist-atimer", &SerialSettings::default());
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
