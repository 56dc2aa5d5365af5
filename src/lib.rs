/*!
 # Annual Timer Schedule Library

 A Rust library for editing the schedule of a microcontroller-based annual
 countdown/timer clock and pushing it to the device over a serial line.

 ## Features

 * Non-overlapping annual date ranges (month-day windows, wrap-around aware)
 * Non-overlapping daily tasks (start time + duration, may cross midnight)
 * Tolerant plain-text persistence of the whole schedule
 * Paced, one-directional sync of a range's tasks to the device
 * WiFi provisioning and mode switching commands

 ## Example

 ```no_run
 use annual_timer::*;

 #[tokio::main]
 async fn main() -> Result<()> {
     let mut store = ScheduleStore::new();
     let range = store.add_range("03-01", "10-31")?;
     store.add_task(range, "08:00", 45)?;
     store.add_task(range, "17:30", 20)?;

     let link = SerialLink::open("/dev/ttyUSB0", &SerialSettings::default())?;
     let mut device = ClockDevice::new(link, SyncSettings::default());
     device.sync_selected(&store).await?;
     device.close().await?;

     Ok(())
 }
 ```
*/

use std::path::PathBuf;

use thiserror::Error;

/// Error types for the annual timer library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed date, time or duration text
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The date range overlaps an existing one
    #[error("Conflicts with range #{index} ({start} ~ {end})")]
    RangeConflict {
        index: usize,
        start: MonthDay,
        end: MonthDay,
    },

    /// The task overlaps an existing task of the same range
    #[error("Conflicts with task #{index} ({start}, {duration} min)")]
    TaskConflict {
        index: usize,
        start: ClockTime,
        duration: u32,
    },

    /// Range index out of bounds
    #[error("No range at index {0}")]
    NoSuchRange(usize),

    /// Task index out of bounds
    #[error("No task at index {task} in range #{range}")]
    NoSuchTask { range: usize, task: usize },

    /// An operation needed a selected range and there is none
    #[error("No range selected")]
    NoSelection,

    /// The range to sync has no tasks
    #[error("Selected range has no tasks to sync")]
    NothingToSync,

    /// Serial open/write/close failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// A write did not complete in time
    #[error("Write timed out after {0} ms")]
    WriteTimeout(u64),

    /// The link has already been closed
    #[error("Serial link is not open")]
    NotConnected,

    /// I/O failure reading or writing a persisted file
    #[error("Persistence error on {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A schedule file row that looked like a task could not be read
    #[error("Malformed schedule file at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// Configuration file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error came from the serial transport
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::WriteTimeout(_) | Error::NotConnected
        )
    }

    /// Whether the error is a rejected mutation that left the store unchanged
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat(_) | Error::RangeConflict { .. } | Error::TaskConflict { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod calendar;
pub mod codec;
pub mod config;
pub mod console;
pub mod device;
pub mod protocol;
pub mod schedule;
pub mod serial;
pub mod task;
pub mod wifi;

// Re-export key types
pub use calendar::{date_ranges_overlap, MonthDay};
pub use codec::{decode, encode, load_schedule, save_schedule};
pub use config::{SerialSettings, Settings, SyncSettings};
pub use device::{ClockDevice, Transport};
pub use protocol::Command;
pub use schedule::{DateRange, ScheduleStore, Violation};
pub use serial::{available_ports, SerialLink};
pub use task::{find_task_conflict, parse_duration, ClockTime, Task};
pub use wifi::{load_wifi, send_wifi_and_remember, WifiCredentials};
