/*!
 # Device wire protocol

 Newline-terminated text commands understood by the clock firmware. The
 protocol is one-directional: nothing is read back from the device.
*/

use std::fmt;

use crate::task::Task;

/// A single line sent to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Adopt new WiFi credentials
    SetWifi { ssid: String, password: String },
    /// Toggle between live-clock and countdown mode
    SwitchMode,
    /// Enter task receive mode
    BeginUpload,
    /// One task of the batch
    TaskLine(Task),
    /// Terminate the batch
    EndUpload,
}

impl Command {
    /// Encoded line including the trailing `\n`
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_line().into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetWifi { ssid, password } => write!(f, "setwifi:{ssid},{password}"),
            Command::SwitchMode => write!(f, "switchmode"),
            Command::BeginUpload => write!(f, "sendcsv"),
            Command::TaskLine(task) => write!(f, "{} {}", task.start, task.duration),
            Command::EndUpload => write!(f, "EOF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ClockTime;

    #[test]
    fn lines_match_firmware_grammar() {
        let wifi = Command::SetWifi {
            ssid: "home".into(),
            password: "secret".into(),
        };
        assert_eq!(wifi.to_line(), "setwifi:home,secret\n");
        assert_eq!(Command::SwitchMode.to_bytes(), b"switchmode\n");
        assert_eq!(Command::BeginUpload.to_line(), "sendcsv\n");
        assert_eq!(Command::EndUpload.to_line(), "EOF\n");

        let task = Task::new(ClockTime::parse("07:05").unwrap(), 45);
        assert_eq!(Command::TaskLine(task).to_line(), "07:05 45\n");
    }
}
