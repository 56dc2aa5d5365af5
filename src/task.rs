/*!
 # Task interval model

 A task is a daily trigger window `[start, start + duration)` measured in
 minutes since midnight. The end may pass midnight; interval arithmetic stays
 in absolute minutes and only the end label shows the day rollover.
*/

use std::fmt;

use crate::{Error, Result};

const MINUTES_PER_DAY: u64 = 24 * 60;

/// Clock time of day, stored as minutes since midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u32);

impl ClockTime {
    /// Parses exactly `HH:MM` in the range 00:00 to 23:59
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidFormat(format!("'{text}' is not a valid HH:MM time"));

        let bytes = text.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }

        let [h1, h2, m1, m2] = digits.map(|b| u32::from(b - b'0'));
        let (hours, minutes) = (h1 * 10 + h2, m1 * 10 + m2);
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }

        Ok(ClockTime(hours * 60 + minutes))
    }

    /// Reads `H:M` as two integers without range checks
    pub fn lenient(text: &str) -> Option<Self> {
        let (h, m) = text.trim().split_once(':')?;
        let hours: u32 = h.trim().parse().ok()?;
        let minutes: u32 = m.trim().parse().ok()?;
        hours.checked_mul(60)?.checked_add(minutes).map(ClockTime)
    }

    pub fn from_minutes(minutes: u32) -> Self {
        ClockTime(minutes)
    }

    /// Minutes since midnight
    pub fn minutes(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Parses a duration in whole minutes, which must be greater than zero
pub fn parse_duration(text: &str) -> Result<u32> {
    match text.trim().parse::<u32>() {
        Ok(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(Error::InvalidFormat(format!(
            "'{}' is not a positive duration in minutes",
            text.trim()
        ))),
    }
}

/// A daily trigger window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Task {
    /// Reserved leading field, always 0
    pub reserved: u8,
    /// Start of the window
    pub start: ClockTime,
    /// Length of the window in minutes
    pub duration: u32,
}

impl Task {
    pub fn new(start: ClockTime, duration: u32) -> Self {
        Task {
            reserved: 0,
            start,
            duration,
        }
    }

    /// Half-open minute interval, uncapped at midnight
    pub fn interval(&self) -> (u64, u64) {
        let start = u64::from(self.start.minutes());
        (start, start + u64::from(self.duration))
    }

    /// Whether the window reaches into the following day
    pub fn crosses_midnight(&self) -> bool {
        self.interval().1 >= MINUTES_PER_DAY
    }

    /// End time for display, `HH:MM` with ` (+1)` when it falls on the next day
    pub fn end_label(&self) -> String {
        let end = self.interval().1;
        let label = format!("{:02}:{:02}", (end / 60) % 24, end % 60);
        if self.crosses_midnight() {
            format!("{label} (+1)")
        } else {
            label
        }
    }

    /// Standard half-open interval intersection
    pub fn overlaps(&self, other: &Task) -> bool {
        let (s1, e1) = self.interval();
        let (s2, e2) = other.interval();
        s1.max(s2) < e1.min(e2)
    }
}

/// Finds the first task, in storage order, that overlaps a candidate window
///
/// The task at `ignore` is skipped so an edited task is not compared with
/// itself.
pub fn find_task_conflict(
    tasks: &[Task],
    start: ClockTime,
    duration: u32,
    ignore: Option<usize>,
) -> Option<(usize, &Task)> {
    let candidate = Task::new(start, duration);
    tasks
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != ignore)
        .find(|(_, task)| task.overlaps(&candidate))
}
