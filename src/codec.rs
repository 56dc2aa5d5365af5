/*!
 # Schedule file codec

 Plain comma-delimited text, one block per range:

 ```text
 RANGE~03-01~10-31
 ID,T,D
 0,08:00,45
 1,17:30,20

 ```

 The first column of a task row is a position written on save and ignored on
 load. Loading is tolerant: rows that are neither a range marker nor a task
 row are skipped, and the loaded schedule is not re-validated. Only a task
 duration that is not an integer aborts the load.
*/

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::calendar::MonthDay;
use crate::schedule::{DateRange, ScheduleStore};
use crate::task::{ClockTime, Task};
use crate::{Error, Result};

const RANGE_MARKER: &str = "RANGE";
const TASK_HEADER: &str = "ID,T,D";
const LINE_END: &str = "\r\n";

/// Serializes the whole store, ranges and tasks in storage order
pub fn encode(store: &ScheduleStore) -> String {
    let mut out = String::new();
    for range in store.ranges() {
        out.push_str(&format!("{RANGE_MARKER}~{}~{}{LINE_END}", range.start, range.end));
        out.push_str(TASK_HEADER);
        out.push_str(LINE_END);
        for (position, task) in range.tasks().iter().enumerate() {
            out.push_str(&format!("{position},{},{}{LINE_END}", task.start, task.duration));
        }
        out.push_str(LINE_END);
    }
    out
}

fn is_position(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}

/// Parses schedule text into a store with no selection
///
/// A task row whose duration is not an integer aborts the whole decode. Rows
/// with a negative duration or a time that is not `H:M` are skipped.
pub fn decode(text: &str) -> Result<ScheduleStore> {
    let mut ranges: Vec<DateRange> = Vec::new();
    let mut tasks: Vec<Vec<Task>> = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split(',').collect();
        let first = fields[0];

        if first.contains('~') {
            let tokens: Vec<&str> = first.split('~').collect();
            let start = MonthDay::lenient(tokens[tokens.len() - 2]);
            let end = MonthDay::lenient(tokens[tokens.len() - 1]);
            ranges.push(DateRange::new(start, end));
            tasks.push(Vec::new());
        } else if fields.len() >= 3 && is_position(first) {
            let Some(current) = tasks.last_mut() else {
                debug!("Skipping task row before any range at line {}", number + 1);
                continue;
            };
            let duration = fields[2].trim().parse::<i64>().map_err(|_| Error::Malformed {
                line: number + 1,
                reason: format!("unreadable duration '{}'", fields[2]),
            })?;
            let Ok(duration) = u32::try_from(duration) else {
                warn!("Skipping task with duration {} at line {}", duration, number + 1);
                continue;
            };
            let Some(start) = ClockTime::lenient(fields[1]) else {
                warn!("Skipping task with time {:?} at line {}", fields[1], number + 1);
                continue;
            };
            current.push(Task::new(start, duration));
        } else if !line.trim().is_empty() && line != TASK_HEADER {
            debug!("Skipping unrecognised line {}: {line:?}", number + 1);
        }
    }

    let ranges = ranges
        .into_iter()
        .zip(tasks)
        .map(|(range, tasks)| DateRange::with_tasks(range.start, range.end, tasks))
        .collect();

    Ok(ScheduleStore::from_ranges(ranges))
}

/// Loads the schedule file
///
/// Returns `Ok(None)` when the file does not exist. Any read or decode
/// failure is an error and nothing is loaded.
#[instrument]
pub fn load_schedule(path: &Path) -> Result<Option<ScheduleStore>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No schedule file at {}, starting empty", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(Error::Persistence {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let store = decode(&text)?;
    for violation in store.violations() {
        warn!("Loaded schedule is inconsistent: {violation}");
    }
    info!("Loaded {} ranges from {}", store.len(), path.display());
    Ok(Some(store))
}

/// Writes the schedule file, replacing any previous content
#[instrument(skip(store))]
pub fn save_schedule(path: &Path, store: &ScheduleStore) -> Result<()> {
    fs::write(path, encode(store)).map_err(|source| Error::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Saved {} ranges to {}", store.len(), path.display());
    Ok(())
}
