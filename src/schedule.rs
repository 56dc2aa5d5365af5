/*!
 # Schedule store

 The ordered collection of annual date ranges, each owning its daily tasks,
 plus the currently selected range.

 Every mutation is validated before it is committed: ranges never overlap
 each other and tasks within one range never overlap. A rejected mutation
 leaves the store untouched.
*/

use std::fmt;

use tracing::{debug, instrument};

use crate::calendar::{date_ranges_overlap, MonthDay};
use crate::task::{find_task_conflict, ClockTime, Task};
use crate::{Error, Result};

/// An annual window with the tasks active during it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: MonthDay,
    pub end: MonthDay,
    tasks: Vec<Task>,
}

impl DateRange {
    pub fn new(start: MonthDay, end: MonthDay) -> Self {
        DateRange {
            start,
            end,
            tasks: Vec::new(),
        }
    }

    /// Builds a range without checking the tasks against each other
    pub fn with_tasks(start: MonthDay, end: MonthDay, tasks: Vec<Task>) -> Self {
        DateRange { start, end, tasks }
    }

    /// Whether the start is after the end, i.e. the window crosses New Year
    pub fn wraps(&self) -> bool {
        self.start.key() > self.end.key()
    }

    pub fn overlaps(&self, start: MonthDay, end: MonthDay) -> bool {
        date_ranges_overlap((self.start, self.end), (start, end))
    }

    /// Tasks in storage (insertion) order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Tasks in presentation order: ascending start time, ties in storage order
    ///
    /// Each entry carries the storage index used by the task mutations.
    pub fn tasks_by_start(&self) -> Vec<(usize, &Task)> {
        let mut sorted: Vec<_> = self.tasks.iter().enumerate().collect();
        sorted.sort_by_key(|(_, task)| task.start);
        sorted
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {}", self.start, self.end)
    }
}

/// An invariant breach found in a store that was loaded without validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Two ranges overlap
    Ranges(usize, usize),
    /// Two tasks of the same range overlap
    Tasks { range: usize, first: usize, second: usize },
    /// A task has a zero duration
    EmptyTask { range: usize, task: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Ranges(a, b) => write!(f, "ranges #{a} and #{b} overlap"),
            Violation::Tasks {
                range,
                first,
                second,
            } => write!(f, "tasks #{first} and #{second} of range #{range} overlap"),
            Violation::EmptyTask { range, task } => {
                write!(f, "task #{task} of range #{range} has no duration")
            }
        }
    }
}

/// In-memory schedule: ranges in insertion order plus the current selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleStore {
    ranges: Vec<DateRange>,
    selected: Option<usize>,
}

fn validate_dates(start: &str, end: &str) -> Result<(MonthDay, MonthDay)> {
    Ok((MonthDay::parse(start)?, MonthDay::parse(end)?))
}

fn validate_task(start: &str, duration: i64) -> Result<(ClockTime, u32)> {
    let start = ClockTime::parse(start)?;
    let duration = u32::try_from(duration)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| {
            Error::InvalidFormat(format!("duration must be a positive number of minutes, got {duration}"))
        })?;
    Ok((start, duration))
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps already-built ranges as they are, with nothing selected
    pub fn from_ranges(ranges: Vec<DateRange>) -> Self {
        ScheduleStore {
            ranges,
            selected: None,
        }
    }

    pub fn ranges(&self) -> &[DateRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn range(&self, index: usize) -> Result<&DateRange> {
        self.ranges.get(index).ok_or(Error::NoSuchRange(index))
    }

    fn range_mut(&mut self, index: usize) -> Result<&mut DateRange> {
        self.ranges.get_mut(index).ok_or(Error::NoSuchRange(index))
    }

    /// Index of the selected range, if any
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_range(&self) -> Option<&DateRange> {
        self.selected.and_then(|i| self.ranges.get(i))
    }

    pub fn select(&mut self, index: usize) -> Result<()> {
        self.range(index)?;
        self.selected = Some(index);
        Ok(())
    }

    /// Checks a candidate window against every range except `ignore`
    fn check_range_conflict(&self, start: MonthDay, end: MonthDay, ignore: Option<usize>) -> Result<()> {
        let conflict = self
            .ranges
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != ignore)
            .find(|(_, range)| range.overlaps(start, end));

        match conflict {
            Some((index, range)) => {
                debug!("{start} ~ {end} overlaps range #{index} ({range})");
                Err(Error::RangeConflict {
                    index,
                    start: range.start,
                    end: range.end,
                })
            }
            None => Ok(()),
        }
    }

    fn check_task_conflict(
        range: &DateRange,
        start: ClockTime,
        duration: u32,
        ignore: Option<usize>,
    ) -> Result<()> {
        match find_task_conflict(range.tasks(), start, duration, ignore) {
            Some((index, task)) => Err(Error::TaskConflict {
                index,
                start: task.start,
                duration: task.duration,
            }),
            None => Ok(()),
        }
    }

    /// Appends a new range and selects it, returning its index
    #[instrument(skip(self))]
    pub fn add_range(&mut self, start: &str, end: &str) -> Result<usize> {
        let (start, end) = validate_dates(start, end)?;
        self.check_range_conflict(start, end, None)?;

        self.ranges.push(DateRange::new(start, end));
        let index = self.ranges.len() - 1;
        self.selected = Some(index);
        debug!("Added range #{index} ({start} ~ {end})");
        Ok(index)
    }

    /// Replaces the dates of a range in place, keeping its tasks
    #[instrument(skip(self))]
    pub fn update_range_dates(&mut self, index: usize, start: &str, end: &str) -> Result<()> {
        let (start, end) = validate_dates(start, end)?;
        self.range(index)?;
        self.check_range_conflict(start, end, Some(index))?;

        let range = self.range_mut(index)?;
        range.start = start;
        range.end = end;
        debug!("Range #{index} now {range}");
        Ok(())
    }

    /// Removes a range and returns the new selection
    ///
    /// The selection moves to the first range if any remain.
    #[instrument(skip(self))]
    pub fn delete_range(&mut self, index: usize) -> Result<Option<usize>> {
        self.range(index)?;
        let removed = self.ranges.remove(index);
        self.selected = if self.ranges.is_empty() { None } else { Some(0) };
        debug!("Deleted range #{index} ({removed})");
        Ok(self.selected)
    }

    /// Appends a task to a range, returning its storage index
    #[instrument(skip(self))]
    pub fn add_task(&mut self, range_index: usize, start: &str, duration: i64) -> Result<usize> {
        let (start, duration) = validate_task(start, duration)?;
        let range = self.range_mut(range_index)?;
        Self::check_task_conflict(range, start, duration, None)?;

        range.tasks.push(Task::new(start, duration));
        debug!("Added task {start} +{duration} min to range #{range_index}");
        Ok(range.tasks.len() - 1)
    }

    /// Replaces a task in place without moving it in storage order
    #[instrument(skip(self))]
    pub fn update_task(
        &mut self,
        range_index: usize,
        task_index: usize,
        start: &str,
        duration: i64,
    ) -> Result<()> {
        let (start, duration) = validate_task(start, duration)?;
        let range = self.range_mut(range_index)?;
        if task_index >= range.tasks.len() {
            return Err(Error::NoSuchTask {
                range: range_index,
                task: task_index,
            });
        }
        Self::check_task_conflict(range, start, duration, Some(task_index))?;

        range.tasks[task_index] = Task::new(start, duration);
        Ok(())
    }

    /// Removes a task by storage position
    #[instrument(skip(self))]
    pub fn delete_task(&mut self, range_index: usize, task_index: usize) -> Result<Task> {
        let range = self.range_mut(range_index)?;
        if task_index >= range.tasks.len() {
            return Err(Error::NoSuchTask {
                range: range_index,
                task: task_index,
            });
        }
        Ok(range.tasks.remove(task_index))
    }

    /// Lists every invariant breach; empty for any store built through mutations
    pub fn violations(&self) -> Vec<Violation> {
        let mut found = Vec::new();

        for (i, a) in self.ranges.iter().enumerate() {
            for (j, b) in self.ranges.iter().enumerate().skip(i + 1) {
                if a.overlaps(b.start, b.end) {
                    found.push(Violation::Ranges(i, j));
                }
            }

            for (k, task) in a.tasks.iter().enumerate() {
                if task.duration == 0 {
                    found.push(Violation::EmptyTask { range: i, task: k });
                }
                for (l, other) in a.tasks.iter().enumerate().skip(k + 1) {
                    if task.overlaps(other) {
                        found.push(Violation::Tasks {
                            range: i,
                            first: k,
                            second: l,
                        });
                    }
                }
            }
        }

        found
    }
}
