/*!
 # Console commands

 One command per line, `name` or `name:arguments`, as read by `atimerd`.
 Store commands operate on the selected range and are executed here;
 persistence and device commands are left to the caller.
*/

use std::fmt::Write;

use crate::schedule::{DateRange, ScheduleStore};
use crate::task::parse_duration;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Ranges,
    Select(usize),
    AddRange { start: String, end: String },
    UpdateRange { start: String, end: String },
    DeleteRange,
    Tasks,
    AddTask { time: String, duration: i64 },
    UpdateTask { index: usize, time: String, duration: i64 },
    DeleteTask(usize),
    Save,
    Sync,
    Wifi { ssid: String, password: String },
    SwitchMode,
    Quit,
}

fn split_args<const N: usize>(args: Option<&str>, usage: &str) -> Result<[String; N]> {
    let usage = || Error::InvalidFormat(format!("usage: {usage}"));
    let args = args.ok_or_else(usage)?;
    let parts: Vec<String> = args.splitn(N, ',').map(|s| s.trim().to_string()).collect();
    parts.try_into().map_err(|_| usage())
}

fn parse_index(text: &str) -> Result<usize> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidFormat(format!("'{}' is not an index", text.trim())))
}

fn parse_minutes(text: &str) -> Result<i64> {
    parse_duration(text).map(i64::from)
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, args) = match line.split_once(':') {
            Some((name, args)) => (name.trim(), Some(args)),
            None => (line, None),
        };

        let command = match name {
            "ranges" => ConsoleCommand::Ranges,
            "select" => {
                let [index] = split_args(args, "select:INDEX")?;
                ConsoleCommand::Select(parse_index(&index)?)
            }
            "add_range" => {
                let [start, end] = split_args(args, "add_range:MM-DD,MM-DD")?;
                ConsoleCommand::AddRange { start, end }
            }
            "update_range" => {
                let [start, end] = split_args(args, "update_range:MM-DD,MM-DD")?;
                ConsoleCommand::UpdateRange { start, end }
            }
            "delete_range" => ConsoleCommand::DeleteRange,
            "tasks" => ConsoleCommand::Tasks,
            "add_task" => {
                let [time, duration] = split_args(args, "add_task:HH:MM,MINUTES")?;
                ConsoleCommand::AddTask {
                    time,
                    duration: parse_minutes(&duration)?,
                }
            }
            "update_task" => {
                let [index, time, duration] =
                    split_args(args, "update_task:INDEX,HH:MM,MINUTES")?;
                ConsoleCommand::UpdateTask {
                    index: parse_index(&index)?,
                    time,
                    duration: parse_minutes(&duration)?,
                }
            }
            "delete_task" => {
                let [index] = split_args(args, "delete_task:INDEX")?;
                ConsoleCommand::DeleteTask(parse_index(&index)?)
            }
            "save" => ConsoleCommand::Save,
            "sync" => ConsoleCommand::Sync,
            "wifi" => {
                let [ssid, password] = split_args(args, "wifi:SSID,PASSWORD")?;
                ConsoleCommand::Wifi { ssid, password }
            }
            "switchmode" => ConsoleCommand::SwitchMode,
            "quit" | "exit" => ConsoleCommand::Quit,
            "" => return Err(Error::InvalidFormat("No command given".into())),
            other => return Err(Error::InvalidFormat(format!("Unknown command: {other}"))),
        };

        Ok(command)
    }
}

/// Runs a command that only touches the store
///
/// Returns `None` for save, sync, WiFi, mode and quit commands. On success
/// the text to show the operator is returned.
pub fn run_store_command(
    store: &mut ScheduleStore,
    command: &ConsoleCommand,
) -> Option<Result<String>> {
    let selected = store.selected().ok_or(Error::NoSelection);

    let result = match command {
        ConsoleCommand::Ranges => Ok(format_ranges(store)),
        ConsoleCommand::Select(index) => store
            .select(*index)
            .and_then(|_| store.range(*index).map(|r| format!("selected #{index} {r}"))),
        ConsoleCommand::AddRange { start, end } => store
            .add_range(start, end)
            .map(|index| format!("added range #{index}")),
        ConsoleCommand::UpdateRange { start, end } => selected.and_then(|index| {
            store
                .update_range_dates(index, start, end)
                .map(|_| format!("updated range #{index}"))
        }),
        ConsoleCommand::DeleteRange => selected.and_then(|index| {
            store.delete_range(index).map(|now| match now {
                Some(now) => format!("deleted range #{index}, selected #{now}"),
                None => format!("deleted range #{index}, no ranges left"),
            })
        }),
        ConsoleCommand::Tasks => store
            .selected_range()
            .ok_or(Error::NoSelection)
            .map(format_tasks),
        ConsoleCommand::AddTask { time, duration } => selected.and_then(|index| {
            store
                .add_task(index, time, *duration)
                .map(|task| format!("added task #{task}"))
        }),
        ConsoleCommand::UpdateTask {
            index: task,
            time,
            duration,
        } => selected.and_then(|index| {
            store
                .update_task(index, *task, time, *duration)
                .map(|_| format!("updated task #{task}"))
        }),
        ConsoleCommand::DeleteTask(task) => selected.and_then(|index| {
            store
                .delete_task(index, *task)
                .map(|_| format!("deleted task #{task}"))
        }),
        ConsoleCommand::Save
        | ConsoleCommand::Sync
        | ConsoleCommand::Wifi { .. }
        | ConsoleCommand::SwitchMode
        | ConsoleCommand::Quit => return None,
    };

    Some(result)
}

/// One line per range, the selected one marked with `*`
pub fn format_ranges(store: &ScheduleStore) -> String {
    let mut out = String::new();
    for (i, range) in store.ranges().iter().enumerate() {
        let marker = if store.selected() == Some(i) { '*' } else { ' ' };
        let wraps = if range.wraps() { " (wraps)" } else { "" };
        let _ = writeln!(
            out,
            "{marker}#{i} {range}{wraps}, {} tasks",
            range.tasks().len()
        );
    }
    out.trim_end().to_string()
}

/// Task table in presentation order, each row with its storage index
pub fn format_tasks(range: &DateRange) -> String {
    let mut out = String::new();
    for (index, task) in range.tasks_by_start() {
        let _ = writeln!(
            out,
            "#{index} {} {:>4} min -> {}",
            task.start,
            task.duration,
            task.end_label()
        );
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(store: &mut ScheduleStore, line: &str) -> Result<String> {
        let command = ConsoleCommand::parse(line)?;
        run_store_command(store, &command).expect("store command")
    }

    #[test]
    fn parses_arguments_after_the_first_colon() {
        assert_eq!(
            ConsoleCommand::parse("add_task:08:30, 45").unwrap(),
            ConsoleCommand::AddTask {
                time: "08:30".into(),
                duration: 45
            }
        );
        assert_eq!(
            ConsoleCommand::parse("update_task:2,23:30,90").unwrap(),
            ConsoleCommand::UpdateTask {
                index: 2,
                time: "23:30".into(),
                duration: 90
            }
        );
        assert_eq!(
            ConsoleCommand::parse("wifi:home,pa,ss").unwrap(),
            ConsoleCommand::Wifi {
                ssid: "home".into(),
                password: "pa,ss".into()
            }
        );
        assert_eq!(ConsoleCommand::parse(" sync ").unwrap(), ConsoleCommand::Sync);
    }

    #[test]
    fn rejects_unknown_and_incomplete_commands() {
        assert!(ConsoleCommand::parse("").is_err());
        assert!(ConsoleCommand::parse("reboot").is_err());
        assert!(ConsoleCommand::parse("add_range:01-01").is_err());
        assert!(ConsoleCommand::parse("add_task:08:00,0").is_err());
        assert!(ConsoleCommand::parse("select:one").is_err());
    }

    #[test]
    fn store_commands_follow_the_selection() {
        let mut store = ScheduleStore::new();
        assert!(matches!(run(&mut store, "tasks"), Err(Error::NoSelection)));

        run(&mut store, "add_range:03-01,10-31").unwrap();
        run(&mut store, "add_range:12-15,01-10").unwrap();
        run(&mut store, "select:0").unwrap();
        run(&mut store, "add_task:17:30,20").unwrap();
        run(&mut store, "add_task:08:00,45").unwrap();

        assert_eq!(
            run(&mut store, "tasks").unwrap(),
            "#1 08:00   45 min -> 08:45\n#0 17:30   20 min -> 17:50"
        );
        assert_eq!(
            run(&mut store, "ranges").unwrap(),
            "*#0 03-01 ~ 10-31, 2 tasks\n #1 12-15 ~ 01-10 (wraps), 0 tasks"
        );

        let err = run(&mut store, "add_task:08:30,10").unwrap_err();
        assert!(matches!(err, Error::TaskConflict { index: 1, .. }));

        assert_eq!(
            run(&mut store, "delete_range").unwrap(),
            "deleted range #0, selected #0"
        );
        assert_eq!(store.selected_range().unwrap().to_string(), "12-15 ~ 01-10");
    }

    #[test]
    fn device_commands_are_left_to_the_caller() {
        let mut store = ScheduleStore::new();
        for line in ["save", "sync", "switchmode", "quit", "wifi:a,b"] {
            let command = ConsoleCommand::parse(line).unwrap();
            assert!(run_store_command(&mut store, &command).is_none());
        }
    }
}
