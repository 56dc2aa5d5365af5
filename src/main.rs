use std::path::{Path, PathBuf};

use annual_timer::config::DEFAULT_CONFIG_PATH;
use annual_timer::console::{format_ranges, format_tasks};
use annual_timer::*;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Schedule file, overriding the settings
    #[arg(short, long)]
    schedule: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List date ranges
    Ranges,
    /// Add a date range
    AddRange {
        /// Start (MM-DD)
        #[arg(long)]
        start: String,
        /// End (MM-DD); before the start means the range wraps into the new year
        #[arg(long)]
        end: String,
    },
    /// Change the dates of a range, keeping its tasks
    UpdateRange {
        /// Range index
        #[arg(short, long)]
        range: usize,
        /// Start (MM-DD)
        #[arg(long)]
        start: String,
        /// End (MM-DD)
        #[arg(long)]
        end: String,
    },
    /// Delete a range and its tasks
    DeleteRange {
        /// Range index
        #[arg(short, long)]
        range: usize,
    },
    /// Show the tasks of a range, earliest first
    Tasks {
        /// Range index
        #[arg(short, long, default_value_t = 0)]
        range: usize,
    },
    /// Add a task to a range
    AddTask {
        /// Range index
        #[arg(short, long, default_value_t = 0)]
        range: usize,
        /// Start time (HH:MM)
        #[arg(short, long, default_value = "08:00")]
        time: String,
        /// Duration in minutes
        #[arg(short, long, default_value_t = 45, allow_negative_numbers = true)]
        duration: i64,
    },
    /// Replace a task (index as shown by `tasks`)
    UpdateTask {
        /// Range index
        #[arg(short, long, default_value_t = 0)]
        range: usize,
        /// Task index
        #[arg(short = 'i', long)]
        task: usize,
        /// Start time (HH:MM)
        #[arg(short, long)]
        time: String,
        /// Duration in minutes
        #[arg(short, long, allow_negative_numbers = true)]
        duration: i64,
    },
    /// Delete a task (index as shown by `tasks`)
    DeleteTask {
        /// Range index
        #[arg(short, long, default_value_t = 0)]
        range: usize,
        /// Task index
        #[arg(short = 'i', long)]
        task: usize,
    },
    /// Report overlaps in a hand-edited schedule file
    Check,
    /// List serial ports
    Ports,
    /// Upload the tasks of a range to the clock
    Sync {
        /// Serial port, overriding the settings
        #[arg(short, long)]
        port: Option<String>,
        /// Range index
        #[arg(short, long, default_value_t = 0)]
        range: usize,
    },
    /// Send WiFi credentials to the clock and remember them
    Wifi {
        /// Serial port, overriding the settings
        #[arg(short, long)]
        port: Option<String>,
        /// Network name; defaults to the remembered one
        #[arg(long)]
        ssid: Option<String>,
        /// Network password; defaults to the remembered one
        #[arg(long)]
        password: Option<String>,
    },
    /// Toggle the clock between clock and countdown mode
    SwitchMode {
        /// Serial port, overriding the settings
        #[arg(short, long)]
        port: Option<String>,
    },
}

#[tokio::main]
#[instrument]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| EnvFilter::new("annual_timer=info")),
        )
        .compact()
        .init();

    color_eyre::install()?;

    let cli = Cli::parse();
    debug!("Parsed command line arguments");

    let mut settings = Settings::load(&cli.config)?;
    if let Some(schedule) = cli.schedule {
        settings.schedule_path = schedule;
    }

    match cli.command.unwrap_or(Commands::Ranges) {
        Commands::Ranges => {
            let store = open_store(&settings.schedule_path)?;
            if store.is_empty() {
                println!("No date ranges");
            } else {
                println!("{}", format_ranges(&store));
            }
        }
        Commands::AddRange { start, end } => {
            let mut store = open_store(&settings.schedule_path)?;
            let index = store.add_range(&start, &end)?;
            save_schedule(&settings.schedule_path, &store)?;
            println!("Added range #{index} {}", store.range(index)?);
        }
        Commands::UpdateRange { range, start, end } => {
            let mut store = open_store(&settings.schedule_path)?;
            store.update_range_dates(range, &start, &end)?;
            save_schedule(&settings.schedule_path, &store)?;
            println!("Range #{range} is now {}", store.range(range)?);
        }
        Commands::DeleteRange { range } => {
            let mut store = open_store(&settings.schedule_path)?;
            store.delete_range(range)?;
            save_schedule(&settings.schedule_path, &store)?;
            println!("Deleted range #{range}");
        }
        Commands::Tasks { range } => {
            let store = open_store(&settings.schedule_path)?;
            let range = store.range(range)?;
            println!("{range}");
            println!("{}", format_tasks(range));
        }
        Commands::AddTask {
            range,
            time,
            duration,
        } => {
            let mut store = open_store(&settings.schedule_path)?;
            let task = store.add_task(range, &time, duration)?;
            save_schedule(&settings.schedule_path, &store)?;
            println!("Added task #{task} to range #{range}");
        }
        Commands::UpdateTask {
            range,
            task,
            time,
            duration,
        } => {
            let mut store = open_store(&settings.schedule_path)?;
            store.update_task(range, task, &time, duration)?;
            save_schedule(&settings.schedule_path, &store)?;
            println!("Updated task #{task} of range #{range}");
        }
        Commands::DeleteTask { range, task } => {
            let mut store = open_store(&settings.schedule_path)?;
            store.delete_task(range, task)?;
            save_schedule(&settings.schedule_path, &store)?;
            println!("Deleted task #{task} of range #{range}");
        }
        Commands::Check => {
            let store = open_store(&settings.schedule_path)?;
            let violations = store.violations();
            for violation in &violations {
                println!("{violation}");
            }
            if !violations.is_empty() {
                return Err(eyre!("{} problems found", violations.len()));
            }
            println!("Schedule is consistent");
        }
        Commands::Ports => {
            for port in available_ports()? {
                println!("{port}");
            }
        }
        Commands::Sync { port, range } => {
            let mut store = open_store(&settings.schedule_path)?;
            store.select(range)?;
            let mut device = connect(port, &settings)?;
            let result = device.sync_selected(&store).await;
            device.close().await?;
            println!("Synchronized {} tasks", result?);
        }
        Commands::Wifi {
            port,
            ssid,
            password,
        } => {
            let remembered = load_wifi(&settings.wifi_path)?;
            let credentials = match (ssid, password, remembered) {
                (Some(ssid), password, remembered) => {
                    let password = password
                        .or(remembered.map(|r| r.password))
                        .unwrap_or_default();
                    WifiCredentials::new(&ssid, &password)
                }
                (None, _, Some(remembered)) => remembered,
                (None, _, None) => return Err(eyre!("No SSID given and none remembered")),
            };

            let mut device = connect(port, &settings)?;
            let result =
                send_wifi_and_remember(&mut device, &credentials, &settings.wifi_path).await;
            device.close().await?;
            result?;
            println!("WiFi credentials sent for '{}'", credentials.ssid);
        }
        Commands::SwitchMode { port } => {
            let mut device = connect(port, &settings)?;
            let result = device.switch_mode().await;
            device.close().await?;
            result?;
            println!("Mode switch sent");
        }
    }

    Ok(())
}

/// Loads the schedule file, starting empty when there is none
#[instrument]
fn open_store(path: &Path) -> Result<ScheduleStore> {
    match load_schedule(path) {
        Ok(Some(store)) => Ok(store),
        Ok(None) => Ok(ScheduleStore::new()),
        Err(e) => {
            error!("Failed to load schedule: {}", e);
            Err(e.into())
        }
    }
}

/// Opens the serial link named on the command line or in the settings
#[instrument(skip(settings))]
fn connect(port: Option<String>, settings: &Settings) -> Result<ClockDevice<SerialLink>> {
    let port = port
        .or_else(|| settings.serial.port.clone())
        .ok_or_else(|| eyre!("No serial port given; see `atimer ports`"))?;

    info!("Opening {} at {} baud", port, settings.serial.baud_rate);
    let link = SerialLink::open(&port, &settings.serial).map_err(|e| {
        warn!("Could not open {}: {}", port, e);
        e
    })?;

    Ok(ClockDevice::new(link, settings.sync.clone()))
}
