use std::env;
use std::path::Path;

use annual_timer::config::DEFAULT_CONFIG_PATH;
use annual_timer::console::{run_store_command, ConsoleCommand};
use annual_timer::*;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Reply body followed by `OK`; an empty body prints `OK` alone
fn reply(text: &str) -> String {
    if text.is_empty() {
        "OK".to_string()
    } else {
        format!("{text}\nOK")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Replies go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| EnvFilter::new("annual_timer=warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    // Get the serial port (and optional settings file) from the command line.
    let usage = "Usage: atimerd <serial port> [settings.toml]";
    let args: Vec<_> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{usage}");
        std::process::exit(1);
    }
    if args[1] == "-h" || args[1] == "--help" {
        eprintln!("{usage}");
        std::process::exit(0);
    }
    let config_path = args.get(2).map_or(DEFAULT_CONFIG_PATH, String::as_str);
    let settings = Settings::load(Path::new(config_path))?;

    let mut store = match load_schedule(&settings.schedule_path) {
        Ok(Some(store)) => store,
        Ok(None) => ScheduleStore::new(),
        Err(e) => {
            // A later `save` overwrites the unreadable file
            error!("Schedule not loaded: {}", e);
            println!("WARN schedule not loaded: {e}");
            ScheduleStore::new()
        }
    };
    if !store.is_empty() {
        store.select(0)?;
    }

    let link = SerialLink::open(&args[1], &settings.serial)?;
    let mut device = ClockDevice::new(link, settings.sync.clone());

    // Inform about successful initialization
    println!("OK");

    // Mainloop: one command per line until EOF, `quit` or Ctrl-C
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };

        let command = match ConsoleCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("ERR {e}");
                continue;
            }
        };

        if let Some(result) = run_store_command(&mut store, &command) {
            match result {
                Ok(text) => println!("{}", reply(&text)),
                Err(e) => println!("ERR {e}"),
            }
            continue;
        }

        let result = match command {
            ConsoleCommand::Save => save_schedule(&settings.schedule_path, &store)
                .map(|_| format!("saved {} ranges", store.len())),
            ConsoleCommand::Sync => device
                .sync_selected(&store)
                .await
                .map(|sent| format!("sent {sent} tasks")),
            ConsoleCommand::Wifi { ssid, password } => {
                let credentials = WifiCredentials::new(&ssid, &password);
                send_wifi_and_remember(&mut device, &credentials, &settings.wifi_path)
                    .await
                    .map(|_| "wifi sent".to_string())
            }
            ConsoleCommand::SwitchMode => device
                .switch_mode()
                .await
                .map(|_| "mode switch sent".to_string()),
            ConsoleCommand::Quit => break,
            _ => continue,
        };

        match result {
            Ok(text) => println!("{}", reply(&text)),
            Err(e) => {
                if e.is_transport() {
                    warn!("Device command failed, link kept open: {}", e);
                }
                println!("ERR {e}");
            }
        }
    }

    device.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_listing_replies_ok_only() {
        assert_eq!(reply(""), "OK");
        assert_eq!(reply("#0 08:00   45 min -> 08:45"), "#0 08:00   45 min -> 08:45\nOK");
    }
}
