//! AP binding tool for AirWater devices
//!
//! Scans for nearby BLE devices and binds the chosen one to a Wi-Fi network.

use airwater_ble_controller::BindConfig;
use airwater_ble_controller::ble::{self, DiscoveredDevice};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "airwater-ble")]
#[command(about = "Bind AirWater devices to a Wi-Fi access point over BLE")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List nearby BLE devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Send Wi-Fi credentials to a device
    Bind {
        /// Device name or address to connect to; prompts for a choice when omitted
        #[arg(short, long)]
        device: Option<String>,
        /// Wi-Fi network name
        #[arg(long, requires = "password")]
        ssid: Option<String>,
        /// Wi-Fi password
        #[arg(long, requires = "ssid")]
        password: Option<String>,
        /// Wi-Fi credentials file (SSID on line 1, password on line 2), used without --ssid
        #[arg(short, long, default_value = "wifi_credentials.txt")]
        file: String,
        /// Scan duration in seconds
        #[arg(long, default_value = "5")]
        scan_duration: u64,
        /// Interval between completion checks, in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,
        /// Number of completion checks before giving up
        #[arg(long)]
        poll_attempts: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { duration } => {
            let devices = scan_devices(Duration::from_secs(duration)).await?;
            if devices.is_empty() {
                log::error!("No BLE devices found.");
            }
        }
        Commands::Bind {
            device,
            ssid,
            password,
            file,
            scan_duration,
            poll_interval_ms,
            poll_attempts,
        } => {
            let (ssid, password) = match (ssid, password) {
                (Some(ssid), Some(password)) => (ssid, password),
                _ => read_wifi_credentials(&file)?,
            };

            let mut config = BindConfig::default();
            if let Some(ms) = poll_interval_ms {
                config.poll_interval = Duration::from_millis(ms);
            }
            if let Some(attempts) = poll_attempts {
                config.poll_attempts = attempts;
            }

            let scan_duration = Duration::from_secs(scan_duration);
            let target = match device {
                Some(pattern) => {
                    println!("Scanning for {}...", pattern);
                    ble::find_device(&pattern, scan_duration).await?
                }
                None => {
                    let devices = scan_devices(scan_duration).await?;
                    if devices.is_empty() {
                        log::error!("No BLE devices found.");
                        return Ok(());
                    }
                    choose_device(devices)?
                }
            };

            match ble::provision(&target.peripheral, &ssid, &password, &config).await {
                Ok(()) => println!("AP binding was successful for {}!", target.name),
                Err(e) => {
                    println!("Failed to bind AP to {}. Error: {}", target.name, e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn read_wifi_credentials(file: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    parse_wifi_credentials(&content)
}

fn parse_wifi_credentials(content: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let mut lines = content.lines();
    let ssid = lines.next().ok_or("Missing SSID in credentials file")?.trim().to_string();
    let password = lines.next().ok_or("Missing password in credentials file")?.trim().to_string();
    Ok((ssid, password))
}

async fn scan_devices(
    duration: Duration,
) -> Result<Vec<DiscoveredDevice>, Box<dyn std::error::Error>> {
    println!("Scanning for BLE devices ({} seconds)...", duration.as_secs());
    let devices = ble::scan(duration).await?;

    if !devices.is_empty() {
        println!("Found the following BLE devices:");
    }
    for (i, device) in devices.iter().enumerate() {
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        println!("{}: {} ({}) RSSI: {}", i + 1, device.name, device.address, rssi);
    }

    Ok(devices)
}

/// Prompt until the user picks one of the listed devices
fn choose_device(
    mut devices: Vec<DiscoveredDevice>,
) -> Result<DiscoveredDevice, Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("Please choose a device by number (1-{}): ", devices.len());
        io::stdout().flush()?;

        let line = lines.next().ok_or("No device selected")??;
        match parse_choice(&line, devices.len()) {
            Ok(index) => return Ok(devices.swap_remove(index)),
            Err(message) => println!("{}", message),
        }
    }
}

/// Map a 1-based menu choice to an index into a list of `count` devices.
fn parse_choice(input: &str, count: usize) -> Result<usize, &'static str> {
    let choice: usize = input
        .trim()
        .parse()
        .map_err(|_| "Invalid input. Please enter a number.")?;
    if (1..=count).contains(&choice) {
        Ok(choice - 1)
    } else {
        Err("Invalid choice. Please select a valid number.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_file_is_two_lines() {
        let (ssid, password) = parse_wifi_credentials("Home\nsecret12\n").unwrap();
        assert_eq!(ssid, "Home");
        assert_eq!(password, "secret12");

        let (ssid, password) = parse_wifi_credentials("  Home  \r\n secret12 ").unwrap();
        assert_eq!(ssid, "Home");
        assert_eq!(password, "secret12");

        assert!(parse_wifi_credentials("Home").is_err());
        assert!(parse_wifi_credentials("").is_err());
    }

    #[test]
    fn menu_choice_is_one_based() {
        assert_eq!(parse_choice("1", 3), Ok(0));
        assert_eq!(parse_choice(" 3\n", 3), Ok(2));
        assert_eq!(
            parse_choice("0", 3),
            Err("Invalid choice. Please select a valid number.")
        );
        assert_eq!(
            parse_choice("4", 3),
            Err("Invalid choice. Please select a valid number.")
        );
        assert_eq!(parse_choice("two", 3), Err("Invalid input. Please enter a number."));
    }
}
