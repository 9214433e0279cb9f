use std::{sync::Arc, time::Duration};

use anyhow::{Context, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::{InquireError, Password, PasswordDisplayMode, Select, Text};
use tracing::debug;
use weather_core::{
    Config, ConnectivityProvider, ManualConnectivity, Outcome, ProbeConnectivity,
    SearchController, Units, WeatherResult,
};

/// How often the interactive session re-probes connectivity.
const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather by city name")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and preferred units.
    Configure,

    /// Show the current weather for a city.
    Show {
        /// City name, e.g. "Paris" or "New York".
        city: String,

        /// Skip the connectivity probe and assume the network is up.
        #[arg(long)]
        assume_online: bool,
    },

    /// Search repeatedly until Esc or Ctrl-C.
    Interactive,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, assume_online } => show(&city, assume_online).await,
            Command::Interactive => interactive().await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }
    config.set_api_key(api_key.trim().to_string());

    let current = Units::all().iter().position(|u| *u == config.units).unwrap_or(0);
    config.units = Select::new("Units:", Units::all().to_vec())
        .with_starting_cursor(current)
        .prompt()
        .context("Failed to read units")?;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}

async fn show(city: &str, assume_online: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = Arc::new(config.provider()?);

    let connectivity: Arc<dyn ConnectivityProvider> = if assume_online {
        Arc::new(ManualConnectivity::new(true))
    } else {
        Arc::new(ProbeConnectivity::new(config.probe_target()))
    };

    let controller = SearchController::new(provider, connectivity);

    match controller.search(city).await {
        Outcome::Succeeded(result) => {
            print_result(&result, config.units);
            Ok(())
        }
        Outcome::Rejected(err) | Outcome::Failed(err) => bail!("{err}"),
        Outcome::Superseded => bail!("Search for {city} was superseded"),
    }
}

async fn interactive() -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = Arc::new(config.provider()?);

    let mut probe = ProbeConnectivity::new(config.probe_target());
    probe.spawn(PROBE_INTERVAL);

    let controller = SearchController::new(provider, Arc::new(probe));
    let guard = controller.attach();
    debug!(probe_target = %config.probe_target(), "interactive session started");

    let session = prompt_loop(&controller, config.units).await;
    guard.detach().await;
    debug!("interactive session ended");

    session
}

async fn prompt_loop(controller: &SearchController, units: Units) -> anyhow::Result<()> {
    loop {
        if !controller.state().connected {
            println!("(offline)");
        }

        let city = match Text::new("City:")
            .with_initial_value(&controller.state().query)
            .with_help_message("Esc or Ctrl-C to quit")
            .prompt()
        {
            Ok(city) => city,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to read city"),
        };

        match controller.search(&city).await {
            Outcome::Succeeded(result) => print_result(&result, units),
            Outcome::Rejected(err) | Outcome::Failed(err) => println!("{err}"),
            Outcome::Superseded => {}
        }
    }
}

fn print_result(result: &WeatherResult, units: Units) {
    let suffix = units.temperature_suffix();

    println!("{}", result.location);
    println!(
        "{:.0}{suffix}  {}  [{}]",
        result.temperature,
        result.description,
        result.icon()
    );
    println!("H:{:.0}{suffix} L:{:.0}{suffix}", result.temp_max, result.temp_min);

    if let Some(observed) = result.observed_at {
        println!("Observed {}", observed.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    }
}
