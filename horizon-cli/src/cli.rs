use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, NaiveTime};
use clap::{Parser, Subcommand};
use horizon_core::{
    AqiSnapshot, Config, Coordinate, FeedState, FetchOutcome, Horizon, PreferenceStore, Units,
    WeatherQuery, WeatherSnapshot, location::FixedLocationProvider,
};
use tokio::sync::mpsc;
use tracing::debug;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "horizon", version, about = "Weather and air quality at a glance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and, optionally, a fallback position.
    Configure {
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Show current weather and air quality.
    Show {
        /// City name; when absent, the position from --lat/--lon or config is used.
        #[arg(long)]
        city: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Ignore cached data younger than an hour.
        #[arg(long)]
        refresh: bool,
    },

    /// Look up a city without touching the cache.
    Search { city: String },

    /// View or change preferences.
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PrefsAction {
    /// Set the unit system: metric or imperial.
    Units { units: String },

    /// Set or clear the default city.
    City {
        name: Option<String>,
        #[arg(long, conflicts_with = "name")]
        clear: bool,
    },

    /// Turn the daily notification on or off.
    Notify {
        #[arg(value_parser = ["on", "off"])]
        state: String,

        /// Time of day, HH:MM.
        #[arg(long)]
        time: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { lat, lon } => configure(lat, lon),
            Command::Show {
                city,
                lat,
                lon,
                refresh,
            } => {
                let config = Config::load()?;
                let app = Horizon::from_config(&config)?;
                show(&app, &config, city, coordinate_arg(lat, lon)?, refresh).await
            }
            Command::Search { city } => {
                let app = Horizon::from_config(&Config::load()?)?;
                let units = app.preferences().units();
                match app.search_weather(&city).await {
                    Ok(snapshot) => {
                        print_weather(&snapshot, units);
                        Ok(())
                    }
                    Err(e) => Err(anyhow!(e.user_message())),
                }
            }
            Command::Prefs { action } => {
                let path = Config::store_file_path()?;
                let store = PreferenceStore::open(&path).with_context(|| {
                    format!("Failed to open preference store: {}", path.display())
                })?;
                prefs(&store, action)
            }
        }
    }
}

fn configure(lat: Option<f64>, lon: Option<f64>) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key);

    if let Some(coordinate) = coordinate_arg(lat, lon)? {
        config.set_default_coordinate(coordinate)?;
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn coordinate_arg(lat: Option<f64>, lon: Option<f64>) -> anyhow::Result<Option<Coordinate>> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            let coordinate = Coordinate::new(lat, lon);
            if !coordinate.is_valid() {
                bail!("Coordinate {lat}, {lon} is out of range.");
            }
            Ok(Some(coordinate))
        }
        (None, None) => Ok(None),
        _ => bail!("--lat and --lon must be given together."),
    }
}

async fn show(
    app: &Horizon,
    config: &Config,
    city: Option<String>,
    coordinate: Option<Coordinate>,
    refresh: bool,
) -> anyhow::Result<()> {
    let units = app.preferences().units();

    if let Some(city) = city {
        let query = WeatherQuery::Place(city);
        let refresh = refresh || !app.has_cached_weather_for(&query);
        app.fetch_weather(query, refresh).await;
        return report_weather(&app.weather_state(), units);
    }

    if let Some(coordinate) = coordinate.or_else(|| config.default_coordinate()) {
        let refresh = refresh || !app.has_cached_weather_for(&coordinate.into());
        return show_position(app, coordinate, refresh, units).await;
    }

    if app.refresh_default_city(refresh).await.is_some() {
        return report_weather(&app.weather_state(), units);
    }

    bail!(
        "No location to show.\n\
         Hint: pass --city or --lat/--lon, or run `horizon prefs city <name>`."
    )
}

/// Drive one location cycle with a fixed position and print both feeds.
async fn show_position(
    app: &Horizon,
    coordinate: Coordinate,
    refresh: bool,
    units: Units,
) -> anyhow::Result<()> {
    debug!(%coordinate, refresh, "Showing weather for position");
    let (tx, mut rx) = mpsc::channel(4);
    let coordinator =
        app.location_coordinator(Arc::new(FixedLocationProvider::new(coordinate, tx)));

    coordinator.request_location(refresh);
    while let Ok(event) = rx.try_recv() {
        if let Some(done) = coordinator.handle_event(event).await {
            let weather = report_weather(&app.weather_state(), units);
            report_aqi(&app.aqi_state(), &done.aqi);
            return weather;
        }
    }

    let state = coordinator.state();
    Err(anyhow!(
        state
            .error_message
            .unwrap_or_else(|| "Location unavailable.".to_string())
    ))
}

fn report_weather(state: &FeedState<WeatherSnapshot>, units: Units) -> anyhow::Result<()> {
    if let Some(snapshot) = &state.snapshot {
        print_weather(snapshot, units);
    }
    if state.is_offline && state.snapshot.is_some() {
        println!("(offline: showing cached data)");
    }
    match &state.error_message {
        Some(message) if state.snapshot.is_none() => Err(anyhow!(message.clone())),
        Some(message) => {
            eprintln!("{message}");
            Ok(())
        }
        None => Ok(()),
    }
}

fn report_aqi(state: &FeedState<AqiSnapshot>, outcome: &FetchOutcome<AqiSnapshot>) {
    match &state.snapshot {
        Some(snapshot) => print_aqi(snapshot),
        None => {
            if let Some(error) = outcome.error() {
                eprintln!("Air quality: {}", error.user_message());
            }
        }
    }
}

fn print_weather(snapshot: &WeatherSnapshot, units: Units) {
    let t = units.temperature_symbol();
    let place = match &snapshot.country {
        Some(country) => format!("{}, {}", snapshot.place_name, country),
        None => snapshot.place_name.clone(),
    };

    println!("{place}");
    println!(
        "  {:.0}{t}, {} (feels like {:.0}{t})",
        snapshot.temperature.current, snapshot.condition.description, snapshot.temperature.feels_like
    );
    println!(
        "  low {:.0}{t} / high {:.0}{t}, humidity {}%",
        snapshot.temperature.min, snapshot.temperature.max, snapshot.humidity_pct
    );
    println!(
        "  wind {:.1} {} from {:.0}°",
        snapshot.wind.speed,
        units.speed_symbol(),
        snapshot.wind.direction_deg
    );
    println!(
        "  sunrise {} / sunset {}",
        local_time(snapshot.sunrise, snapshot.utc_offset_secs),
        local_time(snapshot.sunset, snapshot.utc_offset_secs)
    );
}

fn print_aqi(snapshot: &AqiSnapshot) {
    let label = snapshot.level().map(|l| l.label()).unwrap_or("Unknown");
    println!("Air quality: {} ({label})", snapshot.index);
    if let Some(p) = &snapshot.pollutants {
        println!(
            "  PM2.5 {:.1}, PM10 {:.1}, O3 {:.1}, NO2 {:.1} μg/m³",
            p.pm2_5, p.pm10, p.o3, p.no2
        );
    }
}

/// Epoch seconds rendered as HH:MM in the place's own UTC offset.
fn local_time(epoch: i64, utc_offset_secs: i32) -> String {
    DateTime::from_timestamp(epoch + i64::from(utc_offset_secs), 0)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

fn prefs(store: &PreferenceStore, action: Option<PrefsAction>) -> anyhow::Result<()> {
    match action {
        None => {
            let prefs = store.preferences();
            println!("units:          {}", prefs.units);
            println!(
                "default city:   {}",
                prefs.default_city.as_deref().unwrap_or("(none)")
            );
            println!(
                "notifications:  {}",
                if prefs.notifications_enabled { "on" } else { "off" }
            );
            if let Some(time) = prefs.notification_time {
                println!("notify at:      {}", time.format("%H:%M"));
            }
        }
        Some(PrefsAction::Units { units }) => {
            store.set_units(Units::try_from(units.as_str())?)?;
        }
        Some(PrefsAction::City { name, clear }) => match (name, clear) {
            (_, true) => store.clear_default_city()?,
            (Some(name), false) if !name.trim().is_empty() => store.set_default_city(&name)?,
            _ => bail!("Give a city name or --clear."),
        },
        Some(PrefsAction::Notify { state, time }) => {
            store.set_notifications_enabled(state == "on")?;
            if let Some(time) = time {
                let time = NaiveTime::parse_from_str(&time, "%H:%M")
                    .with_context(|| format!("Invalid time '{time}', expected HH:MM"))?;
                store.set_notification_time(time)?;
            }
        }
    }

    Ok(())
}
