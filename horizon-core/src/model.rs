use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Unit system sent to the weather endpoint as `units=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial]
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow!(
                "Unknown unit system '{value}'. Supported values: metric, imperial."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180], both finite.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

/// What the weather feed is asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    Coordinate(Coordinate),
    Place(String),
}

impl From<Coordinate> for WeatherQuery {
    fn from(coordinate: Coordinate) -> Self {
        WeatherQuery::Coordinate(coordinate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub code: i64,
    pub main: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub feels_like: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub direction_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub place_name: String,
    pub country: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub condition: Condition,
    pub temperature: Temperature,
    pub humidity_pct: u8,
    pub pressure_hpa: u32,
    pub wind: Wind,
    pub sunrise: i64,
    pub sunset: i64,
    pub utc_offset_secs: i32,
    pub observed_at: i64,
}

/// Two positions closer than this (in degrees, on both axes) are one place.
const SAME_PLACE_DEGREES: f64 = 0.01;

impl WeatherSnapshot {
    /// Whether this snapshot is the weather `query` asked for.
    ///
    /// Places compare by city name (ignoring case and any `,country` suffix);
    /// coordinates compare against the position the API reported.
    pub fn answers(&self, query: &WeatherQuery) -> bool {
        match query {
            WeatherQuery::Place(name) => {
                let city = name.split(',').next().unwrap_or_default().trim();
                !city.is_empty() && city.eq_ignore_ascii_case(self.place_name.trim())
            }
            WeatherQuery::Coordinate(wanted) => self.coordinate.is_some_and(|at| {
                (at.latitude - wanted.latitude).abs() < SAME_PLACE_DEGREES
                    && (at.longitude - wanted.longitude).abs() < SAME_PLACE_DEGREES
            }),
        }
    }
}

/// Pollutant concentrations in μg/m³.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    pub co: f64,
    pub no: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub pm2_5: f64,
    pub pm10: f64,
    pub nh3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiSnapshot {
    pub index: u8,
    pub pollutants: Option<Pollutants>,
    pub measured_at: i64,
}

impl AqiSnapshot {
    pub fn level(&self) -> Option<AqiLevel> {
        AqiLevel::from_index(self.index)
    }
}

/// Qualitative reading of the 1-5 air quality index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AqiLevel {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

impl AqiLevel {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(AqiLevel::Good),
            2 => Some(AqiLevel::Fair),
            3 => Some(AqiLevel::Moderate),
            4 => Some(AqiLevel::Poor),
            5 => Some(AqiLevel::VeryPoor),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiLevel::Good => "Good",
            AqiLevel::Fair => "Fair",
            AqiLevel::Moderate => "Moderate",
            AqiLevel::Poor => "Poor",
            AqiLevel::VeryPoor => "Very Poor",
        }
    }
}
