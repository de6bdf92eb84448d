use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    error::FetchError,
    model::{
        AqiSnapshot, Condition, Coordinate, Pollutants, Temperature, Units, WeatherSnapshot, Wind,
    },
};

use super::{AqiFetcher, WeatherFetcher, validate_coordinate, validate_place_name};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// OpenWeatherMap client serving both the weather and the air pollution feed.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one GET and return the body of a 2xx response.
    ///
    /// `not_found_is_miss` turns a 404 into [`FetchError::NotFound`]; otherwise
    /// it is reported like any other upstream status.
    async fn get(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        not_found_is_miss: bool,
    ) -> Result<String, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    FetchError::InvalidRequest(e.to_string())
                } else {
                    FetchError::TransportFailure(e.to_string())
                }
            })?;

        let status = res.status();
        debug!(endpoint, status = %status, "OpenWeather responded");

        if status == StatusCode::NOT_FOUND && not_found_is_miss {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::UpstreamError(status.as_u16()));
        }

        let body = res
            .text()
            .await
            .map_err(|e| FetchError::TransportFailure(e.to_string()))?;

        if body.trim().is_empty() {
            return Err(FetchError::EmptyResponse);
        }

        Ok(body)
    }

    async fn fetch_weather(
        &self,
        mut query: Vec<(&str, String)>,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        query.push(("units", units.as_str().to_string()));

        let body = self.get("weather", &query, true).await?;
        let parsed: OwCurrentResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        parsed.into_snapshot()
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: i64,
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: u32,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    coord: Option<OwCoord>,
    dt: i64,
    #[serde(default)]
    timezone: i32,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: OwSys,
}

impl OwCurrentResponse {
    fn into_snapshot(self) -> Result<WeatherSnapshot, FetchError> {
        let primary = self.weather.into_iter().next().ok_or_else(|| {
            FetchError::MalformedResponse("weather list contained no condition".to_string())
        })?;

        Ok(WeatherSnapshot {
            place_name: self.name,
            country: self.sys.country,
            coordinate: self.coord.map(|c| Coordinate::new(c.lat, c.lon)),
            condition: Condition {
                code: primary.id,
                main: primary.main,
                description: primary.description,
            },
            temperature: Temperature {
                current: self.main.temp,
                min: self.main.temp_min,
                max: self.main.temp_max,
                feels_like: self.main.feels_like,
            },
            humidity_pct: self.main.humidity,
            pressure_hpa: self.main.pressure,
            wind: Wind {
                speed: self.wind.speed,
                direction_deg: self.wind.deg,
            },
            sunrise: self.sys.sunrise,
            sunset: self.sys.sunset,
            utc_offset_secs: self.timezone,
            observed_at: self.dt,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwAirMain {
    aqi: u8,
}

#[derive(Debug, Deserialize)]
struct OwComponents {
    co: f64,
    no: f64,
    no2: f64,
    o3: f64,
    so2: f64,
    pm2_5: f64,
    pm10: f64,
    nh3: f64,
}

#[derive(Debug, Deserialize)]
struct OwAirItem {
    main: OwAirMain,
    components: Option<OwComponents>,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct OwAirResponse {
    list: Vec<OwAirItem>,
}

impl OwAirResponse {
    fn into_snapshot(self) -> Result<AqiSnapshot, FetchError> {
        let item = self.list.into_iter().next().ok_or_else(|| {
            FetchError::MalformedResponse("air pollution list was empty".to_string())
        })?;

        if !(1..=5).contains(&item.main.aqi) {
            return Err(FetchError::MalformedResponse(format!(
                "air quality index {} outside 1..=5",
                item.main.aqi
            )));
        }

        Ok(AqiSnapshot {
            index: item.main.aqi,
            pollutants: item.components.map(|c| Pollutants {
                co: c.co,
                no: c.no,
                no2: c.no2,
                o3: c.o3,
                so2: c.so2,
                pm2_5: c.pm2_5,
                pm10: c.pm10,
                nh3: c.nh3,
            }),
            measured_at: item.dt,
        })
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherClient {
    async fn fetch_by_coordinates(
        &self,
        coordinate: Coordinate,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        validate_coordinate(coordinate)?;
        info!(%coordinate, %units, "Fetching weather by coordinates");

        self.fetch_weather(
            vec![
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
            ],
            units,
        )
        .await
    }

    async fn fetch_by_place_name(
        &self,
        name: &str,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        let name = validate_place_name(name)?;
        info!(place = name, %units, "Fetching weather by place name");

        self.fetch_weather(vec![("q", name.to_string())], units).await
    }
}

#[async_trait]
impl AqiFetcher for OpenWeatherClient {
    async fn fetch_by_coordinates(
        &self,
        coordinate: Coordinate,
    ) -> Result<AqiSnapshot, FetchError> {
        validate_coordinate(coordinate)?;
        info!(%coordinate, "Fetching air quality");

        let query = [
            ("lat", coordinate.latitude.to_string()),
            ("lon", coordinate.longitude.to_string()),
        ];
        let body = self.get("air_pollution", &query, false).await?;
        let parsed: OwAirResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        parsed.into_snapshot()
    }
}
