use crate::{
    Config,
    error::FetchError,
    model::{AqiSnapshot, Coordinate, Units, WeatherSnapshot},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Current-weather lookups. One attempt per call, no retries.
#[async_trait]
pub trait WeatherFetcher: Send + Sync + Debug {
    async fn fetch_by_coordinates(
        &self,
        coordinate: Coordinate,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError>;

    async fn fetch_by_place_name(
        &self,
        name: &str,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError>;
}

/// Air-quality lookups. One attempt per call, no retries.
#[async_trait]
pub trait AqiFetcher: Send + Sync + Debug {
    async fn fetch_by_coordinates(&self, coordinate: Coordinate)
    -> Result<AqiSnapshot, FetchError>;
}

/// Construct the OpenWeather client from config.
pub fn client_from_config(config: &Config) -> anyhow::Result<OpenWeatherClient> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured.\n\
                 Hint: run `horizon configure` and enter your OpenWeather API key."
        )
    })?;

    match config.base_url.as_deref() {
        Some(base_url) => OpenWeatherClient::with_base_url(api_key.to_owned(), base_url),
        None => OpenWeatherClient::new(api_key.to_owned()),
    }
}

pub(crate) fn validate_coordinate(coordinate: Coordinate) -> Result<(), FetchError> {
    if coordinate.is_valid() {
        Ok(())
    } else {
        Err(FetchError::InvalidRequest(format!(
            "coordinate out of range: {}, {}",
            coordinate.latitude, coordinate.longitude
        )))
    }
}

pub(crate) fn validate_place_name(name: &str) -> Result<&str, FetchError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(FetchError::InvalidRequest("place name is empty".to_string()))
    } else {
        Ok(trimmed)
    }
}
