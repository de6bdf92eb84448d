//! The `Horizon` facade that front ends drive.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    Config,
    error::FetchError,
    freshness::{Clock, SystemClock},
    location::{LocationCoordinator, LocationProvider},
    model::{AqiSnapshot, Coordinate, WeatherQuery, WeatherSnapshot},
    orchestrator::{
        AqiOrchestrator, AqiSource, FeedState, FetchOutcome, Orchestrator, WeatherOrchestrator,
        WeatherSource,
    },
    provider::{AqiFetcher, WeatherFetcher, client_from_config},
    store::PreferenceStore,
};

/// Everything the presentation layer talks to, wired around one shared store.
pub struct Horizon {
    store: Arc<PreferenceStore>,
    weather_fetcher: Arc<dyn WeatherFetcher>,
    weather: Arc<WeatherOrchestrator>,
    aqi: Arc<AqiOrchestrator>,
}

impl Horizon {
    /// Build against the OpenWeather API and the on-disk preference store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(client_from_config(config)?);
        let path = Config::store_file_path()?;
        let store = PreferenceStore::open(&path)
            .with_context(|| format!("Failed to open preference store: {}", path.display()))?;

        Ok(Self::new(
            Arc::new(store),
            client.clone(),
            client,
            Arc::new(SystemClock),
        ))
    }

    pub fn new(
        store: Arc<PreferenceStore>,
        weather_fetcher: Arc<dyn WeatherFetcher>,
        aqi_fetcher: Arc<dyn AqiFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let weather = Arc::new(Orchestrator::new(
            WeatherSource::new(weather_fetcher.clone(), store.clone()),
            store.clone(),
            clock.clone(),
        ));
        let aqi = Arc::new(Orchestrator::new(
            AqiSource::new(aqi_fetcher),
            store.clone(),
            clock,
        ));

        Self {
            store,
            weather_fetcher,
            weather,
            aqi,
        }
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.store
    }

    pub fn weather(&self) -> &Arc<WeatherOrchestrator> {
        &self.weather
    }

    pub fn aqi(&self) -> &Arc<AqiOrchestrator> {
        &self.aqi
    }

    pub fn weather_state(&self) -> FeedState<WeatherSnapshot> {
        self.weather.state()
    }

    pub fn aqi_state(&self) -> FeedState<AqiSnapshot> {
        self.aqi.state()
    }

    pub async fn fetch_weather(
        &self,
        query: WeatherQuery,
        force_refresh: bool,
    ) -> FetchOutcome<WeatherSnapshot> {
        self.weather.request_data(query, force_refresh).await
    }

    pub async fn fetch_aqi(
        &self,
        coordinate: Coordinate,
        force_refresh: bool,
    ) -> FetchOutcome<AqiSnapshot> {
        self.aqi.request_data(coordinate, force_refresh).await
    }

    /// True if the stored weather record holds a snapshot for `query`.
    ///
    /// The record is kept per feed, so a fresh record may belong to another
    /// place; callers that switch places force a refetch when this is false.
    pub fn has_cached_weather_for(&self, query: &WeatherQuery) -> bool {
        self.weather
            .record()
            .cached_payload()
            .is_some_and(|snapshot| snapshot.answers(query))
    }

    /// Fetch weather for the saved default city, if one is set.
    pub async fn refresh_default_city(
        &self,
        force_refresh: bool,
    ) -> Option<FetchOutcome<WeatherSnapshot>> {
        let query = WeatherQuery::Place(self.store.default_city()?);
        let force_refresh = force_refresh || !self.has_cached_weather_for(&query);
        Some(self.fetch_weather(query, force_refresh).await)
    }

    /// One-off lookup for a city search; bypasses and never touches the cache.
    pub async fn search_weather(&self, city: &str) -> Result<WeatherSnapshot, FetchError> {
        let units = self.store.units();
        info!(city, %units, "Searching weather");
        self.weather_fetcher.fetch_by_place_name(city, units).await
    }

    /// Coordinator that refreshes both feeds whenever `provider` reports a fix.
    pub fn location_coordinator(&self, provider: Arc<dyn LocationProvider>) -> LocationCoordinator {
        LocationCoordinator::new(provider, self.weather.clone(), self.aqi.clone())
    }
}
