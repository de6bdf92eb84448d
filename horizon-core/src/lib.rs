//! Core library for the `horizon` weather client.
//!
//! This crate defines:
//! - Configuration and the persisted preference store
//! - OpenWeather fetchers for current weather and air quality
//! - Per-feed orchestrators that serve fresh cache, fetch, or fall back to
//!   stale data when offline
//! - The location coordinator that refreshes both feeds from one position fix
//!
//! It is used by `horizon-cli`, but any other front end can drive it through
//! [`Horizon`].

pub mod config;
pub mod error;
pub mod freshness;
pub mod location;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{FetchError, StoreError};
pub use freshness::{CACHE_TTL_SECS, is_fresh};
pub use location::{LocationCoordinator, LocationEvent, LocationProvider};
pub use model::{AqiSnapshot, Coordinate, Units, WeatherQuery, WeatherSnapshot};
pub use orchestrator::{FeedState, FetchOutcome, Phase};
pub use provider::{AqiFetcher, WeatherFetcher};
pub use service::Horizon;
pub use store::{Feed, FetchRecord, PreferenceStore, Preferences};
