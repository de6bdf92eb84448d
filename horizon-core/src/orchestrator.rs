//! Cached fetch with stale fallback, one instance per feed.
//!
//! An [`Orchestrator`] decides per request whether the stored record is fresh
//! enough to serve, otherwise calls its [`FeedSource`], persists the result and
//! publishes the outcome as [`FeedState`]. When a fetch fails the last stored
//! payload (of any age) is shown with the offline flag raised.
//!
//! Every request takes a new generation number. A fetch that completes after
//! a newer request was issued for the same feed is dropped without touching
//! the store or the published state.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::FetchError,
    freshness::{CACHE_TTL_SECS, Clock, is_fresh},
    model::{AqiSnapshot, Coordinate, WeatherQuery, WeatherSnapshot},
    provider::{AqiFetcher, WeatherFetcher},
    store::{Feed, FetchRecord, PreferenceStore},
};

/// One remote feed as seen by an orchestrator.
#[async_trait]
pub trait FeedSource: Send + Sync + Debug + 'static {
    type Query: Clone + Debug + Send + Sync + 'static;
    type Snapshot: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    const FEED: Feed;

    async fn fetch(&self, query: &Self::Query) -> Result<Self::Snapshot, FetchError>;
}

/// Current weather, in the unit system stored in preferences at request time.
#[derive(Debug, Clone)]
pub struct WeatherSource {
    fetcher: Arc<dyn WeatherFetcher>,
    store: Arc<PreferenceStore>,
}

impl WeatherSource {
    pub fn new(fetcher: Arc<dyn WeatherFetcher>, store: Arc<PreferenceStore>) -> Self {
        Self { fetcher, store }
    }
}

#[async_trait]
impl FeedSource for WeatherSource {
    type Query = WeatherQuery;
    type Snapshot = WeatherSnapshot;

    const FEED: Feed = Feed::Weather;

    async fn fetch(&self, query: &WeatherQuery) -> Result<WeatherSnapshot, FetchError> {
        let units = self.store.units();
        match query {
            WeatherQuery::Coordinate(coordinate) => {
                self.fetcher.fetch_by_coordinates(*coordinate, units).await
            }
            WeatherQuery::Place(name) => self.fetcher.fetch_by_place_name(name, units).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AqiSource {
    fetcher: Arc<dyn AqiFetcher>,
}

impl AqiSource {
    pub fn new(fetcher: Arc<dyn AqiFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl FeedSource for AqiSource {
    type Query = Coordinate;
    type Snapshot = AqiSnapshot;

    const FEED: Feed = Feed::Aqi;

    async fn fetch(&self, query: &Coordinate) -> Result<AqiSnapshot, FetchError> {
        self.fetcher.fetch_by_coordinates(*query).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// What the presentation layer renders for one feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState<T> {
    pub phase: Phase,
    pub snapshot: Option<T>,
    pub is_loading: bool,
    pub is_offline: bool,
    pub error_message: Option<String>,
}

impl<T> Default for FeedState<T> {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            snapshot: None,
            is_loading: false,
            is_offline: false,
            error_message: None,
        }
    }
}

/// Result of a single [`Orchestrator::request_data`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// Served from a fresh record without a network call.
    Cached(T),
    /// Fetched and stored.
    Fetched(T),
    /// Fetch failed; `fallback` is the stale payload now on display, if any.
    Failed { error: FetchError, fallback: Option<T> },
    /// A newer request for the same feed was issued while this one ran.
    Superseded,
}

impl<T> FetchOutcome<T> {
    /// The snapshot this request put on display.
    pub fn snapshot(&self) -> Option<&T> {
        match self {
            FetchOutcome::Cached(s) | FetchOutcome::Fetched(s) => Some(s),
            FetchOutcome::Failed { fallback, .. } => fallback.as_ref(),
            FetchOutcome::Superseded => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

pub struct Orchestrator<S: FeedSource> {
    source: S,
    store: Arc<PreferenceStore>,
    clock: Arc<dyn Clock>,
    ttl_secs: i64,
    generation: Mutex<u64>,
    state: watch::Sender<FeedState<S::Snapshot>>,
}

pub type WeatherOrchestrator = Orchestrator<WeatherSource>;
pub type AqiOrchestrator = Orchestrator<AqiSource>;

impl<S: FeedSource> Orchestrator<S> {
    pub fn new(source: S, store: Arc<PreferenceStore>, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            source,
            store,
            clock,
            ttl_secs: CACHE_TTL_SECS,
            generation: Mutex::new(0),
            state,
        }
    }

    pub fn feed(&self) -> Feed {
        S::FEED
    }

    /// Current published state.
    pub fn state(&self) -> FeedState<S::Snapshot> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<FeedState<S::Snapshot>> {
        self.state.subscribe()
    }

    /// The stored record for this feed.
    pub fn record(&self) -> FetchRecord<S::Snapshot> {
        self.store.load_record(S::FEED)
    }

    /// Serve the feed from cache when fresh, otherwise fetch it.
    ///
    /// `force_refresh` skips the freshness check. Fetch errors never escape:
    /// they end up in the published state and in [`FetchOutcome::Failed`].
    pub async fn request_data(
        &self,
        query: S::Query,
        force_refresh: bool,
    ) -> FetchOutcome<S::Snapshot> {
        let feed = S::FEED;
        let mut pending = {
            let mut generation = self.generation.lock();
            *generation += 1;
            let mut previous = Phase::Idle;
            self.state.send_modify(|state| {
                previous = state.phase;
                state.phase = Phase::Loading;
                state.is_loading = true;
                state.error_message = None;
            });
            PendingRequest {
                orchestrator: self,
                issued: *generation,
                previous,
                settled: false,
            }
        };
        let issued = pending.issued;

        if !force_refresh {
            let record = self.store.load_record::<S::Snapshot>(feed);
            let now = self.clock.now_epoch();

            if is_fresh(record.last_fetch_epoch(), now, self.ttl_secs) {
                if let Some(cached) = record.into_payload() {
                    debug!(feed = %feed, "Using cached data");
                    pending.settled = true;
                    return self
                        .if_current(issued, || {
                            self.publish_success(cached.clone());
                            FetchOutcome::Cached(cached)
                        })
                        .unwrap_or(FetchOutcome::Superseded);
                }
            }
        }

        info!(feed = %feed, force_refresh, ?query, "Fetching new data");
        let result = self.source.fetch(&query).await;
        pending.settled = true;
        let now = self.clock.now_epoch();

        // The store write stays under the generation lock: a superseded
        // result must never land on disk after a newer one.
        self.if_current(issued, || match result {
            Ok(snapshot) => {
                let record = FetchRecord::fetched(now, snapshot.clone());
                if let Err(e) = self.store.save_record(feed, &record) {
                    warn!(feed = %feed, error = %e, "Failed to persist fetch record");
                }
                self.publish_success(snapshot.clone());
                FetchOutcome::Fetched(snapshot)
            }
            Err(error) => self.publish_failure(error),
        })
        .unwrap_or_else(|| {
            debug!(feed = %feed, generation = issued, "Discarding superseded result");
            FetchOutcome::Superseded
        })
    }

    /// Run `apply` only if `issued` is still the latest generation, holding the
    /// generation lock so no newer request can start in between.
    fn if_current<R>(&self, issued: u64, apply: impl FnOnce() -> R) -> Option<R> {
        let generation = self.generation.lock();
        if *generation != issued {
            return None;
        }
        Some(apply())
    }

    /// Leave `Loading` for a request whose future was dropped before it
    /// finished, unless a newer request owns the state by now.
    fn abandon(&self, issued: u64, previous: Phase) {
        let abandoned = self.if_current(issued, || {
            self.state.send_modify(|state| {
                state.phase = previous;
                state.is_loading = false;
            });
        });
        if abandoned.is_some() {
            let feed = S::FEED;
            debug!(feed = %feed, generation = issued, "Request dropped before completion");
        }
    }

    fn publish_success(&self, snapshot: S::Snapshot) {
        self.state.send_modify(|state| {
            state.phase = Phase::Succeeded;
            state.snapshot = Some(snapshot);
            state.is_loading = false;
            state.is_offline = false;
            state.error_message = None;
        });
    }

    fn publish_failure(&self, error: FetchError) -> FetchOutcome<S::Snapshot> {
        let feed = S::FEED;
        let message = error.user_message();

        // A lookup rejected by the service says nothing about connectivity,
        // and another place's cached data must not stand in for it.
        let (fallback, offline) = if error.is_request_specific() {
            warn!(feed = %feed, error = %error, "Request rejected");
            (None, false)
        } else {
            let fallback = self.store.load_record::<S::Snapshot>(feed).into_payload();
            warn!(
                feed = %feed,
                error = %error,
                has_fallback = fallback.is_some(),
                "Fetch failed, falling back to cached data"
            );
            (fallback, true)
        };

        self.state.send_modify(|state| {
            state.phase = Phase::Failed;
            state.snapshot = fallback.clone();
            state.is_loading = false;
            state.is_offline = offline;
            state.error_message = Some(message);
        });

        FetchOutcome::Failed { error, fallback }
    }
}

/// In-flight request; rolls the published state back if dropped unsettled.
struct PendingRequest<'a, S: FeedSource> {
    orchestrator: &'a Orchestrator<S>,
    issued: u64,
    previous: Phase,
    settled: bool,
}

impl<S: FeedSource> Drop for PendingRequest<'_, S> {
    fn drop(&mut self) {
        if !self.settled {
            self.orchestrator.abandon(self.issued, self.previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Units;
    use crate::testing::{
        FixedClock, GatedWeather, ScriptedAqi, ScriptedWeather, T0, WeatherCall, aqi, weather,
    };

    fn weather_orchestrator(
        fetcher: Arc<dyn WeatherFetcher>,
        store: &Arc<PreferenceStore>,
        clock: Arc<FixedClock>,
    ) -> WeatherOrchestrator {
        Orchestrator::new(WeatherSource::new(fetcher, store.clone()), store.clone(), clock)
    }

    fn seed_weather(store: &PreferenceStore, at: i64, payload: WeatherSnapshot) {
        store
            .save_record(Feed::Weather, &FetchRecord::fetched(at, payload))
            .unwrap();
    }

    #[tokio::test]
    async fn first_launch_fetches_and_records() {
        let store = Arc::new(PreferenceStore::in_memory());
        let fetched = weather("Jakarta", 31.0);
        let fetcher = ScriptedWeather::new(vec![Ok(fetched.clone())]);
        let orchestrator = weather_orchestrator(fetcher.clone(), &store, FixedClock::at(T0));
        let here = Coordinate::new(-6.2, 106.8);

        let outcome = orchestrator.request_data(here.into(), false).await;

        assert_eq!(outcome, FetchOutcome::Fetched(fetched.clone()));
        assert_eq!(fetcher.calls(), vec![WeatherCall::Coordinate(here, Units::Metric)]);

        let state = orchestrator.state();
        assert_eq!(state.phase, Phase::Succeeded);
        assert_eq!(state.snapshot, Some(fetched.clone()));
        assert!(!state.is_offline);
        assert!(!state.is_loading);
        assert_eq!(state.error_message, None);

        let record = orchestrator.record();
        assert_eq!(record.last_fetch_epoch(), Some(T0));
        assert_eq!(record.cached_payload(), Some(&fetched));
    }

    #[tokio::test]
    async fn fresh_record_is_served_without_fetching() {
        let store = Arc::new(PreferenceStore::in_memory());
        let cached = weather("Jakarta", 30.0);
        seed_weather(&store, T0 - 100, cached.clone());
        let fetcher = ScriptedWeather::new(vec![Ok(weather("Jakarta", 99.0))]);
        let orchestrator = weather_orchestrator(fetcher.clone(), &store, FixedClock::at(T0));

        let outcome = orchestrator
            .request_data(Coordinate::new(-6.2, 106.8).into(), false)
            .await;

        assert_eq!(outcome, FetchOutcome::Cached(cached.clone()));
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(orchestrator.state().snapshot, Some(cached));
        assert_eq!(orchestrator.state().phase, Phase::Succeeded);
        // Serving the cache must not extend its lifetime.
        assert_eq!(store.last_fetch_epoch(Feed::Weather), Some(T0 - 100));
    }

    #[tokio::test]
    async fn record_at_ttl_boundary_is_refetched() {
        let store = Arc::new(PreferenceStore::in_memory());
        seed_weather(&store, T0 - CACHE_TTL_SECS, weather("Jakarta", 30.0));
        let fresh = weather("Jakarta", 32.0);
        let fetcher = ScriptedWeather::new(vec![Ok(fresh.clone())]);
        let orchestrator = weather_orchestrator(fetcher.clone(), &store, FixedClock::at(T0));

        let outcome = orchestrator
            .request_data(WeatherQuery::Place("Jakarta".into()), false)
            .await;

        assert_eq!(outcome, FetchOutcome::Fetched(fresh));
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(store.last_fetch_epoch(Feed::Weather), Some(T0));
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_stale_payload() {
        let store = Arc::new(PreferenceStore::in_memory());
        let stale = weather("Jakarta", 28.0);
        seed_weather(&store, T0 - 7200, stale.clone());
        let fetcher = ScriptedWeather::new(vec![Err(FetchError::TransportFailure(
            "offline".into(),
        ))]);
        let orchestrator = weather_orchestrator(fetcher, &store, FixedClock::at(T0));

        let outcome = orchestrator
            .request_data(Coordinate::new(-6.2, 106.8).into(), false)
            .await;

        assert_eq!(
            outcome,
            FetchOutcome::Failed {
                error: FetchError::TransportFailure("offline".into()),
                fallback: Some(stale.clone()),
            }
        );
        let state = orchestrator.state();
        assert_eq!(state.phase, Phase::Failed);
        assert!(state.is_offline);
        assert_eq!(state.snapshot, Some(stale));
        assert_eq!(
            state.error_message.as_deref(),
            Some("Network error. Please check your connection and try again.")
        );
        assert_eq!(store.last_fetch_epoch(Feed::Weather), Some(T0 - 7200));
    }

    #[tokio::test]
    async fn failure_without_cache_leaves_display_empty() {
        let store = Arc::new(PreferenceStore::in_memory());
        let fetcher = ScriptedWeather::new(vec![Err(FetchError::UpstreamError(500))]);
        let orchestrator = weather_orchestrator(fetcher, &store, FixedClock::at(T0));

        let outcome = orchestrator
            .request_data(Coordinate::new(1.0, 1.0).into(), false)
            .await;

        assert_eq!(outcome.snapshot(), None);
        let state = orchestrator.state();
        assert!(state.is_offline);
        assert_eq!(state.snapshot, None);
        assert_eq!(
            state.error_message.as_deref(),
            Some("Server error with status code: 500")
        );
        assert_eq!(orchestrator.record(), FetchRecord::default());
    }

    #[tokio::test]
    async fn unknown_place_is_not_treated_as_offline() {
        let store = Arc::new(PreferenceStore::in_memory());
        seed_weather(&store, T0 - 7200, weather("Jakarta", 28.0));
        let fetcher = ScriptedWeather::new(vec![Err(FetchError::NotFound)]);
        let orchestrator = weather_orchestrator(fetcher, &store, FixedClock::at(T0));

        let outcome = orchestrator
            .request_data(WeatherQuery::Place("Nowhereville".into()), false)
            .await;

        assert_eq!(outcome.error(), Some(&FetchError::NotFound));
        let state = orchestrator.state();
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.snapshot, None);
        assert!(!state.is_offline);
        assert_eq!(
            state.error_message.as_deref(),
            Some("City not found. Please ensure you have entered a valid city.")
        );
        assert_eq!(store.last_fetch_epoch(Feed::Weather), Some(T0 - 7200));
    }

    #[tokio::test]
    async fn force_refresh_bypasses_fresh_cache() {
        let store = Arc::new(PreferenceStore::in_memory());
        seed_weather(&store, T0 - 10, weather("Jakarta", 30.0));
        let fresh = weather("Jakarta", 33.0);
        let fetcher = ScriptedWeather::new(vec![Ok(fresh.clone())]);
        let clock = FixedClock::at(T0);
        let orchestrator = weather_orchestrator(fetcher.clone(), &store, clock);

        let outcome = orchestrator
            .request_data(Coordinate::new(-6.2, 106.8).into(), true)
            .await;

        assert_eq!(outcome, FetchOutcome::Fetched(fresh.clone()));
        assert_eq!(fetcher.call_count(), 1);
        let record = orchestrator.record();
        assert_eq!(record.last_fetch_epoch(), Some(T0));
        assert_eq!(record.into_payload(), Some(fresh));
    }

    #[tokio::test]
    async fn success_after_failure_clears_offline_state() {
        let store = Arc::new(PreferenceStore::in_memory());
        let recovered = weather("Jakarta", 29.0);
        let fetcher = ScriptedWeather::new(vec![
            Err(FetchError::EmptyResponse),
            Ok(recovered.clone()),
        ]);
        let orchestrator = weather_orchestrator(fetcher, &store, FixedClock::at(T0));
        let here = Coordinate::new(-6.2, 106.8);

        orchestrator.request_data(here.into(), false).await;
        assert!(orchestrator.state().is_offline);

        orchestrator.request_data(here.into(), true).await;
        let state = orchestrator.state();
        assert_eq!(state.phase, Phase::Succeeded);
        assert!(!state.is_offline);
        assert_eq!(state.error_message, None);
        assert_eq!(state.snapshot, Some(recovered));
    }

    #[tokio::test]
    async fn cache_expires_as_clock_advances() {
        let store = Arc::new(PreferenceStore::in_memory());
        let fetcher = ScriptedWeather::new(vec![
            Ok(weather("Jakarta", 30.0)),
            Ok(weather("Jakarta", 31.0)),
        ]);
        let clock = FixedClock::at(T0);
        let orchestrator = weather_orchestrator(fetcher.clone(), &store, clock.clone());
        let here = Coordinate::new(-6.2, 106.8);

        orchestrator.request_data(here.into(), false).await;
        clock.set(T0 + 3599);
        assert!(matches!(
            orchestrator.request_data(here.into(), false).await,
            FetchOutcome::Cached(_)
        ));
        clock.set(T0 + 3600);
        assert!(matches!(
            orchestrator.request_data(here.into(), false).await,
            FetchOutcome::Fetched(_)
        ));
        assert_eq!(fetcher.call_count(), 2);
        assert_eq!(store.last_fetch_epoch(Feed::Weather), Some(T0 + 3600));
    }

    #[tokio::test]
    async fn units_preference_is_read_per_request() {
        let store = Arc::new(PreferenceStore::in_memory());
        store.set_units(Units::Imperial).unwrap();
        let fetcher = ScriptedWeather::new(vec![Ok(weather("Jakarta", 88.0))]);
        let orchestrator = weather_orchestrator(fetcher.clone(), &store, FixedClock::at(T0));

        orchestrator
            .request_data(WeatherQuery::Place("Jakarta".into()), true)
            .await;

        assert_eq!(
            fetcher.calls(),
            vec![WeatherCall::Place("Jakarta".into(), Units::Imperial)]
        );
    }

    #[tokio::test]
    async fn superseded_fetch_is_discarded() {
        let store = Arc::new(PreferenceStore::in_memory());
        let fetcher = GatedWeather::new("Slow");
        let orchestrator = Arc::new(weather_orchestrator(
            fetcher.clone(),
            &store,
            FixedClock::at(T0),
        ));

        let slow = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator
                    .request_data(WeatherQuery::Place("Slow".into()), true)
                    .await
            }
        });
        while fetcher.started() == 0 {
            tokio::task::yield_now().await;
        }

        let fast = orchestrator
            .request_data(WeatherQuery::Place("Fast".into()), true)
            .await;
        assert!(matches!(fast, FetchOutcome::Fetched(_)));

        fetcher.release();
        let slow = slow.await.unwrap();
        assert_eq!(slow, FetchOutcome::Superseded);

        let state = orchestrator.state();
        assert_eq!(state.phase, Phase::Succeeded);
        assert_eq!(state.snapshot.map(|s| s.place_name), Some("Fast".to_string()));
        assert_eq!(
            orchestrator.record().into_payload().map(|s| s.place_name),
            Some("Fast".to_string())
        );
    }

    #[tokio::test]
    async fn in_flight_request_shows_loading_until_dropped() {
        let store = Arc::new(PreferenceStore::in_memory());
        let fetcher = GatedWeather::new("Slow");
        let orchestrator = Arc::new(weather_orchestrator(
            fetcher.clone(),
            &store,
            FixedClock::at(T0),
        ));

        let slow = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator
                    .request_data(WeatherQuery::Place("Slow".into()), true)
                    .await
            }
        });
        while fetcher.started() == 0 {
            tokio::task::yield_now().await;
        }

        let state = orchestrator.state();
        assert_eq!(state.phase, Phase::Loading);
        assert!(state.is_loading);

        slow.abort();
        assert!(slow.await.unwrap_err().is_cancelled());

        let state = orchestrator.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.is_loading);
        assert_eq!(state.snapshot, None);
        assert_eq!(orchestrator.record(), FetchRecord::default());
    }

    #[tokio::test]
    async fn dropped_request_does_not_disturb_a_newer_one() {
        let store = Arc::new(PreferenceStore::in_memory());
        let fetcher = GatedWeather::new("Slow");
        let orchestrator = Arc::new(weather_orchestrator(
            fetcher.clone(),
            &store,
            FixedClock::at(T0),
        ));

        orchestrator
            .request_data(WeatherQuery::Place("Fast".into()), true)
            .await;
        let slow = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator
                    .request_data(WeatherQuery::Place("Slow".into()), true)
                    .await
            }
        });
        while fetcher.started() < 2 {
            tokio::task::yield_now().await;
        }
        slow.abort();
        let _ = slow.await;

        // Rolled back to the phase the dropped request replaced.
        let state = orchestrator.state();
        assert_eq!(state.phase, Phase::Succeeded);
        assert!(!state.is_loading);
        assert_eq!(state.snapshot.map(|s| s.place_name), Some("Fast".to_string()));
    }

    #[tokio::test]
    async fn subscribers_see_published_state() {
        let store = Arc::new(PreferenceStore::in_memory());
        let fetcher = ScriptedWeather::new(vec![Ok(weather("Jakarta", 30.0))]);
        let orchestrator = weather_orchestrator(fetcher, &store, FixedClock::at(T0));
        let mut rx = orchestrator.subscribe();

        orchestrator
            .request_data(Coordinate::new(-6.2, 106.8).into(), false)
            .await;

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.phase, Phase::Succeeded);
        assert_eq!(seen.snapshot.map(|s| s.place_name), Some("Jakarta".to_string()));
    }

    #[tokio::test]
    async fn aqi_feed_is_independent_of_weather() {
        let store = Arc::new(PreferenceStore::in_memory());
        seed_weather(&store, T0 - 10, weather("Jakarta", 30.0));
        let fetcher = ScriptedAqi::new(vec![
            Ok(aqi(2)),
            Err(FetchError::TransportFailure("down".into())),
        ]);
        let clock = FixedClock::at(T0);
        let orchestrator: AqiOrchestrator =
            Orchestrator::new(AqiSource::new(fetcher.clone()), store.clone(), clock.clone());
        let here = Coordinate::new(-6.2, 106.8);

        assert_eq!(
            orchestrator.request_data(here, false).await,
            FetchOutcome::Fetched(aqi(2))
        );
        assert_eq!(fetcher.calls(), vec![here]);
        assert_eq!(store.last_fetch_epoch(Feed::Aqi), Some(T0));
        assert_eq!(store.last_fetch_epoch(Feed::Weather), Some(T0 - 10));

        clock.set(T0 + 4000);
        let outcome = orchestrator.request_data(here, false).await;
        assert_eq!(outcome.snapshot(), Some(&aqi(2)));
        assert!(orchestrator.state().is_offline);
    }
}
