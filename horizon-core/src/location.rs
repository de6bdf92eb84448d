//! Single-shot position acquisition feeding both orchestrators.
//!
//! The platform side implements [`LocationProvider`] and reports back through
//! a channel of [`LocationEvent`]s. [`LocationCoordinator::run`] drains that
//! channel on one task; every state change happens there.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    model::{AqiSnapshot, Coordinate, WeatherQuery, WeatherSnapshot},
    orchestrator::{AqiOrchestrator, FetchOutcome, WeatherOrchestrator},
};

pub const LOCATION_DENIED_MESSAGE: &str =
    "Location access is denied. Please enable it in Settings.";
pub const LOCATION_FAILED_MESSAGE: &str = "Unable to get your location. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    AuthorizedWhenInUse,
    AuthorizedAlways,
}

impl AuthorizationStatus {
    pub fn is_granted(self) -> bool {
        matches!(
            self,
            AuthorizationStatus::AuthorizedWhenInUse | AuthorizationStatus::AuthorizedAlways
        )
    }
}

/// Callbacks from the platform location service.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    AuthorizationChanged(AuthorizationStatus),
    PositionFix(Coordinate),
    Failed(String),
}

/// Commands sent to the platform location service.
pub trait LocationProvider: Send + Sync + std::fmt::Debug {
    fn request_when_in_use_authorization(&self);
    fn request_always_authorization(&self);
    fn start_updates(&self);
    fn stop_updates(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationStatus {
    #[default]
    NotDetermined,
    Unauthorized,
    Authorized,
    Acquiring,
    Acquired,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationState {
    pub status: LocationStatus,
    pub coordinate: Option<Coordinate>,
    pub error_message: Option<String>,
}

/// Both feeds' outcomes for one acquired position.
#[derive(Debug, Clone, PartialEq)]
pub struct Refresh {
    pub coordinate: Coordinate,
    pub weather: FetchOutcome<WeatherSnapshot>,
    pub aqi: FetchOutcome<AqiSnapshot>,
}

pub struct LocationCoordinator {
    provider: Arc<dyn LocationProvider>,
    weather: Arc<WeatherOrchestrator>,
    aqi: Arc<AqiOrchestrator>,
    force_next: Mutex<bool>,
    state: watch::Sender<LocationState>,
}

impl LocationCoordinator {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        weather: Arc<WeatherOrchestrator>,
        aqi: Arc<AqiOrchestrator>,
    ) -> Self {
        let (state, _) = watch::channel(LocationState::default());
        Self {
            provider,
            weather,
            aqi,
            force_next: Mutex::new(false),
            state,
        }
    }

    pub fn state(&self) -> LocationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationState> {
        self.state.subscribe()
    }

    /// Ask for permission and begin the first update cycle.
    pub fn start(&self) {
        info!("Starting location updates");
        self.provider.request_when_in_use_authorization();
        self.begin_cycle();
    }

    /// Start a one-shot cycle; `ignore_cache` forces both feeds to refetch.
    pub fn request_location(&self, ignore_cache: bool) {
        if self.state.borrow().status == LocationStatus::Unauthorized {
            warn!("Location requested while access is denied");
            self.state.send_modify(|state| {
                state.error_message = Some(LOCATION_DENIED_MESSAGE.to_string());
            });
            return;
        }

        *self.force_next.lock() = ignore_cache;
        self.begin_cycle();
    }

    /// Elevated permission, only needed for scheduled notifications.
    pub fn request_always_authorization(&self) {
        self.provider.request_always_authorization();
    }

    fn begin_cycle(&self) {
        self.state.send_modify(|state| {
            state.status = LocationStatus::Acquiring;
            state.error_message = None;
        });
        self.provider.start_updates();
    }

    /// Apply one platform event. Returns the refresh triggered by a position fix.
    pub async fn handle_event(&self, event: LocationEvent) -> Option<Refresh> {
        match event {
            LocationEvent::AuthorizationChanged(status) if status.is_granted() => {
                debug!(?status, "Location access granted");
                self.state.send_modify(|state| state.status = LocationStatus::Authorized);
                self.begin_cycle();
                None
            }
            LocationEvent::AuthorizationChanged(
                status @ (AuthorizationStatus::Denied | AuthorizationStatus::Restricted),
            ) => {
                warn!(?status, "Location access denied by user");
                self.state.send_modify(|state| {
                    state.status = LocationStatus::Unauthorized;
                    state.error_message = Some(LOCATION_DENIED_MESSAGE.to_string());
                });
                None
            }
            LocationEvent::AuthorizationChanged(_) => None,
            LocationEvent::PositionFix(coordinate) => self.on_fix(coordinate).await,
            LocationEvent::Failed(reason) => {
                warn!(%reason, "Failed to get user location");
                self.state.send_modify(|state| {
                    if state.status == LocationStatus::Acquiring {
                        state.status = LocationStatus::Authorized;
                    }
                    state.error_message = Some(LOCATION_FAILED_MESSAGE.to_string());
                });
                None
            }
        }
    }

    async fn on_fix(&self, coordinate: Coordinate) -> Option<Refresh> {
        if self.state.borrow().status != LocationStatus::Acquiring {
            debug!(%coordinate, "Ignoring position fix outside an update cycle");
            return None;
        }

        self.provider.stop_updates();
        let force_refresh = std::mem::take(&mut *self.force_next.lock());
        self.state.send_modify(|state| {
            state.status = LocationStatus::Acquired;
            state.coordinate = Some(coordinate);
            state.error_message = None;
        });
        info!(%coordinate, force_refresh, "Location acquired");

        let (weather, aqi) = tokio::join!(
            self.weather
                .request_data(WeatherQuery::Coordinate(coordinate), force_refresh),
            self.aqi.request_data(coordinate, force_refresh),
        );

        Some(Refresh {
            coordinate,
            weather,
            aqi,
        })
    }

    /// Drain platform events until the sender side closes.
    pub async fn run(&self, mut events: mpsc::Receiver<LocationEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Location event channel closed");
    }
}

/// Provider for hosts without a location service: grants access immediately
/// and reports a fixed position every time updates start.
#[derive(Debug)]
pub struct FixedLocationProvider {
    coordinate: Coordinate,
    events: mpsc::Sender<LocationEvent>,
}

impl FixedLocationProvider {
    pub fn new(coordinate: Coordinate, events: mpsc::Sender<LocationEvent>) -> Self {
        Self {
            coordinate,
            events,
        }
    }

    fn emit(&self, event: LocationEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!(error = %e, "Dropping location event");
        }
    }
}

impl LocationProvider for FixedLocationProvider {
    fn request_when_in_use_authorization(&self) {
        self.emit(LocationEvent::AuthorizationChanged(
            AuthorizationStatus::AuthorizedWhenInUse,
        ));
    }

    fn request_always_authorization(&self) {
        self.emit(LocationEvent::AuthorizationChanged(
            AuthorizationStatus::AuthorizedAlways,
        ));
    }

    fn start_updates(&self) {
        self.emit(LocationEvent::PositionFix(self.coordinate));
    }

    fn stop_updates(&self) {}
}
