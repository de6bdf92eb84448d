//! Fixtures shared by the unit tests: a settable clock and scripted fetchers.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{
    error::FetchError,
    freshness::Clock,
    model::{AqiSnapshot, Condition, Coordinate, Temperature, Units, WeatherSnapshot, Wind},
    provider::{AqiFetcher, WeatherFetcher},
};

pub const T0: i64 = 1_700_000_000;

#[derive(Debug)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn at(epoch: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(epoch)))
    }

    pub fn set(&self, epoch: i64) {
        self.0.store(epoch, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_epoch(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn weather(place: &str, temp: f64) -> WeatherSnapshot {
    WeatherSnapshot {
        place_name: place.to_string(),
        country: None,
        coordinate: None,
        condition: Condition {
            code: 800,
            main: "Clear".to_string(),
            description: "clear sky".to_string(),
        },
        temperature: Temperature {
            current: temp,
            min: temp - 1.0,
            max: temp + 1.0,
            feels_like: temp + 2.0,
        },
        humidity_pct: 70,
        pressure_hpa: 1010,
        wind: Wind {
            speed: 2.0,
            direction_deg: 90.0,
        },
        sunrise: T0 - 20_000,
        sunset: T0 + 20_000,
        utc_offset_secs: 25_200,
        observed_at: T0,
    }
}

pub fn aqi(index: u8) -> AqiSnapshot {
    AqiSnapshot {
        index,
        pollutants: None,
        measured_at: T0,
    }
}

/// What a scripted weather call saw.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherCall {
    Coordinate(Coordinate, Units),
    Place(String, Units),
}

/// Weather fetcher answering from a queue; an empty queue is a transport failure.
#[derive(Debug, Default)]
pub struct ScriptedWeather {
    responses: Mutex<VecDeque<Result<WeatherSnapshot, FetchError>>>,
    calls: Mutex<Vec<WeatherCall>>,
}

impl ScriptedWeather {
    pub fn new(responses: Vec<Result<WeatherSnapshot, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<WeatherCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next(&self) -> Result<WeatherSnapshot, FetchError> {
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::TransportFailure("script exhausted".into())))
    }
}

#[async_trait]
impl WeatherFetcher for ScriptedWeather {
    async fn fetch_by_coordinates(
        &self,
        coordinate: Coordinate,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        self.calls.lock().push(WeatherCall::Coordinate(coordinate, units));
        self.next()
    }

    async fn fetch_by_place_name(
        &self,
        name: &str,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        self.calls.lock().push(WeatherCall::Place(name.to_string(), units));
        self.next()
    }
}

#[derive(Debug, Default)]
pub struct ScriptedAqi {
    responses: Mutex<VecDeque<Result<AqiSnapshot, FetchError>>>,
    calls: Mutex<Vec<Coordinate>>,
}

impl ScriptedAqi {
    pub fn new(responses: Vec<Result<AqiSnapshot, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Coordinate> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl AqiFetcher for ScriptedAqi {
    async fn fetch_by_coordinates(
        &self,
        coordinate: Coordinate,
    ) -> Result<AqiSnapshot, FetchError> {
        self.calls.lock().push(coordinate);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::TransportFailure("script exhausted".into())))
    }
}

/// Weather fetcher whose lookups for `gated_place` block until released.
#[derive(Debug)]
pub struct GatedWeather {
    gated_place: String,
    gate: Notify,
    started: AtomicUsize,
}

impl GatedWeather {
    pub fn new(gated_place: &str) -> Arc<Self> {
        Arc::new(Self {
            gated_place: gated_place.to_string(),
            gate: Notify::new(),
            started: AtomicUsize::new(0),
        })
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherFetcher for GatedWeather {
    async fn fetch_by_coordinates(
        &self,
        _coordinate: Coordinate,
        _units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(weather("Here", 20.0))
    }

    async fn fetch_by_place_name(
        &self,
        name: &str,
        _units: Units,
    ) -> Result<WeatherSnapshot, FetchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if name == self.gated_place {
            self.gate.notified().await;
        }
        Ok(weather(name, 25.0))
    }
}
