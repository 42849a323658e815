//! Abstractions for time, session and remote services to enable testing.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting "today" for form defaults
//! - `TokenProvider`: The session token the transport attaches to calls
//! - `PredictionService`: Sending one prediction submission
//! - `AnalyticsSource`: Fetching history and the optional analytics series

use std::{
    collections::VecDeque,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::{
    analytics::{HourlyPattern, WeatherImpact},
    api::PredictionResult,
    error::ClientError,
    history::RawHistoryRecord,
    request::SubmissionPayload,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get the current time in the local timezone.
    fn now_local(&self) -> DateTime<Local>;

    /// The local calendar day.
    fn today(&self) -> NaiveDate {
        self.now_local().date_naive()
    }
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *lock(&self.utc_time) = time;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *lock(&self.utc_time)
    }

    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }

    /// UTC day, so tests do not depend on the host timezone.
    fn today(&self) -> NaiveDate {
        self.now_utc().date_naive()
    }
}

// ==================== Session Token ====================

/// Source of the bearer token attached to outgoing calls.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;

    /// Called when the service rejects the session.
    fn invalidate(&self) {}
}

/// In-memory session token.
#[derive(Debug, Default)]
pub struct SessionToken {
    token: Mutex<Option<String>>,
}

impl SessionToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        *lock(&self.token) = Some(token.into());
    }

    pub fn is_present(&self) -> bool {
        lock(&self.token).is_some()
    }
}

impl TokenProvider for SessionToken {
    fn bearer_token(&self) -> Option<String> {
        lock(&self.token).clone()
    }

    fn invalidate(&self) {
        tracing::warn!("Session rejected by service, clearing token");
        *lock(&self.token) = None;
    }
}

// ==================== Remote Services ====================

/// Sends one prediction submission. Implementations make a single attempt.
pub trait PredictionService: Send + Sync {
    fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<PredictionResult, ClientError>> + Send;
}

/// Supplies the raw data behind the analytics view.
pub trait AnalyticsSource: Send + Sync {
    /// Required: failure aborts the analytics view.
    fn fetch_history(
        &self,
    ) -> impl Future<Output = Result<Vec<RawHistoryRecord>, ClientError>> + Send;

    fn fetch_weather_impact(
        &self,
    ) -> impl Future<Output = Result<Vec<WeatherImpact>, ClientError>> + Send;

    fn fetch_hourly_patterns(
        &self,
    ) -> impl Future<Output = Result<Vec<HourlyPattern>, ClientError>> + Send;
}

/// Mock prediction service that replays scripted outcomes and records calls.
#[derive(Debug, Clone, Default)]
pub struct MockPredictionService {
    outcomes: Arc<Mutex<VecDeque<Result<PredictionResult, ClientError>>>>,
    calls: Arc<Mutex<Vec<SubmissionPayload>>>,
}

impl MockPredictionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next call.
    pub fn push_outcome(&self, outcome: Result<PredictionResult, ClientError>) {
        lock(&self.outcomes).push_back(outcome);
    }

    pub fn calls(&self) -> Vec<SubmissionPayload> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl PredictionService for MockPredictionService {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<PredictionResult, ClientError> {
        lock(&self.calls).push(payload.clone());
        lock(&self.outcomes)
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Network("no scripted outcome".into())))
    }
}

/// Mock analytics source with fixed responses.
#[derive(Debug, Clone)]
pub struct MockAnalyticsSource {
    pub history: Result<Vec<RawHistoryRecord>, ClientError>,
    pub weather_impact: Result<Vec<WeatherImpact>, ClientError>,
    pub hourly_patterns: Result<Vec<HourlyPattern>, ClientError>,
}

impl MockAnalyticsSource {
    /// History only; both optional series empty.
    pub fn with_history(history: Vec<RawHistoryRecord>) -> Self {
        Self {
            history: Ok(history),
            weather_impact: Ok(Vec::new()),
            hourly_patterns: Ok(Vec::new()),
        }
    }
}

impl AnalyticsSource for MockAnalyticsSource {
    async fn fetch_history(&self) -> Result<Vec<RawHistoryRecord>, ClientError> {
        self.history.clone()
    }

    async fn fetch_weather_impact(&self) -> Result<Vec<WeatherImpact>, ClientError> {
        self.weather_impact.clone()
    }

    async fn fetch_hourly_patterns(&self) -> Result<Vec<HourlyPattern>, ClientError> {
        self.hourly_patterns.clone()
    }
}
