//! Bikecast Library
//!
//! Client-side core of the bike demand forecaster: builds prediction
//! requests, drives the prediction workflow, and turns prediction history
//! into analytics.

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod history;
pub mod presenter;
pub mod request;
pub mod traits;
pub mod workflow;

// Re-export commonly used types
pub use analytics::{
    AnalyticsReport, AnalyticsSummary, ChartKind, ChartPoint, ChartSeries, HourlyPattern,
    TREND_WINDOW, WeatherImpact, build_report, load_analytics, summarize, trend_series,
};
pub use api::{BikecastApiClient, DashboardStats, PredictionResult};
pub use config::AppConfig;
pub use error::{ClientError, ErrorClass};
pub use features::{CalendarFeatures, DEFAULT_REFERENCE_YEAR, FeatureDeriver, Season};
pub use history::{HistoryRecord, RawHistoryRecord, normalize_history};
pub use presenter::{ResultView, present};
pub use request::{Document, FeatureVector, PredictionInputs, PredictionMode, SubmissionPayload};
pub use traits::{
    AnalyticsSource, Clock, MockAnalyticsSource, MockClock, MockPredictionService,
    PredictionService, SessionToken, SystemClock, TokenProvider,
};
pub use workflow::{Event, InputEdit, Method, Step, SubmitAction, Workflow, submit_with};
