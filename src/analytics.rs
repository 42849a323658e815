use serde::{Deserialize, Serialize};

use crate::{
    error::ClientError,
    history::{HistoryRecord, normalize_history},
    presenter::round_half_up,
    request::PredictionMode,
    traits::AnalyticsSource,
};

/// Number of most recent records plotted in the trend chart.
pub const TREND_WINDOW: usize = 7;

// ==================== Source Types ====================

/// Average prediction per weather situation, from `/analytics/weather-impact`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherImpact {
    pub weather: String,
    pub avg_prediction: f64,
}

/// Average hourly prediction per hour of day, from `/analytics/hourly-patterns`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourlyPattern {
    pub hour: i64,
    pub avg_prediction: f64,
}

// ==================== Output Types ====================

/// Summary statistics over the full history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AnalyticsSummary {
    pub total: usize,
    pub daily: usize,
    pub hourly: usize,
    /// Records whose mode tag is neither daily nor hourly
    pub other: usize,
    /// Mean predicted value, rounded; 0 for an empty history
    pub mean: i64,
}

/// One labelled data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Which chart a series feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Trend,
    WeatherImpact,
    HourlyPattern,
}

impl ChartKind {
    pub fn title(self) -> &'static str {
        match self {
            ChartKind::Trend => "Predicted Rentals",
            ChartKind::WeatherImpact => "Average Rentals",
            ChartKind::HourlyPattern => "Average Rentals by Hour",
        }
    }

    /// Trend is always shown; the others only when they have data.
    pub fn is_optional(self) -> bool {
        !matches!(self, ChartKind::Trend)
    }
}

/// Ordered (label, value) pairs for one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub kind: ChartKind,
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|p| p.label.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }
}

/// Everything the analytics view renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub summary: AnalyticsSummary,
    pub trend: ChartSeries,
    pub weather_impact: ChartSeries,
    pub hourly_pattern: ChartSeries,
}

impl AnalyticsReport {
    /// Charts to present, omitting optional ones without data.
    pub fn charts(&self) -> Vec<&ChartSeries> {
        [&self.trend, &self.weather_impact, &self.hourly_pattern]
            .into_iter()
            .filter(|series| !(series.kind.is_optional() && series.is_empty()))
            .collect()
    }
}

// ==================== Aggregation ====================

/// Totals, per-mode counts by exact tag match, and the rounded mean.
pub fn summarize(records: &[HistoryRecord]) -> AnalyticsSummary {
    let total = records.len();
    let count_mode = |mode: PredictionMode| {
        records
            .iter()
            .filter(|r| r.kind == mode.as_str())
            .count()
    };
    let daily = count_mode(PredictionMode::Daily);
    let hourly = count_mode(PredictionMode::Hourly);

    let mean = if total == 0 {
        0
    } else {
        let sum: f64 = records.iter().map(|r| r.value).sum();
        round_half_up(sum / total as f64)
    };

    AnalyticsSummary {
        total,
        daily,
        hourly,
        other: total - daily - hourly,
        mean,
    }
}

/// Label a trend point with the record's creation day, `M/D/YYYY`.
fn trend_label(record: &HistoryRecord) -> String {
    match (&record.created_at, record.created_date()) {
        (None, _) => "N/A".to_string(),
        (Some(_), Some(date)) => date.format("%-m/%-d/%Y").to_string(),
        (Some(raw), None) => raw.clone(),
    }
}

/// The last [`TREND_WINDOW`] records in arrival order.
pub fn trend_series(records: &[HistoryRecord]) -> ChartSeries {
    let start = records.len().saturating_sub(TREND_WINDOW);
    ChartSeries {
        kind: ChartKind::Trend,
        points: records[start..]
            .iter()
            .map(|r| ChartPoint {
                label: trend_label(r),
                value: r.value,
            })
            .collect(),
    }
}

pub fn weather_series(entries: &[WeatherImpact]) -> ChartSeries {
    ChartSeries {
        kind: ChartKind::WeatherImpact,
        points: entries
            .iter()
            .map(|w| ChartPoint {
                label: w.weather.clone(),
                value: w.avg_prediction,
            })
            .collect(),
    }
}

pub fn hourly_series(entries: &[HourlyPattern]) -> ChartSeries {
    ChartSeries {
        kind: ChartKind::HourlyPattern,
        points: entries
            .iter()
            .map(|h| ChartPoint {
                label: format!("{}:00", h.hour),
                value: h.avg_prediction,
            })
            .collect(),
    }
}

/// Build the full report. Missing optional sources produce empty series.
pub fn build_report(
    records: &[HistoryRecord],
    weather_impact: Option<&[WeatherImpact]>,
    hourly_patterns: Option<&[HourlyPattern]>,
) -> AnalyticsReport {
    AnalyticsReport {
        summary: summarize(records),
        trend: trend_series(records),
        weather_impact: weather_impact
            .map(weather_series)
            .unwrap_or_else(|| ChartSeries::new(ChartKind::WeatherImpact)),
        hourly_pattern: hourly_patterns
            .map(hourly_series)
            .unwrap_or_else(|| ChartSeries::new(ChartKind::HourlyPattern)),
    }
}

/// Fetch all three sources concurrently and aggregate them.
///
/// A history failure is returned to the caller. Failures of the two optional
/// sources are logged and treated as "no data".
pub async fn load_analytics<S: AnalyticsSource>(source: &S) -> Result<AnalyticsReport, ClientError> {
    let (history, weather_impact, hourly_patterns) = tokio::join!(
        source.fetch_history(),
        source.fetch_weather_impact(),
        source.fetch_hourly_patterns()
    );

    let records = normalize_history(history?);

    let weather_impact = weather_impact
        .inspect_err(|e| tracing::warn!("Weather impact unavailable: {}", e))
        .ok();
    let hourly_patterns = hourly_patterns
        .inspect_err(|e| tracing::warn!("Hourly patterns unavailable: {}", e))
        .ok();

    let report = build_report(
        &records,
        weather_impact.as_deref(),
        hourly_patterns.as_deref(),
    );
    tracing::debug!(
        "Analytics built from {} records ({} charts)",
        report.summary.total,
        report.charts().len()
    );
    Ok(report)
}
