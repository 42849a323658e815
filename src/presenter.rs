//! Display fields for a returned prediction.

use chrono::NaiveDate;

use crate::{
    api::PredictionResult,
    request::{PredictionInputs, PredictionMode},
};

/// Read-only view of one prediction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    /// Bikes expected, rounded to a whole number
    pub count: i64,
    pub mode_label: &'static str,
    /// e.g. "Monday, July 15, 2024"
    pub date_label: Option<String>,
    /// e.g. "8:00", hourly results only
    pub time_label: Option<String>,
}

/// Round half up, matching how the web client rounded counts.
pub(crate) fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

pub fn mode_label(mode: PredictionMode) -> &'static str {
    match mode {
        PredictionMode::Daily => "Daily Forecast",
        PredictionMode::Hourly => "Hourly Forecast",
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

pub fn format_hour(hour: u8) -> String {
    format!("{hour}:00")
}

/// Derive the view from a result and, for manual predictions, the inputs
/// that produced it. Document results fall back to the fields the service
/// extracted.
pub fn present(result: &PredictionResult, inputs: Option<&PredictionInputs>) -> ResultView {
    let (date, hour) = match inputs {
        Some(inputs) => (Some(inputs.date), Some(inputs.hour)),
        None => (result.extracted_date(), result.extracted_hour()),
    };

    ResultView {
        count: round_half_up(result.prediction),
        mode_label: mode_label(result.mode),
        date_label: date.map(format_date),
        time_label: match result.mode {
            PredictionMode::Hourly => hour.map(format_hour),
            PredictionMode::Daily => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn result(prediction: f64, mode: PredictionMode) -> PredictionResult {
        PredictionResult {
            prediction,
            mode,
            extracted_data: None,
        }
    }

    fn inputs() -> PredictionInputs {
        let mut inputs =
            PredictionInputs::defaults_for(NaiveDate::from_ymd_opt(2024, 7, 15).unwrap());
        inputs.hour = 8;
        inputs
    }

    #[test]
    fn test_daily_view() {
        let view = present(&result(4512.4, PredictionMode::Daily), Some(&inputs()));
        assert_eq!(
            view,
            ResultView {
                count: 4512,
                mode_label: "Daily Forecast",
                date_label: Some("Monday, July 15, 2024".into()),
                time_label: None,
            }
        );
    }

    #[test]
    fn test_hourly_view_has_time() {
        let view = present(&result(233.5, PredictionMode::Hourly), Some(&inputs()));
        assert_eq!(view.count, 234);
        assert_eq!(view.mode_label, "Hourly Forecast");
        assert_eq!(view.time_label.as_deref(), Some("8:00"));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(0.0), 0);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
    }

    #[test]
    fn test_document_view_uses_extracted_fields() {
        let mut res = result(150.0, PredictionMode::Hourly);
        res.extracted_data = json!({ "date": "2012-03-01", "hr": 17 })
            .as_object()
            .cloned();

        let view = present(&res, None);
        assert_eq!(view.date_label.as_deref(), Some("Thursday, March 1, 2012"));
        assert_eq!(view.time_label.as_deref(), Some("17:00"));
    }

    #[test]
    fn test_document_view_without_extracted_fields() {
        let view = present(&result(10.0, PredictionMode::Daily), None);
        assert_eq!(view.count, 10);
        assert_eq!(view.date_label, None);
        assert_eq!(view.time_label, None);
    }

    #[test]
    fn test_present_is_pure() {
        let res = result(99.9, PredictionMode::Daily);
        let before = res.clone();
        let first = present(&res, Some(&inputs()));
        let second = present(&res, Some(&inputs()));
        assert_eq!(first, second);
        assert_eq!(res, before);
    }
}
