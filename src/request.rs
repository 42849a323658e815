//! Prediction request construction.
//!
//! Turns user-entered [`PredictionInputs`] into the exact payload one of the
//! prediction endpoints expects, or packages a document for extraction.

use std::{fmt, path::Path, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::ClientError,
    features::{CalendarFeatures, FeatureDeriver},
};

/// Which prediction the service should make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    Daily,
    Hourly,
}

impl PredictionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionMode::Daily => "daily",
            PredictionMode::Hourly => "hourly",
        }
    }

    /// Endpoint path relative to the API base URL.
    pub fn endpoint(self) -> &'static str {
        match self {
            PredictionMode::Daily => "/predictions/daily",
            PredictionMode::Hourly => "/predictions/hourly",
        }
    }
}

impl fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(PredictionMode::Daily),
            "hourly" => Ok(PredictionMode::Hourly),
            other => Err(ClientError::Validation(format!(
                "unknown prediction mode '{other}'"
            ))),
        }
    }
}

/// Raw values entered by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionInputs {
    pub date: NaiveDate,
    /// 1 = clear .. 4 = heavy rain/snow
    pub weather_situation: u8,
    /// Normalised to [0, 1]
    pub temperature: f64,
    pub humidity: f64,
    pub windspeed: f64,
    pub working_day: bool,
    pub holiday: bool,
    /// Only sent for hourly predictions
    pub hour: u8,
}

impl PredictionInputs {
    /// Fresh form values for the given day.
    pub fn defaults_for(date: NaiveDate) -> Self {
        Self {
            date,
            weather_situation: 1,
            temperature: 0.7,
            humidity: 0.6,
            windspeed: 0.2,
            working_day: true,
            holiday: false,
            hour: 12,
        }
    }

    /// Check every field the given mode needs.
    pub fn validate(&self, mode: PredictionMode) -> Result<(), ClientError> {
        if !(1..=4).contains(&self.weather_situation) {
            return Err(out_of_range("weathersit", 1, 4));
        }
        for (name, value) in [
            ("temp", self.temperature),
            ("hum", self.humidity),
            ("windspeed", self.windspeed),
        ] {
            // NaN fails the range check too
            if !(0.0..=1.0).contains(&value) {
                return Err(out_of_range(name, 0, 1));
            }
        }
        if mode == PredictionMode::Hourly && self.hour > 23 {
            return Err(out_of_range("hr", 0, 23));
        }
        Ok(())
    }
}

fn out_of_range(field: &str, min: u8, max: u8) -> ClientError {
    ClientError::Validation(format!("{field} must be between {min} and {max}"))
}

/// Complete payload for `/predictions/daily` or `/predictions/hourly`.
///
/// Built only through [`FeatureVector::build`], which guarantees that
/// `atemp` equals `temp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    date: String,
    #[serde(flatten)]
    calendar: CalendarFeatures,
    holiday: u8,
    workingday: u8,
    weathersit: u8,
    temp: f64,
    atemp: f64,
    hum: f64,
    windspeed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    hr: Option<u8>,
}

impl FeatureVector {
    /// Validate the inputs and derive a fresh vector for one submission.
    pub fn build(
        inputs: &PredictionInputs,
        mode: PredictionMode,
        deriver: &FeatureDeriver,
    ) -> Result<Self, ClientError> {
        inputs.validate(mode)?;

        Ok(Self {
            date: inputs.date.format("%Y-%m-%d").to_string(),
            calendar: deriver.derive(inputs.date),
            holiday: u8::from(inputs.holiday),
            workingday: u8::from(inputs.working_day),
            weathersit: inputs.weather_situation,
            temp: inputs.temperature,
            atemp: inputs.temperature,
            hum: inputs.humidity,
            windspeed: inputs.windspeed,
            hr: match mode {
                PredictionMode::Hourly => Some(inputs.hour),
                PredictionMode::Daily => None,
            },
        })
    }

    pub fn calendar(&self) -> CalendarFeatures {
        self.calendar
    }

    pub fn temperature(&self) -> f64 {
        self.temp
    }

    pub fn feels_like(&self) -> f64 {
        self.atemp
    }

    pub fn hour(&self) -> Option<u8> {
        self.hr
    }

    pub fn mode(&self) -> PredictionMode {
        if self.hr.is_some() {
            PredictionMode::Hourly
        } else {
            PredictionMode::Daily
        }
    }
}

/// A PDF accepted for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    file_name: String,
    bytes: Vec<u8>,
}

impl Document {
    pub const CONTENT_TYPE: &'static str = "application/pdf";
    const MAGIC: &'static [u8] = b"%PDF-";

    /// Accept a file only if it is a PDF by name and by content.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ClientError> {
        let file_name = file_name.into();
        let has_pdf_extension = Path::new(&file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if !has_pdf_extension || !bytes.starts_with(Self::MAGIC) {
            return Err(ClientError::FileType(format!(
                "{file_name} is not a PDF document"
            )));
        }

        Ok(Self { file_name, bytes })
    }

    pub fn from_path(path: &Path) -> Result<Self, ClientError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ClientError::FileType(format!("{} is not a file", path.display())))?;
        let bytes = std::fs::read(path)
            .map_err(|err| ClientError::FileType(format!("cannot read {file_name}: {err}")))?;
        Self::new(file_name, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0 / 1024.0
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything needed for one prediction call.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionPayload {
    Features {
        mode: PredictionMode,
        vector: FeatureVector,
    },
    Document {
        mode: PredictionMode,
        document: Document,
    },
}

impl SubmissionPayload {
    pub fn mode(&self) -> PredictionMode {
        match self {
            SubmissionPayload::Features { mode, .. } | SubmissionPayload::Document { mode, .. } => {
                *mode
            }
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            SubmissionPayload::Features { mode, .. } => mode.endpoint(),
            SubmissionPayload::Document { .. } => "/predictions/upload-pdf",
        }
    }
}
