//! Calendar feature derivation.
//!
//! Maps a calendar date onto the categorical fields the prediction model was
//! trained on: season, year flag, month and weekday.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// First year the model treats as "second year" (`yr = 1`).
pub const DEFAULT_REFERENCE_YEAR: i32 = 2012;

/// Season buckets as encoded by the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Season {
    Winter = 1,
    Spring = 2,
    Summer = 3,
    Fall = 4,
}

impl Season {
    /// Fixed four-bucket mapping by month number.
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Derived calendar fields for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarFeatures {
    pub season: u8,
    #[serde(rename = "yr")]
    pub year_flag: u8,
    #[serde(rename = "mnth")]
    pub month: u32,
    /// 0 = Sunday, 6 = Saturday
    pub weekday: u32,
}

/// Derives calendar fields against a configurable reference year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureDeriver {
    reference_year: i32,
}

impl FeatureDeriver {
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    pub fn year_flag(&self, year: i32) -> u8 {
        u8::from(year >= self.reference_year)
    }

    pub fn derive(&self, date: NaiveDate) -> CalendarFeatures {
        let month = date.month();
        CalendarFeatures {
            season: Season::from_month(month).code(),
            year_flag: self.year_flag(date.year()),
            month,
            weekday: date.weekday().num_days_from_sunday(),
        }
    }
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_YEAR)
    }
}
