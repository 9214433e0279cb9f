use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FetchError, IconCategory};

/// Normalized snapshot of the current weather in one place.
///
/// Temperatures are in whatever unit the API was asked for and are never rounded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResult {
    pub location: String,
    pub temperature: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub description: String,
    pub icon_code: String,
    pub observed_at: Option<DateTime<Utc>>,
}

impl WeatherResult {
    pub fn icon(&self) -> IconCategory {
        IconCategory::from_code(&self.icon_code)
    }
}

/// What the presentation layer should show. Exactly one at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisplayState {
    #[default]
    Idle,
    Showing(WeatherResult),
    Error(FetchError),
}

impl DisplayState {
    pub fn result(&self) -> Option<&WeatherResult> {
        match self {
            DisplayState::Showing(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            DisplayState::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Whether an attempt is in flight. How it settled is reported by [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
}

/// Transient state of one search screen.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub display: DisplayState,
    /// Last reachability reported by the attached connectivity listener.
    pub connected: bool,
    pub phase: Phase,
    /// Number of the latest fetch attempt; 0 before the first submit.
    pub attempt: u64,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            query: String::new(),
            display: DisplayState::Idle,
            connected: true,
            phase: Phase::Idle,
            attempt: 0,
        }
    }
}

/// How a single `submit` settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(WeatherResult),
    /// Refused before calling the client (no connection, empty city).
    Rejected(FetchError),
    Failed(FetchError),
    /// A newer submit started while this one was in flight; its outcome was dropped.
    Superseded,
}
