use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{FetchError, WeatherResult, config::Units};

use super::WeatherProvider;

pub const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    endpoint: String,
    units: Units,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            units: Units::default(),
            http: Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn units(&self) -> Units {
        self.units
    }

    async fn fetch_current(&self, city: &str) -> Result<WeatherResult, FetchError> {
        let mut query = vec![("q", city), ("appid", self.api_key.as_str())];
        if let Some(units) = self.units.query_value() {
            query.push(("units", units));
        }

        debug!(city, endpoint = %self.endpoint, "requesting current weather");

        let res = self
            .http
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                FetchError::unknown(format!("Failed to send request to OpenWeather: {e}"))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            FetchError::unknown(format!("Failed to read OpenWeather response body: {e}"))
        })?;

        debug!(city, %status, "OpenWeather responded");

        parse_current(status, &body)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(&self, city: &str) -> Result<WeatherResult, FetchError> {
        self.fetch_current(city).await
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: Option<i64>,
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

/// Map a current-weather response onto the domain result.
fn parse_current(status: StatusCode, body: &str) -> Result<WeatherResult, FetchError> {
    if status == StatusCode::NOT_FOUND {
        warn!("OpenWeather has no such location");
        return Err(FetchError::NotFound);
    }

    if status != StatusCode::OK {
        return Err(FetchError::unknown(format!(
            "OpenWeather current request failed with status {}: {}",
            status,
            truncate_body(body),
        )));
    }

    // Anything without a usable `name` (empty body, `null`, HTML, ...) names no place.
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let Some(location) = value
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
    else {
        warn!("OpenWeather response carried no location name");
        return Err(FetchError::NotFound);
    };

    let parsed: OwCurrentResponse = serde_json::from_value(value).map_err(|e| {
        FetchError::unknown(format!("Failed to parse OpenWeather current JSON for {location}: {e}"))
    })?;

    let main = parsed.main.ok_or_else(|| {
        FetchError::unknown(format!(
            "OpenWeather response for {location} has no `main` section"
        ))
    })?;

    let (description, icon_code) = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| (w.description, w.icon))
        .unwrap_or_else(|| ("Unknown".to_string(), String::new()));

    Ok(WeatherResult {
        location,
        temperature: main.temp,
        temp_min: main.temp_min,
        temp_max: main.temp_max,
        description,
        icon_code,
        observed_at: parsed.dt.and_then(unix_to_utc),
    })
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
