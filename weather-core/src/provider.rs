use async_trait::async_trait;
use std::fmt::Debug;

use crate::{FetchError, WeatherResult};

pub mod openweather;

/// Source of current weather for a city.
///
/// Callers validate `city` before calling; implementations do not re-check it.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(&self, city: &str) -> Result<WeatherResult, FetchError>;
}
