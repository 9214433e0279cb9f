//! Core library for city weather search.
//!
//! This crate defines:
//! - The OpenWeather client behind the [`WeatherProvider`] trait
//! - The [`SearchController`] that turns a typed city into display state
//! - Connectivity providers the controller checks and subscribes to
//! - The icon vocabulary, error taxonomy and configuration
//!
//! It is used by `weather-cli`, but can also be embedded by other front ends.

pub mod config;
pub mod connectivity;
pub mod controller;
pub mod error;
pub mod icon;
pub mod model;
pub mod provider;

pub use config::{Config, Units};
pub use connectivity::{ConnectivityProvider, ManualConnectivity, ProbeConnectivity};
pub use controller::{ConnectivityGuard, SearchController};
pub use error::FetchError;
pub use icon::IconCategory;
pub use model::{DisplayState, Outcome, Phase, SearchState, WeatherResult};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider};
