//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The per-provider location-key cache (memory + JSON snapshot)
//! - Forecast normalization into one canonical schema
//! - Provider resolvers (AccuWeather, Amap) behind [`WeatherResolver`]
//! - Typed tool-request dispatch
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod request;

pub use cache::LocationKeyCache;
pub use config::{Config, ProviderConfig};
pub use error::WeatherError;
pub use model::{
    CurrentConditions, HourlyForecast, PrecipitationIntensity, PrecipitationType, Temperature,
    WeatherResponse,
};
pub use provider::{ProviderId, WeatherResolver, resolver_from_config};
pub use request::{ToolRequest, ToolResponse};
