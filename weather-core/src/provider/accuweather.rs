use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    cache::LocationKeyCache,
    error::WeatherError,
    model::{
        CurrentConditions, PrecipitationIntensity, PrecipitationType, Temperature,
        WeatherResponse,
    },
    normalize::{self, ProviderHour},
    provider::{ProviderId, WeatherResolver, get_json, join_url, validate_location},
};

pub const DEFAULT_BASE_URL: &str = "http://dataservice.accuweather.com";

/// AccuWeather: location search → key, then current conditions, 12-hour
/// forecast and location metadata, all keyed by the location key.
#[derive(Debug, Clone)]
pub struct AccuWeatherResolver {
    api_key: String,
    base_url: String,
    http: Client,
    cache: Arc<LocationKeyCache>,
}

impl AccuWeatherResolver {
    pub fn new(api_key: String, cache: Arc<LocationKeyCache>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
            cache,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn location_key(&self, location: &str) -> Result<String, WeatherError> {
        if let Some(key) = self.cache.get(location) {
            debug!(location, key = %key, "Location key cache hit");
            return Ok(key);
        }

        let key = self.search_location(location).await?;
        info!(location, key = %key, "Resolved AccuWeather location key");
        self.cache.put(location, &key);
        Ok(key)
    }

    async fn search_location(&self, location: &str) -> Result<String, WeatherError> {
        let url = join_url(&self.base_url, "locations/v1/cities/search");
        let found: Vec<AwLocation> = get_json(
            &self.http,
            &url,
            &[("apikey", self.api_key.as_str()), ("q", location)],
            "AccuWeather location search",
        )
        .await?;

        found
            .into_iter()
            .next()
            .map(|loc| loc.key)
            .ok_or_else(|| WeatherError::NotFound(location.to_string()))
    }

    async fn current_conditions(
        &self,
        key: &str,
    ) -> Result<Vec<AwCurrentConditions>, WeatherError> {
        let url = join_url(&self.base_url, &format!("currentconditions/v1/{key}"));
        get_json(
            &self.http,
            &url,
            &[("apikey", self.api_key.as_str())],
            "AccuWeather current conditions",
        )
        .await
    }

    async fn hourly_forecast(&self, key: &str) -> Result<Vec<AwHourlyForecast>, WeatherError> {
        let url = join_url(&self.base_url, &format!("forecasts/v1/hourly/12hour/{key}"));
        get_json(
            &self.http,
            &url,
            &[("apikey", self.api_key.as_str()), ("metric", "true")],
            "AccuWeather hourly forecast",
        )
        .await
    }

    async fn location_info(&self, key: &str) -> Result<AwLocation, WeatherError> {
        let url = join_url(&self.base_url, &format!("locations/v1/{key}"));
        get_json(
            &self.http,
            &url,
            &[("apikey", self.api_key.as_str())],
            "AccuWeather location info",
        )
        .await
    }
}

#[async_trait]
impl WeatherResolver for AccuWeatherResolver {
    fn id(&self) -> ProviderId {
        ProviderId::AccuWeather
    }

    async fn resolve(&self, location: &str) -> Result<WeatherResponse, WeatherError> {
        let location = validate_location(location)?;
        let key = self.location_key(location).await?;

        let current = self.current_conditions(&key).await?;
        let hourly = self.hourly_forecast(&key).await?;
        let info = self.location_info(&key).await?;

        Ok(WeatherResponse {
            location: info.localized_name,
            location_key: key,
            country: info.country.localized_name,
            current_conditions: format_current_conditions(&current),
            hourly_forecast: normalize::passthrough_hourly(
                hourly.into_iter().map(ProviderHour::from),
            ),
        })
    }
}

fn format_current_conditions(conditions: &[AwCurrentConditions]) -> CurrentConditions {
    let Some(current) = conditions.first() else {
        return CurrentConditions::default();
    };

    CurrentConditions {
        temperature: Temperature {
            value: current.temperature.metric.value,
            unit: current.temperature.metric.unit.clone(),
        },
        weather_text: current.weather_text.clone(),
        relative_humidity: current.relative_humidity.map(normalize::clamp_percent).unwrap_or(0),
        precipitation: current.has_precipitation,
        observation_time: current.local_observation_date_time.clone(),
    }
}

impl From<AwHourlyForecast> for ProviderHour {
    fn from(hour: AwHourlyForecast) -> Self {
        ProviderHour {
            temperature: Temperature {
                value: hour.temperature.value,
                unit: hour.temperature.unit,
            },
            weather_text: hour.icon_phrase,
            precipitation_probability: normalize::clamp_percent(hour.precipitation_probability),
            precipitation_type: PrecipitationType::from_provider(
                hour.precipitation_type.as_deref(),
            ),
            precipitation_intensity: PrecipitationIntensity::from_provider(
                hour.precipitation_intensity.as_deref(),
            ),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwCountry {
    #[serde(default)]
    localized_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwLocation {
    key: String,
    #[serde(default)]
    localized_name: String,
    #[serde(default)]
    country: AwCountry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwValue {
    value: f64,
    unit: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwMetricTemperature {
    metric: AwValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwCurrentConditions {
    #[serde(default)]
    local_observation_date_time: String,
    #[serde(default)]
    weather_text: String,
    #[serde(default)]
    has_precipitation: bool,
    temperature: AwMetricTemperature,
    // Only present when details=true.
    #[serde(default)]
    relative_humidity: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwHourlyForecast {
    #[serde(default)]
    icon_phrase: String,
    #[serde(default)]
    precipitation_type: Option<String>,
    #[serde(default)]
    precipitation_intensity: Option<String>,
    #[serde(default)]
    precipitation_probability: i64,
    temperature: AwValue,
}
