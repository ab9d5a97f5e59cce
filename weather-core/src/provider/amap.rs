use async_trait::async_trait;
use chrono::{Local, Timelike};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    cache::LocationKeyCache,
    error::WeatherError,
    model::WeatherResponse,
    normalize::{self, DailyBucket},
    provider::{ProviderId, WeatherResolver, get_json, join_url, validate_location},
};

pub const DEFAULT_BASE_URL: &str = "https://restapi.amap.com";

const COUNTRY: &str = "中国";

/// `extensions` parameter of the Amap weather endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extensions {
    /// Live observations.
    Base,
    /// Daily forecast casts.
    All,
}

impl Extensions {
    fn as_str(self) -> &'static str {
        match self {
            Extensions::Base => "base",
            Extensions::All => "all",
        }
    }
}

/// Amap (高德): geocode → adcode, then live weather and daily casts from one
/// endpoint. Hourly entries are synthesized from the day/night buckets.
#[derive(Debug, Clone)]
pub struct AmapResolver {
    api_key: String,
    base_url: String,
    http: Client,
    cache: Arc<LocationKeyCache>,
}

impl AmapResolver {
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
        if let Some(adcode) = self.cache.get(location) {
            debug!(location, adcode = %adcode, "Location key cache hit");
            return Ok(adcode);
        }

        let adcode = if is_adcode(location) {
            location.to_string()
        } else {
            self.geocode(location).await?
        };

        info!(location, adcode = %adcode, "Resolved Amap adcode");
        self.cache.put(location, &adcode);
        Ok(adcode)
    }

    async fn geocode(&self, location: &str) -> Result<String, WeatherError> {
        let url = join_url(&self.base_url, "v3/geocode/geo");
        let resp: AmapGeocodeResponse = get_json(
            &self.http,
            &url,
            &[("key", self.api_key.as_str()), ("address", location), ("output", "JSON")],
            "Amap geocode",
        )
        .await?;
        check_status(&resp.status, &resp.info, &resp.infocode)?;

        resp.geocodes
            .into_iter()
            .map(|geo| geo.adcode)
            .find(|adcode| !adcode.is_empty())
            .ok_or_else(|| WeatherError::NotFound(location.to_string()))
    }

    async fn weather_info(
        &self,
        adcode: &str,
        extensions: Extensions,
    ) -> Result<AmapWeatherResponse, WeatherError> {
        let url = join_url(&self.base_url, "v3/weather/weatherInfo");
        let what = match extensions {
            Extensions::Base => "Amap live weather",
            Extensions::All => "Amap weather forecast",
        };

        let resp: AmapWeatherResponse = get_json(
            &self.http,
            &url,
            &[
                ("key", self.api_key.as_str()),
                ("city", adcode),
                ("extensions", extensions.as_str()),
                ("output", "JSON"),
            ],
            what,
        )
        .await?;
        check_status(&resp.status, &resp.info, &resp.infocode)?;

        Ok(resp)
    }
}

#[async_trait]
impl WeatherResolver for AmapResolver {
    fn id(&self) -> ProviderId {
        ProviderId::Amap
    }

    async fn resolve(&self, location: &str) -> Result<WeatherResponse, WeatherError> {
        let location = validate_location(location)?;
        let adcode = self.location_key(location).await?;

        let live = self.weather_info(&adcode, Extensions::Base).await?;
        let forecast = self.weather_info(&adcode, Extensions::All).await?;

        Ok(build_response(&live, &forecast, Local::now().hour()))
    }
}

/// Adcodes are purely numeric; those skip geocoding.
fn is_adcode(location: &str) -> bool {
    !location.is_empty() && location.bytes().all(|b| b.is_ascii_digit())
}

fn check_status(status: &str, info: &str, infocode: &str) -> Result<(), WeatherError> {
    if status == "1" {
        return Ok(());
    }
    Err(WeatherError::Upstream(format!(
        "Amap API returned error: {info} (infocode {infocode})"
    )))
}

fn build_response(
    live: &AmapWeatherResponse,
    forecast: &AmapWeatherResponse,
    current_hour: u32,
) -> WeatherResponse {
    let (Some(live), Some(forecast)) = (live.lives.first(), forecast.forecasts.first()) else {
        return WeatherResponse::default();
    };
    if forecast.casts.is_empty() {
        return WeatherResponse::default();
    }

    let casts: Vec<DailyBucket> = forecast.casts.iter().map(DailyBucket::from).collect();

    WeatherResponse {
        location: live.city.clone(),
        location_key: live.adcode.clone(),
        country: COUNTRY.to_string(),
        current_conditions: normalize::live_conditions(
            &live.weather,
            &live.temperature,
            &live.humidity,
            &live.reporttime,
        ),
        hourly_forecast: normalize::synthesize_hourly(&casts, current_hour),
    }
}

impl From<&AmapCast> for DailyBucket {
    fn from(cast: &AmapCast) -> Self {
        DailyBucket {
            day_weather: cast.dayweather.clone(),
            night_weather: cast.nightweather.clone(),
            day_temp: cast.daytemp.clone(),
            night_temp: cast.nighttemp.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AmapGeocode {
    #[serde(default)]
    adcode: String,
}

#[derive(Debug, Deserialize)]
struct AmapGeocodeResponse {
    status: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    infocode: String,
    #[serde(default)]
    geocodes: Vec<AmapGeocode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AmapLive {
    city: String,
    adcode: String,
    weather: String,
    temperature: String,
    humidity: String,
    reporttime: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AmapCast {
    dayweather: String,
    nightweather: String,
    daytemp: String,
    nighttemp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AmapForecast {
    casts: Vec<AmapCast>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AmapWeatherResponse {
    status: String,
    info: String,
    infocode: String,
    lives: Vec<AmapLive>,
    forecasts: Vec<AmapForecast>,
}
