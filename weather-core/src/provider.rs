use crate::{
    Config, LocationKeyCache, WeatherError, WeatherResponse,
    provider::{accuweather::AccuWeatherResolver, amap::AmapResolver},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};
use tracing::debug;

pub mod accuweather;
pub mod amap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    AccuWeather,
    Amap,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::AccuWeather => "accuweather",
            ProviderId::Amap => "amap",
        }
    }

    /// Environment variable that overrides the configured API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::AccuWeather => "ACCUWEATHER_API_KEY",
            ProviderId::Amap => "AMAP_API_KEY",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::AccuWeather, ProviderId::Amap]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "accuweather" => Ok(ProviderId::AccuWeather),
            "amap" => Ok(ProviderId::Amap),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: accuweather, amap."
            )),
        }
    }
}

/// Turns a free-text location into the canonical hourly forecast.
#[async_trait]
pub trait WeatherResolver: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn resolve(&self, location: &str) -> Result<WeatherResponse, WeatherError>;
}

/// Construct a resolver from config, sharing the given location-key cache.
pub fn resolver_from_config(
    id: ProviderId,
    config: &Config,
    cache: Arc<LocationKeyCache>,
) -> anyhow::Result<Box<dyn WeatherResolver>> {
    let api_key = config.provider_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather configure {id}` or set {}.",
            id.env_var()
        )
    })?;
    let base_url = config.provider_base_url(id);

    let boxed: Box<dyn WeatherResolver> = match id {
        ProviderId::AccuWeather => {
            let resolver = AccuWeatherResolver::new(api_key.to_owned(), cache);
            Box::new(match base_url {
                Some(url) => resolver.with_base_url(url),
                None => resolver,
            })
        }
        ProviderId::Amap => {
            let resolver = AmapResolver::new(api_key.to_owned(), cache);
            Box::new(match base_url {
                Some(url) => resolver.with_base_url(url),
                None => resolver,
            })
        }
    };

    Ok(boxed)
}

/// Reject blank queries before any cache or upstream access.
pub(crate) fn validate_location(location: &str) -> Result<&str, WeatherError> {
    if location.trim().is_empty() {
        return Err(WeatherError::InvalidRequest("location must not be empty".to_string()));
    }
    Ok(location)
}

/// GET `url` and deserialize a JSON body, mapping each failure onto the error taxonomy.
pub(crate) async fn get_json<T>(
    http: &Client,
    url: &str,
    query: &[(&str, &str)],
    what: &str,
) -> Result<T, WeatherError>
where
    T: DeserializeOwned,
{
    debug!(what, url, "Calling upstream");

    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|source| WeatherError::Transport {
            context: format!("Failed to send request to {what}"),
            source,
        })?;

    let status = res.status();
    let body = res.text().await.map_err(|source| WeatherError::Transport {
        context: format!("Failed to read {what} response body"),
        source,
    })?;

    if !status.is_success() {
        return Err(WeatherError::Upstream(format!(
            "{what} request failed with status {status}: {}",
            truncate_body(&body),
        )));
    }

    serde_json::from_str(&body).map_err(|source| WeatherError::Parse {
        context: format!("Failed to parse {what} JSON"),
        source,
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> Arc<LocationKeyCache> {
        Arc::new(LocationKeyCache::open(dir.path().join("location_cache.json")))
    }

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
        assert_eq!(ProviderId::try_from("AMap").unwrap(), ProviderId::Amap);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("openweather").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn resolver_from_config_errors_when_missing_api_key() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let err = resolver_from_config(ProviderId::AccuWeather, &cfg, cache(&dir)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No API key configured for provider"));
        assert!(msg.contains("ACCUWEATHER_API_KEY"));
    }

    #[test]
    fn resolver_from_config_builds_requested_provider() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Amap, "KEY".to_string());

        let resolver = resolver_from_config(ProviderId::Amap, &cfg, cache(&dir)).unwrap();
        assert_eq!(resolver.id(), ProviderId::Amap);
    }

    #[test]
    fn blank_location_is_rejected() {
        let err = validate_location("   ").unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(validate_location("北京").unwrap(), "北京");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "雨".repeat(100);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 203);

        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://h/", "/v3/x"), "http://h/v3/x");
        assert_eq!(join_url("http://h", "v3/x"), "http://h/v3/x");
    }
}
