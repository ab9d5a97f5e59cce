//! Error taxonomy surfaced at the resolver boundary.

/// Failure of a single weather resolution.
///
/// None of these are retried internally. Cache I/O problems never show up
/// here; the cache swallows them and logs a warning instead.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// Network or HTTP-level failure reaching the upstream provider.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-success status or an API-level error payload.
    #[error("{0}")]
    Upstream(String),

    /// Upstream payload was not valid JSON or had an unexpected shape.
    #[error("{context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The location query resolved to zero results.
    #[error("Location not found: {0}")]
    NotFound(String),

    /// A request was rejected before reaching any provider.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl WeatherError {
    /// Short machine-friendly tag for the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            WeatherError::Transport { .. } => "transport",
            WeatherError::Upstream(_) => "upstream",
            WeatherError::Parse { .. } => "parse",
            WeatherError::NotFound(_) => "not_found",
            WeatherError::InvalidRequest(_) => "invalid_request",
        }
    }
}
