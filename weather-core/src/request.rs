//! Tool-style requests: `{"name": "weather", "parameters": {"location": "..."}}`.
//!
//! Each request kind is a variant with its own typed parameters, so an
//! unknown name or a malformed parameter set is rejected at decode time.

use serde::{Deserialize, Serialize};

use crate::{WeatherError, WeatherResolver, WeatherResponse};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "parameters", rename_all = "snake_case")]
pub enum ToolRequest {
    Weather(WeatherParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherParams {
    #[serde(default)]
    pub location: String,
}

impl ToolRequest {
    pub fn from_json(raw: &str) -> Result<Self, WeatherError> {
        let request: ToolRequest = serde_json::from_str(raw)
            .map_err(|err| WeatherError::InvalidRequest(err.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), WeatherError> {
        match self {
            ToolRequest::Weather(params) if params.location.trim().is_empty() => Err(
                WeatherError::InvalidRequest("missing required parameter: location".to_string()),
            ),
            ToolRequest::Weather(_) => Ok(()),
        }
    }
}

/// Envelope written back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ToolResponse {
    #[serde(rename = "application/json")]
    Content { content: WeatherResponse },
    #[serde(rename = "error")]
    Error { error: String },
}

impl From<Result<WeatherResponse, WeatherError>> for ToolResponse {
    fn from(result: Result<WeatherResponse, WeatherError>) -> Self {
        match result {
            Ok(content) => ToolResponse::Content { content },
            Err(err) => ToolResponse::Error {
                error: err.to_string(),
            },
        }
    }
}

pub async fn dispatch(
    resolver: &dyn WeatherResolver,
    request: &ToolRequest,
) -> Result<WeatherResponse, WeatherError> {
    request.validate()?;
    match request {
        ToolRequest::Weather(params) => resolver.resolve(&params.location).await,
    }
}

/// Decode, dispatch and wrap a raw JSON request.
pub async fn handle(resolver: &dyn WeatherResolver, raw: &str) -> ToolResponse {
    let result = match ToolRequest::from_json(raw) {
        Ok(request) => dispatch(resolver, &request).await,
        Err(err) => Err(err),
    };
    result.into()
}
