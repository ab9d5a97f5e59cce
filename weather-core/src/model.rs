use serde::{Deserialize, Serialize};

/// A temperature reading with its unit as reported upstream ("C", "F").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub value: f64,
    pub unit: String,
}

impl Temperature {
    pub fn celsius(value: f64) -> Self {
        Self {
            value,
            unit: "C".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecipitationType {
    #[default]
    None,
    Rain,
    Snow,
    Ice,
    Mixed,
}

impl PrecipitationType {
    /// Map a provider-native label; absent or unrecognised labels become `None`.
    pub fn from_provider(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("rain") => Self::Rain,
            Some(s) if s.eq_ignore_ascii_case("snow") => Self::Snow,
            Some(s) if s.eq_ignore_ascii_case("ice") => Self::Ice,
            Some(s) if s.eq_ignore_ascii_case("mixed") => Self::Mixed,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecipitationIntensity {
    #[default]
    None,
    Light,
    Moderate,
    Heavy,
}

impl PrecipitationIntensity {
    pub fn from_provider(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("light") => Self::Light,
            Some(s) if s.eq_ignore_ascii_case("moderate") => Self::Moderate,
            Some(s) if s.eq_ignore_ascii_case("heavy") => Self::Heavy,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: Temperature,
    pub weather_text: String,
    /// Relative humidity, 0..=100.
    pub relative_humidity: u8,
    pub precipitation: bool,
    /// Provider timestamp, passed through verbatim.
    pub observation_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    /// "+1 hour", "+2 hours", ...
    pub relative_time: String,
    pub temperature: Temperature,
    pub weather_text: String,
    /// 0..=100.
    pub precipitation_probability: u8,
    pub precipitation_type: PrecipitationType,
    pub precipitation_intensity: PrecipitationIntensity,
}

/// Canonical response, identical in shape for every provider.
///
/// `Default` is the zero-valued response returned when upstream sends no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub location: String,
    pub location_key: String,
    pub country: String,
    pub current_conditions: CurrentConditions,
    /// Chronological, at most 12 entries; index 0 is the next hour.
    pub hourly_forecast: Vec<HourlyForecast>,
}

impl WeatherResponse {
    pub fn is_empty(&self) -> bool {
        self.location_key.is_empty() && self.hourly_forecast.is_empty()
    }
}
