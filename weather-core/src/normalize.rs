//! Provider-independent forecast normalization.
//!
//! Everything here is pure: providers deserialize their own payloads, hand
//! the relevant fields over, and get canonical [`HourlyForecast`] /
//! [`CurrentConditions`] values back.
//!
//! Numeric fields that arrive as strings and fail to parse become `0` and
//! emit a `warn!` event rather than failing the request.

use tracing::warn;

use crate::model::{
    CurrentConditions, HourlyForecast, PrecipitationIntensity, PrecipitationType, Temperature,
};

/// Upper bound on hourly entries in a canonical response.
pub const MAX_HOURLY_ENTRIES: usize = 12;

/// Hours walked by the daily-to-hourly synthesis before the entry cap applies.
const SYNTHESIS_WINDOW_HOURS: usize = 24;

const RAIN: &str = "雨";
const SNOW: &str = "雪";

const RAIN_QUALIFIERS: &[(&str, PrecipitationIntensity, u8)] = &[
    ("小雨", PrecipitationIntensity::Light, 60),
    ("中雨", PrecipitationIntensity::Moderate, 80),
    ("大雨", PrecipitationIntensity::Heavy, 90),
    ("暴雨", PrecipitationIntensity::Heavy, 90),
];

const SNOW_QUALIFIERS: &[(&str, PrecipitationIntensity, u8)] = &[
    ("小雪", PrecipitationIntensity::Light, 60),
    ("中雪", PrecipitationIntensity::Moderate, 80),
    ("大雪", PrecipitationIntensity::Heavy, 90),
    ("暴雪", PrecipitationIntensity::Heavy, 90),
];

/// Precipitation guess derived from a weather description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precipitation {
    pub kind: PrecipitationType,
    pub intensity: PrecipitationIntensity,
    pub probability: u8,
}

impl Precipitation {
    pub const NONE: Precipitation = Precipitation {
        kind: PrecipitationType::None,
        intensity: PrecipitationIntensity::None,
        probability: 0,
    };
}

/// Classify Chinese weather text ("小雨", "暴雪", "晴", ...).
///
/// Rain wins over snow for mixed text such as "雨夹雪". A rain/snow match
/// without a recognised qualifier is reported as light, 60%.
pub fn classify_precipitation(weather_text: &str) -> Precipitation {
    let (kind, qualifiers) = if weather_text.contains(RAIN) {
        (PrecipitationType::Rain, RAIN_QUALIFIERS)
    } else if weather_text.contains(SNOW) {
        (PrecipitationType::Snow, SNOW_QUALIFIERS)
    } else {
        return Precipitation::NONE;
    };

    let (intensity, probability) = qualifiers
        .iter()
        .find(|(token, _, _)| weather_text.contains(*token))
        .map(|&(_, intensity, probability)| (intensity, probability))
        .unwrap_or((PrecipitationIntensity::Light, 60));

    Precipitation {
        kind,
        intensity,
        probability,
    }
}

/// Whether weather text mentions rain or snow at all.
pub fn is_precipitating(weather_text: &str) -> bool {
    weather_text.contains(RAIN) || weather_text.contains(SNOW)
}

/// Day bucket covers local hours [6, 18).
pub fn is_daytime(hour: u32) -> bool {
    (6..18).contains(&hour)
}

/// Label for provider-supplied hourly data: "+1 hour", "+2 hours", ...
pub fn relative_time_label(index: usize) -> String {
    match index + 1 {
        1 => "+1 hour".to_string(),
        n => format!("+{n} hours"),
    }
}

/// Label for synthesized hourly data. Always singular ("+3 hour").
pub fn synthetic_relative_time_label(index: usize) -> String {
    format!("+{} hour", index + 1)
}

/// Parse a temperature string; failures degrade to `0.0`.
pub fn parse_temperature(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or_else(|err| {
        warn!(raw, error = %err, "Unparseable temperature, using 0");
        0.0
    })
}

/// Parse a relative-humidity string into 0..=100; failures degrade to `0`.
pub fn parse_humidity(raw: &str) -> u8 {
    match raw.trim().parse::<i64>() {
        Ok(value) => value.clamp(0, 100) as u8,
        Err(err) => {
            warn!(raw, error = %err, "Unparseable humidity, using 0");
            0
        }
    }
}

/// Clamp a provider-reported percentage into 0..=100.
pub fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// One day of forecast split into a day and a night bucket, as the provider reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyBucket {
    pub day_weather: String,
    pub night_weather: String,
    pub day_temp: String,
    pub night_temp: String,
}

impl DailyBucket {
    fn at(&self, hour: u32) -> (&str, &str) {
        if is_daytime(hour) {
            (self.day_weather.as_str(), self.day_temp.as_str())
        } else {
            (self.night_weather.as_str(), self.night_temp.as_str())
        }
    }
}

/// Build up to [`MAX_HOURLY_ENTRIES`] hourly entries out of daily buckets.
///
/// Offset `i` maps to local hour `(current_hour % 24 + i) % 24` and to
/// `casts[i / 24]`; synthesis stops when that cast does not exist.
pub fn synthesize_hourly(casts: &[DailyBucket], current_hour: u32) -> Vec<HourlyForecast> {
    (0..SYNTHESIS_WINDOW_HOURS)
        .map_while(|i| {
            let cast = casts.get(i / 24)?;
            let hour = (current_hour % 24 + i as u32) % 24;
            let (weather_text, temp) = cast.at(hour);
            let precipitation = classify_precipitation(weather_text);

            Some(HourlyForecast {
                relative_time: synthetic_relative_time_label(i),
                temperature: Temperature::celsius(parse_temperature(temp)),
                weather_text: weather_text.to_string(),
                precipitation_probability: precipitation.probability,
                precipitation_type: precipitation.kind,
                precipitation_intensity: precipitation.intensity,
            })
        })
        .take(MAX_HOURLY_ENTRIES)
        .collect()
}

/// One provider-native hourly record with fields already mapped to canonical types.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHour {
    pub temperature: Temperature,
    pub weather_text: String,
    pub precipitation_probability: u8,
    pub precipitation_type: PrecipitationType,
    pub precipitation_intensity: PrecipitationIntensity,
}

/// Map provider hourly records 1:1 onto canonical entries, adding labels.
pub fn passthrough_hourly<I>(hours: I) -> Vec<HourlyForecast>
where
    I: IntoIterator<Item = ProviderHour>,
{
    hours
        .into_iter()
        .take(MAX_HOURLY_ENTRIES)
        .enumerate()
        .map(|(i, hour)| HourlyForecast {
            relative_time: relative_time_label(i),
            temperature: hour.temperature,
            weather_text: hour.weather_text,
            precipitation_probability: hour.precipitation_probability,
            precipitation_type: hour.precipitation_type,
            precipitation_intensity: hour.precipitation_intensity,
        })
        .collect()
}

/// Current conditions from string-typed live observations (Celsius).
pub fn live_conditions(
    weather_text: &str,
    temperature: &str,
    humidity: &str,
    observation_time: &str,
) -> CurrentConditions {
    CurrentConditions {
        temperature: Temperature::celsius(parse_temperature(temperature)),
        weather_text: weather_text.to_string(),
        relative_humidity: parse_humidity(humidity),
        precipitation: is_precipitating(weather_text),
        observation_time: observation_time.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(day: &str, night: &str, day_temp: &str, night_temp: &str) -> DailyBucket {
        DailyBucket {
            day_weather: day.into(),
            night_weather: night.into(),
            day_temp: day_temp.into(),
            night_temp: night_temp.into(),
        }
    }

    #[test]
    fn classifies_known_texts() {
        assert_eq!(
            classify_precipitation("小雨"),
            Precipitation {
                kind: PrecipitationType::Rain,
                intensity: PrecipitationIntensity::Light,
                probability: 60,
            }
        );
        assert_eq!(
            classify_precipitation("暴雪"),
            Precipitation {
                kind: PrecipitationType::Snow,
                intensity: PrecipitationIntensity::Heavy,
                probability: 90,
            }
        );
        assert_eq!(classify_precipitation("晴"), Precipitation::NONE);
    }

    #[test]
    fn qualifiers_pick_intensity() {
        let moderate = classify_precipitation("中雨");
        assert_eq!(moderate.intensity, PrecipitationIntensity::Moderate);
        assert_eq!(moderate.probability, 80);

        let storm = classify_precipitation("大暴雨");
        assert_eq!(storm.intensity, PrecipitationIntensity::Heavy);
        assert_eq!(storm.probability, 90);

        let snow = classify_precipitation("中雪");
        assert_eq!(snow.kind, PrecipitationType::Snow);
        assert_eq!(snow.intensity, PrecipitationIntensity::Moderate);
    }

    #[test]
    fn unqualified_precipitation_defaults_to_light() {
        let shower = classify_precipitation("雷阵雨");
        assert_eq!(shower.kind, PrecipitationType::Rain);
        assert_eq!(shower.intensity, PrecipitationIntensity::Light);
        assert_eq!(shower.probability, 60);

        let flurries = classify_precipitation("阵雪");
        assert_eq!(flurries.kind, PrecipitationType::Snow);
        assert_eq!(flurries.intensity, PrecipitationIntensity::Light);
    }

    #[test]
    fn sleet_counts_as_rain() {
        assert_eq!(classify_precipitation("雨夹雪").kind, PrecipitationType::Rain);
    }

    #[test]
    fn passthrough_labels_are_pluralized() {
        assert_eq!(relative_time_label(0), "+1 hour");
        assert_eq!(relative_time_label(1), "+2 hours");
        assert_eq!(relative_time_label(11), "+12 hours");
    }

    #[test]
    fn synthetic_labels_stay_singular() {
        assert_eq!(synthetic_relative_time_label(0), "+1 hour");
        assert_eq!(synthetic_relative_time_label(4), "+5 hour");
    }

    #[test]
    fn synthesis_from_ten_am_splits_day_and_night() {
        let casts = vec![bucket("多云", "小雨", "25", "18"), bucket("晴", "晴", "27", "17")];

        let hours = synthesize_hourly(&casts, 10);

        assert_eq!(hours.len(), 12);
        for entry in &hours[..8] {
            assert_eq!(entry.weather_text, "多云");
            assert_eq!(entry.temperature.value, 25.0);
            assert_eq!(entry.precipitation_type, PrecipitationType::None);
        }
        for entry in &hours[8..] {
            assert_eq!(entry.weather_text, "小雨");
            assert_eq!(entry.temperature.value, 18.0);
            assert_eq!(entry.precipitation_type, PrecipitationType::Rain);
            assert_eq!(entry.precipitation_probability, 60);
        }
        assert_eq!(hours[0].relative_time, "+1 hour");
        assert_eq!(hours[11].relative_time, "+12 hour");
    }

    #[test]
    fn synthesis_after_midnight_wraps_hour() {
        let casts = vec![bucket("晴", "阴", "30", "20")];

        let hours = synthesize_hourly(&casts, 22);

        assert_eq!(hours.len(), 12);
        // 22..05 night, 06..09 day
        assert!(hours[..8].iter().all(|h| h.weather_text == "阴"));
        assert!(hours[8..].iter().all(|h| h.weather_text == "晴"));
    }

    #[test]
    fn synthesis_reduces_out_of_range_hour() {
        let casts = vec![bucket("晴", "阴", "30", "20")];

        assert_eq!(synthesize_hourly(&casts, 34), synthesize_hourly(&casts, 10));
        assert_eq!(synthesize_hourly(&casts, u32::MAX).len(), 12);
    }

    #[test]
    fn synthesis_without_casts_is_empty() {
        assert!(synthesize_hourly(&[], 10).is_empty());
    }

    #[test]
    fn bad_numbers_degrade_to_zero() {
        let casts = vec![bucket("晴", "晴", "hot", "")];
        let hours = synthesize_hourly(&casts, 12);
        assert_eq!(hours[0].temperature.value, 0.0);

        assert_eq!(parse_temperature(" -3.5 "), -3.5);
        assert_eq!(parse_humidity("abc"), 0);
        assert_eq!(parse_humidity("140"), 100);
        assert_eq!(parse_humidity("57"), 57);
    }

    #[test]
    fn passthrough_keeps_provider_fields() {
        let hours = (0..14).map(|i| ProviderHour {
            temperature: Temperature {
                value: i as f64,
                unit: "F".into(),
            },
            weather_text: "Showers".into(),
            precipitation_probability: 40,
            precipitation_type: PrecipitationType::Rain,
            precipitation_intensity: PrecipitationIntensity::Moderate,
        });

        let out = passthrough_hourly(hours);

        assert_eq!(out.len(), MAX_HOURLY_ENTRIES);
        assert_eq!(out[0].relative_time, "+1 hour");
        assert_eq!(out[1].relative_time, "+2 hours");
        assert_eq!(
            out[3].temperature,
            Temperature {
                value: 3.0,
                unit: "F".into()
            }
        );
        assert_eq!(out[3].precipitation_intensity, PrecipitationIntensity::Moderate);
    }

    #[test]
    fn live_conditions_flags_precipitation() {
        let current = live_conditions("阵雨", "21", "88", "2026-10-17 10:00:00");
        assert!(current.precipitation);
        assert_eq!(current.temperature, Temperature::celsius(21.0));
        assert_eq!(current.relative_humidity, 88);
        assert_eq!(current.observation_time, "2026-10-17 10:00:00");

        assert!(!live_conditions("晴", "21", "40", "").precipitation);
    }
}
