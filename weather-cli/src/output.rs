use std::fmt::Write;

use weather_core::{PrecipitationType, WeatherResponse};

/// Human-readable rendering of a canonical response.
pub fn render(resp: &WeatherResponse) -> String {
    let mut out = String::new();

    if resp.is_empty() {
        out.push_str("No weather data returned for this location.\n");
        return out;
    }

    let _ = writeln!(out, "{}, {} [{}]", resp.location, resp.country, resp.location_key);

    let now = &resp.current_conditions;
    let _ = writeln!(
        out,
        "Now: {:.1}°{}, {}, humidity {}%{} (observed {})",
        now.temperature.value,
        now.temperature.unit,
        now.weather_text,
        now.relative_humidity,
        if now.precipitation { ", precipitating" } else { "" },
        now.observation_time,
    );

    if resp.hourly_forecast.is_empty() {
        return out;
    }

    out.push('\n');
    for hour in &resp.hourly_forecast {
        let precipitation = match hour.precipitation_type {
            PrecipitationType::None => String::new(),
            kind => format!(
                "  {:?}/{:?} {}%",
                kind, hour.precipitation_intensity, hour.precipitation_probability
            ),
        };
        let _ = writeln!(
            out,
            "{:>10}  {:>6.1}°{}  {}{}",
            hour.relative_time,
            hour.temperature.value,
            hour.temperature.unit,
            hour.weather_text,
            precipitation,
        );
    }

    out
}
