use log::debug;
use reqwest::StatusCode;
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ capitalize, http_client, title_case, ToolError };

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

pub struct WeatherClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city: String,
    pub description: String,
    pub temp: f64,
    pub humidity: f64,
    pub wind_speed: f64,
}

impl WeatherReport {
    pub fn formatted(&self) -> String {
        format!(
            "The current weather in {} is {}, {}°C, humidity {}% and wind speed {} m/s.",
            self.city,
            self.description,
            self.temp,
            self.humidity,
            self.wind_speed
        )
    }
}

#[derive(Deserialize)]
struct OwmResponse {
    main: OwmMain,
    weather: Vec<OwmCondition>,
    wind: OwmWind,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Deserialize)]
struct OwmWind {
    speed: f64,
}

pub(crate) fn parse_report(city: &str, body: &str) -> Result<WeatherReport, ToolError> {
    let data: OwmResponse = serde_json
        ::from_str(body)
        .map_err(|e| ToolError::Transport(format!("Malformed weather payload: {}", e)))?;
    let condition = data.weather
        .first()
        .ok_or_else(|| ToolError::Data(format!("Could not find weather for {}", city)))?;

    Ok(WeatherReport {
        city: title_case(city),
        description: capitalize(&condition.description),
        temp: data.main.temp,
        humidity: data.main.humidity,
        wind_speed: data.wind.speed,
    })
}

impl WeatherClient {
    pub fn new(api_key: String, base_url: Option<String>, timeout: Duration) -> Result<Self, ToolError> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub async fn current(&self, city: &str) -> Result<WeatherReport, ToolError> {
        debug!("Fetching weather for {}", city);
        let resp = self.http
            .get(&self.base_url)
            .query(
                &[
                    ("q", city),
                    ("appid", self.api_key.as_str()),
                    ("units", "metric"),
                    ("lang", "en"),
                ]
            )
            .send().await?;

        match resp.status() {
            status if status.is_success() => {
                let body = resp.text().await?;
                parse_report(city, &body)
            }
            StatusCode::NOT_FOUND => Err(ToolError::Data(format!("Could not find weather for {}", city))),
            status => Err(ToolError::Transport(format!("API Error: {}", status.as_u16()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: &str = r#"{
        "weather": [{"id": 800, "main": "Clear", "description": "clear sky"}],
        "main": {"temp": 18.4, "feels_like": 17.9, "humidity": 55},
        "wind": {"speed": 3.6, "deg": 240},
        "name": "Paris"
    }"#;

    #[test]
    fn parses_openweather_payload() {
        let report = parse_report("paris", PARIS).unwrap();
        assert_eq!(report.city, "Paris");
        assert_eq!(report.description, "Clear sky");
        assert_eq!(report.humidity, 55.0);
        assert_eq!(
            report.formatted(),
            "The current weather in Paris is Clear sky, 18.4°C, humidity 55% and wind speed 3.6 m/s."
        );
    }

    #[test]
    fn malformed_payload_is_not_a_data_failure() {
        let err = parse_report("Paris", r#"{"cod": 200}"#).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn empty_conditions_is_a_data_failure() {
        let body = r#"{"weather": [], "main": {"temp": 1.0, "humidity": 1}, "wind": {"speed": 1.0}}"#;
        assert_eq!(
            parse_report("Atlantis", body).unwrap_err(),
            ToolError::Data("Could not find weather for Atlantis".into())
        );
    }
}
