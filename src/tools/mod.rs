pub mod currency;
pub mod flight;
pub mod geocode;
pub mod weather;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::cli::Args;
use self::currency::{ Conversion, CurrencyClient };
use self::flight::{ FlightBoard, FlightClient };
use self::weather::{ WeatherClient, WeatherReport };

/// Failure of an external lookup. Never fatal to a turn.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    /// Network error, timeout or unexpected HTTP status.
    #[error("{0}")]
    Transport(String),
    /// The service answered but had nothing usable for the request.
    #[error("{0}")]
    Data(String),
}

impl ToolError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ToolError::Transport(_))
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::Transport(err.to_string())
    }
}

/// The three lookup capabilities the conversation engine can pull in.
#[async_trait]
pub trait DataAdapters: Send + Sync {
    async fn weather(&self, place: &str) -> Result<WeatherReport, ToolError>;

    async fn flights(
        &self,
        origin: &str,
        destination: &str,
        date: Option<&str>
    ) -> Result<FlightBoard, ToolError>;

    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion, ToolError>;
}

pub struct HttpDataAdapters {
    weather: WeatherClient,
    flights: FlightClient,
    currency: CurrencyClient,
}

impl HttpDataAdapters {
    pub fn new(weather: WeatherClient, flights: FlightClient, currency: CurrencyClient) -> Self {
        Self { weather, flights, currency }
    }

    pub fn from_args(args: &Args) -> Result<Self, ToolError> {
        let weather = WeatherClient::new(
            args.openweather_api_key.clone(),
            args.weather_base_url.clone(),
            Duration::from_secs(args.weather_timeout_secs)
        )?;
        let flights = FlightClient::new(
            args.aviationstack_api_key.clone(),
            args.flight_base_url.clone(),
            Duration::from_secs(args.flight_timeout_secs)
        )?;
        let currency = CurrencyClient::new(
            args.currencyapi_key.clone(),
            args.currency_base_url.clone(),
            Duration::from_secs(args.currency_timeout_secs)
        )?;
        Ok(Self::new(weather, flights, currency))
    }
}

#[async_trait]
impl DataAdapters for HttpDataAdapters {
    async fn weather(&self, place: &str) -> Result<WeatherReport, ToolError> {
        self.weather.current(place).await
    }

    async fn flights(
        &self,
        origin: &str,
        destination: &str,
        date: Option<&str>
    ) -> Result<FlightBoard, ToolError> {
        self.flights.search(origin, destination, date).await
    }

    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion, ToolError> {
        self.currency.convert(amount, from, to).await
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ToolError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Upper-cases the first character and lower-cases the rest.
pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub(crate) fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(capitalize)
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_normalises_words() {
        assert_eq!(title_case("new york"), "New York");
        assert_eq!(title_case("PARIS"), "Paris");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn capitalize_touches_only_the_first_letter() {
        assert_eq!(capitalize("broken clouds"), "Broken clouds");
        assert_eq!(capitalize("ÉTÉ"), "Été");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn transport_and_data_failures_differ() {
        assert!(ToolError::Transport("timeout".into()).is_transport());
        assert!(!ToolError::Data("No flights found".into()).is_transport());
        assert_eq!(ToolError::Data("No flights found".into()).to_string(), "No flights found");
    }
}
