use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{ http_client, ToolError };

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_USER_AGENT: &str = "SmartTour";
/// Used when the reverse lookup has no city, town or village.
pub const FALLBACK_PLACE: &str = "your location";

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<String, ToolError>;
}

pub struct NominatimGeocoder {
    http: reqwest::Client,
    base_url: String,
    user_agent: String,
}

#[derive(Deserialize, Default)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

pub(crate) fn parse_place(body: &str) -> Result<String, ToolError> {
    let data: ReverseResponse = serde_json
        ::from_str(body)
        .map_err(|e| ToolError::Transport(format!("Malformed geocoder payload: {}", e)))?;
    let place = data.address
        .and_then(|a| a.city.or(a.town).or(a.village))
        .unwrap_or_else(|| FALLBACK_PLACE.to_string());
    Ok(place)
}

impl NominatimGeocoder {
    pub fn new(
        base_url: Option<String>,
        user_agent: Option<String>,
        timeout: Duration
    ) -> Result<Self, ToolError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            user_agent: user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    fn request_url(&self, lat: f64, lon: f64) -> Result<Url, ToolError> {
        Url::parse_with_params(
            &self.base_url,
            &[
                ("format", "json".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
            ]
        ).map_err(|e| ToolError::Transport(format!("Invalid geocoder URL: {}", e)))
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<String, ToolError> {
        let url = self.request_url(lat, lon)?;
        debug!("Reverse geocoding {}", url);
        let resp = self.http
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::Transport(format!("API Error: {}", status.as_u16())));
        }
        let body = resp.text().await?;
        parse_place(&body)
    }
}
