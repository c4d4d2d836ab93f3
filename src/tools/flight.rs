use log::debug;
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ http_client, ToolError };

pub const DEFAULT_BASE_URL: &str = "http://api.aviationstack.com/v1/flights";
const MAX_FLIGHTS: usize = 5;
const UNKNOWN: &str = "Unknown";

pub struct FlightClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightInfo {
    pub airline: String,
    pub flight_number: String,
    pub departure: String,
    pub arrival: String,
    pub dep_time: String,
    pub arr_time: String,
    pub status: String,
}

/// Up to five flights for one route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightBoard {
    pub flights: Vec<FlightInfo>,
}

impl FlightBoard {
    pub fn count(&self) -> usize {
        self.flights.len()
    }

    pub fn formatted(&self) -> String {
        let mut result = format!("✈️ Found {} flights:\n\n", self.count());
        for (i, flight) in self.flights.iter().enumerate() {
            result.push_str(
                &format!(
                    "{}. {} ({})\n   {} → {}\n   Departure: {}\n   Arrival: {}\n   Status: {}\n\n",
                    i + 1,
                    flight.airline,
                    flight.flight_number,
                    flight.departure,
                    flight.arrival,
                    flight.dep_time,
                    flight.arr_time,
                    flight.status
                )
            );
        }
        result
    }
}

#[derive(Deserialize)]
struct AviationResponse {
    #[serde(default)]
    data: Option<Vec<AviationFlight>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AviationFlight {
    airline: Option<NamedField>,
    flight: Option<FlightCode>,
    departure: Option<Endpoint>,
    arrival: Option<Endpoint>,
    flight_status: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct NamedField {
    name: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct FlightCode {
    iata: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Endpoint {
    airport: Option<String>,
    scheduled: Option<String>,
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

pub(crate) fn parse_board(body: &str) -> Result<FlightBoard, ToolError> {
    let data: AviationResponse = serde_json
        ::from_str(body)
        .map_err(|e| ToolError::Transport(format!("Malformed flight payload: {}", e)))?;
    let rows = data.data.unwrap_or_default();
    if rows.is_empty() {
        return Err(ToolError::Data("No flights found".to_string()));
    }

    let flights = rows
        .into_iter()
        .take(MAX_FLIGHTS)
        .map(|row| {
            let departure = row.departure.unwrap_or_default();
            let arrival = row.arrival.unwrap_or_default();
            FlightInfo {
                airline: or_unknown(row.airline.and_then(|a| a.name)),
                flight_number: or_unknown(row.flight.and_then(|f| f.iata)),
                departure: or_unknown(departure.airport),
                arrival: or_unknown(arrival.airport),
                dep_time: or_unknown(departure.scheduled),
                arr_time: or_unknown(arrival.scheduled),
                status: or_unknown(row.flight_status),
            }
        })
        .collect();

    Ok(FlightBoard { flights })
}

impl FlightClient {
    pub fn new(api_key: String, base_url: Option<String>, timeout: Duration) -> Result<Self, ToolError> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    /// `date` is `YYYY-MM-DD` when given.
    pub async fn search(
        &self,
        dep_iata: &str,
        arr_iata: &str,
        date: Option<&str>
    ) -> Result<FlightBoard, ToolError> {
        debug!("Searching flights {} -> {} on {:?}", dep_iata, arr_iata, date);
        let mut params = vec![
            ("access_key", self.api_key.as_str()),
            ("dep_iata", dep_iata),
            ("arr_iata", arr_iata)
        ];
        if let Some(date) = date {
            params.push(("flight_date", date));
        }

        let resp = self.http.get(&self.base_url).query(&params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::Transport(format!("API Error: {}", status.as_u16())));
        }
        let body = resp.text().await?;
        parse_board(&body)
    }
}
