use log::debug;
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::time::Duration;

use super::{ http_client, ToolError };

pub const DEFAULT_BASE_URL: &str = "https://api.currencyapi.com/v3/latest";

pub struct CurrencyClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub from_currency: String,
    pub to_currency: String,
    pub amount: f64,
    pub rate: f64,
    pub converted: f64,
}

impl Conversion {
    pub fn formatted(&self) -> String {
        format!(
            "{} {} = {:.2} {} (Rate: {:.4})",
            self.amount,
            self.from_currency,
            self.converted,
            self.to_currency,
            self.rate
        )
    }
}

#[derive(Deserialize)]
struct LatestResponse {
    data: Option<HashMap<String, RateValue>>,
}

#[derive(Deserialize)]
struct RateValue {
    value: f64,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = (10f64).powi(places);
    (value * factor).round() / factor
}

pub(crate) fn parse_conversion(
    amount: f64,
    from: &str,
    to: &str,
    body: &str
) -> Result<Conversion, ToolError> {
    let data: LatestResponse = serde_json
        ::from_str(body)
        .map_err(|e| ToolError::Transport(format!("Malformed currency payload: {}", e)))?;
    let from = from.to_uppercase();
    let to = to.to_uppercase();
    let rate = data.data
        .as_ref()
        .and_then(|rates| rates.get(&to))
        .map(|r| r.value)
        .ok_or_else(|| ToolError::Data("Invalid currency code".to_string()))?;

    Ok(Conversion {
        from_currency: from,
        to_currency: to,
        amount,
        rate,
        converted: round_to(amount * rate, 2),
    })
}

impl CurrencyClient {
    pub fn new(api_key: String, base_url: Option<String>, timeout: Duration) -> Result<Self, ToolError> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion, ToolError> {
        debug!("Converting {} {} to {}", amount, from, to);
        let base = from.to_uppercase();
        let target = to.to_uppercase();
        let resp = self.http
            .get(&self.base_url)
            .query(
                &[
                    ("apikey", self.api_key.as_str()),
                    ("base_currency", base.as_str()),
                    ("currencies", target.as_str()),
                ]
            )
            .send().await?;

        let status = resp.status();
        // currencyapi answers 422 for codes it does not know
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ToolError::Data("Invalid currency code".to_string()));
        }
        if !status.is_success() {
            return Err(ToolError::Transport(format!("API Error: {}", status.as_u16())));
        }
        let body = resp.text().await?;
        parse_conversion(amount, &base, &target, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_and_rounds() {
        let body = r#"{"meta":{"last_updated_at":"2025-01-01T00:00:00Z"},"data":{"EUR":{"code":"EUR","value":0.923456}}}"#;
        let conversion = parse_conversion(100.0, "usd", "eur", body).unwrap();
        assert_eq!(conversion.from_currency, "USD");
        assert_eq!(conversion.converted, 92.35);
        assert_eq!(conversion.formatted(), "100 USD = 92.35 EUR (Rate: 0.9235)");
    }

    #[test]
    fn unknown_code_is_a_data_failure() {
        let err = parse_conversion(1.0, "USD", "XYZ", r#"{"message":"validation"}"#).unwrap_err();
        assert_eq!(err, ToolError::Data("Invalid currency code".into()));

        let err = parse_conversion(1.0, "USD", "XYZ", r#"{"data":{"EUR":{"value":0.9}}}"#).unwrap_err();
        assert!(!err.is_transport());
    }

    #[test]
    fn non_json_body_is_transport_failure() {
        assert!(parse_conversion(1.0, "USD", "EUR", "<html>").unwrap_err().is_transport());
    }
}
