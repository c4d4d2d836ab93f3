//! Literal keyword + pattern matching that decides whether an utterance asks
//! for weather, flight or currency data.
//!
//! Rules run in a fixed order (weather, flight, currency) and the first one
//! that produces a complete set of parameters wins.

use lazy_static::lazy_static;
use regex::Regex;

const WEATHER_KEYWORDS: &[&str] = &["weather", "temperature", "forecast", "climate"];
const FLIGHT_KEYWORDS: &[&str] = &["flight", "flights", "plane", "fly"];
const CURRENCY_KEYWORDS: &[&str] = &["convert", "currency", "exchange", "rate"];

lazy_static! {
    static ref PLACE_RE: Regex = Regex::new(r"\b(?:in|for|at)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)").unwrap();
    static ref FLIGHT_RE: Regex = Regex::new(r"(?i:from)\s+([A-Z]{3})\s+(?i:to)\s+([A-Z]{3})").unwrap();
    static ref CURRENCY_RE: Regex = Regex::new(r"(\d+\.?\d*)\s+([A-Z]{3})\s+(?i:to)\s+([A-Z]{3})").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolIntent {
    None,
    Weather(String),
    Flight {
        origin: String,
        destination: String,
    },
    Currency {
        amount: f64,
        from: String,
        to: String,
    },
}

impl ToolIntent {
    pub fn is_none(&self) -> bool {
        matches!(self, ToolIntent::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolIntent::None => "none",
            ToolIntent::Weather(_) => "weather",
            ToolIntent::Flight { .. } => "flight",
            ToolIntent::Currency { .. } => "currency",
        }
    }
}

fn mentions_any(lowered: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lowered.contains(k))
}

/// Pure; never touches the network.
pub fn extract(utterance: &str) -> ToolIntent {
    let lowered = utterance.to_lowercase();

    if mentions_any(&lowered, WEATHER_KEYWORDS) {
        return match PLACE_RE.captures(utterance) {
            Some(caps) => ToolIntent::Weather(caps[1].to_string()),
            None => ToolIntent::None,
        };
    }

    let upper = utterance.to_uppercase();

    if mentions_any(&lowered, FLIGHT_KEYWORDS) {
        if let Some(caps) = FLIGHT_RE.captures(&upper) {
            return ToolIntent::Flight {
                origin: caps[1].to_string(),
                destination: caps[2].to_string(),
            };
        }
    }

    if mentions_any(&lowered, CURRENCY_KEYWORDS) {
        if let Some(caps) = CURRENCY_RE.captures(&upper) {
            if let Ok(amount) = caps[1].parse::<f64>() {
                return ToolIntent::Currency {
                    amount,
                    from: caps[2].to_string(),
                    to: caps[3].to_string(),
                };
            }
        }
    }

    ToolIntent::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_with_city() {
        assert_eq!(extract("What's the weather in Paris?"), ToolIntent::Weather("Paris".into()));
        assert_eq!(
            extract("Give me the forecast for New York tomorrow"),
            ToolIntent::Weather("New York".into())
        );
        assert_eq!(
            extract("TEMPERATURE at Rome please"),
            ToolIntent::Weather("Rome".into())
        );
    }

    #[test]
    fn weather_without_place_degrades_to_none() {
        assert_eq!(extract("how is the weather today?"), ToolIntent::None);
        assert_eq!(extract("what's the weather in paris"), ToolIntent::None);
        // no fall-through into the later rules
        assert_eq!(extract("weather and convert 100 USD to EUR"), ToolIntent::None);
    }

    #[test]
    fn flight_codes_any_keyword_case() {
        let expected = ToolIntent::Flight { origin: "IST".into(), destination: "FCO".into() };
        assert_eq!(extract("flights from IST to FCO"), expected);
        assert_eq!(extract("Flights FROM IST TO FCO"), expected);
        assert_eq!(extract("any plane From IST To FCO?"), expected);
        assert_eq!(extract("fly from ist to fco"), expected);
    }

    #[test]
    fn flight_without_codes_is_none() {
        assert_eq!(extract("I want to fly from Istanbul to Rome"), ToolIntent::None);
        assert_eq!(extract("book me a flight"), ToolIntent::None);
    }

    #[test]
    fn flight_match_blocks_currency() {
        assert_eq!(
            extract("flight from IST to FCO, also convert 100 USD to EUR"),
            ToolIntent::Flight { origin: "IST".into(), destination: "FCO".into() }
        );
    }

    #[test]
    fn currency_conversion() {
        assert_eq!(
            extract("convert 100 USD to EUR"),
            ToolIntent::Currency { amount: 100.0, from: "USD".into(), to: "EUR".into() }
        );
        assert_eq!(
            extract("what is the exchange rate for 12.5 gbp to try"),
            ToolIntent::Currency { amount: 12.5, from: "GBP".into(), to: "TRY".into() }
        );
    }

    #[test]
    fn currency_after_unmatched_flight_keyword() {
        assert_eq!(
            extract("before my flight, convert 50 EUR to USD"),
            ToolIntent::Currency { amount: 50.0, from: "EUR".into(), to: "USD".into() }
        );
    }

    #[test]
    fn plain_chat_is_none() {
        assert_eq!(extract("Tell me about Lisbon's tram 28"), ToolIntent::None);
        assert_eq!(extract("currency tips for Japan?"), ToolIntent::None);
        assert!(extract("").is_none());
    }
}
