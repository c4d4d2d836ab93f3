//! Deterministic stand-ins for the model, the data adapters and the geocoder.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Mutex;

use crate::llm::chat::{ ChatClient, CompletionResponse, TokenStream };
use crate::llm::LlmError;
use crate::models::chat::ChatMessage;
use crate::tools::currency::Conversion;
use crate::tools::flight::{ FlightBoard, FlightInfo };
use crate::tools::geocode::ReverseGeocoder;
use crate::tools::weather::WeatherReport;
use crate::tools::{ DataAdapters, ToolError };

pub const DEFAULT_REPLY: &str = "scripted reply";

/// Streams a fixed token list and answers `complete` from a queue.
#[derive(Default)]
pub struct ScriptedChatClient {
    stream_tokens: Vec<String>,
    stream_error: Option<String>,
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, tokens: &[&str]) -> Self {
        self.stream_tokens = tokens
            .iter()
            .map(|t| t.to_string())
            .collect();
        self
    }

    /// The stream fails after yielding its tokens.
    pub fn with_stream_error(mut self, message: &str) -> Self {
        self.stream_error = Some(message.to_string());
        self
    }

    pub fn with_reply(self, reply: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn with_failed_reply(self, message: &str) -> Self {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    /// Every prompt sent, streaming or not, in call order.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(response)) => Ok(CompletionResponse { response }),
            Some(Err(message)) => Err(LlmError::Provider(message)),
            None => Ok(CompletionResponse { response: DEFAULT_REPLY.to_string() }),
        }
    }

    async fn stream_completion(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let mut items: Vec<Result<String, LlmError>> = self.stream_tokens
            .iter()
            .cloned()
            .map(Ok)
            .collect();
        if let Some(message) = &self.stream_error {
            items.push(Err(LlmError::Provider(message.clone())));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }

    fn supports_native_streaming(&self) -> bool {
        true
    }
}

/// Canned adapter answers; `failing` makes every lookup return that error.
#[derive(Default)]
pub struct StubAdapters {
    failing: Option<ToolError>,
    calls: AtomicUsize,
}

impl StubAdapters {
    pub fn failing(error: ToolError) -> Self {
        Self { failing: Some(error), calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failing {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DataAdapters for StubAdapters {
    async fn weather(&self, place: &str) -> Result<WeatherReport, ToolError> {
        self.check()?;
        Ok(WeatherReport {
            city: place.to_string(),
            description: "Clear sky".to_string(),
            temp: 21.0,
            humidity: 40.0,
            wind_speed: 2.5,
        })
    }

    async fn flights(
        &self,
        origin: &str,
        destination: &str,
        _date: Option<&str>
    ) -> Result<FlightBoard, ToolError> {
        self.check()?;
        Ok(FlightBoard {
            flights: vec![FlightInfo {
                airline: "Turkish Airlines".to_string(),
                flight_number: "TK1861".to_string(),
                departure: origin.to_string(),
                arrival: destination.to_string(),
                dep_time: "08:00".to_string(),
                arr_time: "10:30".to_string(),
                status: "scheduled".to_string(),
            }],
        })
    }

    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion, ToolError> {
        self.check()?;
        Ok(Conversion {
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            amount,
            rate: 0.5,
            converted: amount * 0.5,
        })
    }
}

pub struct StubGeocoder {
    answer: Result<String, ToolError>,
    calls: AtomicUsize,
}

impl StubGeocoder {
    pub fn resolving(place: &str) -> Self {
        Self { answer: Ok(place.to_string()), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err(ToolError::Transport("timeout".to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for StubGeocoder {
    async fn reverse(&self, _lat: f64, _lon: f64) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}
