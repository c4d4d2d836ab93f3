use log::info;
use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Prompt template '{template}' is missing placeholder '{{{placeholder}}}'")]
    MissingPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },
}

/// Every system prompt and request template the assistant sends.
///
/// A prompts file only needs the keys it overrides; the rest keep their
/// built-in wording.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub persona: String,
    pub interest_context: String,
    pub summary_system: String,
    pub summary_request: String,
    pub itinerary_system: String,
    pub itinerary_request: String,
    pub experiences_system: String,
    pub experiences_request: String,
    pub plan_summary_system: String,
    pub plan_summary_request: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona: concat!(
                "You are SmartTour, a professional, friendly, and knowledgeable tourism assistant. ",
                "You help users explore destinations, plan trips, and discover cultural and culinary highlights. ",
                "You have access to real-time weather, flight, and currency data. ",
                "Provide concise yet inspiring answers with practical travel tips and local insights."
            ).to_string(),
            interest_context: concat!(
                "\n\nThe user is particularly interested in: {summary}. ",
                "You should tailor your responses with this context in mind."
            ).to_string(),
            summary_system: "You summarize user's travel interests from conversation history.".to_string(),
            summary_request: "Given this chat:\n\n{history}\n\nWhat are the user's travel preferences?".to_string(),
            itinerary_system: "You are a professional travel planner.".to_string(),
            itinerary_request: concat!(
                "You are a travel planner. Create a detailed {days}-day itinerary for {city}.\n",
                "User interests: {interests}\n\n",
                "Format:\n",
                "Day 1:\n",
                "- Morning: [activity]\n",
                "- Afternoon: [activity]\n",
                "- Evening: [activity]\n\n",
                "Day 2:\n",
                "...\n\n",
                "Be specific with places, times, and practical tips."
            ).to_string(),
            experiences_system: "You are a local food and culture expert.".to_string(),
            experiences_request: concat!(
                "Recommend 5 must-try local dishes and best restaurants in {city}. ",
                "Include dish names, descriptions, and where to find them.\n\n",
                "Suggest 5 cultural experiences in {city} (museums, theaters, festivals, traditions). ",
                "Include practical details."
            ).to_string(),
            plan_summary_system: "You are a travel summarization expert.".to_string(),
            plan_summary_request: concat!(
                "Summarize this travel plan concisely:\n\n",
                "ITINERARY:\n{itinerary}\n\n",
                "EXPERIENCES:\n{experiences}\n\n",
                "Provide:\n",
                "1. Overview (2-3 sentences)\n",
                "2. Key highlights (3-5 bullet points)\n",
                "3. Budget estimate\n",
                "4. Best time to visit\n",
                "5. Pro tips (2-3 practical advice)"
            ).to_string(),
        }
    }
}

impl PromptConfig {
    fn required_placeholders(&self) -> [(&'static str, &str, &'static [&'static str]); 5] {
        [
            ("interest_context", &self.interest_context, &["summary"]),
            ("summary_request", &self.summary_request, &["history"]),
            ("itinerary_request", &self.itinerary_request, &["days", "city", "interests"]),
            ("experiences_request", &self.experiences_request, &["city"]),
            ("plan_summary_request", &self.plan_summary_request, &["itinerary", "experiences"]),
        ]
    }

    pub fn validate(&self) -> Result<(), PromptError> {
        for (template, text, placeholders) in self.required_placeholders() {
            for &placeholder in placeholders {
                if !text.contains(&format!("{{{}}}", placeholder)) {
                    return Err(PromptError::MissingPlaceholder { template, placeholder });
                }
            }
        }
        Ok(())
    }
}

/// Replaces each `{name}` in `template` with its value.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{}}}", name), value)
    })
}

pub fn load_prompts(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    let config = match path {
        Some(path) => {
            info!("Loading prompt overrides from {}", path);
            let file_content = fs::read_to_string(path)?;
            serde_json::from_str::<PromptConfig>(&file_content)?
        }
        None => PromptConfig::default(),
    };
    config.validate()?;
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PromptConfig::default().validate().is_ok());
        assert!(PromptConfig::default().persona.starts_with("You are SmartTour"));
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: PromptConfig = serde_json
            ::from_str(r#"{"persona": "You are a pirate travel agent."}"#)
            .unwrap();
        assert_eq!(config.persona, "You are a pirate travel agent.");
        assert_eq!(config.itinerary_system, "You are a professional travel planner.");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_placeholder_is_rejected() {
        let config: PromptConfig = serde_json
            ::from_str(r#"{"summary_request": "What does the user like?"}"#)
            .unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PromptError::MissingPlaceholder { template: "summary_request", .. }));
        assert_eq!(
            err.to_string(),
            "Prompt template 'summary_request' is missing placeholder '{history}'"
        );
    }

    #[test]
    fn fill_substitutes_every_occurrence() {
        let text = fill("{city} in {days} days, then {city} again", &[
            ("city", "Rome"),
            ("days", "3"),
        ]);
        assert_eq!(text, "Rome in 3 days, then Rome again");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_prompts(Some("/nonexistent/prompts.json")).unwrap_err();
        assert!(matches!(err, PromptError::IoError(_)));
    }
}
