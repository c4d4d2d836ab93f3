//! Three-stage travel plan: itinerary, then food and culture, then a summary
//! that reads both.

use log::info;
use std::sync::Arc;

use crate::config::prompt::{ fill, PromptConfig };
use crate::llm::chat::ChatClient;
use crate::llm::LlmError;
use crate::models::chat::ChatMessage;
use crate::models::plan::Plan;

const NO_INTERESTS: &str = "general sightseeing";

#[derive(Clone)]
pub struct PlanOrchestrator {
    chat_client: Arc<dyn ChatClient>,
    prompts: Arc<PromptConfig>,
}

impl PlanOrchestrator {
    pub fn new(chat_client: Arc<dyn ChatClient>, prompts: Arc<PromptConfig>) -> Self {
        Self { chat_client, prompts }
    }

    /// Stages run strictly one after another; any stage failing fails the plan.
    pub async fn create_plan(
        &self,
        city: &str,
        days: u32,
        interests: &[String]
    ) -> Result<Plan, LlmError> {
        info!("Planning {} days in {}", days, city);

        let itinerary = self.create_itinerary(city, days, interests).await?;
        let experiences = self.recommend_experiences(city).await?;
        let summary = self.summarize(&itinerary, &experiences).await?;

        Ok(Plan::new(city, days, interests.to_vec(), itinerary, experiences, summary))
    }

    async fn create_itinerary(
        &self,
        city: &str,
        days: u32,
        interests: &[String]
    ) -> Result<String, LlmError> {
        let interests = if interests.is_empty() {
            NO_INTERESTS.to_string()
        } else {
            interests.join(", ")
        };
        let days = days.to_string();
        let request = fill(&self.prompts.itinerary_request, &[
            ("days", days.as_str()),
            ("city", city),
            ("interests", interests.as_str()),
        ]);
        self.ask(&self.prompts.itinerary_system, request).await
    }

    async fn recommend_experiences(&self, city: &str) -> Result<String, LlmError> {
        let request = fill(&self.prompts.experiences_request, &[("city", city)]);
        self.ask(&self.prompts.experiences_system, request).await
    }

    async fn summarize(&self, itinerary: &str, experiences: &str) -> Result<String, LlmError> {
        let request = fill(&self.prompts.plan_summary_request, &[
            ("itinerary", itinerary),
            ("experiences", experiences),
        ]);
        self.ask(&self.prompts.plan_summary_system, request).await
    }

    async fn ask(&self, system: &str, request: String) -> Result<String, LlmError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(request)];
        Ok(self.chat_client.complete(&messages).await?.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedChatClient;

    fn orchestrator(client: &Arc<ScriptedChatClient>) -> PlanOrchestrator {
        PlanOrchestrator::new(client.clone(), Arc::new(PromptConfig::default()))
    }

    #[tokio::test]
    async fn three_stages_in_order() {
        let client = Arc::new(
            ScriptedChatClient::new()
                .with_reply("Day 1: Colosseum")
                .with_reply("Eat carbonara")
                .with_reply("A classic Roman weekend")
        );
        let plan = orchestrator(&client)
            .create_plan("Rome", 2, &["history".to_string(), "food".to_string()]).await
            .unwrap();

        assert_eq!(plan.itinerary(), "Day 1: Colosseum");
        assert_eq!(plan.experiences(), "Eat carbonara");
        assert_eq!(plan.summary(), "A classic Roman weekend");
        assert_eq!(plan.interests(), ["history".to_string(), "food".to_string()]);
        assert!(plan.full_text().starts_with("# Rome Travel Plan (2 Days)\n\nA classic Roman weekend"));

        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0][0].content, "You are a professional travel planner.");
        assert!(calls[0][1].content.contains("detailed 2-day itinerary for Rome"));
        assert!(calls[0][1].content.contains("User interests: history, food"));
        assert_eq!(calls[1][0].content, "You are a local food and culture expert.");
        assert!(calls[1][1].content.contains("restaurants in Rome"));
        assert_eq!(calls[2][0].content, "You are a travel summarization expert.");
        assert!(calls[2][1].content.contains("ITINERARY:\nDay 1: Colosseum"));
        assert!(calls[2][1].content.contains("EXPERIENCES:\nEat carbonara"));
    }

    #[tokio::test]
    async fn empty_interests_mean_general_sightseeing() {
        let client = Arc::new(ScriptedChatClient::new());
        let plan = orchestrator(&client).create_plan("Oslo", 1, &[]).await.unwrap();
        assert!(plan.interests().is_empty());
        assert!(client.calls()[0][1].content.contains("User interests: general sightseeing"));
    }

    #[tokio::test]
    async fn failed_stage_stops_the_pipeline() {
        let client = Arc::new(
            ScriptedChatClient::new().with_reply("itinerary").with_failed_reply("overloaded")
        );
        let err = orchestrator(&client).create_plan("Rome", 3, &[]).await.unwrap_err();
        assert!(matches!(err, LlmError::Provider(_)));
        assert_eq!(client.call_count(), 2);
    }
}
