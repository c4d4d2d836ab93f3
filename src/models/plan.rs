use serde::Serialize;

/// Composite three-stage travel plan.
///
/// Fields are private so `full_text` can never drift from the parts it is
/// rendered from; build one through [`Plan::new`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Plan {
    city: String,
    days: u32,
    interests: Vec<String>,
    itinerary: String,
    experiences: String,
    summary: String,
    full_text: String,
}

impl Plan {
    pub fn new(
        city: impl Into<String>,
        days: u32,
        interests: Vec<String>,
        itinerary: impl Into<String>,
        experiences: impl Into<String>,
        summary: impl Into<String>
    ) -> Self {
        let city = city.into();
        let itinerary = itinerary.into();
        let experiences = experiences.into();
        let summary = summary.into();
        let full_text = render_full_text(&city, days, &summary, &itinerary, &experiences);
        Self { city, days, interests, itinerary, experiences, summary, full_text }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn interests(&self) -> &[String] {
        &self.interests
    }

    pub fn itinerary(&self) -> &str {
        &self.itinerary
    }

    pub fn experiences(&self) -> &str {
        &self.experiences
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }
}

pub fn render_full_text(
    city: &str,
    days: u32,
    summary: &str,
    itinerary: &str,
    experiences: &str
) -> String {
    format!(
        "# {} Travel Plan ({} Days)\n\n{}\n\n## Itinerary\n{}\n\n## Experiences\n{}",
        city,
        days,
        summary,
        itinerary,
        experiences
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_text_is_deterministic() {
        let a = Plan::new("Rome", 3, vec!["food".into()], "Day 1", "Carbonara", "Great trip");
        let b = Plan::new("Rome", 3, vec!["food".into()], "Day 1", "Carbonara", "Great trip");
        assert_eq!(a.full_text(), b.full_text());
        assert_eq!(
            a.full_text(),
            "# Rome Travel Plan (3 Days)\n\nGreat trip\n\n## Itinerary\nDay 1\n\n## Experiences\nCarbonara"
        );
    }

    #[test]
    fn full_text_follows_every_rendered_field() {
        let base = Plan::new("Rome", 3, vec![], "Day 1", "Carbonara", "Great trip");
        let other_days = Plan::new("Rome", 4, vec![], "Day 1", "Carbonara", "Great trip");
        let other_summary = Plan::new("Rome", 3, vec![], "Day 1", "Carbonara", "Short trip");
        assert_ne!(base.full_text(), other_days.full_text());
        assert_ne!(base.full_text(), other_summary.full_text());
    }

    #[test]
    fn serializes_with_flat_field_names() {
        let plan = Plan::new("Lisbon", 2, vec!["music".into()], "i", "e", "s");
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["city"], "Lisbon");
        assert_eq!(value["days"], 2);
        assert_eq!(value["interests"][0], "music");
        assert!(value["full_text"].as_str().unwrap().starts_with("# Lisbon"));
    }
}
