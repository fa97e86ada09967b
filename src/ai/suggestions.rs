use serde::Deserialize;

use super::assignments::{country_list, parse_assignments, require, Assignment};
use super::openai::{CompletionClient, CompletionRequest, ResponseFormat};
use crate::error::{AppError, Result};
use crate::models::Country;

pub const BATCH_SIZE: usize = 20;

const SYSTEM_PROMPT: &str = r#"You design AI suggestion templates for a travel planning app.

Each suggestion has:
- "suggest_text": a short UI label, at most 50 characters, no emojis. Either an action ("Plan a remote-work friendly trip") or a question a traveler might tap ("How do I get from the airport to the city center?").
- "prompt": a reusable English instruction for the AI model at runtime ("You are a travel planner who helps the user..."), describing what to do, how detailed to be and how to structure the answer. Use {{PLACEHOLDERS}} such as {{COUNTRY_NAME}}, {{DESTINATION_NAME}}, {{TRIP_LENGTH_DAYS}}, {{BUDGET_LEVEL}}, {{SEASON}} or {{TRAVELER_TYPE}} for dynamic values.
- "country_iso2": only for country-specific suggestions.

Modes:
1) GENERAL: suggestions are not tied to a country. Objects MUST NOT contain "country_iso2". Prompts must not assume a country or city.
2) COUNTRY_SPECIFIC: every object MUST contain "country_iso2". Prompts reflect realistic travel patterns in that country.

Cover a wide range of needs (itineraries, first sights, airport transfers, where to stay, budget, food, nightlife, nature, culture, safety, etiquette, packing, short and long trips). Phrase a meaningful share of suggestions as questions ending with "?". Suggestions in one answer must differ in meaning.

Output format (critical): one JSON object with exactly one key, "assignments", holding an array of suggestion objects. No text outside the JSON object."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestMode {
    General,
    CountrySpecific,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuggestAssignment {
    pub suggest_text: String,
    pub prompt: String,
    #[serde(default)]
    pub country_iso2: Option<String>,
}

impl Assignment for SuggestAssignment {
    fn validate(&self) -> Result<()> {
        require("suggest_text", &self.suggest_text)?;
        require("prompt", &self.prompt)
    }
}

impl SuggestAssignment {
    fn check_mode(&self, mode: SuggestMode) -> Result<()> {
        let has_country = self
            .country_iso2
            .as_deref()
            .is_some_and(|iso2| !iso2.trim().is_empty());

        match (mode, has_country) {
            (SuggestMode::General, true) => Err(AppError::parse(format!(
                "general suggestion {:?} must not carry country_iso2",
                self.suggest_text
            ))),
            (SuggestMode::CountrySpecific, false) => Err(AppError::parse(format!(
                "country suggestion {:?} is missing country_iso2",
                self.suggest_text
            ))),
            _ => Ok(()),
        }
    }
}

pub fn user_prompt(mode: SuggestMode, countries: &[Country]) -> String {
    match mode {
        SuggestMode::General => r#"MODE: GENERAL

Generate 10 to 15 general travel-planner suggestion templates.
- Do not include "country_iso2" in any object.
- Suggestions must work for any destination.
- At least a third must be natural questions ending with a question mark.

Return only the JSON object with the "assignments" key."#
            .to_string(),
        SuggestMode::CountrySpecific => format!(
            r#"MODE: COUNTRY_SPECIFIC

Countries:

{}

For EACH country above, generate 3 to 6 country-specific travel-planner suggestion templates.
- Every object must include "country_iso2" from the list.
- Reflect how people typically travel there (regions, cities and nature, coast or inland, road trips, cultural highlights).
- At least a third per country must be natural questions ending with a question mark.
- Vary intentions: first visits, choosing regions, short or long trips, food, nature, families, solo and remote work, safety, getting around.

Return only the JSON object with the "assignments" key."#,
            country_list(countries)
        ),
    }
}

pub async fn suggestions_for(
    client: &dyn CompletionClient,
    mode: SuggestMode,
    countries: &[Country],
) -> Result<Vec<SuggestAssignment>> {
    if mode == SuggestMode::CountrySpecific && countries.is_empty() {
        return Err(AppError::parse("country suggestions requested for no countries"));
    }

    let request = CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: user_prompt(mode, countries),
        format: ResponseFormat::JsonObject,
    };
    let content = client.complete(&request).await?;
    let assignments: Vec<SuggestAssignment> = parse_assignments(&content)?;

    for assignment in &assignments {
        assignment.check_mode(mode)?;
    }
    Ok(assignments)
}
