use std::collections::HashMap;

use serde::Deserialize;

use super::assignments::{parse_assignments, require, Assignment};
use super::openai::{CompletionClient, CompletionRequest, ResponseFormat};
use crate::error::{AppError, Result};
use crate::models::{Country, Vibe, VibeCategory};

pub const BATCH_SIZE: usize = 20;

const SYSTEM_PROMPT: &str = r#"You assign the most fitting vibes (atmospheres) to countries.
Match each country with 3 to 5 vibes from the provided list.

Rules:
- Use ONLY vibe titles from the list, spelled exactly as given.
- Never invent new vibes.
- Base the choice on geography, culture, climate and how travelers perceive the country.
- Answer with a single JSON object whose only key is "assignments". No comments, no prose."#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VibeAssignment {
    pub country_iso2: String,
    pub vibe_titles: Vec<String>,
}

impl Assignment for VibeAssignment {
    fn validate(&self) -> Result<()> {
        require("country_iso2", &self.country_iso2)
    }
}

pub fn user_prompt(vibes: &[Vibe], categories: &[VibeCategory], countries: &[Country]) -> String {
    let category_titles: HashMap<&str, &str> = categories
        .iter()
        .map(|c| (c.id.as_str(), c.title.as_str()))
        .collect();

    let vibe_lines: Vec<String> = vibes
        .iter()
        .map(|vibe| match category_titles.get(vibe.category_id.as_str()) {
            Some(category) => format!("- \"{}\" ({}) [{}]", vibe.title, vibe.icon_emoji, category),
            None => format!("- \"{}\" ({})", vibe.title, vibe.icon_emoji),
        })
        .collect();

    let country_lines: Vec<String> = countries
        .iter()
        .map(|c| format!("{}, primary_language {}", c.prompt_line(), c.primary_language))
        .collect();

    format!(
        r#"Available vibes (title, emoji, category):
{}

Countries to annotate:
{}

For each country choose 3 to 5 vibes that best match its atmosphere, culture, geography, lifestyle or global perception.

Output format:
{{
  "assignments": [
    {{"country_iso2": "BR", "vibe_titles": ["Beach", "Party", "Nature"]}},
    {{"country_iso2": "JP", "vibe_titles": ["Technology", "Urban", "Culture"]}}
  ]
}}"#,
        vibe_lines.join("\n"),
        country_lines.join("\n")
    )
}

pub async fn assign_vibes(
    client: &dyn CompletionClient,
    vibes: &[Vibe],
    categories: &[VibeCategory],
    countries: &[Country],
) -> Result<Vec<VibeAssignment>> {
    if vibes.is_empty() {
        return Err(AppError::parse("cannot assign vibes without a vibe list"));
    }
    if countries.is_empty() {
        return Ok(Vec::new());
    }

    let request = CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: user_prompt(vibes, categories, countries),
        format: ResponseFormat::JsonObject,
    };
    let content = client.complete(&request).await?;
    parse_assignments(&content)
}
