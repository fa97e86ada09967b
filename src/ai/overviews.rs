use serde::Deserialize;

use super::assignments::{country_list, parse_assignments, require, Assignment};
use super::openai::{CompletionClient, CompletionRequest, ResponseFormat};
use crate::error::{AppError, Result};
use crate::models::Country;

pub const BATCH_SIZE: usize = 20;

const SYSTEM_PROMPT: &str = r#"You are an expert travel copywriter for a travel app.
Write a concise, informative travel overview for each country in the list.

Output format (critical):
- Return one JSON object with exactly one key, "assignments", holding an array.
- Each element has "country_iso2" and "body".

Rules for "body":
- 2 to 4 sentences of clear, modern English prose.
- Describe the overall travel vibe, typical experiences and the travelers it suits.
- General climate notes are allowed.
- No lists, headings, emojis, URLs or Wikipedia references.
- Only widely known, realistic information.

Example:
{
  "assignments": [
    {"country_iso2": "JP", "body": "Japan blends ancient traditions with ultramodern city life. Visitors explore historic temples, neon-lit districts and scenic mountains. It suits culture lovers and food enthusiasts alike."}
  ]
}"#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverviewAssignment {
    pub country_iso2: String,
    pub body: String,
}

impl Assignment for OverviewAssignment {
    fn validate(&self) -> Result<()> {
        require("country_iso2", &self.country_iso2)?;
        require("body", &self.body)
    }
}

pub fn user_prompt(countries: &[Country]) -> String {
    format!(
        r#"Countries:

{}

Write a travel overview for each country above covering its overall appeal, the experiences travelers can expect, who it suits and optional high-level climate notes.

Return only the JSON object with the "assignments" key."#,
        country_list(countries)
    )
}

pub async fn overviews_for(
    client: &dyn CompletionClient,
    countries: &[Country],
) -> Result<Vec<OverviewAssignment>> {
    if countries.is_empty() {
        return Err(AppError::parse("overviews requested for no countries"));
    }

    let request = CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: user_prompt(countries),
        format: ResponseFormat::JsonObject,
    };
    let content = client.complete(&request).await?;
    parse_assignments(&content)
}
