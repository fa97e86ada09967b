use serde::Deserialize;

use super::assignments::{country_list, parse_assignments, require, Assignment};
use super::openai::{CompletionClient, CompletionRequest, ResponseFormat};
use crate::error::{AppError, Result};
use crate::models::Country;

pub const BATCH_SIZE: usize = 20;

const SYSTEM_PROMPT: &str = r#"You are an expert travel advisor.
For every country in the list, give the 2 to 5 best times of the year to visit.

Output format (critical):
- Return one JSON object with exactly one key, "assignments", holding an array.
- Each element has "country_iso2" and "best_times".
- Each "best_times" entry has:
  - "title": a concise period such as "December to March", "Summer" or "During Cherry Blossom Season".
  - "description": 1 or 2 short sentences on why the period is ideal (weather, seasons, festivals, natural phenomena, prices, crowds).
- Use realistic climate and well known events only.
- No text outside the JSON object."#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BestTime {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BestTimeAssignment {
    pub country_iso2: String,
    pub best_times: Vec<BestTime>,
}

impl Assignment for BestTimeAssignment {
    fn validate(&self) -> Result<()> {
        require("country_iso2", &self.country_iso2)?;
        for best_time in &self.best_times {
            require("best_times.title", &best_time.title)?;
            require("best_times.description", &best_time.description)?;
        }
        Ok(())
    }
}

pub fn user_prompt(countries: &[Country]) -> String {
    format!(
        r#"Countries:

{}

For each country above, return 2 to 5 of the best times to visit.

Example:
{{
  "assignments": [
    {{
      "country_iso2": "JP",
      "best_times": [
        {{"title": "Late March to Early April", "description": "Cherry blossoms and mild spring weather."}},
        {{"title": "October to November", "description": "Clear skies and autumn foliage."}}
      ]
    }}
  ]
}}

Return the JSON object for the listed countries only."#,
        country_list(countries)
    )
}

pub async fn best_times_for(
    client: &dyn CompletionClient,
    countries: &[Country],
) -> Result<Vec<BestTimeAssignment>> {
    if countries.is_empty() {
        return Err(AppError::parse("best times requested for no countries"));
    }

    let request = CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: user_prompt(countries),
        format: ResponseFormat::JsonObject,
    };
    let content = client.complete(&request).await?;
    parse_assignments(&content)
}
