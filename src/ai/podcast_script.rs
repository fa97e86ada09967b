use super::openai::{CompletionClient, CompletionRequest, ResponseFormat};
use crate::error::{AppError, Result};
use crate::models::Country;

pub const OPENING_LINE: &str = "Please read aloud the following in a podcast interview style:";

const HOSTS: [&str; 2] = ["Alex:", "Maya:"];
const BRAND: &str = "voyager";

const SYSTEM_PROMPT: &str = r#"You are an expert travel storyteller and podcast scriptwriter.
Write a polished, engaging, medium-length podcast episode about one country.

Hosts:
- Exactly two speakers, Alex and Maya, equal co-hosts.
- Warm, conversational tone. It must sound like a real episode, not an article read aloud.
- Only realistic, widely known information. No invented history, festivals or unverifiable numbers.
- Cover culture, geography, highlights, regional differences, food and practical expectations.

Length: roughly 6 to 9 minutes of speech, about 900 to 1400 words. When unsure, be shorter.

Opening: the first dialogue line is spoken by Alex and greets listeners, mentions "Voyager" and introduces the country.
Closing: as a Voyager tradition the hosts leave listeners with 1 or 2 reflection questions about the country. The final line of the script is Alex thanking listeners and saying goodbye, mentioning "Voyager". Nothing comes after it.

Output format (critical), plain text only:
Please read aloud the following in a podcast interview style:
Alex: <Voyager greeting>
Maya: <response>
...
Alex: <Voyager farewell>

Rules:
- The first line is exactly "Please read aloud the following in a podcast interview style:".
- Every other line starts with "Alex:" or "Maya:".
- No headings, markdown, bullets, narration, stage directions or remarks about being an AI."#;

pub fn user_prompt(country: &Country, wikipedia_url: &str) -> String {
    format!(
        r#"Write a podcast script about this country:

Country: {}
Wikipedia URL: {}

The episode should introduce the country in an engaging way, highlight its cultural identity, landscapes, food and regional variety, and give travelers a realistic sense of what makes it special.

Follow every formatting rule from the system prompt. Return only the script."#,
        country.name, wikipedia_url
    )
}

/// Check the dialogue contract of a generated script.
pub fn validate_script(script: &str) -> Result<()> {
    let lines: Vec<&str> = script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let Some((first, dialogue)) = lines.split_first() else {
        return Err(AppError::parse("podcast script is empty"));
    };
    if *first != OPENING_LINE {
        return Err(AppError::parse(format!(
            "podcast script must start with {:?}, got {:?}",
            OPENING_LINE, first
        )));
    }

    let (Some(greeting), Some(farewell)) = (dialogue.first(), dialogue.last()) else {
        return Err(AppError::parse("podcast script has no dialogue"));
    };

    if let Some(line) = dialogue
        .iter()
        .find(|line| !HOSTS.iter().any(|host| line.starts_with(host)))
    {
        return Err(AppError::parse(format!(
            "podcast line is not spoken by Alex or Maya: {:?}",
            line
        )));
    }

    for (position, line) in [("first", greeting), ("last", farewell)] {
        if !line.starts_with("Alex:") || !line.to_lowercase().contains(BRAND) {
            return Err(AppError::parse(format!(
                "{} dialogue line must be Alex mentioning Voyager: {:?}",
                position, line
            )));
        }
    }

    Ok(())
}

/// Generate and validate the script for one country.
pub async fn generate_script(
    client: &dyn CompletionClient,
    country: &Country,
    wikipedia_url: &str,
) -> Result<String> {
    let request = CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: user_prompt(country, wikipedia_url),
        format: ResponseFormat::Text,
    };
    let script = client.complete(&request).await?.trim().to_string();
    validate_script(&script)?;
    Ok(script)
}
