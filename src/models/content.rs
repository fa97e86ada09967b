use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryBestTime {
    pub id: String,
    pub country_id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCountryBestTime {
    pub country_id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryOverview {
    pub id: String,
    pub country_id: String,
    pub body: String,
    pub wikipedia_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCountryOverview {
    pub country_id: String,
    pub body: String,
    pub wikipedia_url: String,
}

/// AI suggestion template. Suggestions without a country are general.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryAiSuggest {
    pub id: String,
    pub country_id: Option<String>,
    pub suggest_text: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCountryAiSuggest {
    pub country_id: Option<String>,
    pub suggest_text: String,
    pub prompt: String,
}
