use serde::{Deserialize, Serialize};

/// Row of the `countries` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: String,
    pub iso2: String,
    pub name: String,
    pub capital: String,
    pub continent: String,
    pub primary_language: String,
    pub primary_language_code: String,
    pub primary_currency: String,
    pub primary_currency_code: String,
    // Column name carries a historical typo in the schema.
    #[serde(rename = "flag_full_patch")]
    pub flag_full_path: String,
    pub background_hex: String,
}

impl Country {
    /// One line summary used when listing countries in LLM prompts.
    pub fn prompt_line(&self) -> String {
        format!(
            "- {}: {}, capital {}, continent {}",
            self.iso2, self.name, self.capital, self.continent
        )
    }
}

/// Country derived from the country-data API, before it is seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCountry {
    pub iso2: String,
    pub name: String,
    pub capital: String,
    pub continent: String,
    pub primary_language: String,
    pub primary_language_code: String,
    pub primary_currency: String,
    pub primary_currency_code: String,
    #[serde(rename = "flag_full_patch")]
    pub flag_full_path: String,
    pub background_hex: String,
}
