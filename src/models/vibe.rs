use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibeCategory {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vibe {
    pub id: String,
    pub category_id: String,
    pub title: String,
    #[serde(default)]
    pub icon_emoji: String,
}

/// Join row between a country and a vibe. The pair is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VibeCountry {
    pub country_id: String,
    pub vibe_id: String,
}
