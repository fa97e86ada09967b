use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryPodcast {
    pub id: String,
    pub country_id: String,
    #[serde(rename = "audio_full_patch")]
    pub audio_full_path: String,
    pub title: String,
    pub subtitle: String,
    pub duration_sec: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCountryPodcast {
    pub country_id: String,
    #[serde(rename = "audio_full_patch")]
    pub audio_full_path: String,
    pub title: String,
    pub subtitle: String,
    pub duration_sec: u32,
}
