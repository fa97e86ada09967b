mod content;
mod country;
mod podcast;
mod vibe;

pub use content::{
    CountryAiSuggest, CountryBestTime, CountryOverview, NewCountryAiSuggest, NewCountryBestTime,
    NewCountryOverview,
};
pub use country::{Country, NewCountry};
pub use podcast::{CountryPodcast, NewCountryPodcast};
pub use vibe::{Vibe, VibeCategory, VibeCountry};
