mod entities;
mod repository;

pub use entities::{
    AiSuggestRepository, BestTimeRepository, CountryRepository, OverviewRepository,
    PodcastRepository, VibeCategoryRepository, VibeCountryRepository, VibeRepository,
};
