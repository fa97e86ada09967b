use super::repository::{CountryScoped, Entity, Keyed, Repository};
use crate::models::{
    Country, CountryAiSuggest, CountryBestTime, CountryOverview, CountryPodcast, NewCountry,
    NewCountryAiSuggest, NewCountryBestTime, NewCountryOverview, NewCountryPodcast, Vibe,
    VibeCategory, VibeCountry,
};

pub type CountryRepository = Repository<Country>;
pub type VibeCategoryRepository = Repository<VibeCategory>;
pub type VibeRepository = Repository<Vibe>;
pub type VibeCountryRepository = Repository<VibeCountry>;
pub type BestTimeRepository = Repository<CountryBestTime>;
pub type OverviewRepository = Repository<CountryOverview>;
pub type AiSuggestRepository = Repository<CountryAiSuggest>;
pub type PodcastRepository = Repository<CountryPodcast>;

impl Entity for Country {
    const TABLE: &'static str = "countries";
    type New = NewCountry;
}
impl Keyed for Country {}

impl Entity for VibeCategory {
    const TABLE: &'static str = "vibe_categories";
    // Categories are maintained by hand and never seeded from here.
    type New = VibeCategory;
}
impl Keyed for VibeCategory {}

impl Entity for Vibe {
    const TABLE: &'static str = "vibes";
    type New = Vibe;
}
impl Keyed for Vibe {}

// Composite key (country_id, vibe_id): the row is its own insert shape.
impl Entity for VibeCountry {
    const TABLE: &'static str = "vibes_country";
    const ORDER_BY: &'static [&'static str] = &["country_id", "vibe_id"];
    type New = VibeCountry;
}
impl CountryScoped for VibeCountry {}

impl Entity for CountryBestTime {
    const TABLE: &'static str = "country_best_times";
    type New = NewCountryBestTime;
}
impl Keyed for CountryBestTime {}
impl CountryScoped for CountryBestTime {}

impl Entity for CountryOverview {
    const TABLE: &'static str = "country_overview";
    type New = NewCountryOverview;
}
impl Keyed for CountryOverview {}
impl CountryScoped for CountryOverview {}

impl Entity for CountryAiSuggest {
    const TABLE: &'static str = "country_ai_suggests";
    type New = NewCountryAiSuggest;
}
impl Keyed for CountryAiSuggest {}
impl CountryScoped for CountryAiSuggest {}

impl Entity for CountryPodcast {
    const TABLE: &'static str = "country_podcasts";
    type New = NewCountryPodcast;
}
impl Keyed for CountryPodcast {}
impl CountryScoped for CountryPodcast {}
