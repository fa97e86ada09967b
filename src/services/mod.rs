mod http;
mod restcountries;
mod wikipedia;

pub use http::{Fetcher, HttpFetcher};
pub use restcountries::{CountrySource, RestCountriesClient, RestCountry};
pub use wikipedia::search_url as wikipedia_search_url;
