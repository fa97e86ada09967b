const SEARCH_URL: &str = "https://en.wikipedia.org/wiki/Special:Search?search=";

/// English Wikipedia search link for a page title.
pub fn search_url(title: &str) -> String {
    format!("{}{}", SEARCH_URL, urlencoding::encode(title))
}
