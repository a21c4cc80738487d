pub mod api;
pub mod scraping;

pub use api::ApiAdapter;
pub use scraping::ScrapingAdapter;
