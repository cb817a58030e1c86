pub mod parser;
pub mod pipeline;
pub mod scraper;
pub mod sink;
pub mod types;
pub mod utils;

pub use pipeline::DedupPipeline;
pub use scraper::WebScraper;

pub(crate) const BASE_URL: &str = "https://database.globalreporting.org";
