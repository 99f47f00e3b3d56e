// src/config/mod.rs
pub mod scrape;

pub use scrape::ScrapeConfig;
