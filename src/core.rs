pub mod aggregator;
pub mod builds;
pub mod coordinator;
pub mod dump;
pub mod events;
pub mod leaderboard;
pub mod models;
pub mod scrape;
pub mod selectors;
pub mod service;
pub mod source;
pub mod templates;
