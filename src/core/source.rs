use crate::client::proxy::ProxyFetch;
use crate::config::{DataSourceKind, Settings};
use crate::core::aggregator::BATCH_SIZE;
use crate::core::coordinator::RequestCoordinator;
use crate::core::dump::DumpSource;
use crate::core::models::{DetailedBuild, LeaderboardPlayer, WinningBuild};
use crate::core::scrape::ScrapeSource;
use crate::error::OverlayResult;
use crate::storage::{Cache, CacheStatus, CacheStore};
use std::sync::Arc;

/// Where the pipeline reads players and builds from.
#[derive(Clone)]
pub enum DataSource {
    Scrape(ScrapeSource),
    Dump(DumpSource),
}

impl DataSource {
    pub fn from_settings(
        settings: &Settings,
        proxy: ProxyFetch,
        store: Arc<dyn CacheStore>,
        coordinator: Arc<RequestCoordinator>,
    ) -> Self {
        match settings.data_source {
            DataSourceKind::Scrape => DataSource::Scrape(ScrapeSource::new(
                proxy,
                coordinator,
                Cache::new(store.clone(), "leaderboard", settings.leaderboard_ttl()),
                Cache::new(store, "builds", settings.builds_ttl()),
                settings.site_base_url.clone(),
                settings.max_concurrent_requests,
            )),
            DataSourceKind::Dump => DataSource::Dump(DumpSource::new(
                proxy,
                Cache::new(store, "dump", settings.builds_ttl()),
                settings.dump_location.clone(),
            )),
        }
    }

    pub fn kind(&self) -> DataSourceKind {
        match self {
            DataSource::Scrape(_) => DataSourceKind::Scrape,
            DataSource::Dump(_) => DataSourceKind::Dump,
        }
    }

    /// Players whose builds are fetched together. Scraped batches never
    /// exceed the build request cap, so no batch member is turned away.
    pub fn batch_size(&self) -> usize {
        match self {
            DataSource::Scrape(source) => source.max_concurrent_requests(),
            DataSource::Dump(_) => BATCH_SIZE,
        }
    }

    /// Same source, with the dump read once and held for the caller.
    pub async fn pinned(&self) -> DataSource {
        match self {
            DataSource::Scrape(source) => DataSource::Scrape(source.clone()),
            DataSource::Dump(source) => DataSource::Dump(source.pinned().await),
        }
    }

    pub async fn leaderboard(&self) -> OverlayResult<Vec<LeaderboardPlayer>> {
        match self {
            DataSource::Scrape(source) => source.leaderboard().await,
            DataSource::Dump(source) => Ok(source.leaderboard().await),
        }
    }

    pub async fn player_builds(&self, player: &LeaderboardPlayer) -> Vec<WinningBuild> {
        match self {
            DataSource::Scrape(source) => source.winning_builds(&player.profile_url).await,
            DataSource::Dump(source) => source.player_builds(player).await,
        }
    }

    /// Per-creature detail only exists in the dump.
    pub async fn detailed_builds(&self) -> Vec<DetailedBuild> {
        match self {
            DataSource::Scrape(_) => vec![],
            DataSource::Dump(source) => source.detailed_builds().await,
        }
    }

    pub fn clear_caches(&self) {
        match self {
            DataSource::Scrape(source) => source.clear_caches(),
            DataSource::Dump(source) => source.clear_caches(),
        }
    }

    pub fn cache_status(&self) -> Vec<CacheStatus> {
        match self {
            DataSource::Scrape(source) => source.cache_status(),
            DataSource::Dump(source) => source.cache_status(),
        }
    }
}
