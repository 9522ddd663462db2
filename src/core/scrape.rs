use crate::client::proxy::ProxyFetch;
use crate::client::Endpoint;
use crate::core::builds::parse_winning_builds_html;
use crate::core::coordinator::RequestCoordinator;
use crate::core::leaderboard::parse_leaderboard_html;
use crate::core::models::{LeaderboardPlayer, WinningBuild};
use crate::error::OverlayResult;
use crate::storage::{Cache, CacheStatus};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const LEADERBOARD_REQUEST: &str = "leaderboard";
const LEADERBOARD_CACHE_KEY: &str = "top";
const BUILDS_REQUEST_PREFIX: &str = "builds-";

/// Leaderboard and builds scraped from the HTML pages of the analytics site.
#[derive(Clone)]
pub struct ScrapeSource {
    proxy: ProxyFetch,
    coordinator: Arc<RequestCoordinator>,
    leaderboard_cache: Cache,
    builds_cache: Cache,
    site_base_url: String,
    max_concurrent_requests: usize,
}

impl ScrapeSource {
    pub fn new(
        proxy: ProxyFetch,
        coordinator: Arc<RequestCoordinator>,
        leaderboard_cache: Cache,
        builds_cache: Cache,
        site_base_url: String,
        max_concurrent_requests: usize,
    ) -> Self {
        ScrapeSource {
            proxy,
            coordinator,
            leaderboard_cache,
            builds_cache,
            site_base_url,
            // A cap of 0 would skip every player.
            max_concurrent_requests: max_concurrent_requests.max(1),
        }
    }

    /// Build requests allowed in flight at once.
    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// Top players, from cache when fresh.
    ///
    /// Fails when a leaderboard request is already running, or when the page
    /// could not be fetched or read and no previous result is cached, even
    /// an expired one.
    pub async fn leaderboard(&self) -> OverlayResult<Vec<LeaderboardPlayer>> {
        let _request = self.coordinator.begin(LEADERBOARD_REQUEST)?;

        // Kept aside before the fresh read, which deletes expired entries.
        let fallback = self
            .leaderboard_cache
            .get_stale::<Vec<LeaderboardPlayer>>(LEADERBOARD_CACHE_KEY);

        if let Some(players) = self
            .leaderboard_cache
            .get::<Vec<LeaderboardPlayer>>(LEADERBOARD_CACHE_KEY)
        {
            info!("Using cached leaderboard data");
            return Ok(players);
        }

        match self.fetch_leaderboard().await {
            Ok(players) => {
                info!("Fetched {} players from the leaderboard", players.len());
                self.leaderboard_cache.set(LEADERBOARD_CACHE_KEY, &players);
                Ok(players)
            }
            Err(e) => {
                error!("Failed to fetch leaderboard: {e}");
                match fallback {
                    Some(players) => {
                        warn!("Using expired leaderboard cache as fallback");
                        Ok(players)
                    }
                    None => Err(e),
                }
            }
        }
    }

    async fn fetch_leaderboard(&self) -> OverlayResult<Vec<LeaderboardPlayer>> {
        let url = Endpoint::PlayersAnalytics.url(&self.site_base_url);
        info!("Fetching fresh leaderboard data from {url}");
        let html = self.proxy.fetch(&url).await.into_ok_text()?;
        parse_leaderboard_html(&html, &self.site_base_url)
    }

    /// Recent first-place builds of the player at `profile`.
    ///
    /// Never fails: a request already running for the same profile, too many
    /// build requests at once, or a page that cannot be fetched all give an
    /// empty list.
    pub async fn winning_builds(&self, profile: &str) -> Vec<WinningBuild> {
        let request = format!("{BUILDS_REQUEST_PREFIX}{profile}");

        if self.coordinator.active_with_prefix(BUILDS_REQUEST_PREFIX)
            >= self.max_concurrent_requests
        {
            debug!("Too many build requests in flight, skipping {profile}");
            return vec![];
        }
        let Some(_request) = self.coordinator.try_begin(&request) else {
            return vec![];
        };

        let url = self.profile_url(profile);
        if let Some(builds) = self.builds_cache.get::<Vec<WinningBuild>>(&url) {
            debug!("Using cached builds for {url}");
            return builds;
        }

        match self.fetch_builds(&url).await {
            Ok(builds) => {
                debug!("Found {} winning builds on {url}", builds.len());
                self.builds_cache.set(&url, &builds);
                builds
            }
            Err(e) => {
                warn!("Failed to fetch winning builds from {url}: {e}");
                vec![]
            }
        }
    }

    async fn fetch_builds(&self, url: &str) -> OverlayResult<Vec<WinningBuild>> {
        let html = self.proxy.fetch(url).await.into_ok_text()?;
        Ok(parse_winning_builds_html(&html))
    }

    // Usernames and site-relative paths are expanded below /players.
    fn profile_url(&self, profile: &str) -> String {
        match profile.starts_with("http") {
            true => profile.to_string(),
            false => Endpoint::PlayerPage(profile).url(&self.site_base_url),
        }
    }

    pub fn clear_caches(&self) {
        self.leaderboard_cache.clear_all();
        self.builds_cache.clear_all();
    }

    pub fn cache_status(&self) -> Vec<CacheStatus> {
        let mut status = self.leaderboard_cache.status();
        status.extend(self.builds_cache.status());
        status
    }
}
