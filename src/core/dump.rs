use crate::client::proxy::ProxyFetch;
use crate::core::builds::MAX_BUILDS_PER_PLAYER;
use crate::core::models::{BuildDump, DetailedBuild, LeaderboardPlayer, WinningBuild};
use crate::error::OverlayResult;
use crate::storage::{Cache, CacheStatus};
use std::sync::Arc;
use tracing::{debug, error, info};

const DUMP_CACHE_KEY: &str = "latest";

/// Leaderboard and builds read from the precomputed dump.
///
/// The dump is produced offline; a missing or malformed dump only means there
/// is no data yet, so nothing here fails.
#[derive(Clone)]
pub struct DumpSource {
    proxy: ProxyFetch,
    cache: Cache,
    // http(s) url, or a path on disk
    location: String,
    // Held by an aggregation so players and builds come from one read.
    pinned: Option<Arc<BuildDump>>,
}

impl DumpSource {
    pub fn new(proxy: ProxyFetch, cache: Cache, location: String) -> Self {
        DumpSource {
            proxy,
            cache,
            location,
            pinned: None,
        }
    }

    /// Copy of this source answering every lookup from a single load.
    pub async fn pinned(&self) -> DumpSource {
        DumpSource {
            pinned: Some(self.load().await),
            ..self.clone()
        }
    }

    pub async fn load(&self) -> Arc<BuildDump> {
        if let Some(dump) = &self.pinned {
            return dump.clone();
        }
        if let Some(dump) = self.cache.get::<BuildDump>(DUMP_CACHE_KEY) {
            debug!("Using cached dump");
            return Arc::new(dump);
        }

        match self.read().await {
            Ok(dump) => {
                info!(
                    "Loaded dump from {}: {} players, {} builds (collected {})",
                    self.location,
                    dump.players.len(),
                    dump.builds.len(),
                    dump.timestamp
                );
                self.cache.set(DUMP_CACHE_KEY, &dump);
                Arc::new(dump)
            }
            Err(e) => {
                error!("Failed to load dump from {}: {e}", self.location);
                Arc::new(BuildDump::default())
            }
        }
    }

    async fn read(&self) -> OverlayResult<BuildDump> {
        let raw = match self.location.starts_with("http://") || self.location.starts_with("https://")
        {
            true => self.proxy.fetch(&self.location).await.into_ok_text()?,
            false => tokio::fs::read_to_string(&self.location).await?,
        };
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardPlayer> {
        self.load()
            .await
            .players
            .iter()
            .map(LeaderboardPlayer::from)
            .collect()
    }

    /// Builds recorded for `player`, placement as recorded.
    pub async fn player_builds(&self, player: &LeaderboardPlayer) -> Vec<WinningBuild> {
        self.load()
            .await
            .builds
            .iter()
            .filter(|build| build.player_name == player.username)
            .take(MAX_BUILDS_PER_PLAYER)
            .map(WinningBuild::from)
            .collect()
    }

    pub async fn detailed_builds(&self) -> Vec<DetailedBuild> {
        self.load().await.builds.clone()
    }

    pub fn clear_caches(&self) {
        self.cache.clear_all();
    }

    pub fn cache_status(&self) -> Vec<CacheStatus> {
        self.cache.status()
    }
}
