use crate::client::proxy::ProxyFetch;
use crate::config::{DataSourceKind, Settings};
use crate::core::aggregator::Aggregator;
use crate::core::coordinator::RequestCoordinator;
use crate::core::models::{DetailedBuild, LeaderboardPlayer, WinningBuild};
use crate::core::source::DataSource;
use crate::error::OverlayResult;
use crate::storage::{CacheStatus, CacheStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const UPDATE_REQUEST: &str = "update-recent-builds";

/// Snapshot of the request bookkeeping and cache contents.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub source: DataSourceKind,
    pub active_requests: usize,
    pub pending_debounces: usize,
    pub caches: Vec<CacheStatus>,
}

/// Recent winning builds of the top players, as shown by the overlay.
#[derive(Clone)]
pub struct RecentBuilds {
    aggregator: Arc<Aggregator>,
    coordinator: Arc<RequestCoordinator>,
    debounce_delay: Duration,
}

impl RecentBuilds {
    pub fn new(
        source: DataSource,
        coordinator: Arc<RequestCoordinator>,
        batch_delay: Duration,
        debounce_delay: Duration,
    ) -> Self {
        RecentBuilds {
            aggregator: Arc::new(Aggregator::new(source, batch_delay)),
            coordinator,
            debounce_delay,
        }
    }

    pub fn from_settings(settings: &Settings, store: Arc<dyn CacheStore>) -> OverlayResult<Self> {
        let coordinator = Arc::new(RequestCoordinator::new());
        let proxy = ProxyFetch::from_settings(settings)?;
        let source = DataSource::from_settings(settings, proxy, store, coordinator.clone());
        info!("Reading builds from the {} source", source.kind());
        Ok(RecentBuilds::new(
            source,
            coordinator,
            settings.batch_delay(),
            settings.debounce_delay(),
        ))
    }

    /// Aggregate once the debounce window passed without a newer call.
    ///
    /// Superseded calls get [`OverlayError::Superseded`], and a call made while
    /// an aggregation runs gets [`OverlayError::InFlight`]; both mean the data
    /// is on its way.
    ///
    /// [`OverlayError::Superseded`]: crate::error::OverlayError::Superseded
    /// [`OverlayError::InFlight`]: crate::error::OverlayError::InFlight
    pub async fn update_recent_builds(&self) -> OverlayResult<Vec<WinningBuild>> {
        let aggregator = self.aggregator.clone();
        let coordinator = self.coordinator.clone();
        self.coordinator
            .debounce(UPDATE_REQUEST, self.debounce_delay, move || async move {
                let _request = coordinator.begin(UPDATE_REQUEST)?;
                aggregator.aggregate().await
            })
            .await
    }

    /// Drop every cached page and aggregate right away.
    pub async fn force_refresh(&self) -> OverlayResult<Vec<WinningBuild>> {
        let _request = self.coordinator.begin(UPDATE_REQUEST)?;
        info!("Forcing refresh of recent builds");
        self.aggregator.source().clear_caches();
        self.aggregator.aggregate().await
    }

    pub async fn leaderboard(&self) -> OverlayResult<Vec<LeaderboardPlayer>> {
        self.aggregator.source().leaderboard().await
    }

    pub async fn detailed_builds(&self) -> Vec<DetailedBuild> {
        self.aggregator.source().detailed_builds().await
    }

    pub fn clear_cache(&self) {
        debug!("Clearing caches");
        self.aggregator.source().clear_caches();
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            source: self.aggregator.source().kind(),
            active_requests: self.coordinator.active_count(),
            pending_debounces: self.coordinator.pending_debounce_count(),
            caches: self.aggregator.source().cache_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::proxy::tests::FakeBridge;
    use crate::core::dump::DumpSource;
    use crate::error::OverlayError;
    use crate::storage::{Cache, MemoryStore};
    use std::sync::atomic::Ordering;

    const DUMP: &str = r#"{
        "timestamp": "2024-01-16T08:00:00",
        "players": [{"username": "A", "rank": 1, "profile_url": "u1"}],
        "builds": [
            {"player_name": "A", "player_rank": 1, "placement": 1,
             "illuvials": [{"name": "Axolotl", "is_bonded": false, "augments": []}],
             "suit": "S1", "weapon": "W1", "match_date": "2024-01-15"}
        ]
    }"#;

    fn service(bridge: Arc<FakeBridge>) -> RecentBuilds {
        let source = DataSource::Dump(DumpSource::new(
            ProxyFetch::with_bridge(bridge),
            Cache::new(Arc::new(MemoryStore::new()), "dump", Duration::from_secs(300)),
            "https://host/dump.json".to_string(),
        ));
        RecentBuilds::new(
            source,
            Arc::new(RequestCoordinator::new()),
            Duration::from_millis(500),
            Duration::from_secs(1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn triggers_within_a_second_aggregate_once() {
        let bridge = Arc::new(FakeBridge::default().with_page("https://host/dump.json", DUMP));
        let service = service(bridge.clone());

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.update_recent_builds().await }
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        let second = service.update_recent_builds().await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].illuvials, vec!["Axolotl"]);
        assert!(matches!(
            first.await.unwrap(),
            Err(OverlayError::Superseded(_))
        ));
        // One dump load means one aggregation.
        assert_eq!(bridge.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_refresh_reloads_the_dump() {
        let bridge = Arc::new(FakeBridge::default().with_page("https://host/dump.json", DUMP));
        let service = service(bridge.clone());

        service.force_refresh().await.unwrap();
        service.force_refresh().await.unwrap();

        assert_eq!(bridge.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn diagnostics_report_cached_entries() {
        let bridge = Arc::new(FakeBridge::default().with_page("https://host/dump.json", DUMP));
        let service = service(bridge);

        assert!(service.diagnostics().caches.is_empty());
        service.leaderboard().await.unwrap();

        let diagnostics = service.diagnostics();
        assert_eq!(diagnostics.source, DataSourceKind::Dump);
        assert_eq!(diagnostics.active_requests, 0);
        assert_eq!(diagnostics.pending_debounces, 0);
        assert_eq!(diagnostics.caches.len(), 1);
        assert!(!diagnostics.caches[0].expired);

        service.clear_cache();
        assert!(service.diagnostics().caches.is_empty());
    }

    #[tokio::test]
    async fn detailed_builds_keep_creature_detail() {
        let bridge = Arc::new(FakeBridge::default().with_page("https://host/dump.json", DUMP));
        let detailed = service(bridge).detailed_builds().await;
        assert_eq!(detailed[0].illuvials[0].name, "Axolotl");
    }
}
