use crate::core::models::{LeaderboardPlayer, WinningBuild};
use crate::core::source::DataSource;
use crate::error::OverlayResult;
use crate::utils::parse_match_date;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use itertools::Itertools;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{debug, info};

/// Profiles fetched concurrently when the source sets no cap of its own.
pub const BATCH_SIZE: usize = 3;

/// Combines the builds of every top player into one ranked list.
pub struct Aggregator {
    source: DataSource,
    batch_size: usize,
    batch_delay: Duration,
}

impl Aggregator {
    pub fn new(source: DataSource, batch_delay: Duration) -> Self {
        Aggregator {
            batch_size: source.batch_size().max(1),
            source,
            batch_delay,
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Winning builds of the top players, most recent first.
    ///
    /// Only a failing leaderboard fails the aggregation; a player whose builds
    /// cannot be read contributes nothing.
    pub async fn aggregate(&self) -> OverlayResult<Vec<WinningBuild>> {
        let source = self.source.pinned().await;
        let players = source.leaderboard().await?;
        if players.is_empty() {
            info!("No players on the leaderboard, nothing to aggregate");
            return Ok(vec![]);
        }

        let mut builds = Vec::new();
        for (idx, batch) in players.chunks(self.batch_size).enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }
            debug!(
                "Fetching builds for batch {}: {}",
                idx + 1,
                batch.iter().map(|player| &player.username).join(", ")
            );

            let results = join_all(batch.iter().map(|player| tagged_builds(&source, player))).await;
            builds.extend(results.into_iter().flatten());
        }

        sort_builds(&mut builds);
        info!(
            "Aggregated {} builds from {} players",
            builds.len(),
            players.len()
        );
        Ok(builds)
    }
}

async fn tagged_builds(source: &DataSource, player: &LeaderboardPlayer) -> Vec<WinningBuild> {
    source
        .player_builds(player)
        .await
        .into_iter()
        .map(|build| build.tagged_with(player))
        .collect()
}

// Declaration order is the sort order, lowest first.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum MatchDate {
    Missing,
    Unreadable,
    Readable(DateTime<Utc>),
}

impl MatchDate {
    fn of(build: &WinningBuild) -> Self {
        match build.match_date.as_deref().map(str::trim) {
            None | Some("") => MatchDate::Missing,
            Some(text) => parse_match_date(text).map_or(MatchDate::Unreadable, MatchDate::Readable),
        }
    }
}

/// Most recent first. Any dated build goes before the undated ones, dates that
/// cannot be read after the readable ones, and ties are broken by player rank.
pub fn sort_builds(builds: &mut [WinningBuild]) {
    builds.sort_by(compare_builds);
}

fn compare_builds(a: &WinningBuild, b: &WinningBuild) -> Ordering {
    MatchDate::of(b)
        .cmp(&MatchDate::of(a))
        .then_with(|| a.rank_or_unknown().cmp(&b.rank_or_unknown()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::proxy::tests::FakeBridge;
    use crate::client::proxy::ProxyFetch;
    use crate::core::coordinator::RequestCoordinator;
    use crate::core::dump::DumpSource;
    use crate::core::scrape::ScrapeSource;
    use crate::storage::{Cache, MemoryStore};
    use std::sync::atomic::Ordering as AtomicOrdering;
    use std::sync::Arc;

    fn build(date: Option<&str>, rank: Option<u32>) -> WinningBuild {
        WinningBuild {
            placement: 1,
            match_date: date.map(str::to_string),
            player_rank: rank,
            ..Default::default()
        }
    }

    #[test]
    fn dated_builds_come_first() {
        let mut builds = vec![build(None, Some(1)), build(Some("2024-01-01"), Some(2))];
        sort_builds(&mut builds);
        assert_eq!(builds[0].match_date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn unreadable_dates_still_count_as_dated() {
        let mut builds = vec![
            build(None, Some(1)),
            build(Some("Jan 15, 2024"), Some(2)),
            build(Some("  "), Some(3)),
            build(Some("2024-01-01"), Some(4)),
            build(Some("15/01/2024"), Some(5)),
        ];
        sort_builds(&mut builds);
        let ranks = builds.iter().map(|b| b.player_rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![Some(4), Some(2), Some(5), Some(1), Some(3)]);
    }

    #[test]
    fn later_dates_come_first() {
        let mut builds = vec![
            build(Some("2024-01-01"), Some(1)),
            build(Some("2024-02-01 10:00:00"), Some(2)),
            build(Some("2024-01-15T08:00:00Z"), Some(3)),
        ];
        sort_builds(&mut builds);
        let ranks = builds.iter().map(|b| b.player_rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![Some(2), Some(3), Some(1)]);
    }

    #[test]
    fn rank_breaks_ties() {
        let mut builds = vec![
            build(None, None),
            build(None, Some(4)),
            build(Some("2024-01-01"), Some(3)),
            build(Some("2024-01-01"), Some(1)),
            build(Some("yesterday"), Some(2)),
        ];
        sort_builds(&mut builds);
        let ranks = builds.iter().map(|b| b.player_rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![Some(1), Some(3), Some(2), Some(4), None]);
    }

    const DUMP: &str = r#"{
        "timestamp": "2024-01-16T08:00:00",
        "players": [
            {"username": "A", "rank": 1, "profile_url": "u1"},
            {"username": "B", "rank": 2, "profile_url": "u2"}
        ],
        "builds": [
            {"player_name": "A", "player_rank": 1, "placement": 1,
             "illuvials": [{"name": "Axolotl", "is_bonded": false, "augments": []}],
             "suit": "S1", "weapon": "W1", "match_date": "2024-01-15"},
            {"player_name": "C", "player_rank": 7, "placement": 1,
             "illuvials": [{"name": "Dash", "is_bonded": false, "augments": []}],
             "match_date": "2024-01-16"}
        ]
    }"#;

    fn dump_aggregator(bridge: Arc<FakeBridge>) -> Aggregator {
        let source = DataSource::Dump(DumpSource::new(
            ProxyFetch::with_bridge(bridge),
            Cache::new(Arc::new(MemoryStore::new()), "dump", Duration::from_secs(300)),
            "https://host/dump.json".to_string(),
        ));
        Aggregator::new(source, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn dump_builds_are_tagged_with_their_player() {
        let bridge = Arc::new(FakeBridge::default().with_page("https://host/dump.json", DUMP));
        let aggregator = dump_aggregator(bridge.clone());

        let builds = aggregator.aggregate().await.unwrap();

        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].illuvials, vec!["Axolotl"]);
        assert_eq!(builds[0].player_username.as_deref(), Some("A"));
        assert_eq!(builds[0].player_rank, Some(1));

        // Idempotent while the dump is cached.
        assert_eq!(aggregator.aggregate().await.unwrap(), builds);
        assert_eq!(bridge.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_leaderboard_short_circuits() {
        let bridge = Arc::new(
            FakeBridge::default().with_page("https://host/dump.json", r#"{"players": []}"#),
        );
        assert!(dump_aggregator(bridge).aggregate().await.unwrap().is_empty());
    }

    // Leaderboard of `players` scraped profiles, each answering after 20 ms.
    fn scrape_aggregator(players: u32, cap: usize) -> (Aggregator, Arc<FakeBridge>) {
        let leaderboard = (1..=players)
            .map(|i| {
                format!(
                    r#"<div class="leaderboard-entry"><span class="rank">{i}</span><a class="player-name" href="/players/p{i}">P{i}</a></div>"#
                )
            })
            .collect::<String>();
        let mut bridge = FakeBridge::default()
            .with_latency(Duration::from_millis(20))
            .with_page("https://site/analytics/players", &leaderboard);
        for i in 1..=players {
            bridge = bridge.with_page(
                &format!("https://site/players/p{i}"),
                &format!(
                    r#"<table class="match-history"><tr><td class="placement">1</td><td class="weapon">W{i}</td><td class="date">2024-01-0{i}</td></tr></table>"#
                ),
            );
        }
        let bridge = Arc::new(bridge);
        let store = Arc::new(MemoryStore::new());
        let source = DataSource::Scrape(ScrapeSource::new(
            ProxyFetch::with_bridge(bridge.clone()),
            Arc::new(RequestCoordinator::new()),
            Cache::new(store.clone(), "leaderboard", Duration::from_secs(600)),
            Cache::new(store, "builds", Duration::from_secs(300)),
            "https://site".to_string(),
            cap,
        ));
        (Aggregator::new(source, Duration::from_millis(500)), bridge)
    }

    #[tokio::test(start_paused = true)]
    async fn players_are_fetched_in_batches() {
        let (aggregator, bridge) = scrape_aggregator(5, 3);

        let started = tokio::time::Instant::now();
        let builds = aggregator.aggregate().await.unwrap();

        // Leaderboard, first batch of 3 side by side, pause, second batch.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(560));
        assert!(elapsed < Duration::from_millis(1000));
        assert_eq!(builds.len(), 5);
        assert_eq!(builds[0].weapon, "W5");
        assert_eq!(builds[0].player_username.as_deref(), Some("P5"));
        assert_eq!(builds[4].player_rank, Some(1));
        assert_eq!(bridge.calls.load(AtomicOrdering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn batches_follow_a_smaller_request_cap() {
        let (aggregator, bridge) = scrape_aggregator(3, 2);

        let started = tokio::time::Instant::now();
        let builds = aggregator.aggregate().await.unwrap();

        // Two batches: nobody is turned away by the cap.
        assert!(started.elapsed() >= Duration::from_millis(500));
        let players = builds
            .iter()
            .map(|b| b.player_username.as_deref())
            .sorted()
            .collect::<Vec<_>>();
        assert_eq!(players, vec![Some("P1"), Some("P2"), Some("P3")]);
        assert_eq!(bridge.calls.load(AtomicOrdering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_request_cap_fetches_one_player_at_a_time() {
        let (aggregator, _bridge) = scrape_aggregator(2, 0);

        let builds = aggregator.aggregate().await.unwrap();

        assert_eq!(builds.len(), 2);
    }

    #[tokio::test]
    async fn dump_is_read_once_per_aggregation() {
        let bridge = Arc::new(FakeBridge::default().with_page("https://host/dump.json", DUMP));
        let source = DataSource::Dump(DumpSource::new(
            ProxyFetch::with_bridge(bridge.clone()),
            Cache::new(Arc::new(MemoryStore::new()), "dump", Duration::ZERO),
            "https://host/dump.json".to_string(),
        ));
        let aggregator = Aggregator::new(source, Duration::from_millis(10));

        assert_eq!(aggregator.aggregate().await.unwrap().len(), 1);
        assert_eq!(bridge.calls.load(AtomicOrdering::SeqCst), 1);
    }
}
