use crate::core::models::{DetailedBuild, LeaderboardPlayer, WinningBuild};
use crate::core::service::Diagnostics;
use crate::error::OverlayResult;
use crate::utils::{ordinal, plural};
use chrono::{DateTime, Local};
use minijinja::{context, Environment};
use once_cell::sync::Lazy;
use serde::Serialize;
use strum::{EnumIter, IntoEnumIterator};
use tracing::{error, info};

static TEMPLATES_ENVIRONMENT: Lazy<Environment> = Lazy::new(|| {
    info!("Initializing templating engine environment.");
    let mut env = Environment::new();

    for template in MessageTemplate::iter() {
        if let Err(e) = env.add_template(template.name(), template.template()) {
            error!("Could not load template {}: {e}", template.name());
        }
    }

    env
});

#[derive(Debug, Clone, Copy, EnumIter)]
pub enum MessageTemplate {
    Build,
    RecentBuilds,
    NoBuilds,
    RefreshFailed,
    Leaderboard,
    DetailedBuild,
    Diagnostics,
}

impl MessageTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            MessageTemplate::Build => "build.txt",
            MessageTemplate::RecentBuilds => "recent_builds.txt",
            MessageTemplate::NoBuilds => "no_builds.txt",
            MessageTemplate::RefreshFailed => "refresh_failed.txt",
            MessageTemplate::Leaderboard => "leaderboard.txt",
            MessageTemplate::DetailedBuild => "detailed_build.txt",
            MessageTemplate::Diagnostics => "diagnostics.txt",
        }
    }

    pub fn render<S: Serialize>(&self, ctx: S) -> OverlayResult<String> {
        let template = TEMPLATES_ENVIRONMENT.get_template(self.name())?;
        Ok(template.render(ctx)?.trim_end().to_string())
    }

    pub fn template(&self) -> &'static str {
        // \n\ at each code line end creates a line break at the proper position and discards further spaces in this line of code.
        // \x20 (hex; 32 in decimal) is an ASCII space and an indicator for the first space to be preserved in this line of the string.
        match self {
            MessageTemplate::Build => {
                "{% if player %}{{ player }} - {{ placement }} Place\n{% endif %}\
                {% if illuvials %}Illuvials: {{ illuvials|join(', ') }}\n{% endif %}\
                {% if augments %}Augments: {{ augments }}\n{% endif %}\
                {% if suit %}Suit: {{ suit }}\n{% endif %}\
                {% if weapon %}Weapon: {{ weapon }}\n{% endif %}\
                {% if date %}Date: {{ date }}\n{% endif %}"
            }
            MessageTemplate::RecentBuilds => {
                "🏆 Recent winning builds ({{ count }}, as of {{ timestamp }})\n\
                {% for build in builds %}\n{{ build }}\n{% endfor %}"
            }
            MessageTemplate::NoBuilds => {
                "🕰️ No recent winning builds yet. Check back after the top players finish a few matches."
            }
            MessageTemplate::RefreshFailed => {
                "⚠️ Failed to load recent builds, will retry automatically."
            }
            MessageTemplate::Leaderboard => {
                "📓 Top {{ count }}:\n\
                {% for player in players %}\x20 {{ player.rank }}. {{ player.username }}\n{% endfor %}"
            }
            MessageTemplate::DetailedBuild => {
                "{{ build.player_name }} (#{{ build.player_rank }}) - {{ placement }} Place\
                {% if build.mode %} in {{ build.mode }}{% endif %}\n\
                {% for illuvial in build.illuvials %}\x20 • {{ illuvial.name }}\
                    {% if illuvial.is_bonded %} (bonded){% endif %}\
                    {% if illuvial.augments %}: {{ illuvial.augments|join(', ') }}{% endif %}\n\
                {% endfor %}\
                {% if build.suit %}Suit: {{ build.suit }}\n{% endif %}\
                {% if build.weapon %}Weapon: {{ build.weapon }}\n{% endif %}\
                {% if build.match_date %}Date: {{ build.match_date }}\n{% endif %}"
            }
            MessageTemplate::Diagnostics => {
                "Source: {{ source }}\n\
                Active requests: {{ active_requests }}\n\
                Pending refreshes: {{ pending_debounces }}\n\
                {% if caches %}Cached entries:\n\
                    {% for entry in caches %}\x20 • {{ entry }}\n{% endfor %}\
                {% else %}Cache is empty\n{% endif %}"
            }
        }
    }
}

/// One build as shown in the overlay, one attribute per line, empty ones left out.
pub fn format_build_for_display(build: &WinningBuild) -> OverlayResult<String> {
    MessageTemplate::Build.render(context! {
        player => build.player_username,
        placement => ordinal(build.placement),
        illuvials => build.illuvials,
        augments => build.augments,
        suit => build.suit,
        weapon => build.weapon,
        date => build.match_date,
    })
}

pub fn format_recent_builds(
    builds: &[WinningBuild],
    timestamp: DateTime<Local>,
) -> OverlayResult<String> {
    if builds.is_empty() {
        return MessageTemplate::NoBuilds.render(context! {});
    }
    let rendered = builds
        .iter()
        .map(format_build_for_display)
        .collect::<OverlayResult<Vec<String>>>()?;
    MessageTemplate::RecentBuilds.render(context! {
        count => plural(builds.len(), "build"),
        timestamp => timestamp.format("%d/%m/%Y %H:%M:%S").to_string(),
        builds => rendered,
    })
}

pub fn format_leaderboard(players: &[LeaderboardPlayer]) -> OverlayResult<String> {
    MessageTemplate::Leaderboard.render(context! {
        count => plural(players.len(), "player"),
        players => players,
    })
}

pub fn format_detailed_build(build: &DetailedBuild) -> OverlayResult<String> {
    MessageTemplate::DetailedBuild.render(context! {
        build => build,
        placement => ordinal(build.placement),
    })
}

pub fn format_diagnostics(diagnostics: &Diagnostics) -> OverlayResult<String> {
    MessageTemplate::Diagnostics.render(context! {
        source => diagnostics.source.to_string(),
        active_requests => diagnostics.active_requests,
        pending_debounces => diagnostics.pending_debounces,
        caches => diagnostics.caches.iter().map(ToString::to_string).collect::<Vec<String>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataSourceKind;
    use crate::core::models::DumpIlluvial;
    use crate::storage::CacheStatus;

    fn winning_build() -> WinningBuild {
        WinningBuild {
            placement: 1,
            illuvials: vec!["Axolotl".to_string(), "Rhamphyre".to_string()],
            augments: String::new(),
            suit: "Suit A".to_string(),
            weapon: "Weapon A".to_string(),
            match_date: Some("2024-01-15".to_string()),
            player_username: Some("Alpha".to_string()),
            player_rank: Some(1),
        }
    }

    #[test]
    fn every_template_loads() {
        for template in MessageTemplate::iter() {
            assert!(TEMPLATES_ENVIRONMENT.get_template(template.name()).is_ok());
        }
    }

    #[test]
    fn build_lines_skip_empty_fields() {
        let text = format_build_for_display(&winning_build()).unwrap();
        assert_eq!(
            text,
            "Alpha - 1st Place\n\
             Illuvials: Axolotl, Rhamphyre\n\
             Suit: Suit A\n\
             Weapon: Weapon A\n\
             Date: 2024-01-15"
        );
    }

    #[test]
    fn anonymous_build_has_no_header() {
        let build = WinningBuild {
            placement: 1,
            weapon: "Bow".to_string(),
            ..Default::default()
        };
        assert_eq!(format_build_for_display(&build).unwrap(), "Weapon: Bow");
    }

    #[test]
    fn empty_state_is_not_a_failure() {
        let text = format_recent_builds(&[], Local::now()).unwrap();
        assert!(text.contains("No recent winning builds yet"));
        assert!(!text.contains("Failed"));
    }

    #[test]
    fn recent_builds_are_listed() {
        let text = format_recent_builds(&[winning_build(), winning_build()], Local::now()).unwrap();
        assert!(text.starts_with("🏆 Recent winning builds (2 builds"));
        assert_eq!(text.matches("Alpha - 1st Place").count(), 2);
    }

    #[test]
    fn leaderboard_lines() {
        let players = vec![
            LeaderboardPlayer {
                username: "Alpha".to_string(),
                profile_url: String::new(),
                rank: 1,
            },
            LeaderboardPlayer {
                username: "Bravo".to_string(),
                profile_url: String::new(),
                rank: 2,
            },
        ];
        assert_eq!(
            format_leaderboard(&players).unwrap(),
            "📓 Top 2 players:\n  1. Alpha\n  2. Bravo"
        );
    }

    #[test]
    fn detailed_build_marks_bonds() {
        let build = DetailedBuild {
            player_name: "A".to_string(),
            player_rank: 1,
            placement: 2,
            illuvials: vec![
                DumpIlluvial {
                    name: "Axolotl".to_string(),
                    is_bonded: true,
                    augments: vec!["Haste".to_string(), "Ward".to_string()],
                },
                DumpIlluvial {
                    name: "Dash".to_string(),
                    ..Default::default()
                },
            ],
            mode: "Gauntlet".to_string(),
            ..Default::default()
        };

        let text = format_detailed_build(&build).unwrap();

        assert!(text.starts_with("A (#1) - 2nd Place in Gauntlet\n"));
        assert!(text.contains("  • Axolotl (bonded): Haste, Ward\n"));
        assert!(text.ends_with("  • Dash"));
    }

    #[test]
    fn diagnostics_list_cache_entries() {
        let diagnostics = Diagnostics {
            source: DataSourceKind::Scrape,
            active_requests: 2,
            pending_debounces: 1,
            caches: vec![CacheStatus {
                key: "leaderboard_top".to_string(),
                age_sec: 12,
                expired: false,
            }],
        };

        let text = format_diagnostics(&diagnostics).unwrap();

        assert!(text.starts_with("Source: scrape\nActive requests: 2\nPending refreshes: 1\n"));
        assert!(text.contains("  • leaderboard_top (12s old)"));
    }
}
