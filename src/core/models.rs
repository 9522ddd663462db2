use serde::{Deserialize, Serialize};

/// Rank assumed for builds whose player rank is unknown.
pub const UNKNOWN_RANK: u32 = 999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardPlayer {
    pub username: String,
    pub profile_url: String,
    // 1-based
    pub rank: u32,
}

/// One player's loadout for a single match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WinningBuild {
    pub placement: i64,
    pub illuvials: Vec<String>,
    pub augments: String,
    pub suit: String,
    pub weapon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_rank: Option<u32>,
}

impl WinningBuild {
    pub fn tagged_with(mut self, player: &LeaderboardPlayer) -> Self {
        self.player_username = Some(player.username.clone());
        self.player_rank = Some(player.rank);
        self
    }

    pub fn rank_or_unknown(&self) -> u32 {
        self.player_rank.unwrap_or(UNKNOWN_RANK)
    }
}

// Precomputed dump written by the offline collector.
// Every field is defaulted: a partial dump degrades to missing data, not a failure.

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildDump {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub players: Vec<DumpPlayer>,
    #[serde(default)]
    pub builds: Vec<DetailedBuild>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpPlayer {
    pub username: String,
    pub rank: u32,
    #[serde(default)]
    pub profile_url: String,
}

/// Full dump record, keeping the per-creature bond and augment detail.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetailedBuild {
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub player_rank: u32,
    #[serde(default)]
    pub placement: i64,
    #[serde(default)]
    pub illuvials: Vec<DumpIlluvial>,
    #[serde(default)]
    pub bonded_illuvials: Vec<String>,
    #[serde(default)]
    pub suit: String,
    #[serde(default)]
    pub weapon: String,
    #[serde(default)]
    pub match_date: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub game_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DumpIlluvial {
    pub name: String,
    #[serde(default)]
    pub is_bonded: bool,
    #[serde(default)]
    pub augments: Vec<String>,
}

impl From<&DumpPlayer> for LeaderboardPlayer {
    fn from(player: &DumpPlayer) -> Self {
        LeaderboardPlayer {
            username: player.username.clone(),
            profile_url: player.profile_url.clone(),
            rank: player.rank,
        }
    }
}

impl From<&DetailedBuild> for WinningBuild {
    fn from(build: &DetailedBuild) -> Self {
        WinningBuild {
            placement: build.placement,
            illuvials: build.illuvials.iter().map(|i| i.name.clone()).collect(),
            // Augments are per creature in the dump, see DetailedBuild.
            augments: String::new(),
            suit: build.suit.clone(),
            weapon: build.weapon.clone(),
            match_date: Some(build.match_date.clone()).filter(|d| !d.is_empty()),
            player_username: Some(build.player_name.clone()).filter(|n| !n.is_empty()),
            player_rank: Some(build.player_rank).filter(|r| *r > 0),
        }
    }
}
