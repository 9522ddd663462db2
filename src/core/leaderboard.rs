use crate::client::{resolve_link, Endpoint};
use crate::core::models::LeaderboardPlayer;
use crate::core::selectors::{text_of, SelectorChain};
use crate::error::{OverlayError, OverlayResult};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Players kept from the top of the leaderboard.
pub const TOP_PLAYERS: usize = 5;

static ENTRY_ROWS: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        ".leaderboard-entry",
        "tr.player-row",
        ".player-entry",
        "tbody tr",
        ".ranking-row",
    ])
});

static USERNAME: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        ".player-name",
        ".username",
        ".name",
        "td:nth-child(2)",
        r#"a[href*="/profile/"]"#,
        ".player-link",
        // Last resort, any link text
        "a",
    ])
});

static RANK: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&[".rank", ".position", "td:first-child", ".ranking"]));

static PROFILE_LINK: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse(r#"a[href*="/profile/"]"#).ok());

/// Top players found in the HTML of the players analytics page.
///
/// The first row selector matching anything decides the layout; only the first
/// [`TOP_PLAYERS`] rows are looked at. Fails if the layout is not recognized or
/// no player could be read from the rows.
pub fn parse_leaderboard_html(
    html: &str,
    site_base_url: &str,
) -> OverlayResult<Vec<LeaderboardPlayer>> {
    let document = Html::parse_document(html);

    let rows = ENTRY_ROWS.select_in_document(&document).ok_or_else(|| {
        OverlayError::Structure(
            "No leaderboard entries found. Website structure may have changed.".to_string(),
        )
    })?;

    let players = rows
        .into_iter()
        .take(TOP_PLAYERS)
        .enumerate()
        .filter_map(|(idx, row)| player_from_row(row, idx as u32 + 1, site_base_url))
        .collect::<Vec<LeaderboardPlayer>>();

    match players.is_empty() {
        true => Err(OverlayError::Structure(
            "Could not extract player data. Website structure may have changed.".to_string(),
        )),
        false => Ok(players),
    }
}

fn player_from_row(
    row: ElementRef<'_>,
    fallback_rank: u32,
    site_base_url: &str,
) -> Option<LeaderboardPlayer> {
    let Some((username, href)) = USERNAME.find_map(row, |element| {
        let username = text_of(element);
        if username.is_empty() {
            return None;
        }
        Some((username, profile_href(element)))
    }) else {
        warn!("Could not extract username for entry {fallback_rank}");
        return None;
    };

    let rank = RANK
        .find_map(row, |element| parse_rank(&text_of(element)))
        .unwrap_or(fallback_rank);

    let profile_url = href
        .and_then(|href| resolve_link(site_base_url, &href))
        .unwrap_or_else(|| Endpoint::Profile(&username).url(site_base_url));

    debug!("Leaderboard entry {rank}: {username}");
    Some(LeaderboardPlayer {
        username,
        profile_url,
        rank,
    })
}

// The element itself when it is a link, else a profile link nested in it.
fn profile_href(element: ElementRef<'_>) -> Option<String> {
    if element.value().name() == "a" {
        return element.value().attr("href").map(str::to_string);
    }
    let selector = PROFILE_LINK.as_ref()?;
    element
        .select(selector)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(str::to_string)
}

// "#1", "1st", "Rank 12" → digits only. Ranks are 1-based.
fn parse_rank(text: &str) -> Option<u32> {
    text.chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse::<u32>()
        .ok()
        .filter(|rank| *rank >= 1)
}
