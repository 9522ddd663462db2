use crate::core::models::WinningBuild;
use crate::core::selectors::{text_of, SelectorChain};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

/// Builds kept per player.
pub const MAX_BUILDS_PER_PLAYER: usize = 5;

static MATCH_ROWS: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        ".recent-matches-table tr",
        ".matches-table tbody tr",
        ".match-history tr",
        ".recent-matches tr",
        ".game-history tr",
        "table tr.match-row",
        r#"[data-testid="match-row"]"#,
        ".match-entry",
    ])
});

// Anything that may hold match data, when no known layout matched.
static ANY_MATCH_ROWS: Lazy<SelectorChain> =
    Lazy::new(|| SelectorChain::new(&["tr, .match, .game-row, .battle-result"]));

static PLACEMENT: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        ".placement",
        ".rank",
        ".position",
        r#"[data-testid="placement"]"#,
        ".match-rank",
        ".final-position",
    ])
});

static WINNER_INDICATOR: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[".winner", ".first-place", ".champion", ".victory", ".win"])
});

static ILLUVIAL_ITEMS: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        ".illuvials-list li",
        ".illuvials li",
        ".team-list li",
        ".composition li",
        r#"[data-testid="illuvials"] li"#,
        ".build-illuvials li",
        ".squad-members li",
    ])
});

static ILLUVIAL_BLOCK: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[".illuvials", ".team", ".composition", ".squad", ".build-team"])
});

static AUGMENTS: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        ".augments",
        ".augment-list",
        r#"[data-testid="augments"]"#,
        ".build-augments",
        ".item-augments",
    ])
});

static SUIT: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        ".suit",
        ".armor",
        r#"[data-testid="suit"]"#,
        ".equipment-suit",
        ".player-suit",
    ])
});

static WEAPON: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        ".weapon",
        ".weapon-name",
        r#"[data-testid="weapon"]"#,
        ".primary-weapon",
        ".equipped-weapon",
    ])
});

static MATCH_DATE: Lazy<SelectorChain> = Lazy::new(|| {
    SelectorChain::new(&[
        ".match-date",
        ".date",
        ".timestamp",
        r#"[data-testid="date"]"#,
        ".game-time",
    ])
});

static LEADING_NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d+)").ok());
static NAME_DELIMITERS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[,;|]").ok());

const VICTORY_MARKS: [&str; 3] = ["👑", "🏆", "🥇"];

/// First-place builds found in the match history of a profile page.
///
/// Best effort: rows that cannot be read are skipped, and an unrecognized page
/// gives an empty list. At most [`MAX_BUILDS_PER_PLAYER`] builds are returned,
/// all with placement 1.
pub fn parse_winning_builds_html(html: &str) -> Vec<WinningBuild> {
    let document = Html::parse_document(html);

    let rows = MATCH_ROWS
        .select_in_document(&document)
        .or_else(|| {
            warn!("No match rows found, trying any row-like element");
            ANY_MATCH_ROWS.select_in_document(&document)
        })
        .unwrap_or_default();

    rows.into_iter()
        .enumerate()
        .filter_map(|(idx, row)| build_from_row(row, idx + 1))
        .take(MAX_BUILDS_PER_PLAYER)
        .collect()
}

fn build_from_row(row: ElementRef<'_>, row_number: usize) -> Option<WinningBuild> {
    if !is_first_place(row) {
        return None;
    }

    let illuvials = illuvials(row);
    let augments = AUGMENTS.first_text(row).unwrap_or_default();
    let suit = SUIT.first_text(row).unwrap_or_default();
    let weapon = WEAPON.first_text(row).unwrap_or_default();
    let match_date = MATCH_DATE.first_text(row);

    if illuvials.is_empty() && augments.is_empty() && suit.is_empty() && weapon.is_empty() {
        debug!("Row {row_number}: no build data found");
        return None;
    }

    Some(WinningBuild {
        placement: 1,
        illuvials,
        augments,
        suit,
        weapon,
        match_date,
        player_username: None,
        player_rank: None,
    })
}

// Placement text starting with "1" ("1", "1st", "#1"), else a winner marker.
fn is_first_place(row: ElementRef<'_>) -> bool {
    let by_placement = PLACEMENT
        .find_map(row, |element| {
            let text = text_of(element);
            let number = LEADING_NUMBER
                .as_ref()?
                .captures(&text)?
                .get(1)?
                .as_str()
                .parse::<u32>()
                .ok()?;
            (number == 1).then_some(())
        })
        .is_some();

    by_placement || WINNER_INDICATOR.matches_any(row) || {
        let text = row.text().collect::<String>();
        VICTORY_MARKS.iter().any(|mark| text.contains(mark))
    }
}

fn illuvials(row: ElementRef<'_>) -> Vec<String> {
    let from_items = ILLUVIAL_ITEMS.find_map_all(row, |items| {
        let names = items
            .into_iter()
            .map(text_of)
            .filter(|name| !name.is_empty())
            .collect::<Vec<String>>();
        (!names.is_empty()).then_some(names)
    });
    if let Some(names) = from_items {
        return names;
    }

    ILLUVIAL_BLOCK
        .find_map(row, |element| {
            let text = text_of(element);
            let names = NAME_DELIMITERS
                .as_ref()?
                .split(&text)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect::<Vec<String>>();
            (!names.is_empty()).then_some(names)
        })
        .unwrap_or_default()
}
