pub mod proxy;

use reqwest::Url;
use std::fmt;

/// Pages of the analytics site.
pub enum Endpoint<'a> {
    PlayersAnalytics,
    // Username or path below /players, as found on the leaderboard.
    PlayerPage(&'a str),
    Profile(&'a str),
}

impl fmt::Display for Endpoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Endpoint::PlayersAnalytics => write!(f, "/analytics/players"),
            Endpoint::PlayerPage(path) => write!(f, "/players/{}", path.trim_start_matches('/')),
            Endpoint::Profile(username) => write!(f, "/profile/{}", username),
        }
    }
}

impl Endpoint<'_> {
    /// Absolute url on the site at `base_url`. Profile names are percent-encoded.
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            Endpoint::Profile(username) => Url::parse(base)
                .ok()
                .and_then(|mut url| {
                    url.path_segments_mut()
                        .ok()?
                        .pop_if_empty()
                        .push("profile")
                        .push(username);
                    Some(url.to_string())
                })
                .unwrap_or_else(|| format!("{}{}", base, self)),
            _ => format!("{}{}", base, self),
        }
    }
}

/// Resolve a link found in a page of the site to an absolute url.
pub fn resolve_link(base_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    base.join(href).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls() {
        let base = "https://illuvilytics.web.app/";
        assert_eq!(
            Endpoint::PlayersAnalytics.url(base),
            "https://illuvilytics.web.app/analytics/players"
        );
        assert_eq!(
            Endpoint::PlayerPage("//someone").url(base),
            "https://illuvilytics.web.app/players/someone"
        );
        assert_eq!(
            Endpoint::Profile("Big Boss/2").url(base),
            "https://illuvilytics.web.app/profile/Big%20Boss%2F2"
        );
    }

    #[test]
    fn relative_links_are_resolved() {
        assert_eq!(
            resolve_link("https://illuvilytics.web.app", "/profile/abc"),
            Some("https://illuvilytics.web.app/profile/abc".to_string())
        );
        assert_eq!(
            resolve_link("https://illuvilytics.web.app", "https://other.site/x"),
            Some("https://other.site/x".to_string())
        );
    }
}
