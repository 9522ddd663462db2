use crate::core::models::WinningBuild;
use crate::core::templates::{format_recent_builds, MessageTemplate};
use chrono::{DateTime, Local};
use minijinja::context;
use std::fmt;
use tracing::error;

/// Outcome of a background refresh, sent to whoever displays the builds.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    BuildsRefreshed(Vec<WinningBuild>, DateTime<Local>),
    // Legitimately empty, not a failure.
    NoBuildsYet,
    RefreshFailed(String),
}

impl Event {
    pub fn from_builds(builds: Vec<WinningBuild>) -> Self {
        match builds.is_empty() {
            true => Event::NoBuildsYet,
            false => Event::BuildsRefreshed(builds, Local::now()),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rendered = match self {
            Event::BuildsRefreshed(builds, timestamp) => format_recent_builds(builds, *timestamp),
            Event::NoBuildsYet => MessageTemplate::NoBuilds.render(context! {}),
            // The cause is logged where it happened; users only get the retry notice.
            Event::RefreshFailed(_) => MessageTemplate::RefreshFailed.render(context! {}),
        };
        match rendered {
            Ok(text) => write!(f, "{}", text),
            Err(e) => {
                error!("Could not render event: {e}");
                write!(f, "{:?}", self)
            }
        }
    }
}
