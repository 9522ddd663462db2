use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Match dates as written by the site or the dump collector.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and bare
/// `YYYY-MM-DD` (midnight UTC).
pub fn parse_match_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&date));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| Utc.from_utc_datetime(&date))
}

/// "1st", "2nd", "13th", ...
pub fn ordinal(num: i64) -> String {
    let s = num.to_string();
    let suffix = if s.ends_with('1') && !s.ends_with("11") {
        "st"
    } else if s.ends_with('2') && !s.ends_with("12") {
        "nd"
    } else if s.ends_with('3') && !s.ends_with("13") {
        "rd"
    } else {
        "th"
    };
    format!("{s}{suffix}")
}

pub fn plural(count: usize, word: &str) -> String {
    match count {
        1 => format!("1 {word}"),
        _ => format!("{count} {word}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_formats() {
        let noon = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(parse_match_date("2024-01-15T12:00:00Z"), Some(noon));
        assert_eq!(parse_match_date("2024-01-15T14:00:00+02:00"), Some(noon));
        assert_eq!(parse_match_date("2024-01-15 12:00:00"), Some(noon));
        assert_eq!(parse_match_date("2024-01-15T12:00:00"), Some(noon));
        assert_eq!(
            parse_match_date("2024-01-15"),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn relative_dates_are_not_dates() {
        assert_eq!(parse_match_date("2 hours ago"), None);
        assert_eq!(parse_match_date(""), None);
    }

    #[test]
    fn ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(22), "22nd");
    }

    #[test]
    fn plurals() {
        assert_eq!(plural(1, "build"), "1 build");
        assert_eq!(plural(0, "build"), "0 builds");
        assert_eq!(plural(3, "player"), "3 players");
    }
}
