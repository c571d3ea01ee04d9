//! Recognition of the two supported calendar sites.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// Slack wraps links as `<url>` or `<url|label>`, so both delimiters end a match.
static QIITA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://qiita\.com/advent-calendar/\d{4}/[^>|\s]+").expect("valid regex")
});

static ADVENTAR_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?adventar\.org/calendars/\d+").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Qiita,
    Adventar,
    Unknown,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Qiita => write!(f, "qiita"),
            Site::Adventar => write!(f, "adventar"),
            Site::Unknown => write!(f, "unknown"),
        }
    }
}

/// A calendar URL found in free text, together with the site it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarUrl {
    pub site: Site,
    pub url: String,
}

/// Decide which site a stored calendar URL belongs to.
pub fn classify(url: &str) -> Site {
    let url = url.trim();
    let starts_with = |re: &Regex| re.find(url).is_some_and(|m| m.start() == 0);

    if starts_with(&QIITA_URL) {
        Site::Qiita
    } else if starts_with(&ADVENTAR_URL) {
        Site::Adventar
    } else {
        Site::Unknown
    }
}

/// Find the calendar URL mentioned in a chat message.
///
/// Adventar is scanned first and Qiita second; when the text holds both, the
/// Qiita URL wins. Only the first match of each pattern is considered.
pub fn extract_calendar_url(text: &str) -> Option<CalendarUrl> {
    let mut found = None;

    if let Some(m) = ADVENTAR_URL.find(text) {
        found = Some(CalendarUrl {
            site: Site::Adventar,
            url: m.as_str().to_string(),
        });
    }
    if let Some(m) = QIITA_URL.find(text) {
        found = Some(CalendarUrl {
            site: Site::Qiita,
            url: m.as_str().to_string(),
        });
    }

    found
}
