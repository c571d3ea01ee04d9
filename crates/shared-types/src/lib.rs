use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub mod diff;
pub mod site;

pub use diff::diff;
pub use site::{classify, extract_calendar_url, CalendarUrl, Site};

/// Number of day positions in every advent calendar (December 1st to 25th).
pub const SLOT_COUNT: usize = 25;

/// The 25 entry slots of a calendar, indexed by `day - 1`.
///
/// The length is fixed by construction: anything shorter is padded with
/// `None`, anything longer is truncated. This holds for fetched pages as well
/// as for documents read back from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Option<String>>", into = "Vec<Option<String>>")]
pub struct EntrySlots(Vec<Option<String>>);

impl EntrySlots {
    /// Build slots from an arbitrary-length list as scraped from a page.
    pub fn from_fetched(mut entries: Vec<Option<String>>) -> Self {
        entries.resize(SLOT_COUNT, None);
        EntrySlots(entries)
    }

    /// Entry URL for a zero-based slot index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|slot| slot.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.iter().map(|slot| slot.as_deref())
    }

    /// Number of days that already have an entry.
    pub fn published(&self) -> usize {
        self.0.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn as_slice(&self) -> &[Option<String>] {
        &self.0
    }
}

impl Default for EntrySlots {
    fn default() -> Self {
        EntrySlots(vec![None; SLOT_COUNT])
    }
}

impl From<Vec<Option<String>>> for EntrySlots {
    fn from(entries: Vec<Option<String>>) -> Self {
        EntrySlots::from_fetched(entries)
    }
}

impl From<EntrySlots> for Vec<Option<String>> {
    fn from(slots: EntrySlots) -> Self {
        slots.0
    }
}

/// One tracked advent calendar page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub url: String,
    /// Set once at registration; empty when the page had no usable title.
    #[serde(default)]
    pub title: String,
    #[serde(alias = "entry_urls")]
    pub entry_slots: EntrySlots,
}

impl Calendar {
    pub fn new(url: impl Into<String>, title: impl Into<String>, entry_slots: EntrySlots) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            entry_slots,
        }
    }

    pub fn site(&self) -> Site {
        classify(&self.url)
    }
}

/// The whole persisted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    #[serde(
        default,
        alias = "last_updated",
        deserialize_with = "deserialize_timestamp"
    )]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub calendars: Vec<Calendar>,
}

impl Store {
    pub fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }
}

// Older storage files carry `"last_updated": ""` until the first poll.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

/// Calendar listing returned by `GET /api/calendars`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSummary {
    pub url: String,
    pub title: String,
    pub site: Site,
    pub published: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CalendarSummary {
    pub fn from_calendar(calendar: &Calendar, last_updated: Option<DateTime<Utc>>) -> Self {
        Self {
            url: calendar.url.clone(),
            title: calendar.title.clone(),
            site: calendar.site(),
            published: calendar.entry_slots.published(),
            last_updated,
        }
    }
}

/// Acknowledgement body sent back to the chat platform after a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookReply {
    pub text: String,
}
