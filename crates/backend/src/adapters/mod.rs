//! Scrapers for the supported advent calendar sites.
//!
//! Each site gets one [`SiteAdapter`] implementation; [`AdapterRegistry`]
//! hands out the right one for a calendar URL via `shared_types::classify`.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::{Html, Selector};
use shared_types::{classify, EntrySlots, Site};

use crate::error::FetchError;

mod adventar;
mod qiita;

pub use adventar::AdventarAdapter;
pub use qiita::QiitaAdapter;

/// Title and entries of a calendar page, as fetched together at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarPage {
    pub title: String,
    pub entry_slots: EntrySlots,
}

#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Display title of the calendar, empty when the page has none.
    async fn fetch_title(&self, url: &str) -> Result<String, FetchError>;

    /// The 25 day slots in day order.
    async fn fetch_entry_slots(&self, url: &str) -> Result<EntrySlots, FetchError>;

    /// Title and slots together. Implementations may serve both from one fetch.
    async fn fetch_calendar(&self, url: &str) -> Result<CalendarPage, FetchError> {
        let title = self.fetch_title(url).await?;
        let entry_slots = self.fetch_entry_slots(url).await?;
        Ok(CalendarPage { title, entry_slots })
    }
}

/// One adapter per supported site.
#[derive(Clone)]
pub struct AdapterRegistry {
    qiita: Arc<dyn SiteAdapter>,
    adventar: Arc<dyn SiteAdapter>,
}

impl AdapterRegistry {
    pub fn new(qiita: Arc<dyn SiteAdapter>, adventar: Arc<dyn SiteAdapter>) -> Self {
        Self { qiita, adventar }
    }

    /// The HTML scrapers, sharing one HTTP client.
    pub fn http(client: reqwest::Client) -> Self {
        Self::new(
            Arc::new(QiitaAdapter::new(client.clone())),
            Arc::new(AdventarAdapter::new(client)),
        )
    }

    pub fn for_site(&self, site: Site) -> Option<&dyn SiteAdapter> {
        match site {
            Site::Qiita => Some(self.qiita.as_ref()),
            Site::Adventar => Some(self.adventar.as_ref()),
            Site::Unknown => None,
        }
    }

    pub fn for_url(&self, url: &str) -> Result<&dyn SiteAdapter, FetchError> {
        self.for_site(classify(url))
            .ok_or_else(|| FetchError::UnsupportedUrl(url.to_string()))
    }
}

/// GET a page and return its body, treating non-2xx answers as failures.
async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    tracing::debug!("Fetching {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|source| FetchError::Http {
        url: url.to_string(),
        source,
    })
}

static OG_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));

/// Page title from `og:title`, falling back to `<title>`.
fn extract_title(document: &Html) -> String {
    let og_title = document
        .select(&OG_TITLE)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty());

    if let Some(title) = og_title {
        return title.to_string();
    }

    document
        .select(&TITLE)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Keep an `href` only when it points somewhere.
fn non_empty_href(href: Option<&str>) -> Option<String> {
    href.map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}
