use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{Html, Selector};
use shared_types::EntrySlots;

use super::{extract_title, fetch_html, non_empty_href, CalendarPage, SiteAdapter};
use crate::error::FetchError;

static ENTRY_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".mod-entryList .mod-entryList-body .mod-entryList-url a")
        .expect("valid selector")
});

/// Scraper for `adventar.org/calendars/<id>` pages.
pub struct AdventarAdapter {
    client: reqwest::Client,
}

impl AdventarAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Entry anchors are listed in day order; an anchor without `href` is an
/// open day.
fn parse_entry_slots(document: &Html) -> EntrySlots {
    let entries = document
        .select(&ENTRY_LINK)
        .map(|link| non_empty_href(link.value().attr("href")))
        .collect();

    EntrySlots::from_fetched(entries)
}

#[async_trait]
impl SiteAdapter for AdventarAdapter {
    async fn fetch_title(&self, url: &str) -> Result<String, FetchError> {
        let html = fetch_html(&self.client, url).await?;
        Ok(extract_title(&Html::parse_document(&html)))
    }

    async fn fetch_entry_slots(&self, url: &str) -> Result<EntrySlots, FetchError> {
        let html = fetch_html(&self.client, url).await?;
        Ok(parse_entry_slots(&Html::parse_document(&html)))
    }

    async fn fetch_calendar(&self, url: &str) -> Result<CalendarPage, FetchError> {
        let html = fetch_html(&self.client, url).await?;
        let document = Html::parse_document(&html);
        Ok(CalendarPage {
            title: extract_title(&document),
            entry_slots: parse_entry_slots(&document),
        })
    }
}
