use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{Html, Selector};
use shared_types::EntrySlots;

use super::{extract_title, fetch_html, non_empty_href, CalendarPage, SiteAdapter};
use crate::error::FetchError;

// <div class="adventCalendarItem">
//   <div class="adventCalendarItem_date">12 / 1</div>
//   <div class="adventCalendarItem_author">...</div>
//   <div class="adventCalendarItem_entry"><a href="...">...</a></div>
// </div>
static CALENDAR_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#main .adventCalendarItem").expect("valid selector"));
static ENTRY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".adventCalendarItem_entry a").expect("valid selector"));

/// Scraper for `qiita.com/advent-calendar/<year>/<name>` pages.
pub struct QiitaAdapter {
    client: reqwest::Client,
}

impl QiitaAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// One slot per calendar item; days nobody has posted yet have no entry link.
fn parse_entry_slots(document: &Html) -> EntrySlots {
    let entries = document
        .select(&CALENDAR_ITEM)
        .map(|item| {
            let href = item
                .select(&ENTRY_LINK)
                .next()
                .and_then(|link| link.value().attr("href"));
            non_empty_href(href)
        })
        .collect();

    EntrySlots::from_fetched(entries)
}

#[async_trait]
impl SiteAdapter for QiitaAdapter {
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
