//! Fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared_types::{Calendar, EntrySlots, Store, SLOT_COUNT};
use tokio::sync::Notify;

use crate::adapters::SiteAdapter;
use crate::error::{FetchError, NotifyError};
use crate::notifier::Notifier;
use crate::store::CalendarStore;

/// Slots with the given `(index, url)` pairs filled in.
pub fn slots(entries: &[(usize, &str)]) -> EntrySlots {
    let mut raw = vec![None; SLOT_COUNT];
    for (index, url) in entries {
        raw[*index] = Some(url.to_string());
    }
    EntrySlots::from_fetched(raw)
}

/// A store file in a fresh temporary directory holding `calendars`.
pub fn temp_store(calendars: Vec<Calendar>) -> (tempfile::TempDir, Arc<CalendarStore>) {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("storage.json");
    let state = Store {
        last_updated: None,
        calendars,
    };
    std::fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();
    let store = Arc::new(CalendarStore::open(&path).unwrap());
    (dir, store)
}

/// Lets a test park a fetch mid-flight.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    released: Notify,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.released.notified().await;
    }
}

#[derive(Clone)]
struct FakePage {
    title: String,
    entry_slots: EntrySlots,
}

/// Site adapter serving canned pages; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeAdapter {
    pages: Mutex<HashMap<String, FakePage>>,
    failing: Mutex<HashSet<String>>,
    gate: Mutex<Option<Arc<Gate>>>,
    fetches: AtomicUsize,
}

impl FakeAdapter {
    pub fn set_page(&self, url: &str, title: &str, entry_slots: EntrySlots) {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            FakePage {
                title: title.to_string(),
                entry_slots,
            },
        );
    }

    pub fn set_slots(&self, url: &str, entry_slots: EntrySlots) {
        self.set_page(url, "", entry_slots);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    /// Block every fetch on `gate` until released.
    pub fn hold_with(&self, gate: Arc<Gate>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn stop_holding(&self) {
        *self.gate.lock().unwrap() = None;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn page(&self, url: &str) -> Result<FakePage, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        if self.failing.lock().unwrap().contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }

        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[async_trait]
impl SiteAdapter for FakeAdapter {
    async fn fetch_title(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.page(url).await?.title)
    }

    async fn fetch_entry_slots(&self, url: &str) -> Result<EntrySlots, FetchError> {
        Ok(self.page(url).await?.entry_slots)
    }
}

/// Notifier that records successful deliveries and fails on chosen days.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, usize, String)>>,
    failing_days: Mutex<HashSet<usize>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, usize, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_day(&self, day: usize) {
        self.failing_days.lock().unwrap().insert(day);
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        calendar_title: &str,
        day: usize,
        entry_url: &str,
    ) -> Result<(), NotifyError> {
        if self.failing_days.lock().unwrap().contains(&day) {
            return Err(NotifyError::Api("channel_not_found".to_string()));
        }

        self.sent
            .lock()
            .unwrap()
            .push((calendar_title.to_string(), day, entry_url.to_string()));
        Ok(())
    }
}
