//! Registration of new calendars from chat messages.
//!
//! The chat platform's outgoing webhook forwards every channel message. A
//! message that carries the shared token, was not written by the bot itself
//! and mentions a supported calendar URL adds that calendar to the store.

use std::sync::Arc;

use serde::Deserialize;
use shared_types::{extract_calendar_url, Calendar};

use crate::adapters::AdapterRegistry;
use crate::error::StoreError;
use crate::store::CalendarStore;

/// Fields of the outgoing-webhook form the handler cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Token missing or different from the configured secret
    AuthRejected,
    /// Sent by the bot itself
    SelfMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(Calendar),
    Rejected(RejectReason),
    NoUrlFound,
    FetchFailed,
    StoreFailed,
}

pub struct Registrar {
    store: Arc<CalendarStore>,
    adapters: AdapterRegistry,
    webhook_token: String,
    bot_name: String,
}

impl Registrar {
    pub fn new(
        store: Arc<CalendarStore>,
        adapters: AdapterRegistry,
        webhook_token: impl Into<String>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            adapters,
            webhook_token: webhook_token.into(),
            bot_name: bot_name.into(),
        }
    }

    pub fn token_matches(&self, token: &str) -> bool {
        !self.webhook_token.is_empty() && token == self.webhook_token
    }

    pub async fn handle(&self, message: &IncomingMessage) -> RegistrationOutcome {
        if !self.token_matches(&message.token) {
            tracing::warn!("Rejected webhook call with invalid token");
            return RegistrationOutcome::Rejected(RejectReason::AuthRejected);
        }

        if message.user_name == self.bot_name {
            return RegistrationOutcome::Rejected(RejectReason::SelfMessage);
        }

        tracing::info!("New message by @{}: `{}`", message.user_name, message.text);

        let Some(found) = extract_calendar_url(&message.text) else {
            tracing::debug!("No calendar URL found");
            return RegistrationOutcome::NoUrlFound;
        };
        let Some(adapter) = self.adapters.for_site(found.site) else {
            return RegistrationOutcome::NoUrlFound;
        };

        tracing::info!("Registering {} calendar {}", found.site, found.url);

        let page = match adapter.fetch_calendar(&found.url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed to fetch new calendar {}: {}", found.url, e);
                return RegistrationOutcome::FetchFailed;
            }
        };

        let calendar = Calendar::new(found.url, page.title, page.entry_slots);
        match self.append(calendar.clone()).await {
            Ok(()) => {
                tracing::info!(
                    "Now tracking \"{}\" ({}, {} entries published)",
                    calendar.title,
                    calendar.url,
                    calendar.entry_slots.published()
                );
                RegistrationOutcome::Registered(calendar)
            }
            Err(e) => {
                tracing::error!("Failed to store calendar {}: {}", calendar.url, e);
                RegistrationOutcome::StoreFailed
            }
        }
    }

    async fn append(&self, calendar: Calendar) -> Result<(), StoreError> {
        let file = self.store.lock().await;
        let mut store = file.load().await?;

        if store.calendars.iter().any(|c| c.url == calendar.url) {
            tracing::warn!("{} is already tracked, adding it again", calendar.url);
        }

        store.calendars.push(calendar);
        store.touch();
        file.persist(&store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::Notifier;
    use crate::poller::Poller;
    use crate::testing::{slots, temp_store, FakeAdapter, Gate, RecordingNotifier};
    use shared_types::EntrySlots;

    const ADVENTAR: &str = "http://www.adventar.org/calendars/730";
    const QIITA: &str = "http://qiita.com/advent-calendar/2015/python";
    const TOKEN: &str = "webhook-secret";
    const BOT: &str = "advent-bot";

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<CalendarStore>,
        qiita: Arc<FakeAdapter>,
        adventar: Arc<FakeAdapter>,
        registrar: Registrar,
    }

    fn fixture(calendars: Vec<Calendar>) -> Fixture {
        let (dir, store) = temp_store(calendars);
        let qiita = Arc::new(FakeAdapter::default());
        let adventar = Arc::new(FakeAdapter::default());
        qiita.set_page(QIITA, "Python Advent Calendar 2015", slots(&[(0, "q1")]));
        adventar.set_page(ADVENTAR, "OUCC Advent Calendar 2015", slots(&[(0, "a1"), (1, "a2")]));

        let registrar = Registrar::new(
            store.clone(),
            AdapterRegistry::new(qiita.clone(), adventar.clone()),
            TOKEN,
            BOT,
        );

        Fixture {
            _dir: dir,
            store,
            qiita,
            adventar,
            registrar,
        }
    }

    fn message(token: &str, user_name: &str, text: &str) -> IncomingMessage {
        IncomingMessage {
            token: token.to_string(),
            user_name: user_name.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_registers_adventar_calendar() {
        let f = fixture(vec![]);

        let outcome = f
            .registrar
            .handle(&message(TOKEN, "alice", "check out http://www.adventar.org/calendars/730"))
            .await;

        let expected = Calendar::new(
            ADVENTAR,
            "OUCC Advent Calendar 2015",
            slots(&[(0, "a1"), (1, "a2")]),
        );
        assert_eq!(outcome, RegistrationOutcome::Registered(expected.clone()));

        let state = f.store.snapshot().await.unwrap();
        assert_eq!(state.calendars, vec![expected]);
        assert!(state.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_appends_in_registration_order() {
        let f = fixture(vec![Calendar::new(
            "http://www.adventar.org/calendars/1",
            "First",
            EntrySlots::default(),
        )]);

        f.registrar.handle(&message(TOKEN, "alice", QIITA)).await;

        let urls: Vec<String> = f
            .store
            .snapshot()
            .await
            .unwrap()
            .calendars
            .into_iter()
            .map(|c| c.url)
            .collect();
        assert_eq!(urls, vec!["http://www.adventar.org/calendars/1", QIITA]);
    }

    #[tokio::test]
    async fn test_bot_messages_are_ignored() {
        let f = fixture(vec![]);

        let outcome = f.registrar.handle(&message(TOKEN, BOT, ADVENTAR)).await;

        assert_eq!(outcome, RegistrationOutcome::Rejected(RejectReason::SelfMessage));
        assert!(f.store.snapshot().await.unwrap().calendars.is_empty());
        assert_eq!(f.adventar.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_token_is_rejected() {
        let f = fixture(vec![]);

        let outcome = f.registrar.handle(&message("guess", "alice", ADVENTAR)).await;
        assert_eq!(outcome, RegistrationOutcome::Rejected(RejectReason::AuthRejected));

        let outcome = f.registrar.handle(&message("", "alice", ADVENTAR)).await;
        assert_eq!(outcome, RegistrationOutcome::Rejected(RejectReason::AuthRejected));

        assert!(f.store.snapshot().await.unwrap().calendars.is_empty());
        assert_eq!(f.adventar.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_message_without_url() {
        let f = fixture(vec![]);

        let outcome = f.registrar.handle(&message(TOKEN, "alice", "good morning")).await;

        assert_eq!(outcome, RegistrationOutcome::NoUrlFound);
        assert!(f.store.snapshot().await.unwrap().calendars.is_empty());
    }

    #[tokio::test]
    async fn test_qiita_url_wins_over_adventar() {
        let f = fixture(vec![]);
        let text = format!("<{}> and <{}>", ADVENTAR, QIITA);

        let outcome = f.registrar.handle(&message(TOKEN, "alice", &text)).await;

        let RegistrationOutcome::Registered(calendar) = outcome else {
            panic!("expected registration, got {:?}", outcome);
        };
        assert_eq!(calendar.url, QIITA);
        assert_eq!(calendar.title, "Python Advent Calendar 2015");
        assert_eq!(f.qiita.fetch_count(), 2);
        assert_eq!(f.adventar.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_store_untouched() {
        let f = fixture(vec![]);
        f.adventar.fail(ADVENTAR);

        let outcome = f.registrar.handle(&message(TOKEN, "alice", ADVENTAR)).await;

        assert_eq!(outcome, RegistrationOutcome::FetchFailed);
        let state = f.store.snapshot().await.unwrap();
        assert!(state.calendars.is_empty());
        assert!(state.last_updated.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_url_is_registered_again() {
        let f = fixture(vec![]);

        f.registrar.handle(&message(TOKEN, "alice", ADVENTAR)).await;
        f.registrar.handle(&message(TOKEN, "bob", ADVENTAR)).await;

        assert_eq!(f.store.snapshot().await.unwrap().calendars.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_registration_during_poll_cycle_is_not_lost() {
        let f = fixture(vec![Calendar::new(QIITA, "Python", EntrySlots::default())]);
        let gate = Arc::new(Gate::default());
        f.qiita.hold_with(gate.clone());

        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());
        let poller = Arc::new(Poller::new(
            f.store.clone(),
            AdapterRegistry::new(f.qiita.clone(), f.adventar.clone()),
            notifier,
        ));

        // poll cycle holds the store while parked on the Qiita fetch
        let cycle = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.run_cycle().await })
        };
        gate.wait_entered().await;

        let registrar = Arc::new(f.registrar);
        let registration = {
            let registrar = registrar.clone();
            tokio::spawn(async move {
                registrar
                    .handle(&message(TOKEN, "alice", "http://www.adventar.org/calendars/730"))
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!registration.is_finished());

        gate.release();
        cycle.await.unwrap().unwrap();
        let outcome = registration.await.unwrap();
        assert!(matches!(outcome, RegistrationOutcome::Registered(_)));

        let state = f.store.snapshot().await.unwrap();
        assert_eq!(state.calendars.len(), 2);
        assert_eq!(state.calendars[0].entry_slots, slots(&[(0, "q1")]));
        assert_eq!(state.calendars[1].url, ADVENTAR);
    }
}
