//! Periodic re-scrape of every tracked calendar.
//!
//! A cycle locks the store, refreshes each calendar in turn, notifies the
//! chat channel about every new entry and persists the store once at the end.
//! Per-calendar and per-notification failures are logged and skipped; only a
//! storage failure aborts the cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shared_types::{diff, Calendar};

use crate::adapters::AdapterRegistry;
use crate::error::PollError;
use crate::notifier::Notifier;
use crate::store::CalendarStore;

/// Counters for one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub calendars: usize,
    pub refreshed: usize,
    /// Calendars whose URL matches no supported site
    pub skipped: usize,
    /// Calendars whose page could not be fetched
    pub failed: usize,
    pub notified: usize,
    pub notify_failed: usize,
}

pub struct Poller {
    store: Arc<CalendarStore>,
    adapters: AdapterRegistry,
    notifier: Arc<dyn Notifier>,
    running: Arc<AtomicBool>,
}

/// Marks a cycle as in progress until dropped.
struct CycleGuard {
    running: Arc<AtomicBool>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Poller {
    pub fn new(
        store: Arc<CalendarStore>,
        adapters: AdapterRegistry,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            adapters,
            notifier,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Result<CycleGuard, PollError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PollError::AlreadyRunning)?;

        Ok(CycleGuard {
            running: self.running.clone(),
        })
    }

    /// Run one cycle now, unless another one is still in progress.
    pub async fn run_cycle(&self) -> Result<CycleReport, PollError> {
        let _guard = self.try_begin()?;
        self.cycle().await
    }

    /// Start a cycle in the background. Fails immediately if one is running.
    pub fn trigger(self: &Arc<Self>) -> Result<(), PollError> {
        let guard = self.try_begin()?;
        let poller = self.clone();

        tokio::spawn(async move {
            let _guard = guard;
            log_outcome(&poller.cycle().await);
        });

        Ok(())
    }

    async fn cycle(&self) -> Result<CycleReport, PollError> {
        tracing::debug!("Running poll cycle");

        let file = self.store.lock().await;
        let mut store = file.load().await?;

        let mut report = CycleReport {
            calendars: store.calendars.len(),
            ..Default::default()
        };

        for calendar in store.calendars.iter_mut() {
            self.refresh_calendar(calendar, &mut report).await;
        }

        store.touch();
        file.persist(&store).await?;

        Ok(report)
    }

    async fn refresh_calendar(&self, calendar: &mut Calendar, report: &mut CycleReport) {
        let adapter = match self.adapters.for_url(&calendar.url) {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::warn!("Skipping calendar: {}", e);
                report.skipped += 1;
                return;
            }
        };

        let fresh = match adapter.fetch_entry_slots(&calendar.url).await {
            Ok(slots) => slots,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", calendar.url, e);
                report.failed += 1;
                return;
            }
        };

        let changed = diff(&calendar.entry_slots, &fresh);
        if !changed.is_empty() {
            tracing::info!("Found {} changed entries in {}", changed.len(), calendar.url);
        }

        for index in changed {
            let day = index + 1;
            let Some(entry_url) = fresh.get(index) else {
                tracing::debug!("Entry for day {} of {} was removed", day, calendar.url);
                continue;
            };

            match self.notifier.notify(&calendar.title, day, entry_url).await {
                Ok(()) => {
                    tracing::debug!("Notified day {} of {}", day, calendar.url);
                    report.notified += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to notify day {} of {}: {}",
                        day,
                        calendar.url,
                        e
                    );
                    report.notify_failed += 1;
                }
            }
        }

        calendar.entry_slots = fresh;
        report.refreshed += 1;
    }
}

fn log_outcome(outcome: &Result<CycleReport, PollError>) {
    match outcome {
        Ok(report) => tracing::info!(
            "Poll cycle done: {}/{} calendars refreshed, {} skipped, {} failed, {} notified, {} notifications failed",
            report.refreshed,
            report.calendars,
            report.skipped,
            report.failed,
            report.notified,
            report.notify_failed
        ),
        Err(PollError::AlreadyRunning) => {
            tracing::debug!("Poll cycle skipped: previous cycle still running")
        }
        Err(e) => tracing::error!("Poll cycle failed: {}", e),
    }
}

/// Start the polling background task.
///
/// The first cycle runs right away; each following cycle starts `interval`
/// after the previous one finished, so a slow cycle delays the next one
/// instead of overlapping it.
pub async fn start_polling_task(poller: Arc<Poller>, interval: Duration) {
    tracing::info!("Starting calendar polling task (interval: {:?})", interval);

    loop {
        log_outcome(&poller.run_cycle().await);
        tokio::time::sleep(interval).await;
    }
}
