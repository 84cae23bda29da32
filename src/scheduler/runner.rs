//! Reminder scheduler runner.
//!
//! Each tick, once the configured hour of the local day is reached:
//! 1. Collect payments and events dated within the lookahead window
//! 2. For every subscriber, send each item not yet sent to them today
//! 3. Record successful sends in the ledger; failures are retried next tick
//!
//! A chat that can no longer be reached stays subscribed; it is skipped for
//! the rest of the pass and tried again on the next one.

use std::sync::Arc;

use chrono::{Local, NaiveDate, Timelike};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::{NotificationLedger, SubscriberRegistry};
use crate::commands::format;
use crate::config::ReminderSettings;
use crate::knowledge::{KnowledgeCache, Tab};
use crate::lookup::{self, Event, Payment};
use crate::telegram::{Notifier, NotifyError};

/// Messages that can be sent to the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerMessage {
    /// Stop the scheduler.
    Shutdown,
}

/// One reminder message, identified by the item it is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub key: String,
    pub text: String,
}

/// Outcome of one reminder pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub sent: usize,
    /// Already sent to that subscriber today.
    pub skipped: usize,
    pub failed: usize,
}

/// Periodically notifies subscribers about upcoming payments and events.
pub struct ReminderScheduler {
    cache: Arc<KnowledgeCache>,
    subscribers: Arc<SubscriberRegistry>,
    notifier: Arc<dyn Notifier>,
    settings: ReminderSettings,
    ledger: NotificationLedger,
}

impl ReminderScheduler {
    #[must_use]
    pub fn new(
        cache: Arc<KnowledgeCache>,
        subscribers: Arc<SubscriberRegistry>,
        notifier: Arc<dyn Notifier>,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            cache,
            subscribers,
            notifier,
            settings,
            ledger: NotificationLedger::new(),
        }
    }

    /// Runs the scheduler loop.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SchedulerMessage>) {
        info!(
            "Reminder scheduler started (every {:?}, from {:02}:00, {} days ahead)",
            self.settings.check_interval, self.settings.send_from_hour, self.settings.lookahead_days
        );

        let mut check_timer = interval(self.settings.check_interval);
        check_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = check_timer.tick() => {
                    self.tick().await;
                }
                // Shutdown, or every sender dropped
                _ = rx.recv() => {
                    info!("Reminder scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Single tick: sends only once the configured hour is reached.
    async fn tick(&mut self) {
        let now = Local::now();
        if now.hour() < self.settings.send_from_hour {
            debug!(
                "Too early for reminders ({:02}:{:02})",
                now.hour(),
                now.minute()
            );
            return;
        }
        self.notify_due(now.date_naive()).await;
    }

    /// Reminders for items dated within the lookahead window of `today`.
    #[must_use]
    pub fn due_reminders(&self, today: NaiveDate) -> Vec<Reminder> {
        let days = self.settings.lookahead_days;
        let mut reminders = Vec::new();

        if let Some(snapshot) = self.cache.get(Tab::Payments) {
            reminders.extend(
                lookup::due_within::<Payment>(&snapshot, today, days)
                    .iter()
                    .map(|p| Reminder {
                        key: format!("pago:{}:{}", p.date, p.concept),
                        text: format::payment_reminder(p, today),
                    }),
            );
        }
        if let Some(snapshot) = self.cache.get(Tab::Events) {
            reminders.extend(
                lookup::due_within::<Event>(&snapshot, today, days)
                    .iter()
                    .map(|e| Reminder {
                        key: format!("evento:{}:{}", e.date, e.title),
                        text: format::event_reminder(e, today),
                    }),
            );
        }

        reminders
    }

    /// Sends every due reminder not yet sent today.
    ///
    /// A failed send affects only that subscriber and item.
    pub async fn notify_due(&mut self, today: NaiveDate) -> ReminderReport {
        self.ledger.prune_before(today);

        let mut report = ReminderReport::default();
        let reminders = self.due_reminders(today);
        if reminders.is_empty() {
            debug!("No reminders due for {}", today);
            return report;
        }

        for chat_id in self.subscribers.subscribers() {
            for reminder in &reminders {
                if self.ledger.was_notified(&reminder.key, chat_id, today) {
                    report.skipped += 1;
                    continue;
                }

                match self.notifier.notify(chat_id, &reminder.text).await {
                    Ok(()) => {
                        self.ledger.mark(&reminder.key, chat_id, today);
                        report.sent += 1;
                    }
                    Err(NotifyError::Unreachable(_)) => {
                        warn!("Chat {} is unreachable, skipping it until the next pass", chat_id);
                        report.failed += 1;
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to send reminder {} to chat {}: {}", reminder.key, chat_id, e);
                        report.failed += 1;
                    }
                }
            }
        }

        if report.sent > 0 || report.failed > 0 {
            info!(
                "Reminders for {}: {} sent, {} already sent, {} failed",
                today, report.sent, report.skipped, report.failed
            );
        }
        report
    }
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("settings", &self.settings)
            .field("ledger_entries", &self.ledger.len())
            .finish_non_exhaustive()
    }
}
