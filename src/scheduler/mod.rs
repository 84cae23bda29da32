//! Reminder scheduler module.
//!
//! Sends proactive reminders about upcoming payments and events to
//! subscribed chats, at most once per item, subscriber and day.

mod runner;
mod state;

pub use runner::{Reminder, ReminderReport, ReminderScheduler, SchedulerMessage};
pub use state::{
    NotificationLedger, PersistedSubscribers, SubscriberRegistry, SubscriberStoreError,
};
