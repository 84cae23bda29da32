//! UML Student Bot Library
//!
//! A Telegram bot answering students of the Universidad Martin Lutero
//! from a spreadsheet-backed knowledge base.
//!
//! This crate provides the core functionality for:
//! - Loading configuration and service-account credentials
//! - Caching spreadsheet tabs as atomically replaced snapshots
//! - Typed lookups over careers, calendar, payments, events, admission and contacts
//! - Dispatching commands, buttons and the admission choice flow
//! - Sending daily reminders to subscribed chats
//! - Relaying free-text questions to an external Q&A webhook

pub mod commands;
pub mod config;
pub mod knowledge;
pub mod lookup;
pub mod qa;
pub mod scheduler;
pub mod sheets;
pub mod telegram;
