//! Tabs of the knowledge spreadsheet and their immutable snapshots.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

/// One row of a tab: column header to cell text.
pub type Record = HashMap<String, String>;

/// The fixed set of spreadsheet tabs the bot reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tab {
    Careers,
    Calendar,
    Payments,
    Events,
    Admission,
    Contacts,
}

impl Tab {
    /// All tabs, in refresh order.
    pub const ALL: [Self; 6] = [
        Self::Careers,
        Self::Calendar,
        Self::Payments,
        Self::Events,
        Self::Admission,
        Self::Contacts,
    ];

    /// Title of the sheet inside the spreadsheet.
    #[must_use]
    pub const fn sheet_name(self) -> &'static str {
        match self {
            Self::Careers => "carreras",
            Self::Calendar => "calendario",
            Self::Payments => "pagos",
            Self::Events => "eventos",
            Self::Admission => "admision",
            Self::Contacts => "contactos",
        }
    }

    /// Columns a row must carry for the lookup layer to accept it.
    #[must_use]
    pub const fn required_columns(self) -> &'static [&'static str] {
        match self {
            Self::Careers => &["nombre"],
            Self::Calendar => &["fecha", "evento"],
            Self::Payments => &["fecha", "concepto"],
            Self::Events => &["fecha", "titulo"],
            Self::Admission => &["categoria", "requisitos"],
            Self::Contacts => &["sede", "nombre"],
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

/// Error returned when a tab name is not one of the known tabs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tab: '{0}'")]
pub struct UnknownTab(pub String);

impl FromStr for Tab {
    type Err = UnknownTab;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "carreras" | "careers" => Ok(Self::Careers),
            "calendario" | "calendar" => Ok(Self::Calendar),
            "pagos" | "payments" => Ok(Self::Payments),
            "eventos" | "events" => Ok(Self::Events),
            "admision" | "admisión" | "admission" => Ok(Self::Admission),
            "contactos" | "contacts" => Ok(Self::Contacts),
            _ => Err(UnknownTab(s.to_owned())),
        }
    }
}

/// Point-in-time copy of one tab. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct TabSnapshot {
    tab: Tab,
    records: Vec<Record>,
    fetched_at: DateTime<Utc>,
}

impl TabSnapshot {
    /// Wraps freshly fetched rows.
    #[must_use]
    pub fn new(tab: Tab, records: Vec<Record>) -> Self {
        Self::with_timestamp(tab, records, Utc::now())
    }

    #[must_use]
    pub const fn with_timestamp(tab: Tab, records: Vec<Record>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            tab,
            records,
            fetched_at,
        }
    }

    #[must_use]
    pub const fn tab(&self) -> Tab {
        self.tab
    }

    /// Rows in sheet order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
