//! Read-only queries over tab snapshots.
//!
//! Every function takes the snapshot it reads from, so a caller holding a
//! snapshot sees one consistent version of the tab for the whole lookup.
//! Rows that do not convert are skipped and logged.

use chrono::{Days, NaiveDate};
use tracing::warn;

use super::records::{
    AdmissionCategory, CalendarEntry, Career, Contact, Dated, Event, FromRecord, Payment,
    RecordError,
};
use crate::knowledge::{Record, Tab, TabSnapshot};

/// Result of an admission lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionLookup {
    /// No category requested: every category name, in sheet order.
    Categories(Vec<String>),
    /// The requested category.
    Requirements(AdmissionCategory),
    NotFound,
}

/// Result of a contacts lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactLookup {
    /// No site requested: every site name, in first-occurrence order.
    Sites(Vec<String>),
    /// Contacts of the requested site, in sheet order.
    Site { site: String, contacts: Vec<Contact> },
    NotFound,
}

/// Converts every row of `snapshot`, skipping and logging the bad ones.
pub fn parse_rows<T: FromRecord>(snapshot: &TabSnapshot) -> Vec<T> {
    if snapshot.tab() != T::TAB {
        warn!(
            "Snapshot of tab {} used where tab {} was expected",
            snapshot.tab(),
            T::TAB
        );
        return Vec::new();
    }

    snapshot
        .records()
        .iter()
        .enumerate()
        .filter_map(|(i, record)| match T::from_record(record) {
            Ok(row) => Some(row),
            Err(e) => {
                // +2: one for the header row, one for 1-based sheet rows
                warn!("Skipping {} row {}: {}", T::TAB, i + 2, e);
                None
            }
        })
        .collect()
}

/// Rows of `tab` that fail conversion, by sheet row number (header is row 1).
pub fn invalid_rows(tab: Tab, records: &[Record]) -> Vec<(usize, RecordError)> {
    fn check<T: FromRecord>(records: &[Record]) -> Vec<(usize, RecordError)> {
        records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| T::from_record(record).err().map(|e| (i + 2, e)))
            .collect()
    }

    match tab {
        Tab::Careers => check::<Career>(records),
        Tab::Calendar => check::<CalendarEntry>(records),
        Tab::Payments => check::<Payment>(records),
        Tab::Events => check::<Event>(records),
        Tab::Admission => check::<AdmissionCategory>(records),
        Tab::Contacts => check::<Contact>(records),
    }
}

/// Lowercases and strips Spanish diacritics for comparisons.
#[must_use]
pub fn fold(text: &str) -> String {
    text.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            '_' => ' ',
            other => other,
        })
        .collect()
}

/// All careers in sheet order.
pub fn list_careers(snapshot: &TabSnapshot) -> Vec<Career> {
    parse_rows(snapshot)
}

/// Finds the best matching career.
///
/// An exact (case- and accent-insensitive) name or id match wins over a
/// substring match; among equals the first row wins.
pub fn find_career(snapshot: &TabSnapshot, name: &str) -> Option<Career> {
    let needle = fold(name);
    if needle.is_empty() {
        return None;
    }

    let careers = list_careers(snapshot);
    let exact = careers
        .iter()
        .position(|c| fold(&c.name) == needle || fold(&c.id) == needle);
    let index = exact.or_else(|| careers.iter().position(|c| fold(&c.name).contains(&needle)))?;

    careers.into_iter().nth(index)
}

/// Admission categories with duplicates merged.
///
/// A repeated category replaces the earlier requirement list but keeps
/// the position where the category first appeared.
pub fn admission_categories(snapshot: &TabSnapshot) -> Vec<AdmissionCategory> {
    let mut categories: Vec<AdmissionCategory> = Vec::new();

    for category in parse_rows::<AdmissionCategory>(snapshot) {
        let key = fold(&category.name);
        if let Some(existing) = categories.iter_mut().find(|c| fold(&c.name) == key) {
            warn!(
                "Duplicate admission category '{}', using the later row",
                category.name
            );
            existing.requirements = category.requirements;
        } else {
            categories.push(category);
        }
    }

    categories
}

/// Lists categories, or returns one category's requirements.
pub fn admission_by_category(snapshot: &TabSnapshot, category: Option<&str>) -> AdmissionLookup {
    let categories = admission_categories(snapshot);

    let Some(wanted) = category.map(fold).filter(|c| !c.is_empty()) else {
        return AdmissionLookup::Categories(categories.into_iter().map(|c| c.name).collect());
    };

    categories
        .into_iter()
        .find(|c| fold(&c.name) == wanted)
        .map_or(AdmissionLookup::NotFound, AdmissionLookup::Requirements)
}

/// Lists sites, or returns the contacts of one site.
pub fn contacts_by_site(snapshot: &TabSnapshot, site: Option<&str>) -> ContactLookup {
    let contacts: Vec<Contact> = parse_rows(snapshot);

    let Some(wanted) = site.map(fold).filter(|s| !s.is_empty()) else {
        let mut sites: Vec<String> = Vec::new();
        for contact in contacts {
            let key = fold(&contact.site);
            if !sites.iter().any(|s| fold(s) == key) {
                sites.push(contact.site);
            }
        }
        return ContactLookup::Sites(sites);
    };

    let matching: Vec<Contact> = contacts
        .into_iter()
        .filter(|c| fold(&c.site) == wanted)
        .collect();

    match matching.first() {
        Some(first) => ContactLookup::Site {
            site: first.site.clone(),
            contacts: matching,
        },
        None => ContactLookup::NotFound,
    }
}

/// Rows dated on or after `as_of`, in ascending date order.
///
/// Rows sharing a date keep their sheet order.
pub fn upcoming<T: FromRecord + Dated>(snapshot: &TabSnapshot, as_of: NaiveDate) -> Vec<T> {
    let mut rows: Vec<T> = parse_rows::<T>(snapshot)
        .into_iter()
        .filter(|row| row.date() >= as_of)
        .collect();
    rows.sort_by_key(|row| row.date());
    rows
}

/// Rows dated within `[from, from + days]`, in ascending date order.
pub fn due_within<T: FromRecord + Dated>(snapshot: &TabSnapshot, from: NaiveDate, days: u32) -> Vec<T> {
    let until = from
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);
    upcoming::<T>(snapshot, from)
        .into_iter()
        .take_while(|row| row.date() <= until)
        .collect()
}

pub fn upcoming_payments(snapshot: &TabSnapshot, as_of: NaiveDate) -> Vec<Payment> {
    upcoming(snapshot, as_of)
}

pub fn upcoming_events(snapshot: &TabSnapshot, as_of: NaiveDate) -> Vec<Event> {
    upcoming(snapshot, as_of)
}

pub fn upcoming_calendar(snapshot: &TabSnapshot, as_of: NaiveDate) -> Vec<CalendarEntry> {
    upcoming(snapshot, as_of)
}
