//! Lookup service.
//!
//! Pure functions answering structured questions (careers, admission,
//! contacts, upcoming dates) over a supplied tab snapshot.

mod records;
mod service;

pub use records::{
    AdmissionCategory, CalendarEntry, Career, Contact, Dated, Event, FromRecord, Payment,
    RecordError, parse_date, split_requirements,
};
pub use service::{
    AdmissionLookup, ContactLookup, admission_by_category, admission_categories,
    contacts_by_site, due_within, find_career, fold, invalid_rows, list_careers, parse_rows, upcoming,
    upcoming_calendar, upcoming_events, upcoming_payments,
};
