//! Strongly typed rows, converted from loosely typed records.

use chrono::NaiveDate;
use thiserror::Error;

use crate::knowledge::{Record, Tab};

/// Why a row could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("missing value for column '{0}'")]
    MissingColumn(&'static str),

    #[error("unparseable date '{0}'")]
    InvalidDate(String),

    #[error("no requirements listed")]
    EmptyRequirements,
}

/// A row type the lookup layer understands.
pub trait FromRecord: Sized {
    /// Tab the rows come from.
    const TAB: Tab;

    fn from_record(record: &Record) -> Result<Self, RecordError>;
}

/// Rows that carry a calendar date.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

fn required(record: &Record, column: &'static str) -> Result<String, RecordError> {
    record
        .get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(RecordError::MissingColumn(column))
}

fn optional(record: &Record, column: &str) -> Option<String> {
    record
        .get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn required_date(record: &Record, column: &'static str) -> Result<NaiveDate, RecordError> {
    let raw = required(record, column)?;
    parse_date(&raw).ok_or(RecordError::InvalidDate(raw))
}

/// Parses `YYYY-MM-DD`, falling back to `DD/MM/YYYY`.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

/// A degree programme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Career {
    /// Sheet id; falls back to the name when the column is blank.
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub study_plan: Option<String>,
    pub job_field: Option<String>,
    pub cost: Option<String>,
    pub contact: Option<String>,
}

impl FromRecord for Career {
    const TAB: Tab = Tab::Careers;

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        let name = required(record, "nombre")?;
        Ok(Self {
            id: optional(record, "id").unwrap_or_else(|| name.clone()),
            name,
            description: optional(record, "descripcion"),
            duration: optional(record, "duracion"),
            study_plan: optional(record, "plan_estudios"),
            job_field: optional(record, "campo_laboral"),
            cost: optional(record, "costo"),
            contact: optional(record, "contacto"),
        })
    }
}

/// An entry of the academic calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub kind: Option<String>,
}

impl FromRecord for CalendarEntry {
    const TAB: Tab = Tab::Calendar;

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        Ok(Self {
            date: required_date(record, "fecha")?,
            title: required(record, "evento")?,
            description: optional(record, "descripcion"),
            kind: optional(record, "tipo"),
        })
    }
}

impl Dated for CalendarEntry {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// A payment deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub date: NaiveDate,
    pub concept: String,
    pub amount: Option<String>,
    /// Career the payment applies to; `None` (or "Todas") means everyone.
    pub career: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
}

impl FromRecord for Payment {
    const TAB: Tab = Tab::Payments;

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        Ok(Self {
            date: required_date(record, "fecha")?,
            concept: required(record, "concepto")?,
            amount: optional(record, "monto"),
            career: optional(record, "carrera").filter(|c| !c.eq_ignore_ascii_case("todas")),
            description: optional(record, "descripcion"),
            kind: optional(record, "tipo"),
        })
    }
}

impl Dated for Payment {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// A university event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub place: Option<String>,
    pub kind: Option<String>,
}

impl FromRecord for Event {
    const TAB: Tab = Tab::Events;

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        Ok(Self {
            date: required_date(record, "fecha")?,
            title: required(record, "titulo")?,
            description: optional(record, "descripcion"),
            place: optional(record, "lugar"),
            kind: optional(record, "tipo"),
        })
    }
}

impl Dated for Event {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Admission requirements of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionCategory {
    pub name: String,
    pub requirements: Vec<String>,
}

impl FromRecord for AdmissionCategory {
    const TAB: Tab = Tab::Admission;

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        let name = required(record, "categoria")?;
        let requirements = split_requirements(&required(record, "requisitos")?);
        if requirements.is_empty() {
            return Err(RecordError::EmptyRequirements);
        }
        Ok(Self { name, requirements })
    }
}

/// Splits a comma-delimited requirement cell, dropping empty items.
#[must_use]
pub fn split_requirements(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// A staff contact at one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub site: String,
    pub name: String,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub hours: Option<String>,
}

impl FromRecord for Contact {
    const TAB: Tab = Tab::Contacts;

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        Ok(Self {
            site: required(record, "sede")?,
            name: required(record, "nombre")?,
            role: optional(record, "cargo"),
            phone: optional(record, "telefono"),
            email: optional(record, "email"),
            hours: optional(record, "horario"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 15);
        assert_eq!(parse_date("2025-03-15"), expected);
        assert_eq!(parse_date(" 15/03/2025 "), expected);
        assert_eq!(parse_date("15 de marzo"), None);
        assert_eq!(parse_date("2025-02-30"), None);
    }

    #[test]
    fn test_career_id_falls_back_to_name() {
        let career = Career::from_record(&record(&[("nombre", "Derecho"), ("id", "")])).unwrap();
        assert_eq!(career.id, "Derecho");
        assert_eq!(career.description, None);
    }

    #[test]
    fn test_career_requires_name() {
        assert_eq!(
            Career::from_record(&record(&[("id", "7")])),
            Err(RecordError::MissingColumn("nombre"))
        );
    }

    #[test]
    fn test_payment_malformed_date() {
        let result = Payment::from_record(&record(&[("fecha", "mañana"), ("concepto", "Cuota")]));
        assert_eq!(result, Err(RecordError::InvalidDate("mañana".to_owned())));
    }

    #[test]
    fn test_payment_all_careers_normalized() {
        let payment = Payment::from_record(&record(&[
            ("fecha", "2025-04-01"),
            ("concepto", "Cuota"),
            ("carrera", "Todas"),
            ("monto", "50"),
        ]))
        .unwrap();
        assert_eq!(payment.career, None);
        assert_eq!(payment.amount.as_deref(), Some("50"));
    }

    #[test]
    fn test_admission_requirements_split() {
        let category = AdmissionCategory::from_record(&record(&[
            ("categoria", "Documentos"),
            ("requisitos", "Cédula, Partida de nacimiento,, Fotos ,"),
        ]))
        .unwrap();
        assert_eq!(
            category.requirements,
            vec!["Cédula", "Partida de nacimiento", "Fotos"]
        );
    }

    #[test]
    fn test_admission_only_delimiters_rejected() {
        let result = AdmissionCategory::from_record(&record(&[
            ("categoria", "Documentos"),
            ("requisitos", " , ,"),
        ]));
        assert_eq!(result, Err(RecordError::EmptyRequirements));
    }

    #[test]
    fn test_contact_fields() {
        let contact = Contact::from_record(&record(&[
            ("sede", "León"),
            ("nombre", "Ana Pérez"),
            ("email", "ana@uml.edu.ni"),
        ]))
        .unwrap();
        assert_eq!(contact.site, "León");
        assert_eq!(contact.email.as_deref(), Some("ana@uml.edu.ni"));
        assert_eq!(contact.phone, None);
    }
}
