//! User-facing message text.

use std::fmt::Write as _;

use chrono::NaiveDate;

use super::types::{BotCommand, Button, ButtonAction, Reply};
use crate::knowledge::{RefreshReport, Tab, TabStatus};
use crate::lookup::{AdmissionCategory, CalendarEntry, Career, Contact, Event, Payment};

/// Telegram's message length limit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const UNIVERSITY: &str = "Universidad Martin Lutero";
const CALENDAR_LIMIT: usize = 10;
const PAYMENTS_LIMIT: usize = 8;
const ADMISSION_PREVIEW: usize = 3;

fn event_emoji(kind: Option<&str>) -> &'static str {
    match kind.map(crate::lookup::fold).as_deref() {
        Some("academico") => "📚",
        Some("pago") => "💰",
        Some("graduacion") => "🎓",
        Some("cultural") => "🎭",
        Some("deportivo") => "⚽",
        Some("conferencia") => "🎤",
        Some("taller") => "🔧",
        Some("examen") => "📝",
        Some("vacaciones") => "🏖️",
        _ => "📅",
    }
}

fn category_emoji(category: &str) -> &'static str {
    match crate::lookup::fold(category).as_str() {
        "documentos" => "📄",
        "academicos" => "🎓",
        "personales" => "👤",
        "economicos" => "💰",
        "medicos" => "🏥",
        _ => "📋",
    }
}

fn date_str(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn days_until(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "hoy".to_owned(),
        1 => "mañana".to_owned(),
        n => format!("en {n} días"),
    }
}

fn menu_buttons() -> Vec<Button> {
    vec![
        Button::new("📅 Calendario Académico", ButtonAction::Calendar),
        Button::new("💰 Información de Pagos", ButtonAction::Payments),
        Button::new("🎉 Eventos", ButtonAction::Events),
        Button::new("🎓 Carreras Disponibles", ButtonAction::Careers),
        Button::new("📋 Requisitos de Admisión", ButtonAction::Admission),
        Button::new("📞 Contactos por Sede", ButtonAction::Contacts),
    ]
}

pub fn welcome(first_name: Option<&str>) -> Reply {
    let greeting = first_name.map_or_else(|| "¡Hola!".to_owned(), |n| format!("¡Hola {n}!"));
    Reply::text(format!(
        "🤖 {greeting}\n\n\
         Bienvenido al Bot de la {UNIVERSITY}, Nicaragua.\n\n\
         Puedo ayudarte con:\n\
         📅 Calendario académico y eventos\n\
         💰 Información sobre pagos\n\
         🎓 Carreras y requisitos de admisión\n\
         📞 Contactos de autoridades\n\n\
         También puedes escribirme tu pregunta directamente.\n\
         Usa /help para ver todos los comandos."
    ))
    .with_buttons(menu_buttons())
}

pub fn help() -> Reply {
    let mut text = String::from("🤖 Comandos disponibles:\n\n");
    for (usage, description) in BotCommand::all_commands() {
        let _ = writeln!(text, "{usage} - {description}");
    }
    text.push_str("\nEjemplo: /contactos Managua\n");
    text.push_str("Cualquier otro mensaje se envía a nuestro asistente de preguntas.");
    Reply::text(text)
}

pub fn menu() -> Reply {
    Reply::text("🎯 Menú Principal\nSelecciona una opción:").with_buttons(menu_buttons())
}

pub fn not_loaded() -> Reply {
    Reply::text("⏳ Todavía estoy cargando la información. Intenta de nuevo en unos segundos.")
}

pub fn no_data(tab: Tab) -> Reply {
    let what = match tab {
        Tab::Careers => "carreras",
        Tab::Calendar => "el calendario académico",
        Tab::Payments => "pagos",
        Tab::Events => "eventos",
        Tab::Admission => "admisión",
        Tab::Contacts => "contactos",
    };
    Reply::text(format!("❌ No hay información de {what} disponible en este momento."))
}

pub fn calendar(entries: &[CalendarEntry]) -> Reply {
    if entries.is_empty() {
        return Reply::text("📅 No hay eventos programados en el calendario académico.");
    }

    let mut text = format!("📅 Calendario Académico - {UNIVERSITY}\n\n");
    for entry in entries.iter().take(CALENDAR_LIMIT) {
        let _ = writeln!(
            text,
            "{} {} - {}",
            event_emoji(entry.kind.as_deref()),
            date_str(entry.date),
            entry.title
        );
        if let Some(description) = &entry.description {
            let _ = writeln!(text, "   {description}");
        }
        text.push('\n');
    }
    if entries.len() > CALENDAR_LIMIT {
        let _ = writeln!(text, "... y {} eventos más", entries.len() - CALENDAR_LIMIT);
    }

    Reply::text(text).with_buttons([
        Button::new("🎉 Ver Eventos", ButtonAction::Events),
        Button::new("💰 Pagos", ButtonAction::Payments),
    ])
}

fn payment_lines(text: &mut String, payment: &Payment, today: NaiveDate) {
    let _ = writeln!(
        text,
        "📅 {} ({})",
        date_str(payment.date),
        days_until(payment.date, today)
    );
    let _ = writeln!(text, "💳 {}", payment.concept);
    if let Some(amount) = &payment.amount {
        let _ = writeln!(text, "💰 ${amount}");
    }
    if let Some(career) = &payment.career {
        let _ = writeln!(text, "🎓 {career}");
    }
    if let Some(description) = &payment.description {
        let _ = writeln!(text, "📝 {description}");
    }
}

pub fn payments(payments: &[Payment], today: NaiveDate) -> Reply {
    if payments.is_empty() {
        return Reply::text("💰 No hay pagos programados próximamente.");
    }

    let mut text = format!("💰 Próximos Pagos - {UNIVERSITY}\n\n");
    for payment in payments.iter().take(PAYMENTS_LIMIT) {
        payment_lines(&mut text, payment, today);
        text.push('\n');
    }
    if payments.len() > PAYMENTS_LIMIT {
        let _ = writeln!(text, "... y {} pagos más\n", payments.len() - PAYMENTS_LIMIT);
    }
    text.push_str("💡 Mantén al día tus pagos para evitar sanciones.\n");
    text.push_str("📞 Dudas: oficina de finanzas de tu sede.");

    Reply::text(text).with_buttons([
        Button::new("📅 Calendario", ButtonAction::Calendar),
        Button::new("📞 Contactos", ButtonAction::Contacts),
    ])
}

fn event_lines(text: &mut String, event: &Event) {
    let _ = writeln!(text, "{} {}", event_emoji(event.kind.as_deref()), event.title);
    let _ = writeln!(text, "📅 {}", date_str(event.date));
    if let Some(place) = &event.place {
        let _ = writeln!(text, "📍 {place}");
    }
    if let Some(description) = &event.description {
        let _ = writeln!(text, "📝 {description}");
    }
}

pub fn events(events: &[Event]) -> Reply {
    if events.is_empty() {
        return Reply::text("📅 No hay eventos próximos programados.");
    }

    let mut text = format!("🎉 Eventos Próximos - {UNIVERSITY}\n\n");
    for event in events {
        event_lines(&mut text, event);
        text.push('\n');
    }

    Reply::text(text).with_buttons([
        Button::new("📅 Calendario Completo", ButtonAction::Calendar),
        Button::new("💰 Pagos", ButtonAction::Payments),
    ])
}

pub fn careers(careers: &[Career]) -> Reply {
    let mut text = format!("🎓 Carreras Disponibles en la {UNIVERSITY}:\n\n");
    for career in careers {
        let _ = writeln!(text, "• {}", career.name);
    }
    text.push_str("\nUsa /carrera <nombre> o elige una carrera:");

    Reply::text(text)
        .with_buttons(
            careers
                .iter()
                .map(|c| Button::new(format!("📚 {}", c.name), ButtonAction::CareerDetail(c.id.clone()))),
        )
        .with_buttons([Button::new("📋 Requisitos de Admisión", ButtonAction::Admission)])
}

pub fn career_detail(career: &Career) -> Reply {
    let or = |value: &Option<String>, fallback: &str| value.clone().unwrap_or_else(|| fallback.to_owned());

    let text = format!(
        "🎓 {}\n\n\
         📝 Descripción:\n{}\n\n\
         ⏱️ Duración: {}\n\n\
         📚 Plan de Estudios:\n{}\n\n\
         💼 Campo Laboral:\n{}\n\n\
         💰 Costo por Semestre: {}\n\n\
         📞 Más información: {}",
        career.name,
        or(&career.description, "Sin descripción disponible"),
        or(&career.duration, "No especificada"),
        or(&career.study_plan, "No disponible"),
        or(&career.job_field, "No especificado"),
        or(&career.cost, "Consultar"),
        or(&career.contact, "Contactar admisión"),
    );

    Reply::text(text).with_buttons([
        Button::new("🔙 Volver a Carreras", ButtonAction::Careers),
        Button::new("📋 Requisitos de Admisión", ButtonAction::Admission),
    ])
}

pub fn career_not_found(name: &str) -> Reply {
    Reply::text(format!(
        "❌ No encontré la carrera '{name}'.\nUsa /carreras para ver el listado completo."
    ))
    .with_buttons([Button::new("🎓 Ver Carreras", ButtonAction::Careers)])
}

pub fn admission_categories(categories: &[AdmissionCategory]) -> Reply {
    let mut text = format!("📋 Requisitos de Admisión - {UNIVERSITY}\n\n");
    for category in categories {
        let _ = writeln!(
            text,
            "{} {}",
            category_emoji(&category.name),
            category.name.to_uppercase()
        );
        for item in category.requirements.iter().take(ADMISSION_PREVIEW) {
            let _ = writeln!(text, "   • {item}");
        }
        if category.requirements.len() > ADMISSION_PREVIEW {
            let _ = writeln!(
                text,
                "   • ... y {} más",
                category.requirements.len() - ADMISSION_PREVIEW
            );
        }
        text.push('\n');
    }
    text.push_str("Elige una categoría o escribe su nombre para ver todos los requisitos:");

    Reply::text(text).with_buttons(categories.iter().map(|c| {
        Button::new(
            format!("{} Ver {}", category_emoji(&c.name), c.name),
            ButtonAction::AdmissionCategory(c.name.clone()),
        )
    }))
}

pub fn admission_detail(category: &AdmissionCategory) -> Reply {
    let mut text = format!(
        "{} {}\n\n📋 Requisitos completos:\n\n",
        category_emoji(&category.name),
        category.name.to_uppercase()
    );
    for (i, item) in category.requirements.iter().enumerate() {
        let _ = writeln!(text, "{}. {item}", i + 1);
    }
    let _ = write!(
        text,
        "\n📊 Total de requisitos: {}",
        category.requirements.len()
    );

    let note = match crate::lookup::fold(&category.name).as_str() {
        n if n.contains("documentos") => {
            Some("Todos los documentos deben estar actualizados y en buen estado.")
        }
        n if n.contains("academicos") => {
            Some("Los requisitos académicos son obligatorios para el proceso de admisión.")
        }
        n if n.contains("economicos") => {
            Some("Consulta con la oficina de admisión sobre opciones de pago y becas.")
        }
        n if n.contains("medicos") => {
            Some("Los exámenes médicos deben ser realizados en centros autorizados.")
        }
        _ => None,
    };
    if let Some(note) = note {
        let _ = write!(text, "\n\n💡 Nota: {note}");
    }

    Reply::text(text).with_buttons([
        Button::new("🔙 Volver a Requisitos", ButtonAction::Admission),
        Button::new("🎓 Ver Carreras", ButtonAction::Careers),
    ])
}

pub fn admission_not_found(category: &str) -> Reply {
    Reply::text(format!(
        "❌ No encontré la categoría de admisión '{category}'.\nUsa /admision para ver las categorías."
    ))
}

pub fn sites(sites: &[String]) -> Reply {
    Reply::text(format!(
        "📞 Contactos por Sede - {UNIVERSITY}\n\nSelecciona una sede para ver los contactos:"
    ))
    .with_buttons(
        sites
            .iter()
            .map(|s| Button::new(format!("🏢 {s}"), ButtonAction::Site(s.clone()))),
    )
}

pub fn site_contacts(site: &str, contacts: &[Contact]) -> Reply {
    let mut text = format!("📞 Contactos - Sede {site}\n\n");
    for contact in contacts {
        let _ = writeln!(text, "👤 {}", contact.name);
        let fields = [
            ("💼", &contact.role),
            ("📱", &contact.phone),
            ("📧", &contact.email),
            ("🕒", &contact.hours),
        ];
        for (icon, value) in fields {
            if let Some(value) = value {
                let _ = writeln!(text, "{icon} {value}");
            }
        }
        text.push('\n');
    }

    Reply::text(text).with_buttons([Button::new("🔙 Todas las Sedes", ButtonAction::Contacts)])
}

pub fn site_not_found(site: &str) -> Reply {
    Reply::text(format!("❌ No se encontraron contactos para la sede '{site}'."))
        .with_buttons([Button::new("🏢 Ver Sedes", ButtonAction::Contacts)])
}

pub fn subscribed(newly: bool) -> Reply {
    if newly {
        Reply::text("🔔 Listo, recibirás recordatorios de pagos y eventos.")
    } else {
        Reply::text("🔔 Ya estás suscrito a los recordatorios.")
    }
}

pub fn unsubscribed(was_subscribed: bool) -> Reply {
    if was_subscribed {
        Reply::text("🔕 Ya no recibirás recordatorios. Usa /suscribir para volver a activarlos.")
    } else {
        Reply::text("🔕 No estabas suscrito a los recordatorios.")
    }
}

pub fn not_authorized() -> Reply {
    Reply::text("⛔ Este comando está reservado para administradores.")
}

pub fn unknown_tab(name: &str) -> Reply {
    let tabs: Vec<&str> = Tab::ALL.iter().map(|t| t.sheet_name()).collect();
    Reply::text(format!(
        "❌ Hoja desconocida: '{name}'. Opciones: {}",
        tabs.join(", ")
    ))
}

pub fn refresh_report(report: &RefreshReport) -> Reply {
    let mut text = String::from("🔄 Actualización de datos\n\n");
    for done in &report.refreshed {
        let _ = writeln!(text, "✅ {}: {} filas", done.tab, done.rows);
    }
    for failed in &report.failed {
        let _ = writeln!(
            text,
            "❌ {}: {} (se conservan los datos anteriores)",
            failed.tab, failed.error
        );
    }
    Reply::text(text)
}

pub fn cache_status(status: &[TabStatus]) -> Reply {
    let mut text = String::from("📊 Estado de la caché\n\n");
    for entry in status {
        match (entry.rows, entry.fetched_at) {
            (Some(rows), Some(at)) => {
                let _ = writeln!(
                    text,
                    "• {}: {} filas (actualizado {})",
                    entry.tab,
                    rows,
                    at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            _ => {
                let _ = writeln!(text, "• {}: sin cargar", entry.tab);
            }
        }
    }
    Reply::text(text)
}

pub fn payment_reminder(payment: &Payment, today: NaiveDate) -> String {
    let mut text = format!("💰 Recordatorio de Pago - {UNIVERSITY}\n\n");
    payment_lines(&mut text, payment, today);
    text.push_str("\n⚠️ Recuerda realizar tus pagos a tiempo.\nUsa /pagos para ver todos los pagos.");
    text
}

pub fn event_reminder(event: &Event, today: NaiveDate) -> String {
    let mut text = format!(
        "🎉 Recordatorio de Evento ({}) - {UNIVERSITY}\n\n",
        days_until(event.date, today)
    );
    event_lines(&mut text, event);
    text.push_str("\nUsa /eventos para ver todos los eventos.");
    text
}

pub fn qa_fallback() -> String {
    "⚠️ El servicio de preguntas no está disponible en este momento. \
     Intenta más tarde o usa /menu para consultar la información disponible."
        .to_owned()
}

/// Splits text into chunks Telegram accepts, preferring line breaks.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            // A single line longer than the limit is cut by characters.
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_until() {
        let today = date(2025, 3, 1);
        assert_eq!(days_until(today, today), "hoy");
        assert_eq!(days_until(date(2025, 3, 2), today), "mañana");
        assert_eq!(days_until(date(2025, 3, 8), today), "en 7 días");
    }

    #[test]
    fn test_event_emoji_accent_insensitive() {
        assert_eq!(event_emoji(Some("Académico")), "📚");
        assert_eq!(event_emoji(Some("Graduación")), "🎓");
        assert_eq!(event_emoji(None), "📅");
    }

    #[test]
    fn test_payments_limit() {
        let today = date(2025, 3, 1);
        let rows: Vec<Payment> = (1..=10)
            .map(|d| Payment {
                date: date(2025, 3, d),
                concept: format!("Cuota {d}"),
                amount: None,
                career: None,
                description: None,
                kind: None,
            })
            .collect();
        let reply = payments(&rows, today);
        assert!(reply.text.contains("Cuota 8"));
        assert!(!reply.text.contains("Cuota 9"));
        assert!(reply.text.contains("... y 2 pagos más"));
    }

    #[test]
    fn test_admission_categories_buttons() {
        let categories = vec![
            AdmissionCategory {
                name: "Documentos".to_owned(),
                requirements: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            },
            AdmissionCategory {
                name: "Médicos".to_owned(),
                requirements: vec!["Examen".into()],
            },
        ];
        let reply = admission_categories(&categories);
        assert!(reply.text.contains("... y 1 más"));
        assert_eq!(reply.keyboard.len(), 2);
        assert_eq!(
            reply.keyboard[1][0].action,
            ButtonAction::AdmissionCategory("Médicos".to_owned())
        );
    }

    #[test]
    fn test_site_contacts_skips_missing_fields() {
        let contacts = vec![Contact {
            site: "León".to_owned(),
            name: "Luis".to_owned(),
            role: Some("Director".to_owned()),
            phone: None,
            email: None,
            hours: None,
        }];
        let reply = site_contacts("León", &contacts);
        assert!(reply.text.contains("💼 Director"));
        assert!(!reply.text.contains("📱"));
    }

    #[test]
    fn test_split_message_short() {
        assert_eq!(split_message("hola", 10), vec!["hola"]);
    }

    #[test]
    fn test_split_message_on_lines() {
        let text = "aaaa\nbbbb\ncccc\n";
        let chunks = split_message(text, 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_message_long_line() {
        let text = "x".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }
}
