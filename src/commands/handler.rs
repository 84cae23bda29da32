//! Command handler implementation.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::flow::{ConversationFlows, FlowState};
use super::format;
use super::types::{BotCommand, ButtonAction, Reply, Turn};
use crate::knowledge::{KnowledgeCache, Tab, TabSnapshot};
use crate::lookup::{self, AdmissionLookup, ContactLookup, Event};
use crate::scheduler::SubscriberRegistry;

/// `/eventos` shows events within this many days.
pub const EVENTS_WINDOW_DAYS: u32 = 30;

/// An inbound text message, stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub chat_id: i64,
    pub user_id: Option<u64>,
    pub first_name: Option<String>,
    pub text: String,
}

/// Turns inbound messages and button presses into replies.
pub struct CommandHandler {
    /// Shared knowledge cache.
    cache: Arc<KnowledgeCache>,

    /// Reminder subscribers, registered on every interaction.
    subscribers: Arc<SubscriberRegistry>,

    /// Pending admission flows per chat.
    flows: ConversationFlows,

    /// Users allowed to run privileged commands.
    admins: Vec<u64>,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(
        cache: Arc<KnowledgeCache>,
        subscribers: Arc<SubscriberRegistry>,
        admins: Vec<u64>,
    ) -> Self {
        Self {
            cache,
            subscribers,
            flows: ConversationFlows::new(),
            admins,
        }
    }

    /// Handles one text message.
    ///
    /// Commands cancel any pending flow. Free text completes a pending
    /// category choice, otherwise it is handed back for forwarding.
    pub async fn handle_message(&self, inbound: &Inbound, today: NaiveDate) -> Turn {
        let chat_id = inbound.chat_id;
        self.register(chat_id);

        let Some(command) = BotCommand::parse(&inbound.text) else {
            let text = inbound.text.trim();
            if self.flows.take(chat_id) == FlowState::AwaitingCategoryChoice {
                debug!("Chat {} chose admission category '{}'", chat_id, text);
                return Turn::Reply(self.admission(chat_id, Some(text)));
            }
            if text.is_empty() {
                return Turn::Reply(format::help());
            }
            return Turn::Forward(text.to_owned());
        };

        if self.flows.cancel(chat_id) {
            debug!("Chat {} left the admission choice for /{}", chat_id, command.name());
        }

        info!("Command from chat {}: {}", chat_id, command);
        Turn::Reply(
            self.execute(command, chat_id, inbound.user_id, inbound.first_name.as_deref(), today)
                .await,
        )
    }

    /// Handles an inline button press.
    pub async fn handle_button(
        &self,
        chat_id: i64,
        user_id: Option<u64>,
        data: &str,
        today: NaiveDate,
    ) -> Reply {
        self.register(chat_id);

        let Some(action) = ButtonAction::parse(data) else {
            warn!("Unknown button data from chat {}: {:?}", chat_id, data);
            return format::menu();
        };

        if let ButtonAction::AdmissionCategory(category) = &action {
            self.flows.take(chat_id);
            return self.admission(chat_id, Some(category));
        }

        self.flows.cancel(chat_id);
        match action.as_command() {
            Some(command) => {
                debug!("Button from chat {}: {}", chat_id, command);
                self.execute(command, chat_id, user_id, None, today).await
            }
            None => format::menu(),
        }
    }

    fn register(&self, chat_id: i64) {
        if self.subscribers.register(chat_id) {
            info!("Chat {} registered for reminders", chat_id);
        }
    }

    fn is_admin(&self, user_id: Option<u64>) -> bool {
        user_id.is_some_and(|id| self.admins.contains(&id))
    }

    /// Executes a parsed command.
    async fn execute(
        &self,
        command: BotCommand,
        chat_id: i64,
        user_id: Option<u64>,
        first_name: Option<&str>,
        today: NaiveDate,
    ) -> Reply {
        if command.is_privileged() && !self.is_admin(user_id) {
            warn!("User {:?} is not allowed to run /{}", user_id, command.name());
            return format::not_authorized();
        }

        match command {
            BotCommand::Start => format::welcome(first_name),
            BotCommand::Help => format::help(),
            BotCommand::Menu => format::menu(),
            BotCommand::Calendar => self.with_snapshot(Tab::Calendar, |snapshot| {
                format::calendar(&lookup::upcoming_calendar(snapshot, today))
            }),
            BotCommand::Payments => self.with_snapshot(Tab::Payments, |snapshot| {
                format::payments(&lookup::upcoming_payments(snapshot, today), today)
            }),
            BotCommand::Events => self.with_snapshot(Tab::Events, |snapshot| {
                format::events(&lookup::due_within::<Event>(
                    snapshot,
                    today,
                    EVENTS_WINDOW_DAYS,
                ))
            }),
            BotCommand::Careers => self.with_snapshot(Tab::Careers, |snapshot| {
                let careers = lookup::list_careers(snapshot);
                if careers.is_empty() {
                    format::no_data(Tab::Careers)
                } else {
                    format::careers(&careers)
                }
            }),
            BotCommand::Career(name) => self.with_snapshot(Tab::Careers, |snapshot| {
                lookup::find_career(snapshot, &name).map_or_else(
                    || format::career_not_found(&name),
                    |career| format::career_detail(&career),
                )
            }),
            BotCommand::Admission(category) => self.admission(chat_id, category.as_deref()),
            BotCommand::Contacts(site) => self.contacts(site.as_deref()),
            BotCommand::Subscribe => format::subscribed(self.subscribers.subscribe(chat_id)),
            BotCommand::Unsubscribe => {
                let was_subscribed = self.subscribers.unsubscribe(chat_id);
                info!("Chat {} opted out of reminders", chat_id);
                format::unsubscribed(was_subscribed)
            }
            BotCommand::Refresh(tab) => self.handle_refresh(tab.as_deref()).await,
            BotCommand::Status => format::cache_status(&self.cache.status()),
            BotCommand::Unknown(name) => {
                debug!("Unknown command /{}", name);
                format::help()
            }
        }
    }

    /// Renders from the current snapshot of `tab`.
    ///
    /// The snapshot handle is held for the whole render, so a concurrent
    /// refresh cannot change the rows mid-lookup.
    fn with_snapshot(&self, tab: Tab, render: impl FnOnce(&TabSnapshot) -> Reply) -> Reply {
        match self.cache.get(tab) {
            None => format::not_loaded(),
            Some(snapshot) if snapshot.is_empty() => format::no_data(tab),
            Some(snapshot) => render(snapshot.as_ref()),
        }
    }

    /// Lists categories and starts the choice flow, or shows one category.
    fn admission(&self, chat_id: i64, category: Option<&str>) -> Reply {
        self.with_snapshot(Tab::Admission, |snapshot| {
            let Some(category) = category.filter(|c| !c.trim().is_empty()) else {
                let categories = lookup::admission_categories(snapshot);
                if categories.is_empty() {
                    return format::no_data(Tab::Admission);
                }
                self.flows.await_category(chat_id);
                return format::admission_categories(&categories);
            };

            match lookup::admission_by_category(snapshot, Some(category)) {
                AdmissionLookup::Requirements(found) => format::admission_detail(&found),
                AdmissionLookup::Categories(_) | AdmissionLookup::NotFound => {
                    format::admission_not_found(category)
                }
            }
        })
    }

    fn contacts(&self, site: Option<&str>) -> Reply {
        self.with_snapshot(Tab::Contacts, |snapshot| {
            match lookup::contacts_by_site(snapshot, site) {
                ContactLookup::Sites(sites) if sites.is_empty() => format::no_data(Tab::Contacts),
                ContactLookup::Sites(sites) => format::sites(&sites),
                ContactLookup::Site { site, contacts } => format::site_contacts(&site, &contacts),
                ContactLookup::NotFound => format::site_not_found(site.unwrap_or_default()),
            }
        })
    }

    async fn handle_refresh(&self, tab: Option<&str>) -> Reply {
        let tab = match tab.map(str::parse::<Tab>).transpose() {
            Ok(tab) => tab,
            Err(e) => {
                debug!("Refresh rejected: {}", e);
                return format::unknown_tab(tab.unwrap_or_default());
            }
        };

        info!(
            "Manual refresh requested for {}",
            tab.map_or_else(|| "all tabs".to_owned(), |t| t.to_string())
        );
        let report = self.cache.refresh(tab).await;
        format::refresh_report(&report)
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("admins", &self.admins.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::FakeSource;
    use crate::sheets::SheetSource;

    const ADMIN: u64 = 42;
    const CHAT: i64 = 1001;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn inbound(text: &str) -> Inbound {
        Inbound {
            chat_id: CHAT,
            user_id: Some(7),
            first_name: Some("Ana".to_owned()),
            text: text.to_owned(),
        }
    }

    fn reply_text(turn: Turn) -> String {
        match turn {
            Turn::Reply(reply) => reply.text,
            Turn::Forward(text) => panic!("expected a reply, got forward of {text:?}"),
        }
    }

    async fn loaded_handler() -> (CommandHandler, Arc<FakeSource>, Arc<SubscriberRegistry>) {
        let source = Arc::new(FakeSource::default());
        source.set(
            Tab::Careers,
            &[
                &[("id", "ENF"), ("nombre", "Enfermería"), ("duracion", "5 años")],
                &[("id", "DER"), ("nombre", "Derecho")],
            ],
        );
        source.set(
            Tab::Admission,
            &[
                &[("categoria", "Documentos"), ("requisitos", "Cédula, Diploma de bachiller")],
                &[("categoria", "Médicos"), ("requisitos", "Examen general")],
            ],
        );
        source.set(
            Tab::Payments,
            &[
                &[("fecha", "2025-03-10"), ("concepto", "Segunda cuota")],
                &[("fecha", "2025-02-10"), ("concepto", "Matrícula")],
                &[("fecha", "2025-03-05"), ("concepto", "Primera cuota")],
            ],
        );
        source.set(
            Tab::Contacts,
            &[
                &[("sede", "Managua"), ("nombre", "Luis"), ("cargo", "Rector")],
                &[("sede", "León"), ("nombre", "Marta"), ("telefono", "2311-0000")],
            ],
        );
        source.set(Tab::Events, &[]);
        source.fail(Tab::Calendar);

        let cache = Arc::new(KnowledgeCache::new(Arc::clone(&source) as Arc<dyn SheetSource>));
        cache.refresh(None).await;

        let subscribers = Arc::new(SubscriberRegistry::in_memory());
        let handler = CommandHandler::new(cache, Arc::clone(&subscribers), vec![ADMIN]);
        (handler, source, subscribers)
    }

    #[tokio::test]
    async fn test_career_lookup_scenario() {
        let (handler, _, _) = loaded_handler().await;

        let found = reply_text(handler.handle_message(&inbound("/carrera Enfermería"), today()).await);
        assert!(found.contains("Enfermería"));
        assert!(found.contains("5 años"));

        let missing = reply_text(handler.handle_message(&inbound("/carrera Arte"), today()).await);
        assert!(missing.contains("No encontré la carrera 'Arte'"));
    }

    #[tokio::test]
    async fn test_career_button_by_id() {
        let (handler, _, _) = loaded_handler().await;
        let reply = handler.handle_button(CHAT, None, "career:DER", today()).await;
        assert!(reply.text.contains("🎓 Derecho"));
    }

    #[tokio::test]
    async fn test_not_loaded_and_no_data() {
        let (handler, _, _) = loaded_handler().await;

        let calendar = reply_text(handler.handle_message(&inbound("/calendario"), today()).await);
        assert!(calendar.contains("cargando"));

        let events = reply_text(handler.handle_message(&inbound("/eventos"), today()).await);
        assert!(events.contains("No hay información de eventos"));
    }

    #[tokio::test]
    async fn test_payments_skip_past_and_sort() {
        let (handler, _, _) = loaded_handler().await;
        let text = reply_text(handler.handle_message(&inbound("/pagos"), today()).await);

        assert!(!text.contains("Matrícula"));
        let first = text.find("Primera cuota").unwrap();
        let second = text.find("Segunda cuota").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_admission_flow_free_text_choice() {
        let (handler, _, _) = loaded_handler().await;

        let listing = handler.handle_message(&inbound("/admision"), today()).await;
        let Turn::Reply(listing) = listing else {
            panic!("expected categories");
        };
        assert_eq!(listing.keyboard.len(), 2);
        assert_eq!(handler.flows.state(CHAT), FlowState::AwaitingCategoryChoice);

        let detail = reply_text(handler.handle_message(&inbound("documentos"), today()).await);
        assert!(detail.contains("1. Cédula"));
        assert!(detail.contains("2. Diploma de bachiller"));
        assert_eq!(handler.flows.state(CHAT), FlowState::Idle);
    }

    #[tokio::test]
    async fn test_admission_flow_idle_after_unmatched_choice() {
        let (handler, _, _) = loaded_handler().await;
        handler.handle_message(&inbound("/admision"), today()).await;

        let reply = reply_text(handler.handle_message(&inbound("Becas"), today()).await);
        assert!(reply.contains("No encontré la categoría"));
        assert_eq!(handler.flows.state(CHAT), FlowState::Idle);

        let next = handler.handle_message(&inbound("Documentos"), today()).await;
        assert_eq!(next, Turn::Forward("Documentos".to_owned()));
    }

    #[tokio::test]
    async fn test_command_cancels_pending_flow() {
        let (handler, _, _) = loaded_handler().await;
        handler.handle_message(&inbound("/admision"), today()).await;

        let payments = reply_text(handler.handle_message(&inbound("/pagos"), today()).await);
        assert!(payments.contains("Próximos Pagos"));
        assert_eq!(handler.flows.state(CHAT), FlowState::Idle);

        let next = handler.handle_message(&inbound("Médicos"), today()).await;
        assert_eq!(next, Turn::Forward("Médicos".to_owned()));
    }

    #[tokio::test]
    async fn test_admission_button_choice() {
        let (handler, _, _) = loaded_handler().await;
        handler.handle_message(&inbound("/admision"), today()).await;

        let reply = handler.handle_button(CHAT, None, "adm:Médicos", today()).await;
        assert!(reply.text.contains("1. Examen general"));
        assert_eq!(handler.flows.state(CHAT), FlowState::Idle);
    }

    #[tokio::test]
    async fn test_admission_with_argument_does_not_start_flow() {
        let (handler, _, _) = loaded_handler().await;
        let reply = reply_text(handler.handle_message(&inbound("/admision Medicos"), today()).await);
        assert!(reply.contains("Examen general"));
        assert_eq!(handler.flows.state(CHAT), FlowState::Idle);
    }

    #[tokio::test]
    async fn test_contacts_sites_and_site() {
        let (handler, _, _) = loaded_handler().await;

        let Turn::Reply(sites) = handler.handle_message(&inbound("/contactos"), today()).await else {
            panic!("expected sites");
        };
        assert_eq!(sites.keyboard[0][0].action, ButtonAction::Site("Managua".to_owned()));
        assert_eq!(sites.keyboard[1][0].action, ButtonAction::Site("León".to_owned()));

        let leon = handler.handle_button(CHAT, None, "site:León", today()).await;
        assert!(leon.text.contains("Marta"));

        let missing = reply_text(handler.handle_message(&inbound("/contactos Rivas"), today()).await);
        assert!(missing.contains("'Rivas'"));
    }

    #[tokio::test]
    async fn test_free_text_is_forwarded() {
        let (handler, _, _) = loaded_handler().await;
        let turn = handler
            .handle_message(&inbound("  ¿Hay becas deportivas? "), today())
            .await;
        assert_eq!(turn, Turn::Forward("¿Hay becas deportivas?".to_owned()));
    }

    #[tokio::test]
    async fn test_unknown_command_shows_help() {
        let (handler, _, _) = loaded_handler().await;
        let text = reply_text(handler.handle_message(&inbound("/becas"), today()).await);
        assert!(text.contains("Comandos disponibles"));
    }

    #[tokio::test]
    async fn test_privileged_commands_need_admin() {
        let (handler, source, _) = loaded_handler().await;

        let denied = reply_text(handler.handle_message(&inbound("/estado"), today()).await);
        assert!(denied.contains("administradores"));

        let mut admin = inbound("/estado");
        admin.user_id = Some(ADMIN);
        let status = reply_text(handler.handle_message(&admin, today()).await);
        assert!(status.contains("calendario: sin cargar"));

        source.set(Tab::Calendar, &[&[("fecha", "2025-03-02"), ("evento", "Inicio")]]);
        admin.text = "/actualizar calendario".to_owned();
        let refreshed = reply_text(handler.handle_message(&admin, today()).await);
        assert!(refreshed.contains("✅ calendario: 1 filas"));

        admin.text = "/actualizar becas".to_owned();
        let unknown = reply_text(handler.handle_message(&admin, today()).await);
        assert!(unknown.contains("Hoja desconocida"));
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let (handler, _, subscribers) = loaded_handler().await;

        handler.handle_message(&inbound("/start"), today()).await;
        assert!(subscribers.is_subscribed(CHAT));

        handler.handle_message(&inbound("/baja"), today()).await;
        handler.handle_message(&inbound("/menu"), today()).await;
        assert!(!subscribers.is_subscribed(CHAT));

        let text = reply_text(handler.handle_message(&inbound("/suscribir"), today()).await);
        assert!(text.contains("recibirás recordatorios"));
        assert!(subscribers.is_subscribed(CHAT));
    }
}
