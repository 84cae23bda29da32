//! Command types and definitions.

use std::fmt;

/// Telegram rejects callback data longer than this many bytes.
pub const MAX_CALLBACK_DATA_BYTES: usize = 64;

/// Available bot commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Welcome message with the main menu.
    Start,

    /// Show the command list.
    Help,

    /// Show the main menu buttons.
    Menu,

    /// Upcoming academic calendar entries.
    Calendar,

    /// Upcoming payment deadlines.
    Payments,

    /// Upcoming university events.
    Events,

    /// List every career.
    Careers,

    /// Look up one career by name.
    Career(String),

    /// List admission categories, or show one category's requirements.
    Admission(Option<String>),

    /// List sites, or show one site's contacts.
    Contacts(Option<String>),

    /// Subscribe this chat to reminders.
    Subscribe,

    /// Remove this chat from reminders.
    Unsubscribe,

    /// Force a cache refresh of one tab or all of them (privileged).
    Refresh(Option<String>),

    /// Show per-tab cache status (privileged).
    Status,

    /// Anything else starting with `/`.
    Unknown(String),
}

impl BotCommand {
    /// Parses a command from a message text.
    ///
    /// Returns `None` if the message does not start with `/`, i.e. it is
    /// free text. A `@botname` suffix on the command token is ignored.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix('/')?;

        let (token, args) = match rest.split_once(char::is_whitespace) {
            Some((token, args)) => (token, Some(args.trim())),
            None => (rest, None),
        };
        let name = token
            .split_once('@')
            .map_or(token, |(name, _)| name)
            .to_lowercase();
        let arg = args.filter(|a| !a.is_empty()).map(str::to_owned);

        Some(match name.as_str() {
            "start" | "inicio" => Self::Start,
            "help" | "ayuda" => Self::Help,
            "menu" | "menú" => Self::Menu,
            "calendario" => Self::Calendar,
            "pagos" => Self::Payments,
            "eventos" => Self::Events,
            "carreras" | "carrera" => arg.map_or(Self::Careers, Self::Career),
            "admision" | "admisión" => Self::Admission(arg),
            "contactos" => Self::Contacts(arg),
            "suscribir" => Self::Subscribe,
            "baja" | "desuscribir" => Self::Unsubscribe,
            "actualizar" => Self::Refresh(arg),
            "estado" => Self::Status,
            _ => Self::Unknown(name),
        })
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Menu => "menu",
            Self::Calendar => "calendario",
            Self::Payments => "pagos",
            Self::Events => "eventos",
            Self::Careers => "carreras",
            Self::Career(_) => "carrera",
            Self::Admission(_) => "admision",
            Self::Contacts(_) => "contactos",
            Self::Subscribe => "suscribir",
            Self::Unsubscribe => "baja",
            Self::Refresh(_) => "actualizar",
            Self::Status => "estado",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Whether only configured administrators may run this command.
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        matches!(self, Self::Refresh(_) | Self::Status)
    }

    /// Public commands with usage and description, for the help text.
    #[must_use]
    pub fn all_commands() -> Vec<(&'static str, &'static str)> {
        vec![
            ("/start", "Mensaje de bienvenida"),
            ("/help", "Esta ayuda"),
            ("/menu", "Menú principal"),
            ("/calendario", "Calendario académico"),
            ("/pagos", "Próximas fechas de pago"),
            ("/eventos", "Eventos universitarios"),
            ("/carreras", "Listado de carreras"),
            ("/carrera <nombre>", "Información de una carrera"),
            ("/admision [categoría]", "Requisitos de admisión"),
            ("/contactos [sede]", "Contactos por sede"),
            ("/suscribir", "Recibir recordatorios"),
            ("/baja", "Dejar de recibir recordatorios"),
        ]
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Career(name) => write!(f, "carrera {name}"),
            Self::Admission(Some(arg)) | Self::Contacts(Some(arg)) | Self::Refresh(Some(arg)) => {
                write!(f, "{} {arg}", self.name())
            }
            Self::Unknown(name) => write!(f, "unknown /{name}"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// What an inline button does when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Calendar,
    Payments,
    Events,
    Careers,
    Admission,
    Contacts,
    /// Detail of one career, by id.
    CareerDetail(String),
    /// Selection in the admission category flow.
    AdmissionCategory(String),
    /// Contacts of one site.
    Site(String),
}

impl ButtonAction {
    /// Parses callback data produced by [`ButtonAction::to_data`].
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if let Some((kind, payload)) = data.split_once(':') {
            let payload = payload.to_owned();
            return match kind {
                "career" => Some(Self::CareerDetail(payload)),
                "adm" => Some(Self::AdmissionCategory(payload)),
                "site" => Some(Self::Site(payload)),
                _ => None,
            };
        }

        match data {
            "calendar" => Some(Self::Calendar),
            "payments" => Some(Self::Payments),
            "events" => Some(Self::Events),
            "careers" => Some(Self::Careers),
            "admission" => Some(Self::Admission),
            "contacts" => Some(Self::Contacts),
            _ => None,
        }
    }

    /// Encodes the action as callback data, within Telegram's size limit.
    #[must_use]
    pub fn to_data(&self) -> String {
        let data = match self {
            Self::Calendar => "calendar".to_owned(),
            Self::Payments => "payments".to_owned(),
            Self::Events => "events".to_owned(),
            Self::Careers => "careers".to_owned(),
            Self::Admission => "admission".to_owned(),
            Self::Contacts => "contacts".to_owned(),
            Self::CareerDetail(id) => format!("career:{id}"),
            Self::AdmissionCategory(name) => format!("adm:{name}"),
            Self::Site(site) => format!("site:{site}"),
        };
        truncate_bytes(&data, MAX_CALLBACK_DATA_BYTES).to_owned()
    }

    /// The command a plain navigation button stands for.
    ///
    /// Returns `None` for the admission category selection, which is
    /// handled by the pending flow instead.
    #[must_use]
    pub fn as_command(&self) -> Option<BotCommand> {
        match self {
            Self::Calendar => Some(BotCommand::Calendar),
            Self::Payments => Some(BotCommand::Payments),
            Self::Events => Some(BotCommand::Events),
            Self::Careers => Some(BotCommand::Careers),
            Self::Admission => Some(BotCommand::Admission(None)),
            Self::Contacts => Some(BotCommand::Contacts(None)),
            Self::CareerDetail(id) => Some(BotCommand::Career(id.clone())),
            Self::Site(site) => Some(BotCommand::Contacts(Some(site.clone()))),
            Self::AdmissionCategory(_) => None,
        }
    }
}

/// Cuts `s` to at most `max` bytes on a char boundary.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// One inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    #[must_use]
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Reply to one conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Response message to show the user.
    pub text: String,

    /// Inline buttons, one inner vector per row.
    pub keyboard: Vec<Vec<Button>>,
}

impl Reply {
    /// Creates a plain text reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    /// Adds one button per row.
    #[must_use]
    pub fn with_buttons(mut self, buttons: impl IntoIterator<Item = Button>) -> Self {
        self.keyboard
            .extend(buttons.into_iter().map(|button| vec![button]));
        self
    }
}

/// What the transport should do with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Send this reply.
    Reply(Reply),
    /// Free text: ask the Q&A webhook and relay its answer.
    Forward(String),
}
