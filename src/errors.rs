use crate::conf::ParseError;

/// Control-interface operation that failed, used to title the error dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ControlAction {
    Create,
    Start,
    Stop,
}

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error(transparent)]
    ConfigParse(#[from] ParseError),

    #[error("Unable to {action} tunnel")]
    ControlCall {
        action: ControlAction,
        #[source]
        source: anyhow::Error,
    },

    #[error("Transient fetch failed")]
    TransientFetch(#[source] anyhow::Error),

    #[error("Unable to subscribe to tunnel changes")]
    Subscription(#[source] anyhow::Error),

    #[error("Unable to exit service")]
    FatalQuit(#[source] anyhow::Error),
}

impl UiError {
    pub fn control(action: ControlAction, source: anyhow::Error) -> Self {
        Self::ControlCall { action, source }
    }

    pub fn dialog_title(&self) -> &'static str {
        match self {
            UiError::ConfigParse(_) => dialog::INVALID_CONFIGURATION,
            UiError::ControlCall { action, .. } => match action {
                ControlAction::Create => dialog::UNABLE_TO_CREATE,
                ControlAction::Start => dialog::UNABLE_TO_START,
                ControlAction::Stop => dialog::UNABLE_TO_STOP,
            },
            UiError::TransientFetch(_) | UiError::Subscription(_) => dialog::TUNNEL_ERROR,
            UiError::FatalQuit(_) => dialog::ERROR_EXITING,
        }
    }

    /// Body text shown under [`UiError::dialog_title`].
    pub fn dialog_text(&self) -> String {
        match self {
            UiError::ControlCall { source, .. } => format!("{:#}", source),
            UiError::FatalQuit(source) => dialog::exit_failed(&format!("{:#}", source)),
            other => other.chain(),
        }
    }

    /// The message followed by each cause, separated by `: `.
    pub fn chain(&self) -> String {
        let mut text = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            text.push_str(": ");
            text.push_str(&err.to_string());
            cause = err.source();
        }
        text
    }
}

/// Appends a period unless the message already ends with one.
pub fn with_period(message: &str) -> String {
    if message.is_empty() || message.ends_with('.') {
        message.to_string()
    } else {
        format!("{}.", message)
    }
}

pub mod dialog {
    pub const INVALID_CONFIGURATION: &str = "Invalid configuration";
    pub const UNABLE_TO_CREATE: &str = "Unable to create tunnel";
    pub const UNABLE_TO_START: &str = "Unable to start tunnel";
    pub const UNABLE_TO_STOP: &str = "Unable to stop tunnel";
    pub const TUNNEL_ERROR: &str = "Tunnel Error";
    pub const ERROR_EXITING: &str = "Error Exiting";

    pub fn exit_failed(reason: &str) -> String {
        format!(
            "Unable to exit service due to: {}. You may want to stop the service from the service manager.",
            reason
        )
    }

    pub fn tunnel_error_text(error: &str) -> String {
        format!(
            "{}\n\nPlease consult the log for more information.",
            super::with_period(error)
        )
    }
}

pub mod tray {
    pub fn error_title() -> String {
        format!("{} Tunnel Error", crate::constants::APP_TITLE)
    }

    pub fn activated_title() -> String {
        format!("{} Activated", crate::constants::APP_TITLE)
    }

    pub fn deactivated_title() -> String {
        format!("{} Deactivated", crate::constants::APP_TITLE)
    }

    pub fn activated(name: &str) -> String {
        format!("The {} tunnel has been activated.", name)
    }

    pub fn deactivated(name: &str) -> String {
        format!("The {} tunnel has been deactivated.", name)
    }
}

pub mod tunnel {
    pub fn not_found(name: &str) -> String {
        format!("Tunnel {} not found", name)
    }

    pub fn not_running(name: &str) -> String {
        format!("Tunnel {} is not running", name)
    }

    pub fn already_running(name: &str) -> String {
        format!(
            "Tunnel '{}' is already running. Stop it before starting again.",
            name
        )
    }

    pub const NO_RUNNING_TUNNEL: &str = "There is no running tunnel to stop";
}

pub mod keys {
    pub const INVALID_PRIVATE_KEY: &str = "Private key is not 32 bytes of base64";
}

pub mod settings {
    pub const TUNNEL_NAME_EMPTY: &str = "Tunnel name cannot be empty or whitespace-only";

    pub fn zero_duration(field: &str) -> String {
        format!("{} must be greater than zero", field)
    }

    pub fn failed_to_load(path: &str) -> String {
        format!("Failed to load settings from {}", path)
    }
}

pub mod logs {
    pub const FAILED_TO_CREATE_DIR: &str = "Failed to create log directory";
}
