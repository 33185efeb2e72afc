use crate::conf::TunnelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIcon {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBox {
    pub title: String,
    pub text: String,
    pub icon: MessageIcon,
}

impl MessageBox {
    pub fn new(title: impl Into<String>, text: impl Into<String>, icon: MessageIcon) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            icon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerState {
    pub label: String,
    pub enabled: bool,
}

impl TriggerState {
    pub fn new(label: &str, enabled: bool) -> Self {
        Self {
            label: label.to_string(),
            enabled,
        }
    }
}

/// A single write to the widget shell. Effects are handed over in batches;
/// the shell applies a batch without repainting in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    SetTrigger(TriggerState),
    SetEditorEnabled(bool),
    SetEditorText(String),
    SetPublicKeyLabel(String),
    SetDetailVisible(bool),
    SetDetailConfig(Box<TunnelConfig>),
    SetTrayTooltip(String),
    TrayInfo { title: String, text: String },
    TrayError { title: String, text: String },
    ShowMessageBox(MessageBox),
    ShowWindow,
    HideWindow,
    DisposeTray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Yes,
    No,
    Dismissed,
}

/// The windowing toolkit as seen from the UI context. Both calls may block
/// until a human responds.
pub trait Shell: Send {
    fn apply(&mut self, effects: &[UiEffect]);
    fn prompt(&mut self, title: &str, text: &str) -> PromptAnswer;
}
