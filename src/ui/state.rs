use crate::constants::labels;
use crate::control::types::TunnelHandle;
use crate::ui::effects::{PromptAnswer, Shell, TriggerState, UiEffect};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What the shell is currently showing, as last written by the UI context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub trigger: TriggerState,
    pub editor_enabled: bool,
    pub editor_text: String,
    pub public_key_label: String,
    pub detail_visible: bool,
    pub window_visible: bool,
    pub tray_tooltip: String,
    pub tray_disposed: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            trigger: TriggerState::new(labels::START, true),
            editor_enabled: true,
            editor_text: String::new(),
            public_key_label: labels::PUBLIC_KEY_UNKNOWN.to_string(),
            detail_visible: false,
            window_visible: false,
            tray_tooltip: labels::tooltip(labels::TOOLTIP_DEACTIVATED),
            tray_disposed: false,
        }
    }
}

impl DisplayState {
    pub fn absorb(&mut self, effects: &[UiEffect]) {
        for effect in effects {
            match effect {
                UiEffect::SetTrigger(trigger) => self.trigger = trigger.clone(),
                UiEffect::SetEditorEnabled(enabled) => self.editor_enabled = *enabled,
                UiEffect::SetEditorText(text) => self.editor_text = text.clone(),
                UiEffect::SetPublicKeyLabel(label) => self.public_key_label = label.clone(),
                UiEffect::SetDetailVisible(visible) => self.detail_visible = *visible,
                UiEffect::SetTrayTooltip(tooltip) => self.tray_tooltip = tooltip.clone(),
                UiEffect::ShowWindow => self.window_visible = true,
                UiEffect::HideWindow => self.window_visible = false,
                UiEffect::DisposeTray => self.tray_disposed = true,
                UiEffect::SetDetailConfig(_)
                | UiEffect::TrayInfo { .. }
                | UiEffect::TrayError { .. }
                | UiEffect::ShowMessageBox(_) => {}
            }
        }
    }
}

/// Read side of the UI context's state for the background tasks. Only the
/// UI context writes it.
#[derive(Debug, Default)]
pub struct SharedView {
    running: ArcSwapOption<TunnelHandle>,
    window_visible: AtomicBool,
    detail_visible: AtomicBool,
}

impl SharedView {
    pub fn running(&self) -> Option<Arc<TunnelHandle>> {
        self.running.load_full()
    }

    pub fn window_visible(&self) -> bool {
        self.window_visible.load(Ordering::Acquire)
    }

    pub fn detail_visible(&self) -> bool {
        self.detail_visible.load(Ordering::Acquire)
    }

    pub(crate) fn publish_running(&self, running: Option<&TunnelHandle>) {
        self.running.store(running.cloned().map(Arc::new));
    }

    fn publish_display(&self, state: &DisplayState) {
        self.window_visible
            .store(state.window_visible, Ordering::Release);
        self.detail_visible
            .store(state.detail_visible, Ordering::Release);
    }
}

/// The shell together with the mirror of what it shows.
pub struct Surface {
    shell: Box<dyn Shell>,
    state: DisplayState,
    shared: Arc<SharedView>,
}

impl Surface {
    pub fn new(shell: Box<dyn Shell>, shared: Arc<SharedView>) -> Self {
        let state = DisplayState::default();
        shared.publish_display(&state);
        Self {
            shell,
            state,
            shared,
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn shared(&self) -> &Arc<SharedView> {
        &self.shared
    }

    /// Keeps the mirror in step with text the user typed; the shell already
    /// shows it, so nothing is sent back.
    pub fn record_editor_text(&mut self, text: String) {
        self.state.editor_text = text;
    }

    /// Applies one batch: mirror first, then the shell.
    pub fn commit(&mut self, effects: Vec<UiEffect>) {
        if effects.is_empty() {
            return;
        }
        self.state.absorb(&effects);
        self.shared.publish_display(&self.state);
        self.shell.apply(&effects);
    }

    pub fn prompt(&mut self, title: &str, text: &str) -> PromptAnswer {
        self.shell.prompt(title, text)
    }
}
