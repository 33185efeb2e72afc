use crate::constants::labels;
use crate::control::types::{TunnelChange, TunnelHandle, TunnelName, TunnelState};
use crate::errors;
use crate::ui::effects::{MessageBox, MessageIcon, TriggerState, UiEffect};

/// Effects of one observed transition, applied as a single batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub effects: Vec<UiEffect>,
    /// The detail view just became visible and should be refreshed now.
    pub refresh_detail: bool,
}

/// Current state and running reference of the tracked tunnel.
#[derive(Debug)]
pub struct TunnelMachine {
    tracked: TunnelName,
    current: TunnelState,
    running: Option<TunnelHandle>,
}

impl TunnelMachine {
    pub fn new(tracked: TunnelName) -> Self {
        Self {
            tracked,
            current: TunnelState::Stopped,
            running: None,
        }
    }

    pub fn tracked(&self) -> &TunnelName {
        &self.tracked
    }

    pub fn current(&self) -> TunnelState {
        self.current
    }

    pub fn running(&self) -> Option<&TunnelHandle> {
        self.running.as_ref()
    }

    pub fn is_tracked(&self, tunnel: &TunnelHandle) -> bool {
        tunnel.name == self.tracked
    }

    /// Maps a state observation onto display effects. Returns `None` for
    /// tunnels other than the tracked one.
    pub fn apply(
        &mut self,
        tunnel: &TunnelHandle,
        state: TunnelState,
        notify: bool,
    ) -> Option<Transition> {
        if !self.is_tracked(tunnel) {
            return None;
        }

        let name = tunnel.name.as_str();
        let mut effects = Vec::with_capacity(6);
        match state {
            TunnelState::Starting => {
                self.running = Some(tunnel.clone());
                effects.extend([
                    UiEffect::SetDetailVisible(false),
                    UiEffect::SetEditorEnabled(false),
                    UiEffect::SetTrigger(TriggerState::new(labels::STARTING, false)),
                    UiEffect::SetTrayTooltip(labels::tooltip(labels::TOOLTIP_ACTIVATING)),
                ]);
            }
            TunnelState::Started => {
                self.running = Some(tunnel.clone());
                effects.extend([
                    UiEffect::SetDetailVisible(true),
                    UiEffect::SetEditorEnabled(false),
                    UiEffect::SetTrigger(TriggerState::new(labels::STOP, true)),
                    UiEffect::SetTrayTooltip(labels::tooltip(labels::TOOLTIP_ACTIVATED)),
                ]);
                if notify {
                    effects.push(UiEffect::TrayInfo {
                        title: errors::tray::activated_title(),
                        text: errors::tray::activated(name),
                    });
                }
            }
            TunnelState::Stopping => {
                self.running = Some(tunnel.clone());
                effects.extend([
                    UiEffect::SetDetailVisible(false),
                    UiEffect::SetEditorEnabled(false),
                    UiEffect::SetTrigger(TriggerState::new(labels::STOPPING, false)),
                    UiEffect::SetTrayTooltip(labels::tooltip(labels::TOOLTIP_DEACTIVATING)),
                ]);
            }
            TunnelState::Stopped => {
                effects.extend([
                    UiEffect::SetDetailVisible(false),
                    UiEffect::SetEditorEnabled(true),
                    UiEffect::SetTrigger(TriggerState::new(labels::START, true)),
                    UiEffect::SetTrayTooltip(labels::tooltip(labels::TOOLTIP_DEACTIVATED)),
                ]);
                if notify && self.running.is_some() {
                    effects.push(UiEffect::TrayInfo {
                        title: errors::tray::deactivated_title(),
                        text: errors::tray::deactivated(name),
                    });
                }
                self.running = None;
            }
        }

        tracing::debug!("Tunnel {} moved {} -> {}", name, self.current, state);
        self.current = state;

        Some(Transition {
            effects,
            refresh_detail: state == TunnelState::Started,
        })
    }

    /// Applies a push notification. An attached error suppresses the toast
    /// and adds a dialog or tray error; the state still changes.
    pub fn apply_change(&mut self, change: &TunnelChange, window_visible: bool) -> Option<Transition> {
        let mut transition = self.apply(&change.tunnel, change.state, change.error.is_none())?;
        if let Some(error) = &change.error {
            tracing::warn!("Tunnel {} reported an error: {}", change.tunnel.name, error);
            transition.effects.push(error_effect(error, window_visible));
        }
        Some(transition)
    }
}

fn error_effect(error: &str, window_visible: bool) -> UiEffect {
    if window_visible {
        UiEffect::ShowMessageBox(MessageBox::new(
            errors::dialog::TUNNEL_ERROR,
            errors::dialog::tunnel_error_text(error),
            MessageIcon::Warning,
        ))
    } else {
        UiEffect::TrayError {
            title: errors::tray::error_title(),
            text: error.to_string(),
        }
    }
}
