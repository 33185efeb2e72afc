use crate::conf;
use crate::constants::labels;
use crate::control::ControlClient;
use crate::control::types::{TunnelHandle, TunnelName};
use crate::errors::{self, ControlAction, UiError};
use crate::ui::effects::{MessageBox, MessageIcon, TriggerState, UiEffect};
use crate::ui::state::Surface;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(String),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Another command still owns the trigger.
    Rejected,
    /// The service accepted the command; the state machine restores the
    /// trigger when the resulting transition arrives.
    Dispatched,
}

/// Runs user start/stop commands one at a time. The disabled trigger is the
/// in-flight marker.
pub struct CommandGate {
    control: Arc<dyn ControlClient>,
    tracked: TunnelName,
}

impl CommandGate {
    pub fn new(control: Arc<dyn ControlClient>, tracked: TunnelName) -> Self {
        Self { control, tracked }
    }

    pub fn submit(
        &self,
        command: Command,
        running: Option<&TunnelHandle>,
        display: &mut Surface,
    ) -> Result<Submission, UiError> {
        let state = display.state();
        if !state.trigger.enabled {
            tracing::debug!("Ignoring {:?} while a command is in flight", command);
            return Ok(Submission::Rejected);
        }
        let saved_trigger = state.trigger.clone();
        let saved_editor = state.editor_enabled;

        display.commit(vec![
            UiEffect::SetTrigger(TriggerState::new(labels::REQUESTING, false)),
            UiEffect::SetEditorEnabled(false),
        ]);

        let result = match command {
            Command::Stop => self.stop(running),
            Command::Start(text) => self.start(&text, display),
        };

        match result {
            Ok(()) => Ok(Submission::Dispatched),
            Err(err) => {
                tracing::error!("Command failed: {}", err.chain());
                display.commit(vec![
                    UiEffect::ShowMessageBox(MessageBox::new(
                        err.dialog_title(),
                        err.dialog_text(),
                        MessageIcon::Error,
                    )),
                    UiEffect::SetTrigger(saved_trigger),
                    UiEffect::SetEditorEnabled(saved_editor),
                ]);
                Err(err)
            }
        }
    }

    fn stop(&self, running: Option<&TunnelHandle>) -> Result<(), UiError> {
        let tunnel = running.ok_or_else(|| {
            UiError::control(
                ControlAction::Stop,
                anyhow::anyhow!(errors::tunnel::NO_RUNNING_TUNNEL),
            )
        })?;
        tracing::info!("Requesting stop of tunnel {}", tunnel.name);
        self.control
            .stop_tunnel(tunnel)
            .map_err(|e| UiError::control(ControlAction::Stop, e))
    }

    fn start(&self, text: &str, display: &mut Surface) -> Result<(), UiError> {
        let config = conf::parse(text, &self.tracked)?;
        display.commit(vec![UiEffect::SetDetailConfig(Box::new(config.clone()))]);

        tracing::info!("Requesting start of tunnel {}", self.tracked);
        let tunnel = self
            .control
            .create_tunnel(&config)
            .map_err(|e| UiError::control(ControlAction::Create, e))?;
        self.control
            .start_tunnel(&tunnel)
            .map_err(|e| UiError::control(ControlAction::Start, e))
    }
}
