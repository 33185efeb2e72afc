pub mod effects;
pub mod gate;
pub mod machine;
pub mod messages;
pub mod shell;
pub mod state;

use crate::conf::{self, KeyDeriver};
use crate::constants::{self, labels};
use crate::control::ControlClient;
use crate::control::types::{TunnelChange, TunnelHandle, TunnelName, TunnelState};
use crate::tasks::shutdown::ShutdownCoordinator;
use effects::{MessageBox, MessageIcon, PromptAnswer, Shell, TriggerState, UiEffect};
use gate::{Command, CommandGate};
use machine::{Transition, TunnelMachine};
use messages::{Message, ReminderAnswer};
use state::{SharedView, Surface};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Channels and shared handles the UI context is wired to.
pub struct UiLinks {
    pub shared: Arc<SharedView>,
    pub refresh: mpsc::UnboundedSender<()>,
    pub shutdown: Arc<ShutdownCoordinator>,
}

/// The single writer of all display state. Runs on its own thread and
/// handles one [`Message`] at a time.
pub struct UiContext {
    control: Arc<dyn ControlClient>,
    keys: Arc<dyn KeyDeriver>,
    display: Surface,
    machine: TunnelMachine,
    gate: CommandGate,
    refresh: mpsc::UnboundedSender<()>,
    shutdown: Arc<ShutdownCoordinator>,
    last_private_key: Option<String>,
    last_push_seq: Option<u64>,
}

impl UiContext {
    pub fn new(
        tracked: TunnelName,
        control: Arc<dyn ControlClient>,
        keys: Arc<dyn KeyDeriver>,
        shell: Box<dyn Shell>,
        links: UiLinks,
    ) -> Self {
        Self {
            gate: CommandGate::new(control.clone(), tracked.clone()),
            machine: TunnelMachine::new(tracked),
            display: Surface::new(shell, links.shared),
            control,
            keys,
            refresh: links.refresh,
            shutdown: links.shutdown,
            last_private_key: None,
            last_push_seq: None,
        }
    }

    pub fn display(&self) -> &state::DisplayState {
        self.display.state()
    }

    pub fn machine(&self) -> &TunnelMachine {
        &self.machine
    }

    /// Puts the window into its baseline and fills the editor with the
    /// stored configuration, or the template when there is none.
    pub fn initialize(&mut self) {
        let text = self.load_editor_text();
        self.display.commit(vec![
            UiEffect::SetTrayTooltip(labels::tooltip(labels::TOOLTIP_DEACTIVATED)),
            UiEffect::SetTrigger(TriggerState::new(labels::START, true)),
            UiEffect::SetEditorEnabled(true),
            UiEffect::SetDetailVisible(false),
            UiEffect::SetEditorText(text.clone()),
            UiEffect::ShowWindow,
        ]);
        self.on_config_text_changed(text);
    }

    fn load_editor_text(&self) -> String {
        match self.control.list_tunnels() {
            Ok(tunnels) => {
                for tunnel in tunnels.iter().filter(|t| self.machine.is_tracked(t)) {
                    match self.control.stored_config(tunnel) {
                        Ok(config) => return conf::serialize(&config),
                        Err(e) => tracing::warn!(
                            "Failed to load stored config for {}: {:#}",
                            tunnel.name,
                            e
                        ),
                    }
                }
            }
            Err(e) => tracing::warn!("Failed to list tunnels: {:#}", e),
        }
        constants::DEMO_CONFIG.to_string()
    }

    pub fn handle(&mut self, message: Message) -> Flow {
        match message {
            Message::TunnelChanged { seq, change } => self.on_tunnel_changed(seq, change),
            Message::StartupPoll { seq, tunnel, state } => {
                self.on_startup_poll(seq, tunnel, state)
            }
            Message::RuntimeConfigFetched { tunnel, config } => {
                self.on_runtime_config(tunnel, config)
            }
            Message::ConfigTextChanged(text) => self.on_config_text_changed(text),
            Message::TriggerClicked => self.on_trigger_clicked(),
            Message::WindowShown => self.on_window_shown(),
            Message::WindowClosed => self.display.commit(vec![UiEffect::HideWindow]),
            Message::QuitRequested => return self.on_quit(),
            Message::Reminder { next_in, reply } => return self.on_reminder(next_in, reply),
        }
        Flow::Continue
    }

    /// Blocks the calling thread, draining messages until quit or until
    /// every sender is gone.
    pub fn run(mut self, mut messages: mpsc::UnboundedReceiver<Message>) {
        tracing::info!("UI context running for tunnel {}", self.machine.tracked());
        while let Some(message) = messages.blocking_recv() {
            if self.handle(message) == Flow::Exit {
                break;
            }
        }
        tracing::info!("UI context stopped");
    }

    fn on_tunnel_changed(&mut self, seq: u64, change: TunnelChange) {
        if !self.machine.is_tracked(&change.tunnel) {
            tracing::trace!("Ignoring change for untracked tunnel {}", change.tunnel.name);
            return;
        }
        self.last_push_seq = Some(self.last_push_seq.map_or(seq, |last| last.max(seq)));

        let window_visible = self.display.state().window_visible;
        if let Some(transition) = self.machine.apply_change(&change, window_visible) {
            self.apply_transition(transition);
        }
    }

    fn on_startup_poll(&mut self, seq: u64, tunnel: TunnelHandle, state: TunnelState) {
        if state == TunnelState::Stopped {
            return;
        }
        if let Some(last) = self.last_push_seq
            && last > seq
        {
            tracing::debug!(
                "Discarding startup poll ({} {}) superseded by push event {}",
                tunnel.name,
                state,
                last
            );
            return;
        }
        if let Some(transition) = self.machine.apply(&tunnel, state, false) {
            tracing::info!("Adopted running tunnel {} ({}) at startup", tunnel.name, state);
            self.apply_transition(transition);
        }
    }

    fn apply_transition(&mut self, transition: Transition) {
        self.display
            .shared()
            .publish_running(self.machine.running());
        self.display.commit(transition.effects);
        if transition.refresh_detail {
            self.request_refresh();
        }
    }

    fn on_runtime_config(&mut self, tunnel: TunnelHandle, config: Box<conf::TunnelConfig>) {
        let state = self.display.state();
        let current = self.machine.running() == Some(&tunnel);
        if !current || !state.window_visible || !state.detail_visible {
            tracing::trace!("Dropping stale runtime config for {}", tunnel.name);
            return;
        }
        self.display.commit(vec![UiEffect::SetDetailConfig(config)]);
    }

    fn on_config_text_changed(&mut self, text: String) {
        let private_key = conf::extract_private_key(&text);
        self.display.record_editor_text(text);

        if private_key == self.last_private_key {
            return;
        }
        let label = match &private_key {
            Some(key) => match self.keys.public_key(key) {
                Ok(public) => labels::public_key(&public),
                Err(e) => {
                    tracing::trace!("No public key for editor contents: {:#}", e);
                    labels::PUBLIC_KEY_UNKNOWN.to_string()
                }
            },
            None => labels::PUBLIC_KEY_UNKNOWN.to_string(),
        };
        self.last_private_key = private_key;
        self.display.commit(vec![UiEffect::SetPublicKeyLabel(label)]);
    }

    fn on_trigger_clicked(&mut self) {
        let running = self.machine.running().cloned();
        let command = match running {
            Some(_) => Command::Stop,
            None => Command::Start(self.display.state().editor_text.clone()),
        };
        match self.gate.submit(command, running.as_ref(), &mut self.display) {
            Ok(submission) => tracing::debug!("Trigger handled: {:?}", submission),
            Err(e) => tracing::debug!("Trigger command failed: {}", e.chain()),
        }
    }

    fn on_window_shown(&mut self) {
        self.display.commit(vec![UiEffect::ShowWindow]);
        self.request_refresh();
    }

    fn on_reminder(&mut self, next_in: Duration, reply: oneshot::Sender<ReminderAnswer>) -> Flow {
        let answer = self.display.prompt(
            constants::REMINDER_TITLE,
            &constants::reminder_message(next_in),
        );
        if answer == PromptAnswer::No {
            tracing::info!("User chose to quit from the reminder");
            let _ = reply.send(ReminderAnswer::Quit);
            return self.on_quit();
        }
        let _ = reply.send(ReminderAnswer::KeepRunning);
        Flow::Continue
    }

    fn on_quit(&mut self) -> Flow {
        if self.shutdown.is_quitting() {
            return Flow::Exit;
        }
        self.display.commit(vec![UiEffect::DisposeTray]);
        if let Err(err) = self.shutdown.quit() {
            tracing::error!("{}", err.chain());
            self.display.commit(vec![UiEffect::ShowMessageBox(MessageBox::new(
                err.dialog_title(),
                err.dialog_text(),
                MessageIcon::Error,
            ))]);
        }
        Flow::Exit
    }

    fn request_refresh(&self) {
        if self.refresh.send(()).is_err() {
            tracing::debug!("Refresh loop is gone; skipping detail refresh");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::mock_control::{MockCall, MockControl, MockKeyDeriver};
    use crate::ui::shell::RecordingShell;

    const PRIVATE: &str = "yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=";

    fn valid_text() -> String {
        format!("[Interface]\nPrivateKey = {PRIVATE}\nAddress = 10.0.0.2/32\n")
    }

    struct Harness {
        ctx: UiContext,
        mock: Arc<MockControl>,
        shell: RecordingShell,
        shared: Arc<SharedView>,
        refresh_rx: mpsc::UnboundedReceiver<()>,
        feed: mpsc::UnboundedReceiver<TunnelChange>,
        seq: u64,
    }

    impl Harness {
        fn new(mock: MockControl) -> Self {
            let mock = Arc::new(mock);
            let shell = RecordingShell::new();
            let shared = Arc::new(SharedView::default());
            let (refresh, refresh_rx) = mpsc::unbounded_channel();
            let feed = mock.subscribe_state_changes().unwrap();
            let mut ctx = UiContext::new(
                TunnelName::new("test"),
                mock.clone(),
                Arc::new(MockKeyDeriver),
                Box::new(shell.clone()),
                UiLinks {
                    shared: shared.clone(),
                    refresh,
                    shutdown: Arc::new(ShutdownCoordinator::new(mock.clone())),
                },
            );
            ctx.initialize();
            shell.clear();
            Self {
                ctx,
                mock,
                shell,
                shared,
                refresh_rx,
                feed,
                seq: 0,
            }
        }

        fn push(&mut self, change: TunnelChange) -> Flow {
            self.seq += 1;
            self.ctx.handle(Message::TunnelChanged {
                seq: self.seq,
                change,
            })
        }

        /// Delivers whatever the mock service announced since last drain.
        fn drain_feed(&mut self) {
            while let Ok(change) = self.feed.try_recv() {
                self.push(change);
            }
        }

        fn toasts(&self) -> usize {
            self.shell
                .count(|effect| matches!(effect, UiEffect::TrayInfo { .. }))
        }

        fn dialogs(&self) -> Vec<MessageBox> {
            self.shell
                .effects()
                .into_iter()
                .filter_map(|effect| match effect {
                    UiEffect::ShowMessageBox(message) => Some(message),
                    _ => None,
                })
                .collect()
        }
    }

    fn test_tunnel() -> TunnelHandle {
        TunnelHandle::new("test")
    }

    #[test]
    fn test_initialize_uses_template_without_stored_config() {
        let harness = Harness::new(MockControl::new());
        let display = harness.ctx.display();
        assert_eq!(display.editor_text, constants::DEMO_CONFIG);
        assert_eq!(display.trigger, TriggerState::new("Start", true));
        assert!(display.window_visible);
        assert_eq!(display.public_key_label, "Public key: (unknown)");
    }

    #[test]
    fn test_initialize_loads_stored_config() {
        let config = conf::parse(&valid_text(), &TunnelName::new("test")).unwrap();
        let harness = Harness::new(MockControl::new().with_tunnel(config.clone(), TunnelState::Stopped));
        let display = harness.ctx.display();
        assert_eq!(display.editor_text, conf::serialize(&config));
        assert!(display.public_key_label.starts_with("Public key: "));
        assert_ne!(display.public_key_label, "Public key: (unknown)");
    }

    #[test]
    fn test_push_starting_then_started() {
        let mut harness = Harness::new(MockControl::new());
        harness.push(TunnelChange::new(test_tunnel(), TunnelState::Starting));
        harness.push(TunnelChange::new(test_tunnel(), TunnelState::Started));

        let display = harness.ctx.display();
        assert_eq!(display.trigger, TriggerState::new("Stop", true));
        assert!(display.detail_visible);
        assert_eq!(harness.toasts(), 1);
        assert_eq!(harness.shared.running().unwrap().name.as_str(), "test");
        assert!(harness.refresh_rx.try_recv().is_ok());
    }

    #[test]
    fn test_untracked_push_changes_nothing() {
        let mut harness = Harness::new(MockControl::new());
        let before = harness.ctx.display().clone();
        for state in TunnelState::all() {
            harness.push(
                TunnelChange::new(TunnelHandle::new("other"), state).with_error("unrelated"),
            );
        }
        assert_eq!(harness.ctx.display(), &before);
        assert!(harness.shell.batches().is_empty());
    }

    #[test]
    fn test_startup_poll_adopts_without_toast() {
        let mut harness = Harness::new(MockControl::new());
        harness.ctx.handle(Message::StartupPoll {
            seq: 0,
            tunnel: test_tunnel(),
            state: TunnelState::Started,
        });

        assert_eq!(harness.ctx.machine().running(), Some(&test_tunnel()));
        assert_eq!(harness.ctx.display().trigger.label, "Stop");
        assert_eq!(harness.toasts(), 0);
    }

    #[test]
    fn test_startup_poll_superseded_by_later_push() {
        let mut harness = Harness::new(MockControl::new());
        harness.seq = 5;
        harness.push(TunnelChange::new(test_tunnel(), TunnelState::Stopped));
        harness.ctx.handle(Message::StartupPoll {
            seq: 3,
            tunnel: test_tunnel(),
            state: TunnelState::Started,
        });

        assert!(harness.ctx.machine().running().is_none());
        assert_eq!(harness.ctx.display().trigger.label, "Start");
    }

    #[test]
    fn test_startup_poll_ignores_untracked_push_ordering() {
        let mut harness = Harness::new(MockControl::new());
        harness.seq = 5;
        harness.push(TunnelChange::new(TunnelHandle::new("other"), TunnelState::Started));
        harness.ctx.handle(Message::StartupPoll {
            seq: 3,
            tunnel: test_tunnel(),
            state: TunnelState::Started,
        });
        assert_eq!(harness.ctx.display().trigger.label, "Stop");
    }

    #[test]
    fn test_start_with_unparsable_text() {
        let mut harness = Harness::new(MockControl::new());
        harness
            .ctx
            .handle(Message::ConfigTextChanged("not a config".to_string()));
        harness.ctx.handle(Message::TriggerClicked);

        let dialogs = harness.dialogs();
        assert_eq!(dialogs.len(), 1);
        assert_eq!(dialogs[0].title, "Invalid configuration");
        assert_eq!(harness.mock.call_count(MockCall::CreateTunnel), 0);
        assert_eq!(harness.mock.call_count(MockCall::StartTunnel), 0);
        assert_eq!(harness.ctx.display().trigger, TriggerState::new("Start", true));
        assert!(harness.ctx.display().editor_enabled);
    }

    #[test]
    fn test_start_shows_requesting_until_transition() {
        let mut harness = Harness::new(MockControl::new());
        harness.mock.hold_transitions(true);
        harness.ctx.handle(Message::ConfigTextChanged(valid_text()));
        harness.ctx.handle(Message::TriggerClicked);

        assert_eq!(
            harness.ctx.display().trigger,
            TriggerState::new("Requesting…", false)
        );
        assert!(!harness.ctx.display().editor_enabled);

        harness.ctx.handle(Message::TriggerClicked);
        assert_eq!(harness.mock.call_count(MockCall::StartTunnel), 1);

        harness.drain_feed();
        assert_eq!(harness.ctx.display().trigger.label, "Starting…");
        harness.push(TunnelChange::new(test_tunnel(), TunnelState::Started));
        assert_eq!(harness.ctx.display().trigger, TriggerState::new("Stop", true));
    }

    #[test]
    fn test_failed_start_restores_affordances() {
        let mut harness = Harness::new(MockControl::new());
        harness.mock.fail(MockCall::StartTunnel, "access denied");
        harness.ctx.handle(Message::ConfigTextChanged(valid_text()));
        harness.ctx.handle(Message::TriggerClicked);

        let dialogs = harness.dialogs();
        assert_eq!(dialogs.len(), 1);
        assert_eq!(dialogs[0].title, "Unable to start tunnel");
        assert_eq!(dialogs[0].text, "access denied");
        assert_eq!(harness.ctx.display().trigger, TriggerState::new("Start", true));
        assert!(harness.ctx.display().editor_enabled);
        assert!(harness.ctx.machine().running().is_none());
    }

    #[test]
    fn test_failed_create_skips_start() {
        let mut harness = Harness::new(MockControl::new());
        harness.mock.fail(MockCall::CreateTunnel, "disk full");
        harness.ctx.handle(Message::ConfigTextChanged(valid_text()));
        harness.ctx.handle(Message::TriggerClicked);

        assert_eq!(harness.dialogs()[0].title, "Unable to create tunnel");
        assert_eq!(harness.mock.call_count(MockCall::StartTunnel), 0);
    }

    #[test]
    fn test_full_start_stop_cycle_toasts_once_each() {
        let mut harness = Harness::new(MockControl::new());
        harness.ctx.handle(Message::ConfigTextChanged(valid_text()));
        harness.ctx.handle(Message::TriggerClicked);
        harness.drain_feed();
        assert_eq!(harness.ctx.display().trigger.label, "Stop");

        harness.ctx.handle(Message::TriggerClicked);
        assert_eq!(harness.mock.call_count(MockCall::StopTunnel), 1);
        harness.drain_feed();

        assert_eq!(harness.ctx.display().trigger, TriggerState::new("Start", true));
        assert!(harness.ctx.display().editor_enabled);
        assert!(harness.shared.running().is_none());
        assert_eq!(harness.toasts(), 2);
    }

    #[test]
    fn test_failed_stop_restores_stop_trigger() {
        let mut harness = Harness::new(MockControl::new());
        harness.push(TunnelChange::new(test_tunnel(), TunnelState::Started));
        harness.mock.fail(MockCall::StopTunnel, "service busy");
        harness.ctx.handle(Message::TriggerClicked);

        assert_eq!(harness.dialogs()[0].title, "Unable to stop tunnel");
        assert_eq!(harness.ctx.display().trigger, TriggerState::new("Stop", true));
        assert!(!harness.ctx.display().editor_enabled);
    }

    #[test]
    fn test_push_error_while_visible_shows_dialog() {
        let mut harness = Harness::new(MockControl::new());
        harness.push(TunnelChange::new(test_tunnel(), TunnelState::Started));
        harness.push(
            TunnelChange::new(test_tunnel(), TunnelState::Stopped).with_error("Handshake did not complete"),
        );

        assert_eq!(harness.dialogs().len(), 1);
        assert_eq!(harness.ctx.display().trigger.label, "Start");
        assert_eq!(harness.toasts(), 1);
    }

    #[test]
    fn test_push_error_while_hidden_goes_to_tray() {
        let mut harness = Harness::new(MockControl::new());
        harness.ctx.handle(Message::WindowClosed);
        harness.push(TunnelChange::new(test_tunnel(), TunnelState::Stopped).with_error("boom"));

        assert!(harness.dialogs().is_empty());
        assert_eq!(
            harness
                .shell
                .count(|effect| matches!(effect, UiEffect::TrayError { .. })),
            1
        );
    }

    #[test]
    fn test_runtime_config_applied_only_when_showing() {
        let mut harness = Harness::new(MockControl::new());
        let config = Box::new(conf::parse(&valid_text(), &TunnelName::new("test")).unwrap());
        let is_detail = |effect: &UiEffect| matches!(effect, UiEffect::SetDetailConfig(_));

        harness.ctx.handle(Message::RuntimeConfigFetched {
            tunnel: test_tunnel(),
            config: config.clone(),
        });
        assert_eq!(harness.shell.count(is_detail), 0);

        harness.push(TunnelChange::new(test_tunnel(), TunnelState::Started));
        harness.ctx.handle(Message::RuntimeConfigFetched {
            tunnel: test_tunnel(),
            config: config.clone(),
        });
        assert_eq!(harness.shell.count(is_detail), 1);

        harness.ctx.handle(Message::WindowClosed);
        harness.ctx.handle(Message::RuntimeConfigFetched {
            tunnel: test_tunnel(),
            config,
        });
        assert_eq!(harness.shell.count(is_detail), 1);
    }

    #[test]
    fn test_window_shown_requests_refresh() {
        let mut harness = Harness::new(MockControl::new());
        harness.ctx.handle(Message::WindowClosed);
        assert!(!harness.shared.window_visible());
        harness.ctx.handle(Message::WindowShown);
        assert!(harness.shared.window_visible());
        assert!(harness.refresh_rx.try_recv().is_ok());
    }

    #[test]
    fn test_public_key_label_debounced() {
        let mut harness = Harness::new(MockControl::new());
        let is_label = |effect: &UiEffect| matches!(effect, UiEffect::SetPublicKeyLabel(_));

        harness.ctx.handle(Message::ConfigTextChanged(valid_text()));
        harness
            .ctx
            .handle(Message::ConfigTextChanged(format!("{}DNS = 1.1.1.1\n", valid_text())));
        assert_eq!(harness.shell.count(is_label), 1);
        assert_ne!(harness.ctx.display().public_key_label, "Public key: (unknown)");

        harness
            .ctx
            .handle(Message::ConfigTextChanged("[Interface]\nPrivateKey = nope\n".to_string()));
        assert_eq!(harness.shell.count(is_label), 2);
        assert_eq!(harness.ctx.display().public_key_label, "Public key: (unknown)");
    }

    #[test]
    fn test_reminder_keep_running() {
        let mut harness = Harness::new(MockControl::new());
        harness.shell.answer_next(PromptAnswer::Yes);
        let (reply, mut answer) = oneshot::channel();
        let flow = harness.ctx.handle(Message::Reminder {
            next_in: Duration::from_secs(120),
            reply,
        });

        assert_eq!(flow, Flow::Continue);
        assert_eq!(answer.try_recv().unwrap(), ReminderAnswer::KeepRunning);
        assert_eq!(harness.shell.prompts(), vec![constants::REMINDER_TITLE]);
        assert_eq!(harness.mock.call_count(MockCall::Quit), 0);
    }

    #[test]
    fn test_reminder_no_quits() {
        let mut harness = Harness::new(MockControl::new());
        harness.shell.answer_next(PromptAnswer::No);
        let (reply, mut answer) = oneshot::channel();
        let flow = harness.ctx.handle(Message::Reminder {
            next_in: Duration::from_secs(120),
            reply,
        });

        assert_eq!(flow, Flow::Exit);
        assert_eq!(answer.try_recv().unwrap(), ReminderAnswer::Quit);
        assert_eq!(harness.mock.call_count(MockCall::Quit), 1);
        assert!(harness.ctx.display().tray_disposed);
    }

    #[test]
    fn test_quit_is_idempotent() {
        let mut harness = Harness::new(MockControl::new());
        assert_eq!(harness.ctx.handle(Message::QuitRequested), Flow::Exit);
        assert_eq!(harness.ctx.handle(Message::QuitRequested), Flow::Exit);
        assert_eq!(harness.mock.call_count(MockCall::Quit), 1);
        assert_eq!(
            harness
                .shell
                .count(|effect| matches!(effect, UiEffect::DisposeTray)),
            1
        );
    }

    #[test]
    fn test_failed_quit_shows_error() {
        let mut harness = Harness::new(MockControl::new());
        harness.mock.fail(MockCall::Quit, "pipe closed");
        harness.ctx.handle(Message::QuitRequested);

        let dialogs = harness.dialogs();
        assert_eq!(dialogs.len(), 1);
        assert_eq!(dialogs[0].title, "Error Exiting");
        assert!(dialogs[0].text.contains("pipe closed"));
    }
}
