use crate::conf::KeyDeriver;
use crate::control::ControlClient;
use crate::settings::Settings;
use crate::tasks::reconciler::{self, ObservationClock};
use crate::tasks::refresh::RefreshLoop;
use crate::tasks::reminder::ReminderScheduler;
use crate::tasks::shutdown::ShutdownCoordinator;
use crate::ui::effects::Shell;
use crate::ui::messages::Message;
use crate::ui::state::SharedView;
use crate::ui::{UiContext, UiLinks};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Collaborators and settings for one UI instance.
pub struct App {
    settings: Settings,
    control: Arc<dyn ControlClient>,
    keys: Arc<dyn KeyDeriver>,
}

impl App {
    pub fn new(
        settings: Settings,
        control: Arc<dyn ControlClient>,
        keys: Arc<dyn KeyDeriver>,
    ) -> Self {
        Self {
            settings,
            control,
            keys,
        }
    }

    /// Subscribes to the push feed, starts the UI thread and spawns the
    /// background sources on `runtime`. A failed subscription is logged and
    /// the rest still starts; the startup poll and refresh keep the view usable.
    pub fn start(self, runtime: &Handle, shell: Box<dyn Shell>) -> Result<AppHandle> {
        let tracked = self.settings.tunnel();
        let (tx, rx) = mpsc::unbounded_channel();
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SharedView::default());
        let shutdown = Arc::new(ShutdownCoordinator::new(self.control.clone()));
        let clock = Arc::new(ObservationClock::default());

        // Subscribe before polling so no transition falls between the two.
        let mut tasks = Vec::with_capacity(4);
        match reconciler::spawn_push_feed(
            runtime,
            self.control.as_ref(),
            clock.clone(),
            tx.clone(),
            shutdown.token(),
        ) {
            Ok(task) => tasks.push(task),
            Err(err) => tracing::warn!("{}; continuing without push updates", err.chain()),
        }

        let mut context = UiContext::new(
            tracked.clone(),
            self.control.clone(),
            self.keys.clone(),
            shell,
            UiLinks {
                shared: shared.clone(),
                refresh: refresh_tx,
                shutdown: shutdown.clone(),
            },
        );
        let ui_thread = std::thread::Builder::new()
            .name("ui-context".to_string())
            .spawn(move || {
                context.initialize();
                context.run(rx);
            })
            .context("Failed to start UI thread")?;

        tasks.push(reconciler::spawn_startup_poll(
            runtime,
            self.control.clone(),
            tracked.clone(),
            clock,
            tx.clone(),
        ));

        let refresh = RefreshLoop::new(self.control.clone(), shared.clone(), tx.clone());
        tasks.push(runtime.spawn(refresh.run(
            self.settings.refresh_interval,
            refresh_rx,
            shutdown.token(),
        )));

        if self.settings.reminders_enabled {
            let reminder = ReminderScheduler::new(
                self.settings.reminder_initial_delay,
                self.settings.reminder_interval,
                tx.clone(),
                shutdown.token(),
            );
            tasks.push(runtime.spawn(reminder.run()));
        } else {
            tracing::info!("Pre-release reminders disabled");
        }

        tracing::info!("Tracking tunnel {}", tracked);
        Ok(AppHandle {
            tx,
            shared,
            shutdown,
            ui_thread,
            tasks,
        })
    }
}

/// Running application. Shell events are fed in through [`AppHandle::send`].
pub struct AppHandle {
    tx: mpsc::UnboundedSender<Message>,
    shared: Arc<SharedView>,
    shutdown: Arc<ShutdownCoordinator>,
    ui_thread: std::thread::JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl AppHandle {
    /// False once the UI context has stopped.
    pub fn send(&self, message: Message) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.tx.clone()
    }

    pub fn shared(&self) -> &Arc<SharedView> {
        &self.shared
    }

    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Blocks until the UI context exits and returns the process exit code.
    /// Must not be called from inside the runtime.
    pub fn wait(self) -> i32 {
        let AppHandle {
            tx,
            shutdown,
            ui_thread,
            tasks,
            ..
        } = self;
        drop(tx);

        if ui_thread.join().is_err() {
            tracing::error!("UI thread panicked");
            return 1;
        }
        for task in tasks {
            task.abort();
        }
        shutdown.exit_code()
    }
}
