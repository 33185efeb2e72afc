use crate::control::ControlClient;
use crate::errors::UiError;
use crate::ui::messages::Message;
use crate::ui::state::SharedView;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Re-pulls the running tunnel's runtime configuration for the detail view.
/// Only reads the shared view; the UI context decides whether the result is
/// still worth showing when it arrives.
#[derive(Clone)]
pub struct RefreshLoop {
    control: Arc<dyn ControlClient>,
    view: Arc<SharedView>,
    tx: mpsc::UnboundedSender<Message>,
}

impl RefreshLoop {
    pub fn new(
        control: Arc<dyn ControlClient>,
        view: Arc<SharedView>,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self { control, view, tx }
    }

    /// One refresh. Returns whether the service was asked for anything.
    pub fn tick(&self) -> bool {
        let Some(tunnel) = self.view.running() else {
            return false;
        };
        if !self.view.window_visible() || !self.view.detail_visible() {
            return false;
        }

        match self.control.runtime_config(&tunnel) {
            Ok(config) => {
                let fetched = Message::RuntimeConfigFetched {
                    tunnel: tunnel.as_ref().clone(),
                    config: Box::new(config),
                };
                if self.tx.send(fetched).is_err() {
                    tracing::trace!("UI context is gone; dropping runtime config for {}", tunnel.name);
                }
            }
            Err(e) => tracing::trace!("{}", UiError::TransientFetch(e).chain()),
        }
        true
    }

    /// Ticks every `interval` and whenever the UI context asks, until the
    /// token is cancelled or the request channel closes.
    pub async fn run(
        self,
        interval: Duration,
        mut requests: mpsc::UnboundedReceiver<()>,
        token: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            "Refresh loop running every {}",
            humantime::format_duration(interval)
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
                request = requests.recv() => {
                    if request.is_none() {
                        break;
                    }
                }
            }

            let this = self.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || this.tick()).await {
                tracing::error!("Refresh tick panicked: {}", e);
            }
        }
        tracing::debug!("Refresh loop stopped");
    }
}
