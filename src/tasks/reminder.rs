use crate::ui::messages::{Message, ReminderAnswer};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Asks, after `initial_delay` and then every `interval` once answered,
/// whether this pre-release build should keep running. The next reminder is
/// only scheduled after the user has answered the current one.
pub struct ReminderScheduler {
    initial_delay: Duration,
    interval: Duration,
    tx: mpsc::UnboundedSender<Message>,
    token: CancellationToken,
}

impl ReminderScheduler {
    pub fn new(
        initial_delay: Duration,
        interval: Duration,
        tx: mpsc::UnboundedSender<Message>,
        token: CancellationToken,
    ) -> Self {
        Self {
            initial_delay,
            interval,
            tx,
            token,
        }
    }

    pub async fn run(self) {
        let mut delay = self.initial_delay;
        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let (reply, answer) = oneshot::channel();
            let reminder = Message::Reminder {
                next_in: self.interval,
                reply,
            };
            if self.tx.send(reminder).is_err() {
                break;
            }

            let answer = tokio::select! {
                _ = self.token.cancelled() => break,
                answer = answer => answer,
            };
            match answer {
                Ok(ReminderAnswer::KeepRunning) => {
                    tracing::debug!(
                        "Next reminder in {}",
                        humantime::format_duration(self.interval)
                    );
                    delay = self.interval;
                }
                Ok(ReminderAnswer::Quit) | Err(_) => break,
            }
        }
        tracing::debug!("Reminder scheduler stopped");
    }
}
