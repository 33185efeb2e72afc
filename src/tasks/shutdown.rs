use crate::control::ControlClient;
use crate::errors::UiError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOutcome {
    Requested,
    AlreadyQuitting,
}

/// Owns the process-wide quit. Every path that ends the application goes
/// through [`ShutdownCoordinator::quit`]; only the first call does anything.
pub struct ShutdownCoordinator {
    control: Arc<dyn ControlClient>,
    token: CancellationToken,
    started: AtomicBool,
    failed: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(control: Arc<dyn ControlClient>) -> Self {
        Self {
            control,
            token: CancellationToken::new(),
            started: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }

    /// Cancelled once quitting has run, whatever its outcome.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_quitting(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn quit(&self) -> Result<QuitOutcome, UiError> {
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::debug!("Quit already in progress");
            return Ok(QuitOutcome::AlreadyQuitting);
        }

        tracing::info!("Asking the tunnel service to quit");
        let result = self.control.request_service_quit(true);
        if result.is_err() {
            self.failed.store(true, Ordering::Release);
        }
        self.token.cancel();

        result
            .map(|()| QuitOutcome::Requested)
            .map_err(UiError::FatalQuit)
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed.load(Ordering::Acquire) {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::mock_control::{MockCall, MockControl};

    #[test]
    fn test_quit_runs_once() {
        let mock = Arc::new(MockControl::new());
        let shutdown = ShutdownCoordinator::new(mock.clone());

        assert_eq!(shutdown.quit().unwrap(), QuitOutcome::Requested);
        assert_eq!(shutdown.quit().unwrap(), QuitOutcome::AlreadyQuitting);
        assert_eq!(mock.call_count(MockCall::Quit), 1);
        assert_eq!(mock.quit_requested(), Some(true));
        assert!(shutdown.token().is_cancelled());
        assert_eq!(shutdown.exit_code(), 0);
    }

    #[test]
    fn test_failed_quit_still_cancels() {
        let mock = Arc::new(MockControl::new());
        mock.fail(MockCall::Quit, "pipe closed");
        let shutdown = ShutdownCoordinator::new(mock);

        let err = shutdown.quit().unwrap_err();
        assert!(matches!(err, UiError::FatalQuit(_)));
        assert!(err.dialog_text().starts_with("Unable to exit service due to: pipe closed."));
        assert!(shutdown.token().is_cancelled());
        assert_eq!(shutdown.exit_code(), 1);
    }
}
