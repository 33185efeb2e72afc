use crate::conf::TunnelConfig;
use crate::control::types::{TunnelChange, TunnelHandle, TunnelState};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAnswer {
    KeepRunning,
    Quit,
}

/// Everything the UI context reacts to. Tunnel observations carry the
/// sequence number stamped where they entered the process.
#[derive(Debug)]
pub enum Message {
    // Event feed
    TunnelChanged {
        seq: u64,
        change: TunnelChange,
    },
    StartupPoll {
        seq: u64,
        tunnel: TunnelHandle,
        state: TunnelState,
    },

    // Refresh loop
    RuntimeConfigFetched {
        tunnel: TunnelHandle,
        config: Box<TunnelConfig>,
    },

    // Shell
    ConfigTextChanged(String),
    TriggerClicked,
    WindowShown,
    WindowClosed,
    QuitRequested,

    // Reminder scheduler
    Reminder {
        next_in: Duration,
        reply: oneshot::Sender<ReminderAnswer>,
    },
}
