use crate::control::ControlClient;
use crate::control::types::{TunnelHandle, TunnelName, TunnelState};
use crate::errors::UiError;
use crate::ui::messages::Message;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Stamps every tunnel observation as it enters the process, so the UI
/// context can tell which of two observations is fresher.
#[derive(Debug, Default)]
pub struct ObservationClock(AtomicU64);

impl ObservationClock {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Registers the push subscription and forwards each change to the UI
/// context, in receipt order. Registration happens before this returns.
pub fn spawn_push_feed(
    runtime: &Handle,
    control: &dyn ControlClient,
    clock: Arc<ObservationClock>,
    tx: mpsc::UnboundedSender<Message>,
    token: CancellationToken,
) -> Result<JoinHandle<()>, UiError> {
    let mut feed = control
        .subscribe_state_changes()
        .map_err(UiError::Subscription)?;
    tracing::info!("Subscribed to tunnel state changes");

    Ok(runtime.spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("Push feed forwarder cancelled");
                    break;
                }
                change = feed.recv() => {
                    let Some(change) = change else {
                        tracing::warn!("Tunnel service closed the state change feed");
                        break;
                    };
                    let seq = clock.next();
                    tracing::debug!(
                        "Push #{}: {} is {}",
                        seq,
                        change.tunnel.name,
                        change.state
                    );
                    if tx.send(Message::TunnelChanged { seq, change }).is_err() {
                        break;
                    }
                }
            }
        }
    }))
}

/// Snapshot of the tracked tunnel if the service reports it as anything but
/// stopped. Per-tunnel failures skip that tunnel.
pub fn poll_once(
    control: &dyn ControlClient,
    tracked: &TunnelName,
) -> Vec<(TunnelHandle, TunnelState)> {
    let tunnels = match control.list_tunnels() {
        Ok(tunnels) => tunnels,
        Err(e) => {
            tracing::warn!("{}", UiError::TransientFetch(e).chain());
            return Vec::new();
        }
    };

    tunnels
        .into_iter()
        .filter(|tunnel| &tunnel.name == tracked)
        .filter_map(|tunnel| match control.tunnel_state(&tunnel) {
            Ok(TunnelState::Stopped) => None,
            Ok(state) => Some((tunnel, state)),
            Err(e) => {
                tracing::warn!("Skipping {} in startup poll: {:#}", tunnel.name, e);
                None
            }
        })
        .collect()
}

/// Runs the one startup poll off the UI thread. The sequence number is
/// taken before the service is queried.
pub fn spawn_startup_poll(
    runtime: &Handle,
    control: Arc<dyn ControlClient>,
    tracked: TunnelName,
    clock: Arc<ObservationClock>,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let seq = clock.next();
    runtime.spawn(async move {
        let observed =
            match tokio::task::spawn_blocking(move || poll_once(control.as_ref(), &tracked)).await {
                Ok(observed) => observed,
                Err(e) => {
                    tracing::error!("Startup poll task failed: {}", e);
                    return;
                }
            };

        tracing::info!("Startup poll #{} found {} active tunnel(s)", seq, observed.len());
        for (tunnel, state) in observed {
            if tx.send(Message::StartupPoll { seq, tunnel, state }).is_err() {
                break;
            }
        }
    })
}
