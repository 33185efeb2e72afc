use crate::conf::{KeyDeriver, TunnelConfig};
use crate::control::ControlClient;
use crate::control::types::{TunnelChange, TunnelHandle, TunnelName, TunnelState};
use crate::errors;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum MockCall {
    ListTunnels,
    TunnelState,
    StoredConfig,
    RuntimeConfig,
    CreateTunnel,
    StartTunnel,
    StopTunnel,
    Subscribe,
    Quit,
}

#[derive(Debug)]
struct MockTunnel {
    config: TunnelConfig,
    state: TunnelState,
}

#[derive(Default)]
struct MockInner {
    tunnels: HashMap<TunnelName, MockTunnel>,
    subscribers: Vec<mpsc::UnboundedSender<TunnelChange>>,
    failures: HashMap<MockCall, String>,
    calls: HashMap<MockCall, usize>,
    hold_transitions: bool,
    quit_requested: Option<bool>,
}

impl MockInner {
    fn record(&mut self, call: MockCall) -> Result<()> {
        *self.calls.entry(call).or_default() += 1;
        if let Some(message) = self.failures.get(&call) {
            anyhow::bail!("{}", message);
        }
        Ok(())
    }

    fn tunnel(&self, name: &TunnelName) -> Result<&MockTunnel> {
        self.tunnels
            .get(name)
            .ok_or_else(|| anyhow::anyhow!(errors::tunnel::not_found(name.as_str())))
    }

    fn transition(&mut self, tunnel: &TunnelHandle, state: TunnelState) {
        if let Some(entry) = self.tunnels.get_mut(&tunnel.name) {
            entry.state = state;
        }
        self.broadcast(TunnelChange::new(tunnel.clone(), state));
    }

    fn broadcast(&mut self, change: TunnelChange) {
        tracing::debug!(
            "MOCK: {} -> {} (error: {:?})",
            change.tunnel.name,
            change.state,
            change.error
        );
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }
}

/// In-process stand-in for the tunnel service. Start and stop run through
/// the intermediate state and, unless held, settle immediately.
#[derive(Default)]
pub struct MockControl {
    inner: Mutex<MockInner>,
}

impl MockControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tunnel(self, config: TunnelConfig, state: TunnelState) -> Self {
        self.lock()
            .tunnels
            .insert(config.name.clone(), MockTunnel { config, state });
        self
    }

    /// When held, start/stop only announce Starting/Stopping and the test
    /// finishes the transition with [`MockControl::emit`].
    pub fn hold_transitions(&self, hold: bool) {
        self.lock().hold_transitions = hold;
    }

    pub fn fail(&self, call: MockCall, message: impl Into<String>) {
        self.lock().failures.insert(call, message.into());
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn call_count(&self, call: MockCall) -> usize {
        self.lock().calls.get(&call).copied().unwrap_or_default()
    }

    pub fn quit_requested(&self) -> Option<bool> {
        self.lock().quit_requested
    }

    pub fn state_of(&self, name: &TunnelName) -> Option<TunnelState> {
        self.lock().tunnels.get(name).map(|t| t.state)
    }

    /// Pushes a change to every subscriber, updating the mock's own record
    /// of the tunnel when it knows it.
    pub fn emit(&self, change: TunnelChange) {
        let mut inner = self.lock();
        if let Some(entry) = inner.tunnels.get_mut(&change.tunnel.name) {
            entry.state = change.state;
        }
        inner.broadcast(change);
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ControlClient for MockControl {
    fn list_tunnels(&self) -> Result<Vec<TunnelHandle>> {
        let mut inner = self.lock();
        inner.record(MockCall::ListTunnels)?;
        let mut names: Vec<_> = inner.tunnels.keys().cloned().collect();
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(names.into_iter().map(|name| TunnelHandle { name }).collect())
    }

    fn tunnel_state(&self, tunnel: &TunnelHandle) -> Result<TunnelState> {
        let mut inner = self.lock();
        inner.record(MockCall::TunnelState)?;
        Ok(inner.tunnel(&tunnel.name)?.state)
    }

    fn stored_config(&self, tunnel: &TunnelHandle) -> Result<TunnelConfig> {
        let mut inner = self.lock();
        inner.record(MockCall::StoredConfig)?;
        Ok(inner.tunnel(&tunnel.name)?.config.clone())
    }

    fn runtime_config(&self, tunnel: &TunnelHandle) -> Result<TunnelConfig> {
        let mut inner = self.lock();
        inner.record(MockCall::RuntimeConfig)?;
        let entry = inner.tunnel(&tunnel.name)?;
        anyhow::ensure!(
            entry.state == TunnelState::Started,
            errors::tunnel::not_running(tunnel.name.as_str())
        );
        Ok(entry.config.clone())
    }

    fn create_tunnel(&self, config: &TunnelConfig) -> Result<TunnelHandle> {
        let mut inner = self.lock();
        inner.record(MockCall::CreateTunnel)?;
        if let Some(existing) = inner.tunnels.get(&config.name) {
            anyhow::ensure!(
                existing.state == TunnelState::Stopped,
                errors::tunnel::already_running(config.name.as_str())
            );
        }
        inner.tunnels.insert(
            config.name.clone(),
            MockTunnel {
                config: config.clone(),
                state: TunnelState::Stopped,
            },
        );
        tracing::info!("MOCK: Created tunnel {}", config.name);
        Ok(TunnelHandle::new(config.name.clone()))
    }

    fn start_tunnel(&self, tunnel: &TunnelHandle) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MockCall::StartTunnel)?;
        anyhow::ensure!(
            inner.tunnel(&tunnel.name)?.state == TunnelState::Stopped,
            errors::tunnel::already_running(tunnel.name.as_str())
        );

        tracing::info!("MOCK: Starting tunnel {}", tunnel.name);
        inner.transition(tunnel, TunnelState::Starting);
        if !inner.hold_transitions {
            inner.transition(tunnel, TunnelState::Started);
        }
        Ok(())
    }

    fn stop_tunnel(&self, tunnel: &TunnelHandle) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MockCall::StopTunnel)?;
        anyhow::ensure!(
            inner.tunnel(&tunnel.name)?.state != TunnelState::Stopped,
            errors::tunnel::not_running(tunnel.name.as_str())
        );

        tracing::info!("MOCK: Stopping tunnel {}", tunnel.name);
        inner.transition(tunnel, TunnelState::Stopping);
        if !inner.hold_transitions {
            inner.transition(tunnel, TunnelState::Stopped);
        }
        Ok(())
    }

    fn subscribe_state_changes(&self) -> Result<mpsc::UnboundedReceiver<TunnelChange>> {
        let mut inner = self.lock();
        inner.record(MockCall::Subscribe)?;
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.push(tx);
        Ok(rx)
    }

    fn request_service_quit(&self, stop_tunnels_on_quit: bool) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MockCall::Quit)?;
        inner.quit_requested = Some(stop_tunnels_on_quit);
        tracing::info!(
            "MOCK: Service quit requested (stop tunnels: {})",
            stop_tunnels_on_quit
        );
        Ok(())
    }
}

/// Stand-in derivation that only checks the key's shape and returns a
/// deterministic value in the same encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockKeyDeriver;

impl KeyDeriver for MockKeyDeriver {
    fn public_key(&self, private_key: &str) -> Result<String> {
        anyhow::ensure!(
            private_key.len() == 44 && private_key.ends_with('='),
            errors::keys::INVALID_PRIVATE_KEY
        );
        let mut derived: String = private_key[..43].chars().rev().collect();
        derived.push('=');
        Ok(derived)
    }
}
