pub mod mock_control;
pub mod types;

use crate::conf::TunnelConfig;
use anyhow::Result;
use tokio::sync::mpsc;
use types::{TunnelChange, TunnelHandle, TunnelState};

/// Request/response surface of the privileged tunnel service, plus its
/// push feed. All calls are synchronous and may block on the service.
pub trait ControlClient: Send + Sync {
    // Queries
    fn list_tunnels(&self) -> Result<Vec<TunnelHandle>>;
    fn tunnel_state(&self, tunnel: &TunnelHandle) -> Result<TunnelState>;
    fn stored_config(&self, tunnel: &TunnelHandle) -> Result<TunnelConfig>;
    fn runtime_config(&self, tunnel: &TunnelHandle) -> Result<TunnelConfig>;

    // Commands
    fn create_tunnel(&self, config: &TunnelConfig) -> Result<TunnelHandle>;
    fn start_tunnel(&self, tunnel: &TunnelHandle) -> Result<()>;
    fn stop_tunnel(&self, tunnel: &TunnelHandle) -> Result<()>;

    /// Registers a standing subscription. The service keeps the feed alive
    /// and delivers one message per transition, in order.
    fn subscribe_state_changes(&self) -> Result<mpsc::UnboundedReceiver<TunnelChange>>;

    // Lifecycle
    fn request_service_quit(&self, stop_tunnels_on_quit: bool) -> Result<()>;
}
