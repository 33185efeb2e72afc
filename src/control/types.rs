use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TunnelName(String);

impl TunnelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TunnelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TunnelName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum TunnelState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl TunnelState {
    pub fn all() -> impl Iterator<Item = Self> {
        use strum::IntoEnumIterator;
        Self::iter()
    }
}

/// Reference to a tunnel known to the service. Cheap to clone; carries no
/// connection state of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TunnelHandle {
    pub name: TunnelName,
}

impl TunnelHandle {
    pub fn new(name: impl Into<TunnelName>) -> Self {
        Self { name: name.into() }
    }
}

/// One transition announced on the service's push feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelChange {
    pub tunnel: TunnelHandle,
    pub state: TunnelState,
    pub error: Option<String>,
}

impl TunnelChange {
    pub fn new(tunnel: TunnelHandle, state: TunnelState) -> Self {
        Self {
            tunnel,
            state,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_matches_variant() {
        assert_eq!(TunnelState::Started.to_string(), "Started");
        assert_eq!(TunnelState::Stopping.to_string(), "Stopping");
    }

    #[test]
    fn test_all_states_listed_once() {
        let states: Vec<_> = TunnelState::all().collect();
        assert_eq!(
            states,
            vec![
                TunnelState::Stopped,
                TunnelState::Starting,
                TunnelState::Started,
                TunnelState::Stopping
            ]
        );
    }

    #[test]
    fn test_change_builder_attaches_error() {
        let change = TunnelChange::new(TunnelHandle::new("test"), TunnelState::Stopped)
            .with_error("handshake failed");
        assert_eq!(change.error.as_deref(), Some("handshake failed"));
        assert_eq!(change.tunnel.name.as_str(), "test");
    }
}
