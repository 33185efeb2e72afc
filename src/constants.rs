use std::path::PathBuf;
use std::time::Duration;

pub const APP_TITLE: &str = "Tunnel";

pub const DEFAULT_TUNNEL_NAME: &str = "test";

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_REMINDER_INITIAL_DELAY: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REMINDER_INTERVAL: Duration = Duration::from_secs(2 * 60);

pub fn default_log_directory() -> PathBuf {
    PathBuf::from(".").join("logs")
}

pub const DEMO_CONFIG: &str = "
#
# Paste your configuration here
#

[Interface]
PrivateKey = ...
";

pub mod labels {
    pub const START: &str = "Start";
    pub const STOP: &str = "Stop";
    pub const STARTING: &str = "Starting…";
    pub const STOPPING: &str = "Stopping…";
    pub const REQUESTING: &str = "Requesting…";

    pub const TOOLTIP_ACTIVATING: &str = "Activating…";
    pub const TOOLTIP_ACTIVATED: &str = "Activated";
    pub const TOOLTIP_DEACTIVATING: &str = "Deactivating…";
    pub const TOOLTIP_DEACTIVATED: &str = "Deactivated";

    pub const PUBLIC_KEY_UNKNOWN: &str = "Public key: (unknown)";

    pub fn public_key(key: &str) -> String {
        format!("Public key: {}", key)
    }

    pub fn tooltip(status: &str) -> String {
        format!("{}: {}", super::APP_TITLE, status)
    }
}

pub const REMINDER_TITLE: &str = "Pre-release build";

pub fn reminder_message(interval: Duration) -> String {
    format!(
        "It looks like you're still using this pre-release build. Great!

We're glad you like it, and we'd appreciate hearing about both your successes and your tribulations.

But because this is pre-release software, we're not confident it's something you should yet be using, except for testing and reporting bugs. Check back with us for a newer version.

Would you like to keep running it? If you do, you'll be asked again in {}.",
        humantime::format_duration(interval)
    )
}
