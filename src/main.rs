// Tunnel UI
// Entry point for the application

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tunnel_ui::app::App;
use tunnel_ui::constants;
use tunnel_ui::control::ControlClient;
use tunnel_ui::control::mock_control::{MockControl, MockKeyDeriver};
use tunnel_ui::errors;
use tunnel_ui::settings::Settings;
use tunnel_ui::ui::messages::Message;
use tunnel_ui::ui::shell::LoggingShell;

#[derive(Parser, Debug)]
#[command(name = "tunnel_ui")]
#[command(about = "Tunnel UI - keeps a tunnel front-end in step with the tunnel service")]
struct Args {
    #[arg(long, help = "Log JSON to stdout instead of pretty output")]
    headless: bool,

    #[arg(long, help = "Path to a settings file (YAML or TOML)")]
    settings: Option<PathBuf>,

    #[arg(long, help = "Talk to an in-memory tunnel service instead of a real one")]
    mock: bool,

    #[arg(long, help = "Print the effective settings as YAML and exit")]
    print_settings: bool,
}

fn setup_tracing(headless: bool, log_directory: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_directory).context(errors::logs::FAILED_TO_CREATE_DIR)?;

    let file_appender = tracing_appender::rolling::daily(log_directory, "tunnel_ui.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if headless {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(non_blocking).json())
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(non_blocking).json())
            .with(fmt::layer().pretty().with_writer(std::io::stdout))
            .init();
    }

    Ok(guard)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(args.settings.as_deref())?;
    if args.print_settings {
        print!("{}", settings.to_yaml()?);
        return Ok(());
    }

    let guard = setup_tracing(args.headless, &settings.log_directory)
        .context("Failed to initialize tracing")?;

    tracing::info!("{} UI starting", constants::APP_TITLE);

    if !args.mock {
        let error_msg = "No tunnel service transport is available in this build. Use --mock.";
        tracing::error!("{}", error_msg);
        return Err(anyhow::anyhow!(error_msg));
    }
    tracing::info!("Running in MOCK mode - tunnels only exist in memory");

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let control: Arc<dyn ControlClient> = Arc::new(MockControl::new());
    let app = App::new(settings, control, Arc::new(MockKeyDeriver));
    let handle = app.start(runtime.handle(), Box::new(LoggingShell))?;

    let quit = handle.sender();
    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl+C received, shutting down");
                let _ = quit.send(Message::QuitRequested);
            }
            Err(e) => {
                tracing::error!("Error listening for Ctrl+C: {}", e);
            }
        }
    });

    let exit_code = handle.wait();
    runtime.shutdown_timeout(Duration::from_secs(1));
    tracing::info!("Exiting with status {}", exit_code);

    drop(guard);
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_defaults() {
        let args = Args::parse_from(["tunnel_ui"]);
        assert!(!args.headless);
        assert!(!args.mock);
        assert!(!args.print_settings);
        assert!(args.settings.is_none());
    }

    #[test]
    fn test_cli_args_settings_path() {
        let args = Args::parse_from(["tunnel_ui", "--settings", "custom.yaml"]);
        assert_eq!(args.settings.unwrap(), PathBuf::from("custom.yaml"));
    }

    #[test]
    fn test_cli_args_all_flags() {
        let args = Args::parse_from([
            "tunnel_ui",
            "--headless",
            "--mock",
            "--print-settings",
            "--settings",
            "test.toml",
        ]);
        assert!(args.headless);
        assert!(args.mock);
        assert!(args.print_settings);
        assert_eq!(args.settings.unwrap(), PathBuf::from("test.toml"));
    }
}
