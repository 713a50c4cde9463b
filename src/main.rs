//! # Shared Joystick
//!
//! Combine a steering wheel and pedals, possibly attached to different
//! machines, into one virtual joystick.
//!
//! Run `shared-joystick client` on every machine with input devices and
//! `shared-joystick server` on the machine running the simulator.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shared_joystick::client::{obtain_profile, run_client};
use shared_joystick::config::{Config, LoggingConfig, OutputKind};
use shared_joystick::console::ConsolePrompter;
use shared_joystick::device::evdev_input::EvdevInputSource;
use shared_joystick::device::virtual_output::{TracingOutput, VirtualJoystick};
use shared_joystick::device::{DeviceInputSource, OutputDevice};
use shared_joystick::error::SharedJoystickError;
use shared_joystick::net::{FrameReceiver, FrameSender};
use shared_joystick::server::{initialize_output, run_server, sweep_output};
use shared_joystick::shutdown::Shutdown;

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "shared-joystick.log";

#[derive(Parser)]
#[command(name = "shared-joystick")]
#[command(about = "Combine wheels and pedals from several machines into one virtual joystick")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Calibrate local devices and stream them to a server
    Client {
        /// Server IPv4 address (asked interactively when not configured)
        #[arg(long)]
        server: Option<Ipv4Addr>,
    },

    /// Receive frames and drive the virtual joystick
    Server {
        /// Local IPv4 address to listen on
        #[arg(long)]
        bind: Option<Ipv4Addr>,

        /// Output backend
        #[arg(long, value_enum)]
        output: Option<OutputKind>,

        /// Skip the output sweep before running
        #[arg(long)]
        no_sweep: bool,
    },
}

/// Main entry point
///
/// # Control Flow
///
/// 1. Load configuration and apply command line overrides
/// 2. Set up logging (stderr, plus a daily file when `logging.log_dir` is set)
/// 3. Install the Ctrl+C handler that triggers shutdown
/// 4. Run the client or the server until shutdown
///
/// A shutdown during calibration or the output sweep is a clean exit.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &cli.command);
    config.validate().context("Invalid configuration")?;

    let _log_guard = init_logging(&config.logging);
    info!("Shared Joystick v{} starting...", env!("CARGO_PKG_VERSION"));

    let (trigger, shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            trigger.trigger();
        }
    });

    let result = match cli.command {
        Command::Client { .. } => client_main(&config, shutdown).await,
        Command::Server { .. } => server_main(&config, shutdown).await,
    };

    match result {
        Err(e) if is_cancelled(&e) => {
            info!("Cancelled");
            Ok(())
        }
        other => other,
    }
}

fn apply_overrides(config: &mut Config, command: &Command) {
    match command {
        Command::Client { server } => {
            if let Some(server) = server {
                config.network.server_address = server.to_string();
            }
        }
        Command::Server {
            bind,
            output,
            no_sweep,
        } => {
            if let Some(bind) = bind {
                config.network.bind_address = bind.to_string();
            }
            if let Some(output) = output {
                config.server.output = *output;
            }
            if *no_sweep {
                config.server.sweep_on_start = false;
            }
        }
    }
}

fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    // Logs go to stderr so operator prompts on stdout stay readable
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    if config.log_dir.is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}

fn is_cancelled(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<SharedJoystickError>(),
        Some(SharedJoystickError::Cancelled)
    )
}

async fn client_main(config: &Config, shutdown: Shutdown) -> Result<()> {
    let mut prompter = ConsolePrompter::new();

    let target = match config.network.server_socket_addr()? {
        Some(addr) => addr,
        None => {
            let answer = prompter.ask("Enter the server's IP address: ").await?;
            let ip: Ipv4Addr = answer
                .parse()
                .with_context(|| format!("'{}' is not an IPv4 address", answer))?;
            SocketAddr::from((ip, config.network.port))
        }
    };

    let mut source = EvdevInputSource::open().context("Failed to open input devices")?;
    for device in source.devices() {
        info!(
            "Device {}: {} ({} axes)",
            device.id.0, device.name, device.axis_count
        );
    }

    let profile = obtain_profile(
        &mut source,
        &mut prompter,
        shutdown.clone(),
        &config.calibration,
    )
    .await?;

    let sender = FrameSender::bind(target).await?;
    run_client(
        &mut source,
        &profile,
        &sender,
        config.client.send_interval(),
        shutdown,
    )
    .await?;
    Ok(())
}

async fn server_main(config: &Config, mut shutdown: Shutdown) -> Result<()> {
    let mut output: Box<dyn OutputDevice> = match config.server.output {
        OutputKind::Uinput => Box::new(
            VirtualJoystick::create().context("Failed to create the virtual joystick")?,
        ),
        OutputKind::Log => Box::new(TracingOutput::new()),
    };
    let mut state = initialize_output(output.as_mut())?;

    if config.server.sweep_on_start {
        let mut prompter = ConsolePrompter::new();
        sweep_output(
            output.as_mut(),
            &mut prompter,
            &mut state,
            config.server.sweep_step(),
            &mut shutdown,
        )
        .await?;
    }

    // Bound after the sweep so no stale frames queue up during it
    let mut receiver = FrameReceiver::bind(config.network.bind_socket_addr()?)
        .await
        .context("Failed to bind the listening socket")?;
    run_server(
        &mut receiver,
        output.as_mut(),
        state,
        config.server.window(),
        shutdown,
    )
    .await?;
    Ok(())
}
