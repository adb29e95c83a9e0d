//! Livefeed CLI - headless view layer over the session controller.
//!
//! This is the main binary entry point. See the `livefeed` library for the
//! core functionality; this file only wires configuration, logging and
//! terminal output around it.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use livefeed::constants::STATUS_DATA_RECEIVED;
use livefeed::{
    env::Environment, ChannelStatus, Config, SessionController, SessionProbe, SessionSnapshot,
};
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// How long to keep processing events after shutdown so the close
/// handshake can go out before the runtime stops.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

// CLI
#[derive(Parser)]
#[command(name = "livefeed")]
#[command(version)]
#[command(about = "Authentication-gated realtime push client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the configured session is authenticated
    Status,
    /// Wait for the channel, request data once and print the result
    Fetch {
        /// Seconds to wait for the channel and the payload
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Print every snapshot change until interrupted
    Watch {
        /// Request data each time a channel opens
        #[arg(long)]
        request: bool,
    },
    /// Open the backend login page
    Login,
    /// Open the backend logout page and forget the stored session cookie
    Logout,
    /// Show or change configuration
    Config {
        /// Set the backend base URL
        #[arg(long)]
        backend_url: Option<String>,
        /// Store a session cookie (`name=value`)
        #[arg(long)]
        session_cookie: Option<String>,
        /// Forget the stored session cookie
        #[arg(long)]
        clear_session_cookie: bool,
    },
}

fn init_logging() -> Result<()> {
    let environment = Environment::current();
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(environment.default_log_filter()),
    );
    builder.format_timestamp_secs();

    // Use LIVEFEED_LOG_FILE to keep stdout/stderr clean for piping
    if let Ok(path) = std::env::var("LIVEFEED_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    log::debug!("Running in {} environment", environment);
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot) -> Result<()> {
    println!("{}", serde_json::to_string(snapshot)?);
    Ok(())
}

/// Keep applying events for a short while after shutdown.
async fn drain_after_shutdown(controller: &mut SessionController) {
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
        loop {
            controller.process_next_event().await;
        }
    })
    .await;
}

async fn status(config: &Config) -> Result<()> {
    let backend = livefeed::Backend::from_config(config)?;
    let status = SessionProbe::new(backend)
        .check_status()
        .await
        .context("Status check failed")?;
    println!("{}", serde_json::json!({ "authenticated": status.authenticated }));
    Ok(())
}

async fn fetch(config: &Config, timeout: Duration) -> Result<()> {
    let mut controller = SessionController::from_config(config)?;
    controller.start();

    let outcome = tokio::time::timeout(timeout, async {
        let mut requested = false;
        loop {
            controller.process_next_event().await;
            let snapshot = controller.snapshot();
            if snapshot.loading {
                continue;
            }
            if !snapshot.authenticated {
                let reason = snapshot.error.clone().unwrap_or_else(|| "not authenticated".into());
                anyhow::bail!("{reason} (run `livefeed login`, then store the session cookie)");
            }

            if !requested {
                if controller.is_ready_to_fetch() {
                    requested = controller.request_data();
                } else if controller.channel_status() == ChannelStatus::None {
                    anyhow::bail!("channel closed before it became ready");
                }
                continue;
            }

            if snapshot.status_message == STATUS_DATA_RECEIVED || snapshot.error.is_some() {
                return Ok(snapshot);
            }
            if controller.channel_status() == ChannelStatus::None {
                anyhow::bail!("channel closed before data arrived");
            }
        }
    })
    .await;

    controller.shutdown();
    drain_after_shutdown(&mut controller).await;

    let snapshot = outcome
        .map_err(|elapsed| anyhow::anyhow!("no data after {:?} ({elapsed})", timeout))??;
    print_snapshot(&snapshot)?;
    if let Some(error) = &snapshot.error {
        anyhow::bail!("{error}");
    }
    Ok(())
}

async fn watch(config: &Config, request: bool) -> Result<()> {
    let mut controller = SessionController::from_config(config)?;

    let mut snapshots = controller.subscribe();
    print_snapshot(&snapshots.borrow_and_update())?;
    let printer = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if let Err(e) = print_snapshot(&snapshot) {
                log::warn!("Failed to print snapshot: {:#}", e);
            }
        }
    });

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    controller.start();
    if request {
        let mut requested_for = None;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = controller.process_next_event() => {
                    let current = controller.channel().current_id();
                    if controller.is_ready_to_fetch()
                        && requested_for != current
                        && controller.request_data()
                    {
                        requested_for = current;
                    }
                }
            }
        }
        controller.shutdown();
    } else {
        controller.run(cancel).await;
    }
    drain_after_shutdown(&mut controller).await;

    // Dropping the controller closes the watch channel and ends the printer.
    drop(controller);
    let _ = printer.await;
    Ok(())
}

fn configure(
    mut config: Config,
    backend_url: Option<String>,
    session_cookie: Option<String>,
    clear_session_cookie: bool,
) -> Result<()> {
    let dir = Config::config_dir()?;
    if let Some(url) = backend_url {
        config.backend_url = url;
        config.save_to_dir(&dir)?;
    }
    if let Some(cookie) = session_cookie {
        if !cookie.contains('=') {
            anyhow::bail!("session cookie must look like name=value");
        }
        config.save_session_cookie(&dir, &cookie)?;
    }
    if clear_session_cookie {
        config.clear_session_cookie(&dir)?;
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    println!("session cookie: {}", if config.has_session_cookie() { "set" } else { "not set" });
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Status => status(&config).await?,
        Commands::Fetch { timeout } => {
            let timeout = timeout.map_or_else(|| config.fetch_timeout(), Duration::from_secs);
            fetch(&config, timeout).await?;
        }
        Commands::Watch { request } => watch(&config, request).await?,
        Commands::Login => {
            SessionController::from_config(&config)?.login()?;
            println!("After logging in, store the session cookie with:");
            println!("  livefeed config --session-cookie 'name=value'");
        }
        Commands::Logout => {
            SessionController::from_config(&config)?.logout()?;
            config.clear_session_cookie(&Config::config_dir()?)?;
            println!("Session cookie cleared.");
        }
        Commands::Config {
            backend_url,
            session_cookie,
            clear_session_cookie,
        } => configure(config, backend_url, session_cookie, clear_session_cookie)?,
    }

    Ok(())
}
