//! Mix Controller
//!
//! Server-side session manager for a multi-party audio conference: peers
//! send RTP to the listen port, each active source is decoded into a shared
//! mix, and in mesh mode the mix is encoded and fanned back out to every
//! known peer host.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment; apply the positional listen-port
//!    argument
//! 2. Build the processing graph with its network-input node and start it
//! 3. Bind the UDP transport and spawn the source watcher
//! 4. Spawn the `ConferenceActor` that owns all session state
//! 5. Wait for shutdown signal or a fatal session error
//!
//! Every fatal error class terminates the process with its own exit code;
//! there is no supervisor and no partial-session recovery.

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mix_controller::config::{Config, ConfigError};
use mix_controller::errors::MixError;
use mix_controller::session::{ConferenceActor, ConferenceMetrics};
use mix_controller::transport::UdpTransport;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for the actor to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mix_controller=debug,media_graph=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run().await {
        error!(error = %err, exit_code = err.exit_code(), "fatal error");
        std::process::exit(err.exit_code());
    }
}

async fn run() -> Result<(), MixError> {
    info!("Starting Mix Controller");

    // Load configuration; the single positional argument overrides the port.
    let port_arg = std::env::args().nth(1);
    let config = Config::from_env()?.with_listen_port_arg(port_arg.as_deref())?;

    info!(
        instance_id = %config.instance_id,
        listen_addr = %config.listen_addr(),
        mode = %config.mode,
        source_timeout_seconds = config.source_timeout_seconds,
        "Connection parameters"
    );

    // Build the primary graph: just the network-input node; everything else
    // is attached and detached per peer at runtime.
    let mut graph = media_graph::Graph::new();
    let input_node = graph.create_node(media_graph::element::RTP_INPUT)?;
    graph.resume();
    info!("Primary graph running");

    let cancel_token = CancellationToken::new();

    // Bind the transport before spawning anything, to fail fast on the port.
    let bind_addr: SocketAddr = config
        .listen_addr()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(format!("listen address: {e}")))?;
    let transport = UdpTransport::bind(
        bind_addr,
        Duration::from_secs(config.source_timeout_seconds),
        cancel_token.child_token(),
    )
    .await
    .map_err(|e| MixError::Transport(format!("bind {bind_addr}: {e}")))?;
    info!(addr = %transport.local_addr(), "Transport bound");

    let (stats, events, transport_task) = transport.split();

    // Spawn the session actor; it owns the graph from here on.
    let metrics = ConferenceMetrics::new();
    let (_handle, mut actor_task) = ConferenceActor::spawn(
        graph,
        input_node,
        config.mode,
        stats,
        events,
        cancel_token.child_token(),
        Arc::clone(&metrics),
    );

    info!("Mix Controller running - press Ctrl+C to shutdown");

    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received, initiating graceful shutdown...");
            cancel_token.cancel();

            match tokio::time::timeout(SHUTDOWN_GRACE, &mut actor_task).await {
                Ok(Ok(result)) => result?,
                Ok(Err(join_err)) => {
                    warn!(error = %join_err, "session actor did not shut down cleanly");
                }
                Err(_) => {
                    warn!("session actor did not stop within the grace period");
                    actor_task.abort();
                }
            }
        }
        joined = &mut actor_task => {
            // The session ended on its own: transport closed, or fatal error.
            cancel_token.cancel();
            match joined {
                Ok(result) => result?,
                Err(join_err) => {
                    return Err(MixError::Internal(format!("actor task failed: {join_err}")));
                }
            }
        }
    }

    let _ = transport_task.await;

    let snapshot = metrics.snapshot();
    let summary = serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string());
    info!(metrics = %summary, "Mix Controller shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
