// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge runtime.
//!
//! Wires the SQLite user cache, the Matrix transports, and a third-party
//! adapter into a [`Bridge`], then pumps events from both networks until
//! SIGINT or SIGTERM. Each event is handled on its own task, so a slow
//! room never blocks the others.

use std::sync::Arc;
use std::time::Duration;

use marionette_bridge::{
    Bridge, BridgeDeps, BridgeSettings, HttpMediaFetcher, MemoryRoomRepository,
};
use marionette_config::model::MarionetteConfig;
use marionette_core::types::ThirdPartyEvent;
use marionette_core::{
    MarionetteError, PluginAdapter, RemoteUserStore, StorageAdapter, ThirdPartyAdapter,
};
use marionette_matrix::{MatrixDirectory, MatrixSession};
use marionette_storage::SqliteUserStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// How long in-flight event handlers may run after shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the channel between the adapter pump and the main loop.
const ADAPTER_BUFFER: usize = 64;

/// Crates whose events follow `logging.level`; everything else logs at warn.
const LOG_TARGETS: [&str; 5] = [
    "marionette",
    "marionette_bridge",
    "marionette_matrix",
    "marionette_storage",
    "marionette_config",
];

/// Loads configuration, then runs the bridge with `adapter` until a shutdown
/// signal. Startup failures are printed and the process exits with status 1.
pub async fn run_or_exit(adapter: Arc<dyn ThirdPartyAdapter>) {
    let config = match marionette_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            marionette_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config, adapter).await {
        error!(error = %e, "marionette exited with an error");
        eprintln!("marionette: {e}");
        std::process::exit(1);
    }
}

/// Runs the bridge until SIGINT or SIGTERM.
pub async fn run(
    config: MarionetteConfig,
    adapter: Arc<dyn ThirdPartyAdapter>,
) -> Result<(), MarionetteError> {
    init_tracing(&config.logging.level);
    let cancel = install_signal_handler();
    serve(config, adapter, cancel).await
}

/// Assembles the production collaborators and runs until `cancel` fires.
pub async fn serve(
    config: MarionetteConfig,
    adapter: Arc<dyn ThirdPartyAdapter>,
    cancel: CancellationToken,
) -> Result<(), MarionetteError> {
    let identity = config.identity.to_identity_pair()?;

    let users = Arc::new(SqliteUserStore::new(config.storage.clone()));
    users.initialize().await?;
    info!(path = %config.storage.database_path, "remote user cache opened");

    let session = Arc::new(MatrixSession::new(
        &config.homeserver,
        &config.puppet,
        config.bridge.event_buffer,
    )?);
    let directory = Arc::new(
        MatrixDirectory::new(&config.homeserver)?.with_member_client(session.member_client()),
    );
    let fetcher = Arc::new(HttpMediaFetcher::new(Duration::from_secs(
        config.homeserver.request_timeout_secs,
    ))?);

    let bridge = Bridge::new(BridgeDeps {
        identity,
        directory,
        session: session.clone(),
        adapter: adapter.clone(),
        users: users.clone() as Arc<dyn RemoteUserStore>,
        repository: Arc::new(MemoryRoomRepository::new()),
        fetcher,
        settings: BridgeSettings {
            max_room_repairs: config.bridge.max_room_repairs,
            status_notices: config.bridge.status_notices,
        },
    })?;

    let result = run_bridge(Arc::new(bridge), adapter.clone(), cancel).await;

    if let Err(e) = adapter.shutdown().await {
        warn!(error = %e, "adapter shutdown failed");
    }
    if let Err(e) = session.shutdown().await {
        warn!(error = %e, "puppet session shutdown failed");
    }
    if let Err(e) = users.close().await {
        warn!(error = %e, "storage close failed");
    }

    info!("marionette shutdown complete");
    result
}

/// Connects the adapter, starts the puppet session, and relays events until
/// `cancel` fires or either event source ends.
pub async fn run_bridge(
    bridge: Arc<Bridge>,
    adapter: Arc<dyn ThirdPartyAdapter>,
    cancel: CancellationToken,
) -> Result<(), MarionetteError> {
    adapter.connect().await.map_err(|e| match e {
        MarionetteError::AdapterInit { .. } => e,
        other => MarionetteError::AdapterInit {
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
    })?;
    info!(service = adapter.service_name(), "third-party adapter connected");

    let mut home_events = bridge.start().await?;
    let status_room = bridge.rooms().status_room().await?;
    info!(room_id = %status_room, "status room ready");

    let mut third_party_events = spawn_adapter_pump(adapter, cancel.clone());
    let tracker = TaskTracker::new();

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("shutdown requested");
                break Ok(());
            }
            event = home_events.recv() => {
                let Some(event) = event else {
                    warn!("puppet session event stream ended");
                    break Ok(());
                };
                let bridge = bridge.clone();
                tracker.spawn(async move {
                    bridge.handle_home_event(event).await;
                });
            }
            event = third_party_events.recv() => {
                match event {
                    Some(Ok(event)) => {
                        let bridge = bridge.clone();
                        tracker.spawn(async move {
                            handle_third_party(&bridge, event).await;
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "third-party adapter failed");
                        break Err(e);
                    }
                    None => {
                        warn!("third-party event stream ended");
                        break Ok(());
                    }
                }
            }
        }
    };

    cancel.cancel();
    tracker.close();
    if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait()).await.is_err() {
        warn!(
            pending = tracker.len(),
            "event handlers still running at shutdown"
        );
    }
    result
}

async fn handle_third_party(bridge: &Bridge, event: ThirdPartyEvent) {
    let kind = match &event {
        ThirdPartyEvent::Message(_) => "message",
        ThirdPartyEvent::JoinStatusRoom(_) => "join_status_room",
        ThirdPartyEvent::ReadReceipt { .. } => "read_receipt",
    };
    if let Err(e) = bridge.handle_third_party_event(event).await {
        error!(kind = %kind, error = %e, "failed to relay third-party event");
    }
}

/// Forwards adapter events into a channel so the main loop never drops a
/// half-finished `receive()`.
fn spawn_adapter_pump(
    adapter: Arc<dyn ThirdPartyAdapter>,
    cancel: CancellationToken,
) -> mpsc::Receiver<Result<ThirdPartyEvent, MarionetteError>> {
    let (tx, rx) = mpsc::channel(ADAPTER_BUFFER);
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = adapter.receive() => event,
            };
            let failed = event.is_err();
            if tx.send(event).await.is_err() || failed {
                break;
            }
        }
        debug!("adapter pump stopped");
    });
    rx
}

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler; only Ctrl+C stops the bridge");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
    });

    token
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={log_level}"))
            .chain(std::iter::once("warn".to_string()))
            .collect::<Vec<_>>()
            .join(",");
        EnvFilter::new(directives)
    });

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
