pub mod config;

use anyhow::{Context, Result, bail};
use client_core::{Credentials, TransportSession};
use relay_core::{DrainResult, RequestRouter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::RelayConfig;

pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}

/// Establish the transport, serve until a shutdown signal, then drain and disconnect.
pub async fn run_relay(config: RelayConfig) -> Result<()> {
    let RelayConfig {
        remote,
        key_path,
        key_passphrase,
        username,
        listen,
        transport,
        router,
    } = config;

    let session = {
        let credentials = Credentials::from_key_file(remote, username, &key_path, key_passphrase).await?;
        TransportSession::connect(&credentials, &transport)
            .await
            .with_context(|| format!("unable to establish transport session to {}", credentials.remote))?
    };

    let listener = match RequestRouter::<TransportSession>::bind(listen).await {
        Ok(listener) => listener,
        Err(err) => {
            session.close().await;
            return Err(err.into());
        }
    };

    let router = RequestRouter::new(session.clone(), router);
    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone());

    let outcome = router.serve(listener, shutdown).await;
    session.close().await;
    match outcome {
        DrainResult::Complete => {
            info!("relay stopped");
            Ok(())
        }
        DrainResult::Timeout { remaining } => bail!("drain timed out with {remaining} connection(s) still open"),
    }
}

fn install_signal_handlers(shutdown: CancellationToken) {
    let on_interrupt = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received SIGINT, shutting down");
                on_interrupt.cancel();
            }
            Err(err) => error!(error = %err, "failed to listen for SIGINT"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM, shutting down");
                shutdown.cancel();
            }
            Err(err) => error!(error = %err, "failed to listen for SIGTERM"),
        }
    });
}
