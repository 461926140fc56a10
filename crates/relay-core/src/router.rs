//! Accept loop: every inbound request gets its own logical channel.

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use http::{Request, Response};
use http_body::Body;
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use ssh_core::{ChannelOpener, Endpoint};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Semaphore,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::{RelayError, RelayResult, ResponseBody},
    lifecycle::{DrainResult, Lifecycle},
    proxy::ChannelProxy,
};

#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Endpoint every channel is opened to, as seen from the remote host.
    pub target: Endpoint,
    /// Bound on concurrently open channels; `None` admits everything.
    pub max_channels: Option<usize>,
    pub drain_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            target: Endpoint::new("127.0.0.1", 8200),
            max_channels: None,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Dispatches inbound HTTP requests onto channels of a shared session.
pub struct RequestRouter<S> {
    session: Arc<S>,
    target: Arc<Endpoint>,
    gate: Option<Arc<Semaphore>>,
    lifecycle: Arc<Lifecycle>,
    drain_timeout: Duration,
}

impl<S> Clone for RequestRouter<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            target: Arc::clone(&self.target),
            gate: self.gate.clone(),
            lifecycle: Arc::clone(&self.lifecycle),
            drain_timeout: self.drain_timeout,
        }
    }
}

impl<S: ChannelOpener> RequestRouter<S> {
    pub fn new(session: Arc<S>, config: RouterConfig) -> Self {
        Self {
            session,
            target: Arc::new(config.target),
            gate: config.max_channels.map(|permits| Arc::new(Semaphore::new(permits))),
            lifecycle: Lifecycle::new(),
            drain_timeout: config.drain_timeout,
        }
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    pub async fn bind(address: SocketAddr) -> RelayResult<TcpListener> {
        TcpListener::bind(address)
            .await
            .map_err(|source| RelayError::Bind { address, source })
    }

    /// Accept connections until `shutdown` fires, then drain.
    ///
    /// Each connection runs on its own task; in-flight requests are allowed to
    /// finish within the drain timeout.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> DrainResult {
        match listener.local_addr() {
            Ok(local) => info!(listen = %local, target = %self.target, "relay listening"),
            Err(err) => warn!(error = %err, "relay listening on unknown address"),
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let Some(guard) = self.lifecycle.track_connection() else {
                            break;
                        };
                        let router = self.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            router.serve_connection(stream, peer, shutdown).await;
                            drop(guard);
                        });
                    }
                    Err(err) => warn!(error = %err, "accept failed"),
                },
            }
        }

        drop(listener);
        self.lifecycle.begin_drain();
        info!(
            active_connections = self.lifecycle.active_connections(),
            timeout_secs = self.drain_timeout.as_secs(),
            "stopped accepting, draining"
        );
        let result = self.lifecycle.drain(self.drain_timeout).await;
        self.lifecycle.mark_stopped();
        result
    }

    async fn serve_connection(self, stream: TcpStream, peer: SocketAddr, shutdown: CancellationToken) {
        if let Err(err) = stream.set_nodelay(true) {
            debug!(%peer, error = %err, "failed to set TCP_NODELAY");
        }
        debug!(%peer, "connection accepted");

        let router = self.clone();
        let service = service_fn(move |request: Request<Incoming>| {
            let router = router.clone();
            async move { Ok::<_, Infallible>(router.handle_request(request).await) }
        });
        let mut builder = http1::Builder::new();
        builder.preserve_header_case(true);
        let connection = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => {
                if let Err(err) = result {
                    debug!(%peer, error = %err, "connection closed with error");
                }
            }
            _ = shutdown.cancelled() => {
                connection.as_mut().graceful_shutdown();
                if let Err(err) = connection.await {
                    debug!(%peer, error = %err, "connection closed with error during drain");
                }
            }
        }
        debug!(%peer, "connection finished");
    }

    /// Relay one request: open a channel, hand it to a [`ChannelProxy`].
    ///
    /// A channel open failure yields a `500` text response and nothing is sent.
    pub async fn handle_request<B>(&self, request: Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        debug!(method = %request.method(), uri = %request.uri(), "relaying request");

        let permit = match &self.gate {
            Some(gate) => Arc::clone(gate).acquire_owned().await.ok(),
            None => None,
        };

        let channel = match self.session.open_channel(&self.target).await {
            Ok(channel) => channel,
            Err(source) => {
                let err = RelayError::channel_open(&self.target, source);
                warn!(error = %err, "channel open failed");
                return err.to_response();
            }
        };

        ChannelProxy::new(channel).with_permit(permit).handle(request).await
    }
}
