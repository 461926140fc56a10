use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use russh::{Disconnect, client};
use secrecy::ExposeSecret;
use ssh_core::{ChannelOpener, Endpoint, LogicalChannel, SshCoreError, SshResult, keys::parse_private_key};
use tracing::{debug, info, warn};

use crate::{
    ClientError, ClientResult, Credentials, TransportOptions, auth::authenticate_public_key, config::build_client_config,
    handler::TunnelHandler,
};

// Reported to the remote as the originator of every direct-tcpip channel.
const ORIGINATOR_HOST: &str = "127.0.0.1";
const ORIGINATOR_PORT: u32 = 0;

/// One authenticated SSH connection that carries every logical channel.
///
/// Channel opens only need `&self`, so the session is shared behind an `Arc`
/// across all request tasks.
pub struct TransportSession {
    handle: client::Handle<TunnelHandler>,
    remote: Endpoint,
    username: String,
    closed: AtomicBool,
}

impl TransportSession {
    /// Parse the key, dial the remote and authenticate. No retries.
    pub async fn connect(credentials: &Credentials, options: &TransportOptions) -> ClientResult<Arc<Self>> {
        let key = parse_private_key(
            credentials.private_key.expose_secret().as_bytes(),
            credentials.passphrase.as_ref().map(|p| p.expose_secret()),
        )?;

        let remote = credentials.remote.clone();
        let address = remote.to_string();
        info!(remote = %address, user = %credentials.username, "connecting transport session");

        let config = build_client_config(options);
        let handler = TunnelHandler::new(address.clone());
        let mut handle = client::connect(config, (remote.host.as_str(), remote.port), handler)
            .await
            .map_err(|err| ClientError::Connect {
                address: address.clone(),
                reason: err.to_string(),
            })?;

        authenticate_public_key(&mut handle, &credentials.username, Arc::new(key)).await?;
        info!(remote = %address, "transport session established");

        Ok(Arc::new(Self {
            handle,
            remote,
            username: credentials.username.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    /// True once `close` ran or the connection went away underneath us.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.handle.is_closed()
    }

    /// Disconnect the transport. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(remote = %self.remote, "closing transport session");
        if let Err(err) = self
            .handle
            .disconnect(Disconnect::ByApplication, "relay shutting down", "en")
            .await
        {
            warn!(?err, "transport disconnect failed");
        }
    }
}

#[async_trait]
impl ChannelOpener for TransportSession {
    async fn open_channel(&self, target: &Endpoint) -> SshResult<LogicalChannel> {
        if self.is_closed() {
            return Err(SshCoreError::TransportClosed);
        }
        let channel = self
            .handle
            .channel_open_direct_tcpip(target.host.clone(), target.port.into(), ORIGINATOR_HOST, ORIGINATOR_PORT)
            .await
            .map_err(|err| SshCoreError::channel_open(target, err))?;
        debug!(%target, channel = ?channel.id(), "logical channel opened");
        Ok(LogicalChannel::new(target.clone(), channel.into_stream()))
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("remote", &self.remote)
            .field("username", &self.username)
            .field("closed", &self.is_closed())
            .finish()
    }
}
