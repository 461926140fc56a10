use std::{borrow::Cow, path::Path, sync::Arc, time::Duration};

use russh::{Preferred, client};
use secrecy::SecretString;
use ssh_core::Endpoint;

use crate::{ClientError, ClientResult};

/// Everything needed to authenticate one transport session.
///
/// Only borrowed by [`crate::TransportSession::connect`]; the session keeps none of it.
pub struct Credentials {
    pub remote: Endpoint,
    pub username: String,
    pub private_key: SecretString,
    pub passphrase: Option<SecretString>,
}

impl Credentials {
    /// Read the private key at `path`. Parsing is deferred to connect.
    pub async fn from_key_file(
        remote: Endpoint,
        username: impl Into<String>,
        path: &Path,
        passphrase: Option<SecretString>,
    ) -> ClientResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::KeyRead {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(bytes)
            .map_err(|_| ClientError::KeyParse(format!("{} is not a text key file", path.display())))?;
        Ok(Self {
            remote,
            username: username.into(),
            private_key: SecretString::new(text.into_boxed_str()),
            passphrase,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("remote", &self.remote)
            .field("username", &self.username)
            .field("passphrase", &self.passphrase.is_some())
            .finish_non_exhaustive()
    }
}

/// Transport tuning knobs.
#[derive(Clone, Debug)]
pub struct TransportOptions {
    pub keepalive_interval: Option<Duration>,
    pub keepalive_max: usize,
    pub inactivity_timeout: Option<Duration>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            inactivity_timeout: None,
        }
    }
}

pub(crate) fn build_client_config(options: &TransportOptions) -> Arc<client::Config> {
    let mut preferred = Preferred::DEFAULT.clone();
    preferred.compression = Cow::Owned(vec![
        russh::compression::NONE,
        russh::compression::ZLIB,
        russh::compression::ZLIB_LEGACY,
    ]);
    Arc::new(client::Config {
        preferred,
        nodelay: true,
        inactivity_timeout: options.inactivity_timeout,
        keepalive_interval: options.keepalive_interval,
        keepalive_max: options.keepalive_max,
        ..Default::default()
    })
}
