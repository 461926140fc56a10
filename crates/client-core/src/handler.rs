use russh::{
    client,
    keys::{HashAlg, PublicKey},
};
use tracing::warn;

use crate::ClientError;

/// Client-side callbacks for the transport session.
///
/// The remote host key is accepted without verification. The fingerprint is logged
/// at `warn` so an operator can compare it out of band.
pub struct TunnelHandler {
    authority: String,
}

impl TunnelHandler {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
        }
    }
}

impl client::Handler for TunnelHandler {
    type Error = ClientError;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl std::future::Future<Output = std::result::Result<bool, Self::Error>> + Send {
        warn!(
            authority = %self.authority,
            algorithm = %server_public_key.algorithm(),
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "accepting unverified host key"
        );
        async { Ok(true) }
    }
}
