use std::sync::Arc;

use russh::{
    client,
    keys::{PrivateKey, PrivateKeyWithHashAlg},
};
use tracing::{debug, info, warn};

use crate::{ClientError, ClientResult};

/// Public-key authentication with a single identity.
///
/// RSA keys are signed with the best hash the server advertises.
pub(crate) async fn authenticate_public_key<H>(
    session: &mut client::Handle<H>,
    username: &str,
    key: Arc<PrivateKey>,
) -> ClientResult<()>
where
    H: client::Handler + Send,
{
    let hash_alg = if key.algorithm().is_rsa() {
        session.best_supported_rsa_hash().await.unwrap_or(None).flatten()
    } else {
        None
    };
    debug!(key = %key.algorithm(), ?hash_alg, "attempting public-key auth");

    let result = session
        .authenticate_publickey(username.to_string(), PrivateKeyWithHashAlg::new(key, hash_alg))
        .await?;
    if result.success() {
        info!(user = %username, "authentication succeeded");
        Ok(())
    } else {
        warn!(user = %username, "public key rejected by server");
        Err(ClientError::AuthFailed(format!("public key for {username} was rejected")))
    }
}
