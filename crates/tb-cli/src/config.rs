use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use client_core::TransportOptions;
use relay_core::RouterConfig;
use secrecy::SecretString;
use ssh_core::{Endpoint, endpoint::DEFAULT_SSH_PORT};

#[derive(Debug, Parser)]
#[command(name = "tb-relay", about = "Relay local HTTP requests through an SSH tunnel")]
pub struct RelayArgs {
    /// SSH server as host[:port]; the port defaults to 22
    #[arg(long, env = "VAULT_SERVER", value_name = "HOST[:PORT]")]
    server: String,
    /// Private key used for public-key authentication
    #[arg(long = "key-path", env = "KEY_PATH", value_name = "PATH")]
    key_path: PathBuf,
    /// Passphrase for an encrypted private key
    #[arg(long = "key-passphrase", env = "KEY_PASSPHRASE", value_name = "PASSPHRASE", hide_env_values = true)]
    key_passphrase: Option<String>,
    /// SSH login name (defaults to the current user)
    #[arg(short = 'l', long, env = "TUNNEL_USER", value_name = "USER")]
    username: Option<String>,
    /// Local address to accept HTTP requests on
    #[arg(long, env = "TUNNEL_LISTEN", value_name = "ADDR", default_value = "0.0.0.0:8200")]
    listen: SocketAddr,
    /// Endpoint each request is tunneled to, as seen from the SSH server
    #[arg(long, env = "TUNNEL_TARGET", value_name = "HOST:PORT", default_value = "127.0.0.1:8200")]
    target: String,
    /// Upper bound on concurrently open tunnel channels (unbounded if unset)
    #[arg(long = "max-channels", env = "TUNNEL_MAX_CHANNELS", value_name = "COUNT")]
    max_channels: Option<usize>,
    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long = "drain-timeout", env = "TUNNEL_DRAIN_TIMEOUT", value_name = "SECONDS", default_value_t = 30)]
    drain_timeout: u64,
    /// Send SSH keepalives every N seconds; 0 disables them
    #[arg(long = "keepalive-interval", env = "TUNNEL_KEEPALIVE", value_name = "SECONDS", default_value_t = 30)]
    keepalive_interval: u64,
}

impl RelayArgs {
    pub fn parse_config() -> Result<RelayConfig> {
        let args = RelayArgs::parse();
        RelayConfig::try_from(args)
    }
}

/// Validated startup configuration.
#[derive(Debug)]
pub struct RelayConfig {
    pub remote: Endpoint,
    pub key_path: PathBuf,
    pub key_passphrase: Option<SecretString>,
    pub username: String,
    pub listen: SocketAddr,
    pub transport: TransportOptions,
    pub router: RouterConfig,
}

impl TryFrom<RelayArgs> for RelayConfig {
    type Error = anyhow::Error;

    fn try_from(args: RelayArgs) -> Result<Self> {
        let RelayArgs {
            server,
            key_path,
            key_passphrase,
            username,
            listen,
            target,
            max_channels,
            drain_timeout,
            keepalive_interval,
        } = args;

        let remote = Endpoint::parse_with_default(&server, DEFAULT_SSH_PORT).context("invalid --server")?;
        let target: Endpoint = target.parse().context("invalid --target")?;
        if max_channels == Some(0) {
            bail!("--max-channels must be greater than zero");
        }

        let username = username
            .filter(|name| !name.is_empty())
            .or_else(fallback_username)
            .ok_or_else(|| anyhow!("unable to determine username; use --username or TUNNEL_USER"))?;

        let transport = TransportOptions {
            keepalive_interval: (keepalive_interval > 0).then(|| Duration::from_secs(keepalive_interval)),
            ..TransportOptions::default()
        };

        Ok(Self {
            remote,
            key_path,
            key_passphrase: key_passphrase.map(|p| SecretString::new(p.into_boxed_str())),
            username,
            listen,
            transport,
            router: RouterConfig {
                target,
                max_channels,
                drain_timeout: Duration::from_secs(drain_timeout),
            },
        })
    }
}

fn fallback_username() -> Option<String> {
    for key in ["USER", "LOGNAME", "USERNAME"] {
        if let Ok(value) = env::var(key)
            && !value.is_empty()
        {
            return Some(value);
        }
    }
    let current = whoami::username();
    if current.is_empty() { None } else { Some(current) }
}
