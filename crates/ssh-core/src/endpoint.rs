//! `host:port` addresses for the SSH remote and tunneled targets.

use std::{fmt, str::FromStr};

use crate::error::{SshCoreError, SshResult};

/// Default SSH port applied when a remote address omits one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A host and port pair. IPv6 literals are stored without brackets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Parse `host:port` or `[v6]:port`; a bare host takes `default_port`.
    pub fn parse_with_default(spec: &str, default_port: u16) -> SshResult<Self> {
        let (host, port) = split_host_port(spec)?;
        Ok(Self {
            host,
            port: port.unwrap_or(default_port),
        })
    }
}

impl FromStr for Endpoint {
    type Err = SshCoreError;

    /// Strict form: the port is required.
    fn from_str(spec: &str) -> SshResult<Self> {
        match split_host_port(spec)? {
            (host, Some(port)) => Ok(Self { host, port }),
            (_, None) => Err(SshCoreError::invalid_endpoint(spec, "expected host:port")),
        }
    }
}

fn split_host_port(spec: &str) -> SshResult<(String, Option<u16>)> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(SshCoreError::invalid_endpoint(spec, "must not be empty"));
    }

    let (host, port) = if let Some(rest) = trimmed.strip_prefix('[') {
        let (inner, tail) = rest
            .split_once(']')
            .ok_or_else(|| SshCoreError::invalid_endpoint(spec, "unterminated '[' in IPv6 literal"))?;
        let port = match tail {
            "" => None,
            tail => match tail.strip_prefix(':') {
                Some(port) => Some(parse_port(port)?),
                None => return Err(SshCoreError::invalid_endpoint(spec, "expected ':' after ']'")),
            },
        };
        (inner.to_string(), port)
    } else {
        match trimmed.rsplit_once(':') {
            // More than one colon without brackets is a bare IPv6 address.
            Some((host, _)) if host.contains(':') => (trimmed.to_string(), None),
            Some((host, port)) => (host.to_string(), Some(parse_port(port)?)),
            None => (trimmed.to_string(), None),
        }
    };

    if host.trim().is_empty() {
        return Err(SshCoreError::invalid_endpoint(spec, "host must not be empty"));
    }
    Ok((host, port))
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(value: &str) -> SshResult<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| SshCoreError::InvalidPort(value.to_string()))
}
