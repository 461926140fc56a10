use std::{env, net::SocketAddr, path::PathBuf, sync::Mutex, time::Duration};

use anyhow::{Result, anyhow};
use clap::Parser;
use secrecy::ExposeSecret;
use serial_test::serial;
use ssh_core::Endpoint;
use tb_cli::config::{RelayArgs, RelayConfig};

static ENV_GUARD: Mutex<()> = Mutex::new(());

const RELAY_ENV: [&str; 9] = [
    "VAULT_SERVER",
    "KEY_PATH",
    "KEY_PASSPHRASE",
    "TUNNEL_USER",
    "TUNNEL_LISTEN",
    "TUNNEL_TARGET",
    "TUNNEL_MAX_CHANNELS",
    "TUNNEL_DRAIN_TIMEOUT",
    "TUNNEL_KEEPALIVE",
];

#[test]
#[serial]
fn defaults_apply_when_only_server_and_key_are_given() {
    let cfg = parse_config(&["--server", "bastion.internal", "--key-path", "/keys/id_ed25519"]).expect("minimal config");

    assert_eq!(cfg.remote, Endpoint::new("bastion.internal", 22));
    assert_eq!(cfg.key_path, PathBuf::from("/keys/id_ed25519"));
    assert!(cfg.key_passphrase.is_none());
    assert_eq!(cfg.username, "cli-test");
    assert_eq!(cfg.listen, "0.0.0.0:8200".parse::<SocketAddr>().unwrap());
    assert_eq!(cfg.router.target, Endpoint::new("127.0.0.1", 8200));
    assert_eq!(cfg.router.max_channels, None);
    assert_eq!(cfg.router.drain_timeout, Duration::from_secs(30));
    assert_eq!(cfg.transport.keepalive_interval, Some(Duration::from_secs(30)));
}

#[test]
#[serial]
fn environment_supplies_settings() {
    let cfg = parse_config_with_env(
        &[],
        &[
            ("VAULT_SERVER", Some("vault.internal:2222")),
            ("KEY_PATH", Some("/etc/tunnel/key")),
            ("KEY_PASSPHRASE", Some("hunter2")),
            ("TUNNEL_LISTEN", Some("127.0.0.1:9200")),
            ("TUNNEL_TARGET", Some("10.0.0.5:8200")),
            ("TUNNEL_MAX_CHANNELS", Some("16")),
            ("TUNNEL_DRAIN_TIMEOUT", Some("5")),
        ],
    )
    .expect("env config");

    assert_eq!(cfg.remote, Endpoint::new("vault.internal", 2222));
    assert_eq!(cfg.key_path, PathBuf::from("/etc/tunnel/key"));
    assert_eq!(cfg.key_passphrase.as_ref().map(|p| p.expose_secret()), Some("hunter2"));
    assert_eq!(cfg.listen.port(), 9200);
    assert_eq!(cfg.router.target, Endpoint::new("10.0.0.5", 8200));
    assert_eq!(cfg.router.max_channels, Some(16));
    assert_eq!(cfg.router.drain_timeout, Duration::from_secs(5));
}

#[test]
#[serial]
fn flags_override_environment() {
    let cfg = parse_config_with_env(
        &["--server", "[fe80::1]:2200", "--username", "ops"],
        &[("VAULT_SERVER", Some("ignored:22")), ("KEY_PATH", Some("/k"))],
    )
    .expect("flag override");

    assert_eq!(cfg.remote, Endpoint::new("fe80::1", 2200));
    assert_eq!(cfg.username, "ops");
}

#[test]
#[serial]
fn keepalive_zero_disables_keepalive() {
    let cfg = parse_config(&["--server", "h", "--key-path", "/k", "--keepalive-interval", "0"]).expect("keepalive");
    assert_eq!(cfg.transport.keepalive_interval, None);
}

#[test]
#[serial]
fn invalid_values_are_rejected() {
    match parse_config(&["--server", "h", "--key-path", "/k", "--max-channels", "0"]) {
        Err(err) => assert!(err.to_string().contains("greater than zero"), "unexpected error: {err:?}"),
        Ok(cfg) => panic!("expected max-channels error, got {:?}", cfg.router),
    }
    match parse_config(&["--server", "h", "--key-path", "/k", "--target", "no-port"]) {
        Err(err) => assert!(err.to_string().contains("--target"), "unexpected error: {err:?}"),
        Ok(cfg) => panic!("expected target error, got {:?}", cfg.router),
    }
    match parse_config(&["--server", "h:70000", "--key-path", "/k"]) {
        Err(err) => assert!(err.to_string().contains("--server"), "unexpected error: {err:?}"),
        Ok(cfg) => panic!("expected server error, got {:?}", cfg.remote),
    }
    assert!(parse_config(&["--key-path", "/k"]).is_err(), "server is required");
    assert!(parse_config(&["--server", "h"]).is_err(), "key path is required");
}

fn parse_config(args: &[&str]) -> Result<RelayConfig> {
    parse_config_with_env(args, &[])
}

fn parse_config_with_env(args: &[&str], overrides: &[(&str, Option<&str>)]) -> Result<RelayConfig> {
    with_clean_env(|| {
        for (key, value) in overrides {
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }
        let mut argv = vec!["tb-relay"];
        argv.extend_from_slice(args);
        let cli = RelayArgs::try_parse_from(&argv).map_err(|err| anyhow!(err.to_string()))?;
        RelayConfig::try_from(cli)
    })
}

fn with_clean_env<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_GUARD.lock().expect("env guard poisoned");
    let previous: Vec<_> = RELAY_ENV.iter().map(|key| (*key, env::var_os(key))).collect();
    unsafe {
        for key in RELAY_ENV {
            env::remove_var(key);
        }
        env::set_var("TUNNEL_USER", "cli-test");
    }
    let result = f();
    for (key, value) in previous {
        match value {
            Some(value) => unsafe { env::set_var(key, value) },
            None => unsafe { env::remove_var(key) },
        }
    }
    result
}
