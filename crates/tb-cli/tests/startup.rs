//! Startup failures of the `tb-relay` binary. All of them happen before the
//! listen port is bound.

use std::{io::Write, net::TcpListener, time::Duration};

use predicates::prelude::*;
use russh::keys::{
    Algorithm, PrivateKey,
    ssh_key::{LineEnding, rand_core::OsRng},
};
use tempfile::NamedTempFile;

fn relay() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo_bin_cmd!("tb-relay");
    for key in [
        "VAULT_SERVER",
        "KEY_PATH",
        "KEY_PASSPHRASE",
        "TUNNEL_LISTEN",
        "TUNNEL_TARGET",
        "TUNNEL_MAX_CHANNELS",
        "TUNNEL_DRAIN_TIMEOUT",
        "TUNNEL_KEEPALIVE",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("TUNNEL_USER", "startup-test").timeout(Duration::from_secs(10));
    cmd
}

fn free_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .unwrap()
}

fn port_is_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

#[test]
fn missing_key_file_exits_before_binding() {
    let listen_port = free_port();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("id_missing");

    relay()
        .env("VAULT_SERVER", format!("127.0.0.1:{}", free_port()))
        .env("KEY_PATH", &missing)
        .args(["--listen", &format!("127.0.0.1:{listen_port}")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read private key"))
        .stderr(predicate::str::contains("id_missing"));

    assert!(port_is_free(listen_port), "listen port must never have been bound");
}

#[test]
fn malformed_key_file_is_rejected() {
    let mut key = NamedTempFile::new().unwrap();
    key.write_all(b"this is not a private key\n").unwrap();

    relay()
        .args(["--server", &format!("127.0.0.1:{}", free_port())])
        .arg("--key-path")
        .arg(key.path())
        .args(["--listen", &format!("127.0.0.1:{}", free_port())])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse private key"));
}

#[test]
fn unreachable_server_is_fatal() {
    let generated = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
    let mut key = NamedTempFile::new().unwrap();
    key.write_all(generated.to_openssh(LineEnding::LF).unwrap().as_bytes()).unwrap();
    let listen_port = free_port();

    relay()
        .args(["--server", &format!("127.0.0.1:{}", free_port())])
        .arg("--key-path")
        .arg(key.path())
        .args(["--listen", &format!("127.0.0.1:{listen_port}")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unable to establish transport session"));

    assert!(port_is_free(listen_port));
}

#[test]
fn server_is_required() {
    relay()
        .args(["--key-path", "/nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--server"));
}
