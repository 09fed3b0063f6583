#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;

const UNIVERSE: Uuid = Uuid::from_u128(0x50);
const ZONE: Uuid = Uuid::from_u128(0x40);

/// One-node GCP universe with a single access key
fn write_state(dir: &Path) -> std::path::PathBuf {
    let provider = Uuid::from_u128(0x20);
    let primary = Uuid::from_u128(0x60);
    let state = json!({
        "version": 1,
        "updated_at": "2026-01-01T00:00:00Z",
        "customers": [{ "uuid": Uuid::from_u128(0x10), "name": "test" }],
        "providers": [{
            "uuid": provider,
            "code": "gcp",
            "name": "gcp-provider",
            "customer_uuid": Uuid::from_u128(0x10),
        }],
        "regions": [{
            "uuid": Uuid::from_u128(0x30),
            "provider_uuid": provider,
            "code": "us-west1",
        }],
        "zones": [{
            "uuid": ZONE,
            "region_uuid": Uuid::from_u128(0x30),
            "code": "us-west1-a",
        }],
        "access_keys": [{
            "key_code": "test-key",
            "provider_uuid": provider,
            "key_info": {
                "private_key": "/opt/keys/test-key.pem",
                "ssh_user": "centos",
            },
        }],
        "universes": [{
            "uuid": UNIVERSE,
            "name": "cli-universe",
            "customer_uuid": Uuid::from_u128(0x10),
            "clusters": [{
                "uuid": primary,
                "cluster_type": "primary",
                "user_intent": {
                    "provider_type": "gcp",
                    "provider": provider,
                    "access_key_code": "test-key",
                },
            }],
            "nodes": [{
                "node_name": "yb-cli-n1",
                "placement_uuid": primary,
                "cloud_info": { "private_ip": "10.0.0.1" },
            }],
        }],
    });
    let path = dir.join("state.json");
    std::fs::write(&path, state.to_string()).unwrap();
    path
}

fn write_params(dir: &Path, params: serde_json::Value) -> std::path::PathBuf {
    let path = dir.join("params.json");
    std::fs::write(&path, params.to_string()).unwrap();
    path
}

fn nodeops() -> Command {
    let mut cmd = Command::cargo_bin("nodeops").unwrap();
    cmd.env_remove("NODEOPS_CONFIG_PATH").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    nodeops()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_compile_help() {
    nodeops()
        .args(["compile", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--state"))
        .stdout(predicate::str::contains("--operation"))
        .stdout(predicate::str::contains("--params"));
}

#[test]
fn test_compile_wait_for_ssh() {
    let dir = TempDir::new().unwrap();
    let state = write_state(dir.path());
    let params = write_params(
        dir.path(),
        json!({
            "kind": "Generic",
            "universe_uuid": UNIVERSE,
            "node_name": "yb-cli-n1",
            "az_uuid": ZONE,
        }),
    );

    let output = nodeops()
        .current_dir(dir.path())
        .arg("compile")
        .arg("--state")
        .arg(&state)
        .args(["--operation", "wait_for_ssh"])
        .arg("--params")
        .arg(&params)
        .output()
        .unwrap();
    assert!(output.status.success());

    let command: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let args: Vec<&str> = command["args"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a.as_str().unwrap())
        .collect();
    assert_eq!(&args[..6], ["gcp", "--region", "us-west1", "--zone", "us-west1-a", "instance"]);
    assert_eq!(args[6], "wait_for_ssh");
    assert_eq!(args.last(), Some(&"yb-cli-n1"));
    assert_eq!(command["env"]["ANSIBLE_STRATEGY"], "linear");
}

#[test]
fn test_compile_rejects_mismatched_params() {
    let dir = TempDir::new().unwrap();
    let state = write_state(dir.path());
    let params = write_params(
        dir.path(),
        json!({
            "kind": "Generic",
            "universe_uuid": UNIVERSE,
            "node_name": "yb-cli-n1",
            "az_uuid": ZONE,
        }),
    );

    nodeops()
        .current_dir(dir.path())
        .arg("compile")
        .arg("--state")
        .arg(&state)
        .args(["--operation", "create"])
        .arg("--params")
        .arg(&params)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used for operation create"));
}

#[test]
fn test_compile_missing_state() {
    let dir = TempDir::new().unwrap();
    let params = write_params(dir.path(), json!({}));
    nodeops()
        .current_dir(dir.path())
        .args(["compile", "--state", "missing.json", "--operation", "list", "--params"])
        .arg(&params)
        .assert()
        .failure()
        .stderr(predicate::str::contains("State snapshot not found"));
}

#[test]
fn test_config_prints_effective_settings() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("nodeops.yaml");
    std::fs::write(&config, "postgres_max_mem_mb: 512\n").unwrap();

    nodeops()
        .current_dir(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("postgres_max_mem_mb: 512"))
        .stdout(predicate::str::contains("strategy: linear"));
}

#[test]
fn test_create_user_help() {
    nodeops()
        .args(["create-user", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--universe"))
        .stdout(predicate::str::contains("NODEOPS_DB_PASSWORD"));
}

#[test]
fn test_create_user_unknown_universe() {
    let dir = TempDir::new().unwrap();
    let state = write_state(dir.path());

    nodeops()
        .current_dir(dir.path())
        .env("NODEOPS_DB_PASSWORD", "secret")
        .arg("create-user")
        .arg("--state")
        .arg(&state)
        .args(["--universe", &Uuid::from_u128(0x99).to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Universe 00000000-0000-0000-0000-000000000099 not found"));
}

#[test]
fn test_set_admin_password_requires_password() {
    let dir = TempDir::new().unwrap();
    let state = write_state(dir.path());

    nodeops()
        .current_dir(dir.path())
        .env_remove("NODEOPS_DB_PASSWORD")
        .arg("set-admin-password")
        .arg("--state")
        .arg(&state)
        .args(["--universe", &UNIVERSE.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--password"));
}
