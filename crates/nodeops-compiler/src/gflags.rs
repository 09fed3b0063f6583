//! Server process flags
//!
//! Builds the platform-managed flag set (`--extra_gflags`), the TLS flag
//! subset used by the toggle and rotation protocols, the backup controller
//! flags, and merges user overrides on top.

use crate::error::{CompileError, Result};
use crate::operation::ProcessType;
use nodeops_cloud::{NodeDetails, Universe, UserIntent};
use std::collections::BTreeMap;

pub const USE_NODE_TO_NODE_ENCRYPTION: &str = "use_node_to_node_encryption";
pub const USE_CLIENT_TO_SERVER_ENCRYPTION: &str = "use_client_to_server_encryption";
pub const ALLOW_INSECURE_CONNECTIONS: &str = "allow_insecure_connections";
pub const CERTS_DIR: &str = "certs_dir";
pub const CERTS_FOR_CLIENT_DIR: &str = "certs_for_client_dir";
pub const VERIFY_SERVER_ENDPOINT_GFLAG: &str = "verify_server_endpoint";

pub const UNDEFOK: &str = "undefok";
pub const YSQL_PG_CONF_CSV: &str = "ysql_pg_conf_csv";
pub const YSQL_HBA_CONF_CSV: &str = "ysql_hba_conf_csv";

const CSV_GFLAGS: [&str; 3] = [UNDEFOK, YSQL_PG_CONF_CSV, YSQL_HBA_CONF_CSV];

/// Platform flags users may not override unless explicitly allowed
const GFLAGS_FORBIDDEN_TO_OVERRIDE: [&str; 13] = [
    "placement_cloud",
    "placement_region",
    "placement_zone",
    "placement_uuid",
    "master_addresses",
    "tserver_master_addrs",
    "rpc_bind_addresses",
    "server_broadcast_addresses",
    "fs_data_dirs",
    "webserver_port",
    USE_NODE_TO_NODE_ENCRYPTION,
    USE_CLIENT_TO_SERVER_ENCRYPTION,
    CERTS_DIR,
];

const CERTS_NODE_SUBDIR: &str = "yugabyte-tls-config";
const CERTS_CLIENT_SUBDIR: &str = "yugabyte-client-tls-config";

/// Node-side directory of node-to-node certificates
pub fn certs_node_dir(yb_home: &str) -> String {
    format!("{}/{}", yb_home, CERTS_NODE_SUBDIR)
}

/// Node-side directory of client-to-node certificates
pub fn certs_for_client_dir(yb_home: &str) -> String {
    format!("{}/{}", yb_home, CERTS_CLIENT_SUBDIR)
}

/// Target encryption-in-transit state of a node
#[derive(Debug, Clone, Copy)]
pub struct TlsState {
    pub node_to_node: bool,
    pub client_to_node: bool,
    pub allow_insecure: bool,
    pub root_and_client_root_ca_same: bool,
}

impl TlsState {
    fn any(&self) -> bool {
        self.node_to_node || self.client_to_node
    }
}

/// TLS flags describing `tls`
pub fn certs_and_tls_gflags(tls: &TlsState, yb_home: &str) -> BTreeMap<String, String> {
    let mut gflags = BTreeMap::new();
    gflags.insert(
        USE_NODE_TO_NODE_ENCRYPTION.to_string(),
        tls.node_to_node.to_string(),
    );
    gflags.insert(
        USE_CLIENT_TO_SERVER_ENCRYPTION.to_string(),
        tls.client_to_node.to_string(),
    );
    let allow_insecure = if tls.any() { tls.allow_insecure } else { true };
    gflags.insert(
        ALLOW_INSECURE_CONNECTIONS.to_string(),
        allow_insecure.to_string(),
    );
    if tls.node_to_node || (tls.root_and_client_root_ca_same && tls.client_to_node) {
        gflags.insert(CERTS_DIR.to_string(), certs_node_dir(yb_home));
    }
    if !tls.root_and_client_root_ca_same && tls.client_to_node {
        gflags.insert(CERTS_FOR_CLIENT_DIR.to_string(), certs_for_client_dir(yb_home));
    }
    gflags
}

/// Inputs of [`default_gflags`]
pub struct DefaultGFlagsContext<'a> {
    pub universe: &'a Universe,
    pub node: &'a NodeDetails,
    pub intent: &'a UserIntent,
    pub process: ProcessType,
    pub tls: TlsState,
    pub use_hostname: bool,
    pub yb_home: &'a str,
    /// Comma-separated data mount points
    pub mount_points: Option<String>,
}

/// Platform-managed base flags of a server process
pub fn default_gflags(ctx: &DefaultGFlagsContext<'_>) -> BTreeMap<String, String> {
    let node = ctx.node;
    let ports = &node.ports;
    let ip = node.cloud_info.private_ip.clone().unwrap_or_default();
    let mut gflags = BTreeMap::new();

    if let Some(cloud) = &node.cloud_info.cloud {
        gflags.insert("placement_cloud".to_string(), cloud.clone());
    }
    if let Some(region) = &node.cloud_info.region {
        gflags.insert("placement_region".to_string(), region.clone());
    }
    if let Some(az) = &node.cloud_info.az {
        gflags.insert("placement_zone".to_string(), az.clone());
    }
    gflags.insert(
        "placement_uuid".to_string(),
        node.placement_uuid.to_string(),
    );
    gflags.insert("max_log_size".to_string(), "256".to_string());
    gflags.insert(UNDEFOK.to_string(), "enable_ysql".to_string());
    gflags.insert("metric_node_name".to_string(), node.node_name.clone());
    gflags.insert("webserver_interface".to_string(), ip.clone());

    if let Some(mount_points) = &ctx.mount_points {
        gflags.insert("fs_data_dirs".to_string(), mount_points.clone());
    }

    let master_addresses = ctx.universe.master_addresses();
    match ctx.process {
        ProcessType::Master => {
            gflags.insert("master_addresses".to_string(), master_addresses);
            gflags.insert(
                "rpc_bind_addresses".to_string(),
                format!("{}:{}", ip, ports.master_rpc_port),
            );
            gflags.insert(
                "webserver_port".to_string(),
                ports.master_http_port.to_string(),
            );
            if ctx.use_hostname {
                gflags.insert(
                    "server_broadcast_addresses".to_string(),
                    format!("{}:{}", ip, ports.master_rpc_port),
                );
            }
        }
        ProcessType::TServer | ProcessType::Controller => {
            gflags.insert("tserver_master_addrs".to_string(), master_addresses);
            gflags.insert(
                "rpc_bind_addresses".to_string(),
                format!("{}:{}", ip, ports.tserver_rpc_port),
            );
            gflags.insert(
                "webserver_port".to_string(),
                ports.tserver_http_port.to_string(),
            );
            if ctx.use_hostname {
                gflags.insert(
                    "server_broadcast_addresses".to_string(),
                    format!("{}:{}", ip, ports.tserver_rpc_port),
                );
            }
            gflags.insert(
                "start_redis_proxy".to_string(),
                ctx.intent.enable_yedis.to_string(),
            );
            if ctx.intent.enable_yedis {
                gflags.insert(
                    "redis_proxy_bind_address".to_string(),
                    format!("{}:{}", ip, ports.redis_server_rpc_port),
                );
            }
            gflags.insert(
                "start_cql_proxy".to_string(),
                ctx.intent.enable_ycql.to_string(),
            );
            if ctx.intent.enable_ycql {
                gflags.insert(
                    "cql_proxy_bind_address".to_string(),
                    format!("{}:{}", ip, ports.yql_server_rpc_port),
                );
            }
            gflags.insert("enable_ysql".to_string(), ctx.intent.enable_ysql.to_string());
            if ctx.intent.enable_ysql {
                gflags.insert(
                    "pgsql_proxy_bind_address".to_string(),
                    format!("{}:{}", ip, ports.ysql_server_rpc_port),
                );
            }
        }
    }

    gflags.extend(certs_and_tls_gflags(&ctx.tls, ctx.yb_home));
    gflags
}

/// Flags of the backup controller process
pub fn ybc_flags(node: &NodeDetails, tls: &TlsState, yb_home: &str) -> BTreeMap<String, String> {
    let ip = node.cloud_info.private_ip.clone().unwrap_or_default();
    let mut flags = BTreeMap::new();
    flags.insert("server_address".to_string(), ip.clone());
    flags.insert(
        "server_port".to_string(),
        node.ports.yb_controller_rpc_port.to_string(),
    );
    flags.insert("log_dir".to_string(), format!("{}/controller/logs", yb_home));
    flags.insert("yb_tserver_address".to_string(), ip.clone());
    flags.insert("yb_master_address".to_string(), ip);
    flags.insert(
        "yb_admin".to_string(),
        format!("{}/tserver/bin/yb-admin", yb_home),
    );
    flags.insert(
        "ysqlsh".to_string(),
        format!("{}/tserver/bin/ysqlsh", yb_home),
    );
    if tls.node_to_node {
        flags.insert("certs_dir_name".to_string(), certs_node_dir(yb_home));
    }
    flags
}

/// Merge user flags with the platform flag set
///
/// CSV-valued flags are merged entry by entry, user entries first. Unless
/// `allow_override` is set, a user value for a platform-managed flag must
/// match the platform value.
pub fn process_user_gflags(
    node: &NodeDetails,
    user_gflags: &mut BTreeMap<String, String>,
    platform_gflags: &BTreeMap<String, String>,
    allow_override: bool,
) -> Result<()> {
    for flag in CSV_GFLAGS {
        if let (Some(user), Some(platform)) = (user_gflags.get(flag), platform_gflags.get(flag)) {
            let merged = merge_csv(user, platform);
            user_gflags.insert(flag.to_string(), merged);
        }
    }

    if allow_override {
        return Ok(());
    }

    for flag in GFLAGS_FORBIDDEN_TO_OVERRIDE {
        if let (Some(user), Some(platform)) = (user_gflags.get(flag), platform_gflags.get(flag)) {
            if user != platform {
                tracing::debug!(
                    "Node {}: user value for {} conflicts with platform value",
                    node.node_name,
                    flag
                );
                return Err(CompileError::GFlagConflict {
                    flag: flag.to_string(),
                    user_value: user.clone(),
                    platform_value: platform.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Whether `gflags` disables server endpoint verification
pub fn should_skip_server_endpoint_verification(gflags: &BTreeMap<String, String>) -> bool {
    gflags
        .get(VERIFY_SERVER_ENDPOINT_GFLAG)
        .is_some_and(|v| v.eq_ignore_ascii_case("false"))
}

fn merge_csv(first: &str, second: &str) -> String {
    let mut entries = split_csv(first);
    for entry in split_csv(second) {
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    entries.join(",")
}

/// Split on commas outside double quotes
fn split_csv(value: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => {
                let entry = current.trim();
                if !entry.is_empty() {
                    entries.push(entry.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let entry = current.trim();
    if !entry.is_empty() {
        entries.push(entry.to_string());
    }
    entries
}
