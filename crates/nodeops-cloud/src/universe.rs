//! Universe, cluster and node model

use crate::provider::CloudType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Universe config key enabling prebuilt custom machine images
pub const USE_CUSTOM_IMAGE: &str = "useCustomImage";

/// A database universe: a set of clusters and the nodes placed in them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub uuid: Uuid,

    pub name: String,

    pub customer_uuid: Uuid,

    /// Primary cluster first, read replicas after
    #[serde(default)]
    pub clusters: Vec<Cluster>,

    #[serde(default)]
    pub nodes: Vec<NodeDetails>,

    /// Universe-level settings (e.g., `useCustomImage`)
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl Universe {
    pub fn node(&self, node_name: &str) -> Option<&NodeDetails> {
        self.nodes.iter().find(|n| n.node_name == node_name)
    }

    pub fn cluster(&self, uuid: &Uuid) -> Option<&Cluster> {
        self.clusters.iter().find(|c| &c.uuid == uuid)
    }

    pub fn primary_cluster(&self) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|c| c.cluster_type == ClusterType::Primary)
    }

    /// Comma-separated `ip:rpc_port` list of the master nodes
    pub fn master_addresses(&self) -> String {
        self.nodes
            .iter()
            .filter(|n| n.is_master)
            .filter_map(|n| {
                n.cloud_info
                    .private_ip
                    .as_ref()
                    .map(|ip| format!("{}:{}", ip, n.ports.master_rpc_port))
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Software versions of all clusters that have one
    pub fn versions(&self) -> Vec<String> {
        self.clusters
            .iter()
            .filter_map(|c| c.user_intent.yb_software_version.clone())
            .collect()
    }

    pub fn use_custom_image(&self) -> bool {
        self.config
            .get(USE_CUSTOM_IMAGE)
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    Primary,
    Async,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub uuid: Uuid,

    pub cluster_type: ClusterType,

    pub user_intent: UserIntent,
}

/// What the user asked for when defining a cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIntent {
    pub provider_type: CloudType,

    /// Provider UUID
    pub provider: Uuid,

    /// Access key code used to reach nodes of this cluster
    pub access_key_code: String,

    #[serde(default)]
    pub instance_type: Option<String>,

    #[serde(default = "default_true")]
    pub enable_ysql: bool,

    #[serde(default = "default_true")]
    pub enable_ycql: bool,

    #[serde(default)]
    pub enable_yedis: bool,

    #[serde(default)]
    pub enable_node_to_node_encrypt: bool,

    #[serde(default)]
    pub enable_client_to_node_encrypt: bool,

    /// Nodes are addressed by hostname rather than IP
    #[serde(default)]
    pub use_hostname: bool,

    #[serde(default)]
    pub assign_static_public_ip: bool,

    #[serde(default)]
    pub yb_software_version: Option<String>,

    #[serde(default)]
    pub master_gflags: BTreeMap<String, String>,

    #[serde(default)]
    pub tserver_gflags: BTreeMap<String, String>,

    #[serde(default)]
    pub instance_tags: BTreeMap<String, String>,

    #[serde(default)]
    pub device_info: Option<DeviceInfo>,
}

fn default_true() -> bool {
    true
}

impl UserIntent {
    /// Device layout applying to the given node
    pub fn device_info_for_node(&self, _node: &NodeDetails) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }
}

/// A single node of a universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDetails {
    pub node_name: String,

    #[serde(default)]
    pub node_uuid: Option<Uuid>,

    /// Cluster the node is placed in
    pub placement_uuid: Uuid,

    #[serde(default)]
    pub cloud_info: CloudSpecificInfo,

    #[serde(default)]
    pub is_master: bool,

    #[serde(default = "default_true")]
    pub is_tserver: bool,

    #[serde(default)]
    pub ports: CommunicationPorts,
}

/// Cloud-side addressing of a node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudSpecificInfo {
    #[serde(default)]
    pub private_ip: Option<String>,

    #[serde(default)]
    pub secondary_private_ip: Option<String>,

    #[serde(default)]
    pub public_ip: Option<String>,

    #[serde(default)]
    pub cloud: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub az: Option<String>,

    #[serde(default)]
    pub instance_type: Option<String>,

    /// Azure data disk LUNs
    #[serde(default)]
    pub lun_indexes: Vec<u32>,
}

impl CloudSpecificInfo {
    /// Secondary private IP, ignoring the literal "null" some inventories store
    pub fn secondary_ip(&self) -> Option<&str> {
        self.secondary_private_ip
            .as_deref()
            .filter(|ip| !ip.is_empty() && *ip != "null")
    }
}

/// Storage volume type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    IO1,
    GP2,
    GP3,
    Scratch,
    Persistent,
    #[serde(rename = "StandardSSD_LRS")]
    StandardSsdLrs,
    #[serde(rename = "Premium_LRS")]
    PremiumLrs,
    #[serde(rename = "UltraSSD_LRS")]
    UltraSsdLrs,
    Local,
}

impl StorageType {
    pub fn is_iops_provisioning(&self) -> bool {
        matches!(
            self,
            StorageType::IO1 | StorageType::GP3 | StorageType::UltraSsdLrs
        )
    }

    pub fn is_throughput_provisioning(&self) -> bool {
        matches!(self, StorageType::GP3 | StorageType::UltraSsdLrs)
    }

    /// Value passed as `--volume_type`
    pub fn volume_type(&self) -> &'static str {
        match self {
            StorageType::IO1 => "io1",
            StorageType::GP2 => "gp2",
            StorageType::GP3 => "gp3",
            StorageType::Scratch => "scratch",
            StorageType::Persistent => "persistent",
            StorageType::StandardSsdLrs => "standardssd_lrs",
            StorageType::PremiumLrs => "premium_lrs",
            StorageType::UltraSsdLrs => "ultrassd_lrs",
            StorageType::Local => "local",
        }
    }
}

/// Storage layout of a node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub num_volumes: Option<u32>,

    /// Size of each volume in GB
    #[serde(default)]
    pub volume_size: Option<u32>,

    /// Comma-separated mount points (onprem)
    #[serde(default)]
    pub mount_points: Option<String>,

    #[serde(default)]
    pub storage_type: Option<StorageType>,

    #[serde(default)]
    pub disk_iops: Option<u32>,

    /// MiB/s
    #[serde(default)]
    pub throughput: Option<u32>,
}

/// Port layout of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationPorts {
    pub master_http_port: u16,
    pub master_rpc_port: u16,
    pub tserver_http_port: u16,
    pub tserver_rpc_port: u16,
    pub yql_server_http_port: u16,
    pub yql_server_rpc_port: u16,
    pub ysql_server_http_port: u16,
    pub ysql_server_rpc_port: u16,
    pub redis_server_http_port: u16,
    pub redis_server_rpc_port: u16,
    pub node_exporter_port: u16,
    pub yb_controller_rpc_port: u16,
}

impl Default for CommunicationPorts {
    fn default() -> Self {
        Self {
            master_http_port: 7000,
            master_rpc_port: 7100,
            tserver_http_port: 9000,
            tserver_rpc_port: 9100,
            yql_server_http_port: 12000,
            yql_server_rpc_port: 9042,
            ysql_server_http_port: 13000,
            ysql_server_rpc_port: 5433,
            redis_server_http_port: 11000,
            redis_server_rpc_port: 6379,
            node_exporter_port: 9300,
            yb_controller_rpc_port: 18018,
        }
    }
}
