//! Providers, regions and zones

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_YB_HOME: &str = "/home/yugabyte";
const DEFAULT_SSH_PORT: u16 = 22;

/// Infrastructure type a provider runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudType {
    Aws,
    Gcp,
    Azu,
    Docker,
    Onprem,
    Kubernetes,
    Other,
}

impl CloudType {
    /// Provider code as understood by the provisioning executor
    pub fn code(&self) -> &'static str {
        match self {
            CloudType::Aws => "aws",
            CloudType::Gcp => "gcp",
            CloudType::Azu => "azu",
            CloudType::Docker => "docker",
            CloudType::Onprem => "onprem",
            CloudType::Kubernetes => "kubernetes",
            CloudType::Other => "other",
        }
    }

    /// Whether instances of this provider can carry user tags
    pub fn instance_tags_enabled(&self) -> bool {
        matches!(self, CloudType::Aws | CloudType::Gcp | CloudType::Azu)
    }

    /// Public clouds get a default NTP setup when none is configured
    pub fn is_public_cloud(&self) -> bool {
        matches!(self, CloudType::Aws | CloudType::Gcp | CloudType::Azu)
    }
}

impl std::fmt::Display for CloudType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for CloudType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(CloudType::Aws),
            "gcp" => Ok(CloudType::Gcp),
            "azu" => Ok(CloudType::Azu),
            "docker" => Ok(CloudType::Docker),
            "onprem" => Ok(CloudType::Onprem),
            "kubernetes" => Ok(CloudType::Kubernetes),
            "other" => Ok(CloudType::Other),
            other => Err(format!("unknown cloud type: {}", other)),
        }
    }
}

/// Cloud provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub uuid: Uuid,

    /// Infrastructure type
    pub code: CloudType,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Owning customer
    #[serde(default)]
    pub customer_uuid: Option<Uuid>,

    /// Home directory of the database user on provisioned nodes
    #[serde(default = "default_yb_home")]
    pub yb_home: String,

    /// SSH port used when the access key does not override it
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

fn default_yb_home() -> String {
    DEFAULT_YB_HOME.to_string()
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// Provider region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub uuid: Uuid,

    pub provider_uuid: Uuid,

    /// Region code (e.g., "us-west-2")
    pub code: String,

    /// Default machine image for the region
    #[serde(default)]
    pub yb_image: Option<String>,

    /// Custom security group applied to new instances
    #[serde(default)]
    pub security_group_id: Option<String>,

    /// Azure virtual network name
    #[serde(default)]
    pub vnet_name: Option<String>,
}

/// Availability zone within a region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityZone {
    pub uuid: Uuid,

    pub region_uuid: Uuid,

    /// Zone code (e.g., "us-west-2a")
    pub code: String,

    #[serde(default)]
    pub subnet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub uuid: Uuid,

    #[serde(default)]
    pub name: String,
}

/// Instance type catalogue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceType {
    pub provider_uuid: Uuid,

    pub code: String,

    /// Mount paths of the instance's volumes, in order
    #[serde(default)]
    pub mount_paths: Vec<String>,
}

/// Registered on-premises machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    pub uuid: Uuid,

    /// Name of the node currently occupying this machine
    #[serde(default)]
    pub node_name: Option<String>,

    /// Free-form machine details forwarded to the executor as metadata
    #[serde(default)]
    pub details: serde_json::Value,
}

impl NodeInstance {
    pub fn details_json(&self) -> String {
        if self.details.is_null() {
            "{}".to_string()
        } else {
            self.details.to_string()
        }
    }
}
