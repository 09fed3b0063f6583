//! Access keys used to reach provisioned nodes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An access key registered for a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKey {
    pub key_code: String,

    pub provider_uuid: Uuid,

    pub key_info: KeyInfo,

    /// Public key content, when the key was uploaded rather than generated
    #[serde(default)]
    pub public_key_content: Option<String>,
}

impl AccessKey {
    /// Public key content, empty when none is stored
    pub fn public_key_content(&self) -> &str {
        self.public_key_content.as_deref().unwrap_or("")
    }
}

/// Key material and node setup toggles of an access key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Path of the public key file
    #[serde(default)]
    pub public_key: Option<String>,

    /// Path of the private key file
    #[serde(default)]
    pub private_key: Option<String>,

    #[serde(default)]
    pub vault_file: Option<String>,

    #[serde(default)]
    pub vault_password_file: Option<String>,

    #[serde(default)]
    pub ssh_user: Option<String>,

    #[serde(default)]
    pub ssh_port: Option<u16>,

    /// Nodes have no internet access; packages come from local mirrors
    #[serde(default)]
    pub air_gap_install: bool,

    /// Nodes are provisioned manually; only configure runs against them
    #[serde(default)]
    pub skip_provisioning: bool,

    #[serde(default)]
    pub set_up_chrony: bool,

    /// The provider was created after NTP setup became configurable
    #[serde(default)]
    pub show_set_up_chrony: bool,

    #[serde(default)]
    pub ntp_servers: Vec<String>,

    #[serde(default)]
    pub install_node_exporter: bool,

    #[serde(default = "default_node_exporter_port")]
    pub node_exporter_port: u16,

    #[serde(default = "default_node_exporter_user")]
    pub node_exporter_user: String,
}

fn default_node_exporter_port() -> u16 {
    9300
}

fn default_node_exporter_user() -> String {
    "prometheus".to_string()
}

impl Default for KeyInfo {
    fn default() -> Self {
        Self {
            public_key: None,
            private_key: None,
            vault_file: None,
            vault_password_file: None,
            ssh_user: None,
            ssh_port: None,
            air_gap_install: false,
            skip_provisioning: false,
            set_up_chrony: false,
            show_set_up_chrony: false,
            ntp_servers: Vec::new(),
            install_node_exporter: false,
            node_exporter_port: default_node_exporter_port(),
            node_exporter_user: default_node_exporter_user(),
        }
    }
}
