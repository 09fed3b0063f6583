//! State access for the compiler
//!
//! `StateStore` is the accessor interface the compiler reads cluster state
//! through. `ClusterSnapshot` is an in-memory implementation backed by a
//! `snapshot.json` file managed by `SnapshotManager`.

use crate::access_key::AccessKey;
use crate::certificate::CertificateAuthority;
use crate::error::{CloudError, Result};
use crate::provider::{AvailabilityZone, Customer, InstanceType, NodeInstance, Provider, Region};
use crate::release::{ReleaseMetadata, ReleaseResolver, YbcRelease};
use crate::universe::Universe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_BACKUP_SUFFIX: &str = "backup";

/// Read-only accessors for cluster state
pub trait StateStore: Send + Sync {
    fn universe(&self, uuid: &Uuid) -> Option<Universe>;

    fn provider(&self, uuid: &Uuid) -> Option<Provider>;

    fn region(&self, uuid: &Uuid) -> Option<Region>;

    fn availability_zone(&self, uuid: &Uuid) -> Option<AvailabilityZone>;

    fn access_key(&self, provider_uuid: &Uuid, key_code: &str) -> Option<AccessKey>;

    /// All access keys of a provider, oldest first
    fn access_keys(&self, provider_uuid: &Uuid) -> Vec<AccessKey>;

    fn certificate(&self, uuid: &Uuid) -> Option<CertificateAuthority>;

    fn node_instance_by_name(&self, node_name: &str) -> Option<NodeInstance>;

    fn node_instance(&self, uuid: &Uuid) -> Option<NodeInstance>;

    fn instance_type(&self, provider_uuid: &Uuid, code: &str) -> Option<InstanceType>;
}

/// Point-in-time copy of cluster state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Snapshot file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub customers: Vec<Customer>,

    #[serde(default)]
    pub universes: Vec<Universe>,

    #[serde(default)]
    pub providers: Vec<Provider>,

    #[serde(default)]
    pub regions: Vec<Region>,

    #[serde(default)]
    pub zones: Vec<AvailabilityZone>,

    #[serde(default)]
    pub access_keys: Vec<AccessKey>,

    #[serde(default)]
    pub certificates: Vec<CertificateAuthority>,

    #[serde(default)]
    pub node_instances: Vec<NodeInstance>,

    #[serde(default)]
    pub instance_types: Vec<InstanceType>,

    /// Database releases keyed by version
    #[serde(default)]
    pub releases: BTreeMap<String, ReleaseMetadata>,

    #[serde(default)]
    pub ybc_releases: Vec<YbcRelease>,
}

impl Default for ClusterSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            updated_at: Utc::now(),
            customers: Vec::new(),
            universes: Vec::new(),
            providers: Vec::new(),
            regions: Vec::new(),
            zones: Vec::new(),
            access_keys: Vec::new(),
            certificates: Vec::new(),
            node_instances: Vec::new(),
            instance_types: Vec::new(),
            releases: BTreeMap::new(),
            ybc_releases: Vec::new(),
        }
    }
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a universe
    pub fn set_universe(&mut self, universe: Universe) {
        self.universes.retain(|u| u.uuid != universe.uuid);
        self.universes.push(universe);
        self.updated_at = Utc::now();
    }
}

impl StateStore for ClusterSnapshot {
    fn universe(&self, uuid: &Uuid) -> Option<Universe> {
        self.universes.iter().find(|u| &u.uuid == uuid).cloned()
    }

    fn provider(&self, uuid: &Uuid) -> Option<Provider> {
        self.providers.iter().find(|p| &p.uuid == uuid).cloned()
    }

    fn region(&self, uuid: &Uuid) -> Option<Region> {
        self.regions.iter().find(|r| &r.uuid == uuid).cloned()
    }

    fn availability_zone(&self, uuid: &Uuid) -> Option<AvailabilityZone> {
        self.zones.iter().find(|z| &z.uuid == uuid).cloned()
    }

    fn access_key(&self, provider_uuid: &Uuid, key_code: &str) -> Option<AccessKey> {
        self.access_keys
            .iter()
            .find(|k| &k.provider_uuid == provider_uuid && k.key_code == key_code)
            .cloned()
    }

    fn access_keys(&self, provider_uuid: &Uuid) -> Vec<AccessKey> {
        self.access_keys
            .iter()
            .filter(|k| &k.provider_uuid == provider_uuid)
            .cloned()
            .collect()
    }

    fn certificate(&self, uuid: &Uuid) -> Option<CertificateAuthority> {
        self.certificates.iter().find(|c| &c.uuid == uuid).cloned()
    }

    fn node_instance_by_name(&self, node_name: &str) -> Option<NodeInstance> {
        self.node_instances
            .iter()
            .find(|n| n.node_name.as_deref() == Some(node_name))
            .cloned()
    }

    fn node_instance(&self, uuid: &Uuid) -> Option<NodeInstance> {
        self.node_instances.iter().find(|n| &n.uuid == uuid).cloned()
    }

    fn instance_type(&self, provider_uuid: &Uuid, code: &str) -> Option<InstanceType> {
        self.instance_types
            .iter()
            .find(|t| &t.provider_uuid == provider_uuid && t.code == code)
            .cloned()
    }
}

impl ReleaseResolver for ClusterSnapshot {
    fn release_by_version(&self, version: &str) -> Option<ReleaseMetadata> {
        self.releases.get(version).cloned()
    }

    fn ybc_release(&self, version: &str, os: &str, arch: &str) -> Option<ReleaseMetadata> {
        self.ybc_releases
            .iter()
            .find(|r| r.version == version && r.os == os && r.arch == arch)
            .map(|r| r.metadata.clone())
    }
}

/// Reads and writes snapshot files
pub struct SnapshotManager {
    path: PathBuf,
}

impl SnapshotManager {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".");
        name.push(SNAPSHOT_BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    /// Load the snapshot, or an empty one when the file does not exist
    pub async fn load(&self) -> Result<ClusterSnapshot> {
        if !self.path.exists() {
            tracing::debug!("Snapshot file not found, returning empty snapshot");
            return Ok(ClusterSnapshot::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let snapshot: ClusterSnapshot = serde_json::from_str(&content)?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(CloudError::SnapshotError(format!(
                "Snapshot file version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        tracing::debug!(
            "Loaded snapshot with {} universes from {}",
            snapshot.universes.len(),
            self.path.display()
        );
        Ok(snapshot)
    }

    /// Save the snapshot, keeping the previous file as a backup
    pub async fn save(&self, snapshot: &ClusterSnapshot) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).await?;
            }
        }

        let backup = self.backup_path();
        if self.path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&self.path, &backup).await?;
            tracing::debug!("Created snapshot backup");
        }

        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, content).await?;

        tracing::debug!("Saved snapshot with {} universes", snapshot.universes.len());
        Ok(())
    }
}
