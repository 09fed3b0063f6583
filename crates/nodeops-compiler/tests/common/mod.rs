//! Shared fixtures for compiler integration tests

#![allow(dead_code)]

use nodeops_cloud::{
    AccessKey, AvailabilityZone, CertificateAuthority, CertificateKind, CloudType, Cluster,
    ClusterSnapshot, ClusterType, Customer, CustomCertPaths, InstanceType, KeyInfo, NodeDetails,
    NodeInstance, Provider, Region, ReleaseMetadata, Universe, UserIntent, YbcRelease,
};
use nodeops_compiler::{CommandCompiler, ConfigureParams, ConfigureTask, NodeTaskParams};
use nodeops_config::RuntimeConfig;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub const CUSTOMER: Uuid = Uuid::from_u128(0x10);
pub const PROVIDER: Uuid = Uuid::from_u128(0x20);
pub const REGION: Uuid = Uuid::from_u128(0x30);
pub const ZONE: Uuid = Uuid::from_u128(0x40);
pub const UNIVERSE: Uuid = Uuid::from_u128(0x50);
pub const PRIMARY: Uuid = Uuid::from_u128(0x60);
pub const ROOT_CA: Uuid = Uuid::from_u128(0x70);
pub const CLIENT_CA: Uuid = Uuid::from_u128(0x71);
pub const NODE_INSTANCE: Uuid = Uuid::from_u128(0x80);

pub const NODE_NAME: &str = "yb-test-n1";
pub const NODE_IP: &str = "10.0.0.1";
pub const KEY_CODE: &str = "test-key";
pub const REGION_CODE: &str = "us-west-2";
pub const ZONE_CODE: &str = "us-west-2a";
pub const VERSION: &str = "2.18.0.0-b65";
pub const PACKAGE: &str = "/opt/releases/yugabyte-2.18.0.0-b65-centos-x86_64.tar.gz";

/// Cluster state of a one-node universe on a single provider
pub struct Fixture {
    pub snapshot: ClusterSnapshot,
    pub config: RuntimeConfig,
}

impl Fixture {
    pub fn new(cloud: CloudType) -> Self {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.customers.push(Customer {
            uuid: CUSTOMER,
            name: "test".to_string(),
        });
        snapshot.providers.push(Provider {
            uuid: PROVIDER,
            code: cloud,
            name: format!("{}-provider", cloud),
            customer_uuid: Some(CUSTOMER),
            yb_home: "/home/yugabyte".to_string(),
            ssh_port: 22,
        });
        snapshot.regions.push(Region {
            uuid: REGION,
            provider_uuid: PROVIDER,
            code: REGION_CODE.to_string(),
            yb_image: None,
            security_group_id: None,
            vnet_name: None,
        });
        snapshot.zones.push(AvailabilityZone {
            uuid: ZONE,
            region_uuid: REGION,
            code: ZONE_CODE.to_string(),
            subnet: Some("subnet-1".to_string()),
        });
        snapshot.access_keys.push(AccessKey {
            key_code: KEY_CODE.to_string(),
            provider_uuid: PROVIDER,
            key_info: key_info(),
            public_key_content: Some("ssh-rsa AAAA test".to_string()),
        });
        snapshot.instance_types.push(InstanceType {
            provider_uuid: PROVIDER,
            code: "c5.large".to_string(),
            mount_paths: vec!["/mnt/d0".to_string()],
        });
        snapshot.set_universe(universe(cloud));

        Self {
            snapshot,
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_intent(mut self, mut f: impl FnMut(&mut UserIntent)) -> Self {
        let mut universe = self.universe();
        for cluster in &mut universe.clusters {
            f(&mut cluster.user_intent);
        }
        self.snapshot.set_universe(universe);
        self
    }

    pub fn with_node(mut self, f: impl FnOnce(&mut NodeDetails)) -> Self {
        let mut universe = self.universe();
        if let Some(node) = universe.nodes.first_mut() {
            f(node);
        }
        self.snapshot.set_universe(universe);
        self
    }

    pub fn with_key_info(mut self, f: impl FnOnce(&mut KeyInfo)) -> Self {
        if let Some(key) = self.snapshot.access_keys.first_mut() {
            f(&mut key.key_info);
        }
        self
    }

    pub fn with_access_key(mut self, key: AccessKey) -> Self {
        self.snapshot.access_keys.push(key);
        self
    }

    pub fn with_region(mut self, f: impl FnOnce(&mut Region)) -> Self {
        if let Some(region) = self.snapshot.regions.first_mut() {
            f(region);
        }
        self
    }

    pub fn with_certificate(mut self, ca: CertificateAuthority) -> Self {
        self.snapshot.certificates.push(ca);
        self
    }

    pub fn with_release(mut self, version: &str, release: ReleaseMetadata) -> Self {
        self.snapshot.releases.insert(version.to_string(), release);
        self
    }

    pub fn with_ybc_release(mut self, release: YbcRelease) -> Self {
        self.snapshot.ybc_releases.push(release);
        self
    }

    pub fn with_node_instance(mut self, details: serde_json::Value) -> Self {
        self.snapshot.node_instances.push(NodeInstance {
            uuid: NODE_INSTANCE,
            node_name: Some(NODE_NAME.to_string()),
            details,
        });
        self
    }

    pub fn with_config(mut self, f: impl FnOnce(&mut RuntimeConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn universe(&self) -> Universe {
        self.snapshot
            .universes
            .iter()
            .find(|u| u.uuid == UNIVERSE)
            .cloned()
            .expect("fixture universe")
    }

    pub fn compiler(&self) -> CommandCompiler {
        let snapshot = Arc::new(self.snapshot.clone());
        CommandCompiler::new(snapshot.clone(), snapshot, self.config.clone())
    }
}

pub fn key_info() -> KeyInfo {
    serde_json::from_value(serde_json::json!({
        "private_key": "/opt/keys/test-key.pem",
        "public_key": "/opt/keys/test-key.pub",
        "ssh_user": "centos",
        "show_set_up_chrony": true,
    }))
    .expect("key info")
}

pub fn universe(cloud: CloudType) -> Universe {
    let intent: UserIntent = serde_json::from_value(serde_json::json!({
        "provider_type": cloud,
        "provider": PROVIDER,
        "access_key_code": KEY_CODE,
        "instance_type": "c5.large",
        "yb_software_version": VERSION,
    }))
    .expect("user intent");
    let nodes = serde_json::from_value(serde_json::json!([{
        "node_name": NODE_NAME,
        "node_uuid": Uuid::from_u128(0x90),
        "placement_uuid": PRIMARY,
        "is_master": true,
        "cloud_info": {
            "private_ip": NODE_IP,
            "cloud": cloud,
            "region": REGION_CODE,
            "az": ZONE_CODE,
        },
    }]))
    .expect("nodes");

    Universe {
        uuid: UNIVERSE,
        name: "test-universe".to_string(),
        customer_uuid: CUSTOMER,
        clusters: vec![Cluster {
            uuid: PRIMARY,
            cluster_type: ClusterType::Primary,
            user_intent: intent,
        }],
        nodes,
        config: BTreeMap::new(),
    }
}

pub fn base() -> NodeTaskParams {
    let mut base = NodeTaskParams::new(UNIVERSE, NODE_NAME, ZONE);
    base.placement_uuid = Some(PRIMARY);
    base.instance_type = Some("c5.large".to_string());
    base
}

pub fn configure(task: ConfigureTask) -> ConfigureParams {
    let mut params = ConfigureParams::new(base(), task);
    params.yb_software_version = Some(VERSION.to_string());
    params
}

/// Release available as a local package file
pub fn local_release() -> ReleaseMetadata {
    ReleaseMetadata {
        file_path: Some(PACKAGE.to_string()),
        ..Default::default()
    }
}

pub fn host_path_ca(uuid: Uuid) -> CertificateAuthority {
    CertificateAuthority {
        uuid,
        label: "host-path".to_string(),
        customer_uuid: Some(CUSTOMER),
        kind: CertificateKind::CustomCertHostPath {
            certificate: PathBuf::from("/opt/certs/ca.crt"),
            paths: CustomCertPaths {
                root_cert_path: "/etc/yb/ca.crt".to_string(),
                node_cert_path: "/etc/yb/node.crt".to_string(),
                node_key_path: "/etc/yb/node.key".to_string(),
                client_cert_path: None,
                client_key_path: None,
            },
        },
    }
}

pub fn server_cert_ca(uuid: Uuid) -> CertificateAuthority {
    CertificateAuthority {
        uuid,
        label: "server-cert".to_string(),
        customer_uuid: Some(CUSTOMER),
        kind: CertificateKind::CustomServerCert {
            certificate: PathBuf::from("/opt/certs/client-ca.crt"),
            server_cert: PathBuf::from("/opt/certs/server.crt"),
            server_key: PathBuf::from("/opt/certs/server.key"),
        },
    }
}

/// Position of `flag` in `args`
pub fn position(args: &[String], flag: &str) -> usize {
    args.iter()
        .position(|a| a == flag)
        .unwrap_or_else(|| panic!("{} not found in {:?}", flag, args))
}
