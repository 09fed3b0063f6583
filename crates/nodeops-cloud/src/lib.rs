//! nodeops cluster state
//!
//! This crate holds the read-only view of cluster state that the node
//! command compiler works against: universes and their nodes, providers,
//! regions, access keys, certificate authorities and release metadata.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                nodeops-compiler                  │
//! │        (compile / execute node operations)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │ accessor calls
//! ┌─────────────────▼───────────────────────────────┐
//! │                 nodeops-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait StateStore / trait ReleaseResolver │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────────────┐     │
//! │  │    Model     │  │  Snapshot (JSON) Mgmt │     │
//! │  └──────────────┘  └──────────────────────┘     │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod access_key;
pub mod certificate;
pub mod error;
pub mod provider;
pub mod release;
pub mod state;
pub mod universe;

// Re-exports
pub use access_key::{AccessKey, KeyInfo};
pub use certificate::{
    CertConfigType, CertificateAuthority, CertificateKind, CustomCertPaths, VaultReference,
};
pub use error::{CloudError, Result};
pub use provider::{
    AvailabilityZone, CloudType, Customer, InstanceType, NodeInstance, Provider, Region,
};
pub use release::{
    GcsLocation, HttpLocation, PackagePaths, ReleaseMetadata, ReleaseResolver, S3Location,
    YbcRelease,
};
pub use state::{ClusterSnapshot, SnapshotManager, StateStore};
pub use universe::{
    CloudSpecificInfo, Cluster, ClusterType, CommunicationPorts, DeviceInfo, NodeDetails,
    StorageType, Universe, UserIntent,
};
