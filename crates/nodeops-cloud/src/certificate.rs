//! Certificate authority records

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const CLIENT_CERT_FILE: &str = "yugabytedb.crt";
const CLIENT_KEY_FILE: &str = "yugabytedb.key";

/// Certificate authority used for node-to-node or client-to-node encryption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateAuthority {
    pub uuid: Uuid,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub customer_uuid: Option<Uuid>,

    /// Type-specific material
    pub kind: CertificateKind,
}

/// Certificate type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertConfigType {
    SelfSigned,
    HashicorpVault,
    CustomCertHostPath,
    CustomServerCert,
}

impl std::fmt::Display for CertConfigType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertConfigType::SelfSigned => write!(f, "SelfSigned"),
            CertConfigType::HashicorpVault => write!(f, "HashicorpVault"),
            CertConfigType::CustomCertHostPath => write!(f, "CustomCertHostPath"),
            CertConfigType::CustomServerCert => write!(f, "CustomServerCert"),
        }
    }
}

/// Material held by an authority, by type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CertificateKind {
    /// Platform-generated CA; certificate and key are stored on the platform
    SelfSigned {
        certificate: PathBuf,
        private_key: PathBuf,
    },

    /// CA held in a Vault PKI engine; node certificates are issued by Vault
    HashicorpVault {
        certificate: PathBuf,
        vault: VaultReference,
    },

    /// Certificates already present on every node at fixed paths
    CustomCertHostPath {
        certificate: PathBuf,
        paths: CustomCertPaths,
    },

    /// A single server certificate shared by all nodes (client-to-node only)
    CustomServerCert {
        certificate: PathBuf,
        server_cert: PathBuf,
        server_key: PathBuf,
    },
}

/// Paths of node-held certificates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCertPaths {
    pub root_cert_path: String,
    pub node_cert_path: String,
    pub node_key_path: String,
    #[serde(default)]
    pub client_cert_path: Option<String>,
    #[serde(default)]
    pub client_key_path: Option<String>,
}

impl CustomCertPaths {
    /// Client cert/key pair, when both are set and non-empty
    pub fn client_pair(&self) -> Option<(&str, &str)> {
        match (
            self.client_cert_path.as_deref(),
            self.client_key_path.as_deref(),
        ) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => Some((cert, key)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultReference {
    pub address: String,
    pub engine: String,
    pub mount_path: String,
    pub role: String,
}

impl CertificateAuthority {
    pub fn cert_type(&self) -> CertConfigType {
        match &self.kind {
            CertificateKind::SelfSigned { .. } => CertConfigType::SelfSigned,
            CertificateKind::HashicorpVault { .. } => CertConfigType::HashicorpVault,
            CertificateKind::CustomCertHostPath { .. } => CertConfigType::CustomCertHostPath,
            CertificateKind::CustomServerCert { .. } => CertConfigType::CustomServerCert,
        }
    }

    /// Root certificate as stored on the platform
    pub fn certificate(&self) -> &Path {
        match &self.kind {
            CertificateKind::SelfSigned { certificate, .. }
            | CertificateKind::HashicorpVault { certificate, .. }
            | CertificateKind::CustomCertHostPath { certificate, .. }
            | CertificateKind::CustomServerCert { certificate, .. } => certificate,
        }
    }

    /// Platform-held client certificate stored beside the root certificate
    pub fn client_cert_file(&self) -> PathBuf {
        self.cert_dir().join(CLIENT_CERT_FILE)
    }

    pub fn client_key_file(&self) -> PathBuf {
        self.cert_dir().join(CLIENT_KEY_FILE)
    }

    fn cert_dir(&self) -> PathBuf {
        self.certificate()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}
