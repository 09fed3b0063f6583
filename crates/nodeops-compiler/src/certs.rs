//! Certificate path resolution
//!
//! Node-to-node encryption uses the root CA, client-to-node encryption the
//! client root CA (which may be the same authority). For every authority
//! the executor needs a root certificate, a server certificate and key, and
//! whether those live on the platform host or already on the node.
//!
//! Platform-held authorities (`SelfSigned`, `HashicorpVault`) get a fresh
//! server certificate per node, issued into a scratch directory that is
//! removed with the owning [`ScratchSpace`].

use crate::error::{CompileError, Result};
use crate::gflags::{certs_for_client_dir, certs_node_dir};
use crate::scratch::ScratchSpace;
use crate::skip_cert::{SkipCertValidation, skip_cert_validation_args};
use nodeops_cloud::{CertConfigType, CertificateAuthority, CertificateKind, StateStore};
use rcgen::{
    CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, SanType,
};
use std::net::IpAddr;
use std::path::Path;
use uuid::Uuid;

/// Certificates already present on the node
pub const CERT_LOCATION_NODE: &str = "node";
/// Certificates copied from the platform host
pub const CERT_LOCATION_PLATFORM: &str = "platform";

const CLIENT_TO_SERVER_SUFFIX: &str = "_client_to_server";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectAltName {
    Dns(String),
    Ip(IpAddr),
}

/// Subject of a per-node server certificate
#[derive(Debug, Clone)]
pub struct ServerCertRequest {
    pub common_name: String,
    pub subject_alt_names: Vec<SubjectAltName>,
}

impl ServerCertRequest {
    pub fn cert_file(&self) -> String {
        format!("node.{}.crt", self.common_name)
    }

    pub fn key_file(&self) -> String {
        format!("node.{}.key", self.common_name)
    }
}

/// Issues server certificates signed by a platform-held authority
pub trait CertificateIssuer: Send + Sync {
    /// Write `request.cert_file()` and `request.key_file()` into `dir`
    fn issue(
        &self,
        ca: &CertificateAuthority,
        request: &ServerCertRequest,
        dir: &Path,
    ) -> Result<()>;
}

/// Signs with the CA key stored on the platform host
///
/// Handles `SelfSigned` authorities. Vault-held authorities need an issuer
/// that talks to the Vault PKI engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalIssuer;

impl CertificateIssuer for LocalIssuer {
    fn issue(
        &self,
        ca: &CertificateAuthority,
        request: &ServerCertRequest,
        dir: &Path,
    ) -> Result<()> {
        let (certificate, private_key) = match &ca.kind {
            CertificateKind::SelfSigned {
                certificate,
                private_key,
            } => (certificate, private_key),
            CertificateKind::HashicorpVault { vault, .. } => {
                return Err(CompileError::Certificate(format!(
                    "authority {} is held by Vault at {}; no Vault issuer configured",
                    ca.uuid, vault.address
                )));
            }
            _ => {
                return Err(CompileError::InvalidCertType(format!(
                    "cannot issue server certificates from {} authority {}",
                    ca.cert_type(),
                    ca.uuid
                )));
            }
        };

        let ca_cert_pem = std::fs::read_to_string(certificate)?;
        let ca_key_pem = std::fs::read_to_string(private_key)?;
        let ca_key = KeyPair::from_pem(&ca_key_pem)?;
        let ca_cert = CertificateParams::from_ca_cert_pem(&ca_cert_pem)?.self_signed(&ca_key)?;

        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params
            .distinguished_name
            .push(DnType::CommonName, request.common_name.as_str());
        for san in &request.subject_alt_names {
            match san {
                SubjectAltName::Dns(name) => params
                    .subject_alt_names
                    .push(SanType::DnsName(name.clone().try_into()?)),
                SubjectAltName::Ip(ip) => params.subject_alt_names.push(SanType::IpAddress(*ip)),
            }
        }
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];

        let key = KeyPair::generate()?;
        let cert = params.signed_by(&key, &ca_cert, &ca_key)?;

        std::fs::write(dir.join(request.cert_file()), cert.pem())?;
        std::fs::write(dir.join(request.key_file()), key.serialize_pem())?;
        tracing::debug!(
            "Issued server certificate for {} from {}",
            request.common_name,
            ca.uuid
        );
        Ok(())
    }
}

/// Which encryption an authority serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaRole {
    Root,
    ClientRoot,
}

impl CaRole {
    fn describe(&self) -> &'static str {
        match self {
            CaRole::Root => "rootCA",
            CaRole::ClientRoot => "clientRootCA",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            CaRole::Root => "",
            CaRole::ClientRoot => CLIENT_TO_SERVER_SUFFIX,
        }
    }
}

/// Paths handed to the executor for one authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPathSet {
    pub root_cert_path: String,
    pub server_cert_path: String,
    pub server_key_path: String,
    pub certs_location: &'static str,
}

impl CertPathSet {
    fn push_args(&self, role: CaRole, args: &mut Vec<String>) {
        let suffix = role.suffix();
        args.push(format!("--root_cert_path{}", suffix));
        args.push(self.root_cert_path.clone());
        args.push(format!("--server_cert_path{}", suffix));
        args.push(self.server_cert_path.clone());
        args.push(format!("--server_key_path{}", suffix));
        args.push(self.server_key_path.clone());
        args.push(format!("--certs_location{}", suffix));
        args.push(self.certs_location.to_string());
    }
}

/// What the certificate section of a configure command needs
#[derive(Debug, Clone)]
pub struct CertArgsRequest<'a> {
    pub universe_uuid: Uuid,
    pub root_ca: Option<Uuid>,
    pub client_root_ca: Option<Uuid>,
    pub root_required: bool,
    pub client_root_required: bool,
    /// Root CA also serves client-to-node encryption
    pub root_serves_clients: bool,
    pub server: &'a ServerCertRequest,
    pub yb_home: &'a str,
    pub skip: SkipCertValidation,
}

/// Resolves authorities to executor certificate arguments
pub struct CertificateResolver<'a> {
    store: &'a dyn StateStore,
    issuer: &'a dyn CertificateIssuer,
}

impl<'a> CertificateResolver<'a> {
    pub fn new(store: &'a dyn StateStore, issuer: &'a dyn CertificateIssuer) -> Self {
        Self { store, issuer }
    }

    /// Look up an authority, failing with `MissingCert`
    pub fn authority(
        &self,
        uuid: Option<Uuid>,
        role: CaRole,
        universe_uuid: Uuid,
    ) -> Result<CertificateAuthority> {
        uuid.and_then(|id| self.store.certificate(&id)).ok_or_else(|| {
            CompileError::MissingCert(format!(
                "no valid {} found for {}",
                role.describe(),
                universe_uuid
            ))
        })
    }

    /// Paths of `ca` for the given role
    pub fn resolve_paths(
        &self,
        ca: &CertificateAuthority,
        role: CaRole,
        server: &ServerCertRequest,
        scratch: &mut ScratchSpace,
    ) -> Result<CertPathSet> {
        match &ca.kind {
            CertificateKind::SelfSigned { .. } | CertificateKind::HashicorpVault { .. } => {
                let prefix = if ca.cert_type() == CertConfigType::SelfSigned {
                    format!("SelfSigned{}", ca.uuid)
                } else {
                    format!("Hashicorp{}", ca.uuid)
                };
                let dir = scratch.create_dir(&prefix)?;
                self.issuer.issue(ca, server, &dir)?;
                Ok(CertPathSet {
                    root_cert_path: path_string(ca.certificate()),
                    server_cert_path: path_string(&dir.join(server.cert_file())),
                    server_key_path: path_string(&dir.join(server.key_file())),
                    certs_location: CERT_LOCATION_PLATFORM,
                })
            }
            CertificateKind::CustomCertHostPath { paths, .. } => Ok(CertPathSet {
                root_cert_path: paths.root_cert_path.clone(),
                server_cert_path: paths.node_cert_path.clone(),
                server_key_path: paths.node_key_path.clone(),
                certs_location: CERT_LOCATION_NODE,
            }),
            CertificateKind::CustomServerCert {
                certificate,
                server_cert,
                server_key,
            } => match role {
                CaRole::Root => Err(CompileError::InvalidCertType(
                    "rootCA cannot be of type CustomServerCert".to_string(),
                )),
                CaRole::ClientRoot => Ok(CertPathSet {
                    root_cert_path: path_string(certificate),
                    server_cert_path: path_string(server_cert),
                    server_key_path: path_string(server_key),
                    certs_location: CERT_LOCATION_PLATFORM,
                }),
            },
        }
    }

    /// Certificate section of a configure command
    pub fn certificate_args(
        &self,
        request: &CertArgsRequest<'_>,
        scratch: &mut ScratchSpace,
    ) -> Result<Vec<String>> {
        let mut args = Vec::new();

        if request.root_required {
            args.push("--certs_node_dir".to_string());
            args.push(certs_node_dir(request.yb_home));

            let ca = self.authority(request.root_ca, CaRole::Root, request.universe_uuid)?;
            let paths = self.resolve_paths(&ca, CaRole::Root, request.server, scratch)?;
            if request.root_serves_clients {
                if let Some((cert, key)) = legacy_client_pair(&ca) {
                    args.push("--client_cert_path".to_string());
                    args.push(cert);
                    args.push("--client_key_path".to_string());
                    args.push(key);
                }
            }
            paths.push_args(CaRole::Root, &mut args);
        }

        if request.client_root_required {
            args.push("--certs_client_dir".to_string());
            args.push(certs_for_client_dir(request.yb_home));

            let ca = self.authority(
                request.client_root_ca,
                CaRole::ClientRoot,
                request.universe_uuid,
            )?;
            let paths = self.resolve_paths(&ca, CaRole::ClientRoot, request.server, scratch)?;
            paths.push_args(CaRole::ClientRoot, &mut args);
        }

        args.extend(skip_cert_validation_args(request.skip));
        Ok(args)
    }

    /// Host paths a precheck should verify
    ///
    /// Only `CustomCertHostPath` authorities are checked; the client root CA
    /// only when it differs from the root CA.
    pub fn precheck_args(
        &self,
        root_ca: Option<Uuid>,
        client_root_ca: Option<Uuid>,
        node_to_node: bool,
        universe_uuid: Uuid,
    ) -> Result<Vec<String>> {
        let mut args = Vec::new();
        let same = client_root_ca.is_none() || client_root_ca == root_ca;

        self.push_paths_to_check(
            &mut args,
            root_ca,
            CaRole::Root,
            same && node_to_node,
            universe_uuid,
        )?;
        if !same {
            self.push_paths_to_check(
                &mut args,
                client_root_ca,
                CaRole::ClientRoot,
                false,
                universe_uuid,
            )?;
        }
        Ok(args)
    }

    fn push_paths_to_check(
        &self,
        args: &mut Vec<String>,
        uuid: Option<Uuid>,
        role: CaRole,
        with_client_paths: bool,
        universe_uuid: Uuid,
    ) -> Result<()> {
        if uuid.is_none() {
            return Ok(());
        }
        let ca = self.authority(uuid, role, universe_uuid)?;
        let CertificateKind::CustomCertHostPath { paths, .. } = &ca.kind else {
            return Ok(());
        };

        let suffix = role.suffix();
        args.push(format!("--root_cert_path{}", suffix));
        args.push(paths.root_cert_path.clone());
        args.push(format!("--server_cert_path{}", suffix));
        args.push(paths.node_cert_path.clone());
        args.push(format!("--server_key_path{}", suffix));
        args.push(paths.node_key_path.clone());
        if with_client_paths {
            if let Some((cert, key)) = paths.client_pair() {
                args.push("--client_cert_path".to_string());
                args.push(cert.to_string());
                args.push("--client_key_path".to_string());
                args.push(key.to_string());
            }
        }
        Ok(())
    }
}

/// Client certificate pair kept for nodes that predate separate client CAs
fn legacy_client_pair(ca: &CertificateAuthority) -> Option<(String, String)> {
    match &ca.kind {
        CertificateKind::SelfSigned { .. } | CertificateKind::HashicorpVault { .. } => Some((
            path_string(&ca.client_cert_file()),
            path_string(&ca.client_key_file()),
        )),
        CertificateKind::CustomCertHostPath { paths, .. } => paths
            .client_pair()
            .map(|(cert, key)| (cert.to_string(), key.to_string())),
        CertificateKind::CustomServerCert { .. } => None,
    }
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}
