//! Root certificate rotation
//!
//! A root CA rotation runs four configure steps across the cluster:
//! `APPEND_NEW_ROOT_CERT` adds the new root to every node's trust bundle,
//! `ROTATE_CERTS` replaces server certificates, `REMOVE_OLD_ROOT_CERT` drops
//! the old root, and `UPDATE_CERT_DIRS` points the certificate directory
//! flags at the new layout. Server-certificate-only rotations use
//! `ROTATE_CERTS` alone.

use crate::certs::{
    CERT_LOCATION_NODE, CERT_LOCATION_PLATFORM, CaRole, CertArgsRequest, CertificateResolver,
};
use crate::error::{CompileError, Result};
use crate::gflags::{CERTS_DIR, CERTS_FOR_CLIENT_DIR, certs_node_dir};
use crate::operation::{CertRotateAction, CertRotationType};
use crate::params::ConfigureParams;
use crate::scratch::ScratchSpace;
use crate::tls_toggle::filter_gflags;
use nodeops_cloud::CertificateKind;
use std::collections::BTreeMap;

/// Arguments of one rotation step, starting with `--cert_rotate_action`
///
/// `cert_request` describes the node's server certificate; `tls_gflags` is
/// the TLS flag set of the target encryption state.
pub fn cert_rotation_args(
    action: CertRotateAction,
    params: &ConfigureParams,
    resolver: &CertificateResolver<'_>,
    cert_request: &CertArgsRequest<'_>,
    tls_gflags: &BTreeMap<String, String>,
    scratch: &mut ScratchSpace,
) -> Result<Vec<String>> {
    let mut args = vec!["--cert_rotate_action".to_string(), action.to_string()];

    match action {
        CertRotateAction::AppendNewRootCert | CertRotateAction::RemoveOldRootCert => {
            if params.root_ca_rotation != CertRotationType::RootCert {
                return Err(CompileError::InvalidRotation(format!(
                    "{} is needed only when there is rootCA rotation",
                    action
                )));
            }
            let ca = resolver.authority(params.base.root_ca, CaRole::Root, params.base.universe_uuid)?;
            let (root_cert_path, certs_location) = match &ca.kind {
                CertificateKind::SelfSigned { certificate, .. }
                | CertificateKind::HashicorpVault { certificate, .. } => (
                    certificate.display().to_string(),
                    CERT_LOCATION_PLATFORM,
                ),
                CertificateKind::CustomCertHostPath { paths, .. } => {
                    (paths.root_cert_path.clone(), CERT_LOCATION_NODE)
                }
                CertificateKind::CustomServerCert { .. } => {
                    return Err(CompileError::InvalidCertType(
                        "Root certificate cannot be of type CustomServerCert".to_string(),
                    ));
                }
            };

            args.push("--root_cert_path".to_string());
            args.push(root_cert_path);
            args.push("--certs_location".to_string());
            args.push(certs_location.to_string());
            args.push("--certs_node_dir".to_string());
            args.push(certs_node_dir(cert_request.yb_home));
        }
        CertRotateAction::RotateCerts => {
            let request = CertArgsRequest {
                root_required: params.root_ca_rotation != CertRotationType::None,
                client_root_required: params.client_root_ca_rotation != CertRotationType::None,
                ..cert_request.clone()
            };
            args.extend(resolver.certificate_args(&request, scratch)?);
        }
        CertRotateAction::UpdateCertDirs => {
            let mut gflags = params.gflags.clone();
            gflags.extend(filter_gflags(tls_gflags, &[CERTS_DIR, CERTS_FOR_CLIENT_DIR]));
            args.push("--gflags".to_string());
            args.push(serde_json::to_string(&gflags)?);
            args.push("--tags".to_string());
            args.push("override_gflags".to_string());
        }
    }

    Ok(args)
}
