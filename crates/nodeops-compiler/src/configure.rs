//! Configure command
//!
//! Installs software, rewrites flags and rotates certificates on a node.
//! Every configure command carries the master addresses, package location,
//! the node's ports and, last, the platform's base flag set as
//! `--extra_gflags`; task-specific `--gflags` override that base set.

use crate::cert_rotation::cert_rotation_args;
use crate::certs::{CertArgsRequest, CertificateResolver, ServerCertRequest, SubjectAltName};
use crate::command::SensitiveArgs;
use crate::compiler::{CommandCompiler, NodeContext, vm_image_args};
use crate::error::{CompileError, Result};
use crate::gflags::{
    DefaultGFlagsContext, TlsState, certs_and_tls_gflags, default_gflags, process_user_gflags,
    ybc_flags,
};
use crate::operation::{CertRotateAction, ProcessType};
use crate::params::{ConfigureParams, ConfigureTask};
use crate::scratch::ScratchSpace;
use crate::skip_cert::resolve_skip_cert_validation;
use crate::tls_toggle::{TlsTogglePhase, round1_gflags, round2_gflags};
use nodeops_cloud::{CloudType, DeviceInfo, NodeDetails, ReleaseMetadata};
use regex::Regex;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::LazyLock;

static YBC_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.+ybc(.*).tar.gz$").expect("valid ybc package pattern")
});

static SERVER_PACKAGE_PLATFORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.+-([a-z0-9]+)-(x86_64|aarch64)\.tar\.gz$")
        .expect("valid server package pattern")
});

/// Server package and where it is downloaded from
struct ServerPackage {
    path: String,
    source_args: Vec<String>,
}

/// Resolved backup controller install
struct YbcInstall {
    package: String,
    dir: String,
    flags: BTreeMap<String, String>,
}

impl YbcInstall {
    fn args(&self) -> Result<Vec<String>> {
        Ok(vec![
            "--ybc_flags".to_string(),
            serde_json::to_string(&self.flags)?,
            "--configure_ybc".to_string(),
            "--ybc_package".to_string(),
            self.package.clone(),
            "--ybc_dir".to_string(),
            self.dir.clone(),
        ])
    }
}

impl CommandCompiler {
    pub(crate) fn configure_args(
        &self,
        ctx: &NodeContext,
        p: &ConfigureParams,
        scratch: &mut ScratchSpace,
    ) -> Result<Vec<String>> {
        let node = ctx.node(&p.base.node_name).ok_or_else(|| {
            CompileError::missing(format!(
                "node {} in universe {}",
                p.base.node_name, ctx.universe.name
            ))
        })?;
        let yb_home = ctx.provider.yb_home.as_str();
        let mut args = Vec::new();

        let master_addresses = ctx.universe.master_addresses();
        if master_addresses.is_empty() {
            tracing::warn!(
                "No valid masters found during configure for {}.",
                ctx.universe.uuid
            );
        }
        args.push("--master_addresses_for_tserver".to_string());
        args.push(master_addresses.clone());
        if !p.is_master_in_shell_mode {
            args.push("--master_addresses_for_master".to_string());
            args.push(master_addresses);
        }

        let package = self.server_package(p, &ctx.region.code);
        if let Some(package) = &package {
            args.extend(package.source_args.iter().cloned());
        }

        let tls = TlsState {
            node_to_node: p.enable_node_to_node_encrypt,
            client_to_node: p.enable_client_to_node_encrypt,
            allow_insecure: p.allow_insecure,
            root_and_client_root_ca_same: p.root_and_client_root_ca_same,
        };

        let ybc = if p.enable_ybc {
            Some(self.ybc_install(p, package.as_ref(), node, &tls, yb_home, &ctx.region.code)?)
        } else {
            None
        };

        if ctx.cloud() == CloudType::Aws {
            if let Some(path) = p.itest_s3_package_path.as_deref().filter(|s| !s.is_empty()) {
                args.push("--itest_s3_package_path".to_string());
                args.push(path.to_string());
            }
        }

        let ports = &node.ports;
        for (flag, port) in [
            ("--master_http_port", ports.master_http_port),
            ("--master_rpc_port", ports.master_rpc_port),
            ("--tserver_http_port", ports.tserver_http_port),
            ("--tserver_rpc_port", ports.tserver_rpc_port),
            ("--cql_proxy_rpc_port", ports.yql_server_rpc_port),
            ("--redis_proxy_rpc_port", ports.redis_server_rpc_port),
        ] {
            args.push(flag.to_string());
            args.push(port.to_string());
        }

        if !matches!(p.task, ConfigureTask::Software { .. }) {
            args.extend(vm_image_args(
                &ctx.universe,
                ctx.cloud(),
                p.vm_upgrade,
                !p.ignore_use_custom_image_config,
            ));
        }

        let use_hostname = uses_hostname(ctx, node);
        let server = server_cert_request(node, use_hostname)?;
        let skip = resolve_skip_cert_validation(
            self.config.skip_cert_validation.as_deref(),
            &ctx.intent,
            &p.gflags,
            &p.gflags_to_remove,
        );
        let cert_request = CertArgsRequest {
            universe_uuid: p.base.universe_uuid,
            root_ca: p.base.root_ca,
            client_root_ca: p.base.client_root_ca,
            root_required: p.root_ca_required(),
            client_root_required: p.client_root_ca_required(),
            root_serves_clients: p.root_and_client_root_ca_same && p.enable_client_to_node_encrypt,
            server: &server,
            yb_home,
            skip,
        };
        let resolver = CertificateResolver::new(self.store.as_ref(), self.issuer.as_ref());

        let platform_gflags = default_gflags(&DefaultGFlagsContext {
            universe: &ctx.universe,
            node,
            intent: &ctx.intent,
            process: p.task.process(),
            tls,
            use_hostname,
            yb_home,
            mount_points: data_mount_points(
                p.base.device_info.as_ref().or(ctx.intent.device_info.as_ref()),
            ),
        });
        let num_releases_to_keep = self
            .config
            .releases
            .num_releases_to_keep(self.config.cloud_enabled)
            .to_string();

        match p.task {
            ConfigureTask::Everything { .. } => {
                let package = required_package(package.as_ref(), p)?;
                args.push("--package".to_string());
                args.push(package.to_string());
                if let Some(ybc) = &ybc {
                    args.extend(ybc.args()?);
                }
                args.push("--num_releases_to_keep".to_string());
                args.push(num_releases_to_keep);
                if p.any_encryption() {
                    args.extend(resolver.certificate_args(&cert_request, scratch)?);
                }
            }
            ConfigureTask::Software { process, sub_task } => {
                let package = required_package(package.as_ref(), p)?;
                args.push("--package".to_string());
                args.push(package.to_string());
                if process == ProcessType::Controller {
                    if let Some(ybc) = &ybc {
                        args.extend(ybc.args()?);
                    }
                } else {
                    push_process_type(&mut args, process);
                }
                args.push("--tags".to_string());
                args.push(sub_task.tag().to_string());
                args.push("--num_releases_to_keep".to_string());
                args.push(num_releases_to_keep);
            }
            ConfigureTask::GFlags { process } => {
                if process == ProcessType::Controller {
                    if let Some(ybc) = &ybc {
                        args.extend(ybc.args()?);
                    }
                } else {
                    push_process_type(&mut args, process);
                }
                if p.any_encryption() {
                    args.extend(resolver.certificate_args(&cert_request, scratch)?);
                }

                let mut gflags = p.gflags.clone();
                if !self.config.cloud_enabled {
                    process_user_gflags(
                        node,
                        &mut gflags,
                        &platform_gflags,
                        self.config.gflags.allow_user_override,
                    )?;
                }
                args.push("--gflags".to_string());
                args.push(serde_json::to_string(&gflags)?);
                args.push("--tags".to_string());
                args.push("override_gflags".to_string());
            }
            ConfigureTask::Certs { process, action } => {
                if !push_process_handling(&mut args, process, ybc.as_ref())? {
                    let target_tls = certs_and_tls_gflags(&tls, yb_home);
                    args.extend(cert_rotation_args(
                        action,
                        p,
                        &resolver,
                        &cert_request,
                        &target_tls,
                        scratch,
                    )?);
                }
            }
            ConfigureTask::ToggleTls { process, phase } => {
                if !push_process_handling(&mut args, process, ybc.as_ref())? {
                    let target_tls = certs_and_tls_gflags(&tls, yb_home);
                    match phase {
                        TlsTogglePhase::CopyCerts => {
                            if p.any_encryption() {
                                args.push("--cert_rotate_action".to_string());
                                args.push(CertRotateAction::RotateCerts.to_string());
                            }
                            args.extend(resolver.certificate_args(&cert_request, scratch)?);
                        }
                        TlsTogglePhase::Round1GFlagsUpdate => {
                            let gflags =
                                round1_gflags(&p.gflags, p.node_to_node_change, &target_tls);
                            push_override_gflags(&mut args, &gflags)?;
                        }
                        TlsTogglePhase::Round2GFlagsUpdate => {
                            let gflags =
                                round2_gflags(&p.gflags, p.node_to_node_change, &target_tls);
                            push_override_gflags(&mut args, &gflags)?;
                        }
                    }
                }
            }
        }

        args.push("--extra_gflags".to_string());
        args.push(serde_json::to_string(&platform_gflags)?);
        Ok(args)
    }

    /// Credentials needed to download the server package
    pub(crate) fn release_sensitive_args(&self, p: &ConfigureParams) -> SensitiveArgs {
        let mut sensitive = SensitiveArgs::new();
        let Some(release) = self.release(p) else {
            return sensitive;
        };
        if let Some(s3) = &release.s3 {
            sensitive.insert("--aws_access_key", s3.access_key_id.clone());
            sensitive.insert("--aws_secret_key", s3.secret_access_key.clone());
        } else if let Some(gcs) = &release.gcs {
            sensitive.insert("--gcs_credentials_json", gcs.credentials_json.clone());
        }
        sensitive
    }

    fn release(&self, p: &ConfigureParams) -> Option<ReleaseMetadata> {
        let version = p.yb_software_version.as_deref()?;
        let release = self.releases.release_by_version(version);
        if release.is_none() {
            tracing::debug!("No release metadata for version {}", version);
        }
        release
    }

    fn server_package(&self, p: &ConfigureParams, region_code: &str) -> Option<ServerPackage> {
        let release = self.release(p)?;
        let (path, source_args) = if let Some(s3) = &release.s3 {
            (
                s3.paths.x86_64.clone(),
                vec!["--s3_remote_download".to_string()],
            )
        } else if let Some(gcs) = &release.gcs {
            (
                gcs.paths.x86_64.clone(),
                vec!["--gcs_remote_download".to_string()],
            )
        } else if let Some(http) = &release.http {
            let mut source_args = vec!["--http_remote_download".to_string()];
            if let Some(checksum) = &http.paths.x86_64_checksum {
                source_args.push("--http_package_checksum".to_string());
                source_args.push(checksum.clone());
            }
            (http.paths.x86_64.clone(), source_args)
        } else {
            (release.file_path(Some(region_code))?, Vec::new())
        };
        Some(ServerPackage { path, source_args })
    }

    fn ybc_install(
        &self,
        p: &ConfigureParams,
        package: Option<&ServerPackage>,
        node: &NodeDetails,
        tls: &TlsState,
        yb_home: &str,
        region_code: &str,
    ) -> Result<YbcInstall> {
        let package = package.ok_or_else(|| {
            CompileError::missing(
                "server package is required to pick the backup controller platform",
            )
        })?;
        let (os, arch) = package_platform(&package.path)?;
        let version = p.ybc_software_version.as_deref().ok_or_else(|| {
            CompileError::missing("backup controller version is not set")
        })?;
        let release = self.releases.ybc_release(version, &os, &arch).ok_or_else(|| {
            CompileError::missing(format!(
                "backup controller release {} for {}-{}",
                version, os, arch
            ))
        })?;
        let ybc_package = release
            .file_path(Some(region_code))
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                CompileError::missing("backup controller package cannot be empty with ybc enabled")
            })?;
        let captures = YBC_PACKAGE.captures(&ybc_package).ok_or_else(|| {
            CompileError::InvalidParameter(format!(
                "ybc package {} does not follow the format required: {}",
                ybc_package,
                YBC_PACKAGE.as_str()
            ))
        })?;
        let dir = format!(
            "ybc{}",
            captures.get(1).map(|m| m.as_str()).unwrap_or_default()
        );

        let mut flags = ybc_flags(node, tls, yb_home);
        if self.config.ybc.enable_verbose {
            flags.insert("v".to_string(), "1".to_string());
        }
        if let Some(nfs_dirs) = &self.config.ybc.nfs_dirs {
            flags.insert("nfs_dirs".to_string(), nfs_dirs.clone());
        }

        Ok(YbcInstall {
            package: ybc_package,
            dir,
            flags,
        })
    }
}

fn required_package<'a>(package: Option<&'a ServerPackage>, p: &ConfigureParams) -> Result<&'a str> {
    package.map(|pkg| pkg.path.as_str()).ok_or_else(|| {
        CompileError::missing(format!(
            "unable to resolve package for version {}",
            p.yb_software_version.as_deref().unwrap_or("<none>")
        ))
    })
}

fn push_process_type(args: &mut Vec<String>, process: ProcessType) {
    args.push("--yb_process_type".to_string());
    args.push(process.as_str().to_string());
}

/// Process arguments of a cert or TLS step
///
/// Returns true when the step only reconfigures the backup controller and
/// nothing else should follow.
fn push_process_handling(
    args: &mut Vec<String>,
    process: ProcessType,
    ybc: Option<&YbcInstall>,
) -> Result<bool> {
    match (process, ybc) {
        (ProcessType::Controller, Some(ybc)) => {
            args.extend(ybc.args()?);
            args.push("--tags".to_string());
            args.push("override_ybc_gflags".to_string());
            Ok(true)
        }
        (ProcessType::Controller, None) => Ok(false),
        (process, _) => {
            push_process_type(args, process);
            Ok(false)
        }
    }
}

fn push_override_gflags(args: &mut Vec<String>, gflags: &BTreeMap<String, String>) -> Result<()> {
    args.push("--gflags".to_string());
    args.push(serde_json::to_string(gflags)?);
    args.push("--tags".to_string());
    args.push("override_gflags".to_string());
    Ok(())
}

/// OS and architecture encoded in a server package name
fn package_platform(package: &str) -> Result<(String, String)> {
    let file_name = package.rsplit('/').next().unwrap_or(package);
    let captures = SERVER_PACKAGE_PLATFORM.captures(file_name).ok_or_else(|| {
        CompileError::InvalidParameter(format!(
            "cannot determine os and arch of package {}",
            package
        ))
    })?;
    Ok((captures[1].to_string(), captures[2].to_string()))
}

fn uses_hostname(ctx: &NodeContext, node: &NodeDetails) -> bool {
    let primary_uses_hostname = ctx
        .universe
        .primary_cluster()
        .is_some_and(|c| c.user_intent.use_hostname);
    let private_ip_is_address = node
        .cloud_info
        .private_ip
        .as_deref()
        .is_some_and(|ip| ip.parse::<IpAddr>().is_ok());
    primary_uses_hostname || !private_ip_is_address
}

/// Subject of the node's server certificate
///
/// A secondary address, when present, becomes the common name.
fn server_cert_request(node: &NodeDetails, use_hostname: bool) -> Result<ServerCertRequest> {
    let private_ip = node.cloud_info.private_ip.clone().ok_or_else(|| {
        CompileError::missing(format!("private IP of node {}", node.node_name))
    })?;

    let mut subject_alt_names = vec![alt_name(&private_ip, use_hostname)];
    let mut common_name = private_ip;
    if let Some(secondary) = node.cloud_info.secondary_ip() {
        common_name = secondary.to_string();
        subject_alt_names.push(alt_name(secondary, false));
    }

    Ok(ServerCertRequest {
        common_name,
        subject_alt_names,
    })
}

fn alt_name(name: &str, as_hostname: bool) -> SubjectAltName {
    match name.parse::<IpAddr>() {
        Ok(ip) if !as_hostname => SubjectAltName::Ip(ip),
        _ => SubjectAltName::Dns(name.to_string()),
    }
}

/// Comma-separated data directories of a node
fn data_mount_points(device: Option<&DeviceInfo>) -> Option<String> {
    let device = device?;
    if let Some(mount_points) = device.mount_points.as_ref().filter(|m| !m.is_empty()) {
        return Some(mount_points.clone());
    }
    let num_volumes = device.num_volumes.filter(|n| *n > 0)?;
    Some(
        (0..num_volumes)
            .map(|i| format!("/mnt/d{}", i))
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeops_cloud::CloudSpecificInfo;

    fn node(private_ip: &str, secondary: Option<&str>) -> NodeDetails {
        serde_json::from_value(serde_json::json!({
            "node_name": "yb-dev-n1",
            "placement_uuid": uuid::Uuid::nil(),
            "cloud_info": CloudSpecificInfo {
                private_ip: Some(private_ip.to_string()),
                secondary_private_ip: secondary.map(str::to_string),
                ..Default::default()
            },
        }))
        .unwrap()
    }

    #[test]
    fn test_package_platform() {
        let (os, arch) =
            package_platform("s3://releases/2.18.0.0/yugabyte-2.18.0.0-b65-centos-x86_64.tar.gz")
                .unwrap();
        assert_eq!(os, "centos");
        assert_eq!(arch, "x86_64");

        let (os, arch) = package_platform("/opt/yugabyte-2.18.0.0-b65-linux-aarch64.tar.gz").unwrap();
        assert_eq!((os.as_str(), arch.as_str()), ("linux", "aarch64"));

        assert!(package_platform("/opt/yugabyte.zip").is_err());
    }

    #[test]
    fn test_ybc_package_pattern() {
        let captures = YBC_PACKAGE
            .captures("/opt/releases/ybc-2.0.0.0-b19-linux-x86_64.tar.gz")
            .unwrap();
        assert_eq!(&captures[1], "-2.0.0.0-b19-linux-x86_64");
        assert!(YBC_PACKAGE.captures("/opt/releases/controller.tar.gz").is_none());
    }

    #[test]
    fn test_server_cert_request_uses_ip_sans() {
        let request = server_cert_request(&node("10.0.0.1", None), false).unwrap();
        assert_eq!(request.common_name, "10.0.0.1");
        assert_eq!(
            request.subject_alt_names,
            vec![SubjectAltName::Ip("10.0.0.1".parse().unwrap())]
        );
    }

    #[test]
    fn test_server_cert_request_secondary_ip_is_common_name() {
        let request =
            server_cert_request(&node("yb-n1.example.com", Some("10.1.0.5")), true).unwrap();
        assert_eq!(request.common_name, "10.1.0.5");
        assert_eq!(
            request.subject_alt_names,
            vec![
                SubjectAltName::Dns("yb-n1.example.com".to_string()),
                SubjectAltName::Ip("10.1.0.5".parse().unwrap()),
            ]
        );

        let request = server_cert_request(&node("10.0.0.1", Some("null")), false).unwrap();
        assert_eq!(request.common_name, "10.0.0.1");
    }

    #[test]
    fn test_data_mount_points() {
        assert_eq!(data_mount_points(None), None);
        let device = DeviceInfo {
            num_volumes: Some(3),
            ..Default::default()
        };
        assert_eq!(
            data_mount_points(Some(&device)).as_deref(),
            Some("/mnt/d0,/mnt/d1,/mnt/d2")
        );
        let device = DeviceInfo {
            num_volumes: Some(3),
            mount_points: Some("/data/a,/data/b".to_string()),
            ..Default::default()
        };
        assert_eq!(data_mount_points(Some(&device)).as_deref(), Some("/data/a,/data/b"));
    }
}
