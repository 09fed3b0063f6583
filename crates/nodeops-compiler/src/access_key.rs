//! Access key arguments
//!
//! Turns an access key's key material and setup toggles into executor
//! arguments. Which toggles apply depends on both the operation and the
//! shape of its parameters: setup-shaped parameters carry node exporter and
//! NTP settings, create-shaped ones the AWS key pair and security group.

use crate::error::{CompileError, Result};
use crate::operation::NodeOperation;
use crate::params::ParamsShape;
use nodeops_cloud::{AccessKey, CloudType, KeyInfo};

/// NTP servers used by legacy cloud providers that predate NTP settings
const PUBLIC_NTP_POOL: [&str; 4] = [
    "0.pool.ntp.org",
    "1.pool.ntp.org",
    "2.pool.ntp.org",
    "3.pool.ntp.org",
];

/// Node user for manually provisioned nodes
const PRECHECK_CONFIGURE_USER: &str = "yugabyte";

/// Inputs of the access key argument list
#[derive(Debug, Clone)]
pub struct AccessKeyArgBuilder<'a> {
    pub operation: NodeOperation,
    pub shape: ParamsShape,
    pub key_info: &'a KeyInfo,
    pub provider_type: CloudType,
    pub key_code: &'a str,
    /// Key port, else the provider's
    pub ssh_port: u16,
    pub node_exporter_port: u16,
    /// Region security group, used on create
    pub security_group_id: Option<&'a str>,
}

impl<'a> AccessKeyArgBuilder<'a> {
    pub fn build(&self) -> Vec<String> {
        let key = self.key_info;
        let mut args = Vec::new();
        let waiting = self.operation == NodeOperation::WaitForSSH;

        if let Some(vault_file) = &key.vault_file {
            args.push("--vars_file".to_string());
            args.push(vault_file.clone());
            args.push("--vault_password_file".to_string());
            args.push(key.vault_password_file.clone().unwrap_or_default());
        }

        if let Some(private_key) = &key.private_key {
            args.push("--private_key_file".to_string());
            args.push(private_key.clone());

            let create_or_setup =
                matches!(self.shape, ParamsShape::Create | ParamsShape::Setup { .. });
            if create_or_setup && self.provider_type == CloudType::Aws && !waiting {
                args.push("--key_pair_name".to_string());
                args.push(self.key_code.to_string());
                if self.shape == ParamsShape::Create {
                    self.push_security_group(&mut args);
                }
            }
        }

        if self.shape == ParamsShape::Create && self.provider_type == CloudType::Azu && !waiting {
            self.push_security_group(&mut args);
        }

        if self.shape == ParamsShape::Destroy && self.provider_type == CloudType::Onprem {
            args.push("--install_node_exporter".to_string());
        }

        args.push("--custom_ssh_port".to_string());
        args.push(self.ssh_port.to_string());

        if let Some(ssh_user) = &key.ssh_user {
            if self.operation.uses_ssh_user() {
                args.push("--ssh_user".to_string());
                args.push(ssh_user.clone());
            }
            if self.operation == NodeOperation::Configure {
                args.push("--ssh_user_update_packages".to_string());
                args.push(ssh_user.clone());
            }
        }

        if self.operation == NodeOperation::Precheck {
            self.push_precheck(&mut args);
        }

        match self.shape {
            ParamsShape::Setup { use_time_sync } => self.push_setup(&mut args, use_time_sync),
            ParamsShape::ChangeInstanceType if key.air_gap_install => {
                args.push("--air_gap".to_string());
            }
            _ => {}
        }

        args
    }

    fn push_security_group(&self, args: &mut Vec<String>) {
        if let Some(group) = self.security_group_id {
            args.push("--security_group_id".to_string());
            args.push(group.to_string());
        }
    }

    fn push_precheck(&self, args: &mut Vec<String>) {
        let key = self.key_info;
        args.push("--precheck_type".to_string());
        if key.skip_provisioning {
            args.push("configure".to_string());
            args.push("--ssh_user".to_string());
            args.push(PRECHECK_CONFIGURE_USER.to_string());
        } else {
            args.push("provision".to_string());
            if let Some(ssh_user) = &key.ssh_user {
                args.push("--ssh_user".to_string());
                args.push(ssh_user.clone());
            }
        }
        if key.set_up_chrony {
            args.push("--skip_ntp_check".to_string());
        }
        if key.air_gap_install {
            args.push("--air_gap".to_string());
        }
        if key.install_node_exporter {
            args.push("--install_node_exporter".to_string());
        }
    }

    fn push_setup(&self, args: &mut Vec<String>, use_time_sync: bool) {
        let key = self.key_info;
        if key.air_gap_install {
            args.push("--air_gap".to_string());
        }

        if key.install_node_exporter {
            args.push("--install_node_exporter".to_string());
            args.push("--node_exporter_port".to_string());
            args.push(self.node_exporter_port.to_string());
            args.push("--node_exporter_user".to_string());
            args.push(key.node_exporter_user.clone());
        }

        if key.set_up_chrony {
            args.push("--use_chrony".to_string());
            for server in &key.ntp_servers {
                args.push("--ntp_server".to_string());
                args.push(server.clone());
            }
        }

        // Providers created before NTP became configurable must still get NTP
        if !key.show_set_up_chrony
            && !key.air_gap_install
            && !use_time_sync
            && self.provider_type.is_public_cloud()
        {
            args.push("--use_chrony".to_string());
            for server in PUBLIC_NTP_POOL {
                args.push("--ntp_server".to_string());
                args.push(server.to_string());
            }
        }
    }
}

/// SSH connection arguments for node access operations
///
/// Fails when the key has no private key file.
pub fn node_ssh_args(access_key: &AccessKey, ssh_user: &str, ssh_port: u16) -> Result<Vec<String>> {
    let key = &access_key.key_info;
    let private_key = key.private_key.as_ref().ok_or_else(|| {
        CompileError::missing(format!(
            "no private key file for access key {}",
            access_key.key_code
        ))
    })?;

    let mut args = vec![
        "--ssh_user".to_string(),
        ssh_user.to_string(),
        "--custom_ssh_port".to_string(),
        ssh_port.to_string(),
    ];
    if let Some(vault_password_file) = &key.vault_password_file {
        args.push("--vault_password_file".to_string());
        args.push(vault_password_file.clone());
    }
    if let Some(vault_file) = &key.vault_file {
        args.push("--vars_file".to_string());
        args.push(vault_file.clone());
    }
    args.push("--private_key_file".to_string());
    args.push(private_key.clone());
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use uuid::Uuid;

    fn key_info() -> KeyInfo {
        KeyInfo {
            private_key: Some("/keys/dev.pem".to_string()),
            vault_file: Some("/keys/dev.vault".to_string()),
            vault_password_file: Some("/keys/dev.vault_password".to_string()),
            ssh_user: Some("centos".to_string()),
            show_set_up_chrony: true,
            ..Default::default()
        }
    }

    fn builder(
        operation: NodeOperation,
        shape: ParamsShape,
        key_info: &KeyInfo,
        provider_type: CloudType,
    ) -> AccessKeyArgBuilder<'_> {
        AccessKeyArgBuilder {
            operation,
            shape,
            key_info,
            provider_type,
            key_code: "dev-key",
            ssh_port: 22,
            node_exporter_port: 9300,
            security_group_id: Some("sg-123"),
        }
    }

    fn value_of<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_aws_create_key_pair_and_security_group() {
        let info = key_info();
        let args = builder(NodeOperation::Create, ParamsShape::Create, &info, CloudType::Aws).build();
        assert_eq!(value_of(&args, "--key_pair_name"), Some("dev-key"));
        assert_eq!(value_of(&args, "--security_group_id"), Some("sg-123"));
        assert_eq!(value_of(&args, "--ssh_user"), Some("centos"));
        assert_eq!(value_of(&args, "--custom_ssh_port"), Some("22"));
        assert_eq!(args[0], "--vars_file");
    }

    #[test]
    fn test_wait_for_ssh_skips_key_pair() {
        let info = key_info();
        let args =
            builder(NodeOperation::WaitForSSH, ParamsShape::Create, &info, CloudType::Aws).build();
        assert!(!args.contains(&"--key_pair_name".to_string()));
        assert!(!args.contains(&"--security_group_id".to_string()));
    }

    #[test]
    fn test_azure_create_security_group_without_private_key() {
        let mut info = key_info();
        info.private_key = None;
        let args = builder(NodeOperation::Create, ParamsShape::Create, &info, CloudType::Azu).build();
        assert_eq!(value_of(&args, "--security_group_id"), Some("sg-123"));
        assert!(!args.contains(&"--key_pair_name".to_string()));
    }

    #[test]
    fn test_configure_update_packages_user() {
        let info = key_info();
        let args =
            builder(NodeOperation::Configure, ParamsShape::Other, &info, CloudType::Gcp).build();
        assert_eq!(value_of(&args, "--ssh_user_update_packages"), Some("centos"));
        assert!(!args.contains(&"--ssh_user".to_string()));
    }

    #[test]
    fn test_precheck_for_manually_provisioned_nodes() {
        let mut info = key_info();
        info.skip_provisioning = true;
        info.set_up_chrony = true;
        info.air_gap_install = true;
        let args =
            builder(NodeOperation::Precheck, ParamsShape::Other, &info, CloudType::Onprem).build();
        assert_eq!(value_of(&args, "--precheck_type"), Some("configure"));
        assert_eq!(value_of(&args, "--ssh_user"), Some("yugabyte"));
        assert!(args.contains(&"--skip_ntp_check".to_string()));
        assert!(args.contains(&"--air_gap".to_string()));
    }

    #[test]
    fn test_setup_node_exporter_and_ntp() {
        let mut info = key_info();
        info.install_node_exporter = true;
        info.set_up_chrony = true;
        info.ntp_servers = vec!["10.0.0.53".to_string()];
        let shape = ParamsShape::Setup {
            use_time_sync: false,
        };
        let args = builder(NodeOperation::Provision, shape, &info, CloudType::Onprem).build();
        assert_eq!(value_of(&args, "--node_exporter_port"), Some("9300"));
        assert_eq!(value_of(&args, "--node_exporter_user"), Some("prometheus"));
        assert_eq!(value_of(&args, "--ntp_server"), Some("10.0.0.53"));
    }

    #[test]
    fn test_legacy_cloud_provider_gets_public_ntp() {
        let mut info = key_info();
        info.show_set_up_chrony = false;
        let shape = ParamsShape::Setup {
            use_time_sync: false,
        };
        let args = builder(NodeOperation::Provision, shape, &info, CloudType::Gcp).build();
        let servers: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--ntp_server")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(servers, PUBLIC_NTP_POOL);

        let shape = ParamsShape::Setup {
            use_time_sync: true,
        };
        let args = builder(NodeOperation::Provision, shape, &info, CloudType::Gcp).build();
        assert!(!args.contains(&"--use_chrony".to_string()));
    }

    #[test]
    fn test_onprem_destroy_installs_node_exporter() {
        let info = key_info();
        let args =
            builder(NodeOperation::Destroy, ParamsShape::Destroy, &info, CloudType::Onprem).build();
        assert!(args.contains(&"--install_node_exporter".to_string()));
    }

    #[test]
    fn test_node_ssh_args() {
        let access_key = AccessKey {
            key_code: "dev-key".to_string(),
            provider_uuid: Uuid::nil(),
            key_info: key_info(),
            public_key_content: None,
        };
        let args = node_ssh_args(&access_key, "admin", 2222).unwrap();
        assert_eq!(
            args,
            vec![
                "--ssh_user",
                "admin",
                "--custom_ssh_port",
                "2222",
                "--vault_password_file",
                "/keys/dev.vault_password",
                "--vars_file",
                "/keys/dev.vault",
                "--private_key_file",
                "/keys/dev.pem",
            ]
        );

        let mut no_key = access_key.clone();
        no_key.key_info.private_key = None;
        let err = node_ssh_args(&no_key, "admin", 22).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingState);
    }
}
