//! Node operation kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An action the provisioning executor can perform on a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeOperation {
    Provision,
    Create,
    Configure,
    CronCheck,
    Destroy,
    List,
    Control,
    Precheck,
    Tags,
    DiskUpdate,
    UpdateMountedDisks,
    ChangeInstanceType,
    Pause,
    Resume,
    CreateRootVolumes,
    ReplaceRootVolume,
    DeleteRootVolumes,
    TransferXClusterCerts,
    VerifyNodeSSHAccess,
    AddAuthorizedKey,
    RemoveAuthorizedKey,
    Reboot,
    RunHooks,
    WaitForSSH,
}

impl NodeOperation {
    pub const ALL: [NodeOperation; 24] = [
        NodeOperation::Provision,
        NodeOperation::Create,
        NodeOperation::Configure,
        NodeOperation::CronCheck,
        NodeOperation::Destroy,
        NodeOperation::List,
        NodeOperation::Control,
        NodeOperation::Precheck,
        NodeOperation::Tags,
        NodeOperation::DiskUpdate,
        NodeOperation::UpdateMountedDisks,
        NodeOperation::ChangeInstanceType,
        NodeOperation::Pause,
        NodeOperation::Resume,
        NodeOperation::CreateRootVolumes,
        NodeOperation::ReplaceRootVolume,
        NodeOperation::DeleteRootVolumes,
        NodeOperation::TransferXClusterCerts,
        NodeOperation::VerifyNodeSSHAccess,
        NodeOperation::AddAuthorizedKey,
        NodeOperation::RemoveAuthorizedKey,
        NodeOperation::Reboot,
        NodeOperation::RunHooks,
        NodeOperation::WaitForSSH,
    ];

    /// Subcommand name understood by the executor
    pub fn command_name(&self) -> &'static str {
        match self {
            NodeOperation::Provision => "provision",
            NodeOperation::Create => "create",
            NodeOperation::Configure => "configure",
            NodeOperation::CronCheck => "croncheck",
            NodeOperation::Destroy => "destroy",
            NodeOperation::List => "list",
            NodeOperation::Control => "control",
            NodeOperation::Precheck => "precheck",
            NodeOperation::Tags => "tags",
            NodeOperation::DiskUpdate => "disk_update",
            NodeOperation::UpdateMountedDisks => "update_mounted_disks",
            NodeOperation::ChangeInstanceType => "change_instance_type",
            NodeOperation::Pause => "pause",
            NodeOperation::Resume => "resume",
            NodeOperation::CreateRootVolumes => "create_root_volumes",
            NodeOperation::ReplaceRootVolume => "replace_root_volume",
            NodeOperation::DeleteRootVolumes => "delete_root_volumes",
            NodeOperation::TransferXClusterCerts => "transfer_xcluster_certs",
            NodeOperation::VerifyNodeSSHAccess => "verify_node_ssh_access",
            NodeOperation::AddAuthorizedKey => "add_authorized_key",
            NodeOperation::RemoveAuthorizedKey => "remove_authorized_key",
            NodeOperation::Reboot => "reboot",
            NodeOperation::RunHooks => "runhooks",
            NodeOperation::WaitForSSH => "wait_for_ssh",
        }
    }

    /// Operations that pass `--ssh_user` from the access key
    pub(crate) fn uses_ssh_user(&self) -> bool {
        matches!(
            self,
            NodeOperation::Provision
                | NodeOperation::Destroy
                | NodeOperation::Create
                | NodeOperation::DiskUpdate
                | NodeOperation::UpdateMountedDisks
                | NodeOperation::Reboot
                | NodeOperation::ChangeInstanceType
                | NodeOperation::WaitForSSH
        )
    }
}

impl fmt::Display for NodeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_name())
    }
}

impl FromStr for NodeOperation {
    type Err = String;

    /// Accepts the executor subcommand name or the variant name, ignoring case
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        NodeOperation::ALL
            .into_iter()
            .find(|op| {
                op.command_name() == wanted
                    || format!("{:?}", op).to_ascii_lowercase() == wanted
            })
            .ok_or_else(|| format!("unknown node operation: {}", s))
    }
}

/// Server process a configure step targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessType {
    Master,
    TServer,
    Controller,
}

impl ProcessType {
    /// Value of `--yb_process_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Master => "master",
            ProcessType::TServer => "tserver",
            ProcessType::Controller => "controller",
        }
    }
}

/// Step of a root certificate rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertRotateAction {
    AppendNewRootCert,
    RemoveOldRootCert,
    RotateCerts,
    UpdateCertDirs,
}

impl fmt::Display for CertRotateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CertRotateAction::AppendNewRootCert => "APPEND_NEW_ROOT_CERT",
            CertRotateAction::RemoveOldRootCert => "REMOVE_OLD_ROOT_CERT",
            CertRotateAction::RotateCerts => "ROTATE_CERTS",
            CertRotateAction::UpdateCertDirs => "UPDATE_CERT_DIRS",
        };
        f.write_str(name)
    }
}

/// What is being rotated for one authority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertRotationType {
    #[default]
    None,
    RootCert,
    ServerCert,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!(NodeOperation::DiskUpdate.command_name(), "disk_update");
        assert_eq!(NodeOperation::CronCheck.command_name(), "croncheck");
        assert_eq!(NodeOperation::RunHooks.command_name(), "runhooks");
        assert_eq!(
            NodeOperation::TransferXClusterCerts.command_name(),
            "transfer_xcluster_certs"
        );
        assert_eq!(NodeOperation::WaitForSSH.to_string(), "wait_for_ssh");
    }

    #[test]
    fn test_parse_operation() {
        assert_eq!(
            "disk_update".parse::<NodeOperation>().unwrap(),
            NodeOperation::DiskUpdate
        );
        assert_eq!(
            "ChangeInstanceType".parse::<NodeOperation>().unwrap(),
            NodeOperation::ChangeInstanceType
        );
        assert!("initysql".parse::<NodeOperation>().is_err());
    }

    #[test]
    fn test_rotate_action_display() {
        assert_eq!(CertRotateAction::RotateCerts.to_string(), "ROTATE_CERTS");
        let json = serde_json::to_string(&CertRotateAction::AppendNewRootCert).unwrap();
        assert_eq!(json, "\"APPEND_NEW_ROOT_CERT\"");
    }
}
