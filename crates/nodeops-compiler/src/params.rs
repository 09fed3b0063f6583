//! Typed parameters for node operations
//!
//! [`NodeOperationParams`] is a sum type with one variant per parameter
//! shape. Each operation accepts a fixed set of variants; anything else is
//! rejected with `TypeMismatch` before a single argument is emitted.

use crate::operation::{CertRotateAction, CertRotationType, NodeOperation, ProcessType};
use crate::tls_toggle::{NodeToNodeChange, TlsTogglePhase};
use nodeops_cloud::{CommunicationPorts, DeviceInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Fields shared by every operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTaskParams {
    pub universe_uuid: Uuid,

    pub node_name: String,

    /// Filled from the universe (or derived) when absent
    #[serde(default)]
    pub node_uuid: Option<Uuid>,

    /// Availability zone the node lives in
    pub az_uuid: Uuid,

    /// Cluster the node is placed in
    #[serde(default)]
    pub placement_uuid: Option<Uuid>,

    #[serde(default)]
    pub instance_type: Option<String>,

    #[serde(default)]
    pub device_info: Option<DeviceInfo>,

    /// Root CA for node-to-node encryption
    #[serde(default)]
    pub root_ca: Option<Uuid>,

    /// Client root CA for client-to-node encryption
    #[serde(default)]
    pub client_root_ca: Option<Uuid>,

    #[serde(default)]
    pub communication_ports: CommunicationPorts,
}

impl NodeTaskParams {
    pub fn new(universe_uuid: Uuid, node_name: impl Into<String>, az_uuid: Uuid) -> Self {
        Self {
            universe_uuid,
            node_name: node_name.into(),
            node_uuid: None,
            az_uuid,
            placement_uuid: None,
            instance_type: None,
            device_info: None,
            root_ca: None,
            client_root_ca: None,
            communication_ports: CommunicationPorts::default(),
        }
    }

    pub(crate) fn instance_type(&self) -> &str {
        self.instance_type.as_deref().unwrap_or("")
    }
}

/// VM image upgrade in progress, if any
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmUpgradeTaskType {
    #[default]
    None,
    VmUpgradeWithBaseImages,
    VmUpgradeWithCustomImages,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    #[serde(default)]
    pub subnet_id: Option<String>,

    /// Subnet of the second NIC (managed-cloud mode only)
    #[serde(default)]
    pub secondary_subnet_id: Option<String>,

    /// Overrides the region's default image
    #[serde(default)]
    pub machine_image: Option<String>,

    #[serde(default = "default_true")]
    pub assign_public_ip: bool,

    #[serde(default)]
    pub assign_static_public_ip: bool,

    /// AWS customer master key for volume encryption
    #[serde(default)]
    pub cmk_arn: Option<String>,

    /// AWS IAM instance profile
    #[serde(default)]
    pub ip_arn_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRootVolumesParams {
    #[serde(flatten)]
    pub create: CreateParams,

    pub num_volumes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    #[serde(default)]
    pub machine_image: Option<String>,

    #[serde(default)]
    pub use_systemd: bool,

    /// Migrating an existing node from cron to systemd
    #[serde(default)]
    pub is_systemd_upgrade: bool,

    /// Provider-side time sync is in use
    #[serde(default)]
    pub use_time_sync: bool,

    #[serde(default)]
    pub remote_package_path: Option<String>,

    #[serde(default)]
    pub vm_upgrade: VmUpgradeTaskType,

    #[serde(default)]
    pub ignore_use_custom_image_config: bool,
}

/// Download/install step of a software upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoftwareSubTask {
    Download,
    Install,
    YbcInstall,
}

impl SoftwareSubTask {
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            SoftwareSubTask::Download => "download-software",
            SoftwareSubTask::Install => "install-software",
            SoftwareSubTask::YbcInstall => "ybc-install",
        }
    }
}

/// Which part of the node a configure step touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConfigureTask {
    /// Fresh install: package, certificates and flags
    Everything {
        process: ProcessType,
    },
    Software {
        process: ProcessType,
        sub_task: SoftwareSubTask,
    },
    GFlags {
        process: ProcessType,
    },
    Certs {
        process: ProcessType,
        action: CertRotateAction,
    },
    ToggleTls {
        process: ProcessType,
        phase: TlsTogglePhase,
    },
}

impl ConfigureTask {
    pub fn process(&self) -> ProcessType {
        match self {
            ConfigureTask::Everything { process }
            | ConfigureTask::Software { process, .. }
            | ConfigureTask::GFlags { process }
            | ConfigureTask::Certs { process, .. }
            | ConfigureTask::ToggleTls { process, .. } => *process,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    pub task: ConfigureTask,

    #[serde(default)]
    pub yb_software_version: Option<String>,

    #[serde(default)]
    pub enable_ybc: bool,

    #[serde(default)]
    pub ybc_software_version: Option<String>,

    /// Target node-to-node encryption state
    #[serde(default)]
    pub enable_node_to_node_encrypt: bool,

    /// Target client-to-node encryption state
    #[serde(default)]
    pub enable_client_to_node_encrypt: bool,

    #[serde(default = "default_true")]
    pub root_and_client_root_ca_same: bool,

    /// Value of allow_insecure_connections while encryption is on
    #[serde(default)]
    pub allow_insecure: bool,

    #[serde(default)]
    pub is_master_in_shell_mode: bool,

    #[serde(default)]
    pub itest_s3_package_path: Option<String>,

    #[serde(default)]
    pub vm_upgrade: VmUpgradeTaskType,

    #[serde(default)]
    pub ignore_use_custom_image_config: bool,

    /// Task-specific gflag overrides
    #[serde(default)]
    pub gflags: BTreeMap<String, String>,

    #[serde(default)]
    pub gflags_to_remove: BTreeSet<String>,

    #[serde(default)]
    pub use_systemd: bool,

    #[serde(default)]
    pub is_systemd_upgrade: bool,

    #[serde(default)]
    pub update_packages: bool,

    #[serde(default)]
    pub node_to_node_change: NodeToNodeChange,

    #[serde(default)]
    pub root_ca_rotation: CertRotationType,

    #[serde(default)]
    pub client_root_ca_rotation: CertRotationType,
}

impl ConfigureParams {
    pub fn new(base: NodeTaskParams, task: ConfigureTask) -> Self {
        Self {
            base,
            task,
            yb_software_version: None,
            enable_ybc: false,
            ybc_software_version: None,
            enable_node_to_node_encrypt: false,
            enable_client_to_node_encrypt: false,
            root_and_client_root_ca_same: true,
            allow_insecure: false,
            is_master_in_shell_mode: false,
            itest_s3_package_path: None,
            vm_upgrade: VmUpgradeTaskType::None,
            ignore_use_custom_image_config: false,
            gflags: BTreeMap::new(),
            gflags_to_remove: BTreeSet::new(),
            use_systemd: false,
            is_systemd_upgrade: false,
            update_packages: false,
            node_to_node_change: NodeToNodeChange::Unchanged,
            root_ca_rotation: CertRotationType::None,
            client_root_ca_rotation: CertRotationType::None,
        }
    }

    pub(crate) fn any_encryption(&self) -> bool {
        self.enable_node_to_node_encrypt || self.enable_client_to_node_encrypt
    }

    /// Root CA is needed when node-to-node encryption is on, or when the
    /// shared CA also serves client-to-node encryption
    pub(crate) fn root_ca_required(&self) -> bool {
        self.enable_node_to_node_encrypt
            || (self.root_and_client_root_ca_same && self.enable_client_to_node_encrypt)
    }

    pub(crate) fn client_root_ca_required(&self) -> bool {
        !self.root_and_client_root_ca_same && self.enable_client_to_node_encrypt
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    #[serde(default)]
    pub node_ip: Option<String>,
}

/// Pause or resume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    #[serde(default)]
    pub node_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    /// Process to act on (master, tserver, controller)
    pub process: String,

    /// start, stop, ...
    pub command: String,

    #[serde(default)]
    pub use_systemd: bool,

    #[serde(default)]
    pub check_volumes_attached: bool,
}

/// Tag updates and disk resizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceActionParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    /// Tags to set; the cluster's instance tags when absent
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,

    /// Comma-separated tag keys to remove
    #[serde(default)]
    pub delete_tags: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceRootVolumeParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    pub replacement_disk: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum XClusterCertAction {
    Copy,
    Remove,
}

impl fmt::Display for XClusterCertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XClusterCertAction::Copy => f.write_str("COPY"),
            XClusterCertAction::Remove => f.write_str("REMOVE"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferXClusterCertsParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    pub action: XClusterCertAction,

    /// Source root certificate, required for COPY
    #[serde(default)]
    pub root_cert_path: Option<PathBuf>,

    pub replication_group_name: String,

    #[serde(default)]
    pub producer_certs_dir_on_target: Option<PathBuf>,
}

/// SSH key verification and rotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAccessParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    /// Key currently used to reach the node
    pub access_key_code: String,

    /// Key being verified, added or removed
    pub task_access_key_code: String,

    pub ssh_user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebootParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    #[serde(default)]
    pub use_ssh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionLang {
    Bash,
    Python,
}

impl fmt::Display for ExecutionLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionLang::Bash => f.write_str("Bash"),
            ExecutionLang::Python => f.write_str("Python"),
        }
    }
}

/// A custom hook script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookSpec {
    pub execution_lang: ExecutionLang,

    #[serde(default)]
    pub use_sudo: bool,

    #[serde(default)]
    pub runtime_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHooksParams {
    #[serde(flatten)]
    pub base: NodeTaskParams,

    pub hook: HookSpec,

    /// Lifecycle trigger name (e.g., PreNodeProvision)
    pub trigger: String,

    /// Hook script path on the platform
    pub hook_path: String,

    pub parent_task: String,
}

/// Precheck of an on-premises machine that is not part of any universe yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetachedNodeParams {
    pub provider_uuid: Uuid,

    pub region_uuid: Uuid,

    pub instance_type: String,

    /// Registered machine being checked
    pub node_instance_uuid: Uuid,
}

/// Operation parameters, one variant per shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeOperationParams {
    Create(CreateParams),
    CreateRootVolumes(CreateRootVolumesParams),
    Provision(ProvisionParams),
    /// Used by Configure and CronCheck
    Configure(ConfigureParams),
    Destroy(DestroyParams),
    /// Used by Pause and Resume
    Instance(InstanceParams),
    Control(ControlParams),
    /// Used by Tags and DiskUpdate
    InstanceAction(InstanceActionParams),
    UpdateMountedDisks(NodeTaskParams),
    ChangeInstanceType(NodeTaskParams),
    ReplaceRootVolume(ReplaceRootVolumeParams),
    TransferXClusterCerts(TransferXClusterCertsParams),
    /// Used by VerifyNodeSSHAccess, AddAuthorizedKey and RemoveAuthorizedKey
    NodeAccess(NodeAccessParams),
    Reboot(RebootParams),
    RunHooks(RunHooksParams),
    /// Base parameters only (List, Precheck, DeleteRootVolumes, WaitForSSH)
    Generic(NodeTaskParams),
}

/// Parameter shape, as far as access-key arguments care
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsShape {
    Create,
    Setup { use_time_sync: bool },
    Destroy,
    ChangeInstanceType,
    Other,
}

impl NodeOperationParams {
    pub fn base(&self) -> &NodeTaskParams {
        match self {
            NodeOperationParams::Create(p) => &p.base,
            NodeOperationParams::CreateRootVolumes(p) => &p.create.base,
            NodeOperationParams::Provision(p) => &p.base,
            NodeOperationParams::Configure(p) => &p.base,
            NodeOperationParams::Destroy(p) => &p.base,
            NodeOperationParams::Instance(p) => &p.base,
            NodeOperationParams::Control(p) => &p.base,
            NodeOperationParams::InstanceAction(p) => &p.base,
            NodeOperationParams::UpdateMountedDisks(p) => p,
            NodeOperationParams::ChangeInstanceType(p) => p,
            NodeOperationParams::ReplaceRootVolume(p) => &p.base,
            NodeOperationParams::TransferXClusterCerts(p) => &p.base,
            NodeOperationParams::NodeAccess(p) => &p.base,
            NodeOperationParams::Reboot(p) => &p.base,
            NodeOperationParams::RunHooks(p) => &p.base,
            NodeOperationParams::Generic(p) => p,
        }
    }

    /// Variant name, for error messages
    pub fn variant_name(&self) -> &'static str {
        match self {
            NodeOperationParams::Create(_) => "Create",
            NodeOperationParams::CreateRootVolumes(_) => "CreateRootVolumes",
            NodeOperationParams::Provision(_) => "Provision",
            NodeOperationParams::Configure(_) => "Configure",
            NodeOperationParams::Destroy(_) => "Destroy",
            NodeOperationParams::Instance(_) => "Instance",
            NodeOperationParams::Control(_) => "Control",
            NodeOperationParams::InstanceAction(_) => "InstanceAction",
            NodeOperationParams::UpdateMountedDisks(_) => "UpdateMountedDisks",
            NodeOperationParams::ChangeInstanceType(_) => "ChangeInstanceType",
            NodeOperationParams::ReplaceRootVolume(_) => "ReplaceRootVolume",
            NodeOperationParams::TransferXClusterCerts(_) => "TransferXClusterCerts",
            NodeOperationParams::NodeAccess(_) => "NodeAccess",
            NodeOperationParams::Reboot(_) => "Reboot",
            NodeOperationParams::RunHooks(_) => "RunHooks",
            NodeOperationParams::Generic(_) => "Generic",
        }
    }

    /// Whether this variant may be compiled for `operation`
    pub fn accepts(&self, operation: NodeOperation) -> bool {
        use NodeOperation as Op;
        use NodeOperationParams as P;
        match operation {
            Op::List | Op::Precheck | Op::DeleteRootVolumes | Op::WaitForSSH => true,
            Op::Create => matches!(self, P::Create(_)),
            Op::CreateRootVolumes => matches!(self, P::CreateRootVolumes(_)),
            Op::Provision => matches!(self, P::Provision(_)),
            Op::Configure | Op::CronCheck => matches!(self, P::Configure(_)),
            Op::Destroy => matches!(self, P::Destroy(_)),
            Op::Pause | Op::Resume => matches!(self, P::Instance(_)),
            Op::Control => matches!(self, P::Control(_)),
            Op::Tags | Op::DiskUpdate => matches!(self, P::InstanceAction(_)),
            Op::UpdateMountedDisks => matches!(self, P::UpdateMountedDisks(_)),
            Op::ChangeInstanceType => matches!(self, P::ChangeInstanceType(_)),
            Op::ReplaceRootVolume => matches!(self, P::ReplaceRootVolume(_)),
            Op::TransferXClusterCerts => matches!(self, P::TransferXClusterCerts(_)),
            Op::VerifyNodeSSHAccess | Op::AddAuthorizedKey | Op::RemoveAuthorizedKey => {
                matches!(self, P::NodeAccess(_))
            }
            Op::Reboot => matches!(self, P::Reboot(_)),
            Op::RunHooks => matches!(self, P::RunHooks(_)),
        }
    }

    pub fn shape(&self) -> ParamsShape {
        match self {
            NodeOperationParams::Create(_) | NodeOperationParams::CreateRootVolumes(_) => {
                ParamsShape::Create
            }
            NodeOperationParams::Provision(p) => ParamsShape::Setup {
                use_time_sync: p.use_time_sync,
            },
            NodeOperationParams::Destroy(_) => ParamsShape::Destroy,
            NodeOperationParams::ChangeInstanceType(_) => ParamsShape::ChangeInstanceType,
            _ => ParamsShape::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NodeTaskParams {
        NodeTaskParams::new(Uuid::nil(), "yb-dev-n1", Uuid::nil())
    }

    fn everything() -> ConfigureTask {
        ConfigureTask::Everything {
            process: ProcessType::TServer,
        }
    }

    #[test]
    fn test_accepts() {
        let generic = NodeOperationParams::Generic(base());
        assert!(generic.accepts(NodeOperation::Precheck));
        assert!(generic.accepts(NodeOperation::WaitForSSH));
        assert!(!generic.accepts(NodeOperation::Create));

        let configure = NodeOperationParams::Configure(ConfigureParams::new(base(), everything()));
        assert!(configure.accepts(NodeOperation::Configure));
        assert!(configure.accepts(NodeOperation::CronCheck));
        assert!(!configure.accepts(NodeOperation::Provision));
    }

    #[test]
    fn test_deserialize_configure() {
        let json = r#"{
            "kind": "Configure",
            "universe_uuid": "00000000-0000-0000-0000-000000000000",
            "node_name": "yb-dev-n1",
            "az_uuid": "00000000-0000-0000-0000-000000000000",
            "task": {"type": "ToggleTls", "process": "TServer", "phase": "Round1GFlagsUpdate"},
            "node_to_node_change": 1,
            "enable_node_to_node_encrypt": true
        }"#;
        let params: NodeOperationParams = serde_json::from_str(json).unwrap();
        let NodeOperationParams::Configure(configure) = params else {
            panic!("expected configure params");
        };
        assert_eq!(configure.node_to_node_change, NodeToNodeChange::Enabling);
        assert!(configure.root_and_client_root_ca_same);
        assert_eq!(
            configure.task,
            ConfigureTask::ToggleTls {
                process: ProcessType::TServer,
                phase: TlsTogglePhase::Round1GFlagsUpdate,
            }
        );
    }

    #[test]
    fn test_ca_requirements() {
        let mut params = ConfigureParams::new(base(), everything());
        params.enable_client_to_node_encrypt = true;
        assert!(params.root_ca_required());
        assert!(!params.client_root_ca_required());

        params.root_and_client_root_ca_same = false;
        assert!(!params.root_ca_required());
        assert!(params.client_root_ca_required());
    }
}
