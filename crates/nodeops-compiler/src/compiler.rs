//! Node operation compiler
//!
//! [`CommandCompiler::compile`] checks that the parameters fit the operation,
//! resolves the node's cluster state, dispatches on the operation and frames
//! the result for the provisioning executor:
//!
//! ```text
//! <cloud> --region <region> <cloud args> instance <operation> <args> <node>
//! ```
//!
//! Scratch files (issued certificates, boot scripts) live in a
//! [`ScratchSpace`] that is released when compilation returns, or, for
//! [`CommandCompiler::execute`], once the executor has finished.

use crate::access_key::{AccessKeyArgBuilder, node_ssh_args};
use crate::certs::{CertificateIssuer, CertificateResolver, LocalIssuer};
use crate::command::{CompiledCommand, SensitiveArgs};
use crate::error::{CompileError, Result};
use crate::executor::{ExecutionOutput, NodeExecutor};
use crate::intent::UserIntentResolver;
use crate::operation::NodeOperation;
use crate::params::{
    ControlParams, CreateParams, DestroyParams, DetachedNodeParams, InstanceActionParams,
    InstanceParams, NodeAccessParams, NodeOperationParams, NodeTaskParams, ParamsShape,
    ProvisionParams, RunHooksParams, TransferXClusterCertsParams, VmUpgradeTaskType,
    XClusterCertAction,
};
use crate::scratch::ScratchSpace;
use crate::skip_cert::{resolve_skip_cert_validation, skip_cert_validation_args};
use crate::tags::instance_tag_args;
use nodeops_cloud::{
    AvailabilityZone, CloudType, CommunicationPorts, DeviceInfo, NodeDetails, Provider, Region,
    ReleaseResolver, StateStore, Universe, UserIntent,
};
use nodeops_config::RuntimeConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Written to the boot script completion marker
pub const BOOT_SCRIPT_TOKEN: &str = "39666ab2-6633-4806-9685-5134321bd0d1";

/// Node name reported by a precheck of a machine outside any universe
pub const DETACHED_NODE_NAME: &str = "yb-adhoc-node";

const BOOT_SCRIPT_SUFFIX: &str = "-boot.sh";
const LOW_MEM_INSTANCE_PREFIXES: [&str; 2] = ["t2.", "t3."];
const LOW_MEM_BOOT_DISK_SIZE_GB: &str = "8";
const INSTANCE_COMMAND: &str = "instance";

fn boot_script_complete() -> String {
    format!(
        "\nsync\necho {} >/etc/yb-boot-script-complete\n",
        BOOT_SCRIPT_TOKEN
    )
}

/// Cluster state a single compile call works against
pub(crate) struct NodeContext {
    pub universe: Universe,
    pub intent: UserIntent,
    pub provider: Provider,
    pub region: Region,
    pub zone: AvailabilityZone,
    /// Explicit, from the universe, or derived for cloud nodes
    pub node_uuid: Option<Uuid>,
}

impl NodeContext {
    pub fn node(&self, node_name: &str) -> Option<&NodeDetails> {
        self.universe.node(node_name)
    }

    pub fn cloud(&self) -> CloudType {
        self.intent.provider_type
    }
}

/// Compiles node operations into executor commands
pub struct CommandCompiler {
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) releases: Arc<dyn ReleaseResolver>,
    pub(crate) issuer: Arc<dyn CertificateIssuer>,
    pub(crate) config: RuntimeConfig,
}

impl CommandCompiler {
    pub fn new(
        store: Arc<dyn StateStore>,
        releases: Arc<dyn ReleaseResolver>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            store,
            releases,
            issuer: Arc::new(LocalIssuer),
            config,
        }
    }

    /// Replace the certificate issuer (e.g., with a Vault-backed one)
    pub fn with_issuer(mut self, issuer: Arc<dyn CertificateIssuer>) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Compile `operation`
    ///
    /// Scratch files referenced by the command are removed before this
    /// returns; use [`execute`](Self::execute) to run the command while they
    /// still exist.
    pub fn compile(
        &self,
        operation: NodeOperation,
        params: &NodeOperationParams,
    ) -> Result<CompiledCommand> {
        let (command, _scratch) = self.compile_scoped(operation, params)?;
        Ok(command)
    }

    /// Compile and run `operation`, releasing scratch files afterwards
    pub async fn execute(
        &self,
        operation: NodeOperation,
        params: &NodeOperationParams,
        executor: &dyn NodeExecutor,
    ) -> Result<ExecutionOutput> {
        let (command, scratch) = self.compile_scoped(operation, params)?;
        let output = executor.run(&command).await;
        drop(scratch);
        output
    }

    pub(crate) fn compile_scoped(
        &self,
        operation: NodeOperation,
        params: &NodeOperationParams,
    ) -> Result<(CompiledCommand, ScratchSpace)> {
        if !params.accepts(operation) {
            return Err(CompileError::TypeMismatch {
                operation,
                params: params.variant_name(),
            });
        }

        let mut scratch = ScratchSpace::new();
        let base = params.base();
        let ctx = self.node_context(base)?;
        let mut sensitive = SensitiveArgs::new();
        let mut args = self.operation_args(operation, params, &ctx, &mut sensitive, &mut scratch)?;
        args.push(base.node_name.clone());

        let cloud_args = self.cloud_args(&ctx, &base.node_name)?;
        let command = CompiledCommand {
            args: frame(ctx.cloud(), &ctx.region.code, cloud_args, operation, args),
            env: self.executor_env(),
            sensitive,
        };
        tracing::debug!("Compiled {} for {}: {}", operation, base.node_name, command);
        Ok((command, scratch))
    }

    /// Precheck of an on-premises machine not yet placed in a universe
    pub fn compile_detached_precheck(&self, params: &DetachedNodeParams) -> Result<CompiledCommand> {
        let provider = self
            .store
            .provider(&params.provider_uuid)
            .ok_or_else(|| CompileError::missing(format!("provider {}", params.provider_uuid)))?;
        let region = self
            .store
            .region(&params.region_uuid)
            .ok_or_else(|| CompileError::missing(format!("region {}", params.region_uuid)))?;
        let access_key = self
            .store
            .access_keys(&provider.uuid)
            .into_iter()
            .next()
            .ok_or_else(|| {
                CompileError::missing(format!("no access keys for provider {}", provider.uuid))
            })?;
        let key_info = &access_key.key_info;

        let mut args = AccessKeyArgBuilder {
            operation: NodeOperation::Precheck,
            shape: ParamsShape::Other,
            key_info,
            provider_type: CloudType::Onprem,
            key_code: &access_key.key_code,
            ssh_port: key_info.ssh_port.unwrap_or(provider.ssh_port),
            node_exporter_port: key_info.node_exporter_port,
            security_group_id: None,
        }
        .build();
        args.extend(communication_port_args(
            &PortApis {
                ycql: true,
                ysql: true,
                yedis: false,
                node_exporter: key_info.install_node_exporter,
            },
            &CommunicationPorts::default(),
        ));

        let instance_type = self
            .store
            .instance_type(&provider.uuid, &params.instance_type)
            .ok_or_else(|| {
                CompileError::missing(format!("instance type {}", params.instance_type))
            })?;
        let mount_path = instance_type.mount_paths.first().ok_or_else(|| {
            CompileError::missing(format!(
                "no volumes for instance type {}",
                params.instance_type
            ))
        })?;
        args.push("--mount_points".to_string());
        args.push(mount_path.clone());
        args.push(DETACHED_NODE_NAME.to_string());

        let node_instance = self
            .store
            .node_instance(&params.node_instance_uuid)
            .ok_or_else(|| {
                CompileError::missing(format!("node instance {}", params.node_instance_uuid))
            })?;
        let mut details = match node_instance.details {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        details.insert(
            "nodeName".to_string(),
            serde_json::Value::String(DETACHED_NODE_NAME.to_string()),
        );
        let cloud_args = vec![
            "--node_metadata".to_string(),
            serde_json::Value::Object(details).to_string(),
        ];

        let command = CompiledCommand {
            args: frame(
                CloudType::Onprem,
                &region.code,
                cloud_args,
                NodeOperation::Precheck,
                args,
            ),
            env: BTreeMap::new(),
            sensitive: SensitiveArgs::new(),
        };
        tracing::debug!("Compiled detached precheck: {}", command);
        Ok(command)
    }

    fn node_context(&self, base: &NodeTaskParams) -> Result<NodeContext> {
        let universe = self
            .store
            .universe(&base.universe_uuid)
            .ok_or_else(|| CompileError::missing(format!("universe {}", base.universe_uuid)))?;
        let intent = UserIntentResolver::resolve(&universe, &base.node_name)?.clone();
        let provider = self
            .store
            .provider(&intent.provider)
            .ok_or_else(|| CompileError::missing(format!("provider {}", intent.provider)))?;
        let zone = self
            .store
            .availability_zone(&base.az_uuid)
            .ok_or_else(|| CompileError::missing(format!("availability zone {}", base.az_uuid)))?;
        let region = self
            .store
            .region(&zone.region_uuid)
            .ok_or_else(|| CompileError::missing(format!("region {}", zone.region_uuid)))?;

        let node_uuid = base
            .node_uuid
            .or_else(|| universe.node(&base.node_name).and_then(|n| n.node_uuid))
            .or_else(|| {
                (intent.provider_type != CloudType::Onprem)
                    .then(|| Uuid::new_v5(&universe.uuid, base.node_name.as_bytes()))
            });

        Ok(NodeContext {
            universe,
            intent,
            provider,
            region,
            zone,
            node_uuid,
        })
    }

    fn operation_args(
        &self,
        operation: NodeOperation,
        params: &NodeOperationParams,
        ctx: &NodeContext,
        sensitive: &mut SensitiveArgs,
        scratch: &mut ScratchSpace,
    ) -> Result<Vec<String>> {
        use NodeOperation as Op;
        use NodeOperationParams as P;

        let base = params.base();
        let shape = params.shape();
        let mut args = Vec::new();

        match (operation, params) {
            (Op::ReplaceRootVolume, P::ReplaceRootVolume(p)) => {
                args.push("--replacement_disk".to_string());
                args.push(p.replacement_disk.clone());
                args.extend(self.access_key_args(ctx, operation, shape, base)?);
            }
            (Op::CreateRootVolumes, P::CreateRootVolumes(p)) => {
                args.push("--num_disks".to_string());
                args.push(p.num_volumes.to_string());
                self.create_args(ctx, operation, shape, &p.create, &mut args, scratch)?;
            }
            (Op::Create, P::Create(p)) => {
                self.create_args(ctx, operation, shape, p, &mut args, scratch)?;
            }
            (Op::Provision, P::Provision(p)) => {
                self.provision_args(ctx, operation, shape, p, &mut args, scratch)?;
            }
            (Op::Configure, P::Configure(p)) => {
                args.extend(self.configure_args(ctx, p, scratch)?);
                if p.is_systemd_upgrade {
                    args.push("--tags".to_string());
                    args.push("systemd_upgrade".to_string());
                    args.push("--systemd_services".to_string());
                } else if p.use_systemd {
                    args.push("--systemd_services".to_string());
                } else if p.update_packages {
                    args.push("--update_packages".to_string());
                }
                args.extend(self.access_key_args(ctx, operation, shape, base)?);
                if let Some(device) = &base.device_info {
                    args.extend(device_args(ctx.cloud(), device));
                }
                sensitive.extend(self.release_sensitive_args(p));
            }
            (Op::CronCheck, P::Configure(_)) => {
                args.extend(self.access_key_args(ctx, operation, shape, base)?);
            }
            (Op::List, _) => {
                if ctx.cloud() == CloudType::Onprem {
                    if let Some(device) = &base.device_info {
                        args.extend(device_args(ctx.cloud(), device));
                    }
                    args.extend(self.access_key_args(ctx, operation, shape, base)?);
                }
                args.push("--as_json".to_string());
            }
            (Op::Destroy, P::Destroy(p)) => {
                self.destroy_args(ctx, operation, shape, p, &mut args)?;
            }
            (Op::Pause | Op::Resume, P::Instance(p)) => {
                self.instance_args(ctx, operation, shape, p, &mut args)?;
            }
            (Op::Control, P::Control(p)) => {
                self.control_args(ctx, operation, shape, p, &mut args)?;
            }
            (Op::Tags, P::InstanceAction(p)) => {
                self.tags_args(ctx, operation, shape, p, &mut args)?;
            }
            (Op::DiskUpdate, P::InstanceAction(p)) => {
                args.extend(self.access_key_args(ctx, operation, shape, base)?);
                args.push("--instance_type".to_string());
                args.push(p.base.instance_type().to_string());
                if let Some(device) = &base.device_info {
                    args.extend(device_args(ctx.cloud(), device));
                }
            }
            (Op::UpdateMountedDisks, P::UpdateMountedDisks(p)) => {
                args.push("--instance_type".to_string());
                args.push(p.instance_type().to_string());
                if let Some(device) = &p.device_info {
                    if let Some(storage_type) = device.storage_type {
                        args.push("--volume_type".to_string());
                        args.push(storage_type.volume_type().to_string());
                    }
                    args.extend(device_args(ctx.cloud(), device));
                }
                args.extend(self.access_key_args(ctx, operation, shape, base)?);
            }
            (Op::ChangeInstanceType, P::ChangeInstanceType(p)) => {
                args.push("--instance_type".to_string());
                args.push(p.instance_type().to_string());
                args.push("--pg_max_mem_mb".to_string());
                args.push(self.config.postgres_max_mem_mb.to_string());
                args.extend(self.access_key_args(ctx, operation, shape, base)?);
            }
            (Op::TransferXClusterCerts, P::TransferXClusterCerts(p)) => {
                self.transfer_xcluster_certs_args(ctx, operation, shape, p, &mut args)?;
            }
            (Op::Precheck, _) => {
                self.precheck_args(ctx, operation, shape, base, &mut args)?;
            }
            (Op::DeleteRootVolumes, _) => {
                if ctx.cloud().instance_tags_enabled() {
                    args.extend(instance_tag_args(
                        &ctx.intent.instance_tags,
                        ctx.cloud(),
                        &ctx.universe,
                        ctx.node_uuid,
                    )?);
                }
            }
            (
                Op::VerifyNodeSSHAccess | Op::AddAuthorizedKey | Op::RemoveAuthorizedKey,
                P::NodeAccess(p),
            ) => {
                self.node_access_args(ctx, operation, p, &mut args, sensitive)?;
            }
            (Op::Reboot, P::Reboot(p)) => {
                args.extend(self.access_key_args(ctx, operation, shape, base)?);
                if p.use_ssh {
                    args.push("--use_ssh".to_string());
                }
            }
            (Op::RunHooks, P::RunHooks(p)) => {
                self.run_hooks_args(ctx, operation, shape, p, &mut args)?;
            }
            (Op::WaitForSSH, _) => {
                tracing::info!("Connecting to node {}", base.node_name);
                args.extend(self.access_key_args(ctx, operation, shape, base)?);
            }
            (operation, params) => {
                return Err(CompileError::TypeMismatch {
                    operation,
                    params: params.variant_name(),
                });
            }
        }

        Ok(args)
    }

    fn create_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        p: &CreateParams,
        args: &mut Vec<String>,
        scratch: &mut ScratchSpace,
    ) -> Result<()> {
        let cloud = ctx.cloud();
        if cloud != CloudType::Onprem {
            let instance_type = required(p.base.instance_type.as_deref(), "instance type", cloud)?;
            let subnet = required(p.subnet_id.as_deref(), "subnet", cloud)?;
            args.push("--instance_type".to_string());
            args.push(instance_type.to_string());
            args.push("--cloud_subnet".to_string());
            args.push(subnet.to_string());

            if self.config.cloud_enabled {
                if let Some(secondary) = &p.secondary_subnet_id {
                    args.push("--cloud_subnet_secondary".to_string());
                    args.push(secondary.clone());
                }
                if is_low_mem_instance_type(instance_type) {
                    tracing::info!(
                        "Detected low memory instance type. Setting up nodes using low boot disk size."
                    );
                    args.push("--boot_disk_size_gb".to_string());
                    args.push(LOW_MEM_BOOT_DISK_SIZE_GB.to_string());
                }
            }

            args.extend(self.boot_script_args(&p.base.node_name, scratch)?);

            if let Some(image) = machine_image(p.machine_image.as_deref(), &ctx.region) {
                args.push("--machine_image".to_string());
                args.push(image);
            }
            if p.assign_public_ip {
                args.push("--assign_public_ip".to_string());
            }
            if self.config.cloud_enabled && p.assign_public_ip && p.assign_static_public_ip {
                args.push("--assign_static_public_ip".to_string());
            }
        }

        if cloud.instance_tags_enabled() {
            args.extend(instance_tag_args(
                &ctx.intent.instance_tags,
                cloud,
                &ctx.universe,
                ctx.node_uuid,
            )?);
        }

        if cloud == CloudType::Aws {
            if let Some(cmk_arn) = &p.cmk_arn {
                args.push("--cmk_res_name".to_string());
                args.push(cmk_arn.clone());
            }
            if let Some(ip_arn) = &p.ip_arn_string {
                args.push("--iam_profile_arn".to_string());
                args.push(ip_arn.clone());
            }
        }

        if cloud == CloudType::Azu {
            if let Some(vnet) = ctx.region.vnet_name.as_deref().filter(|v| !v.is_empty()) {
                args.push("--vpcId".to_string());
                args.push(vnet.to_string());
            }
        }

        args.extend(self.access_key_args(ctx, operation, shape, &p.base)?);

        if let Some(device) = &p.base.device_info {
            args.extend(device_args(cloud, device));
            if let Some(storage_type) = device.storage_type {
                args.push("--volume_type".to_string());
                args.push(storage_type.volume_type().to_string());
                if let (true, Some(iops)) = (storage_type.is_iops_provisioning(), device.disk_iops)
                {
                    args.push("--disk_iops".to_string());
                    args.push(iops.to_string());
                }
                if let (true, Some(throughput)) =
                    (storage_type.is_throughput_provisioning(), device.throughput)
                {
                    args.push("--disk_throughput".to_string());
                    args.push(throughput.to_string());
                }
            }
        }

        if operation == NodeOperation::Create {
            args.push("--as_json".to_string());
        }
        Ok(())
    }

    fn provision_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        p: &ProvisionParams,
        args: &mut Vec<String>,
        scratch: &mut ScratchSpace,
    ) -> Result<()> {
        let cloud = ctx.cloud();

        // Device names for mounting depend on these
        if cloud == CloudType::Aws {
            args.push("--instance_type".to_string());
            args.push(p.base.instance_type().to_string());
        }
        if cloud == CloudType::Gcp {
            if let Some(image) = machine_image(p.machine_image.as_deref(), &ctx.region) {
                args.push("--machine_image".to_string());
                args.push(image);
            }
        }

        args.extend(vm_image_args(
            &ctx.universe,
            cloud,
            p.vm_upgrade,
            !p.ignore_use_custom_image_config,
        ));

        if p.is_systemd_upgrade {
            args.push("--skip_preprovision".to_string());
            args.push("--tags".to_string());
            args.push("systemd_upgrade".to_string());
            args.push("--systemd_services".to_string());
        } else if p.use_systemd {
            args.push("--systemd_services".to_string());
        }

        if p.use_time_sync && cloud.is_public_cloud() {
            args.push("--use_chrony".to_string());
        }

        if cloud == CloudType::Aws {
            if let Some(path) = p.remote_package_path.as_deref().filter(|p| !p.is_empty()) {
                args.push("--remote_package_path".to_string());
                args.push(path.to_string());
            }
        }

        args.extend(self.boot_script_args(&p.base.node_name, scratch)?);
        args.extend(self.access_key_args(ctx, operation, shape, &p.base)?);

        if let Some(device) = &p.base.device_info {
            args.extend(device_args(cloud, device));
            if let (Some(storage_type), CloudType::Gcp) = (device.storage_type, cloud) {
                args.push("--volume_type".to_string());
                args.push(storage_type.volume_type().to_string());
            }
        }

        if let Some(path) = self.thirdparty_package_path() {
            args.push("--local_package_path".to_string());
            args.push(path);
        }

        args.push("--pg_max_mem_mb".to_string());
        args.push(self.config.postgres_max_mem_mb.to_string());

        if cloud == CloudType::Azu {
            if let Some(node) = ctx.node(&p.base.node_name) {
                let luns = &node.cloud_info.lun_indexes;
                if !luns.is_empty() {
                    args.push("--lun_indexes".to_string());
                    args.push(
                        luns.iter()
                            .map(u32::to_string)
                            .collect::<Vec<_>>()
                            .join(","),
                    );
                }
            }
        }
        Ok(())
    }

    fn destroy_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        p: &DestroyParams,
        args: &mut Vec<String>,
    ) -> Result<()> {
        let node_ip = p.node_ip.as_deref().filter(|ip| !ip.is_empty());
        if ctx.node_uuid.is_none() && node_ip.is_none() {
            return Err(CompileError::InvalidParameter(
                "at least one of node UUID or IP must be specified".to_string(),
            ));
        }
        push_instance_and_ip(args, p.base.instance_type(), node_ip);
        if let Some(node_uuid) = ctx.node_uuid {
            args.push("--node_uuid".to_string());
            args.push(node_uuid.to_string());
        }
        if let Some(device) = &p.base.device_info {
            args.extend(device_args(ctx.cloud(), device));
        }
        args.extend(self.access_key_args(ctx, operation, shape, &p.base)?);
        if ctx.intent.assign_static_public_ip {
            args.push("--delete_static_public_ip".to_string());
        }
        Ok(())
    }

    fn instance_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        p: &InstanceParams,
        args: &mut Vec<String>,
    ) -> Result<()> {
        let node_ip = p.node_ip.as_deref().filter(|ip| !ip.is_empty());
        push_instance_and_ip(args, p.base.instance_type(), node_ip);
        if let Some(device) = &p.base.device_info {
            args.extend(device_args(ctx.cloud(), device));
        }
        args.extend(self.access_key_args(ctx, operation, shape, &p.base)?);
        Ok(())
    }

    fn control_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        p: &ControlParams,
        args: &mut Vec<String>,
    ) -> Result<()> {
        args.push(p.process.clone());
        args.push(p.command.clone());
        if p.use_systemd {
            args.push("--systemd_services".to_string());
        }
        if p.check_volumes_attached {
            let cluster = p
                .base
                .placement_uuid
                .and_then(|uuid| ctx.universe.cluster(&uuid));
            let node = ctx.node(&p.base.node_name);
            if let (Some(cluster), Some(node)) = (cluster, node) {
                let intent = &cluster.user_intent;
                let num_volumes = intent
                    .device_info_for_node(node)
                    .and_then(|d| d.num_volumes);
                if let (Some(num_volumes), true) =
                    (num_volumes, intent.provider_type != CloudType::Onprem)
                {
                    args.push("--num_volumes".to_string());
                    args.push(num_volumes.to_string());
                }
            }
        }
        args.extend(self.access_key_args(ctx, operation, shape, &p.base)?);
        Ok(())
    }

    fn tags_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        p: &InstanceActionParams,
        args: &mut Vec<String>,
    ) -> Result<()> {
        let cloud = ctx.cloud();
        let tags = p.tags.as_ref().unwrap_or(&ctx.intent.instance_tags);
        if tags.is_empty() && p.delete_tags.is_empty() {
            return Err(CompileError::NoTags);
        }
        if !cloud.instance_tags_enabled() {
            return Err(CompileError::UnsupportedProvider(cloud));
        }
        args.extend(instance_tag_args(tags, cloud, &ctx.universe, ctx.node_uuid)?);
        if !p.delete_tags.is_empty() {
            args.push("--remove_tags".to_string());
            args.push(p.delete_tags.clone());
        }
        if cloud == CloudType::Azu {
            if let Some(device) = &p.base.device_info {
                args.extend(device_args(cloud, device));
            }
            args.extend(self.access_key_args(ctx, operation, shape, &p.base)?);
        }
        Ok(())
    }

    fn transfer_xcluster_certs_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        p: &TransferXClusterCertsParams,
        args: &mut Vec<String>,
    ) -> Result<()> {
        args.push("--action".to_string());
        args.push(p.action.to_string());
        if p.action == XClusterCertAction::Copy {
            let root_cert_path = p.root_cert_path.as_ref().ok_or_else(|| {
                CompileError::InvalidParameter(
                    "root_cert_path is required to copy xCluster certificates".to_string(),
                )
            })?;
            args.push("--root_cert_path".to_string());
            args.push(root_cert_path.display().to_string());
        }
        args.push("--replication_config_name".to_string());
        args.push(p.replication_group_name.clone());
        if let Some(dir) = &p.producer_certs_dir_on_target {
            args.push("--producer_certs_dir".to_string());
            args.push(dir.display().to_string());
        }
        args.extend(self.access_key_args(ctx, operation, shape, &p.base)?);
        Ok(())
    }

    fn precheck_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        base: &NodeTaskParams,
        args: &mut Vec<String>,
    ) -> Result<()> {
        args.extend(self.access_key_args(ctx, operation, shape, base)?);
        if let Some(device) = &base.device_info {
            args.extend(device_args(ctx.cloud(), device));
        }

        let access_key = self.intent_access_key(ctx)?;
        args.extend(communication_port_args(
            &PortApis {
                ycql: ctx.intent.enable_ycql,
                ysql: ctx.intent.enable_ysql,
                yedis: ctx.intent.enable_yedis,
                node_exporter: access_key.key_info.install_node_exporter,
            },
            &base.communication_ports,
        ));

        let resolver = CertificateResolver::new(self.store.as_ref(), self.issuer.as_ref());
        args.extend(resolver.precheck_args(
            base.root_ca,
            base.client_root_ca,
            ctx.intent.enable_node_to_node_encrypt,
            base.universe_uuid,
        )?);

        let skip = resolve_skip_cert_validation(
            self.config.skip_cert_validation.as_deref(),
            &ctx.intent,
            &BTreeMap::new(),
            &BTreeSet::new(),
        );
        args.extend(skip_cert_validation_args(skip));
        Ok(())
    }

    fn node_access_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        p: &NodeAccessParams,
        args: &mut Vec<String>,
        sensitive: &mut SensitiveArgs,
    ) -> Result<()> {
        let provider = &ctx.provider;
        let access_key = self
            .store
            .access_key(&provider.uuid, &p.access_key_code)
            .ok_or_else(|| CompileError::missing(format!("access key {}", p.access_key_code)))?;
        let task_key = self
            .store
            .access_key(&provider.uuid, &p.task_access_key_code)
            .ok_or_else(|| {
                CompileError::missing(format!("access key {}", p.task_access_key_code))
            })?;

        match operation {
            NodeOperation::VerifyNodeSSHAccess => {
                tracing::info!("Verifying access to node {}", p.base.node_name);
            }
            NodeOperation::AddAuthorizedKey => {
                tracing::info!(
                    "Adding a new key to authorized keys of node {}",
                    p.base.node_name
                );
            }
            _ => {
                tracing::info!(
                    "Removing a key from authorized keys of node {}",
                    p.base.node_name
                );
            }
        }

        let ssh_port = access_key.key_info.ssh_port.unwrap_or(provider.ssh_port);
        args.extend(node_ssh_args(&access_key, &p.ssh_user, ssh_port)?);

        let task_private_key = task_key.key_info.private_key.clone().ok_or_else(|| {
            CompileError::missing(format!(
                "no private key file for access key {}",
                task_key.key_code
            ))
        })?;

        if operation != NodeOperation::VerifyNodeSSHAccess {
            // Content is only required for an uploaded public key
            let content = task_key.public_key_content();
            if task_key.key_info.public_key.is_some() && content.is_empty() {
                return Err(CompileError::EmptyPublicKey);
            }
            sensitive.insert("--public_key_content", content);
        }

        let key_flag = if operation == NodeOperation::RemoveAuthorizedKey {
            "--old_private_key_file"
        } else {
            "--new_private_key_file"
        };
        sensitive.insert(key_flag, task_private_key);
        Ok(())
    }

    fn run_hooks_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        p: &RunHooksParams,
        args: &mut Vec<String>,
    ) -> Result<()> {
        args.push("--execution_lang".to_string());
        args.push(p.hook.execution_lang.to_string());
        args.push("--trigger".to_string());
        args.push(p.trigger.clone());
        args.push("--hook_path".to_string());
        args.push(p.hook_path.clone());
        args.push("--parent_task".to_string());
        args.push(p.parent_task.clone());
        if p.hook.use_sudo {
            args.push("--use_sudo".to_string());
        }
        if !p.hook.runtime_args.is_empty() {
            args.push("--runtime_args".to_string());
            args.push(serde_json::to_string(&p.hook.runtime_args)?);
        }
        args.extend(self.access_key_args(ctx, operation, shape, &p.base)?);
        Ok(())
    }

    /// Access key arguments, empty when the cluster uses the platform key
    pub(crate) fn access_key_args(
        &self,
        ctx: &NodeContext,
        operation: NodeOperation,
        shape: ParamsShape,
        base: &NodeTaskParams,
    ) -> Result<Vec<String>> {
        let key_code = &ctx.intent.access_key_code;
        if let Some(default_code) = &self.config.default_access_key_code {
            if key_code.eq_ignore_ascii_case(default_code) {
                return Ok(Vec::new());
            }
        }

        let access_key = self.intent_access_key(ctx)?;
        let node_exporter_port = ctx
            .node(&base.node_name)
            .map(|n| n.ports.node_exporter_port)
            .unwrap_or(base.communication_ports.node_exporter_port);

        Ok(AccessKeyArgBuilder {
            operation,
            shape,
            key_info: &access_key.key_info,
            provider_type: ctx.cloud(),
            key_code,
            ssh_port: access_key
                .key_info
                .ssh_port
                .unwrap_or(ctx.provider.ssh_port),
            node_exporter_port,
            security_group_id: ctx.region.security_group_id.as_deref(),
        }
        .build())
    }

    fn intent_access_key(&self, ctx: &NodeContext) -> Result<nodeops_cloud::AccessKey> {
        self.store
            .access_key(&ctx.provider.uuid, &ctx.intent.access_key_code)
            .ok_or_else(|| {
                CompileError::missing(format!(
                    "access key {} of provider {}",
                    ctx.intent.access_key_code, ctx.provider.uuid
                ))
            })
    }

    fn cloud_args(&self, ctx: &NodeContext, node_name: &str) -> Result<Vec<String>> {
        let mut args = vec!["--zone".to_string(), ctx.zone.code.clone()];
        match ctx.cloud() {
            CloudType::Docker => {
                let network = self.config.docker_network.as_ref().ok_or_else(|| {
                    CompileError::InvalidParameter("docker_network is not set".to_string())
                })?;
                args.push("--network".to_string());
                args.push(network.clone());
            }
            CloudType::Onprem => {
                // The machine record may already be released
                let metadata = self
                    .store
                    .node_instance_by_name(node_name)
                    .map(|n| n.details_json())
                    .unwrap_or_else(|| "{}".to_string());
                args.push("--node_metadata".to_string());
                args.push(metadata);
            }
            _ => {}
        }
        Ok(args)
    }

    /// `--boot_script` arguments for the configured script, if any
    ///
    /// A script starting with a shebang is taken as the body, anything else
    /// as a path to read it from.
    fn boot_script_args(&self, node_name: &str, scratch: &mut ScratchSpace) -> Result<Vec<String>> {
        let Some(boot_script) = &self.config.boot_script else {
            return Ok(Vec::new());
        };
        let mut contents = if boot_script.starts_with("#!") {
            boot_script.clone().into_bytes()
        } else {
            std::fs::read(boot_script)?
        };
        contents.extend_from_slice(boot_script_complete().as_bytes());
        let path = scratch.create_file(node_name, BOOT_SCRIPT_SUFFIX, &contents)?;

        Ok(vec![
            "--boot_script".to_string(),
            path.display().to_string(),
            "--boot_script_token".to_string(),
            BOOT_SCRIPT_TOKEN.to_string(),
        ])
    }

    fn thirdparty_package_path(&self) -> Option<String> {
        self.config
            .thirdparty_package_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty() && Path::is_dir(p))
            .map(|p| p.display().to_string())
    }

    fn executor_env(&self) -> BTreeMap<String, String> {
        let executor = &self.config.executor;
        let mut env = BTreeMap::new();
        env.insert("ANSIBLE_STRATEGY".to_string(), executor.strategy.clone());
        env.insert(
            "ANSIBLE_TIMEOUT".to_string(),
            executor.conn_timeout_secs.to_string(),
        );
        env.insert(
            "ANSIBLE_VERBOSITY".to_string(),
            executor.verbosity.to_string(),
        );
        if executor.debug {
            env.insert("ANSIBLE_DEBUG".to_string(), "True".to_string());
        }
        if executor.diff_always {
            env.insert("ANSIBLE_DIFF_ALWAYS".to_string(), "True".to_string());
        }
        env.insert(
            "ANSIBLE_LOCAL_TEMP".to_string(),
            executor.local_temp.clone(),
        );
        tracing::trace!("Executor env vars {:?}", env);
        env
    }
}

fn frame(
    cloud: CloudType,
    region_code: &str,
    cloud_args: Vec<String>,
    operation: NodeOperation,
    args: Vec<String>,
) -> Vec<String> {
    let mut framed = vec![
        cloud.code().to_string(),
        "--region".to_string(),
        region_code.to_string(),
    ];
    framed.extend(cloud_args);
    framed.push(INSTANCE_COMMAND.to_string());
    framed.push(operation.command_name().to_string());
    framed.extend(args);
    framed
}

fn required<'a>(value: Option<&'a str>, what: &str, cloud: CloudType) -> Result<&'a str> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        CompileError::InvalidParameter(format!("{} is required to create a {} node", what, cloud))
    })
}

fn push_instance_and_ip(args: &mut Vec<String>, instance_type: &str, node_ip: Option<&str>) {
    args.push("--instance_type".to_string());
    args.push(instance_type.to_string());
    if let Some(ip) = node_ip {
        args.push("--node_ip".to_string());
        args.push(ip.to_string());
    }
}

/// Explicit image, else the region default
fn machine_image(explicit: Option<&str>, region: &Region) -> Option<String> {
    explicit
        .or(region.yb_image.as_deref())
        .filter(|image| !image.is_empty())
        .map(str::to_string)
}

/// Storage layout arguments
pub(crate) fn device_args(cloud: CloudType, device: &DeviceInfo) -> Vec<String> {
    let mut args = Vec::new();
    match (device.num_volumes, &device.mount_points) {
        (Some(num_volumes), _) if cloud != CloudType::Onprem => {
            args.push("--num_volumes".to_string());
            args.push(num_volumes.to_string());
        }
        (_, Some(mount_points)) => {
            args.push("--mount_points".to_string());
            args.push(mount_points.clone());
        }
        _ => {}
    }
    if let Some(volume_size) = device.volume_size {
        args.push("--volume_size".to_string());
        args.push(volume_size.to_string());
    }
    args
}

/// `--skip_tags yb-prebuilt-ami` when the node boots from a custom image
pub(crate) fn vm_image_args(
    universe: &Universe,
    cloud: CloudType,
    vm_upgrade: VmUpgradeTaskType,
    use_custom_image_by_default: bool,
) -> Vec<String> {
    if !matches!(cloud, CloudType::Aws | CloudType::Gcp) {
        return Vec::new();
    }
    let skip_tags = match vm_upgrade {
        VmUpgradeTaskType::None => use_custom_image_by_default && universe.use_custom_image(),
        VmUpgradeTaskType::VmUpgradeWithCustomImages => true,
        VmUpgradeTaskType::VmUpgradeWithBaseImages => false,
    };
    if skip_tags {
        vec!["--skip_tags".to_string(), "yb-prebuilt-ami".to_string()]
    } else {
        Vec::new()
    }
}

/// Instance types too small for the default boot disk
fn is_low_mem_instance_type(instance_type: &str) -> bool {
    LOW_MEM_INSTANCE_PREFIXES
        .iter()
        .any(|prefix| instance_type.starts_with(prefix))
}

/// APIs whose ports a precheck verifies
pub(crate) struct PortApis {
    pub ycql: bool,
    pub ysql: bool,
    pub yedis: bool,
    pub node_exporter: bool,
}

pub(crate) fn communication_port_args(apis: &PortApis, ports: &CommunicationPorts) -> Vec<String> {
    let mut pairs = vec![
        ("--master_http_port", ports.master_http_port),
        ("--master_rpc_port", ports.master_rpc_port),
        ("--tserver_http_port", ports.tserver_http_port),
        ("--tserver_rpc_port", ports.tserver_rpc_port),
    ];
    if apis.ycql {
        pairs.push(("--cql_proxy_http_port", ports.yql_server_http_port));
        pairs.push(("--cql_proxy_rpc_port", ports.yql_server_rpc_port));
    }
    if apis.ysql {
        pairs.push(("--ysql_proxy_http_port", ports.ysql_server_http_port));
        pairs.push(("--ysql_proxy_rpc_port", ports.ysql_server_rpc_port));
    }
    if apis.yedis {
        pairs.push(("--redis_proxy_http_port", ports.redis_server_http_port));
        pairs.push(("--redis_proxy_rpc_port", ports.redis_server_rpc_port));
    }
    if apis.node_exporter {
        pairs.push(("--node_exporter_http_port", ports.node_exporter_port));
    }
    pairs
        .into_iter()
        .flat_map(|(flag, port)| [flag.to_string(), port.to_string()])
        .collect()
}
