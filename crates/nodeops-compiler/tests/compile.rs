//! Command framing and per-operation arguments

mod common;

use async_trait::async_trait;
use common::*;
use nodeops_cloud::CloudType;
use nodeops_compiler::{
    BOOT_SCRIPT_TOKEN, CompiledCommand, ControlParams, CreateParams, DETACHED_NODE_NAME,
    DestroyParams, DetachedNodeParams, ErrorKind, ExecutionOutput, InstanceActionParams,
    NodeAccessParams, NodeExecutor, NodeOperation, NodeOperationParams, NodeTaskParams,
    ProvisionParams, Result, VmUpgradeTaskType,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

fn create(base: NodeTaskParams, subnet: Option<&str>) -> NodeOperationParams {
    NodeOperationParams::Create(CreateParams {
        base,
        subnet_id: subnet.map(str::to_string),
        secondary_subnet_id: None,
        machine_image: None,
        assign_public_ip: true,
        assign_static_public_ip: false,
        cmk_arn: None,
        ip_arn_string: None,
    })
}

fn tags(base: NodeTaskParams, tags: Option<BTreeMap<String, String>>) -> NodeOperationParams {
    NodeOperationParams::InstanceAction(InstanceActionParams {
        base,
        tags,
        delete_tags: String::new(),
    })
}

fn s(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_aws_create_command() {
    let compiler = Fixture::new(CloudType::Aws).compiler();
    let cmd = compiler
        .compile(NodeOperation::Create, &create(base(), Some("subnet-1")))
        .unwrap();

    let node_uuid = Uuid::from_u128(0x90);
    let tags = serde_json::to_string(&BTreeMap::from([
        ("customer-uuid", CUSTOMER.to_string()),
        ("node-uuid", node_uuid.to_string()),
        ("universe-uuid", UNIVERSE.to_string()),
    ]))
    .unwrap();

    let mut expected = s(&[
        "aws",
        "--region",
        REGION_CODE,
        "--zone",
        ZONE_CODE,
        "instance",
        "create",
        "--instance_type",
        "c5.large",
        "--cloud_subnet",
        "subnet-1",
        "--assign_public_ip",
        "--instance_tags",
    ]);
    expected.push(tags);
    expected.extend(s(&[
        "--private_key_file",
        "/opt/keys/test-key.pem",
        "--key_pair_name",
        KEY_CODE,
        "--custom_ssh_port",
        "22",
        "--ssh_user",
        "centos",
        "--as_json",
        NODE_NAME,
    ]));
    assert_eq!(cmd.args, expected);
    assert!(cmd.sensitive.is_empty());
}

#[test]
fn test_executor_env() {
    let compiler = Fixture::new(CloudType::Aws)
        .with_config(|c| c.executor.debug = true)
        .compiler();
    let cmd = compiler
        .compile(NodeOperation::Create, &create(base(), Some("subnet-1")))
        .unwrap();

    assert_eq!(cmd.env["ANSIBLE_STRATEGY"], "linear");
    assert_eq!(cmd.env["ANSIBLE_TIMEOUT"], "60");
    assert_eq!(cmd.env["ANSIBLE_DEBUG"], "True");
    assert_eq!(cmd.env["ANSIBLE_LOCAL_TEMP"], "/tmp/nodeops-executor");
    assert!(!cmd.env.contains_key("ANSIBLE_DIFF_ALWAYS"));
}

#[test]
fn test_aws_provision() {
    let compiler = Fixture::new(CloudType::Aws)
        .with_key_info(|key| {
            key.install_node_exporter = true;
            key.set_up_chrony = true;
            key.ntp_servers = vec!["10.0.0.254".to_string()];
        })
        .compiler();
    let cmd = compiler
        .compile(NodeOperation::Provision, &provision(base()))
        .unwrap();

    let op = position(&cmd.args, "provision");
    assert_eq!(cmd.args[op + 1], "--instance_type");
    assert!(cmd.has_flag("--systemd_services"));
    assert_eq!(cmd.flag_value("--key_pair_name"), Some(KEY_CODE));
    assert_eq!(cmd.flag_value("--node_exporter_port"), Some("9300"));
    assert_eq!(cmd.flag_values("--ntp_server"), vec!["10.0.0.254"]);
    assert!(cmd.has_flag("--pg_max_mem_mb"));
    assert!(!cmd.has_flag("--security_group_id"));
    assert!(!cmd.has_flag("--as_json"));
}

#[test]
fn test_onprem_create_without_instance_type_or_subnet() {
    let compiler = Fixture::new(CloudType::Onprem)
        .with_node_instance(serde_json::json!({ "ip": NODE_IP }))
        .compiler();
    let mut params = base();
    params.instance_type = None;

    let cmd = compiler
        .compile(NodeOperation::Create, &create(params, None))
        .unwrap();

    assert_eq!(&cmd.args[..5], &s(&["onprem", "--region", REGION_CODE, "--zone", ZONE_CODE])[..]);
    assert_eq!(cmd.flag_value("--node_metadata"), Some(r#"{"ip":"10.0.0.1"}"#));
    assert!(!cmd.has_flag("--instance_type"));
    assert!(!cmd.has_flag("--cloud_subnet"));
    assert!(!cmd.has_flag("--instance_tags"));
    assert!(!cmd.has_flag("--key_pair_name"));
    assert!(cmd.has_flag("--as_json"));
    assert_eq!(cmd.node_name(), Some(NODE_NAME));
}

#[test]
fn test_onprem_without_machine_record_gets_empty_metadata() {
    let compiler = Fixture::new(CloudType::Onprem).compiler();
    let cmd = compiler
        .compile(
            NodeOperation::Destroy,
            &NodeOperationParams::Destroy(DestroyParams {
                base: base(),
                node_ip: Some(NODE_IP.to_string()),
            }),
        )
        .unwrap();
    assert_eq!(cmd.flag_value("--node_metadata"), Some("{}"));
    assert!(cmd.has_flag("--install_node_exporter"));
}

#[test]
fn test_cloud_create_requires_subnet() {
    let compiler = Fixture::new(CloudType::Gcp).compiler();
    let err = compiler
        .compile(NodeOperation::Create, &create(base(), None))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[test]
fn test_params_must_fit_operation() {
    let compiler = Fixture::new(CloudType::Aws).compiler();
    let err = compiler
        .compile(NodeOperation::Create, &NodeOperationParams::Generic(base()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let err = compiler
        .compile(
            NodeOperation::Configure,
            &create(base(), Some("subnet-1")),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_unknown_universe() {
    let compiler = Fixture::new(CloudType::Aws).compiler();
    let params = NodeTaskParams::new(Uuid::from_u128(0xdead), NODE_NAME, ZONE);
    let err = compiler
        .compile(NodeOperation::WaitForSSH, &NodeOperationParams::Generic(params))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingState);
}

#[test]
fn test_docker_requires_network() {
    let fixture = Fixture::new(CloudType::Docker);
    let err = fixture
        .compiler()
        .compile(NodeOperation::WaitForSSH, &NodeOperationParams::Generic(base()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    let compiler = fixture
        .with_config(|c| c.docker_network = Some("yb-net".to_string()))
        .compiler();
    let cmd = compiler
        .compile(NodeOperation::WaitForSSH, &NodeOperationParams::Generic(base()))
        .unwrap();
    assert_eq!(cmd.flag_value("--network"), Some("yb-net"));
    assert!(position(&cmd.args, "--network") < position(&cmd.args, "instance"));
}

#[test]
fn test_default_access_key_is_skipped() {
    let compiler = Fixture::new(CloudType::Aws)
        .with_config(|c| c.default_access_key_code = Some("TEST-KEY".to_string()))
        .compiler();
    let cmd = compiler
        .compile(NodeOperation::WaitForSSH, &NodeOperationParams::Generic(base()))
        .unwrap();
    assert!(!cmd.has_flag("--private_key_file"));
    assert!(!cmd.has_flag("--custom_ssh_port"));
}

#[test]
fn test_wait_for_ssh_has_no_key_pair() {
    let compiler = Fixture::new(CloudType::Aws).compiler();
    let cmd = compiler
        .compile(NodeOperation::WaitForSSH, &NodeOperationParams::Generic(base()))
        .unwrap();
    assert_eq!(cmd.flag_value("--private_key_file"), Some("/opt/keys/test-key.pem"));
    assert_eq!(cmd.flag_value("--ssh_user"), Some("centos"));
    assert!(!cmd.has_flag("--key_pair_name"));
}

#[test]
fn test_tags_need_tags_or_removals() {
    for cloud in [
        CloudType::Aws,
        CloudType::Gcp,
        CloudType::Azu,
        CloudType::Onprem,
        CloudType::Docker,
    ] {
        let compiler = Fixture::new(cloud).compiler();
        let err = compiler
            .compile(NodeOperation::Tags, &tags(base(), Some(BTreeMap::new())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoTags, "{}", cloud);
    }
}

#[test]
fn test_tags_unsupported_provider() {
    let compiler = Fixture::new(CloudType::Onprem).compiler();
    let err = compiler
        .compile(
            NodeOperation::Tags,
            &tags(base(), Some(BTreeMap::from([("team".to_string(), "db".to_string())]))),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedProvider);
}

#[test]
fn test_tags_filter_name_and_remove() {
    let compiler = Fixture::new(CloudType::Aws)
        .with_intent(|intent| {
            intent.instance_tags = BTreeMap::from([
                ("Name".to_string(), "custom".to_string()),
                ("team".to_string(), "db".to_string()),
            ]);
        })
        .compiler();
    let params = NodeOperationParams::InstanceAction(InstanceActionParams {
        base: base(),
        tags: None,
        delete_tags: "owner,env".to_string(),
    });
    let cmd = compiler.compile(NodeOperation::Tags, &params).unwrap();

    let emitted: BTreeMap<String, String> =
        serde_json::from_str(cmd.flag_value("--instance_tags").unwrap()).unwrap();
    assert!(!emitted.contains_key("Name"));
    assert_eq!(emitted["team"], "db");
    assert_eq!(emitted["universe-uuid"], UNIVERSE.to_string());
    assert_eq!(cmd.flag_value("--remove_tags"), Some("owner,env"));
    // Only Azure tag updates log in to the node
    assert!(!cmd.has_flag("--private_key_file"));
}

#[test]
fn test_destroy_requires_uuid_or_ip() {
    let fixture = Fixture::new(CloudType::Onprem).with_node(|node| node.node_uuid = None);
    let params = NodeOperationParams::Destroy(DestroyParams {
        base: base(),
        node_ip: Some(String::new()),
    });
    let err = fixture
        .compiler()
        .compile(NodeOperation::Destroy, &params)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[test]
fn test_cloud_node_uuid_is_derived() {
    let compiler = Fixture::new(CloudType::Aws).compiler();
    let mut params = base();
    params.node_name = "yb-test-n9".to_string();
    let cmd = compiler
        .compile(
            NodeOperation::Destroy,
            &NodeOperationParams::Destroy(DestroyParams {
                base: params,
                node_ip: None,
            }),
        )
        .unwrap();
    let expected = Uuid::new_v5(&UNIVERSE, b"yb-test-n9").to_string();
    assert_eq!(cmd.flag_value("--node_uuid"), Some(expected.as_str()));
    assert_eq!(cmd.node_name(), Some("yb-test-n9"));
}

#[test]
fn test_control_counts_volumes() {
    let compiler = Fixture::new(CloudType::Aws)
        .with_intent(|intent| {
            intent.device_info = serde_json::from_value(serde_json::json!({
                "num_volumes": 2,
                "volume_size": 100,
            }))
            .unwrap();
        })
        .compiler();
    let params = NodeOperationParams::Control(ControlParams {
        base: base(),
        process: "tserver".to_string(),
        command: "start".to_string(),
        use_systemd: true,
        check_volumes_attached: true,
    });
    let cmd = compiler.compile(NodeOperation::Control, &params).unwrap();

    let op = position(&cmd.args, "control");
    assert_eq!(cmd.args[op + 1], "tserver");
    assert_eq!(cmd.args[op + 2], "start");
    assert!(cmd.has_flag("--systemd_services"));
    assert_eq!(cmd.flag_value("--num_volumes"), Some("2"));
}

#[test]
fn test_add_authorized_key_hides_key_material() {
    let fixture = Fixture::new(CloudType::Aws).with_access_key(nodeops_cloud::AccessKey {
        key_code: "rotated-key".to_string(),
        provider_uuid: PROVIDER,
        key_info: serde_json::from_value(serde_json::json!({
            "private_key": "/opt/keys/rotated.pem",
        }))
        .unwrap(),
        public_key_content: Some("ssh-ed25519 AAAA rotated".to_string()),
    });
    let params = NodeOperationParams::NodeAccess(NodeAccessParams {
        base: base(),
        access_key_code: KEY_CODE.to_string(),
        task_access_key_code: "rotated-key".to_string(),
        ssh_user: "centos".to_string(),
    });
    let cmd = fixture
        .compiler()
        .compile(NodeOperation::AddAuthorizedKey, &params)
        .unwrap();

    assert_eq!(
        cmd.sensitive.get("--public_key_content"),
        Some("ssh-ed25519 AAAA rotated")
    );
    assert_eq!(
        cmd.sensitive.get("--new_private_key_file"),
        Some("/opt/keys/rotated.pem")
    );
    assert!(!cmd.args.iter().any(|a| a.contains("rotated")));
    assert!(!cmd.to_string().contains("AAAA rotated"));
}

fn node_access_fixture(public_key: Option<&str>, content: Option<&str>) -> Fixture {
    let mut key_info = serde_json::json!({ "private_key": "/opt/keys/old.pem" });
    if let Some(path) = public_key {
        key_info["public_key"] = serde_json::json!(path);
    }
    Fixture::new(CloudType::Aws).with_access_key(nodeops_cloud::AccessKey {
        key_code: "old-key".to_string(),
        provider_uuid: PROVIDER,
        key_info: serde_json::from_value(key_info).unwrap(),
        public_key_content: content.map(str::to_string),
    })
}

fn node_access(task_key: &str) -> NodeOperationParams {
    NodeOperationParams::NodeAccess(NodeAccessParams {
        base: base(),
        access_key_code: KEY_CODE.to_string(),
        task_access_key_code: task_key.to_string(),
        ssh_user: "centos".to_string(),
    })
}

#[test]
fn test_remove_authorized_key_with_empty_uploaded_key() {
    let compiler = node_access_fixture(Some("/opt/keys/old.pub"), None).compiler();

    let err = compiler
        .compile(NodeOperation::RemoveAuthorizedKey, &node_access("old-key"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyPublicKey);

    let err = compiler
        .compile(NodeOperation::AddAuthorizedKey, &node_access("old-key"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyPublicKey);

    let cmd = compiler
        .compile(NodeOperation::VerifyNodeSSHAccess, &node_access("old-key"))
        .unwrap();
    assert!(!cmd.sensitive.contains("--public_key_content"));
}

#[test]
fn test_remove_authorized_key_without_uploaded_key() {
    let cmd = node_access_fixture(None, None)
        .compiler()
        .compile(NodeOperation::RemoveAuthorizedKey, &node_access("old-key"))
        .unwrap();

    assert_eq!(cmd.sensitive.get("--public_key_content"), Some(""));
    assert_eq!(
        cmd.sensitive.get("--old_private_key_file"),
        Some("/opt/keys/old.pem")
    );
}

#[test]
fn test_detached_precheck() {
    let fixture = Fixture::new(CloudType::Onprem)
        .with_node_instance(serde_json::json!({ "ip": "10.0.0.7", "instanceName": "rack-7" }));
    let params = DetachedNodeParams {
        provider_uuid: PROVIDER,
        region_uuid: REGION,
        instance_type: "c5.large".to_string(),
        node_instance_uuid: NODE_INSTANCE,
    };
    let cmd = fixture.compiler().compile_detached_precheck(&params).unwrap();

    assert_eq!(&cmd.args[..3], &s(&["onprem", "--region", REGION_CODE])[..]);
    let metadata: serde_json::Value =
        serde_json::from_str(cmd.flag_value("--node_metadata").unwrap()).unwrap();
    assert_eq!(metadata["nodeName"], DETACHED_NODE_NAME);
    assert_eq!(metadata["ip"], "10.0.0.7");
    assert_eq!(cmd.flag_value("--precheck_type"), Some("provision"));
    assert_eq!(cmd.flag_value("--mount_points"), Some("/mnt/d0"));
    assert_eq!(cmd.node_name(), Some(DETACHED_NODE_NAME));
    assert!(cmd.env.is_empty());
}

#[test]
fn test_boot_script_removed_after_compile() {
    let compiler = Fixture::new(CloudType::Aws)
        .with_config(|c| c.boot_script = Some("#!/bin/bash\necho hello".to_string()))
        .compiler();
    let cmd = compiler
        .compile(NodeOperation::Create, &create(base(), Some("subnet-1")))
        .unwrap();

    let path = cmd.flag_value("--boot_script").unwrap();
    assert!(path.ends_with("-boot.sh"));
    assert_eq!(cmd.flag_value("--boot_script_token"), Some(BOOT_SCRIPT_TOKEN));
    assert!(!Path::new(path).exists());
}

#[test]
fn test_boot_script_removed_after_failure() {
    let node_name = "yb-bootfail-n1";
    let mut fixture = Fixture::new(CloudType::Aws)
        .with_config(|c| c.boot_script = Some("#!/bin/bash\necho hello".to_string()));
    // Access key lookup fails after the script has been written
    fixture.snapshot.access_keys.clear();

    let mut params = base();
    params.node_name = node_name.to_string();
    let err = fixture
        .compiler()
        .compile(NodeOperation::Create, &create(params, Some("subnet-1")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingState);

    assert_eq!(scratch_leftovers(node_name), 0);
}

fn provision(base: NodeTaskParams) -> NodeOperationParams {
    NodeOperationParams::Provision(ProvisionParams {
        base,
        machine_image: None,
        use_systemd: true,
        is_systemd_upgrade: false,
        use_time_sync: false,
        remote_package_path: None,
        vm_upgrade: VmUpgradeTaskType::None,
        ignore_use_custom_image_config: false,
    })
}

fn scratch_leftovers(prefix: &str) -> usize {
    std::fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .count()
}

#[test]
fn test_provision_boot_script_removed_after_compile() {
    let compiler = Fixture::new(CloudType::Aws)
        .with_config(|c| c.boot_script = Some("#!/bin/bash\necho hello".to_string()))
        .compiler();
    let cmd = compiler
        .compile(NodeOperation::Provision, &provision(base()))
        .unwrap();

    let path = cmd.flag_value("--boot_script").unwrap();
    assert!(path.ends_with("-boot.sh"));
    assert!(!Path::new(path).exists());
}

#[test]
fn test_provision_boot_script_removed_after_failure() {
    let node_name = "yb-provfail-n1";
    let mut fixture = Fixture::new(CloudType::Aws)
        .with_config(|c| c.boot_script = Some("#!/bin/bash\necho hello".to_string()));
    fixture.snapshot.access_keys.clear();

    let mut params = base();
    params.node_name = node_name.to_string();
    let err = fixture
        .compiler()
        .compile(NodeOperation::Provision, &provision(params))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingState);
    assert_eq!(scratch_leftovers(node_name), 0);
}

/// Checks the boot script while the command runs
#[derive(Default)]
struct BootScriptProbe {
    seen: Mutex<Option<(String, String)>>,
}

#[async_trait]
impl NodeExecutor for BootScriptProbe {
    async fn run(&self, command: &CompiledCommand) -> Result<ExecutionOutput> {
        let path = command.flag_value("--boot_script").unwrap_or_default().to_string();
        let contents = std::fs::read_to_string(&path)?;
        *self.seen.lock().unwrap() = Some((path, contents));
        Ok(ExecutionOutput {
            stdout: "{}".to_string(),
            stderr: String::new(),
        })
    }
}

#[tokio::test]
async fn test_execute_keeps_boot_script_until_done() {
    let compiler = Fixture::new(CloudType::Aws)
        .with_config(|c| c.boot_script = Some("#!/bin/bash\necho hello".to_string()))
        .compiler();
    let probe = BootScriptProbe::default();

    let output = compiler
        .execute(
            NodeOperation::Create,
            &create(base(), Some("subnet-1")),
            &probe,
        )
        .await
        .unwrap();
    assert_eq!(output.stdout, "{}");

    let (path, contents) = probe.seen.lock().unwrap().take().unwrap();
    assert!(contents.starts_with("#!/bin/bash\necho hello"));
    assert!(contents.contains(BOOT_SCRIPT_TOKEN));
    assert!(contents.contains("/etc/yb-boot-script-complete"));
    assert!(!Path::new(&path).exists());
}
