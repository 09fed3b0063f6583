//! nodeops command compiler
//!
//! Turns a typed node operation (create, provision, configure, destroy, ...)
//! plus the cluster state it refers to into the argument vector,
//! environment and sensitive values of one provisioning executor
//! invocation.
//!
//! ```text
//! NodeOperation + NodeOperationParams
//!            │
//! ┌──────────▼──────────────────────────────────────┐
//! │                CommandCompiler                   │
//! │  access keys · certificates · gflags · tags      │
//! │  TLS toggle / cert rotation state machines       │
//! └──────────┬──────────────────────────────────────┘
//!            │ CompiledCommand (args, env, sensitive)
//! ┌──────────▼──────────┐
//! │    NodeExecutor     │  ProcessExecutor: devops command
//! └─────────────────────┘
//! ```

pub mod access_key;
pub mod cert_rotation;
pub mod certs;
pub mod command;
pub mod compiler;
mod configure;
pub mod error;
pub mod executor;
pub mod gflags;
pub mod intent;
pub mod operation;
pub mod params;
pub mod scratch;
pub mod skip_cert;
pub mod tags;
pub mod tls_toggle;
pub mod ysql;

// Re-exports
pub use certs::{
    CaRole, CertArgsRequest, CertPathSet, CertificateIssuer, CertificateResolver, LocalIssuer,
    ServerCertRequest, SubjectAltName,
};
pub use command::{CompiledCommand, SensitiveArgs};
pub use compiler::{BOOT_SCRIPT_TOKEN, CommandCompiler, DETACHED_NODE_NAME};
pub use error::{CompileError, ErrorKind, Result};
pub use executor::{ExecutionOutput, NodeExecutor, ProcessExecutor};
pub use intent::UserIntentResolver;
pub use operation::{CertRotateAction, CertRotationType, NodeOperation, ProcessType};
pub use params::{
    ConfigureParams, ConfigureTask, ControlParams, CreateParams, CreateRootVolumesParams,
    DestroyParams, DetachedNodeParams, ExecutionLang, HookSpec, InstanceActionParams,
    InstanceParams, NodeAccessParams, NodeOperationParams, NodeTaskParams, ParamsShape,
    ProvisionParams, RebootParams, ReplaceRootVolumeParams, RunHooksParams, SoftwareSubTask,
    TransferXClusterCertsParams, VmUpgradeTaskType, XClusterCertAction,
};
pub use skip_cert::SkipCertValidation;
pub use tags::filter_instance_tags;
pub use tls_toggle::{NodeToNodeChange, TlsTogglePhase};
pub use ysql::{DatabaseUser, SshYsqlShell, UserProvisioner, YsqlShell, compare_yb_versions};
