//! Runtime configuration for nodeops
//!
//! Settings are read from a YAML file located with [`find_config_file`];
//! every field has a default so a missing file yields a usable config.

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Env var pointing directly at a config file
pub const CONFIG_PATH_ENV: &str = "NODEOPS_CONFIG_PATH";

const CONFIG_CANDIDATES: [&str; 2] = ["nodeops.local.yaml", "nodeops.yaml"];

/// Platform-wide runtime settings consulted while compiling node commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Managed-cloud deployment mode
    pub cloud_enabled: bool,

    /// Network used for docker-provider nodes
    pub docker_network: Option<String>,

    /// Access key code whose arguments the executor already knows
    pub default_access_key_code: Option<String>,

    /// Boot script run on first boot: either an inline script starting with
    /// `#!` or the path of a script file
    pub boot_script: Option<String>,

    /// Directory holding third-party packages for offline installs
    pub thirdparty_package_path: Option<PathBuf>,

    /// Forced certificate validation mode: ALL, HOSTNAME or NONE
    pub skip_cert_validation: Option<String>,

    /// Memory limit of the postgres process, 0 for unlimited
    pub postgres_max_mem_mb: u32,

    pub ybc: YbcConfig,

    pub releases: ReleasesConfig,

    pub gflags: GFlagsConfig,

    pub executor: ExecutorConfig,

    pub devops: DevopsConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cloud_enabled: false,
            docker_network: None,
            default_access_key_code: None,
            boot_script: None,
            thirdparty_package_path: None,
            skip_cert_validation: None,
            postgres_max_mem_mb: 0,
            ybc: YbcConfig::default(),
            releases: ReleasesConfig::default(),
            gflags: GFlagsConfig::default(),
            executor: ExecutorConfig::default(),
            devops: DevopsConfig::default(),
        }
    }
}

/// Backup controller settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct YbcConfig {
    /// Comma-separated NFS mount points the controller may use
    pub nfs_dirs: Option<String>,

    pub enable_verbose: bool,
}

/// How many installed releases to keep on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleasesConfig {
    pub num_releases_to_keep_cloud: u32,
    pub num_releases_to_keep_default: u32,
}

impl Default for ReleasesConfig {
    fn default() -> Self {
        Self {
            num_releases_to_keep_cloud: 2,
            num_releases_to_keep_default: 3,
        }
    }
}

impl ReleasesConfig {
    pub fn num_releases_to_keep(&self, cloud_enabled: bool) -> u32 {
        if cloud_enabled {
            self.num_releases_to_keep_cloud
        } else {
            self.num_releases_to_keep_default
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GFlagsConfig {
    /// Let user gflags override platform-managed flags
    pub allow_user_override: bool,
}

/// Settings exported to the executor environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub strategy: String,
    pub conn_timeout_secs: u32,
    pub verbosity: u32,
    pub debug: bool,
    pub diff_always: bool,
    pub local_temp: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategy: "linear".to_string(),
            conn_timeout_secs: 60,
            verbosity: 0,
            debug: false,
            diff_always: false,
            local_temp: "/tmp/nodeops-executor".to_string(),
        }
    }
}

/// External provisioning command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevopsConfig {
    /// Program the compiled arguments are passed to
    pub command: String,
}

impl Default for DevopsConfig {
    fn default() -> Self {
        Self {
            command: "bin/ybcloud.sh".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a config file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        tracing::debug!("Loaded runtime config from {}", path.display());
        Ok(config)
    }

    /// Load the discovered config file, or defaults when there is none
    pub fn load() -> Result<Self> {
        match find_config_file()? {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Global config directory (`~/.config/nodeops`)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("nodeops");
    Ok(config_dir)
}

/// Locate the config file
///
/// Search order:
/// 1. `NODEOPS_CONFIG_PATH`
/// 2. current directory: nodeops.local.yaml, nodeops.yaml
/// 3. `./.nodeops/` with the same names
/// 4. `~/.config/nodeops/nodeops.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(
            "{} points to a missing file: {}",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CONFIG_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let local_dir = current_dir.join(".nodeops");
    if local_dir.is_dir() {
        for filename in &CONFIG_CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(Some(path));
            }
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("nodeops.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}
