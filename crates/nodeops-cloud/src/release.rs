//! Release artifact metadata

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolves database and controller releases to package locations
pub trait ReleaseResolver: Send + Sync {
    /// Metadata of a database server release
    fn release_by_version(&self, version: &str) -> Option<ReleaseMetadata>;

    /// Metadata of a backup controller release matching the server's platform
    fn ybc_release(&self, version: &str, os: &str, arch: &str) -> Option<ReleaseMetadata>;
}

/// Where a release package can be obtained from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    #[serde(default)]
    pub s3: Option<S3Location>,

    #[serde(default)]
    pub gcs: Option<GcsLocation>,

    #[serde(default)]
    pub http: Option<HttpLocation>,

    /// Local package path on the platform host
    #[serde(default)]
    pub file_path: Option<String>,

    /// Region-specific local package paths, keyed by region code
    #[serde(default)]
    pub region_paths: BTreeMap<String, String>,
}

impl ReleaseMetadata {
    /// Local package path for the given region
    pub fn file_path(&self, region_code: Option<&str>) -> Option<String> {
        region_code
            .and_then(|code| self.region_paths.get(code))
            .or(self.file_path.as_ref())
            .cloned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagePaths {
    pub x86_64: String,

    #[serde(default)]
    pub x86_64_checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Location {
    pub paths: PackagePaths,
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcsLocation {
    pub paths: PackagePaths,
    pub credentials_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpLocation {
    pub paths: PackagePaths,
}

/// Backup controller release for one platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YbcRelease {
    pub version: String,
    pub os: String,
    pub arch: String,
    pub metadata: ReleaseMetadata,
}
