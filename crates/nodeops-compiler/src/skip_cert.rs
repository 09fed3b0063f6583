//! Certificate validation skipping

use crate::gflags::{VERIFY_SERVER_ENDPOINT_GFLAG, should_skip_server_endpoint_verification};
use nodeops_cloud::UserIntent;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCertValidation {
    /// Skip all certificate checks
    All,
    /// Skip hostname verification only
    Hostname,
    None,
}

impl fmt::Display for SkipCertValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipCertValidation::All => f.write_str("ALL"),
            SkipCertValidation::Hostname => f.write_str("HOSTNAME"),
            SkipCertValidation::None => f.write_str("NONE"),
        }
    }
}

impl FromStr for SkipCertValidation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(SkipCertValidation::All),
            "HOSTNAME" => Ok(SkipCertValidation::Hostname),
            "NONE" => Ok(SkipCertValidation::None),
            other => Err(format!("invalid skip cert validation value: {}", other)),
        }
    }
}

/// Decide the validation mode
///
/// A valid runtime config value wins. Otherwise removing
/// `verify_server_endpoint` means NONE, and the flag is looked up in the
/// explicit add-set if present there, else in the cluster's master and
/// tserver flags.
pub fn resolve_skip_cert_validation(
    config_value: Option<&str>,
    intent: &UserIntent,
    gflags_to_add: &BTreeMap<String, String>,
    gflags_to_remove: &BTreeSet<String>,
) -> SkipCertValidation {
    if let Some(value) = config_value.filter(|v| !v.is_empty()) {
        match value.parse() {
            Ok(skip) => return skip,
            Err(_) => {
                tracing::error!(
                    "Incorrect config value {} for skip_cert_validation",
                    value
                );
            }
        }
    }

    if gflags_to_remove.contains(VERIFY_SERVER_ENDPOINT_GFLAG) {
        return SkipCertValidation::None;
    }

    let skip_host_validation = if gflags_to_add.contains_key(VERIFY_SERVER_ENDPOINT_GFLAG) {
        should_skip_server_endpoint_verification(gflags_to_add)
    } else {
        should_skip_server_endpoint_verification(&intent.master_gflags)
            || should_skip_server_endpoint_verification(&intent.tserver_gflags)
    };

    if skip_host_validation {
        SkipCertValidation::Hostname
    } else {
        SkipCertValidation::None
    }
}

/// `--skip_cert_validation` arguments, empty for NONE
pub(crate) fn skip_cert_validation_args(skip: SkipCertValidation) -> Vec<String> {
    if skip == SkipCertValidation::None {
        Vec::new()
    } else {
        vec!["--skip_cert_validation".to_string(), skip.to_string()]
    }
}
