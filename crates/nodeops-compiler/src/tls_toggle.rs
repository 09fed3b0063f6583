//! Two-round encryption-in-transit toggle
//!
//! Turning node-to-node TLS on or off across a running cluster cannot be done
//! in one step: nodes that have already switched would refuse connections
//! from nodes that have not. The rollout therefore runs in phases, each one
//! applied to every node before the next starts:
//!
//! 1. `CopyCerts` stages certificates on the node.
//! 2. `Round1GFlagsUpdate` moves every node into a state that accepts both
//!    encrypted and plain connections.
//! 3. `Round2GFlagsUpdate` moves every node into the final state.

use crate::gflags::{
    ALLOW_INSECURE_CONNECTIONS, CERTS_DIR, CERTS_FOR_CLIENT_DIR, USE_CLIENT_TO_SERVER_ENCRYPTION,
    USE_NODE_TO_NODE_ENCRYPTION,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flags rewritten by a TLS toggle
pub const TLS_GFLAGS: [&str; 5] = [
    USE_NODE_TO_NODE_ENCRYPTION,
    USE_CLIENT_TO_SERVER_ENCRYPTION,
    ALLOW_INSECURE_CONNECTIONS,
    CERTS_DIR,
    CERTS_FOR_CLIENT_DIR,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsTogglePhase {
    CopyCerts,
    Round1GFlagsUpdate,
    Round2GFlagsUpdate,
}

/// Direction of the node-to-node encryption change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum NodeToNodeChange {
    Enabling,
    #[default]
    Unchanged,
    Disabling,
}

impl From<i32> for NodeToNodeChange {
    fn from(value: i32) -> Self {
        match value.signum() {
            1 => NodeToNodeChange::Enabling,
            -1 => NodeToNodeChange::Disabling,
            _ => NodeToNodeChange::Unchanged,
        }
    }
}

impl From<NodeToNodeChange> for i32 {
    fn from(value: NodeToNodeChange) -> Self {
        match value {
            NodeToNodeChange::Enabling => 1,
            NodeToNodeChange::Unchanged => 0,
            NodeToNodeChange::Disabling => -1,
        }
    }
}

/// Keep only `keys` of `flags`
pub fn filter_gflags(flags: &BTreeMap<String, String>, keys: &[&str]) -> BTreeMap<String, String> {
    flags
        .iter()
        .filter(|(k, _)| keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Flags for the first round
///
/// `target_tls` holds the TLS flags of the state being moved to.
pub fn round1_gflags(
    gflags: &BTreeMap<String, String>,
    change: NodeToNodeChange,
    target_tls: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut result = gflags.clone();
    match change {
        NodeToNodeChange::Enabling => {
            result.extend(filter_gflags(target_tls, &TLS_GFLAGS));
            result.insert(ALLOW_INSECURE_CONNECTIONS.to_string(), "true".to_string());
        }
        NodeToNodeChange::Disabling => {
            result.insert(ALLOW_INSECURE_CONNECTIONS.to_string(), "true".to_string());
        }
        NodeToNodeChange::Unchanged => {
            result.extend(filter_gflags(target_tls, &TLS_GFLAGS));
        }
    }
    result
}

/// Flags for the second round
///
/// Enabling always closes plaintext access, whatever the target state allows.
pub fn round2_gflags(
    gflags: &BTreeMap<String, String>,
    change: NodeToNodeChange,
    target_tls: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut result = gflags.clone();
    match change {
        NodeToNodeChange::Enabling => {
            result.insert(ALLOW_INSECURE_CONNECTIONS.to_string(), "false".to_string());
        }
        NodeToNodeChange::Disabling => {
            result.extend(filter_gflags(target_tls, &TLS_GFLAGS));
        }
        NodeToNodeChange::Unchanged => {
            tracing::warn!("Round2 upgrade not required when there is no change in node-to-node");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_tls() -> BTreeMap<String, String> {
        BTreeMap::from([
            (USE_NODE_TO_NODE_ENCRYPTION.to_string(), "true".to_string()),
            (USE_CLIENT_TO_SERVER_ENCRYPTION.to_string(), "false".to_string()),
            (ALLOW_INSECURE_CONNECTIONS.to_string(), "false".to_string()),
            (CERTS_DIR.to_string(), "/home/yugabyte/yugabyte-tls-config".to_string()),
        ])
    }

    fn disabled_tls() -> BTreeMap<String, String> {
        BTreeMap::from([
            (USE_NODE_TO_NODE_ENCRYPTION.to_string(), "false".to_string()),
            (USE_CLIENT_TO_SERVER_ENCRYPTION.to_string(), "false".to_string()),
            (ALLOW_INSECURE_CONNECTIONS.to_string(), "true".to_string()),
        ])
    }

    fn user_flags() -> BTreeMap<String, String> {
        BTreeMap::from([("log_min_seconds_to_retain".to_string(), "3600".to_string())])
    }

    #[test]
    fn test_enabling_rounds() {
        let round1 = round1_gflags(&user_flags(), NodeToNodeChange::Enabling, &enabled_tls());
        assert_eq!(round1[USE_NODE_TO_NODE_ENCRYPTION], "true");
        assert_eq!(round1[ALLOW_INSECURE_CONNECTIONS], "true");
        assert_eq!(round1["log_min_seconds_to_retain"], "3600");

        let round2 = round2_gflags(&user_flags(), NodeToNodeChange::Enabling, &enabled_tls());
        assert_eq!(round2[ALLOW_INSECURE_CONNECTIONS], "false");
        assert!(!round2.contains_key(USE_NODE_TO_NODE_ENCRYPTION));
    }

    #[test]
    fn test_enabling_round2_ignores_insecure_target() {
        let mut target = enabled_tls();
        target.insert(ALLOW_INSECURE_CONNECTIONS.to_string(), "true".to_string());

        let round2 = round2_gflags(&user_flags(), NodeToNodeChange::Enabling, &target);
        assert_eq!(round2[ALLOW_INSECURE_CONNECTIONS], "false");
    }

    #[test]
    fn test_disabling_rounds() {
        let round1 = round1_gflags(&user_flags(), NodeToNodeChange::Disabling, &disabled_tls());
        assert_eq!(round1.len(), 2);
        assert_eq!(round1[ALLOW_INSECURE_CONNECTIONS], "true");
        assert!(!round1.contains_key(USE_NODE_TO_NODE_ENCRYPTION));

        let round2 = round2_gflags(&BTreeMap::new(), NodeToNodeChange::Disabling, &disabled_tls());
        assert_eq!(round2, disabled_tls());
    }

    #[test]
    fn test_unchanged_rounds() {
        let round1 = round1_gflags(&user_flags(), NodeToNodeChange::Unchanged, &enabled_tls());
        assert_eq!(round1[CERTS_DIR], "/home/yugabyte/yugabyte-tls-config");

        let round2 = round2_gflags(&user_flags(), NodeToNodeChange::Unchanged, &enabled_tls());
        assert_eq!(round2, user_flags());
    }

    #[test]
    fn test_change_from_integer() {
        assert_eq!(NodeToNodeChange::from(5), NodeToNodeChange::Enabling);
        assert_eq!(NodeToNodeChange::from(-2), NodeToNodeChange::Disabling);
        assert_eq!(NodeToNodeChange::from(0), NodeToNodeChange::Unchanged);
    }
}
