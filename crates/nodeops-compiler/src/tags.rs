//! Instance tags

use crate::error::Result;
use nodeops_cloud::{CloudType, Universe};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tag AWS uses for the instance name
pub const NODE_NAME_KEY: &str = "Name";

/// Drop tags the provider reserves for itself
pub fn filter_instance_tags(tags: &mut BTreeMap<String, String>, provider: CloudType) {
    if provider == CloudType::Aws {
        tags.remove(NODE_NAME_KEY);
    }
}

/// `--instance_tags` for `tags` plus the platform ownership tags
///
/// `tags` itself is left untouched.
pub(crate) fn instance_tag_args(
    tags: &BTreeMap<String, String>,
    provider: CloudType,
    universe: &Universe,
    node_uuid: Option<Uuid>,
) -> Result<Vec<String>> {
    let mut tags = tags.clone();
    filter_instance_tags(&mut tags, provider);

    tags.insert("customer-uuid".to_string(), universe.customer_uuid.to_string());
    tags.insert("universe-uuid".to_string(), universe.uuid.to_string());
    if let Some(node_uuid) = node_uuid {
        tags.insert("node-uuid".to_string(), node_uuid.to_string());
    }

    Ok(vec![
        "--instance_tags".to_string(),
        serde_json::to_string(&tags)?,
    ])
}
