//! Effective user intent of a node

use crate::error::{CompileError, Result};
use nodeops_cloud::{NodeDetails, Universe, UserIntent};

/// Looks up the intent of the cluster a node is placed in
pub struct UserIntentResolver;

impl UserIntentResolver {
    /// Intent of `node_name`'s cluster
    ///
    /// A node that is not (yet) part of the universe resolves through the
    /// first node of the universe.
    pub fn resolve<'a>(universe: &'a Universe, node_name: &str) -> Result<&'a UserIntent> {
        let node = Self::node_or_first(universe, node_name)?;
        universe
            .cluster(&node.placement_uuid)
            .map(|c| &c.user_intent)
            .ok_or_else(|| {
                CompileError::missing(format!(
                    "cluster {} of node {} in universe {}",
                    node.placement_uuid, node.node_name, universe.name
                ))
            })
    }

    fn node_or_first<'a>(universe: &'a Universe, node_name: &str) -> Result<&'a NodeDetails> {
        if let Some(node) = universe.node(node_name) {
            return Ok(node);
        }
        let first = universe.nodes.first().ok_or_else(|| {
            CompileError::missing(format!("no node is found in universe {}", universe.name))
        })?;
        tracing::info!(
            "Node {} not found, so using {}.",
            node_name,
            first.node_name
        );
        Ok(first)
    }
}
