use anyhow::Context;
use nodeops_cloud::{ClusterSnapshot, SnapshotManager};
use nodeops_compiler::{CommandCompiler, CompiledCommand, NodeOperation, NodeOperationParams};
use nodeops_config::RuntimeConfig;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Explicit config file, else the discovered one, else defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::load_from(path)
            .with_context(|| format!("Failed to load config file {}", path.display())),
        None => RuntimeConfig::load().context("Failed to load runtime config"),
    }
}

/// Build a compiler over the snapshot at `state`
pub async fn load_compiler(state: &Path, config: RuntimeConfig) -> anyhow::Result<CommandCompiler> {
    let snapshot = load_snapshot(state).await?;
    Ok(CommandCompiler::new(snapshot.clone(), snapshot, config))
}

pub async fn load_snapshot(state: &Path) -> anyhow::Result<Arc<ClusterSnapshot>> {
    anyhow::ensure!(
        state.exists(),
        "State snapshot not found: {}",
        state.display()
    );
    let snapshot = SnapshotManager::new(state)
        .load()
        .await
        .with_context(|| format!("Failed to load state snapshot {}", state.display()))?;
    tracing::debug!(
        "Loaded {} universes, {} providers",
        snapshot.universes.len(),
        snapshot.providers.len()
    );

    Ok(Arc::new(snapshot))
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Compile a regular or detached operation
///
/// Detached parameters are only valid for a precheck.
pub async fn compile(
    compiler: &CommandCompiler,
    operation: NodeOperation,
    params: &Path,
    detached: bool,
) -> anyhow::Result<CompiledCommand> {
    if detached {
        anyhow::ensure!(
            operation == NodeOperation::Precheck,
            "--detached is only supported for precheck, not {}",
            operation
        );
        let params = read_json(params).await?;
        return compiler
            .compile_detached_precheck(&params)
            .context("Failed to compile detached precheck");
    }

    let params: NodeOperationParams = read_json(params).await?;
    compiler
        .compile(operation, &params)
        .with_context(|| format!("Failed to compile {}", operation))
}
