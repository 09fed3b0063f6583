use crate::utils;
use nodeops_compiler::NodeOperation;
use nodeops_config::RuntimeConfig;
use std::path::Path;

pub async fn handle(
    config: RuntimeConfig,
    state: &Path,
    operation: NodeOperation,
    params: &Path,
    detached: bool,
) -> anyhow::Result<()> {
    let compiler = utils::load_compiler(state, config).await?;
    let command = utils::compile(&compiler, operation, params, detached).await?;

    // Sensitive values serialize redacted
    println!("{}", serde_json::to_string_pretty(&command)?);
    Ok(())
}
