use crate::utils;
use anyhow::Context;
use colored::Colorize;
use nodeops_compiler::{NodeExecutor, NodeOperation, NodeOperationParams, ProcessExecutor};
use nodeops_config::RuntimeConfig;
use std::path::Path;

pub async fn handle(
    config: RuntimeConfig,
    state: &Path,
    operation: NodeOperation,
    params: &Path,
    detached: bool,
) -> anyhow::Result<()> {
    let executor = ProcessExecutor::new(config.devops.command.clone());
    let compiler = utils::load_compiler(state, config).await?;

    eprintln!(
        "{} {} with {}",
        "Running".blue().bold(),
        operation.to_string().cyan(),
        executor.program()
    );

    let output = if detached {
        // Detached prechecks issue no scratch files
        let command = utils::compile(&compiler, operation, params, true).await?;
        executor.run(&command).await
    } else {
        let params: NodeOperationParams = utils::read_json(params).await?;
        compiler.execute(operation, &params, &executor).await
    };

    match output {
        Ok(output) => {
            print!("{}", output.stdout);
            if !output.stderr.trim().is_empty() {
                tracing::debug!("{} stderr: {}", executor.program(), output.stderr.trim());
            }
            eprintln!("{} {}", "✓".green().bold(), operation);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), operation);
            Err(e).with_context(|| format!("{} failed", operation))
        }
    }
}
