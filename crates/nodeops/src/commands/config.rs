use colored::Colorize;
use nodeops_config::RuntimeConfig;
use std::path::Path;

pub fn handle(config: &RuntimeConfig, explicit: Option<&Path>) -> anyhow::Result<()> {
    let source = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => nodeops_config::find_config_file()?,
    };
    match source {
        Some(path) => eprintln!("{} {}", "Config:".bold(), path.display().to_string().cyan()),
        None => eprintln!("{} {}", "Config:".bold(), "(defaults)".yellow()),
    }

    print!("{}", config.to_yaml()?);
    Ok(())
}
