use crate::utils;
use anyhow::Context;
use colored::Colorize;
use nodeops_cloud::StateStore;
use nodeops_compiler::{DatabaseUser, SshYsqlShell, UserProvisioner};
use nodeops_config::RuntimeConfig;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// What to do with the database user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Create,
    SetAdminPassword,
}

pub async fn handle(
    config: RuntimeConfig,
    state: &Path,
    universe_uuid: Uuid,
    user: DatabaseUser,
    action: UserAction,
) -> anyhow::Result<()> {
    let store = utils::load_snapshot(state).await?;
    let universe = store
        .universe(&universe_uuid)
        .with_context(|| format!("Universe {} not found", universe_uuid))?;

    let shell = Arc::new(SshYsqlShell::new(store.clone()));
    let provisioner = UserProvisioner::new(shell, config.cloud_enabled);

    match action {
        UserAction::Create => {
            provisioner
                .create_user(&universe, &user)
                .await
                .with_context(|| format!("Failed to create user {}", user.username))?;
            eprintln!(
                "{} Created user {} in {}",
                "✓".green().bold(),
                user.username.cyan(),
                universe.name
            );
        }
        UserAction::SetAdminPassword => {
            provisioner
                .update_admin_password(&universe, &user)
                .await
                .with_context(|| format!("Failed to update password of {}", user.username))?;
            eprintln!(
                "{} Updated password of {} in {}",
                "✓".green().bold(),
                user.username.cyan(),
                universe.name
            );
        }
    }
    Ok(())
}
