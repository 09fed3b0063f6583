//! YSQL user provisioning
//!
//! Statements are batched and run through a [`YsqlShell`] on one of the
//! universe's tablet servers. [`SshYsqlShell`] reaches the node with the
//! universe's access key.

use crate::error::{CompileError, Result};
use crate::intent::UserIntentResolver;
use async_trait::async_trait;
use nodeops_cloud::{NodeDetails, StateStore, Universe};
use std::cmp::Ordering;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Admin role created for cloud-managed universes
pub const DB_ADMIN_ROLE_NAME: &str = "yb_superuser";

const PRECREATED_DB_ADMIN: &str = "yb_db_admin";

/// Role `ysqlsh` connects as
const YSQL_SUPERUSER: &str = "yugabyte";

const YB_EXTENSION_MIN_VERSION: &str = "2.6.4.0";
const DB_ADMIN_GRANT_MIN_VERSION: &str = "2.12.2.0-b31";

const RESET_STATEMENT_STATS: &str = "SELECT pg_stat_statements_reset();";

const DEL_PG_ROLES_CMD_1: &str = "SET YB_NON_DDL_TXN_FOR_SYS_TABLES_ALLOWED=ON; \
     DELETE FROM pg_shdepend WHERE refclassid IN \
     (SELECT oid FROM pg_class WHERE relname='pg_authid') \
     AND refobjid IN (SELECT oid FROM pg_roles WHERE rolname IN \
     ('pg_execute_server_program', 'pg_read_server_files', \
     'pg_write_server_files'));";

const DEL_PG_ROLES_CMD_2: &str = "SET YB_NON_DDL_TXN_FOR_SYS_TABLES_ALLOWED=ON; \
     DROP ROLE IF EXISTS pg_execute_server_program, pg_read_server_files, \
     pg_write_server_files; \
     UPDATE pg_yb_catalog_version \
     SET current_version = current_version + 1 WHERE db_oid = 1;";

/// Runs SQL through `ysqlsh` on a node
#[async_trait]
pub trait YsqlShell: Send + Sync {
    /// Run `query` against `database`, returning the shell output
    async fn run(
        &self,
        universe: &Universe,
        node: &NodeDetails,
        database: &str,
        query: &str,
    ) -> Result<String>;
}

/// Runs `ysqlsh` from the node's installation over SSH
pub struct SshYsqlShell {
    store: Arc<dyn StateStore>,
    program: String,
}

impl SshYsqlShell {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            program: "ssh".to_string(),
        }
    }

    /// Spawn `program` in place of `ssh`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// SSH arguments running `query` on `node`
    pub fn ssh_args(
        &self,
        universe: &Universe,
        node: &NodeDetails,
        database: &str,
        query: &str,
    ) -> Result<Vec<String>> {
        let intent = UserIntentResolver::resolve(universe, &node.node_name)?;
        let provider = self
            .store
            .provider(&intent.provider)
            .ok_or_else(|| CompileError::missing(format!("provider {}", intent.provider)))?;
        let access_key = self
            .store
            .access_key(&provider.uuid, &intent.access_key_code)
            .ok_or_else(|| {
                CompileError::missing(format!("access key {}", intent.access_key_code))
            })?;
        let key = &access_key.key_info;
        let private_key = key.private_key.as_deref().ok_or_else(|| {
            CompileError::missing(format!(
                "no private key file for access key {}",
                access_key.key_code
            ))
        })?;
        let ssh_user = key.ssh_user.as_deref().ok_or_else(|| {
            CompileError::missing(format!("no ssh user for access key {}", access_key.key_code))
        })?;
        let ip = node
            .cloud_info
            .private_ip
            .as_deref()
            .ok_or_else(|| CompileError::missing(format!("private ip of {}", node.node_name)))?;

        let remote = format!(
            "{}/tserver/bin/ysqlsh -h {} -p {} -U {} -d {} -c {}",
            provider.yb_home,
            ip,
            node.ports.ysql_server_rpc_port,
            YSQL_SUPERUSER,
            shell_quote(database),
            shell_quote(query)
        );
        Ok(vec![
            "-i".to_string(),
            private_key.to_string(),
            "-p".to_string(),
            key.ssh_port.unwrap_or(provider.ssh_port).to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            format!("{}@{}", ssh_user, ip),
            remote,
        ])
    }
}

#[async_trait]
impl YsqlShell for SshYsqlShell {
    async fn run(
        &self,
        universe: &Universe,
        node: &NodeDetails,
        database: &str,
        query: &str,
    ) -> Result<String> {
        let args = self.ssh_args(universe, node, database, query)?;
        // Queries may carry passwords
        tracing::debug!("Running ysqlsh on {} against {}", node.node_name, database);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let message = if stderr.trim().is_empty() { &stdout } else { &stderr };
            return Err(CompileError::Query(message.trim().to_string()));
        }
        Ok(format!("{}{}", stdout, stderr))
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseUser {
    pub username: String,
    pub password: String,
    pub database: String,
}

/// Creates database users and rotates the admin password
pub struct UserProvisioner {
    shell: Arc<dyn YsqlShell>,
    cloud_enabled: bool,
}

impl UserProvisioner {
    pub fn new(shell: Arc<dyn YsqlShell>, cloud_enabled: bool) -> Self {
        Self {
            shell,
            cloud_enabled,
        }
    }

    /// Create `user` with login and database creation rights
    ///
    /// In cloud mode the user also joins the admin role, created on first
    /// use. A first batch failing because the user already exists is
    /// tolerated; the grants that follow are idempotent.
    pub async fn create_user(&self, universe: &Universe, user: &DatabaseUser) -> Result<()> {
        let mut batch = format!(
            "CREATE USER \"{}\" INHERIT CREATEROLE CREATEDB LOGIN BYPASSRLS PASSWORD '{}'; ",
            user.username,
            escape_single_quotes(&user.password)
        );

        if self.cloud_enabled {
            batch.push_str(&format!(
                "CREATE ROLE \"{}\" INHERIT CREATEROLE CREATEDB BYPASSRLS; ",
                DB_ADMIN_ROLE_NAME
            ));
            let mut roles = "pg_read_all_stats, pg_signal_backend".to_string();
            if all_versions_at_least(universe, YB_EXTENSION_MIN_VERSION) {
                roles.push_str(", yb_extension");
            }
            batch.push_str(&format!(
                "GRANT {roles} TO \"{admin}\"; \
                 GRANT EXECUTE ON FUNCTION pg_stat_statements_reset TO \"{admin}\"; \
                 GRANT ALL ON DATABASE yugabyte, postgres TO \"{admin}\"; ",
                roles = roles,
                admin = DB_ADMIN_ROLE_NAME
            ));
            batch.push_str(DEL_PG_ROLES_CMD_1);
            batch.push(' ');

            match self.run_batch(universe, &user.database, &batch).await {
                Ok(()) => tracing::info!("Created users and deleted dependencies"),
                // TODO: match on the SQLSTATE once the shell reports it
                Err(err) if err.to_string().contains("already exists") => {
                    tracing::warn!("User already exists, skipping...\n{}", err);
                }
                Err(err) => return Err(err),
            }

            self.run_batch(universe, &user.database, &format!("{} ", DEL_PG_ROLES_CMD_2))
                .await?;
            tracing::info!("Dropped unrequired roles");

            batch = String::new();
            if all_versions_at_least(universe, DB_ADMIN_GRANT_MIN_VERSION) {
                batch.push_str(&format!(
                    "GRANT \"{}\" TO \"{}\" WITH ADMIN OPTION; ",
                    PRECREATED_DB_ADMIN, DB_ADMIN_ROLE_NAME
                ));
            }
            batch.push_str(&format!(
                "GRANT \"{}\" TO \"{}\" WITH ADMIN OPTION; ",
                DB_ADMIN_ROLE_NAME, user.username
            ));
        }

        batch.push_str(RESET_STATEMENT_STATS);
        self.run_batch(universe, &user.database, &batch).await?;
        tracing::info!("Assigned permissions to the user");
        Ok(())
    }

    /// Change the password of the admin user
    pub async fn update_admin_password(
        &self,
        universe: &Universe,
        admin: &DatabaseUser,
    ) -> Result<()> {
        let batch = format!(
            "ALTER USER \"{}\" WITH PASSWORD '{}'; {}",
            admin.username,
            escape_single_quotes(&admin.password),
            RESET_STATEMENT_STATS
        );
        self.run_batch(universe, &admin.database, &batch).await
    }

    async fn run_batch(&self, universe: &Universe, database: &str, query: &str) -> Result<()> {
        let node = query_node(universe)?;
        let output = self.shell.run(universe, node, database, query).await?;
        if output.to_ascii_lowercase().contains("error") {
            return Err(CompileError::Query(output.trim().to_string()));
        }
        Ok(())
    }
}

/// Tablet server to run queries on
fn query_node(universe: &Universe) -> Result<&NodeDetails> {
    universe
        .nodes
        .iter()
        .find(|n| n.is_tserver && n.cloud_info.private_ip.is_some())
        .ok_or_else(|| CompileError::Query("DB not ready to create a user".to_string()))
}

/// Quote `value` as a single POSIX shell word
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

fn all_versions_at_least(universe: &Universe, minimum: &str) -> bool {
    universe.versions().iter().all(|v| {
        matches!(
            compare_yb_versions(v, minimum),
            Some(Ordering::Greater | Ordering::Equal)
        )
    })
}

/// Compare two `a.b.c.d[-bN]` versions
///
/// Build numbers only count when both sides carry one. Returns `None` when
/// either version cannot be parsed.
pub fn compare_yb_versions(a: &str, b: &str) -> Option<Ordering> {
    let (a_parts, a_build) = parse_version(a)?;
    let (b_parts, b_build) = parse_version(b)?;
    match a_parts.cmp(&b_parts) {
        Ordering::Equal => match (a_build, b_build) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(Ordering::Equal),
        },
        other => Some(other),
    }
}

fn parse_version(version: &str) -> Option<([u64; 4], Option<u64>)> {
    let (numbers, suffix) = match version.split_once('-') {
        Some((numbers, suffix)) => (numbers, Some(suffix)),
        None => (version, None),
    };

    let mut parts = [0u64; 4];
    let mut fields = numbers.split('.');
    for part in parts.iter_mut() {
        *part = fields.next()?.parse().ok()?;
    }
    if fields.next().is_some() {
        return None;
    }

    let build = suffix
        .and_then(|s| s.strip_prefix('b'))
        .and_then(|b| b.parse().ok());
    Some((parts, build))
}
