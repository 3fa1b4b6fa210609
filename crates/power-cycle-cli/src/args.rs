//! Command-line arguments and their merge with the config file.
//!
//! Values given on the command line (or through `PCYCLE_*` environment
//! variables) override values loaded from `--config`.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use power_cycle_client::Credentials;
use power_cycle_control::{CycleConfig, Iterations};
use power_cycle_core::EntityId;

/// power-cycle - drive repeated power-on/power-off batches against vCenter.
#[derive(Parser, Debug)]
#[command(name = "pcycle")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging.
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cycle the configured machines on and off.
    Run(RunArgs),

    /// Print every machine visible to the account.
    List(ConnectArgs),

    /// Print the power state of the given machines.
    Status {
        #[command(flatten)]
        connect: ConnectArgs,

        /// Machine identifiers, e.g. vm-1001.
        #[arg(required = true)]
        entities: Vec<EntityId>,
    },
}

/// Connection settings shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct ConnectArgs {
    /// JSON configuration file.
    #[arg(long, short = 'c', env = "PCYCLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Management server base URL.
    #[arg(long, env = "PCYCLE_SERVER")]
    pub server: Option<String>,

    /// Account name.
    #[arg(long, short = 'u', env = "PCYCLE_USERNAME")]
    pub username: Option<String>,

    /// Account password.
    #[arg(long, env = "PCYCLE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,

    /// HTTP request timeout in seconds.
    #[arg(long)]
    pub request_timeout: Option<u64>,
}

/// Settings for `pcycle run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Machine to cycle; repeat or comma-separate.
    #[arg(long = "entity", short = 'e', value_delimiter = ',')]
    pub entities: Vec<EntityId>,

    /// Seconds to wait after powering on.
    #[arg(long)]
    pub dwell: Option<u64>,

    /// Seconds to wait after powering off.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Iteration count, or "unbounded".
    #[arg(long)]
    pub iterations: Option<Iterations>,

    /// Upper bound on a single power request, in seconds.
    #[arg(long)]
    pub unit_timeout: Option<u64>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ConnectArgs {
    /// Build a configuration from the file (if any) and the overrides.
    ///
    /// The result is not validated.
    pub fn resolve(&self) -> anyhow::Result<CycleConfig> {
        let mut config = match &self.config {
            Some(path) => CycleConfig::load(path).context("failed to load configuration")?,
            None => {
                let Some(server) = &self.server else {
                    bail!("missing --server (or PCYCLE_SERVER) and no --config given");
                };
                let (Some(username), Some(password)) = (&self.username, &self.password) else {
                    bail!("missing --username/--password (or PCYCLE_USERNAME/PCYCLE_PASSWORD)");
                };
                CycleConfig::new(
                    server.clone(),
                    Credentials::new(username.clone(), password.clone()),
                    Vec::new(),
                )
            }
        };

        if let Some(server) = &self.server {
            config.server_url.clone_from(server);
        }
        if let Some(username) = &self.username {
            config.credentials.username.clone_from(username);
        }
        if let Some(password) = &self.password {
            config.credentials =
                Credentials::new(config.credentials.username.clone(), password.clone());
        }
        if self.insecure {
            config.accept_invalid_certs = true;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout_seconds = timeout;
        }

        Ok(config)
    }
}

impl RunArgs {
    /// Build and validate the run configuration.
    pub fn resolve(&self) -> anyhow::Result<CycleConfig> {
        let mut config = self.connect.resolve()?;

        if !self.entities.is_empty() {
            config.entities.clone_from(&self.entities);
        }
        if let Some(dwell) = self.dwell {
            config.dwell_seconds = dwell;
        }
        if let Some(interval) = self.interval {
            config.interval_seconds = interval;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(timeout) = self.unit_timeout {
            config.unit_timeout_seconds = timeout;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn connect() -> ConnectArgs {
        ConnectArgs {
            server: Some("https://vc.local".to_string()),
            username: Some("admin".to_string()),
            password: Some("pw".to_string()),
            ..ConnectArgs::default()
        }
    }

    #[test]
    fn parses_run_command() {
        let cli = Cli::try_parse_from([
            "pcycle",
            "run",
            "--server",
            "https://vc.local",
            "-u",
            "admin",
            "--password",
            "pw",
            "-e",
            "vm-1,vm-2",
            "--entity",
            "vm-3",
            "--iterations",
            "unbounded",
            "--dwell",
            "0",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.entities.len(), 3);
        assert_eq!(config.iterations, Iterations::Unbounded);
        assert_eq!(config.dwell_seconds, 0);
        assert_eq!(config.interval_seconds, 10);
    }

    #[test]
    fn rejects_invalid_entity() {
        let result = Cli::try_parse_from(["pcycle", "status", "vm 1"]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_server_is_reported() {
        let args = ConnectArgs::default();
        let err = args.resolve().unwrap_err();
        assert!(err.to_string().contains("--server"));
    }

    #[test]
    fn duplicate_entities_fail_validation() {
        let args = RunArgs {
            connect: connect(),
            entities: vec![
                EntityId::new("vm-1").unwrap(),
                EntityId::new("vm-1").unwrap(),
            ],
            ..RunArgs::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "server_url": "https://from-file",
                "credentials": {{"username": "file-user", "password": "file-pw"}},
                "entities": ["vm-1001"],
                "interval_seconds": 3
            }}"#
        )
        .unwrap();

        let args = RunArgs {
            connect: ConnectArgs {
                config: Some(file.path().to_path_buf()),
                password: Some("cli-pw".to_string()),
                insecure: true,
                ..ConnectArgs::default()
            },
            dwell: Some(1),
            ..RunArgs::default()
        };

        let config = args.resolve().unwrap();
        assert_eq!(config.server_url, "https://from-file");
        assert_eq!(config.credentials.username, "file-user");
        assert_eq!(config.credentials.password(), "cli-pw");
        assert_eq!(config.dwell_seconds, 1);
        assert_eq!(config.interval_seconds, 3);
        assert!(config.accept_invalid_certs);
    }
}
