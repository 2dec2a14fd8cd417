//! vmprereq CLI - validate and remediate OS prerequisites on inventory hosts.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use vmprereq::config::load_inventory;
use vmprereq::core::{seal_secret, KeyProvider};
use vmprereq::{
    CheckKey, HostId, PrereqEngine, PrereqOptions, SetupStep, SshExecutor, StaticKey,
};

#[derive(Parser)]
#[command(name = "vmprereq")]
#[command(about = "Validate and remediate OS prerequisites on remote Linux hosts over SSH")]
#[command(version)]
struct Cli {
    /// JSON host inventory
    #[arg(short, long, env = "VMPREREQ_INVENTORY", global = true)]
    inventory: Option<PathBuf>,

    /// 256-bit key (64 hex chars) that opens sealed secrets
    #[arg(short, long, env = "VMPREREQ_SECRET_KEY", hide_env_values = true, global = true)]
    key: Option<String>,

    /// Application user (overrides the inventory default)
    #[arg(long, global = true)]
    username: Option<String>,

    /// Application group (overrides the inventory default)
    #[arg(long, global = true)]
    group: Option<String>,

    /// Properties file scanned by the thread-pool check
    #[arg(long, global = true)]
    config_path: Option<String>,

    /// Password set by the user/group setup step
    #[arg(long, env = "VMPREREQ_APP_PASSWORD", hide_env_values = true, global = true)]
    app_password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every check against one or more hosts
    Validate {
        /// Host ids from the inventory
        #[arg(required = true)]
        hosts: Vec<u64>,
    },

    /// Run a single check
    Check {
        host: u64,
        /// userGroup, ulimit, securityLimits, sysctl, jvm, threadPool, garbageCollector
        check: String,
    },

    /// Run a setup step (user-group, ulimit, sysctl, all) or the step
    /// registered for a check key
    Setup {
        host: u64,
        step: String,
        /// Include the sysctl step when running `all`
        #[arg(long)]
        include_sysctl: bool,
    },

    /// Validate, optionally remediate failures, validate again
    Fix {
        host: u64,
        #[arg(long)]
        auto_fix: bool,
    },

    /// Health score and per-check summary
    Health { host: u64 },

    /// Report whether the application user has a usable password
    VerifyPassword { host: u64 },

    /// Seal a secret read from stdin for use in the inventory
    Seal,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn options_from(cli: &Cli, defaults: PrereqOptions) -> PrereqOptions {
    let mut options = defaults;
    if let Some(username) = &cli.username {
        options.username = username.clone();
    }
    if let Some(group) = &cli.group {
        options.group = group.clone();
    }
    if let Some(path) = &cli.config_path {
        options.config_path = path.clone();
    }
    if let Some(password) = &cli.app_password {
        options.password = password.clone();
    }
    options
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vmprereq::logger::init_logger();
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(e) = &result {
        vmprereq::logger::log_error(&format!("vmprereq: {:#}", e));
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {

    let key = cli
        .key
        .as_deref()
        .context("no secret key: pass --key or set VMPREREQ_SECRET_KEY")?;
    let key = StaticKey::from_hex(key)?;

    if let Commands::Seal = cli.command {
        let mut secret = String::new();
        std::io::stdin()
            .read_to_string(&mut secret)
            .context("failed to read secret from stdin")?;
        let secret = secret.trim_end_matches(['\r', '\n']);
        println!("{}", seal_secret(secret, &key.key()?)?);
        return Ok(());
    }

    let inventory_path = cli
        .inventory
        .as_deref()
        .context("no inventory: pass --inventory or set VMPREREQ_INVENTORY")?;
    let inventory = load_inventory(inventory_path)?;

    let options = options_from(&cli, inventory.defaults.clone());
    let executor = SshExecutor::new(inventory.session_config());
    let remediation = inventory.remediation.clone();
    let engine = PrereqEngine::new(inventory.into_registry(key), executor)
        .with_remediation_paths(remediation);

    match &cli.command {
        Commands::Validate { hosts } => {
            let ids: Vec<HostId> = hosts.iter().copied().map(HostId).collect();
            if let [single] = ids.as_slice() {
                print_json(&engine.validate_all(*single, &options).await?)
            } else {
                print_json(&engine.validate_batch(&ids, &options).await?)
            }
        }
        Commands::Check { host, check } => {
            let key: CheckKey = check.parse()?;
            print_json(&engine.validate_one(HostId(*host), key, &options).await?)
        }
        Commands::Setup {
            host,
            step,
            include_sysctl,
        } => {
            let host = HostId(*host);
            if step.eq_ignore_ascii_case("all") {
                let mut options = options;
                options.include_sysctl = *include_sysctl;
                print_json(&engine.setup_all(host, &options).await?)
            } else if let Ok(setup) = step.parse::<SetupStep>() {
                let output = engine.run_setup(host, setup, &options).await?;
                print_json(&serde_json::json!({ "step": setup, "output": output }))
            } else {
                let key: CheckKey = step.parse()?;
                let output = engine.fix_check(host, key, &options).await?;
                print_json(&serde_json::json!({ "check": key, "output": output }))
            }
        }
        Commands::Fix { host, auto_fix } => {
            let auto_fix = *auto_fix || options.auto_fix;
            let options = options.with_auto_fix(auto_fix);
            print_json(&engine.validate_and_fix(HostId(*host), &options).await?)
        }
        Commands::Health { host } => print_json(&engine.health_summary(HostId(*host)).await?),
        Commands::VerifyPassword { host } => {
            let ok = engine
                .verify_user_password(HostId(*host), &options.username)
                .await?;
            print_json(&serde_json::json!({ "username": options.username, "passwordSet": ok }))
        }
        Commands::Seal => bail!("seal is handled before the inventory is loaded"),
    }
}
