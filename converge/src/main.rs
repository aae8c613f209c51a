use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::json;
use tracing::debug;

use converge::cancel::CancelToken;
use converge::core::duration::parse_duration;
use converge::core::error::{ConvergenceCancelled, InputError};
use converge::core::kubeconfig::KubeconfigOptions;
use converge::core::plan::{ConvergenceRequest, resolve_plan};
use converge::core::target::Target;
use converge::exit_codes;
use converge::io::cluster_store::FsClusterStore;
use converge::io::config::{DriverConfig, default_config_path, load_config};
use converge::io::credentials::FsCredentialStore;
use converge::io::engine::ProcessEngine;
use converge::io::kubeconfig::{Kubectl, MergePolicy};
use converge::io::paths::expand_home;
use converge::logging;
use converge::update::{Collaborators, UpdateOutcome, UpdateSettings, run_update};

#[derive(Parser)]
#[command(
    name = "converge",
    version,
    about = "Drive live cloud infrastructure toward a declared cluster"
)]
struct Cli {
    /// Configuration file (default: <config dir>/converge/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update cloud resources to match the cluster spec.
    Update(UpdateArgs),
    /// Print the resolved execution plan as JSON without touching anything.
    Plan(UpdateArgs),
    /// Print the images and files the cluster depends on.
    GetAssets(AssetsArgs),
}

#[derive(Args, Debug, Clone)]
struct UpdateArgs {
    /// Cluster name.
    cluster: String,

    /// Create cloud resources, without --yes update is in dry run mode.
    #[arg(short, long)]
    yes: bool,

    /// Target: direct, dryrun, terraform or cloudformation.
    #[arg(long, default_value = "direct")]
    target: String,

    /// Path to write any local output.
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// SSH public key to use (deprecated: use `create secret` instead).
    #[arg(long, value_name = "PATH")]
    ssh_public_key: Option<PathBuf>,

    /// Export a kubeconfig for the cluster after applying.
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    create_kube_config: bool,

    /// Also export a cluster admin user credential with this lifetime.
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "18h",
        value_name = "DURATION",
        value_parser = parse_admin_ttl
    )]
    admin: Option<Duration>,

    /// Existing user in the kubeconfig file to use.
    #[arg(long)]
    user: Option<String>,

    /// Use the cluster's internal DNS name.
    #[arg(long)]
    internal: bool,

    /// Allow an older version of the tool to update the cluster.
    #[arg(long)]
    allow_downgrade: bool,

    /// Subset of tasks to run: network, security or cluster.
    #[arg(long)]
    phase: Option<String>,

    /// Comma-separated TaskName=LifecycleName overrides.
    #[arg(long, value_delimiter = ',', value_name = "OVERRIDES")]
    lifecycle_overrides: Option<Vec<String>>,

    /// State directory (default: `state_dir` from the configuration).
    #[arg(long, value_name = "DIR")]
    state: Option<PathBuf>,
}

impl UpdateArgs {
    /// Build the request. Configured overrides apply when the flag is absent.
    fn to_request(&self, default_overrides: &[String]) -> ConvergenceRequest {
        let lifecycle_overrides =
            effective_overrides(self.lifecycle_overrides.as_deref(), default_overrides);
        ConvergenceRequest {
            cluster_name: self.cluster.clone(),
            yes: self.yes,
            target: self.target.clone(),
            phase: self.phase.clone().unwrap_or_default(),
            lifecycle_overrides,
            ssh_public_key: self.ssh_public_key.clone(),
            out_dir: self.out.clone(),
            kubeconfig: KubeconfigOptions {
                create: self.create_kube_config,
                admin: self.admin,
                user: self.user.clone(),
                internal: self.internal,
            },
            get_assets_only: false,
            allow_downgrade: self.allow_downgrade,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct AssetsArgs {
    /// Cluster name.
    cluster: String,

    /// Subset of tasks to inspect: network, security or cluster.
    #[arg(long)]
    phase: Option<String>,

    /// Comma-separated TaskName=LifecycleName overrides.
    #[arg(long, value_delimiter = ',', value_name = "OVERRIDES")]
    lifecycle_overrides: Option<Vec<String>>,

    /// State directory (default: `state_dir` from the configuration).
    #[arg(long, value_name = "DIR")]
    state: Option<PathBuf>,
}

impl AssetsArgs {
    fn to_request(&self, default_overrides: &[String]) -> ConvergenceRequest {
        let mut request = ConvergenceRequest::new(self.cluster.clone());
        request.target = Target::DryRun.as_str().to_string();
        request.phase = self.phase.clone().unwrap_or_default();
        request.lifecycle_overrides =
            effective_overrides(self.lifecycle_overrides.as_deref(), default_overrides);
        request.kubeconfig.create = false;
        request.get_assets_only = true;
        request
    }
}

/// Configured defaults when the flag is absent, else the flag's non-empty
/// entries. `--lifecycle-overrides=` therefore means "no overrides".
fn effective_overrides(flag: Option<&[String]>, defaults: &[String]) -> Vec<String> {
    match flag {
        None => defaults.to_vec(),
        Some(entries) => entries
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .cloned()
            .collect(),
    }
}

fn parse_admin_ttl(raw: &str) -> Result<Duration, String> {
    parse_duration(raw).map_err(|err| format!("{err:#}"))
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            std::process::exit(code);
        }
    };
    logging::init();

    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConvergenceCancelled>().is_some() {
        exit_codes::CANCELLED
    } else if err.downcast_ref::<InputError>().is_some() {
        exit_codes::INVALID
    } else {
        exit_codes::FAILED
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_driver_config(cli.config)?;
    match cli.command {
        Command::Update(args) => cmd_update(&config, &args),
        Command::Plan(args) => cmd_plan(&config, &args),
        Command::GetAssets(args) => cmd_get_assets(&config, &args),
    }
}

fn load_driver_config(path: Option<PathBuf>) -> Result<DriverConfig> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };
    debug!(path = %path.display(), "loading config");
    load_config(&path)
}

fn cmd_update(config: &DriverConfig, args: &UpdateArgs) -> Result<()> {
    let request = args.to_request(&config.update.lifecycle_overrides);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(config, &request, args.state.clone(), &mut out)?;
    out.flush().context("flush stdout")
}

fn cmd_plan(config: &DriverConfig, args: &UpdateArgs) -> Result<()> {
    let request = args.to_request(&config.update.lifecycle_overrides);
    let plan = resolve_plan(&request)?;
    let rendered = serde_json::to_string_pretty(&plan).context("serialize plan")?;
    println!("{rendered}");
    Ok(())
}

fn cmd_get_assets(config: &DriverConfig, args: &AssetsArgs) -> Result<()> {
    let request = args.to_request(&config.update.lifecycle_overrides);
    let mut sink = io::sink();
    let outcome = execute(config, &request, args.state.clone(), &mut sink)?;
    let assets = json!({
        "image_assets": outcome.result.image_assets,
        "file_assets": outcome.result.file_assets,
    });
    let rendered = serde_json::to_string_pretty(&assets).context("serialize assets")?;
    println!("{rendered}");
    Ok(())
}

/// Wire the production collaborators and run one update.
fn execute(
    config: &DriverConfig,
    request: &ConvergenceRequest,
    state: Option<PathBuf>,
    out: &mut dyn Write,
) -> Result<UpdateOutcome> {
    // Reject bad input before resolving any path.
    resolve_plan(request)?;

    let state_dir = expand_home(&state.unwrap_or_else(|| config.state_dir.clone()))?;
    let clusters = FsClusterStore::new(&state_dir);
    let credentials = FsCredentialStore::new(&clusters.cluster_dir(&request.cluster_name));
    let engine = ProcessEngine::new(&config.engine);
    let mut kubectl_config = config.kubectl.clone();
    if let Some(ca) = &config.kubectl.certificate_authority {
        kubectl_config.certificate_authority = Some(expand_home(ca)?);
    }
    let kubectl = Kubectl::new(&kubectl_config)
        .ca_for_cluster(&clusters.cluster_dir(&request.cluster_name));
    let settings = UpdateSettings {
        run_tasks: config.engine.run_tasks(),
        merge_policy: MergePolicy::from_config(&config.kubectl),
        cluster_tool: config.update.cluster_tool.clone(),
    };
    let collaborators = Collaborators {
        clusters: &clusters,
        engine: &engine,
        credentials: &credentials,
        kubeconfig: &kubectl,
        contexts: &kubectl,
    };
    run_update(request, &collaborators, &settings, &CancelToken::new(), out)
}
