//! Canopy CLI entrypoint.
//!
//! This is the main entrypoint for the canopy command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use canopy::cli::{Cli, Commands, OutputFormatter, StateCommands};
use canopy::component::Context;
use canopy::config::{
    ConfigHasher, ConfigParser, ConfigValidator, ProviderKind, StackConfig, StateBackend,
    find_config_file,
};
use canopy::error::{CanopyError, ConfigError, Result};
use canopy::provider::{HttpTopicApi, InMemoryTopicApi, SharedTopicApi};
use canopy::reconciler::Reconciler;
use canopy::resources::builtin_registry;
use canopy::state::{LocalStateStore, STATE_DIR, StateStore};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
        Commands::Plan { detailed } => cmd_plan(config_path, detailed, &formatter).await,
        Commands::Apply { yes } => cmd_apply(config_path, yes, &formatter).await,
        Commands::Destroy { yes } => cmd_destroy(config_path, yes, &formatter).await,
        Commands::Info => cmd_info(config_path, &formatter).await,
        Commands::State { command } => cmd_state(config_path, command, &formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let validator = ConfigValidator::new(&builtin_registry());

    let result = validator.check(&config);
    emit(&formatter.format_validation(&result, show_warnings))?;

    validator.validate(&config).map(|_| ())
}

/// Show the deployment plan.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let workspace = Workspace::open(config_path)?;
    let reconciler = workspace.reconciler();

    if let Some(snapshot) = workspace.store.load().await?
        && !snapshot.config_hash.is_empty()
        && !ConfigHasher::hashes_match(&snapshot.config_hash, &workspace.config_hash)
    {
        eprintln!(
            "Configuration changed since the last apply ({} -> {})",
            ConfigHasher::new().short_hash(&snapshot.config_hash),
            ConfigHasher::new().short_hash(&workspace.config_hash)
        );
    }

    let plan = reconciler.plan(workspace.config.root.clone()).await?;
    emit(&formatter.format_plan(&plan, detailed))
}

/// Apply the stack file.
async fn cmd_apply(config_path: Option<&PathBuf>, auto_approve: bool, formatter: &OutputFormatter) -> Result<()> {
    let workspace = Workspace::open(config_path)?;
    let reconciler = workspace.reconciler();

    let plan = reconciler.plan(workspace.config.root.clone()).await?;
    if plan.is_empty() {
        eprintln!("No changes to apply.");
        return Ok(());
    }

    emit(&formatter.format_plan(&plan, false))?;

    if !auto_approve && !confirm("Do you want to apply this plan? [y/N]: ", "y")? {
        eprintln!("Apply cancelled.");
        return Ok(());
    }

    let result = reconciler
        .apply(workspace.config.root.clone(), &workspace.config_hash)
        .await?;
    emit(&formatter.format_reconciliation(&result))
}

/// Destroy every deployed resource.
async fn cmd_destroy(config_path: Option<&PathBuf>, auto_approve: bool, formatter: &OutputFormatter) -> Result<()> {
    let workspace = Workspace::open(config_path)?;
    let reconciler = workspace.reconciler();

    let nodes = reconciler.info().await?;
    if nodes.is_empty() {
        eprintln!("No resources to destroy.");
        return Ok(());
    }

    eprintln!("The following resources will be removed:");
    for node in &nodes {
        eprintln!("  - {} {} ({})", node.kind, node.title, node.path);
    }

    if !auto_approve && !confirm("\nThis action is IRREVERSIBLE. Type 'destroy' to confirm: ", "destroy")? {
        eprintln!("Destruction cancelled.");
        return Ok(());
    }

    let result = reconciler.destroy().await?;
    emit(&formatter.format_reconciliation(&result))
}

/// Describe deployed resources.
async fn cmd_info(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let workspace = Workspace::open(config_path)?;
    let nodes = workspace.reconciler().info().await?;
    emit(&formatter.format_info(&nodes))
}

/// State management commands.
async fn cmd_state(
    config_path: Option<&PathBuf>,
    command: StateCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let store = state_store(&config, &config_file);

    match command {
        StateCommands::Show => {
            match store.load().await? {
                Some(state) => emit(&formatter.format_state(&state))?,
                None => eprintln!("No state found."),
            }
            if let Some(lock) = store.get_lock_info().await? {
                emit(&formatter.format_lock(&lock))?;
            }
        }
        StateCommands::Lock { holder } => {
            let lock = store.acquire_lock(holder.as_deref().unwrap_or("")).await?;
            emit(&formatter.format_lock(&lock))?;
        }
        StateCommands::Unlock { lock_id, force } => {
            if force {
                match store.force_unlock().await? {
                    Some(lock) => eprintln!("Removed lock held by {}.", lock.holder),
                    None => eprintln!("State is not locked."),
                }
            } else if let Some(id) = lock_id {
                store.release_lock(&id).await?;
                eprintln!("State unlocked.");
            } else {
                eprintln!("Please provide --lock-id or use --force");
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Everything a reconciling command needs.
struct Workspace {
    config: StackConfig,
    config_hash: String,
    ctx: Context,
    store: LocalStateStore,
}

impl Workspace {
    fn open(config_path: Option<&PathBuf>) -> Result<Self> {
        let (config, config_file) = load_config(config_path)?;

        let registry = builtin_registry();
        ConfigValidator::new(&registry).validate(&config)?;

        let ctx = Context::new(Arc::new(registry))
            .with_service(provider_api(&config)?)
            .with_settings(config.engine.settings());
        let store = state_store(&config, &config_file);
        debug!(backend = store.backend_type(), path = %store.state_path().display(), "Using state store");
        let config_hash = ConfigHasher::new().hash_config(&config);

        Ok(Self {
            config,
            config_hash,
            ctx,
            store,
        })
    }

    fn reconciler(&self) -> Reconciler<'_, LocalStateStore> {
        Reconciler::new(&self.ctx, &self.store, &self.config.project)
    }
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads `.env` and the stack file with environment overrides.
fn load_config(config_path: Option<&PathBuf>) -> Result<(StackConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    Ok((config, config_file))
}

fn config_dir(config_file: &Path) -> &Path {
    config_file.parent().unwrap_or_else(|| Path::new("."))
}

/// Creates the state store described by the configuration.
fn state_store(config: &StackConfig, config_file: &Path) -> LocalStateStore {
    match config.state.backend {
        StateBackend::Local => config.state.path.as_ref().map_or_else(
            || LocalStateStore::with_base_dir(config_dir(config_file).join(STATE_DIR)),
            LocalStateStore::with_state_path,
        ),
    }
}

/// Creates the topic API described by the configuration.
fn provider_api(config: &StackConfig) -> Result<SharedTopicApi> {
    match config.provider.kind {
        ProviderKind::Memory => {
            warn!("Using the in-memory provider; deployed resources are not kept after exit");
            Ok(Arc::new(InMemoryTopicApi::new()))
        }
        ProviderKind::Http => {
            let endpoint = config.provider.endpoint.as_deref().ok_or_else(|| {
                CanopyError::Config(ConfigError::validation(
                    "An endpoint is required for the http provider",
                    "provider.endpoint",
                ))
            })?;
            info!("Using provider gateway at {endpoint}");
            let client = HttpTopicApi::with_timeout(
                endpoint,
                ConfigParser::provider_token(),
                config.provider.timeout_secs,
            )?;
            Ok(Arc::new(client))
        }
    }
}

/// Writes formatted command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

/// Prompts on stderr and compares the answer with `expected`.
fn confirm(prompt: &str, expected: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case(expected))
}
