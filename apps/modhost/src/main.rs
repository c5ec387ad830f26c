use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use modkit::{
    order, roots_under, DiscoveryRoot, LoadOptions, LoadResult, ModuleDiscovery, RunOptions,
    ShutdownOptions,
};
use modkit_bootstrap::{AppConfig, AppConfigProvider, CliArgs};

use std::path::{Path, PathBuf};
use std::sync::Arc;

mod registered_modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// ModHost - manifest-driven module runtime
#[derive(Parser)]
#[command(name = "modhost")]
#[command(about = "ModHost - discovers, orders and starts manifest-described modules")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the core/standard/extension module roots (overrides config)
    #[arg(short, long)]
    modules_root: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load all modules and run until SIGINT/SIGTERM
    Run,
    /// Validate configuration and exit
    Check,
    /// Print discovered modules in load order without initializing them
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        modules_root: cli
            .modules_root
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    // Also normalizes + creates server.home_dir.
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    modkit_bootstrap::logging::init_logging_unified(&logging_config, &config.home_dir());

    tracing::info!(
        home_dir = %config.server.home_dir,
        modules_root = %config.loader.modules_root,
        "ModHost starting"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_host(config).await,
        Commands::Check => check_config(&config),
        Commands::List => list_modules(&config),
    }
}

fn load_options(config: &AppConfig) -> Result<LoadOptions> {
    let loader = &config.loader;
    Ok(LoadOptions {
        bootstrap_module: loader.bootstrap_module().map(str::to_string),
        phase1_timeout: loader.phase1_timeout,
        hook_timeout: loader.hook_timeout,
        shutdown_timeout: loader.shutdown_timeout,
        hook_execution: loader
            .hook_execution
            .parse()
            .context("invalid loader.hook_execution")?,
    })
}

fn discovery_roots(config: &AppConfig) -> Vec<DiscoveryRoot> {
    let base = Path::new(&config.loader.modules_root);
    if !base.is_dir() {
        tracing::warn!(modules_root = %base.display(), "modules root does not exist");
    }
    roots_under(base)
}

async fn run_host(config: AppConfig) -> Result<()> {
    let options = load_options(&config)?;
    let roots = discovery_roots(&config);
    let provider: Arc<dyn modkit::ConfigProvider> = Arc::new(AppConfigProvider::new(config));

    let result = modkit::run(RunOptions {
        roots,
        catalog: registered_modules::catalog(),
        load: options,
        modules_cfg: Some(provider),
        shutdown: ShutdownOptions::Signals,
        on_loaded: Some(Box::new(print_banner)),
    })
    .await?;

    match result.fatal {
        Some(cause) => anyhow::bail!("module load aborted: {cause}"),
        None => Ok(()),
    }
}

fn print_banner(result: &LoadResult) {
    let status = match (result.success, result.is_degraded()) {
        (false, _) => "FAILED",
        (true, true) => "DEGRADED",
        (true, false) => "OK",
    };
    println!("ModHost startup: {status}");
    println!("  load order:     {}", join_or_dash(&result.order));
    println!("  failed modules: {}", join_or_dash(&result.failed_modules));
    println!("  hooks run:      {}", join_or_dash(&result.executed_hooks));
    println!("  failed hooks:   {}", join_or_dash(&result.failed_hooks));
    if let Some(cause) = &result.fatal {
        println!("  fatal:          {cause}");
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    load_options(config)?;
    let root = Path::new(&config.loader.modules_root);
    anyhow::ensure!(
        root.is_dir(),
        "loader.modules_root is not a directory: {}",
        root.display()
    );
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

fn list_modules(config: &AppConfig) -> Result<()> {
    let options = load_options(config)?;
    let report = ModuleDiscovery::new(discovery_roots(config)).discover()?;
    for invalid in &report.invalid {
        println!("invalid: {}", modkit::outcome::error_chain(invalid));
    }

    let resolved = order(&report.descriptors, options.bootstrap_module.as_deref())?;
    let catalog = registered_modules::catalog();
    for (idx, module) in resolved.modules().iter().enumerate() {
        let deps = module
            .dependencies
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut flags = Vec::new();
        if resolved.is_bootstrap(&module.id) {
            flags.push("bootstrap");
        }
        if catalog.resolve(module).is_none() {
            flags.push("no implementation");
        }
        println!(
            "{:>3}. {:<32} {:<24} deps: [{}] {}",
            idx + 1,
            module.id,
            module.display_name(),
            deps,
            flags.join(" ")
        );
    }
    for id in resolved.disabled() {
        println!("  -  {id:<32} disabled");
    }
    Ok(())
}
