// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! nodal - command line front end for the nodal-require loader
//!
//! ## Commands
//!
//! - `resolve` prints canonical addresses and lineage candidates
//! - `scan` lists the `require` calls a file makes
//! - `load` fetches a whole graph and reports what was registered

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, LoadArgs, ResolveArgs, ScanArgs};
use nodal_require::module_system::scan;
use nodal_require::{LoaderConfig, LoaderContext, ModuleKind, ModuleResolver, VERSION};
use owo_colors::OwoColorize;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, info};
use url::Url;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let filter = if cli.verbose {
        "nodal=debug,nodal_require=debug".to_string()
    } else {
        format!("nodal={0},nodal_require={0}", config.log_level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    debug!("Effective config: {:?}", config);

    let result = match cli.command {
        Commands::Resolve(args) => run_resolve(&config, args),
        Commands::Scan(args) => run_scan(args),
        Commands::Load(args) => run_load(&mut config, args).await,
        Commands::Config => run_config(&config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<LoaderConfig> {
    let mut config = LoaderConfig::load()?;
    if let Some(base) = &cli.base {
        config.set("base-address", base)?;
    }
    Ok(config)
}

/// Origin used when none is given: the working directory as a `file://` address
fn default_origin(origin: Option<String>) -> anyhow::Result<String> {
    if let Some(origin) = origin {
        return Ok(origin);
    }
    let cwd = std::env::current_dir().context("reading current directory")?;
    let url = Url::from_directory_path(&cwd)
        .map_err(|_| anyhow::anyhow!("cannot express {} as a file address", cwd.display()))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn run_resolve(config: &LoaderConfig, args: ResolveArgs) -> anyhow::Result<ExitCode> {
    let resolver = ModuleResolver::from_config(config);
    let origin = default_origin(args.origin)?;
    debug!("Resolving '{}' from '{}'", args.id, origin);
    let address = resolver.resolve(&args.id, &origin)?;
    let kind = resolver.kind_of(&args.id);

    println!("{} {}", address.green(), format!("({})", kind).dimmed());

    if args.lineage && kind == ModuleKind::Nodal {
        for step in resolver.lineage(&args.id, &origin).skip(1) {
            println!("  {} {}", "↑".dimmed(), step.address);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_scan(args: ScanArgs) -> anyhow::Result<ExitCode> {
    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let specifiers = scan(&source);
    if specifiers.is_empty() {
        println!("{}", "No require() calls found".dimmed());
    }
    for specifier in specifiers {
        println!("{}", specifier);
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_load(config: &mut LoaderConfig, args: LoadArgs) -> anyhow::Result<ExitCode> {
    if let Some(caching) = &args.caching {
        config.set("caching-frequency", caching)?;
    }
    let origin = default_origin(args.origin)?;
    info!(
        "Preloading '{}' from '{}' (caching: {})",
        args.id, origin, config.caching_frequency
    );

    let mut loader = LoaderContext::from_config(config.clone())?;
    let start = Instant::now();
    loader.on_drain(move |_| {
        eprintln!(
            "{} fetched in {:.2?}",
            "✓".green().bold(),
            start.elapsed()
        );
    });

    let result = loader.preload(&args.id, &origin).await;

    let registry = loader.registry();
    for address in registry.addresses() {
        let Some(module) = registry.get(&address) else {
            continue;
        };
        let record = module.borrow();
        let status = match &record.error {
            Some(_) => "failed".red().to_string(),
            None if record.is_loaded() => "loaded".green().to_string(),
            None => "missing".yellow().to_string(),
        };
        let target = if record.address == address {
            String::new()
        } else {
            format!(" -> {}", record.address)
        };
        println!(
            "{:<8} {:<10} {}{}",
            status,
            record.kind.to_string().cyan(),
            address,
            target.dimmed()
        );
    }

    match result {
        Ok(module) => {
            println!(
                "\n{} {} ({} addresses registered)",
                "Root:".bold(),
                module.address(),
                registry.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("\n{}: {}", "Error".red().bold(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_config(config: &LoaderConfig) -> anyhow::Result<ExitCode> {
    println!("{} {}", "nodal".cyan().bold(), format!("v{}", VERSION).dimmed());
    print!("{}", config.to_toml()?);
    Ok(ExitCode::SUCCESS)
}
