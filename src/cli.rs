// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CLI argument parsing for nodal.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// nodal - resolve, scan and load CommonJS-style module graphs
#[derive(Parser, Debug)]
#[command(name = "nodal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Loader folder for empty or relative origins and `/` specifiers
    #[arg(long, global = true, env = "NODAL_BASE_ADDRESS")]
    pub base: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the canonical address of a specifier
    Resolve(ResolveArgs),

    /// List the specifiers a source file requires
    Scan(ScanArgs),

    /// Fetch a module graph and print the registry
    Load(LoadArgs),

    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Module specifier
    pub id: String,

    /// Origin to resolve from (default: current directory)
    #[arg(short, long)]
    pub origin: Option<String>,

    /// Also print every candidate a bare specifier would be searched at
    #[arg(short, long)]
    pub lineage: bool,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Source file
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Root module specifier
    pub id: String,

    /// Origin to resolve from (default: current directory)
    #[arg(short, long)]
    pub origin: Option<String>,

    /// Cache-busting mode (auto, never, minutely, hourly, daily)
    #[arg(long)]
    pub caching: Option<String>,
}
