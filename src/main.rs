//! assetflow - run static asset bundles through filter chains.

mod cli;

use anyhow::Result;
use assetflow::filter::registry;
use assetflow::logger;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, Project};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let project = Project::load(&cli)?;

    match &cli.command {
        Commands::Run { args } => cli::run::run_chain(args, &project),
        Commands::Build { bundles } => cli::build::build_bundles(bundles, &project),
        Commands::List => cli::list::list_filters(registry()),
    }
}
