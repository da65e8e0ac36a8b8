//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Asset filter engine CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: search upward for assetflow.toml)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Show debug output (filter calls, tool argv)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run sources through an ad-hoc filter chain
    #[command(visible_alias = "r")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Build bundles declared in the config file
    #[command(visible_alias = "b")]
    Build {
        /// Bundle names (default: all bundles)
        bundles: Vec<String>,
    },

    /// List registered filters and their capabilities
    #[command(visible_alias = "l")]
    List,
}

/// Arguments of `run`.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Filter to apply, in order (repeatable)
    #[arg(short, long = "filter", value_name = "NAME", required = true)]
    pub filters: Vec<String>,

    /// Run the named filter once on the concatenated output
    #[arg(long, value_name = "NAME")]
    pub as_output: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// String placed between sources
    #[arg(short, long)]
    pub separator: Option<String>,

    /// Source files
    #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
    pub sources: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "assetflow", "run", "-f", "sass", "-f", "cssmin", "--as-output", "sass", "-o",
            "out.css", "a.sass", "b.sass",
        ]);
        let Commands::Run { args } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.filters, ["sass", "cssmin"]);
        assert_eq!(args.as_output, ["sass"]);
        assert_eq!(args.output, Some(PathBuf::from("out.css")));
        assert_eq!(args.sources.len(), 2);
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from(["assetflow", "build", "site.css", "--verbose", "-C", "x.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Commands::Build { ref bundles } if bundles == &["site.css"]));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_verbose_and_version() {
        let cli = Cli::parse_from(["assetflow", "-v", "list"]);
        assert!(cli.verbose);

        let err = Cli::try_parse_from(["assetflow", "-V"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_run_requires_filter() {
        assert!(Cli::try_parse_from(["assetflow", "run", "a.css"]).is_err());
    }
}
