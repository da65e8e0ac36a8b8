//! `assetflow run`: an ad-hoc chain built from the command line.

use super::{Project, RunArgs};
use anyhow::{Result, bail};
use assetflow::chain::FilterChain;
use assetflow::config::Kwargs;
use assetflow::filter::registry;
use std::fs;
use std::io::{self, Write};

/// Build the chain named by `args` and write its result.
pub fn run_chain(args: &RunArgs, project: &Project) -> Result<()> {
    let mut chain = build_chain(args)?;
    chain.prepare(&project.ctx)?;

    match &args.output {
        Some(output) => {
            let path = project.ctx.resolve_path(output);
            let mut content = Vec::new();
            chain.apply(&project.ctx, &args.sources, Some(output.as_path()), &mut content)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
            assetflow::debug!("run"; "wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            chain.apply(&project.ctx, &args.sources, None, &mut stdout)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn build_chain(args: &RunArgs) -> Result<FilterChain> {
    if let Some(stray) = args.as_output.iter().find(|n| !args.filters.contains(n)) {
        bail!("--as-output `{stray}` is not one of the -f filters");
    }

    let mut chain = FilterChain::new();
    if let Some(separator) = &args.separator {
        chain = chain.with_separator(separator.as_str());
    }
    for name in &args.filters {
        let filter = registry().get_filter(name.as_str(), Kwargs::new())?;
        chain.push(filter, args.as_output.contains(name))?;
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(filters: &[&str], as_output: &[&str]) -> RunArgs {
        RunArgs {
            filters: filters.iter().map(|s| (*s).to_owned()).collect(),
            as_output: as_output.iter().map(|s| (*s).to_owned()).collect(),
            output: None,
            separator: None,
            sources: vec![PathBuf::from("a.css")],
        }
    }

    #[test]
    fn test_build_chain() {
        let chain = build_chain(&args(&["sass", "cssmin"], &["sass"])).unwrap();
        let flags: Vec<_> = chain.entries().iter().map(|e| e.as_output).collect();
        assert_eq!(flags, [true, false]);
    }

    #[test]
    fn test_stray_as_output() {
        let err = build_chain(&args(&["cssmin"], &["sass"])).unwrap_err();
        assert!(err.to_string().contains("sass"));
    }

    #[test]
    fn test_unknown_filter() {
        assert!(build_chain(&args(&["no-such-filter"], &[])).is_err());
    }
}
