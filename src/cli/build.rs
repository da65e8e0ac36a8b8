//! `assetflow build`: bundles declared in the config file.
//!
//! With `cache = true`, each bundle's build key is stored in
//! `.assetflow-cache/<bundle>.key` under the project root. A bundle whose
//! key is unchanged and whose output exists is skipped.

use super::Project;
use anyhow::{Context as _, Result, bail};
use assetflow::chain::{ContentHash, FilterChain, build_key};
use assetflow::config::BundleDef;
use assetflow::filter::registry;
use assetflow::{debug, log};
use std::fs;
use std::path::{Path, PathBuf};

/// Cache directory, relative to the project root.
pub const CACHE_DIR: &str = ".assetflow-cache";

/// Build the bundles named in `names`, or every bundle when empty.
pub fn build_bundles(names: &[String], project: &Project) -> Result<()> {
    let bundles = select_bundles(names, &project.config.bundles)?;
    if bundles.is_empty() {
        log!("build"; "no bundles declared");
        return Ok(());
    }

    let mut built = 0;
    for bundle in &bundles {
        if build_bundle(bundle, project)
            .with_context(|| format!("bundle `{}`", bundle.name))?
        {
            built += 1;
        }
    }
    log!("build"; "{} of {} bundle(s) built", built, bundles.len());
    Ok(())
}

fn select_bundles<'a>(names: &[String], bundles: &'a [BundleDef]) -> Result<Vec<&'a BundleDef>> {
    if names.is_empty() {
        return Ok(bundles.iter().collect());
    }
    names
        .iter()
        .map(|name| match bundles.iter().find(|b| &b.name == name) {
            Some(bundle) => Ok(bundle),
            None => bail!("unknown bundle `{name}`"),
        })
        .collect()
}

/// Build one bundle. Returns `false` when the cached output is current.
fn build_bundle(bundle: &BundleDef, project: &Project) -> Result<bool> {
    let ctx = &project.ctx;
    let mut chain = FilterChain::from_refs(registry(), &bundle.filters)?;
    if let Some(separator) = &bundle.separator {
        chain = chain.with_separator(separator.as_str());
    }
    chain.prepare(ctx)?;

    let output = ctx.resolve_path(&bundle.output);
    let key = if ctx.cache {
        let key = bundle_key(&chain, bundle, project)?;
        if output.exists() && read_key(&key_path(project, &bundle.name)) == Some(key) {
            debug!("build"; "{} is up to date ({})", bundle.name, key);
            return Ok(false);
        }
        Some(key)
    } else {
        None
    };

    let mut content = Vec::new();
    chain.apply(ctx, &bundle.sources, Some(bundle.output.as_path()), &mut content)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, &content)?;

    if let Some(key) = key {
        write_key(&key_path(project, &bundle.name), key)?;
    }
    log!("build"; "{} ({} source(s), {} bytes)", bundle.name, bundle.sources.len(), content.len());
    Ok(true)
}

/// Chain key plus source contents plus the separator.
fn bundle_key(chain: &FilterChain, bundle: &BundleDef, project: &Project) -> Result<ContentHash> {
    let sources: Vec<PathBuf> = bundle
        .sources
        .iter()
        .map(|s| project.ctx.resolve_path(s))
        .collect();
    let key = build_key(chain.cache_key(), &sources)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(key.as_bytes());
    hasher.update(bundle.separator.as_deref().unwrap_or_default().as_bytes());
    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}

fn key_path(project: &Project, bundle: &str) -> PathBuf {
    let file = format!("{}.key", bundle.replace(['/', '\\'], "_"));
    project.config.root_join(CACHE_DIR).join(file)
}

fn read_key(path: &Path) -> Option<ContentHash> {
    ContentHash::from_hex(&fs::read_to_string(path).ok()?)
}

fn write_key(path: &Path, key: ContentHash) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, key.to_hex())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetflow::config::ProjectConfig;
    use assetflow::filter::Context;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn project(dir: &Path, toml: &str) -> Project {
        let mut config = ProjectConfig::from_str(toml).unwrap();
        config.root = dir.to_path_buf();
        let ctx = Arc::new(Context::from_project(&config));
        Project { config, ctx }
    }

    const CONFIG: &str = r#"
cache = true

[[bundles]]
name = "site.css"
sources = ["a.css", "b.css"]
output = "dist/site.css"
filters = ["cssmin"]
separator = ""
"#;

    #[test]
    fn test_build_bundle() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.css"), "a { color: #ff0000; }\n").unwrap();
        fs::write(dir.path().join("b.css"), "b { margin: 0px; }\n").unwrap();
        let project = project(dir.path(), CONFIG);

        build_bundles(&[], &project).unwrap();
        let out = fs::read_to_string(dir.path().join("dist/site.css")).unwrap();
        assert_eq!(out, "a{color:red}b{margin:0}");
        assert!(key_path(&project, "site.css").exists());
    }

    #[test]
    fn test_cached_bundle_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.css"), "a { color: red; }").unwrap();
        fs::write(dir.path().join("b.css"), "b { color: blue; }").unwrap();
        let project = project(dir.path(), CONFIG);
        let bundle = &project.config.bundles[0];

        assert!(build_bundle(bundle, &project).unwrap());
        assert!(!build_bundle(bundle, &project).unwrap());

        fs::write(dir.path().join("b.css"), "b { color: green; }").unwrap();
        assert!(build_bundle(bundle, &project).unwrap());

        fs::remove_file(dir.path().join("dist/site.css")).unwrap();
        assert!(build_bundle(bundle, &project).unwrap());
    }

    #[test]
    fn test_select_bundles() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path(), CONFIG);
        let bundles = &project.config.bundles;

        assert_eq!(select_bundles(&[], bundles).unwrap().len(), 1);
        assert_eq!(select_bundles(&["site.css".into()], bundles).unwrap().len(), 1);
        assert!(select_bundles(&["app.js".into()], bundles).is_err());
    }
}
