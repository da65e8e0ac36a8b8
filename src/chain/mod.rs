//! Filter chains: running a bundle's sources through its filters.
//!
//! For every source, the chain's `open` filter (at most one) produces the
//! content, or the file is read as is. Input filters then run in order on
//! each source. Sources are joined with the separator, and output filters
//! run in order on the result. An entry in as-output mode is deferred past
//! the join: it runs its `output` capability, or `input` if it has none.

mod key;

pub use key::{ContentHash, build_key, chain_key, compute_file_hash};

use crate::config::{FilterRef, Kwargs, Value};
use crate::filter::{Capability, Context, Filter, FilterError, FilterSpec, Registry, prepare};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default source separator.
pub const DEFAULT_SEPARATOR: &str = "\n";

/// One filter of a chain.
#[derive(Debug)]
pub struct ChainEntry {
    pub filter: Box<dyn Filter>,
    /// Run after concatenation instead of per source.
    pub as_output: bool,
}

impl ChainEntry {
    fn runs_per_source(&self) -> bool {
        !self.as_output && self.filter.capabilities().has(Capability::Input)
    }

    /// Capability used in the output stage, if any.
    fn output_capability(&self) -> Option<Capability> {
        let caps = self.filter.capabilities();
        if caps.has(Capability::Output) {
            Some(Capability::Output)
        } else if self.as_output && caps.has(Capability::Input) {
            Some(Capability::Input)
        } else {
            None
        }
    }
}

/// An ordered list of filters applied to a set of sources.
#[derive(Debug)]
pub struct FilterChain {
    entries: Vec<ChainEntry>,
    separator: String,
}

impl Default for FilterChain {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            separator: DEFAULT_SEPARATOR.to_owned(),
        }
    }
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve filter references from a bundle definition.
    pub fn from_refs(registry: &Registry, refs: &[FilterRef]) -> Result<Self, FilterError> {
        let mut chain = Self::new();
        for r in refs {
            let filter = registry.get_filter(FilterSpec::from(r.name()), r.options())?;
            chain.push(filter, r.as_output())?;
        }
        Ok(chain)
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Append a filter; fails if it is a second `open` filter.
    pub fn push(&mut self, filter: Box<dyn Filter>, as_output: bool) -> Result<(), FilterError> {
        if filter.capabilities().has(Capability::Open)
            && let Some(existing) = self.opener()
        {
            return Err(FilterError::MultipleOpen(
                existing.display_name().to_owned(),
                filter.display_name().to_owned(),
            ));
        }
        self.entries.push(ChainEntry { filter, as_output });
        Ok(())
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind every filter to `ctx` and run its setup.
    pub fn prepare(&mut self, ctx: &Arc<Context>) -> Result<(), FilterError> {
        for entry in &mut self.entries {
            prepare(entry.filter.as_mut(), Arc::clone(ctx))?;
        }
        Ok(())
    }

    /// Cache key of this chain.
    pub fn cache_key(&self) -> ContentHash {
        let ids: Vec<_> = self.entries.iter().map(|e| (e.filter.id(), e.as_output)).collect();
        chain_key(ids.iter().map(|(id, as_output)| (id, *as_output)))
    }

    fn opener(&self) -> Option<&dyn Filter> {
        self.entries
            .iter()
            .map(|e| e.filter.as_ref())
            .find(|f| f.capabilities().has(Capability::Open))
    }

    /// Run `sources` through the chain and write the result to `out`.
    ///
    /// Relative paths resolve against `ctx.root`. `output` is the bundle's
    /// destination, passed to output filters as `output` / `output_path`.
    pub fn apply(
        &self,
        ctx: &Context,
        sources: &[PathBuf],
        output: Option<&Path>,
        out: &mut dyn Write,
    ) -> Result<(), FilterError> {
        let mut parts = Vec::with_capacity(sources.len());
        for source in sources {
            parts.push(self.process_source(ctx, source)?);
        }
        let mut content = parts.join(self.separator.as_bytes());

        let mut kw = Kwargs::new();
        if let Some(output) = output {
            kw.insert("output".into(), path_value(output));
            kw.insert("output_path".into(), path_value(&ctx.resolve_path(output)));
        }
        for entry in &self.entries {
            let Some(capability) = entry.output_capability() else {
                continue;
            };
            crate::debug!("filter"; "{} {}", capability, entry.filter.display_name());
            content = run_stream(entry.filter.as_ref(), capability, &content, &kw)?;
        }

        out.write_all(&content)?;
        Ok(())
    }

    fn process_source(&self, ctx: &Context, source: &Path) -> Result<Vec<u8>, FilterError> {
        let path = ctx.resolve_path(source);
        let mut kw = Kwargs::new();
        kw.insert("source".into(), path_value(source));
        kw.insert("source_path".into(), path_value(&path));

        let mut content = match self.opener() {
            Some(opener) => {
                crate::debug!("filter"; "open {} {}", opener.display_name(), source.display());
                let mut buf = Vec::new();
                opener.open(&mut buf, &path, &kw)?;
                buf
            }
            None => fs::read(&path)?,
        };

        for entry in self.entries.iter().filter(|e| e.runs_per_source()) {
            crate::debug!("filter"; "input {} {}", entry.filter.display_name(), source.display());
            content = run_stream(entry.filter.as_ref(), Capability::Input, &content, &kw)?;
        }
        Ok(content)
    }
}

fn run_stream(
    filter: &dyn Filter,
    capability: Capability,
    content: &[u8],
    kw: &Kwargs,
) -> Result<Vec<u8>, FilterError> {
    let mut input = content;
    let mut out = Vec::with_capacity(content.len());
    match capability {
        Capability::Input => filter.input(&mut input, &mut out, kw)?,
        Capability::Output => filter.output(&mut input, &mut out, kw)?,
        Capability::Open => return Err(filter.unsupported(Capability::Open)),
    }
    Ok(out)
}

fn path_value(path: &Path) -> Value {
    Value::from(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Capabilities, FilterBase, Slot};
    use std::io::Read;
    use tempfile::TempDir;

    /// Wraps content in `tag(...)` through the configured capabilities.
    #[derive(Debug)]
    struct Tag {
        base: FilterBase,
        tag: &'static str,
        caps: Capabilities,
    }

    impl Tag {
        fn boxed(tag: &'static str, caps: Capabilities) -> Box<dyn Filter> {
            Box::new(Self {
                base: FilterBase::default(),
                tag,
                caps,
            })
        }

        fn wrap(&self, input: &mut dyn Read, out: &mut dyn Write) -> Result<(), FilterError> {
            let mut text = String::new();
            input.read_to_string(&mut text)?;
            write!(out, "{}({})", self.tag, text)?;
            Ok(())
        }
    }

    impl Filter for Tag {
        fn name(&self) -> Option<&str> {
            Some(self.tag)
        }
        fn base(&self) -> &FilterBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut FilterBase {
            &mut self.base
        }
        fn capabilities(&self) -> Capabilities {
            self.caps
        }
        fn open(&self, out: &mut dyn Write, source: &Path, kw: &Kwargs) -> Result<(), FilterError> {
            let name = source.file_name().unwrap_or_default().to_string_lossy();
            assert!(kw.contains_key("source_path"));
            write!(out, "{}[{}]", self.tag, name)?;
            Ok(())
        }
        fn input(&self, input: &mut dyn Read, out: &mut dyn Write, _kw: &Kwargs) -> Result<(), FilterError> {
            self.wrap(input, out)
        }
        fn output(&self, input: &mut dyn Read, out: &mut dyn Write, _kw: &Kwargs) -> Result<(), FilterError> {
            self.wrap(input, out)
        }
    }

    fn input_only() -> Capabilities {
        Capabilities::only(Capability::Input, Slot::Native)
    }

    fn output_only() -> Capabilities {
        Capabilities::only(Capability::Output, Slot::Native)
    }

    fn fixture() -> (TempDir, Vec<PathBuf>) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "A").unwrap();
        std::fs::write(dir.path().join("b.txt"), "B").unwrap();
        (dir, vec!["a.txt".into(), "b.txt".into()])
    }

    fn run(chain: &FilterChain, dir: &TempDir, sources: &[PathBuf]) -> String {
        let ctx = Context::new(dir.path());
        let mut out = Vec::new();
        chain.apply(&ctx, sources, None, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_input_then_output_order() {
        let (dir, sources) = fixture();
        let mut chain = FilterChain::new();
        chain.push(Tag::boxed("out", output_only()), false).unwrap();
        chain.push(Tag::boxed("in1", input_only()), false).unwrap();
        chain.push(Tag::boxed("in2", input_only()), false).unwrap();

        assert_eq!(run(&chain, &dir, &sources), "out(in2(in1(A))\nin2(in1(B)))");
    }

    #[test]
    fn test_as_output_defers_input_filter() {
        let (dir, sources) = fixture();
        let mut chain = FilterChain::new().with_separator(";");
        chain.push(Tag::boxed("late", input_only()), true).unwrap();
        chain.push(Tag::boxed("early", input_only()), false).unwrap();

        assert_eq!(run(&chain, &dir, &sources), "late(early(A);early(B))");
    }

    #[test]
    fn test_as_output_prefers_output_capability() {
        let (dir, sources) = fixture();
        let both = input_only().with(Capability::Output, Slot::Native);
        let mut chain = FilterChain::new().with_separator("+");
        chain.push(Tag::boxed("t", both), true).unwrap();

        // Runs once, after the join.
        assert_eq!(run(&chain, &dir, &sources), "t(A+B)");
    }

    #[test]
    fn test_open_replaces_reading() {
        let (dir, sources) = fixture();
        let mut chain = FilterChain::new();
        chain
            .push(Tag::boxed("op", Capabilities::only(Capability::Open, Slot::Native)), false)
            .unwrap();
        chain.push(Tag::boxed("in", input_only()), false).unwrap();

        assert_eq!(run(&chain, &dir, &sources), "in(op[a.txt])\nin(op[b.txt])");
    }

    #[test]
    fn test_only_one_open_filter() {
        let opener = || Tag::boxed("op", Capabilities::only(Capability::Open, Slot::Native));
        let mut chain = FilterChain::new();
        chain.push(opener(), false).unwrap();
        let err = chain.push(opener(), false).unwrap_err();
        assert!(matches!(err, FilterError::MultipleOpen(..)));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_missing_source() {
        let (dir, _) = fixture();
        let chain = FilterChain::new();
        let ctx = Context::new(dir.path());
        let err = chain
            .apply(&ctx, &["nope.txt".into()], None, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, FilterError::Io(_)));
    }

    #[test]
    fn test_cache_key() {
        let build = |as_output: bool| {
            let mut chain = FilterChain::new();
            chain.push(Tag::boxed("x", input_only()), as_output).unwrap();
            chain.cache_key()
        };
        assert_eq!(build(false), build(false));
        assert_ne!(build(false), build(true));
    }

    #[test]
    fn test_from_refs_uses_registry() {
        let registry = Registry::with_builtins();
        let refs = vec![
            FilterRef::Name("cssmin".into()),
            FilterRef::Detailed {
                name: "jsmin".into(),
                as_output: true,
                options: Kwargs::new(),
            },
        ];
        let chain = FilterChain::from_refs(&registry, &refs).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain.entries()[1].as_output);

        let err = FilterChain::from_refs(&registry, &[FilterRef::Name("nope".into())]).unwrap_err();
        assert!(matches!(err, FilterError::Spec(_)));
    }

    #[test]
    fn test_passes_output_kwargs() {
        #[derive(Debug)]
        struct Echo(FilterBase);
        impl Filter for Echo {
            fn name(&self) -> Option<&str> {
                Some("echo")
            }
            fn base(&self) -> &FilterBase {
                &self.0
            }
            fn base_mut(&mut self) -> &mut FilterBase {
                &mut self.0
            }
            fn capabilities(&self) -> Capabilities {
                output_only()
            }
            fn output(&self, _: &mut dyn Read, out: &mut dyn Write, kw: &Kwargs) -> Result<(), FilterError> {
                write!(out, "{}", kw.get("output").cloned().unwrap_or_default())?;
                Ok(())
            }
        }

        let (dir, sources) = fixture();
        let mut chain = FilterChain::new();
        chain.push(Box::new(Echo(FilterBase::default())), false).unwrap();
        let ctx = Context::new(dir.path());
        let mut out = Vec::new();
        chain
            .apply(&ctx, &sources, Some(Path::new("dist/site.css")), &mut out)
            .unwrap();
        assert_eq!(out, b"dist/site.css");
    }
}
