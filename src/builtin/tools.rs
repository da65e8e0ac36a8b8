//! Stock external tools.
//!
//! The `binary` option of each tool may be a list (e.g. `["npx", "sass"]`),
//! which expands into several argv entries.

use crate::config::{Kwargs, OptionSpec, Value};
use crate::external::{ExternalTool, Method, ToolSpec};
use crate::filter::{Filter, FilterError};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// `uglifyjs`: JavaScript minifier reading stdin.
pub fn uglifyjs() -> Arc<ToolSpec> {
    ToolSpec::builder("uglifyjs")
        .argv(["{self.binary}", "{self.extra_args}"])
        .method(Method::Output)
        .option(OptionSpec::new("binary", "UGLIFYJS_BIN").default_value("uglifyjs"))
        .option(OptionSpec::new("extra_args", "UGLIFYJS_EXTRA_ARGS").list())
        .build()
}

/// `cleancss`: CSS minifier reading stdin.
pub fn cleancss() -> Arc<ToolSpec> {
    ToolSpec::builder("cleancss")
        .argv(["{self.binary}", "{self.extra_args}"])
        .method(Method::Output)
        .option(OptionSpec::new("binary", "CLEANCSS_BIN").default_value("cleancss"))
        .option(OptionSpec::new("extra_args", "CLEANCSS_EXTRA_ARGS").list())
        .build()
}

/// `sass`: compile indented-syntax Sass per source.
pub fn sass() -> Arc<ToolSpec> {
    ToolSpec::builder("sass")
        .argv(["{self.binary}", "--stdin", "--indented", "--style={self.style}"])
        .method(Method::Input)
        .option(OptionSpec::new("binary", "SASS_BIN").default_value("sass"))
        .option(OptionSpec::new("style", "SASS_STYLE"))
        .option(OptionSpec::new("load_paths", "SASS_LOAD_PATHS").list())
        .override_input(Arc::new(sass_input))
        .build()
}

/// `scss`: as `sass`, for SCSS syntax.
pub fn scss(sass: Arc<ToolSpec>) -> Arc<ToolSpec> {
    ToolSpec::builder("scss")
        .argv(["{self.binary}", "--stdin", "--no-indented", "--style={self.style}"])
        .extends(sass)
        .build()
}

/// `babel`: transpile JavaScript per source.
pub fn babel() -> Arc<ToolSpec> {
    ToolSpec::builder("babel")
        .argv(["{self.binary}", "--presets={self.presets}", "{self.extra_args}"])
        .method(Method::Input)
        .option(OptionSpec::new("binary", "BABEL_BIN").default_value("babel"))
        .option(OptionSpec::new("presets", "BABEL_PRESETS").list())
        .option(OptionSpec::new("extra_args", "BABEL_EXTRA_ARGS").list())
        .build()
}

/// All stock tools, in registration order.
pub fn all() -> Vec<Arc<ToolSpec>> {
    let sass = sass();
    vec![uglifyjs(), cleancss(), Arc::clone(&sass), scss(sass), babel()]
}

/// The stock tool named `name`, if any.
pub fn find(name: &str) -> Option<Arc<ToolSpec>> {
    all().into_iter().find(|spec| spec.name() == Some(name))
}

/// Sass needs one `--load-path` flag per directory, including the
/// directory of the source being compiled.
fn sass_input(
    tool: &ExternalTool,
    input: &mut dyn Read,
    out: &mut dyn Write,
    kw: &Kwargs,
) -> Result<(), FilterError> {
    let mut argv = tool.format_argv(tool.spec().argv(), &[], kw)?;

    let mut load_paths = tool.options().get_list("load_paths");
    if let Some(source) = kw.get("source_path").and_then(Value::as_str)
        && let Some(dir) = Path::new(source).parent()
        && !dir.as_os_str().is_empty()
    {
        load_paths.push(dir.to_string_lossy().into_owned());
    }
    argv.extend(
        load_paths
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(|p| format!("--load-path={p}")),
    );

    let mut data = Vec::new();
    input.read_to_end(&mut data)?;
    tool.subprocess(&argv, out, Some(&data))
}
