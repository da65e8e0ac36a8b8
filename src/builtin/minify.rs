//! In-process minifiers: oxc for JavaScript, lightningcss for CSS.

use crate::config::{Kwargs, OptionSpec};
use crate::filter::{Capabilities, Capability, Filter, FilterBase, FilterClass, FilterError, Slot};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use std::io::{Read, Write};

/// Minify JavaScript source code.
pub fn minify_js(source: &str, mangle: bool) -> Result<String, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(error.to_string());
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: mangle.then(MangleOptions::default),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Minify CSS source code.
pub fn minify_css(source: &str) -> Result<String, String> {
    let stylesheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|e| e.to_string())?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(result.code)
}

fn read_text(filter: &str, input: &mut dyn Read) -> Result<String, FilterError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| FilterError::failed(filter, format!("input is not UTF-8: {e}")))
}

// ============================================================================
// cssmin
// ============================================================================

/// `cssmin`: minify the bundled CSS.
#[derive(Debug)]
pub struct CssMin {
    base: FilterBase,
}

impl FilterClass for CssMin {
    const NAME: Option<&'static str> = Some("cssmin");

    fn create(kwargs: Kwargs) -> Result<Self, FilterError> {
        Ok(Self {
            base: FilterBase::empty(kwargs)?,
        })
    }
}

impl Filter for CssMin {
    fn name(&self) -> Option<&str> {
        Self::NAME
    }

    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FilterBase {
        &mut self.base
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::only(Capability::Output, Slot::Native)
    }

    fn output(&self, input: &mut dyn Read, out: &mut dyn Write, _kw: &Kwargs) -> Result<(), FilterError> {
        let source = read_text("cssmin", input)?;
        let css = minify_css(&source).map_err(|e| FilterError::failed("cssmin", e))?;
        out.write_all(css.as_bytes())?;
        Ok(())
    }
}

// ============================================================================
// jsmin
// ============================================================================

/// `jsmin`: minify the bundled JavaScript; `mangle` renames locals.
#[derive(Debug)]
pub struct JsMin {
    base: FilterBase,
}

impl JsMin {
    fn schema() -> [OptionSpec; 1] {
        [OptionSpec::new("mangle", "JSMIN_MANGLE").default_value(true)]
    }

    fn mangle(&self) -> bool {
        self.options().get_bool("mangle").unwrap_or(true)
    }
}

impl FilterClass for JsMin {
    const NAME: Option<&'static str> = Some("jsmin");

    fn create(kwargs: Kwargs) -> Result<Self, FilterError> {
        Ok(Self {
            base: FilterBase::new(&Self::schema(), kwargs)?,
        })
    }
}

impl Filter for JsMin {
    fn name(&self) -> Option<&str> {
        Self::NAME
    }

    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FilterBase {
        &mut self.base
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::only(Capability::Output, Slot::Native)
    }

    fn output(&self, input: &mut dyn Read, out: &mut dyn Write, _kw: &Kwargs) -> Result<(), FilterError> {
        let source = read_text("jsmin", input)?;
        let js = minify_js(&source, self.mangle()).map_err(|e| FilterError::failed("jsmin", e))?;
        out.write_all(js.as_bytes())?;
        Ok(())
    }

    fn unique(&self) -> crate::config::Value {
        self.mangle().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MapEnv, Value};
    use crate::filter::{Context, prepare};
    use std::sync::Arc;

    fn run(filter: &dyn Filter, input: &str) -> Result<String, FilterError> {
        let mut out = Vec::new();
        filter.output(&mut input.as_bytes(), &mut out, &Kwargs::new())?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_minify_css() {
        let css = "body {\n  color: red;\n  margin: 0px;\n}\n";
        let min = minify_css(css).unwrap();
        assert!(min.len() < css.len());
        assert!(min.contains("color:red"));
    }

    #[test]
    fn test_minify_js() {
        let js = "function add(first, second) {\n  return first + second;\n}\nexport { add };\n";
        let min = minify_js(js, true).unwrap();
        assert!(min.len() < js.len());
        assert!(!min.contains("first"));

        let kept = minify_js(js, false).unwrap();
        assert!(kept.contains("first"));
    }

    #[test]
    fn test_cssmin_filter() {
        let f = CssMin::create(Kwargs::new()).unwrap();
        assert_eq!(run(&f, "a { color: #ff0000; }").unwrap(), "a{color:red}");
        assert!(CssMin::create([("x".to_owned(), Value::from(1_i64))].into_iter().collect()).is_err());
    }

    #[test]
    fn test_jsmin_rejects_invalid_js() {
        let f = JsMin::create(Kwargs::new()).unwrap();
        let err = run(&f, "function (").unwrap_err();
        assert!(matches!(err, FilterError::Failed { ref filter, .. } if filter == "jsmin"));
    }

    #[test]
    fn test_jsmin_mangle_from_env() {
        let mut f = JsMin::create(Kwargs::new()).unwrap();
        let env: MapEnv = [("JSMIN_MANGLE", "no")].into_iter().collect();
        prepare(&mut f, Arc::new(Context::default().with_env(env))).unwrap();
        assert!(!f.mangle());
        assert_eq!(f.unique(), Value::Bool(false));

        let f = JsMin::create(Kwargs::new()).unwrap();
        assert!(f.mangle());
    }
}
