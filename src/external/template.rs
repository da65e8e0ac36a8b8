//! Argv template expansion.
//!
//! Each token may contain `{placeholder}` markers:
//!
//! - `{0}`, `{1}` … positional call arguments, and `{}` the next one
//!   (counted from zero within each token);
//! - `{name}` or `{name.key}` keyword call arguments;
//! - `{self.name}` the tool's name, `{self.<option>}` its resolved options;
//! - `{input}` and `{output}` are left in place for [`subprocess`];
//! - `{{` and `}}` are literal braces.
//!
//! A token that is exactly one placeholder resolving to a list becomes one
//! argv entry per item. A token referencing an unset value is omitted, as is
//! any token expanding to the empty string.
//!
//! [`subprocess`]: super::subprocess

use crate::config::{Kwargs, Value};
use crate::filter::TemplateError;
use std::borrow::Cow;

/// Placeholders reserved for the subprocess protocol.
pub const RESERVED: [&str; 2] = ["input", "output"];

/// Values a template can reference.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub positional: &'a [Value],
    pub kwargs: &'a Kwargs,
    /// `self.*` namespace, a map.
    pub this: &'a Value,
}

enum Piece<'t> {
    Text(&'t str),
    Placeholder(Cow<'t, str>),
}

/// Expand all tokens of `argv`.
pub fn expand_argv(argv: &[String], vars: &TemplateVars<'_>) -> Result<Vec<String>, TemplateError> {
    let mut expanded = Vec::with_capacity(argv.len());
    for token in argv {
        expand_token(token, vars, &mut expanded)?;
    }
    Ok(expanded)
}

fn expand_token(token: &str, vars: &TemplateVars<'_>, out: &mut Vec<String>) -> Result<(), TemplateError> {
    let pieces = parse(token)?;

    if let [Piece::Placeholder(name)] = pieces.as_slice()
        && !RESERVED.contains(&name.as_ref())
    {
        match resolve(name, token, vars)? {
            Value::Null => {}
            Value::List(items) => out.extend(
                items
                    .iter()
                    .map(ToString::to_string)
                    .filter(|s| !s.is_empty()),
            ),
            value => push_nonempty(out, value.to_string()),
        }
        return Ok(());
    }

    let mut text = String::with_capacity(token.len());
    for piece in pieces {
        match piece {
            Piece::Text(s) => text.push_str(s),
            Piece::Placeholder(name) if RESERVED.contains(&name.as_ref()) => {
                text.push('{');
                text.push_str(&name);
                text.push('}');
            }
            Piece::Placeholder(name) => match resolve(&name, token, vars)? {
                Value::Null => return Ok(()),
                value => text.push_str(&value.to_string()),
            },
        }
    }
    push_nonempty(out, text);
    Ok(())
}

fn push_nonempty(out: &mut Vec<String>, s: String) {
    if !s.is_empty() {
        out.push(s);
    }
}

/// Split a token into literal text and placeholder names.
///
/// Empty placeholders are numbered here, so `{}{}` reads as `{0}{1}`.
fn parse(token: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let unbalanced = || TemplateError::Unbalanced(token.to_owned());
    let bytes = token.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut next_positional = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                pieces.push(Piece::Text(&token[start..=i]));
                i += 2;
                start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                pieces.push(Piece::Text(&token[start..=i]));
                i += 2;
                start = i;
            }
            b'{' => {
                pieces.push(Piece::Text(&token[start..i]));
                let close = token[i + 1..].find('}').ok_or_else(unbalanced)? + i + 1;
                let name = &token[i + 1..close];
                if name.contains('{') {
                    return Err(unbalanced());
                }
                let name = name.trim();
                if name.is_empty() {
                    pieces.push(Piece::Placeholder(Cow::Owned(next_positional.to_string())));
                    next_positional += 1;
                } else {
                    pieces.push(Piece::Placeholder(Cow::Borrowed(name)));
                }
                i = close + 1;
                start = i;
            }
            b'}' => return Err(unbalanced()),
            _ => i += 1,
        }
    }
    pieces.push(Piece::Text(&token[start..]));
    pieces.retain(|p| !matches!(p, Piece::Text("")));
    Ok(pieces)
}

fn resolve(name: &str, token: &str, vars: &TemplateVars<'_>) -> Result<Value, TemplateError> {
    let unknown = || TemplateError::Unknown {
        token: token.to_owned(),
        placeholder: name.to_owned(),
    };

    let mut path = name.split('.');
    let head = path.next().unwrap_or_default();

    let root = if head == "self" {
        Some(vars.this)
    } else if let Ok(index) = head.parse::<usize>() {
        vars.positional.get(index)
    } else {
        vars.kwargs.get(head)
    };

    root.and_then(|value| value.lookup(path))
        .cloned()
        .ok_or_else(unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn this() -> Value {
        let mut map = BTreeMap::new();
        map.insert("name".to_owned(), Value::from("mytool"));
        map.insert("binary".to_owned(), Value::from("node"));
        map.insert("style".to_owned(), Value::Null);
        map.insert(
            "paths".to_owned(),
            Value::from(vec!["a", "b"]),
        );
        Value::Map(map)
    }

    fn expand(argv: &[&str], positional: &[Value], kwargs: &Kwargs) -> Result<Vec<String>, TemplateError> {
        let this = this();
        let argv: Vec<String> = argv.iter().map(|s| (*s).to_owned()).collect();
        expand_argv(
            &argv,
            &TemplateVars {
                positional,
                kwargs,
                this: &this,
            },
        )
    }

    #[test]
    fn test_argv_variables() {
        let kwargs: Kwargs = [("kwarg".to_owned(), Value::from("value"))].into_iter().collect();
        let argv = expand(
            &["{self.name}", "{kwarg}", "{0}", "{input}", "{output}"],
            &[Value::from(false)],
            &kwargs,
        )
        .unwrap();
        assert_eq!(argv, ["mytool", "value", "false", "{input}", "{output}"]);
    }

    #[test]
    fn test_auto_numbered_positionals() {
        let positional = [Value::from("a.css"), Value::from("b.css")];
        let argv = expand(&["{}", "{}:{}", "--x={}"], &positional, &Kwargs::new()).unwrap();
        assert_eq!(argv, ["a.css", "a.css:b.css", "--x=a.css"]);

        let err = expand(&["{}{}"], &positional[..1], &Kwargs::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Unknown { ref placeholder, .. } if placeholder == "1"));
    }

    #[test]
    fn test_reserved_inside_token() {
        let argv = expand(&["--out={output}", "-i{input}"], &[], &Kwargs::new()).unwrap();
        assert_eq!(argv, ["--out={output}", "-i{input}"]);
    }

    #[test]
    fn test_escaped_braces() {
        let argv = expand(&["{{literal}}", "a{{b"], &[], &Kwargs::new()).unwrap();
        assert_eq!(argv, ["{literal}", "a{b"]);
    }

    #[test]
    fn test_list_expansion() {
        let argv = expand(&["{self.binary}", "{self.paths}", "-I={self.paths}"], &[], &Kwargs::new()).unwrap();
        assert_eq!(argv, ["node", "a", "b", "-I=a,b"]);
    }

    #[test]
    fn test_unset_values_drop_token() {
        let argv = expand(&["sass", "--style={self.style}", "{self.style}", ""], &[], &Kwargs::new()).unwrap();
        assert_eq!(argv, ["sass"]);
    }

    #[test]
    fn test_unknown_placeholder() {
        let err = expand(&["{self.missing}"], &[], &Kwargs::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Unknown {
                token: "{self.missing}".into(),
                placeholder: "self.missing".into(),
            }
        );
        assert!(expand(&["{1}"], &[Value::Null], &Kwargs::new()).is_err());
        assert!(expand(&["{nokwarg}"], &[], &Kwargs::new()).is_err());
    }

    #[test]
    fn test_unbalanced() {
        for token in ["{open", "close}", "{a{b}"] {
            assert_eq!(
                expand(&[token], &[], &Kwargs::new()).unwrap_err(),
                TemplateError::Unbalanced(token.into())
            );
        }
    }
}
