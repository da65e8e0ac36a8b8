//! Running one external tool invocation.

use crate::filter::FilterError;
use crate::utils::exec::{Cmd, format_error, strip_ansi};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

const INPUT: &str = "{input}";
const OUTPUT: &str = "{output}";

/// Run `argv` and write the tool's result to `out`.
///
/// - `{input}` in argv: `data` is written to a temp file whose path replaces
///   the marker, and nothing is sent on stdin. Fails before launching when
///   `data` is `None`.
/// - `{output}` in argv: the marker is replaced with a temp path the tool
///   must create; its content is copied to `out`. Otherwise stdout is.
/// - Without `{input}`, `data` goes to stdin.
///
/// Temp files live in one private directory removed on every return path.
pub fn subprocess(
    argv: &[String],
    out: &mut dyn Write,
    data: Option<&[u8]>,
    cwd: Option<&Path>,
) -> Result<(), FilterError> {
    let Some(program) = argv.first() else {
        return Err(FilterError::failed("subprocess", "argv is empty"));
    };

    let uses_input = argv.iter().any(|a| a.contains(INPUT));
    let uses_output = argv.iter().any(|a| a.contains(OUTPUT));

    if uses_input && data.is_none() {
        return Err(FilterError::MissingInput {
            tool: program.clone(),
        });
    }

    let scratch = if uses_input || uses_output {
        Some(tempfile::Builder::new().prefix("assetflow-").tempdir()?)
    } else {
        None
    };
    let input_path = scratch
        .as_ref()
        .filter(|_| uses_input)
        .map(|dir| dir.path().join("input"));
    let output_path = scratch
        .as_ref()
        .filter(|_| uses_output)
        .map(|dir| dir.path().join("output"));

    if let (Some(path), Some(data)) = (&input_path, data) {
        fs::write(path, data)?;
    }

    let argv: Vec<String> = argv
        .iter()
        .map(|arg| {
            let mut arg = arg.clone();
            if let Some(path) = &input_path {
                arg = arg.replace(INPUT, &path.to_string_lossy());
            }
            if let Some(path) = &output_path {
                arg = arg.replace(OUTPUT, &path.to_string_lossy());
            }
            arg
        })
        .collect();

    let mut cmd = Cmd::from_slice(&argv);
    if let Some(dir) = cwd.filter(|d| !d.as_os_str().is_empty()) {
        cmd = cmd.cwd(dir);
    }
    if !uses_input && let Some(data) = data {
        cmd = cmd.stdin(data);
    }
    crate::debug!("tool"; "{}", argv.join(" "));

    let output = cmd.output().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => FilterError::ToolNotFound {
            program: program.clone(),
            source,
        },
        _ => FilterError::Io(source),
    })?;

    if !output.status.success() {
        return Err(FilterError::ToolFailed {
            program: program.clone(),
            status: output.status,
            stderr: strip_ansi(&String::from_utf8_lossy(&output.stderr)).into_owned(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            message: format_error(program, &output),
        });
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        crate::debug!("tool"; "{}: {}", program, strip_ansi(stderr.trim()));
    }

    match &output_path {
        Some(path) => {
            let result = fs::read(path).map_err(|source| FilterError::MissingOutput {
                program: program.clone(),
                source,
            })?;
            out.write_all(&result)?;
        }
        None => out.write_all(&output.stdout)?,
    }

    if let Some(dir) = scratch {
        dir.close()?;
    }
    Ok(())
}
