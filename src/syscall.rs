// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process calls.
//!
//! Both `svn` and `git svn` are driven as child processes. Output is captured
//! and handed back as text; parsing it is left to the caller.

use std::{
    ffi::OsStr,
    path::Path,
    process::Command,
};
use tracing::{debug, trace};

/// Run a command to completion and capture its standard output.
///
/// Standard error is kept around for error reporting only. The child runs in
/// `cwd` when given, the current process never changes directory.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if the program cannot be started.
/// - Return [`SyscallError::Failed`] if the program exits unsuccessfully.
pub(crate) fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: Option<&Path>,
) -> Result<String> {
    let mut command = Command::new(cmd.as_ref());
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let line = render(&command);
    debug!("run {line}");
    let output = command.output().map_err(|source| SyscallError::Spawn {
        command: line.clone(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    if !stdout.is_empty() {
        trace!("stdout: {}", chomp(&stdout));
    }

    if !output.status.success() {
        return Err(SyscallError::Failed {
            command: line,
            status: output.status.code(),
            stderr: chomp(&stderr).to_owned(),
        });
    }

    Ok(stdout)
}

fn render(command: &Command) -> String {
    let mut line = command.get_program().to_string_lossy().into_owned();
    let mut secret = false;
    for arg in command.get_args() {
        let arg = arg.to_string_lossy();
        line.push(' ');
        if secret {
            line.push_str("<redacted>");
        } else if arg.contains(' ') {
            line.push_str(&format!("{arg:?}"));
        } else {
            line.push_str(&arg);
        }
        secret = arg == "--password";
    }

    line
}

// INVARIANT: Chomp trailing newlines.
fn chomp(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SyscallError {
    #[error("failed to run {command:?}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command {command:?} failed ({status:?}): {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

type Result<T, E = SyscallError> = std::result::Result<T, E>;
