// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Subversion command interface.
//!
//! All interaction with Subversion goes through the [`Subversion`] trait, so
//! the reconciliation logic never sees a command line or an XML document. The
//! [`SvnCli`] implementation drives the `svn` binary as a child process, and
//! parses its structured `--xml` output through [`info`].
//!
//! Any unsuccessful command surfaces as [`SvnError::RemoteCommandFailure`],
//! except for the "node does not exist" family of failures, which surface as
//! [`SvnError::RemoteUnreachable`] so callers can tell a missing external
//! apart from a broken server.

pub mod info;
pub mod inspect;

#[cfg(test)]
pub(crate) mod fake;

use crate::{
    external::Revision,
    svn::info::Info,
    syscall::{syscall_non_interactive, SyscallError},
};

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    sync::Arc,
};
use tracing::instrument;

/// Classification of a repository node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Directory,
    #[default]
    Unknown,
}

impl NodeKind {
    /// Classify Subversion's `kind` attribute.
    pub fn from_svn(kind: &str) -> Self {
        match kind {
            "file" => Self::File,
            "dir" => Self::Directory,
            _ => Self::Unknown,
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::File => fmt.write_str("file"),
            Self::Directory => fmt.write_str("directory"),
            Self::Unknown => fmt.write_str("unknown"),
        }
    }
}

/// Working copy depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Empty,
    Files,
    Immediates,
    Infinity,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Files => "files",
            Self::Immediates => "immediates",
            Self::Infinity => "infinity",
        }
    }
}

/// Automatic conflict resolution policy for updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    Postpone,
    /// Keep the working copy's state over incoming changes.
    Working,
    MineFull,
    TheirsFull,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postpone => "postpone",
            Self::Working => "working",
            Self::MineFull => "mine-full",
            Self::TheirsFull => "theirs-full",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckoutOptions {
    pub revision: Option<Revision>,
    pub depth: Option<Depth>,
    /// Tolerate unversioned obstructions.
    pub force: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateOptions {
    pub revision: Option<Revision>,
    /// Sticky depth change, e.g., widen an empty folder to pull one file.
    pub set_depth: Option<Depth>,
    pub accept: Option<ConflictPolicy>,
    /// Tolerate unversioned obstructions.
    pub force: bool,
    /// Treat local additions as modifications to dodge tree conflicts.
    pub adds_as_modification: bool,
}

/// Remote version control command interface.
pub trait Subversion: Send + Sync + 'static {
    /// Query node information of a URL or working copy path.
    fn info(&self, target: &str, revision: Option<&Revision>) -> Result<Info>;

    /// Check out locator into target path.
    fn checkout(&self, locator: &str, target: &Path, options: &CheckoutOptions) -> Result<()>;

    /// Update working copy path.
    fn update(&self, target: &Path, options: &UpdateOptions) -> Result<()>;

    /// Check if working copy path has uncommitted modifications.
    ///
    /// Unversioned files do not count as modifications.
    fn is_modified(&self, path: &Path) -> Result<bool>;

    /// Recursive listing of `svn:externals` properties below path.
    fn externals_property(&self, path: &Path) -> Result<String>;

    /// Revisions with changes between `from` and `to` (both inclusive).
    fn log_revisions(&self, path: &Path, from: &Revision, to: &Revision) -> Result<Vec<u64>>;
}

impl<S> Subversion for Arc<S>
where
    S: Subversion + ?Sized,
{
    fn info(&self, target: &str, revision: Option<&Revision>) -> Result<Info> {
        (**self).info(target, revision)
    }

    fn checkout(&self, locator: &str, target: &Path, options: &CheckoutOptions) -> Result<()> {
        (**self).checkout(locator, target, options)
    }

    fn update(&self, target: &Path, options: &UpdateOptions) -> Result<()> {
        (**self).update(target, options)
    }

    fn is_modified(&self, path: &Path) -> Result<bool> {
        (**self).is_modified(path)
    }

    fn externals_property(&self, path: &Path) -> Result<String> {
        (**self).externals_property(path)
    }

    fn log_revisions(&self, path: &Path, from: &Revision, to: &Revision) -> Result<Vec<u64>> {
        (**self).log_revisions(path, from, to)
    }
}

/// Credentials passed along with every command.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Subversion access through the `svn` binary.
#[derive(Debug, Clone)]
pub struct SvnCli {
    program: OsString,
    credentials: Option<Credentials>,
}

impl Default for SvnCli {
    fn default() -> Self {
        Self {
            program: "svn".into(),
            credentials: None,
        }
    }
}

impl SvnCli {
    /// Construct new command line client using `svn` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another binary, e.g., an absolute path to `svn`.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    fn svncall(&self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Result<String> {
        self.svncall_in(args, None)
    }

    fn svncall_in(
        &self,
        args: impl IntoIterator<Item = impl Into<OsString>>,
        cwd: Option<&Path>,
    ) -> Result<String> {
        let mut bin_args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        bin_args.push("--non-interactive".into());
        if let Some(credentials) = &self.credentials {
            bin_args.push("--username".into());
            bin_args.push(credentials.username.clone().into());
            if let Some(password) = &credentials.password {
                bin_args.push("--password".into());
                bin_args.push(password.clone().into());
            }
        }

        syscall_non_interactive(&self.program, bin_args, cwd).map_err(SvnError::from)
    }
}

impl Subversion for SvnCli {
    #[instrument(skip(self), level = "debug")]
    fn info(&self, target: &str, revision: Option<&Revision>) -> Result<Info> {
        let mut args: Vec<OsString> = vec!["info".into(), "--xml".into()];
        if let Some(revision) = revision {
            args.push("-r".into());
            args.push(revision.as_str().into());
        }
        args.push(target.into());

        match self.svncall(args) {
            Ok(xml) => xml.parse(),
            Err(SvnError::RemoteCommandFailure { message, .. }) if is_missing_node(&message) => {
                Err(SvnError::RemoteUnreachable {
                    locator: target.to_owned(),
                    revision: revision.cloned(),
                })
            }
            Err(error) => Err(error),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn checkout(&self, locator: &str, target: &Path, options: &CheckoutOptions) -> Result<()> {
        let mut args: Vec<OsString> = vec!["checkout".into(), "-q".into()];
        if let Some(depth) = options.depth {
            args.push("--depth".into());
            args.push(depth.as_str().into());
        }
        if options.force {
            args.push("--force".into());
        }
        if let Some(revision) = &options.revision {
            args.push("-r".into());
            args.push(revision.as_str().into());
        }
        args.push(locator.into());
        args.push(target.into());

        self.svncall(args)?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn update(&self, target: &Path, options: &UpdateOptions) -> Result<()> {
        let mut args: Vec<OsString> = vec!["update".into(), "-q".into()];
        if options.force {
            args.push("--force".into());
        }
        if let Some(depth) = options.set_depth {
            args.push("--set-depth".into());
            args.push(depth.as_str().into());
        }
        if let Some(accept) = options.accept {
            args.push("--accept".into());
            args.push(accept.as_str().into());
        }
        if options.adds_as_modification {
            args.push("--adds-as-modification".into());
        }
        if let Some(revision) = &options.revision {
            args.push("-r".into());
            args.push(revision.as_str().into());
        }
        args.push(target.into());

        self.svncall(args)?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn is_modified(&self, path: &Path) -> Result<bool> {
        let output = self.svncall([OsString::from("status"), "--quiet".into(), path.into()])?;
        Ok(output.lines().any(|line| !line.trim().is_empty()))
    }

    // INVARIANT: Run from path so declaring folders come out relative to it.
    #[instrument(skip(self), level = "debug")]
    fn externals_property(&self, path: &Path) -> Result<String> {
        self.svncall_in(["propget", "svn:externals", "-R", "."], Some(path))
    }

    #[instrument(skip(self), level = "debug")]
    fn log_revisions(&self, path: &Path, from: &Revision, to: &Revision) -> Result<Vec<u64>> {
        let xml = self.svncall([
            OsString::from("log"),
            "--xml".into(),
            "-q".into(),
            "-r".into(),
            format!("{from}:{to}").into(),
            path.into(),
        ])?;

        info::parse_log_revisions(&xml)
    }
}

// Error codes Subversion reports for nodes that do not exist at a revision,
// or paths that are not versioned at all.
fn is_missing_node(stderr: &str) -> bool {
    ["E170000", "W170000", "E155010", "W155010", "E200009", "E155007"]
        .iter()
        .any(|code| stderr.contains(code))
}

/// Subversion error types.
#[derive(Debug, thiserror::Error)]
pub enum SvnError {
    /// Locator does not exist at requested revision.
    #[error("{locator:?} does not exist at revision {}", revision.as_ref().map(Revision::as_str).unwrap_or("HEAD"))]
    RemoteUnreachable {
        locator: String,
        revision: Option<Revision>,
    },

    /// Command exited unsuccessfully, or could not be run at all.
    #[error("svn command {command:?} failed: {message}")]
    RemoteCommandFailure { command: String, message: String },

    /// Structured output cannot be parsed.
    #[error("failed to parse svn output")]
    Xml(#[from] quick_xml::DeError),

    /// Structured output lacks an expected field.
    #[error("svn output lacks field {0:?}")]
    MissingField(&'static str),
}

impl From<SyscallError> for SvnError {
    fn from(error: SyscallError) -> Self {
        match error {
            SyscallError::Spawn { command, source } => Self::RemoteCommandFailure {
                command,
                message: source.to_string(),
            },
            SyscallError::Failed {
                command, stderr, ..
            } => Self::RemoteCommandFailure {
                command,
                message: stderr,
            },
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = SvnError> = std::result::Result<T, E>;
