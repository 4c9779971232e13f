// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git side of a git-svn bridge.
//!
//! A __git-svn bridge__ is a git repository that mirrors one or more branches
//! of a Subversion repository through `git svn`. Everything that libgit2 can
//! answer on its own (status, history, configuration, references) goes
//! through [`git2`]. Only `git svn` subcommands themselves are run as child
//! processes.
//!
//! # Branch Point
//!
//! Commits fetched from Subversion carry a trailer like:
//!
//! ```text
//! git-svn-id: http://host/repo/trunk@72028 cfd94225-6148-4c34-bb2a-21ea3148c527
//! ```
//!
//! The first commit along the first-parent history of `HEAD` carrying such a
//! trailer is the __branch point__: the Subversion revision local git work is
//! based on.

use crate::{
    external::{parse_show_externals, ExternalDefinition, ExternalError, Revision},
    syscall::{syscall_non_interactive, SyscallError},
};

use git2::{Config, ConfigLevel, ErrorCode, Oid, Repository, StatusOptions};
use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    str::FromStr,
};
use tracing::{debug, info, instrument};

const SVN_URL_KEY: &str = "svn-remote.svn.url";
const SVN_FETCH_KEY: &str = "svn-remote.svn.fetch";
const SVN_IGNORE_PATHS_KEY: &str = "svn-remote.svn.ignore-paths";

/// Git repository that may act as a git-svn bridge.
pub struct GitSvn {
    repository: Repository,
}

impl std::fmt::Debug for GitSvn {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("GitSvn")
            .field("path", &self.repository.path())
            .finish()
    }
}

impl GitSvn {
    /// Find git repository at or above path.
    ///
    /// # Errors
    ///
    /// - Return [`GitSvnError::Git2`] if no repository can be found.
    #[instrument(skip(path), level = "debug")]
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        debug!("discover git repository from {:?}", path.as_ref().display());
        let repository = Repository::discover(path.as_ref())?;
        Ok(Self { repository })
    }

    /// Turn folder into a git-svn bridge of `url` with `git svn init`.
    ///
    /// Creates the git repository if there is none yet.
    ///
    /// # Errors
    ///
    /// - Return [`GitSvnError::Command`] if `git svn init` fails.
    /// - Return [`GitSvnError::Git2`] if the new repository cannot be opened.
    #[instrument(skip(path), level = "debug")]
    pub fn init_bridge(path: impl AsRef<Path>, url: &str) -> Result<Self> {
        info!("initialize git-svn bridge for {url}");
        syscall_non_interactive("git", ["svn", "init", url], Some(path.as_ref()))?;
        Self::discover(path)
    }

    /// Work tree of repository.
    ///
    /// # Errors
    ///
    /// - Return [`GitSvnError::BareRepository`] for bare repositories.
    pub fn workdir(&self) -> Result<&Path> {
        self.repository.workdir().ok_or(GitSvnError::BareRepository)
    }

    /// Path to `.git` directory.
    pub fn gitdir(&self) -> &Path {
        self.repository.path()
    }

    /// Root URL of bridged Subversion repository, if this is a bridge at all.
    pub fn svn_url(&self) -> Result<Option<String>> {
        match self.local_config()?.get_string(SVN_URL_KEY) {
            Ok(url) => Ok(Some(url)),
            Err(error) if error.code() == ErrorCode::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    pub fn is_bridge(&self) -> Result<bool> {
        Ok(self.svn_url()?.is_some())
    }

    /// Work tree has uncommitted changes to tracked files.
    pub fn is_dirty(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);
        let statuses = self.repository.statuses(Some(&mut options))?;
        Ok(!statuses.is_empty())
    }

    /// Short name of branch `HEAD` points to.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repository.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_owned())
    }

    /// Locate branch point of `HEAD`.
    ///
    /// # Errors
    ///
    /// - Return [`GitSvnError::NoBranchPoint`] if no commit along the
    ///   first-parent history came from Subversion.
    #[instrument(skip(self), level = "debug")]
    pub fn branch_point(&self) -> Result<BranchPoint> {
        let mut commit = self.repository.head()?.peel_to_commit()?;
        loop {
            if let Some((url, revision)) = commit.message().and_then(parse_git_svn_id) {
                debug!("branch point {} at {url}@{revision}", commit.id());
                return Ok(BranchPoint {
                    commit: commit.id(),
                    url,
                    revision,
                });
            }

            commit = match commit.parent(0) {
                Ok(parent) => parent,
                Err(error) if error.code() == ErrorCode::NotFound => {
                    return Err(GitSvnError::NoBranchPoint);
                }
                Err(error) => return Err(error.into()),
            };
        }
    }

    /// Number of commits `HEAD` is ahead of branch point.
    pub fn commits_ahead(&self, point: &BranchPoint) -> Result<usize> {
        let head = self.repository.head()?.peel_to_commit()?.id();
        let (ahead, _) = self.repository.graph_ahead_behind(head, point.commit)?;
        Ok(ahead)
    }

    /// Configured `svn-remote.svn.fetch` mappings.
    pub fn fetch_mappings(&self) -> Result<Vec<FetchMapping>> {
        let config = self.local_config()?;
        let mut entries = match config.multivar(SVN_FETCH_KEY, None) {
            Ok(entries) => entries,
            Err(error) if error.code() == ErrorCode::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut mappings = Vec::new();
        while let Some(entry) = entries.next() {
            let entry = entry?;
            if let Some(value) = entry.value() {
                mappings.push(value.parse()?);
            }
        }

        Ok(mappings)
    }

    pub fn add_fetch_mapping(&self, mapping: &FetchMapping) -> Result<()> {
        info!("track {mapping}");
        self.local_config()?
            .set_multivar(SVN_FETCH_KEY, "^$", &mapping.to_string())?;
        Ok(())
    }

    /// Remove all `svn-remote.svn.fetch` mappings.
    pub fn clear_fetch_mappings(&self) -> Result<()> {
        match self.local_config()?.remove_multivar(SVN_FETCH_KEY, ".*") {
            Err(error) if error.code() != ErrorCode::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }

    pub fn ignore_paths(&self) -> Result<Option<String>> {
        match self.local_config()?.get_string(SVN_IGNORE_PATHS_KEY) {
            Ok(regex) => Ok(Some(regex)),
            Err(error) if error.code() == ErrorCode::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    pub fn set_ignore_paths(&self, regex: &str) -> Result<()> {
        info!("ignore svn paths matching {regex:?}");
        self.local_config()?.set_str(SVN_IGNORE_PATHS_KEY, regex)?;
        Ok(())
    }

    pub fn reference_exists(&self, name: &str) -> bool {
        self.repository.find_reference(name).is_ok()
    }

    /// Point reference `name` at whatever `source` points at.
    ///
    /// # Errors
    ///
    /// - Return [`GitSvnError::Git2`] if source does not exist, or target
    ///   exists and `force` is not set.
    pub fn copy_reference(&self, name: &str, source: &str, force: bool) -> Result<()> {
        let target = self.repository.find_reference(source)?.peel_to_commit()?.id();
        info!("point {name} at {source}");
        self.repository
            .reference(name, target, force, &format!("svnbridge: copy {source}"))?;
        Ok(())
    }

    /// Externals declared on the bridged Subversion branch.
    ///
    /// # Errors
    ///
    /// - Return [`GitSvnError::NotABridge`] if repository is not a bridge.
    pub fn externals(&self) -> Result<Vec<ExternalDefinition>> {
        let url = self.svn_url()?.ok_or(GitSvnError::NotABridge)?;
        let listing = self.gitsvn(["show-externals"])?;
        Ok(parse_show_externals(&url, &listing)?)
    }

    /// Run `git svn init <url>`.
    pub fn svn_init(&self, url: &str) -> Result<()> {
        info!("initialize git-svn bridge for {url}");
        self.gitsvn(["init", url])?;
        Ok(())
    }

    /// Run `git svn fetch`, optionally starting at revision.
    pub fn svn_fetch(&self, revision: Option<&Revision>) -> Result<()> {
        let mut args: Vec<OsString> = vec!["fetch".into()];
        if let Some(revision) = revision {
            args.push("-r".into());
            args.push(revision.as_str().into());
        }
        self.gitsvn(args)?;
        Ok(())
    }

    /// Output of `git svn show-ignore`.
    pub fn show_ignore(&self) -> Result<String> {
        self.gitsvn(["show-ignore"])
    }

    /// Run `git svn info`, which makes git-svn rebuild its revision map.
    pub fn svn_info(&self) -> Result<String> {
        self.gitsvn(["info"])
    }

    fn gitsvn(&self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Result<String> {
        let mut bin_args: Vec<OsString> = vec!["svn".into()];
        bin_args.extend(args.into_iter().map(Into::into));
        let output = syscall_non_interactive("git", bin_args, Some(self.workdir()?))?;
        Ok(output)
    }

    fn local_config(&self) -> Result<Config> {
        Ok(self.repository.config()?.open_level(ConfigLevel::Local)?)
    }
}

/// Commit `HEAD` branched off from Subversion at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPoint {
    pub commit: Oid,
    pub url: String,
    pub revision: u64,
}

/// Extract URL and revision from a `git-svn-id:` trailer of a commit message.
pub fn parse_git_svn_id(message: &str) -> Option<(String, u64)> {
    message.lines().find_map(|line| {
        let id = line.trim().strip_prefix("git-svn-id: ")?;
        let locator = id.split_whitespace().next()?;
        let (url, revision) = locator.split_once('@')?;
        Some((url.to_owned(), revision.parse().ok()?))
    })
}

/// Single `svn-remote.svn.fetch` mapping, i.e., `<svn-path>:<git-ref>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMapping {
    pub svn_path: String,
    pub git_ref: String,
}

impl FetchMapping {
    /// Mapping for a branch path onto `refs/remotes/git-svn/<name>`.
    ///
    /// Name is the final segment of the branch path with blanks replaced by
    /// underscores.
    pub fn for_branch(svn_path: impl Into<String>) -> Self {
        let svn_path = svn_path.into();
        let git_ref = format!("refs/remotes/git-svn/{}", branch_name(&svn_path));
        Self { svn_path, git_ref }
    }
}

/// Final segment of a branch path with blanks replaced by underscores.
pub fn branch_name(svn_path: &str) -> String {
    let trimmed = svn_path.trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    name.replace(' ', "_")
}

impl FromStr for FetchMapping {
    type Err = GitSvnError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (svn_path, git_ref) = value
            .rsplit_once(':')
            .ok_or_else(|| GitSvnError::MalformedFetchMapping(value.to_owned()))?;
        Ok(Self {
            svn_path: svn_path.to_owned(),
            git_ref: git_ref.to_owned(),
        })
    }
}

impl Display for FetchMapping {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}:{}", self.svn_path, self.git_ref)
    }
}

/// Git-svn bridge error types.
#[derive(Debug, thiserror::Error)]
pub enum GitSvnError {
    #[error(transparent)]
    Git2(#[from] git2::Error),

    #[error("git repository has no work tree")]
    BareRepository,

    #[error("git repository is not a git-svn bridge")]
    NotABridge,

    /// No commit of `HEAD` came from Subversion.
    #[error("no git-svn branch point found in history of HEAD")]
    NoBranchPoint,

    #[error("malformed svn-remote.svn.fetch mapping {0:?}")]
    MalformedFetchMapping(String),

    /// Externals listing cannot be parsed.
    #[error(transparent)]
    External(#[from] ExternalError),

    /// A `git svn` subcommand failed.
    #[error("git svn command {command:?} failed: {message}")]
    Command { command: String, message: String },
}

impl From<SyscallError> for GitSvnError {
    fn from(error: SyscallError) -> Self {
        match error {
            SyscallError::Spawn { command, source } => Self::Command {
                command,
                message: source.to_string(),
            },
            SyscallError::Failed {
                command, stderr, ..
            } => Self::Command {
                command,
                message: stderr,
            },
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = GitSvnError> = std::result::Result<T, E>;
