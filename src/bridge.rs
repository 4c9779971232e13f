// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git-svn bridge setup.
//!
//! Three ways to get a bridge going:
//!
//! - [`init`]: turn a clean svn working copy into a bridge of the branch it
//!   has checked out.
//! - [`def_init`]: set up a bridge in a git clone from a [`BridgeDefinition`]
//!   shipped with the repository. Safe to run again at any time.
//! - [`migrate_ignore`]: make git ignore everything Subversion ignores, plus
//!   svn metadata and nested svn checkouts.

use crate::{
    config::BridgeDefinition,
    external::Revision,
    gitsvn::{branch_name, FetchMapping, GitSvn, GitSvnError},
    svn::{inspect::Inspector, Subversion, SvnError},
};

use percent_encoding::percent_decode_str;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Settings for [`init`].
#[derive(Debug, Default, Clone)]
pub struct InitOptions {
    /// Working copy relative folders git-svn should ignore.
    pub ignore_dirs: Vec<String>,

    /// Revision to start fetching at, defaults to last changed revision.
    pub revision: Option<Revision>,

    pub dry_run: bool,
}

/// Branch of a working copy as git-svn needs to know it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchLayout {
    pub root_url: String,

    /// Repository relative path, e.g., `Main/Shared/libraries`.
    pub branch_path: String,

    /// Final segment of branch path, blanks replaced by underscores.
    pub branch_name: String,

    pub revision: Revision,
}

/// Derive branch layout of the working copy at root.
///
/// # Errors
///
/// - Return [`BridgeError::UnexpectedRelativeUrl`] if the working copy reports
///   a relative URL that is not repository root relative.
/// - Return [`BridgeError::Svn`] if working copy info cannot be queried.
pub fn branch_layout<S>(svn: &S, root: &Path) -> Result<BranchLayout>
where
    S: Subversion + ?Sized,
{
    let info = svn.info(&root.to_string_lossy(), None)?;
    let relative_url = info.relative_url()?;
    let branch_path = relative_url
        .strip_prefix("^/")
        .map(percent_decode)
        .ok_or_else(|| BridgeError::UnexpectedRelativeUrl(relative_url.to_owned()))?;

    let revision = match info.last_changed_revision() {
        Ok(revision) => revision.clone(),
        Err(_) => info.revision().clone(),
    };

    Ok(BranchLayout {
        root_url: info.repository_root()?.to_owned(),
        branch_name: branch_name(&branch_path),
        branch_path,
        revision,
    })
}

/// Turn a clean svn working copy into a git-svn bridge.
///
/// Fetch failures are tolerated, since fetching into a folder that is an svn
/// working copy at the same time is known to complain without harm.
///
/// # Errors
///
/// - Return [`BridgeError::NotAWorkingCopy`] or
///   [`BridgeError::DirtyWorkingCopy`] if root is not a clean working copy.
/// - Return [`BridgeError::NotADirectory`] for ignore dirs that do not exist.
/// - Return [`BridgeError::GitSvn`] if the bridge cannot be configured.
#[instrument(skip(svn, options), level = "debug")]
pub fn init<S>(svn: &S, root: &Path, options: &InitOptions) -> Result<()>
where
    S: Subversion + ?Sized,
{
    let inspector = Inspector::new(svn);
    if !inspector.is_working_copy(root)? {
        return Err(BridgeError::NotAWorkingCopy(root.to_path_buf()));
    }
    if inspector.is_dirty(root)? {
        return Err(BridgeError::DirtyWorkingCopy(root.to_path_buf()));
    }

    let mut ignore_dirs = Vec::with_capacity(options.ignore_dirs.len());
    for dir in &options.ignore_dirs {
        if !root.join(dir).is_dir() {
            return Err(BridgeError::NotADirectory(root.join(dir)));
        }
        ignore_dirs.push(folder_rule(dir));
    }

    let mut layout = branch_layout(svn, root)?;
    if let Some(revision) = &options.revision {
        layout.revision = revision.clone();
    }
    info!("root url: {}", layout.root_url);
    info!("branch path: {}", layout.branch_path);
    info!("branch name: {}", layout.branch_name);
    info!("revision: {}", layout.revision);
    if options.dry_run {
        return Ok(());
    }

    let gitsvn = GitSvn::init_bridge(root, &layout.root_url)?;
    gitsvn.clear_fetch_mappings()?;
    gitsvn.add_fetch_mapping(&FetchMapping::for_branch(layout.branch_path.as_str()))?;
    if !ignore_dirs.is_empty() {
        gitsvn.set_ignore_paths(&ignore_regex(&ignore_dirs))?;
    }

    if let Err(error) = gitsvn.svn_fetch(Some(&layout.revision)) {
        warn!("{error}");
    }
    if let Err(error) = gitsvn.svn_fetch(None) {
        warn!("{error}");
    }

    Ok(())
}

/// Set up git-svn bridge in a clean git clone from a bridge definition.
///
/// Every step is idempotent. Tracking references
/// `refs/remotes/git-svn/<name>` are created from `refs/remotes/<remote>/<name>`
/// unless they exist already, or `force` is set.
///
/// # Errors
///
/// - Return [`BridgeError::DirtyGitRepository`] if the clone has
///   uncommitted changes.
/// - Return [`BridgeError::BridgeUrlMismatch`] if the clone already bridges
///   another repository.
/// - Return [`BridgeError::ConflictingFetchMapping`] if a branch path or
///   tracking reference is already mapped elsewhere.
/// - Return [`BridgeError::MissingReference`] if the remote branch to track
///   does not exist.
/// - Return [`BridgeError::IgnorePathsAlreadySet`] if different ignore
///   paths are configured already.
#[instrument(skip(gitsvn, definition), level = "debug")]
pub fn def_init(
    gitsvn: &GitSvn,
    definition: &BridgeDefinition,
    remote: &str,
    force: bool,
) -> Result<()> {
    if gitsvn.is_dirty()? {
        return Err(BridgeError::DirtyGitRepository);
    }

    match gitsvn.svn_url()? {
        None => {
            gitsvn.svn_init(&definition.url)?;
            gitsvn.clear_fetch_mappings()?;
        }
        Some(existing) if existing != definition.url => {
            return Err(BridgeError::BridgeUrlMismatch {
                existing,
                requested: definition.url.clone(),
            });
        }
        Some(_) => info!("git-svn bridge already initialized for {}", definition.url),
    }

    for branch in &definition.branches {
        let mapping = FetchMapping::for_branch(branch.as_str());
        add_mapping(gitsvn, &mapping)?;
        track_branch(gitsvn, &mapping, remote, force)?;
    }

    if !definition.ignore_paths.is_empty() {
        let regex = ignore_regex(&definition.ignore_paths);
        match gitsvn.ignore_paths()? {
            None => gitsvn.set_ignore_paths(&regex)?,
            Some(existing) if existing == regex => debug!("ignore paths already set"),
            Some(existing) => return Err(BridgeError::IgnorePathsAlreadySet(existing)),
        }
    }

    if let Err(error) = gitsvn.svn_info() {
        warn!("{error}");
    }

    Ok(())
}

fn add_mapping(gitsvn: &GitSvn, mapping: &FetchMapping) -> Result<()> {
    let existing = gitsvn.fetch_mappings()?;
    if existing.contains(mapping) {
        info!("{} already tracked", mapping.svn_path);
        return Ok(());
    }

    if let Some(conflict) = existing
        .iter()
        .find(|other| other.svn_path == mapping.svn_path || other.git_ref == mapping.git_ref)
    {
        return Err(BridgeError::ConflictingFetchMapping {
            existing: conflict.to_string(),
            requested: mapping.to_string(),
        });
    }

    gitsvn.add_fetch_mapping(mapping)?;
    Ok(())
}

fn track_branch(gitsvn: &GitSvn, mapping: &FetchMapping, remote: &str, force: bool) -> Result<()> {
    let name = branch_name(&mapping.svn_path);
    let source = format!("refs/remotes/{remote}/{name}");
    if !gitsvn.reference_exists(&source) {
        return Err(BridgeError::MissingReference(source));
    }

    if gitsvn.reference_exists(&mapping.git_ref) && !force {
        info!("{} already exists", mapping.git_ref);
        return Ok(());
    }

    gitsvn.copy_reference(&mapping.git_ref, &source, true)?;
    Ok(())
}

/// Write `.git/info/exclude` so git ignores what Subversion ignores.
///
/// # Errors
///
/// - Return [`BridgeError::GitSvn`] if `git svn show-ignore` fails.
/// - Return [`BridgeError::Io`] if the work tree cannot be walked, or the
///   exclude file cannot be written.
#[instrument(skip(gitsvn), level = "debug")]
pub fn migrate_ignore(gitsvn: &GitSvn) -> Result<PathBuf> {
    let workdir = gitsvn.workdir()?;
    let nested = nested_checkouts(workdir)?;
    let svn_ignore = gitsvn.show_ignore()?;

    let info_dir = gitsvn.gitdir().join("info");
    let exclude = info_dir.join("exclude");
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| BridgeError::Io { path, source }
    };
    mkdirp::mkdirp(&info_dir).map_err(io_error(&info_dir))?;
    fs::write(&exclude, exclude_rules(&nested, &svn_ignore)).map_err(io_error(&exclude))?;
    info!("wrote {} nested checkouts to {:?}", nested.len(), exclude.display());

    Ok(exclude)
}

/// Folders below root that hold their own svn metadata, as ignore rules.
///
/// Root itself is never listed. Neither `.git` nor `.svn` are descended into.
pub fn nested_checkouts(root: &Path) -> Result<Vec<String>> {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let name = entry.file_name();
            name != ".git" && name != ".svn"
        })
        .build();

    let mut nested = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|error| BridgeError::Io {
            path: root.to_path_buf(),
            source: io::Error::other(error),
        })?;
        if entry.depth() == 0 || !entry.path().join(".svn").is_dir() {
            continue;
        }

        if let Ok(relative) = entry.path().strip_prefix(root) {
            let rule = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            nested.push(format!("{rule}/"));
        }
    }

    Ok(nested)
}

/// Render `.git/info/exclude` content.
pub fn exclude_rules(nested: &[String], svn_ignore: &str) -> String {
    let mut rules = String::new();
    rules.push_str("## ignore all '.svn' folders\n");
    rules.push_str("**/.svn/\n\n");
    rules.push_str("## ignore all svn external checkouts\n");
    for rule in nested {
        rules.push_str(rule);
        rules.push('\n');
    }
    rules.push_str("\n## mirror the 'svn:ignore' property\n");
    rules.push_str(svn_ignore.trim_end());
    rules.push('\n');
    rules
}

/// Combine folder rules into a git-svn ignore-paths regex, i.e., `(a/|b/)`.
pub fn ignore_regex(rules: &[String]) -> String {
    format!("({})", rules.join("|"))
}

// INVARIANT: Folder rules use `/` and end in `/` so they only match folders.
fn folder_rule(dir: &str) -> String {
    let mut rule = dir.replace('\\', "/");
    if !rule.ends_with('/') {
        rule.push('/');
    }
    rule
}

fn percent_decode(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}

/// Bridge setup error types.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Svn(#[from] SvnError),

    #[error(transparent)]
    GitSvn(#[from] GitSvnError),

    #[error("{0:?} is not an svn working copy")]
    NotAWorkingCopy(PathBuf),

    #[error("svn working copy {0:?} is dirty, commit or shelve local changes first")]
    DirtyWorkingCopy(PathBuf),

    #[error("git working copy is dirty, commit or stash local changes first")]
    DirtyGitRepository,

    #[error("unexpected relative url {0:?}")]
    UnexpectedRelativeUrl(String),

    #[error("{0:?} is not a folder")]
    NotADirectory(PathBuf),

    /// Repository already bridges another Subversion repository.
    #[error("git repository already bridges {existing:?}, not {requested:?}")]
    BridgeUrlMismatch { existing: String, requested: String },

    #[error("cannot add fetch mapping {requested:?}, it conflicts with {existing:?}")]
    ConflictingFetchMapping { existing: String, requested: String },

    #[error("source reference {0:?} does not exist")]
    MissingReference(String),

    #[error("svn-remote.svn.ignore-paths already set to {0:?}")]
    IgnorePathsAlreadySet(String),

    #[error("filesystem operation failed at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
