// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-command workflows over a working copy root.
//!
//! A [`Workspace`] is a folder that is either a git-svn bridge, a Subversion
//! working copy, or both at once. Whichever it is decides where externals
//! come from:
//!
//! 1. A git-svn bridge answers through `git svn show-externals`.
//! 2. An svn working copy answers through `svn propget svn:externals -R`.
//!
//! The bridge wins whenever both are present. Alternatively, externals can be
//! read from an externals configuration file, in which case neither needs to
//! exist.

use crate::{
    config::{ConfigError, ExternalsConfig, SparseCheckoutConfig},
    dispatch::{DispatchError, Dispatcher, Report, DEFAULT_CONCURRENCY},
    external::{parse_property_listing, ExternalDefinition, ExternalError, Revision},
    gitsvn::{GitSvn, GitSvnError},
    history::{derive_at_date, derive_historic, parse_date_revision, HistoryError},
    reconcile::Reconciler,
    sparse::{SparseCheckout, SparseError},
    status::{svn_gap, BridgeStatus},
    svn::{inspect::Inspector, ConflictPolicy, Subversion, SvnCli, SvnError, UpdateOptions},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, instrument};

/// Settings shared by all workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Inspect everything, but only log what would be changed.
    pub dry_run: bool,

    /// Number of externals reconciled at once.
    pub concurrency: usize,

    /// Skip pending externals once one fails.
    pub fail_fast: bool,

    /// Show a progress bar while reconciling.
    pub progress: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: false,
            progress: false,
        }
    }
}

/// Where live externals are read from.
#[derive(Debug)]
enum Source {
    Bridge(GitSvn),
    WorkingCopy,
}

/// Working copy root with everything needed to act on it.
#[derive(Debug)]
pub struct Workspace<S = SvnCli>
where
    S: Subversion,
{
    root: PathBuf,
    svn: Arc<S>,
    options: Options,
}

impl<S> Workspace<S>
where
    S: Subversion,
{
    pub fn new(svn: Arc<S>, root: impl Into<PathBuf>, options: Options) -> Self {
        Self {
            root: root.into(),
            svn,
            options,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Externals as currently declared by the git-svn bridge or svn working
    /// copy at root.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::NotABridgeOrWorkingCopy`] if root is
    ///   neither.
    /// - Return [`WorkspaceError::External`] if the listing is malformed.
    #[instrument(skip(self), level = "debug")]
    pub fn live_externals(&self) -> Result<Vec<ExternalDefinition>> {
        match self.source()? {
            Source::Bridge(gitsvn) => {
                info!("read externals from git-svn bridge");
                Ok(gitsvn.externals()?)
            }
            Source::WorkingCopy => {
                info!("read externals from svn working copy");
                self.svn_externals()
            }
        }
    }

    /// Externals listed in an externals configuration file.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Io`] if the file cannot be read.
    /// - Return [`WorkspaceError::Config`] if it cannot be parsed.
    pub fn config_externals(&self, path: &Path) -> Result<Vec<ExternalDefinition>> {
        info!("read externals from {:?}", path.display());
        let data = fs::read_to_string(path).map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ExternalsConfig = data.parse()?;
        Ok(config.definitions()?)
    }

    /// Reconcile externals below root, as many at a time as configured.
    ///
    /// Failed externals do not make this fail, check the returned [`Report`].
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Dispatch`] if the progress bar cannot be set
    ///   up.
    pub async fn checkout_externals(&self, externals: Vec<ExternalDefinition>) -> Result<Report> {
        let reconciler =
            Reconciler::new(Arc::clone(&self.svn), self.root.as_path()).dry_run(self.options.dry_run);
        let mut dispatcher = Dispatcher::new(reconciler)
            .concurrency(self.options.concurrency)
            .fail_fast(self.options.fail_fast);
        if self.options.progress {
            dispatcher = dispatcher.with_progress()?;
        }

        Ok(dispatcher.reconcile_all(externals).await)
    }

    /// Write live externals into an externals configuration file.
    ///
    /// Returns `None` if there were no externals to write.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::ConfigExists`] if the file already exists.
    /// - Return [`WorkspaceError::Config`] if externals are hosted by
    ///   different repositories.
    #[instrument(skip(self), level = "debug")]
    pub fn export_externals(&self, path: &Path) -> Result<Option<PathBuf>> {
        if path.exists() {
            return Err(WorkspaceError::ConfigExists(path.to_path_buf()));
        }

        let externals = self.live_externals()?;
        let Some(config) = ExternalsConfig::from_definitions(&externals)? else {
            info!("no externals to export");
            return Ok(None);
        };

        if self.options.dry_run {
            info!("would write {} externals to {:?}", externals.len(), path.display());
        } else {
            fs::write(path, config.to_string()).map_err(|source| WorkspaceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            info!("wrote {} externals to {:?}", externals.len(), path.display());
        }

        Ok(Some(path.to_path_buf()))
    }

    /// Revision local work is based on: git-svn branch point of a bridge,
    /// `BASE` revision of an svn working copy otherwise.
    pub fn historic_revision(&self) -> Result<Revision> {
        match self.source()? {
            Source::Bridge(gitsvn) => Ok(Revision::from(gitsvn.branch_point()?.revision)),
            Source::WorkingCopy => Ok(Inspector::new(self.svn.as_ref()).base_revision(&self.root)?),
        }
    }

    /// Live externals pinned to where their sources were at the historic
    /// revision.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::History`] if any external cannot be
    ///   derived.
    #[instrument(skip(self), level = "debug")]
    pub fn historic_externals(&self) -> Result<Vec<ExternalDefinition>> {
        let revision = self.historic_revision()?;
        info!("historic revision {revision}");

        self.live_externals()?
            .iter()
            .map(|external| {
                derive_historic(self.svn.as_ref(), &revision, external).map_err(WorkspaceError::from)
            })
            .collect()
    }

    /// Move svn working copy back to a date, and pin its externals to the
    /// same date.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::History`] if `date` is not `{<date>}`.
    /// - Return [`WorkspaceError::DirtyGitRepository`] or
    ///   [`WorkspaceError::DirtyWorkingCopy`] if there is local work to lose.
    /// - Return [`WorkspaceError::NotAWorkingCopy`] if root is no svn working
    ///   copy.
    #[instrument(skip(self), level = "debug")]
    pub fn historic_rev(&self, date: &str) -> Result<Vec<ExternalDefinition>> {
        let date = parse_date_revision(date)?;
        if let Some(gitsvn) = self.bridge()? {
            if gitsvn.is_dirty()? {
                return Err(WorkspaceError::DirtyGitRepository);
            }
        }

        let inspector = Inspector::new(self.svn.as_ref());
        self.ensure_working_copy(&inspector)?;
        if inspector.is_dirty(&self.root)? {
            return Err(WorkspaceError::DirtyWorkingCopy(self.root.clone()));
        }

        if self.options.dry_run {
            info!("would update svn working copy to {date}");
        } else {
            info!("update svn working copy to {date}");
            let options = UpdateOptions {
                revision: Some(date.clone()),
                ..Default::default()
            };
            self.svn.update(&self.root, &options)?;
        }

        self.svn_externals()?
            .iter()
            .map(|external| {
                derive_at_date(self.svn.as_ref(), &date, external).map_err(WorkspaceError::from)
            })
            .collect()
    }

    /// Fetch files listed in sparse checkout configuration into root.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Io`] or [`WorkspaceError::Config`] if the
    ///   configuration cannot be read.
    /// - Return [`WorkspaceError::Sparse`] if root already is a working copy,
    ///   or fetching fails.
    #[instrument(skip(self), level = "debug")]
    pub fn sparse_checkout(&self, path: &Path, revision: Option<Revision>) -> Result<()> {
        let data = fs::read_to_string(path).map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SparseCheckoutConfig = data.parse()?;

        SparseCheckout::new(self.svn.as_ref(), self.root.as_path())
            .revision(revision)
            .dry_run(self.options.dry_run)
            .checkout(&config)?;

        Ok(())
    }

    /// Move svn working copy to the git-svn branch point of `HEAD`.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::NotABridge`] or
    ///   [`WorkspaceError::NotAWorkingCopy`] unless root is both.
    /// - Return [`WorkspaceError::GitSvn`] if there is no branch point.
    #[instrument(skip(self), level = "debug")]
    pub fn sync_with_git(&self) -> Result<SyncDirection> {
        let gitsvn = self
            .bridge()?
            .ok_or_else(|| WorkspaceError::NotABridge(self.root.clone()))?;
        let inspector = Inspector::new(self.svn.as_ref());
        self.ensure_working_copy(&inspector)?;

        let point = gitsvn.branch_point()?;
        let base = revision_number(inspector.base_revision(&self.root)?)?;
        let direction = SyncDirection::between(base, point.revision);
        info!("{direction}");
        if direction == SyncDirection::Current {
            return Ok(direction);
        }

        if !self.options.dry_run {
            let options = UpdateOptions {
                revision: Some(Revision::from(point.revision)),
                accept: Some(ConflictPolicy::Working),
                force: true,
                adds_as_modification: true,
                ..Default::default()
            };
            self.svn.update(&self.root, &options)?;
        }

        Ok(direction)
    }

    /// Relation of svn working copy and git-svn bridge at root.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::NotABridge`] or
    ///   [`WorkspaceError::NotAWorkingCopy`] unless root is both.
    #[instrument(skip(self), level = "debug")]
    pub fn status(&self) -> Result<BridgeStatus> {
        let gitsvn = self
            .bridge()?
            .ok_or_else(|| WorkspaceError::NotABridge(self.root.clone()))?;
        let inspector = Inspector::new(self.svn.as_ref());
        self.ensure_working_copy(&inspector)?;

        let point = gitsvn.branch_point()?;
        let mut status = BridgeStatus {
            svn_base: revision_number(inspector.base_revision(&self.root)?)?,
            branch_point: point.revision,
            git_ahead: gitsvn.commits_ahead(&point)?,
            svn_gap: 0,
            svn_dirty: inspector.is_dirty(&self.root)?,
            git_dirty: gitsvn.is_dirty()?,
        };

        let (lower, upper) = (status.lower_revision(), status.upper_revision());
        if lower != upper {
            let revisions =
                self.svn
                    .log_revisions(&self.root, &Revision::from(lower), &Revision::from(upper))?;
            status.svn_gap = svn_gap(&revisions, lower);
        }

        Ok(status)
    }

    fn source(&self) -> Result<Source> {
        if let Some(gitsvn) = self.bridge()? {
            return Ok(Source::Bridge(gitsvn));
        }

        if Inspector::new(self.svn.as_ref()).is_working_copy(&self.root)? {
            return Ok(Source::WorkingCopy);
        }

        Err(WorkspaceError::NotABridgeOrWorkingCopy(self.root.clone()))
    }

    fn bridge(&self) -> Result<Option<GitSvn>> {
        let Ok(gitsvn) = GitSvn::discover(&self.root) else {
            return Ok(None);
        };

        if gitsvn.is_bridge()? {
            Ok(Some(gitsvn))
        } else {
            Ok(None)
        }
    }

    fn svn_externals(&self) -> Result<Vec<ExternalDefinition>> {
        let host = Inspector::new(self.svn.as_ref()).repository_root(&self.root)?;
        let listing = self.svn.externals_property(&self.root)?;
        Ok(parse_property_listing(&host, &listing)?)
    }

    fn ensure_working_copy(&self, inspector: &Inspector<'_, S>) -> Result<()> {
        if inspector.is_working_copy(&self.root)? {
            Ok(())
        } else {
            Err(WorkspaceError::NotAWorkingCopy(self.root.clone()))
        }
    }
}

fn revision_number(revision: Revision) -> Result<u64> {
    revision
        .number()
        .ok_or_else(|| WorkspaceError::NonNumericRevision(revision.to_string()))
}

/// Way an svn working copy has to move to reach the git-svn branch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    Current,
    Update { from: u64, to: u64 },
    Downdate { from: u64, to: u64 },
}

impl SyncDirection {
    pub fn between(base: u64, branch_point: u64) -> Self {
        match base.cmp(&branch_point) {
            std::cmp::Ordering::Equal => Self::Current,
            std::cmp::Ordering::Less => Self::Update {
                from: base,
                to: branch_point,
            },
            std::cmp::Ordering::Greater => Self::Downdate {
                from: base,
                to: branch_point,
            },
        }
    }
}

impl Display for SyncDirection {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Current => fmt.write_str("svn working copy already at git-svn branch point"),
            Self::Update { from, to } => write!(fmt, "update svn working copy from r{from} to r{to}"),
            Self::Downdate { from, to } => {
                write!(fmt, "downdate svn working copy from r{from} to r{to}")
            }
        }
    }
}

/// Workspace workflow error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("{0:?} is neither a git-svn bridge nor an svn working copy")]
    NotABridgeOrWorkingCopy(PathBuf),

    #[error("{0:?} is not a git-svn bridge")]
    NotABridge(PathBuf),

    #[error("{0:?} is not an svn working copy")]
    NotAWorkingCopy(PathBuf),

    /// Refuse to overwrite configuration.
    #[error("configuration file {0:?} already exists")]
    ConfigExists(PathBuf),

    #[error("svn working copy {0:?} is dirty, commit or shelve local changes first")]
    DirtyWorkingCopy(PathBuf),

    #[error("git working copy is dirty, commit or stash local changes first")]
    DirtyGitRepository,

    #[error("expected numeric revision, got {0:?}")]
    NonNumericRevision(String),

    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Svn(#[from] SvnError),

    #[error(transparent)]
    GitSvn(#[from] GitSvnError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    External(#[from] ExternalError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Sparse(#[from] SparseError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Friendly result alias :3
pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        path::{EXTERNALS_CONFIG_FILE, SPARSE_CHECKOUT_CONFIG_FILE},
        svn::{fake::FakeSvn, NodeKind},
    };
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;
    use std::env::current_dir;

    const HOST: &str = "http://host/repo";
    const TRUNK: &str = "http://host/repo/trunk";
    const LIB: &str = "http://host/repo/trunk/lib";

    fn remote() -> FakeSvn {
        FakeSvn::new(HOST)
            .with_remote(TRUNK, NodeKind::Directory)
            .with_remote(LIB, NodeKind::Directory)
            .with_commit(10, "2020-01-01T00:00:00.000000Z", &[LIB])
            .with_commit(20, "2020-02-01T00:00:00.000000Z", &[])
            .with_commit(30, "2020-03-01T00:00:00.000000Z", &[LIB])
            .with_externals_listing(". - ^/trunk/lib lib\n")
    }

    fn workspace(svn: FakeSvn, dry_run: bool) -> anyhow::Result<Workspace<FakeSvn>> {
        let root = current_dir()?;
        svn.seed_working_copy(&root, TRUNK)?;
        let options = Options {
            dry_run,
            ..Default::default()
        };
        Ok(Workspace::new(Arc::new(svn), root, options))
    }

    #[test_case(5, 5, SyncDirection::Current; "current")]
    #[test_case(5, 9, SyncDirection::Update { from: 5, to: 9 }; "update")]
    #[test_case(9, 5, SyncDirection::Downdate { from: 9, to: 5 }; "downdate")]
    #[test]
    fn sync_direction_between(base: u64, point: u64, expect: SyncDirection) {
        self::assert_eq!(SyncDirection::between(base, point), expect);
    }

    #[sealed_test]
    fn live_externals_from_working_copy() -> anyhow::Result<()> {
        let workspace = workspace(remote(), false)?;
        let result = workspace.live_externals()?;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].host_repo_url(), HOST);
        assert_eq!(result[0].to_string(), "^/trunk/lib lib");

        Ok(())
    }

    #[sealed_test]
    fn live_externals_need_bridge_or_working_copy() -> anyhow::Result<()> {
        let workspace = Workspace::new(Arc::new(remote()), current_dir()?, Options::default());
        let result = workspace.live_externals();
        assert!(matches!(result, Err(WorkspaceError::NotABridgeOrWorkingCopy(_))));

        Ok(())
    }

    #[sealed_test]
    fn export_then_read_externals_config() -> anyhow::Result<()> {
        let workspace = workspace(remote(), false)?;
        let path = workspace.root().join(EXTERNALS_CONFIG_FILE);

        assert_eq!(workspace.export_externals(&path)?, Some(path.clone()));
        let expect = indoc! {"
            svnRepoUrl: http://host/repo
            externals:
            - path: .
              externalDefinition: ^/trunk/lib lib
        "};
        assert_eq!(fs::read_to_string(&path)?, expect);
        assert_eq!(workspace.config_externals(&path)?, workspace.live_externals()?);

        let result = workspace.export_externals(&path);
        assert!(matches!(result, Err(WorkspaceError::ConfigExists(_))));

        Ok(())
    }

    #[sealed_test]
    fn export_nothing_without_externals() -> anyhow::Result<()> {
        let workspace = workspace(remote().with_externals_listing(""), false)?;
        let path = workspace.root().join(EXTERNALS_CONFIG_FILE);

        assert_eq!(workspace.export_externals(&path)?, None);
        assert!(!path.exists());

        Ok(())
    }

    #[sealed_test]
    fn checkout_live_externals() -> anyhow::Result<()> {
        let workspace = workspace(remote(), false)?;
        let externals = workspace.live_externals()?;

        let runtime = tokio::runtime::Runtime::new()?;
        let report = runtime.block_on(workspace.checkout_externals(externals))?;
        assert!(report.is_success());
        assert_eq!(fs::read_to_string(workspace.root().join("lib/.svn/url"))?, LIB);

        Ok(())
    }

    #[sealed_test]
    fn historic_externals_of_working_copy() -> anyhow::Result<()> {
        let workspace = workspace(remote(), false)?;
        let options = UpdateOptions {
            revision: Some(Revision::from(25)),
            ..Default::default()
        };
        workspace.svn.update(workspace.root(), &options)?;

        assert_eq!(workspace.historic_revision()?, Revision::from(25));
        let result = workspace.historic_externals()?;
        assert_eq!(result[0].to_string(), "-r 10 ^/trunk/lib@10 lib");

        Ok(())
    }

    #[sealed_test]
    fn historic_rev_updates_working_copy() -> anyhow::Result<()> {
        let workspace = workspace(remote(), false)?;

        let result = workspace.historic_rev("{2020-03-15}")?;
        assert_eq!(result[0].to_string(), "-r 30 ^/trunk/lib@30 lib");
        assert_eq!(
            Inspector::new(workspace.svn.as_ref()).base_revision(workspace.root())?,
            Revision::from(30)
        );

        let result = workspace.historic_rev("2020-03-15");
        assert!(matches!(result, Err(WorkspaceError::History(_))));

        Ok(())
    }

    #[sealed_test]
    fn historic_rev_refuses_dirty_working_copy() -> anyhow::Result<()> {
        let workspace = workspace(remote(), false)?;
        workspace.svn.make_dirty(workspace.root())?;

        let result = workspace.historic_rev("{2020-01-15}");
        assert!(matches!(result, Err(WorkspaceError::DirtyWorkingCopy(_))));

        Ok(())
    }

    #[sealed_test]
    fn sparse_checkout_from_config() -> anyhow::Result<()> {
        let root = current_dir()?.join("wc");
        fs::create_dir_all(&root)?;
        let config = root.join(SPARSE_CHECKOUT_CONFIG_FILE);
        fs::write(
            &config,
            indoc! {"
                svnRepoUrl: http://host/repo/trunk
                files:
                  - build/config.ini
            "},
        )?;

        let workspace = Workspace::new(Arc::new(remote()), &root, Options::default());
        workspace.sparse_checkout(&config, None)?;
        assert!(root.join("build/config.ini").is_file());

        Ok(())
    }

    #[sealed_test]
    fn sync_needs_bridge() -> anyhow::Result<()> {
        let workspace = workspace(remote(), false)?;
        assert!(matches!(workspace.sync_with_git(), Err(WorkspaceError::NotABridge(_))));
        assert!(matches!(workspace.status(), Err(WorkspaceError::NotABridge(_))));

        Ok(())
    }
}
