// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Externals reconciliation.
//!
//! Bring whatever sits at the target path of an external in line with its
//! definition using the smallest safe operation. Target state is always
//! inspected live, never cached, because sibling reconciliations may be
//! touching the same filesystem at the same time.
//!
//! The decision order per target path is fixed:
//!
//! 1. Absent target: fresh checkout.
//! 2. Target that is not a working copy: refuse, [`ReconcileError::ForeignObstruction`].
//! 3. Versioned target:
//!     1. Dirty: refuse, [`ReconcileError::UnsafeDirtyState`].
//!     2. Tracks another URL, or operative and peg revision disagree: remove
//!        target then do a fresh checkout.
//!     3. Otherwise: update in place, keeping local state on conflicts.
//!
//! Fresh checkouts classify the remote node first. Directories get a plain
//! checkout. Files cannot be checked out on their own, so the parent folder is
//! checked out at empty depth and only the file itself is widened into it.

use crate::{
    external::{locator::QualifiedUrl, ExternalDefinition, ExternalError},
    svn::{
        inspect::Inspector, CheckoutOptions, ConflictPolicy, Depth, NodeKind, Subversion, SvnCli,
        SvnError, UpdateOptions,
    },
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument, warn};

/// On-disk state of the target path of an external.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingCopyState {
    Absent,
    NotAWorkingCopy,
    VersionedDirectory,
    VersionedFile,
}

/// Operation performed to reconcile an external.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Existing checkout updated in place.
    Updated(NodeKind),

    /// Existing checkout removed and checked out again.
    Recreated(NodeKind),

    /// Nothing was there, fresh checkout.
    CheckedOut(NodeKind),
}

impl Display for Reconciled {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Updated(kind) => write!(fmt, "updated {kind}"),
            Self::Recreated(kind) => write!(fmt, "recreated {kind}"),
            Self::CheckedOut(kind) => write!(fmt, "checked out {kind}"),
        }
    }
}

/// Reconcile externals under a working copy root.
///
/// Generic over the [`Subversion`] client so it can run against a fake
/// remote. Clones share the same client.
#[derive(Debug)]
pub struct Reconciler<S = SvnCli>
where
    S: Subversion,
{
    svn: Arc<S>,
    root: PathBuf,
    dry_run: bool,
}

impl<S> Clone for Reconciler<S>
where
    S: Subversion,
{
    fn clone(&self) -> Self {
        Self {
            svn: Arc::clone(&self.svn),
            root: self.root.clone(),
            dry_run: self.dry_run,
        }
    }
}

impl<S> Reconciler<S>
where
    S: Subversion,
{
    /// Construct new reconciler for externals of working copy at `root`.
    pub fn new(svn: Arc<S>, root: impl Into<PathBuf>) -> Self {
        Self {
            svn,
            root: root.into(),
            dry_run: false,
        }
    }

    /// Perform all inspection, but only log mutating operations.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn svn(&self) -> &S {
        self.svn.as_ref()
    }

    /// Inspect current on-disk state of target path.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::Svn`] if the client answered with garbage.
    pub fn inspect(&self, target: &Path) -> Result<WorkingCopyState> {
        if fs::symlink_metadata(target).is_err() {
            return Ok(WorkingCopyState::Absent);
        }

        let inspector = Inspector::new(self.svn.as_ref());
        if !inspector.is_working_copy(target)? {
            return Ok(WorkingCopyState::NotAWorkingCopy);
        }

        if target.is_dir() {
            Ok(WorkingCopyState::VersionedDirectory)
        } else {
            Ok(WorkingCopyState::VersionedFile)
        }
    }

    /// Reconcile a single external.
    ///
    /// Nothing is retried. Any failure of the remote client surfaces as is
    /// for this external alone.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::ForeignObstruction`] if target is not a
    ///   working copy.
    /// - Return [`ReconcileError::UnsafeDirtyState`] if target has
    ///   uncommitted modifications.
    /// - Return [`ReconcileError::ExternalNotFound`] if source does not exist
    ///   at the operative revision.
    /// - Return [`ReconcileError::External`] if source locator cannot be
    ///   resolved.
    /// - Return [`ReconcileError::Svn`] if any remote command fails.
    /// - Return [`ReconcileError::Io`] if target cannot be removed, or its
    ///   parents cannot be created.
    #[instrument(skip(self, external), fields(external = %external), level = "debug")]
    pub fn reconcile(&self, external: &ExternalDefinition) -> Result<Reconciled> {
        let url = external.qualified_url()?;
        let target = external.target_path(&self.root);
        let inspector = Inspector::new(self.svn.as_ref());

        let kind = match self.inspect(&target)? {
            WorkingCopyState::Absent => {
                return self
                    .fresh_checkout(external, &url, &target)
                    .map(Reconciled::CheckedOut);
            }
            WorkingCopyState::NotAWorkingCopy => {
                return Err(ReconcileError::ForeignObstruction { path: target });
            }
            WorkingCopyState::VersionedDirectory => NodeKind::Directory,
            WorkingCopyState::VersionedFile => NodeKind::File,
        };

        if inspector.is_dirty(&target)? {
            return Err(ReconcileError::UnsafeDirtyState { path: target });
        }

        let existing = inspector.current_url_of(&target)?;
        if !url.same_location(&existing) || external.has_ambiguous_revisions() {
            info!(
                "remove {:?}: it tracks {existing}, but external needs a clean checkout of {}",
                target.display(),
                url.pegged(external.peg_revision()),
            );
            self.remove_target(&target)?;
            return self
                .fresh_checkout(external, &url, &target)
                .map(Reconciled::Recreated);
        }

        let options = UpdateOptions {
            revision: external.peg_revision().cloned(),
            accept: Some(ConflictPolicy::Working),
            ..Default::default()
        };
        if self.dry_run {
            info!("would update {:?}", target.display());
        } else {
            debug!("update {:?}", target.display());
            self.svn.update(&target, &options)?;
        }

        Ok(Reconciled::Updated(kind))
    }

    fn fresh_checkout(
        &self,
        external: &ExternalDefinition,
        url: &QualifiedUrl,
        target: &Path,
    ) -> Result<NodeKind> {
        let operative = external.operative_revision();
        let peg = external.peg_revision();
        let locator = url.pegged(peg);
        let not_found = || ReconcileError::ExternalNotFound {
            locator: locator.clone(),
        };

        let kind = match Inspector::new(self.svn.as_ref()).classify(&locator, operative) {
            Ok(kind) => kind,
            Err(SvnError::RemoteUnreachable { .. }) => return Err(not_found()),
            Err(error) => return Err(error.into()),
        };

        match kind {
            NodeKind::Directory => {
                let options = CheckoutOptions {
                    revision: operative.cloned(),
                    ..Default::default()
                };
                self.make_parent(target)?;
                if self.dry_run {
                    info!("would check out {locator} into {:?}", target.display());
                } else {
                    info!("check out {locator} into {:?}", target.display());
                    self.svn.checkout(&locator, target, &options)?;
                }
            }
            NodeKind::File => {
                let (parent_url, _) = url.split_parent().ok_or_else(not_found)?;
                let parent = target.parent().unwrap_or(self.root.as_path());
                let checkout = CheckoutOptions {
                    revision: operative.cloned(),
                    depth: Some(Depth::Empty),
                    force: true,
                };
                let update = UpdateOptions {
                    revision: operative.or(peg).cloned(),
                    set_depth: Some(Depth::Immediates),
                    ..Default::default()
                };

                self.make_parent(target)?;
                if self.dry_run {
                    info!("would fetch file {locator} into {:?}", target.display());
                } else {
                    info!("fetch file {locator} into {:?}", target.display());
                    self.svn
                        .checkout(&parent_url.pegged(peg), parent, &checkout)?;
                    self.svn.update(target, &update)?;
                }
            }
            NodeKind::Unknown => return Err(not_found()),
        }

        Ok(kind)
    }

    fn make_parent(&self, target: &Path) -> Result<()> {
        let Some(parent) = target.parent() else {
            return Ok(());
        };

        if self.dry_run {
            if !parent.exists() {
                info!("would create {:?}", parent.display());
            }
            return Ok(());
        }

        mkdirp::mkdirp(parent).map_err(|source| ReconcileError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn remove_target(&self, target: &Path) -> Result<()> {
        if self.dry_run {
            info!("would remove {:?}", target.display());
            return Ok(());
        }

        remove_tree(target).map_err(|source| ReconcileError::Io {
            path: target.to_path_buf(),
            source,
        })
    }
}

/// Remove file or directory tree at path.
///
/// Read-only entries get their read-only attribute cleared and removal is
/// attempted once more.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    let remove = |path: &Path| {
        if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    };

    match remove(path) {
        Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
            warn!("clear read-only entries below {:?}", path.display());
            clear_readonly(path)?;
            remove(path)
        }
        result => result,
    }
}

#[allow(clippy::permissions_set_readonly_false)]
fn clear_readonly(path: &Path) -> io::Result<()> {
    let walker = ignore::WalkBuilder::new(path)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        let metadata = entry.path().symlink_metadata()?;
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            permissions.set_readonly(false);
            fs::set_permissions(entry.path(), permissions)?;
        }
    }

    Ok(())
}

/// Reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// External definition cannot be resolved.
    #[error(transparent)]
    External(#[from] ExternalError),

    /// Source of external does not exist at operative revision.
    #[error("external {locator:?} not found")]
    ExternalNotFound { locator: String },

    /// Something that is not a working copy sits at the target path.
    #[error("expected working copy at {path:?}, refusing to touch unknown data")]
    ForeignObstruction { path: PathBuf },

    /// Target path has uncommitted modifications.
    #[error("working copy at {path:?} has uncommitted modifications, refusing to touch it")]
    UnsafeDirtyState { path: PathBuf },

    /// Remote command failed.
    #[error(transparent)]
    Svn(#[from] SvnError),

    /// Filesystem operation failed.
    #[error("filesystem operation failed at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
