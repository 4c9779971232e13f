// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote inspection.
//!
//! Read-only queries the reconciliation engine bases its decisions on. None of
//! these mutate anything, so they run the same way in dry-run mode.

use crate::{
    external::Revision,
    svn::{NodeKind, Result, Subversion, SvnError},
};

use std::path::Path;
use tracing::{debug, instrument};

/// Query remote and local node state through a [`Subversion`] client.
#[derive(Debug)]
pub struct Inspector<'svn, S>
where
    S: Subversion + ?Sized,
{
    svn: &'svn S,
}

impl<'svn, S> Inspector<'svn, S>
where
    S: Subversion + ?Sized,
{
    pub fn new(svn: &'svn S) -> Self {
        Self { svn }
    }

    /// Classify the node a qualified locator addresses.
    ///
    /// # Errors
    ///
    /// - Return [`SvnError::RemoteUnreachable`] if the locator does not exist
    ///   at the requested revision.
    #[instrument(skip(self), level = "debug")]
    pub fn classify(&self, locator: &str, revision: Option<&Revision>) -> Result<NodeKind> {
        let kind = self.svn.info(locator, revision)?.kind();
        debug!("{locator} is a {kind}");
        Ok(kind)
    }

    /// URL a local working copy path is tracking.
    pub fn current_url_of(&self, path: &Path) -> Result<String> {
        Ok(self.svn.info(&path.to_string_lossy(), None)?.url().to_owned())
    }

    /// Local path has uncommitted modifications, untracked files excluded.
    pub fn is_dirty(&self, path: &Path) -> Result<bool> {
        self.svn.is_modified(path)
    }

    /// Local path is under version control.
    ///
    /// # Errors
    ///
    /// - Return [`SvnError::RemoteCommandFailure`] if the client fails for any
    ///   reason other than the path being unversioned.
    /// - Return [`SvnError::Xml`] or [`SvnError::MissingField`] if the client
    ///   answered with garbage.
    pub fn is_working_copy(&self, path: &Path) -> Result<bool> {
        match self.svn.info(&path.to_string_lossy(), None) {
            Ok(_) => Ok(true),
            Err(SvnError::RemoteUnreachable { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Root URL of repository the working copy at path belongs to.
    pub fn repository_root(&self, path: &Path) -> Result<String> {
        let info = self.svn.info(&path.to_string_lossy(), None)?;
        info.repository_root().map(ToOwned::to_owned)
    }

    /// Revision the working copy at path was last updated to.
    pub fn base_revision(&self, path: &Path) -> Result<Revision> {
        let info = self.svn.info(&path.to_string_lossy(), Some(&Revision::new("BASE")))?;
        Ok(info.revision().clone())
    }

    /// Commit date of a revision in the repository at locator.
    pub fn commit_date(&self, locator: &str, revision: &Revision) -> Result<String> {
        let info = self.svn.info(locator, Some(revision))?;
        info.last_changed_date().map(ToOwned::to_owned)
    }

    /// Revision locator was last changed in, as of revision.
    pub fn last_changed_revision(&self, locator: &str, revision: &Revision) -> Result<Revision> {
        let info = self.svn.info(locator, Some(revision))?;
        info.last_changed_revision().cloned()
    }
}
