// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sparse checkout of single files.
//!
//! # Why Sparse Checkout?
//!
//! Sometimes all that is needed from a repository is a handful of files, e.g.,
//! build configuration shared between projects. Checking out the whole folder
//! they live in wastes both time and disk space. Subversion supports
//! __sparse directories__ for this: a folder checked out at `empty` depth
//! contains nothing at all, and every child can be widened on its own later.
//!
//! # Sparse Fetch
//!
//! Fetching one file without its siblings takes two steps:
//!
//! 1. Check out the repository at empty depth.
//! 2. Widen each intermediate folder to empty depth, then widen the file
//!    itself to `immediates`.
//!
//! Folders that are already versioned are never widened again, because that
//! would reset their depth back to empty and drop files fetched earlier.
//!
//! The file set to fetch is listed in a [`SparseCheckoutConfig`].

use crate::{
    config::SparseCheckoutConfig,
    external::Revision,
    path::native,
    svn::{
        inspect::Inspector, CheckoutOptions, ConflictPolicy, Depth, Subversion, SvnError,
        UpdateOptions,
    },
};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Fetch a listed set of files into a fresh working copy.
#[derive(Debug)]
pub struct SparseCheckout<'svn, S>
where
    S: Subversion + ?Sized,
{
    svn: &'svn S,
    target: PathBuf,
    revision: Option<Revision>,
    dry_run: bool,
}

impl<'svn, S> SparseCheckout<'svn, S>
where
    S: Subversion + ?Sized,
{
    /// Construct new sparse checkout into target path.
    pub fn new(svn: &'svn S, target: impl Into<PathBuf>) -> Self {
        Self {
            svn,
            target: target.into(),
            revision: None,
            dry_run: false,
        }
    }

    /// Fetch everything at a revision instead of `HEAD`.
    pub fn revision(mut self, revision: Option<Revision>) -> Self {
        self.revision = revision;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check out all files listed in configuration.
    ///
    /// # Errors
    ///
    /// - Return [`SparseError::AlreadyWorkingCopy`] if target already is a
    ///   working copy.
    /// - Return [`SparseError::Svn`] if any remote command fails.
    #[instrument(skip(self, config), level = "debug")]
    pub fn checkout(&self, config: &SparseCheckoutConfig) -> Result<()> {
        if Inspector::new(self.svn).is_working_copy(&self.target)? {
            return Err(SparseError::AlreadyWorkingCopy {
                path: self.target.clone(),
            });
        }

        let options = CheckoutOptions {
            revision: self.revision.clone(),
            depth: Some(Depth::Empty),
            force: true,
        };
        if self.dry_run {
            info!("would check out {} at empty depth", config.svn_repo_url);
        } else {
            info!("check out {} at empty depth", config.svn_repo_url);
            self.svn
                .checkout(&config.svn_repo_url, &self.target, &options)?;
        }

        let mut fetched = HashSet::new();
        for file in &config.files {
            self.fetch_file(file, &mut fetched)?;
        }

        Ok(())
    }

    fn fetch_file(&self, file: &str, fetched: &mut HashSet<String>) -> Result<()> {
        for dir in intermediate_dirs(file) {
            if fetched.insert(dir.clone()) {
                self.fetch_dir(&self.target.join(native(&dir)))?;
            }
        }

        let options = UpdateOptions {
            revision: self.revision.clone(),
            set_depth: Some(Depth::Immediates),
            accept: Some(ConflictPolicy::Working),
            force: true,
            ..Default::default()
        };
        let path = self.target.join(native(file));
        if self.dry_run {
            info!("would fetch {file}");
        } else {
            info!("fetch {file}");
            self.svn.update(&path, &options)?;
        }

        Ok(())
    }

    fn fetch_dir(&self, path: &Path) -> Result<()> {
        // INVARIANT: Never reset depth of folders fetched earlier.
        if !self.dry_run && Inspector::new(self.svn).is_working_copy(path)? {
            debug!("{:?} already versioned", path.display());
            return Ok(());
        }

        let options = UpdateOptions {
            revision: self.revision.clone(),
            set_depth: Some(Depth::Empty),
            force: true,
            ..Default::default()
        };
        if self.dry_run {
            info!("would fetch folder {:?} at empty depth", path.display());
        } else {
            self.svn.update(path, &options)?;
        }

        Ok(())
    }
}

/// Folders leading up to a file, outermost first.
///
/// ```text
/// a/b/c.txt -> ["a", "a/b"]
/// ```
pub fn intermediate_dirs(file: &str) -> Vec<String> {
    let segments = file
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>();

    (1..segments.len())
        .map(|end| segments[..end].join("/"))
        .collect()
}

/// Sparse checkout error types.
#[derive(Debug, thiserror::Error)]
pub enum SparseError {
    /// Another working copy already lives at target.
    #[error("{path:?} already is a working copy, refusing to check out into it")]
    AlreadyWorkingCopy { path: PathBuf },

    #[error(transparent)]
    Svn(#[from] SvnError),
}

/// Friendly result alias :3
pub type Result<T, E = SparseError> = std::result::Result<T, E>;
