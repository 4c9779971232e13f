// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bridge a Subversion working copy with a git-svn clone.
//!
//! The heart of this crate is the __externals engine__: svn:externals
//! definitions are parsed into [`ExternalDefinition`] values, resolved into
//! absolute repository URLs, and reconciled against whatever currently sits
//! on disk. Reconciliation never throws away local work. A dirty external, or
//! a foreign directory in the way of one, always stops the reconciliation of
//! that external.
//!
//! Everything else in here feeds that engine or sits next to it: discovery of
//! externals from a live working copy or a git-svn bridge, a YAML file format
//! to pin externals down, historic checkouts, sparse checkouts of single files,
//! and a handful of git-svn bridge setup helpers.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod external;
pub mod gitsvn;
pub mod history;
pub mod path;
pub mod reconcile;
pub mod sparse;
pub mod status;
pub mod svn;
pub mod workspace;

mod syscall;

pub use dispatch::{Dispatcher, Outcome, Report};
pub use external::{locator::QualifiedUrl, ExternalDefinition, Revision};
pub use reconcile::{Reconciled, Reconciler, WorkingCopyState};
pub use svn::{inspect::Inspector, NodeKind, Subversion, SvnCli};
pub use workspace::{Options, Workspace};
