// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where externals materialize on disk, and where the bridge keeps
//! its configuration files inside a working copy.

use std::path::{Path, PathBuf};

/// Default file name of the externals configuration file.
pub const EXTERNALS_CONFIG_FILE: &str = ".svnExternals.yml";

/// Default file name of the sparse checkout configuration file.
pub const SPARSE_CHECKOUT_CONFIG_FILE: &str = ".svnSparseCheckout.yml";

/// Default file name of the git-svn bridge definition file.
pub const BRIDGE_DEFINITION_FILE: &str = ".gitsvn.yml";

/// Absolute path an external materializes at.
///
/// Both `declared_on` and `checkout_path` use `/` as separator no matter the
/// platform. Empty and `.` segments are dropped, so `./sub/` and `sub` name
/// the same folder.
pub fn target_path(root: impl AsRef<Path>, declared_on: &str, checkout_path: &str) -> PathBuf {
    let mut path = root.as_ref().to_path_buf();
    path.push(native(declared_on));
    path.push(native(checkout_path));
    path
}

/// Convert `/` separated relative path into a platform path.
pub fn native(path: &str) -> PathBuf {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}
