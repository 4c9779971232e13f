// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bridge status graph.
//!
//! Show how the Subversion working copy and the git-svn bridge sharing a
//! folder relate to each other, as a tiny history graph:
//!
//! ```text
//! * rev 120 (svn +3 (*))
//! | * git +2
//! |/
//! * rev 117
//! ```
//!
//! A `(*)` marks a side with uncommitted changes.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Relation between svn `BASE` revision and git-svn branch point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStatus {
    /// Revision the svn working copy is at.
    pub svn_base: u64,

    /// Revision git `HEAD` branched off from.
    pub branch_point: u64,

    /// Local git commits on top of branch point.
    pub git_ahead: usize,

    /// Revisions with changes between svn base and branch point.
    pub svn_gap: usize,

    pub svn_dirty: bool,
    pub git_dirty: bool,
}

impl BridgeStatus {
    /// Lower of svn base revision and branch point.
    pub fn lower_revision(&self) -> u64 {
        self.svn_base.min(self.branch_point)
    }

    /// Higher of svn base revision and branch point.
    pub fn upper_revision(&self) -> u64 {
        self.svn_base.max(self.branch_point)
    }
}

/// Count revisions with changes strictly above lower bound.
pub fn svn_gap(revisions: &[u64], lower: u64) -> usize {
    revisions.iter().filter(|revision| **revision > lower).count()
}

fn dirty(flag: bool) -> &'static str {
    if flag {
        " (*)"
    } else {
        ""
    }
}

impl Display for BridgeStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let (svn, git) = (dirty(self.svn_dirty), dirty(self.git_dirty));
        let (base, point) = (self.svn_base, self.branch_point);
        let (ahead, gap) = (self.git_ahead, self.svn_gap);

        let lines = match (base.cmp(&point), ahead > 0) {
            (std::cmp::Ordering::Equal, false) => {
                vec![format!("* rev {base} (svn{svn}, git{git})")]
            }
            (std::cmp::Ordering::Equal, true) => vec![
                format!("  * git +{ahead}{git}"),
                " /".into(),
                format!("* rev {base} (svn{svn})"),
            ],
            (std::cmp::Ordering::Less, false) => vec![
                format!("* rev {point} (git +{gap}{git})"),
                "|".into(),
                format!("* rev {base} (svn{svn})"),
            ],
            (std::cmp::Ordering::Less, true) => vec![
                format!("  * git +{ahead}{git}"),
                " /".into(),
                format!("* rev {point} (+{gap})"),
                "|".into(),
                format!("* rev {base} (svn{svn})"),
            ],
            (std::cmp::Ordering::Greater, false) => vec![
                format!("* rev {base} (svn +{gap}{svn})"),
                "|".into(),
                format!("* rev {point} (git{git})"),
            ],
            (std::cmp::Ordering::Greater, true) => vec![
                format!("* rev {base} (svn +{gap}{svn})"),
                format!("| * git +{ahead}{git}"),
                "|/".into(),
                format!("* rev {point}"),
            ],
        };

        fmt.write_str(&lines.join("\n"))
    }
}
