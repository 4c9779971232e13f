// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{RepoFixture, StubSvn};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{env::current_dir, sync::Arc};
use svnbridge::{
    status::BridgeStatus,
    svn::ConflictPolicy,
    workspace::{SyncDirection, WorkspaceError},
    Options, Revision, Workspace,
};

fn bridge_at(svn_revisions: &[u64], local_commits: usize) -> Result<RepoFixture> {
    let fixture = RepoFixture::new(current_dir()?)?.bridged()?;
    for revision in svn_revisions {
        fixture.svn_commit(&format!("r{revision}.txt"), "svn", *revision)?;
    }
    for index in 0..local_commits {
        fixture.commit(&format!("local{index}.txt"), "git")?;
    }
    Ok(fixture)
}

#[sealed_test]
fn status_of_lagging_working_copy() -> Result<()> {
    let fixture = bridge_at(&[5, 9], 1)?;
    let svn = Arc::new(StubSvn::new(5, &[5, 7, 9]));
    let workspace = Workspace::new(svn, fixture.path(), Options::default());

    let result = workspace.status()?;
    let expect = BridgeStatus {
        svn_base: 5,
        branch_point: 9,
        git_ahead: 1,
        svn_gap: 2,
        svn_dirty: false,
        git_dirty: false,
    };
    assert_eq!(result, expect);
    assert_eq!(
        result.to_string(),
        indoc! {"
              * git +1
             /
            * rev 9 (+2)
            |
            * rev 5 (svn)"}
    );

    Ok(())
}

#[sealed_test]
fn status_flags_dirty_sides() -> Result<()> {
    let fixture = bridge_at(&[9], 0)?;
    fixture.write("r9.txt", "changed")?;
    let svn = Arc::new(StubSvn::new(9, &[9]).dirty());
    let workspace = Workspace::new(svn, fixture.path(), Options::default());

    assert_eq!(workspace.status()?.to_string(), "* rev 9 (svn (*), git (*))");

    Ok(())
}

#[sealed_test]
fn sync_updates_to_branch_point() -> Result<()> {
    let fixture = bridge_at(&[5, 9], 2)?;
    let svn = Arc::new(StubSvn::new(5, &[]));
    let workspace = Workspace::new(Arc::clone(&svn), fixture.path(), Options::default());

    assert_eq!(workspace.sync_with_git()?, SyncDirection::Update { from: 5, to: 9 });
    let updates = svn.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].revision, Some(Revision::from(9)));
    assert_eq!(updates[0].accept, Some(ConflictPolicy::Working));
    assert!(updates[0].force);
    assert!(updates[0].adds_as_modification);

    assert_eq!(workspace.sync_with_git()?, SyncDirection::Current);
    assert_eq!(svn.updates().len(), 1);

    Ok(())
}

#[sealed_test]
fn sync_dry_run_leaves_working_copy() -> Result<()> {
    let fixture = bridge_at(&[5], 0)?;
    let svn = Arc::new(StubSvn::new(12, &[]));
    let options = Options {
        dry_run: true,
        ..Default::default()
    };
    let workspace = Workspace::new(Arc::clone(&svn), fixture.path(), options);

    assert_eq!(workspace.sync_with_git()?, SyncDirection::Downdate { from: 12, to: 5 });
    assert!(svn.updates().is_empty());

    Ok(())
}

#[sealed_test]
fn historic_revision_of_bridge_is_branch_point() -> Result<()> {
    let fixture = bridge_at(&[5, 9], 3)?;
    let svn = Arc::new(StubSvn::new(1, &[]));
    let workspace = Workspace::new(svn, fixture.path(), Options::default());

    assert_eq!(workspace.historic_revision()?, Revision::from(9));

    Ok(())
}

#[sealed_test]
fn historic_rev_refuses_dirty_bridge() -> Result<()> {
    let fixture = bridge_at(&[5], 0)?;
    fixture.write("r5.txt", "changed")?;
    let svn = Arc::new(StubSvn::new(5, &[]));
    let workspace = Workspace::new(svn, fixture.path(), Options::default());

    let result = workspace.historic_rev("{2020-01-01}");
    assert!(matches!(result, Err(WorkspaceError::DirtyGitRepository)));

    Ok(())
}
