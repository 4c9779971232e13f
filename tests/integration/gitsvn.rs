// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{RepoFixture, SVN_ROOT, SVN_TRUNK};

use anyhow::Result;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::env::current_dir;
use svnbridge::gitsvn::{FetchMapping, GitSvn, GitSvnError};

#[sealed_test]
fn branch_point_skips_local_commits() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?.bridged()?;
    fixture.svn_commit("a.txt", "a", 5)?;
    let point = fixture.svn_commit("b.txt", "b", 9)?;
    fixture.commit("c.txt", "c")?;
    fixture.commit("d.txt", "d")?;

    let gitsvn = GitSvn::discover(fixture.path())?;
    let result = gitsvn.branch_point()?;
    assert_eq!(result.commit, point);
    assert_eq!(result.url, SVN_TRUNK);
    assert_eq!(result.revision, 9);
    assert_eq!(gitsvn.commits_ahead(&result)?, 2);
    assert_eq!(gitsvn.current_branch()?, "main");

    Ok(())
}

#[sealed_test]
fn branch_point_missing_without_svn_commits() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit("a.txt", "a")?;

    let gitsvn = GitSvn::discover(fixture.path())?;
    assert!(matches!(gitsvn.branch_point(), Err(GitSvnError::NoBranchPoint)));

    Ok(())
}

#[sealed_test]
fn dirty_only_counts_tracked_files() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit("a.txt", "a")?;
    let gitsvn = GitSvn::discover(fixture.path())?;
    assert!(!gitsvn.is_dirty()?);

    fixture.write("untracked.txt", "new")?;
    assert!(!gitsvn.is_dirty()?);

    fixture.write("a.txt", "changed")?;
    assert!(gitsvn.is_dirty()?);

    Ok(())
}

#[sealed_test]
fn bridge_detection() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    let gitsvn = GitSvn::discover(fixture.path())?;
    assert_eq!(gitsvn.svn_url()?, None);
    assert!(!gitsvn.is_bridge()?);
    assert!(matches!(gitsvn.externals(), Err(GitSvnError::NotABridge)));

    let fixture = fixture.bridged()?;
    let gitsvn = GitSvn::discover(fixture.path())?;
    assert_eq!(gitsvn.svn_url()?, Some(SVN_ROOT.to_string()));
    assert!(gitsvn.is_bridge()?);

    Ok(())
}

#[sealed_test]
fn manage_fetch_mappings() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?.bridged()?;
    let gitsvn = GitSvn::discover(fixture.path())?;
    assert!(gitsvn.fetch_mappings()?.is_empty());
    gitsvn.clear_fetch_mappings()?;

    let trunk = FetchMapping::for_branch("trunk");
    let feature = FetchMapping::for_branch("branches/my feature");
    gitsvn.add_fetch_mapping(&trunk)?;
    gitsvn.add_fetch_mapping(&feature)?;
    assert_eq!(gitsvn.fetch_mappings()?, vec![trunk, feature]);

    gitsvn.clear_fetch_mappings()?;
    assert!(gitsvn.fetch_mappings()?.is_empty());

    assert_eq!(gitsvn.ignore_paths()?, None);
    gitsvn.set_ignore_paths("(lib/)")?;
    assert_eq!(gitsvn.ignore_paths()?, Some("(lib/)".to_string()));

    Ok(())
}

#[sealed_test]
fn copy_reference_between_remotes() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit("a.txt", "a")?;
    fixture.reference("refs/remotes/origin/trunk")?;
    let gitsvn = GitSvn::discover(fixture.path())?;

    assert!(!gitsvn.reference_exists("refs/remotes/git-svn/trunk"));
    gitsvn.copy_reference("refs/remotes/git-svn/trunk", "refs/remotes/origin/trunk", false)?;
    assert!(gitsvn.reference_exists("refs/remotes/git-svn/trunk"));

    let result =
        gitsvn.copy_reference("refs/remotes/git-svn/trunk", "refs/remotes/origin/trunk", false);
    assert!(matches!(result, Err(GitSvnError::Git2(_))));
    gitsvn.copy_reference("refs/remotes/git-svn/trunk", "refs/remotes/origin/trunk", true)?;

    let result = gitsvn.copy_reference("refs/remotes/git-svn/x", "refs/remotes/origin/x", true);
    assert!(matches!(result, Err(GitSvnError::Git2(_))));

    Ok(())
}
